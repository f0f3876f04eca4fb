//! Prequential evaluation driver
//!
//! Runs a model over a stream:
//! 1. Check the configuration against the model and data (before any training)
//! 2. Build on the initial window
//! 3. For every remaining instance, in order: test on the true instance,
//!    decide supervision, update with the true or a masked copy
//! 4. At window boundaries snapshot statistics and recalibrate thresholds
//! 5. Assemble the report; a held-out test set, when given, is evaluated
//!    afterwards against the streamed model and its result supersedes the
//!    streaming one. With evaluation off the test set is left alone.
//!
//! States: `Idle → InitialTrain → StreamLoop → Finalize → Done`, with
//! `Failed` reachable from any of them.

use super::batch::BatchHarness;
use super::error::{ConfigError, EvalError, EvalResult, ModelPhase, PartialRun};
use super::schedule::SupervisionSchedule;
use super::stats::{StandardStats, Stats, StatsProvider, HEADLINE};
use super::thresholds::{Calibrator, ThresholdMode, ThresholdSpec, ThresholdVector, DEFAULT_THRESHOLD};
use super::window::{PerformanceTrace, ResultKind, Snapshot, WindowAggregator};
use crate::classifier::{Capability, ModelError, StreamModel};
use crate::config::{EvalConfig, WindowPolicy};
use crate::models::{mask, DatasetHeader, Instance, Stream};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;
use tracing::{info, warn};

// Info keys
pub const INFO_SUPERVISION: &str = "Supervision";
pub const INFO_TYPE: &str = "Type";
pub const INFO_THRESHOLD: &str = "Threshold";
pub const INFO_MODEL: &str = "Model";
pub const INFO_VERBOSITY: &str = "Verbosity";
pub const INFO_DATASET: &str = "Dataset";

// Measurements, in seconds or counts
pub const TEST_TIME: &str = "Test time";
pub const BUILD_TIME: &str = "Build time";
pub const TOTAL_TIME: &str = "Total time";
pub const TOTAL_TESTED: &str = "Total instances tested";
pub const INITIAL_INSTANCES: &str = "Initial instances for training";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    InitialTrain,
    StreamLoop,
    Finalize,
    Done,
    Failed,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriverState::Idle => "idle",
            DriverState::InitialTrain => "initial-train",
            DriverState::StreamLoop => "stream-loop",
            DriverState::Finalize => "finalize",
            DriverState::Done => "done",
            DriverState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Which evaluation produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportOrigin {
    /// Prequential test-then-update over the stream
    Streaming,
    /// One-shot test against a held-out set
    Batch,
    /// The stream was only used for training
    Unevaluated,
}

/// Final result of a run
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub kind: ResultKind,
    pub origin: ReportOrigin,
    pub info: BTreeMap<String, String>,
    pub measurements: BTreeMap<String, f64>,
    pub stats: Stats,
    /// Thresholds in force at the end of the run, one per label
    pub thresholds: Vec<f64>,
    pub trace: PerformanceTrace,
}

impl EvalReport {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.stats.get(name).and_then(|v| v.as_f64())
    }

    pub fn measurement(&self, name: &str) -> Option<f64> {
        self.measurements.get(name).copied()
    }
}

#[derive(Debug, Clone, Copy)]
enum Plan {
    Stream { policy: WindowPolicy, initial: usize },
    /// Batch evaluation only; `rebuild` when training data is available
    BatchOnly { rebuild: bool },
}

#[derive(Debug, Clone, Copy)]
struct Prepared {
    kind: ResultKind,
    schedule: SupervisionSchedule,
    spec: ThresholdSpec,
    plan: Plan,
}

type SnapshotHook<'a> = Box<dyn FnMut(&Snapshot) + 'a>;
type ProgressHook<'a> = Box<dyn FnMut(usize, usize) + 'a>;

/// Orchestrates a prequential evaluation run
pub struct EvaluationDriver<'a> {
    config: EvalConfig,
    train: Option<Stream>,
    test: Option<Stream>,
    prebuilt: Option<DatasetHeader>,
    stats: Box<dyn StatsProvider + 'a>,
    on_snapshot: Option<SnapshotHook<'a>>,
    on_progress: Option<ProgressHook<'a>>,
    state: DriverState,
}

impl<'a> EvaluationDriver<'a> {
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            train: None,
            test: None,
            prebuilt: None,
            stats: Box::new(StandardStats),
            on_snapshot: None,
            on_progress: None,
            state: DriverState::Idle,
        }
    }

    /// Stream used for the prequential run
    pub fn train(mut self, stream: Stream) -> Self {
        self.train = Some(stream);
        self
    }

    /// Held-out set evaluated without updates
    pub fn test(mut self, stream: Stream) -> Self {
        self.test = Some(stream);
        self
    }

    /// The model passed to [`run`](Self::run) was already built on data with this header
    pub fn prebuilt(mut self, header: DatasetHeader) -> Self {
        self.prebuilt = Some(header);
        self
    }

    pub fn stats(mut self, stats: Box<dyn StatsProvider + 'a>) -> Self {
        self.stats = stats;
        self
    }

    /// Called with each snapshot as it is frozen
    pub fn on_snapshot(mut self, hook: impl FnMut(&Snapshot) + 'a) -> Self {
        self.on_snapshot = Some(Box::new(hook));
        self
    }

    /// Called after each stream instance with (processed, total)
    pub fn on_progress(mut self, hook: impl FnMut(usize, usize) + 'a) -> Self {
        self.on_progress = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn train_stream(&self) -> Option<&Stream> {
        self.train.as_ref()
    }

    pub fn test_stream(&self) -> Option<&Stream> {
        self.test.as_ref()
    }

    /// Run the evaluation.
    ///
    /// Configuration errors are returned before the model is touched.
    pub fn run<M: StreamModel + ?Sized>(&mut self, model: &mut M) -> EvalResult<EvalReport> {
        self.state = DriverState::Idle;
        let prepared = match self.preflight(model) {
            Ok(p) => p,
            Err(e) => {
                warn!("Refusing to start: {}", e);
                self.state = DriverState::Failed;
                return Err(e.into());
            }
        };

        let train = self.train.take();
        let test = self.test.take();
        let result = self.execute(model, prepared, train.as_ref(), test.as_ref());
        self.train = train;
        self.test = test;

        self.state = match result {
            Ok(_) => DriverState::Done,
            Err(_) => DriverState::Failed,
        };
        result
    }

    fn preflight<M: StreamModel + ?Sized>(&self, model: &M) -> Result<Prepared, ConfigError> {
        self.config.validate()?;
        let caps = model.capabilities();
        let kind = ResultKind::from_capabilities(caps)
            .ok_or_else(|| ConfigError::UnknownOutput(model.name().to_string()))?;

        match (&self.train, &self.test) {
            (None, None) => return Err(ConfigError::NoData),
            (None, Some(_)) if self.prebuilt.is_none() => {
                return Err(ConfigError::PrebuiltModelRequired)
            }
            _ => {}
        }

        if let Some(header) = &self.prebuilt {
            for (which, stream) in [("training", &self.train), ("test", &self.test)] {
                if let Some(detail) = stream.as_ref().and_then(|s| header.mismatch(s.header())) {
                    return Err(ConfigError::HeaderMismatch { which, detail });
                }
            }
        }
        if let (Some(train), Some(test)) = (&self.train, &self.test) {
            if let Some(detail) = train.header().mismatch(test.header()) {
                return Err(ConfigError::HeaderMismatch { which: "test", detail });
            }
        }

        let policy = self.config.window_policy()?;
        let schedule = self.config.schedule()?;
        let spec = self.config.threshold_spec()?;
        let incremental = caps.supports(Capability::IncrementalUpdate);

        let plan = match &self.train {
            None => Plan::BatchOnly { rebuild: false },
            Some(_) if !incremental && self.test.is_some() => Plan::BatchOnly { rebuild: true },
            Some(_) if !incremental => {
                return Err(ConfigError::NotIncremental(model.name().to_string()))
            }
            Some(train) => {
                let initial = policy.check_stream(train.len())?;
                schedule.check_window(initial)?;
                Plan::Stream { policy, initial }
            }
        };

        Ok(Prepared {
            kind,
            schedule,
            spec,
            plan,
        })
    }

    fn execute<M: StreamModel + ?Sized>(
        &mut self,
        model: &mut M,
        prepared: Prepared,
        train: Option<&Stream>,
        test: Option<&Stream>,
    ) -> EvalResult<EvalReport> {
        let dataset = train.or(test).map(|s| s.header().name.clone()).unwrap_or_default();
        let mut info = BTreeMap::new();
        info.insert(INFO_MODEL.to_string(), model.describe());
        info.insert(INFO_DATASET.to_string(), dataset);
        info.insert(INFO_SUPERVISION.to_string(), self.config.supervision.to_string());
        info.insert(INFO_VERBOSITY.to_string(), self.config.verbosity.to_string());

        let streamed = match (prepared.plan, train) {
            (Plan::Stream { policy, initial }, Some(train)) => {
                Some(self.stream(model, &prepared, policy, initial, train, &mut info)?)
            }
            _ => None,
        };

        let num_labels = train.or(test).map(Stream::num_labels).unwrap_or_default();
        // a test set is only scored when evaluating; callers may still predict on it
        let Some(test) = test.filter(|_| self.config.evaluate) else {
            return match streamed {
                Some(report) => Ok(report),
                None => self.train_only(model, &prepared, train, num_labels, info),
            };
        };

        self.state = DriverState::Finalize;
        let threshold = match (prepared.spec.numeric, prepared.spec.mode) {
            (true, ThresholdMode::Single) => ThresholdVector::single(prepared.spec.initial),
            _ => ThresholdVector::single(DEFAULT_THRESHOLD),
        };
        let harness = BatchHarness::new(self.stats.as_ref())
            .with_threshold(threshold)
            .with_verbosity(self.config.verbosity);

        info!("Evaluating on held-out set of {} instances", test.len());
        let mut report = match (prepared.plan, train) {
            (Plan::BatchOnly { rebuild: true }, Some(train)) => harness.build_and_test(model, train, test)?,
            _ => harness.evaluate(&*model, test)?,
        };
        for (k, v) in info {
            report.info.entry(k).or_insert(v);
        }
        if let Some(streamed) = streamed {
            // build and update time of the streamed model
            let build_time = streamed.measurement(BUILD_TIME).unwrap_or_default();
            let test_time = report.measurement(TEST_TIME).unwrap_or_default();
            report.measurements.insert(BUILD_TIME.to_string(), build_time);
            report
                .measurements
                .insert(TOTAL_TIME.to_string(), build_time + test_time);
            if let Some(initial) = streamed.measurement(INITIAL_INSTANCES) {
                report.measurements.insert(INITIAL_INSTANCES.to_string(), initial);
            }
            report.trace = streamed.trace;
        }
        Ok(report)
    }

    /// No streaming loop ran and nothing is evaluated: build on the training
    /// data if there is any, then report without statistics.
    fn train_only<M: StreamModel + ?Sized>(
        &mut self,
        model: &mut M,
        prepared: &Prepared,
        train: Option<&Stream>,
        num_labels: usize,
        mut info: BTreeMap<String, String>,
    ) -> EvalResult<EvalReport> {
        let mut build_time = 0.0;
        let mut initial = 0usize;
        if let (Plan::BatchOnly { rebuild: true }, Some(train)) = (prepared.plan, train) {
            self.state = DriverState::InitialTrain;
            info!("Building {} on {} instances", model.name(), train.len());
            let start = Instant::now();
            model.build(train.header(), train.instances()).map_err(|source| {
                EvalError::model(
                    ModelPhase::Build,
                    None,
                    source,
                    PartialRun {
                        info: info.clone(),
                        trace: PerformanceTrace::new(),
                    },
                )
            })?;
            build_time = start.elapsed().as_secs_f64();
            initial = train.len();
        }
        self.state = DriverState::Finalize;

        let thresholds = match prepared.kind {
            ResultKind::MultiLabel => ThresholdVector::initial(&prepared.spec, num_labels),
            ResultKind::MultiTarget => ThresholdVector::single(DEFAULT_THRESHOLD),
        };
        info.insert(INFO_TYPE.to_string(), prepared.kind.tag().to_string());
        if prepared.kind == ResultKind::MultiLabel {
            info.insert(INFO_THRESHOLD.to_string(), thresholds.to_string());
        }

        let mut measurements = BTreeMap::new();
        measurements.insert(TEST_TIME.to_string(), 0.0);
        measurements.insert(BUILD_TIME.to_string(), build_time);
        measurements.insert(TOTAL_TIME.to_string(), build_time);
        measurements.insert(TOTAL_TESTED.to_string(), 0.0);
        measurements.insert(INITIAL_INSTANCES.to_string(), initial as f64);

        Ok(EvalReport {
            kind: prepared.kind,
            origin: ReportOrigin::Unevaluated,
            info,
            measurements,
            stats: Stats::new(),
            thresholds: thresholds.expand(num_labels),
            trace: PerformanceTrace::new(),
        })
    }

    fn stream<M: StreamModel + ?Sized>(
        &mut self,
        model: &mut M,
        prepared: &Prepared,
        policy: WindowPolicy,
        initial: usize,
        train: &Stream,
        info: &mut BTreeMap<String, String>,
    ) -> EvalResult<EvalReport> {
        let num_labels = train.num_labels();
        let kind = prepared.kind;
        let evaluate = self.config.evaluate;
        let verbosity = self.config.verbosity;

        let type_tag = match (kind, policy) {
            (ResultKind::MultiLabel, WindowPolicy::FixedCount { .. }) => "MLi",
            (kind, _) => kind.tag(),
        };
        info.insert(INFO_TYPE.to_string(), type_tag.to_string());

        let thresholds = initial_thresholds(kind, policy, &prepared.spec, num_labels);
        let (window, rest) = train.split_initial(initial);

        self.state = DriverState::InitialTrain;
        info!(
            "Building {} on initial window of {} instances",
            model.name(),
            window.len()
        );
        let mut run = StreamRun {
            schedule: prepared.schedule,
            num_labels,
            offset: initial,
            evaluate,
            agg: WindowAggregator::new(kind, num_labels, thresholds),
            info,
        };
        let start = Instant::now();
        model
            .build(train.header(), window)
            .map_err(|e| run.fail(ModelPhase::Build, None, e))?;
        run.agg.add_build_time(start.elapsed());

        self.state = DriverState::StreamLoop;
        info!(
            "Proceeding to test/label/update cycle on remaining {} instances",
            rest.len()
        );
        let total = rest.len();

        match policy {
            WindowPolicy::FixedCount { windows } => {
                let calibrator = (self.config.calibrate && kind == ResultKind::MultiLabel)
                    .then(|| Calibrator::new(prepared.spec.mode));
                let count = windows - 1;
                for w in 0..count {
                    let start = w * initial;
                    // the last window absorbs the leftover
                    let end = if w + 1 == count { total } else { start + initial };
                    for (i, inst) in rest.iter().enumerate().take(end).skip(start) {
                        run.step(model, i, inst)?;
                        self.progress(i + 1, total);
                    }
                    if evaluate {
                        let snapshot = run.agg.snapshot(self.stats.as_ref(), verbosity);
                        log_snapshot(snapshot);
                        if let Some(hook) = self.on_snapshot.as_mut() {
                            hook(snapshot);
                        }
                        if let Some(calibrator) = &calibrator {
                            let current = run.agg.current();
                            let next = calibrator.calibrate(
                                current.predictions(),
                                current.actuals(),
                                current.thresholds(),
                            );
                            run.agg.set_thresholds(next);
                        }
                    }
                    run.agg.reset();
                }
            }
            WindowPolicy::FixedSize { size } => {
                for (i, inst) in rest.iter().enumerate() {
                    run.step(model, i, inst)?;
                    self.progress(i + 1, total);
                    if evaluate && i % size == size - 1 {
                        let snapshot = run.agg.snapshot(self.stats.as_ref(), verbosity);
                        log_snapshot(snapshot);
                        if let Some(hook) = self.on_snapshot.as_mut() {
                            hook(snapshot);
                        }
                    }
                }
            }
        }

        self.state = DriverState::Finalize;
        let StreamRun { agg, info, .. } = run;
        let (window, totals, trace) = agg.into_parts();

        let stats = if !evaluate {
            Stats::new()
        } else {
            match policy {
                WindowPolicy::FixedCount { .. } => {
                    trace.last().map(|s| s.stats.clone()).unwrap_or_default()
                }
                // statistics since the start of the stream
                WindowPolicy::FixedSize { .. } => self.stats.compute(&window, verbosity),
            }
        };

        let mut report_info = info.clone();
        if kind == ResultKind::MultiLabel {
            report_info.insert(INFO_THRESHOLD.to_string(), window.thresholds().to_string());
        }

        let test_time = totals.test_time.as_secs_f64();
        let build_time = (totals.build_time + totals.update_time).as_secs_f64();
        let mut measurements = BTreeMap::new();
        measurements.insert(TEST_TIME.to_string(), test_time);
        measurements.insert(BUILD_TIME.to_string(), build_time);
        measurements.insert(TOTAL_TIME.to_string(), test_time + build_time);
        measurements.insert(TOTAL_TESTED.to_string(), totals.instances_tested as f64);
        measurements.insert(INITIAL_INSTANCES.to_string(), initial as f64);

        info!(
            "Finished {} instances ({} labelled, {} masked) in {:.2}s",
            totals.instances_seen,
            totals.labeled_updates,
            totals.masked_updates,
            test_time + build_time
        );

        Ok(EvalReport {
            kind,
            origin: if evaluate {
                ReportOrigin::Streaming
            } else {
                ReportOrigin::Unevaluated
            },
            info: report_info,
            measurements,
            stats,
            thresholds: window.thresholds().expand(num_labels),
            trace,
        })
    }

    fn progress(&mut self, done: usize, total: usize) {
        if let Some(hook) = self.on_progress.as_mut() {
            hook(done, total);
        }
    }
}

/// Thresholds in force for the first window
fn initial_thresholds(
    kind: ResultKind,
    policy: WindowPolicy,
    spec: &ThresholdSpec,
    num_labels: usize,
) -> ThresholdVector {
    match (kind, policy) {
        (ResultKind::MultiTarget, _) => ThresholdVector::single(DEFAULT_THRESHOLD),
        (ResultKind::MultiLabel, WindowPolicy::FixedSize { .. }) if !spec.numeric => {
            warn!(
                "Only a single threshold can be chosen for this kind of evaluation; using {}",
                DEFAULT_THRESHOLD
            );
            ThresholdVector::single(DEFAULT_THRESHOLD)
        }
        (ResultKind::MultiLabel, _) => ThresholdVector::initial(spec, num_labels),
    }
}

fn log_snapshot(snapshot: &Snapshot) {
    let headline: Vec<String> = HEADLINE
        .iter()
        .filter_map(|m| snapshot.metric(m).map(|v| format!("{m} {v:.4}")))
        .collect();
    info!(
        "Window {} ({} instances, {} labelled): {}",
        snapshot.window,
        snapshot.window_instances,
        snapshot.window_labeled,
        headline.join(", ")
    );
}

/// Per-run state of the stream loop
struct StreamRun<'r> {
    schedule: SupervisionSchedule,
    num_labels: usize,
    /// Position of the first remainder instance in the full stream
    offset: usize,
    evaluate: bool,
    agg: WindowAggregator,
    info: &'r BTreeMap<String, String>,
}

impl StreamRun<'_> {
    /// Test-then-update on remainder instance `i`
    fn step<M: StreamModel + ?Sized>(
        &mut self,
        model: &mut M,
        i: usize,
        instance: &Instance,
    ) -> EvalResult<()> {
        if self.evaluate {
            let start = Instant::now();
            let prediction = model
                .test(instance)
                .map_err(|e| self.fail(ModelPhase::Test, Some(i), e))?;
            self.agg.add_test_time(start.elapsed());
            if prediction.len() < self.num_labels {
                let e = ModelError::OutputSize {
                    expected: self.num_labels,
                    found: prediction.len(),
                };
                return Err(self.fail(ModelPhase::Test, Some(i), e));
            }
            self.agg.record(prediction, instance);
        }

        let labeled = self.schedule.is_labeled(i);
        let masked;
        let target = if labeled {
            instance
        } else {
            masked = mask(instance);
            &masked
        };
        let start = Instant::now();
        let updated = model.update(target, !labeled);
        let elapsed = start.elapsed();
        updated.map_err(|e| self.fail(ModelPhase::Update, Some(i), e))?;
        self.agg.add_update(elapsed, labeled);
        Ok(())
    }

    fn fail(&self, phase: ModelPhase, i: Option<usize>, source: ModelError) -> EvalError {
        let index = i.map(|i| self.offset + i);
        warn!(
            "Model {} failed{}: {}",
            phase,
            index.map(|i| format!(" at instance {i}")).unwrap_or_default(),
            source
        );
        EvalError::model(
            phase,
            index,
            source,
            PartialRun {
                info: self.info.clone(),
                trace: self.agg.trace().clone(),
            },
        )
    }
}
