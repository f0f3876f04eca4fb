//! Held-out evaluation: build once, test once, no updates and no windows.
//!
//! Shares the statistics collaborator with the streaming driver but never
//! consults the supervision schedule or the calibrator. The threshold is a
//! fixed 0.5 unless overridden.

use super::driver::{
    EvalReport, ReportOrigin, BUILD_TIME, INFO_DATASET, INFO_MODEL, INFO_THRESHOLD, INFO_TYPE,
    INFO_VERBOSITY, INITIAL_INSTANCES, TEST_TIME, TOTAL_TESTED, TOTAL_TIME,
};
use super::error::{ConfigError, EvalError, EvalResult, ModelPhase, PartialRun};
use super::stats::StatsProvider;
use super::thresholds::{ThresholdVector, DEFAULT_THRESHOLD};
use super::window::{PerformanceTrace, ResultKind, RunningResult};
use crate::classifier::{ModelError, StreamModel};
use crate::config::DEFAULT_VERBOSITY;
use crate::models::Stream;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub struct BatchHarness<'s> {
    stats: &'s dyn StatsProvider,
    thresholds: ThresholdVector,
    verbosity: u8,
}

impl<'s> BatchHarness<'s> {
    pub fn new(stats: &'s dyn StatsProvider) -> Self {
        Self {
            stats,
            thresholds: ThresholdVector::single(DEFAULT_THRESHOLD),
            verbosity: DEFAULT_VERBOSITY,
        }
    }

    pub fn with_threshold(mut self, thresholds: ThresholdVector) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Build on all of `train`, then score `test`.
    pub fn build_and_test<M: StreamModel + ?Sized>(
        &self,
        model: &mut M,
        train: &Stream,
        test: &Stream,
    ) -> EvalResult<EvalReport> {
        let kind = result_kind(model)?;
        if let Some(detail) = train.header().mismatch(test.header()) {
            return Err(ConfigError::HeaderMismatch { which: "test", detail }.into());
        }

        tracing::info!("Building {} on {} instances", model.name(), train.len());
        let start = Instant::now();
        model.build(train.header(), train.instances()).map_err(|source| {
            EvalError::model(ModelPhase::Build, None, source, self.partial(&*model, kind, test))
        })?;
        let build_time = start.elapsed();

        let mut report = self.evaluate(&*model, test)?;
        let test_time = report.measurement(TEST_TIME).unwrap_or_default();
        report
            .measurements
            .insert(BUILD_TIME.to_string(), build_time.as_secs_f64());
        report
            .measurements
            .insert(TOTAL_TIME.to_string(), test_time + build_time.as_secs_f64());
        report
            .measurements
            .insert(INITIAL_INSTANCES.to_string(), train.len() as f64);
        Ok(report)
    }

    /// Score an already built model on `test`.
    pub fn evaluate<M: StreamModel + ?Sized>(&self, model: &M, test: &Stream) -> EvalResult<EvalReport> {
        let kind = result_kind(model)?;
        let (result, test_time) = self.score(model, kind, test)?;
        let stats = self.stats.compute(&result, self.verbosity);

        let mut measurements = BTreeMap::new();
        measurements.insert(TEST_TIME.to_string(), test_time.as_secs_f64());
        measurements.insert(BUILD_TIME.to_string(), 0.0);
        measurements.insert(TOTAL_TIME.to_string(), test_time.as_secs_f64());
        measurements.insert(TOTAL_TESTED.to_string(), result.len() as f64);

        Ok(EvalReport {
            kind,
            origin: ReportOrigin::Batch,
            info: self.info(model, kind, test),
            measurements,
            stats,
            thresholds: self.thresholds.expand(test.num_labels()),
            trace: PerformanceTrace::new(),
        })
    }

    /// Raw outputs for every test instance, cut to the first `L` values
    pub fn predict<M: StreamModel + ?Sized>(&self, model: &M, test: &Stream) -> EvalResult<Vec<Vec<f64>>> {
        let kind = result_kind(model)?;
        let (result, _) = self.score(model, kind, test)?;
        Ok(result.predictions().to_vec())
    }

    fn score<M: StreamModel + ?Sized>(
        &self,
        model: &M,
        kind: ResultKind,
        test: &Stream,
    ) -> EvalResult<(RunningResult, Duration)> {
        let num_labels = test.num_labels();
        let mut result = RunningResult::new(kind, num_labels, self.thresholds.clone());
        let mut elapsed = Duration::ZERO;

        for (i, inst) in test.instances().iter().enumerate() {
            let start = Instant::now();
            let outcome = model.test(inst);
            elapsed += start.elapsed();
            let mut prediction = outcome.map_err(|source| {
                EvalError::model(ModelPhase::Test, Some(i), source, self.partial(model, kind, test))
            })?;
            if prediction.len() < num_labels {
                let source = ModelError::OutputSize {
                    expected: num_labels,
                    found: prediction.len(),
                };
                return Err(EvalError::model(
                    ModelPhase::Test,
                    Some(i),
                    source,
                    self.partial(model, kind, test),
                ));
            }
            prediction.truncate(num_labels);
            result.add(prediction, inst.labels().to_vec());
        }
        Ok((result, elapsed))
    }

    fn info<M: StreamModel + ?Sized>(&self, model: &M, kind: ResultKind, test: &Stream) -> BTreeMap<String, String> {
        let mut info = BTreeMap::new();
        info.insert(INFO_MODEL.to_string(), model.describe());
        info.insert(INFO_DATASET.to_string(), test.header().name.clone());
        info.insert(INFO_TYPE.to_string(), kind.tag().to_string());
        info.insert(INFO_VERBOSITY.to_string(), self.verbosity.to_string());
        if kind == ResultKind::MultiLabel {
            info.insert(INFO_THRESHOLD.to_string(), self.thresholds.to_string());
        }
        info
    }

    fn partial<M: StreamModel + ?Sized>(&self, model: &M, kind: ResultKind, test: &Stream) -> PartialRun {
        PartialRun {
            info: self.info(model, kind, test),
            trace: PerformanceTrace::new(),
        }
    }
}

fn result_kind<M: StreamModel + ?Sized>(model: &M) -> Result<ResultKind, ConfigError> {
    ResultKind::from_capabilities(model.capabilities())
        .ok_or_else(|| ConfigError::UnknownOutput(model.name().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{Capabilities, Capability, LabelFrequency};
    use crate::eval::stats::{StandardStats, ACCURACY};
    use crate::models::{DatasetHeader, Instance};

    fn stream(rows: &[[bool; 2]]) -> Stream {
        let header = DatasetHeader::with_label_count("held", 1, 2);
        let instances = rows.iter().map(|y| Instance::binary(vec![0.0], y)).collect();
        Stream::new(header, instances).unwrap()
    }

    /// Multi-target model emitting values plus confidences (2L outputs)
    struct Constant;

    impl StreamModel for Constant {
        fn name(&self) -> &str {
            "constant"
        }
        fn capabilities(&self) -> Capabilities {
            Capabilities::new().with(Capability::MultiTarget)
        }
        fn build(&mut self, _: &DatasetHeader, _: &[Instance]) -> Result<(), ModelError> {
            Ok(())
        }
        fn test(&self, instance: &Instance) -> Result<Vec<f64>, ModelError> {
            let l = instance.num_labels();
            Ok([vec![1.0; l], vec![0.9; l]].concat())
        }
        fn update(&mut self, _: &Instance, _: bool) -> Result<(), ModelError> {
            Err(ModelError::Update("not incremental".into()))
        }
    }

    #[test]
    fn test_build_and_test() {
        let train = stream(&[[true, false], [true, false], [true, true]]);
        let test = stream(&[[true, false], [false, false]]);
        let mut model = LabelFrequency::new();
        let report = BatchHarness::new(&StandardStats)
            .build_and_test(&mut model, &train, &test)
            .unwrap();
        assert_eq!(report.origin, ReportOrigin::Batch);
        assert_eq!(report.measurement(TOTAL_TESTED), Some(2.0));
        assert_eq!(report.measurement(INITIAL_INSTANCES), Some(3.0));
        assert_eq!(report.thresholds, vec![0.5, 0.5]);
        // predicts [1.0, 0.33] for both: label 0 right once, label 1 right twice
        assert!(report.metric(ACCURACY).is_some());
        assert!(report.trace.is_empty());
    }

    #[test]
    fn test_predict_cuts_to_label_count() {
        let test = stream(&[[true, false]]);
        let preds = BatchHarness::new(&StandardStats).predict(&Constant, &test).unwrap();
        assert_eq!(preds, vec![vec![1.0, 1.0]]);
    }

    #[test]
    fn test_unbuilt_model_reports_test_failure() {
        let test = stream(&[[true, false], [false, true]]);
        let err = BatchHarness::new(&StandardStats)
            .evaluate(&LabelFrequency::new(), &test)
            .unwrap_err();
        match err {
            EvalError::Model { phase, index, .. } => {
                assert_eq!(phase, ModelPhase::Test);
                assert_eq!(index, Some(0));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn test_multi_target_is_not_thresholded() {
        let test = stream(&[[true, true], [true, false]]);
        let report = BatchHarness::new(&StandardStats).evaluate(&Constant, &test).unwrap();
        assert_eq!(report.kind, ResultKind::MultiTarget);
        assert_eq!(report.info[INFO_TYPE], "MT");
        assert!(!report.info.contains_key(INFO_THRESHOLD));
    }
}
