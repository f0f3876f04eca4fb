//! Window accumulation and the performance trace
//!
//! [`WindowAggregator`] owns the one mutable accumulator of a run. At each
//! window boundary it freezes a [`Snapshot`] into the [`PerformanceTrace`];
//! snapshots are values, nothing in the trace refers back to the accumulator.

use super::stats::{Stats, StatsProvider};
use super::thresholds::ThresholdVector;
use crate::classifier::{Capabilities, Capability};
use crate::models::Instance;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How outputs are interpreted when scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultKind {
    /// Probabilities per binary label, binarised by thresholds
    MultiLabel,
    /// Categorical value per target
    MultiTarget,
}

impl ResultKind {
    /// Output interpretation declared by a model, multi-label taking precedence
    pub fn from_capabilities(caps: Capabilities) -> Option<Self> {
        if caps.supports(Capability::MultiLabel) {
            Some(ResultKind::MultiLabel)
        } else if caps.supports(Capability::MultiTarget) {
            Some(ResultKind::MultiTarget)
        } else {
            None
        }
    }

    /// Short tag for reports
    pub fn tag(&self) -> &'static str {
        match self {
            ResultKind::MultiLabel => "ML",
            ResultKind::MultiTarget => "MT",
        }
    }
}

/// Predictions and true labels buffered for one window (or one whole run)
#[derive(Debug, Clone)]
pub struct RunningResult {
    kind: ResultKind,
    num_labels: usize,
    thresholds: ThresholdVector,
    predictions: Vec<Vec<f64>>,
    actuals: Vec<Vec<Option<f64>>>,
    test_time: Duration,
    update_time: Duration,
}

impl RunningResult {
    pub fn new(kind: ResultKind, num_labels: usize, thresholds: ThresholdVector) -> Self {
        Self {
            kind,
            num_labels,
            thresholds,
            predictions: Vec::new(),
            actuals: Vec::new(),
            test_time: Duration::ZERO,
            update_time: Duration::ZERO,
        }
    }

    /// Append one prediction and its true label vector
    pub fn add(&mut self, prediction: Vec<f64>, actual: Vec<Option<f64>>) {
        self.predictions.push(prediction);
        self.actuals.push(actual);
    }

    pub fn kind(&self) -> ResultKind {
        self.kind
    }

    pub fn num_labels(&self) -> usize {
        self.num_labels
    }

    pub fn thresholds(&self) -> &ThresholdVector {
        &self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: ThresholdVector) {
        self.thresholds = thresholds;
    }

    pub fn predictions(&self) -> &[Vec<f64>] {
        &self.predictions
    }

    pub fn actuals(&self) -> &[Vec<Option<f64>>] {
        &self.actuals
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    pub fn test_time(&self) -> Duration {
        self.test_time
    }

    pub fn update_time(&self) -> Duration {
        self.update_time
    }

    fn clear(&mut self) {
        self.predictions.clear();
        self.actuals.clear();
        self.test_time = Duration::ZERO;
        self.update_time = Duration::ZERO;
    }
}

/// Frozen statistics for one window boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// 1-based window (or sample) number
    pub window: usize,
    /// Remainder instances processed so far, over the whole run
    pub instances_seen: usize,
    /// Instances scored in this window
    pub window_instances: usize,
    /// Updates that saw true labels in this window
    pub window_labeled: usize,
    /// Seconds spent in `test`, this window
    pub window_test_time: f64,
    /// Seconds spent in `update`, this window
    pub window_update_time: f64,
    /// Seconds spent in `test`, whole run
    pub test_time: f64,
    /// Seconds spent in `build` plus `update`, whole run
    pub build_time: f64,
    /// Thresholds in force while this window was scored
    pub thresholds: Vec<f64>,
    pub stats: Stats,
}

impl Snapshot {
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.stats.get(name).and_then(|v| v.as_f64())
    }
}

/// Ordered snapshots, one per window boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerformanceTrace {
    snapshots: Vec<Snapshot>,
}

impl PerformanceTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Snapshot> {
        self.snapshots.iter()
    }

    pub fn get(&self, i: usize) -> Option<&Snapshot> {
        self.snapshots.get(i)
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// One metric across the trace (None where a snapshot lacks it)
    pub fn series(&self, metric: &str) -> Vec<Option<f64>> {
        self.snapshots.iter().map(|s| s.metric(metric)).collect()
    }
}

impl<'a> IntoIterator for &'a PerformanceTrace {
    type Item = &'a Snapshot;
    type IntoIter = std::slice::Iter<'a, Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.iter()
    }
}

/// Run-level counters that survive window resets
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunTotals {
    pub instances_seen: usize,
    pub instances_tested: usize,
    pub labeled_updates: usize,
    pub masked_updates: usize,
    pub build_time: Duration,
    pub test_time: Duration,
    pub update_time: Duration,
}

/// Buffers the current window and snapshots it at boundaries
#[derive(Debug)]
pub struct WindowAggregator {
    window: RunningResult,
    window_labeled: usize,
    totals: RunTotals,
    trace: PerformanceTrace,
}

impl WindowAggregator {
    pub fn new(kind: ResultKind, num_labels: usize, thresholds: ThresholdVector) -> Self {
        Self {
            window: RunningResult::new(kind, num_labels, thresholds),
            window_labeled: 0,
            totals: RunTotals::default(),
            trace: PerformanceTrace::new(),
        }
    }

    /// Buffer a prediction against the true (never masked) instance.
    ///
    /// Outputs beyond `L` are dropped (multi-target models may append
    /// per-target confidences).
    pub fn record(&mut self, mut prediction: Vec<f64>, truth: &Instance) {
        prediction.truncate(self.window.num_labels);
        self.window.add(prediction, truth.labels().to_vec());
        self.totals.instances_tested += 1;
    }

    pub fn add_build_time(&mut self, elapsed: Duration) {
        self.totals.build_time += elapsed;
    }

    pub fn add_test_time(&mut self, elapsed: Duration) {
        self.window.test_time += elapsed;
        self.totals.test_time += elapsed;
    }

    /// Account for one update call
    pub fn add_update(&mut self, elapsed: Duration, labeled: bool) {
        self.window.update_time += elapsed;
        self.totals.update_time += elapsed;
        self.totals.instances_seen += 1;
        if labeled {
            self.window_labeled += 1;
            self.totals.labeled_updates += 1;
        } else {
            self.totals.masked_updates += 1;
        }
    }

    /// Compute the window's statistics and freeze them into the trace.
    pub fn snapshot(&mut self, stats: &dyn StatsProvider, verbosity: u8) -> &Snapshot {
        let computed = stats.compute(&self.window, verbosity);
        let snapshot = Snapshot {
            window: self.trace.len() + 1,
            instances_seen: self.totals.instances_seen,
            window_instances: self.window.len(),
            window_labeled: self.window_labeled,
            window_test_time: self.window.test_time.as_secs_f64(),
            window_update_time: self.window.update_time.as_secs_f64(),
            test_time: self.totals.test_time.as_secs_f64(),
            build_time: (self.totals.build_time + self.totals.update_time).as_secs_f64(),
            thresholds: self.window.thresholds.expand(self.window.num_labels),
            stats: computed,
        };
        self.trace.push(snapshot);
        // just pushed
        &self.trace.snapshots[self.trace.len() - 1]
    }

    /// Clear window buffers; run-level totals and the trace are kept.
    pub fn reset(&mut self) {
        self.window.clear();
        self.window_labeled = 0;
    }

    /// The window buffered so far
    pub fn current(&self) -> &RunningResult {
        &self.window
    }

    pub fn thresholds(&self) -> &ThresholdVector {
        &self.window.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: ThresholdVector) {
        self.window.set_thresholds(thresholds);
    }

    pub fn totals(&self) -> &RunTotals {
        &self.totals
    }

    pub fn trace(&self) -> &PerformanceTrace {
        &self.trace
    }

    /// Give up the accumulator, keeping the trace and totals
    pub fn into_parts(self) -> (RunningResult, RunTotals, PerformanceTrace) {
        (self.window, self.totals, self.trace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::stats::{StandardStats, ACCURACY};

    fn agg() -> WindowAggregator {
        WindowAggregator::new(ResultKind::MultiLabel, 2, ThresholdVector::single(0.5))
    }

    #[test]
    fn test_snapshot_freezes_and_reset_keeps_totals() {
        let mut a = agg();
        let truth = Instance::binary(vec![0.0], &[true, false]);

        a.record(vec![0.9, 0.1], &truth);
        a.add_test_time(Duration::from_millis(5));
        a.add_update(Duration::from_millis(7), true);
        let snap = a.snapshot(&StandardStats, 1).clone();
        assert_eq!(snap.window, 1);
        assert_eq!(snap.window_instances, 1);
        assert_eq!(snap.window_labeled, 1);
        assert_eq!(snap.metric(ACCURACY), Some(1.0));
        assert_eq!(snap.thresholds, vec![0.5, 0.5]);

        a.reset();
        assert!(a.current().is_empty());
        assert_eq!(a.totals().instances_tested, 1);

        a.record(vec![0.1, 0.9], &truth);
        a.add_update(Duration::from_millis(1), false);
        let second = a.snapshot(&StandardStats, 1).clone();
        assert_eq!(second.window, 2);
        assert_eq!(second.instances_seen, 2);
        assert_eq!(second.window_labeled, 0);
        assert_eq!(second.metric(ACCURACY), Some(0.0));

        // the first snapshot is unaffected by later windows
        assert_eq!(a.trace().get(0), Some(&snap));
        assert_eq!(a.totals().masked_updates, 1);
    }

    #[test]
    fn test_record_truncates_extra_outputs() {
        let mut a = agg();
        a.record(vec![0.9, 0.1, 0.77, 0.66], &Instance::binary(vec![], &[true, false]));
        assert_eq!(a.current().predictions()[0].len(), 2);
    }

    #[test]
    fn test_trace_series() {
        let mut a = agg();
        let truth = Instance::binary(vec![], &[true, true]);
        for p in [0.9, 0.1] {
            a.record(vec![p, p], &truth);
            a.snapshot(&StandardStats, 1);
            a.reset();
        }
        assert_eq!(a.trace().series(ACCURACY), vec![Some(1.0), Some(0.0)]);
    }
}
