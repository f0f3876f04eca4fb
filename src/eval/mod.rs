//! Prequential evaluation of multi-label stream models
//!
//! - `schedule`: which instances have their labels revealed
//! - `thresholds`: decision thresholds and their per-window calibration
//! - `stats`: metrics computed from buffered predictions
//! - `window`: window accumulation and the performance trace
//! - `driver`: the streaming test-then-update loop
//! - `batch`: held-out evaluation without updates

pub mod batch;
pub mod driver;
pub mod error;
pub mod schedule;
pub mod stats;
pub mod thresholds;
pub mod window;

pub use batch::BatchHarness;
pub use driver::{DriverState, EvalReport, EvaluationDriver, ReportOrigin};
pub use error::{ConfigError, EvalError, EvalResult, ModelPhase, PartialRun};
pub use schedule::{is_labeled, SupervisionSchedule};
pub use stats::{MetricValue, StandardStats, Stats, StatsProvider};
pub use thresholds::{Calibrator, ThresholdMode, ThresholdSpec, ThresholdVector};
pub use window::{PerformanceTrace, ResultKind, RunningResult, Snapshot, WindowAggregator};
