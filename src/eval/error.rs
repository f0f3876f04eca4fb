//! Error types for the evaluation core
//!
//! Configuration problems are detected before any training happens.
//! Model failures abort the run and carry whatever was accumulated so far.
//! Degenerate calibration is not an error at all (see `thresholds`).

use super::window::PerformanceTrace;
use crate::classifier::ModelError;
use crate::dataset::DatasetError;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Fatal problems with the run configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("supervision ratio must lie in (0, 1], got {0}")]
    InvalidSupervision(f64),

    #[error("the ratio of labelled instances ({ratio}) is too small given the window size ({window_size})")]
    WindowTooSmall { ratio: f64, window_size: usize },

    #[error("at least 2 windows are required (one for initial training), got {0}")]
    TooFewWindows(usize),

    #[error("window size must be at least 1")]
    ZeroWindowSize,

    #[error("stream of {len} instances is too short for {required} (initial window plus at least one instance)")]
    StreamTooShort { len: usize, required: usize },

    #[error("invalid threshold option '{0}' (expected a number in [0, 1], PCut1 or PCutL)")]
    InvalidThreshold(String),

    #[error("{which} data is not compatible with the header the model was trained on: {detail}")]
    HeaderMismatch { which: &'static str, detail: String },

    #[error("options require a prebuilt model, but none is available")]
    PrebuiltModelRequired,

    #[error("no training or test data supplied")]
    NoData,

    #[error("model '{0}' does not support incremental updates; only held-out evaluation is possible")]
    NotIncremental(String),

    #[error("model '{0}' declares neither multi-label nor multi-target output")]
    UnknownOutput(String),

    #[error("window_size and windows are mutually exclusive")]
    ConflictingWindowPolicy,
}

/// Which model operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPhase {
    Build,
    Test,
    Update,
}

impl fmt::Display for ModelPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelPhase::Build => write!(f, "build"),
            ModelPhase::Test => write!(f, "test"),
            ModelPhase::Update => write!(f, "update"),
        }
    }
}

/// What had been accumulated when a run failed, for post-mortem inspection
#[derive(Debug, Clone, Default)]
pub struct PartialRun {
    /// Info entries assembled before the failure (model, options, dataset)
    pub info: BTreeMap<String, String>,
    /// Snapshots frozen before the failure; not authoritative
    pub trace: PerformanceTrace,
}

/// Errors returned by an evaluation run
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("model {phase} failed{}: {source}", .index.map(|i| format!(" at instance {i}")).unwrap_or_default())]
    Model {
        phase: ModelPhase,
        /// Position of the offending instance in the stream it came from
        index: Option<usize>,
        #[source]
        source: ModelError,
        partial: Box<PartialRun>,
    },

    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

impl EvalError {
    pub(crate) fn model(
        phase: ModelPhase,
        index: Option<usize>,
        source: ModelError,
        partial: PartialRun,
    ) -> Self {
        EvalError::Model {
            phase,
            index,
            source,
            partial: Box::new(partial),
        }
    }

    /// Snapshots accumulated before a model failure, if any
    pub fn partial_trace(&self) -> Option<&PerformanceTrace> {
        match self {
            EvalError::Model { partial, .. } => Some(&partial.trace),
            _ => None,
        }
    }

    pub fn is_config(&self) -> bool {
        matches!(self, EvalError::Config(_))
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_mentions_index() {
        let err = EvalError::Model {
            phase: ModelPhase::Update,
            index: Some(42),
            source: ModelError::Update("boom".into()),
            partial: Box::default(),
        };
        let msg = err.to_string();
        assert!(msg.contains("update"));
        assert!(msg.contains("instance 42"));
        assert!(msg.contains("boom"));
        assert!(err.partial_trace().unwrap().is_empty());
    }

    #[test]
    fn test_config_error_converts() {
        let err: EvalError = ConfigError::TooFewWindows(1).into();
        assert!(err.is_config());
        assert!(err.partial_trace().is_none());
    }
}
