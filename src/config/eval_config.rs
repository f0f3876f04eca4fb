//! Evaluation options
//!
//! Either a window count (`windows`) or a fixed window size (`window_size`)
//! selects the windowing policy; setting both is an error.

use crate::eval::error::ConfigError;
use crate::eval::schedule::SupervisionSchedule;
use crate::eval::thresholds::ThresholdSpec;
use serde::{Deserialize, Serialize};

/// Default number of windows (the first one trains the initial model)
pub const DEFAULT_WINDOWS: usize = 10;

/// Default verbosity for the statistics collaborator
pub const DEFAULT_VERBOSITY: u8 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Number of equal windows the stream is divided into
    pub windows: Option<usize>,

    /// Fixed window size (prequential sampling)
    pub window_size: Option<usize>,

    /// Fraction of remainder instances whose labels are revealed, in (0, 1]
    pub supervision: f64,

    /// "0.5"-style number, "PCut1" or "PCutL"
    pub threshold: String,

    /// Which metrics are computed (higher is more)
    pub verbosity: u8,

    /// When false the stream is only used for training
    pub evaluate: bool,

    /// Recalibrate thresholds after every fixed-count window
    pub calibrate: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            windows: None,
            window_size: None,
            supervision: 1.0,
            threshold: "0.5".to_string(),
            verbosity: DEFAULT_VERBOSITY,
            evaluate: true,
            calibrate: true,
        }
    }
}

/// When window boundaries fall
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// Stream split into `windows` windows; the first trains the model
    FixedCount { windows: usize },
    /// Initial window of `size`, then a sample every `size` instances
    FixedSize { size: usize },
}

impl WindowPolicy {
    /// Size of the initial training window for a stream of `len` instances
    pub fn initial_window(&self, len: usize) -> usize {
        match *self {
            WindowPolicy::FixedCount { windows } => len / windows.max(1),
            WindowPolicy::FixedSize { size } => size,
        }
    }

    /// Snapshots a complete run over `len` instances produces
    pub fn expected_snapshots(&self, len: usize) -> usize {
        match *self {
            WindowPolicy::FixedCount { windows } => windows.saturating_sub(1),
            WindowPolicy::FixedSize { size } if size > 0 => len.saturating_sub(size) / size,
            WindowPolicy::FixedSize { .. } => 0,
        }
    }

    /// Check the policy against a stream of `len` instances.
    ///
    /// Returns the initial window size.
    pub fn check_stream(&self, len: usize) -> Result<usize, ConfigError> {
        let w = self.initial_window(len);
        if w == 0 || len <= w {
            let required = match *self {
                WindowPolicy::FixedCount { windows } => windows,
                WindowPolicy::FixedSize { size } => size + 1,
            };
            return Err(ConfigError::StreamTooShort { len, required });
        }
        Ok(w)
    }
}

impl EvalConfig {
    /// Windowing policy selected by `windows` / `window_size`
    pub fn window_policy(&self) -> Result<WindowPolicy, ConfigError> {
        match (self.windows, self.window_size) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingWindowPolicy),
            (_, Some(0)) => Err(ConfigError::ZeroWindowSize),
            (_, Some(size)) => Ok(WindowPolicy::FixedSize { size }),
            (Some(windows), None) if windows < 2 => Err(ConfigError::TooFewWindows(windows)),
            (windows, None) => Ok(WindowPolicy::FixedCount {
                windows: windows.unwrap_or(DEFAULT_WINDOWS),
            }),
        }
    }

    pub fn threshold_spec(&self) -> Result<ThresholdSpec, ConfigError> {
        self.threshold.parse()
    }

    pub fn schedule(&self) -> Result<SupervisionSchedule, ConfigError> {
        SupervisionSchedule::new(self.supervision)
    }

    /// Checks that do not depend on the data
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.window_policy()?;
        self.threshold_spec()?;
        self.schedule()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = EvalConfig::default();
        assert_eq!(c.window_policy().unwrap(), WindowPolicy::FixedCount { windows: 10 });
        assert_eq!(c.supervision, 1.0);
        assert_eq!(c.threshold, "0.5");
        assert_eq!(c.verbosity, 3);
        assert!(c.evaluate && c.calibrate);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_policy_selection() {
        let c = EvalConfig {
            window_size: Some(20),
            ..Default::default()
        };
        assert_eq!(c.window_policy().unwrap(), WindowPolicy::FixedSize { size: 20 });

        let c = EvalConfig {
            windows: Some(5),
            window_size: Some(20),
            ..Default::default()
        };
        assert_eq!(c.window_policy(), Err(ConfigError::ConflictingWindowPolicy));

        let c = EvalConfig {
            windows: Some(1),
            ..Default::default()
        };
        assert_eq!(c.window_policy(), Err(ConfigError::TooFewWindows(1)));
    }

    #[test]
    fn test_initial_window_and_snapshot_count() {
        let p = WindowPolicy::FixedCount { windows: 10 };
        assert_eq!(p.initial_window(100), 10);
        assert_eq!(p.expected_snapshots(100), 9);
        assert_eq!(p.check_stream(100), Ok(10));
        assert!(p.check_stream(9).is_err());

        let p = WindowPolicy::FixedSize { size: 20 };
        assert_eq!(p.initial_window(220), 20);
        assert_eq!(p.expected_snapshots(220), 10);
        assert_eq!(
            p.check_stream(20),
            Err(ConfigError::StreamTooShort { len: 20, required: 21 })
        );
    }

    #[test]
    fn test_bad_values_rejected() {
        let c = EvalConfig {
            supervision: 0.0,
            ..Default::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::InvalidSupervision(0.0)));

        let c = EvalConfig {
            threshold: "maybe".into(),
            ..Default::default()
        };
        assert_eq!(c.validate(), Err(ConfigError::InvalidThreshold("maybe".into())));
    }

    #[test]
    fn test_toml_partial() {
        let c: EvalConfig = toml::from_str("window_size = 50\nsupervision = 0.25\nthreshold = \"PCutL\"").unwrap();
        assert_eq!(c.window_size, Some(50));
        assert_eq!(c.windows, None);
        assert_eq!(c.supervision, 0.25);
        assert_eq!(c.verbosity, DEFAULT_VERBOSITY);
    }
}
