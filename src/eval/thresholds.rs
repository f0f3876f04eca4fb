//! Decision thresholds and their per-window calibration
//!
//! Thresholds only binarise probabilistic outputs for reporting. They are
//! never handed back to the model.
//!
//! Calibration is rank based ("PCut"): pick the cut so the number of scores
//! above it matches what the window's ground truth says it should be.
//! - `PCut1`: one threshold for all labels, matched to the label cardinality
//! - `PCutL`: one threshold per label, matched to that label's positive rate
//!
//! A degenerate window (nothing or everything positive) yields `None` and the
//! previous threshold is kept.

use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Threshold used before any calibration has happened
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Lowest threshold calibration will produce for a non-degenerate window
const MIN_THRESHOLD: f64 = 0.00001;

/// Single scalar for every label, or one per label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdMode {
    Single,
    PerLabel,
}

/// Parsed threshold option: `"0.5"`-style numbers, `"PCut1"` or `"PCutL"`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSpec {
    pub mode: ThresholdMode,
    pub initial: f64,
    /// True when the option was a literal number rather than a mode name
    pub numeric: bool,
}

impl Default for ThresholdSpec {
    fn default() -> Self {
        Self {
            mode: ThresholdMode::Single,
            initial: DEFAULT_THRESHOLD,
            numeric: true,
        }
    }
}

impl FromStr for ThresholdSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            "PCut1" | "pcut1" | "single" => Ok(Self {
                mode: ThresholdMode::Single,
                initial: DEFAULT_THRESHOLD,
                numeric: false,
            }),
            "PCutL" | "pcutl" | "per-label" => Ok(Self {
                mode: ThresholdMode::PerLabel,
                initial: DEFAULT_THRESHOLD,
                numeric: false,
            }),
            _ => match trimmed.parse::<f64>() {
                Ok(t) if (0.0..=1.0).contains(&t) => Ok(Self {
                    mode: ThresholdMode::Single,
                    initial: t,
                    numeric: true,
                }),
                _ => Err(ConfigError::InvalidThreshold(s.to_string())),
            },
        }
    }
}

/// Current decision threshold(s)
///
/// In single mode `values` holds exactly one entry that is broadcast to
/// every label; in per-label mode it holds exactly `L` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdVector {
    mode: ThresholdMode,
    values: Vec<f64>,
}

impl ThresholdVector {
    pub fn single(value: f64) -> Self {
        Self {
            mode: ThresholdMode::Single,
            values: vec![value],
        }
    }

    pub fn per_label(values: Vec<f64>) -> Self {
        Self {
            mode: ThresholdMode::PerLabel,
            values,
        }
    }

    /// Initial vector for `num_labels` labels
    pub fn initial(spec: &ThresholdSpec, num_labels: usize) -> Self {
        match spec.mode {
            ThresholdMode::Single => Self::single(spec.initial),
            ThresholdMode::PerLabel => Self::per_label(vec![spec.initial; num_labels]),
        }
    }

    pub fn mode(&self) -> ThresholdMode {
        self.mode
    }

    /// Stored values (1 in single mode, `L` in per-label mode)
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Threshold applied to label `j`
    pub fn get(&self, j: usize) -> f64 {
        match self.mode {
            ThresholdMode::Single => self.values.first().copied().unwrap_or(DEFAULT_THRESHOLD),
            ThresholdMode::PerLabel => self.values.get(j).copied().unwrap_or(DEFAULT_THRESHOLD),
        }
    }

    /// One threshold per label
    pub fn expand(&self, num_labels: usize) -> Vec<f64> {
        (0..num_labels).map(|j| self.get(j)).collect()
    }

    /// Binarise a probability vector
    pub fn binarize(&self, scores: &[f64]) -> Vec<bool> {
        scores
            .iter()
            .enumerate()
            .map(|(j, &p)| p >= self.get(j))
            .collect()
    }
}

impl fmt::Display for ThresholdVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|t| format!("{t:.4}")).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Threshold that leaves exactly `k` of `scores` at or above it.
///
/// `None` when `k == 0` or `k >= scores.len()` (no cut can separate the
/// scores) or when the cut is not finite: the window is degenerate.
fn pcut(mut scores: Vec<f64>, k: usize) -> Option<f64> {
    if k == 0 || k >= scores.len() {
        return None;
    }
    scores.sort_by(|a, b| b.total_cmp(a));
    let t = (scores[k - 1] + scores[k]) / 2.0;
    // NaN survives clamp
    if !t.is_finite() {
        return None;
    }
    Some(t.clamp(MIN_THRESHOLD, 1.0))
}

/// One threshold for every label, matched to `cardinality` (mean positives per instance).
pub fn calibrate_single(predictions: &[Vec<f64>], cardinality: f64) -> Option<f64> {
    if predictions.is_empty() || !cardinality.is_finite() {
        return None;
    }
    let n = predictions.len();
    let k = (cardinality * n as f64).round() as usize;
    let scores: Vec<f64> = predictions.iter().flatten().copied().collect();
    pcut(scores, k)
}

/// One threshold per label column, matched to each label's positive `rates`.
///
/// Returns exactly `rates.len()` entries; `None` marks a degenerate column.
pub fn calibrate_per_label(predictions: &[Vec<f64>], rates: &[f64]) -> Vec<Option<f64>> {
    let n = predictions.len();
    rates
        .iter()
        .enumerate()
        .map(|(j, &rate)| {
            if n == 0 || !rate.is_finite() {
                return None;
            }
            let column: Vec<f64> = predictions
                .iter()
                .map(|p| p.get(j).copied().unwrap_or(0.0))
                .collect();
            let k = (rate * n as f64).round() as usize;
            pcut(column, k)
        })
        .collect()
}

/// Mean number of known positive labels per instance
pub fn label_cardinality(actuals: &[Vec<Option<f64>>]) -> f64 {
    if actuals.is_empty() {
        return f64::NAN;
    }
    let positives: usize = actuals
        .iter()
        .map(|y| y.iter().flatten().filter(|&&v| v >= crate::models::POSITIVE_CUTOFF).count())
        .sum();
    positives as f64 / actuals.len() as f64
}

/// Fraction of known values that are positive, per label; NaN where nothing is known
pub fn label_rates(actuals: &[Vec<Option<f64>>], num_labels: usize) -> Vec<f64> {
    let mut positives = vec![0usize; num_labels];
    let mut known = vec![0usize; num_labels];
    for y in actuals {
        for (j, v) in y.iter().take(num_labels).enumerate() {
            if let Some(v) = v {
                known[j] += 1;
                if *v >= crate::models::POSITIVE_CUTOFF {
                    positives[j] += 1;
                }
            }
        }
    }
    positives
        .iter()
        .zip(&known)
        .map(|(&p, &n)| if n == 0 { f64::NAN } else { p as f64 / n as f64 })
        .collect()
}

/// Produces the next window's thresholds from the window just closed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibrator {
    mode: ThresholdMode,
}

impl Calibrator {
    pub fn new(mode: ThresholdMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ThresholdMode {
        self.mode
    }

    /// Calibrate from one window's predictions and true labels.
    ///
    /// Degenerate results fall back to `previous` (per label in per-label mode).
    pub fn calibrate(
        &self,
        predictions: &[Vec<f64>],
        actuals: &[Vec<Option<f64>>],
        previous: &ThresholdVector,
    ) -> ThresholdVector {
        match self.mode {
            ThresholdMode::Single => {
                let cardinality = label_cardinality(actuals);
                match calibrate_single(predictions, cardinality) {
                    Some(t) => ThresholdVector::single(t),
                    None => {
                        tracing::debug!(
                            "degenerate window (cardinality {:.3}), keeping threshold {}",
                            cardinality,
                            previous
                        );
                        ThresholdVector::single(previous.get(0))
                    }
                }
            }
            ThresholdMode::PerLabel => {
                let num_labels = actuals
                    .first()
                    .map(Vec::len)
                    .or_else(|| predictions.first().map(Vec::len))
                    .unwrap_or_else(|| previous.values().len());
                let rates = label_rates(actuals, num_labels);
                let values = calibrate_per_label(predictions, &rates)
                    .into_iter()
                    .enumerate()
                    .map(|(j, t)| {
                        t.unwrap_or_else(|| {
                            tracing::debug!("degenerate label {} (rate {:.3}), keeping {:.4}", j, rates[j], previous.get(j));
                            previous.get(j)
                        })
                    })
                    .collect();
                ThresholdVector::per_label(values)
            }
        }
    }
}
