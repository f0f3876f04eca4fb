//! Statistics computed over a window of predictions
//!
//! The evaluation core only needs [`StatsProvider`]; [`StandardStats`] is the
//! default implementation with the usual multi-label and multi-target metrics.
//! The verbosity level controls how many metrics are produced:
//!
//! | level | adds |
//! |-------|------|
//! | 1 | Accuracy, Exact match, Hamming score |
//! | 2 | Hamming loss, F1 (micro averaged), F1 (macro averaged by label) |
//! | 3 | N, L, Label cardinality (true/predicted) |
//! | 5 | per-label accuracy vector |

use super::window::{ResultKind, RunningResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const ACCURACY: &str = "Accuracy";
pub const EXACT_MATCH: &str = "Exact match";
pub const HAMMING_SCORE: &str = "Hamming score";
pub const HAMMING_LOSS: &str = "Hamming loss";
pub const F1_MICRO: &str = "F1 (micro averaged)";
pub const F1_MACRO: &str = "F1 (macro averaged by label)";
pub const LABEL_CARDINALITY_TRUE: &str = "Label cardinality (true)";
pub const LABEL_CARDINALITY_PRED: &str = "Label cardinality (predicted)";
pub const ACCURACY_PER_LABEL: &str = "Accuracy (per label)";

/// The headline metrics shown per window
pub const HEADLINE: [&str; 3] = [ACCURACY, EXACT_MATCH, HAMMING_SCORE];

/// A single metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Vector(Vec<f64>),
    Text(String),
}

impl MetricValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Number(v)
    }
}

impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(v) => write!(f, "{v:.4}"),
            MetricValue::Vector(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| format!("{v:.3}")).collect();
                write!(f, "[{}]", parts.join(" "))
            }
            MetricValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Metric name → value, ordered by name
pub type Stats = BTreeMap<String, MetricValue>;

/// Computes named metrics from buffered predictions and true labels
pub trait StatsProvider {
    fn compute(&self, result: &RunningResult, verbosity: u8) -> Stats;
}

/// Default metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardStats;

#[derive(Default)]
struct Counts {
    tp: usize,
    fp: usize,
    fn_: usize,
}

impl Counts {
    fn f1(&self) -> f64 {
        let denom = 2 * self.tp + self.fp + self.fn_;
        if denom == 0 {
            1.0
        } else {
            2.0 * self.tp as f64 / denom as f64
        }
    }
}

impl StandardStats {
    fn multi_label(result: &RunningResult, verbosity: u8) -> Stats {
        let l = result.num_labels();
        let thresholds = result.thresholds();
        let mut jaccard_sum = 0.0;
        let mut exact = 0usize;
        let mut slots_correct = 0usize;
        let mut slots_known = 0usize;
        let mut per_label_correct = vec![0usize; l];
        let mut per_label_known = vec![0usize; l];
        let mut per_label = (0..l).map(|_| Counts::default()).collect::<Vec<_>>();
        let mut micro = Counts::default();
        let mut true_card = 0usize;
        let mut pred_card = 0usize;

        for (pred, actual) in result.predictions().iter().zip(result.actuals()) {
            let yhat = thresholds.binarize(&pred[..l.min(pred.len())]);
            let mut inter = 0usize;
            let mut union = 0usize;
            let mut all_match = true;

            for j in 0..l {
                let predicted = yhat.get(j).copied().unwrap_or(false);
                if predicted {
                    pred_card += 1;
                }
                let Some(truth) = actual.get(j).copied().flatten() else {
                    continue;
                };
                let truth = truth >= crate::models::POSITIVE_CUTOFF;
                slots_known += 1;
                per_label_known[j] += 1;
                if truth {
                    true_card += 1;
                }
                if truth == predicted {
                    slots_correct += 1;
                    per_label_correct[j] += 1;
                } else {
                    all_match = false;
                }
                if truth || predicted {
                    union += 1;
                }
                match (truth, predicted) {
                    (true, true) => {
                        inter += 1;
                        per_label[j].tp += 1;
                        micro.tp += 1;
                    }
                    (false, true) => {
                        per_label[j].fp += 1;
                        micro.fp += 1;
                    }
                    (true, false) => {
                        per_label[j].fn_ += 1;
                        micro.fn_ += 1;
                    }
                    (false, false) => {}
                }
            }

            jaccard_sum += if union == 0 { 1.0 } else { inter as f64 / union as f64 };
            if all_match {
                exact += 1;
            }
        }

        let n = result.len();
        let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };
        let hamming_score = ratio(slots_correct, slots_known);

        let mut stats = Stats::new();
        stats.insert(ACCURACY.into(), ratio_f(jaccard_sum, n).into());
        stats.insert(EXACT_MATCH.into(), ratio(exact, n).into());
        stats.insert(HAMMING_SCORE.into(), hamming_score.into());

        if verbosity >= 2 {
            stats.insert(HAMMING_LOSS.into(), (1.0 - hamming_score).into());
            stats.insert(F1_MICRO.into(), micro.f1().into());
            let macro_f1 = if l == 0 {
                0.0
            } else {
                per_label.iter().map(Counts::f1).sum::<f64>() / l as f64
            };
            stats.insert(F1_MACRO.into(), macro_f1.into());
        }
        if verbosity >= 3 {
            stats.insert("N".into(), (n as f64).into());
            stats.insert("L".into(), (l as f64).into());
            stats.insert(LABEL_CARDINALITY_TRUE.into(), ratio(true_card, n).into());
            stats.insert(LABEL_CARDINALITY_PRED.into(), ratio(pred_card, n).into());
        }
        if verbosity >= 5 {
            let per: Vec<f64> = per_label_correct
                .iter()
                .zip(&per_label_known)
                .map(|(&c, &k)| ratio(c, k))
                .collect();
            stats.insert(ACCURACY_PER_LABEL.into(), MetricValue::Vector(per));
        }
        stats
    }

    fn multi_target(result: &RunningResult, verbosity: u8) -> Stats {
        let l = result.num_labels();
        let mut exact = 0usize;
        let mut correct = 0usize;
        let mut known = 0usize;
        let mut per_target_correct = vec![0usize; l];
        let mut per_target_known = vec![0usize; l];

        for (pred, actual) in result.predictions().iter().zip(result.actuals()) {
            let mut all_match = true;
            for j in 0..l {
                let Some(truth) = actual.get(j).copied().flatten() else {
                    continue;
                };
                known += 1;
                per_target_known[j] += 1;
                let guess = pred.get(j).copied().unwrap_or(f64::NAN).round();
                if guess == truth.round() {
                    correct += 1;
                    per_target_correct[j] += 1;
                } else {
                    all_match = false;
                }
            }
            if all_match {
                exact += 1;
            }
        }

        let n = result.len();
        let ratio = |a: usize, b: usize| if b == 0 { 0.0 } else { a as f64 / b as f64 };
        let hamming_score = ratio(correct, known);

        let mut stats = Stats::new();
        stats.insert(ACCURACY.into(), hamming_score.into());
        stats.insert(EXACT_MATCH.into(), ratio(exact, n).into());
        stats.insert(HAMMING_SCORE.into(), hamming_score.into());
        if verbosity >= 2 {
            stats.insert(HAMMING_LOSS.into(), (1.0 - hamming_score).into());
        }
        if verbosity >= 3 {
            stats.insert("N".into(), (n as f64).into());
            stats.insert("L".into(), (l as f64).into());
        }
        if verbosity >= 5 {
            let per: Vec<f64> = per_target_correct
                .iter()
                .zip(&per_target_known)
                .map(|(&c, &k)| ratio(c, k))
                .collect();
            stats.insert(ACCURACY_PER_LABEL.into(), MetricValue::Vector(per));
        }
        stats
    }
}

fn ratio_f(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

impl StatsProvider for StandardStats {
    fn compute(&self, result: &RunningResult, verbosity: u8) -> Stats {
        match result.kind() {
            ResultKind::MultiLabel => Self::multi_label(result, verbosity),
            ResultKind::MultiTarget => Self::multi_target(result, verbosity),
        }
    }
}
