//! Which stream instances have their labels revealed before the update step.
//!
//! The policy is deterministic in the instance index and the ratio `r`:
//! - `r < 0.5`: reveal index `i` iff `i mod round(1/r) == 0`
//! - `r >= 0.5`: withhold index `i` iff `i mod round(1/(1-r)) == 0`
//! - `r == 1`: reveal everything
//!
//! These formulas are kept exactly, including their rounding behaviour for
//! non-integer `1/r`, so that revealed fractions are reproducible.

use super::error::ConfigError;

/// Tolerance for `r * W >= 1`, so `0.05 * 20` passes despite float error
const RATIO_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stride {
    /// Every instance is labelled
    All,
    /// Label one in every `n`
    RevealEvery(usize),
    /// Withhold one in every `n`
    WithholdEvery(usize),
}

/// Supervision schedule for a fixed ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupervisionSchedule {
    ratio: f64,
    stride: Stride,
}

impl SupervisionSchedule {
    /// Validates that `ratio` lies in `(0, 1]`.
    pub fn new(ratio: f64) -> Result<Self, ConfigError> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(ConfigError::InvalidSupervision(ratio));
        }
        let stride = if ratio >= 1.0 {
            Stride::All
        } else if ratio < 0.5 {
            Stride::RevealEvery(stride_for(1.0 / ratio))
        } else {
            Stride::WithholdEvery(stride_for(1.0 / (1.0 - ratio)))
        };
        Ok(Self { ratio, stride })
    }

    /// Full supervision
    pub fn full() -> Self {
        Self {
            ratio: 1.0,
            stride: Stride::All,
        }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Whether instance `i` (0-based position in the remainder stream) is labelled.
    pub fn is_labeled(&self, i: usize) -> bool {
        match self.stride {
            Stride::All => true,
            Stride::RevealEvery(n) => i % n == 0,
            Stride::WithholdEvery(n) => i % n != 0,
        }
    }

    /// A window must contain at least one labelled instance: `r * W >= 1`.
    pub fn check_window(&self, window_size: usize) -> Result<(), ConfigError> {
        if self.ratio * window_size as f64 + RATIO_EPSILON < 1.0 {
            return Err(ConfigError::WindowTooSmall {
                ratio: self.ratio,
                window_size,
            });
        }
        Ok(())
    }

    /// Count labelled instances among indices `range`
    pub fn labeled_in(&self, range: std::ops::Range<usize>) -> usize {
        range.filter(|&i| self.is_labeled(i)).count()
    }
}

fn stride_for(inverse: f64) -> usize {
    // inverse >= 2 for every ratio that reaches here
    (inverse.round() as usize).max(1)
}

/// Stateless form of [`SupervisionSchedule::is_labeled`].
///
/// Ratios outside `(0, 1]` are treated as full supervision.
pub fn is_labeled(i: usize, ratio: f64) -> bool {
    SupervisionSchedule::new(ratio)
        .unwrap_or_else(|_| SupervisionSchedule::full())
        .is_labeled(i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_supervision_reveals_everything() {
        let s = SupervisionSchedule::new(1.0).unwrap();
        assert_eq!(s.labeled_in(0..1000), 1000);
        assert!(is_labeled(17, 1.0));
    }

    #[test]
    fn test_sparse_ratio_reveals_one_in_stride() {
        let s = SupervisionSchedule::new(0.05).unwrap();
        let labeled: Vec<usize> = (0..200).filter(|&i| s.is_labeled(i)).collect();
        assert_eq!(labeled.len(), 10);
        assert!(labeled.iter().all(|i| i % 20 == 0));
    }

    #[test]
    fn test_dense_ratio_withholds_one_in_stride() {
        // 1/(1-0.75) = 4: indices 0, 4, 8, .. are withheld
        let s = SupervisionSchedule::new(0.75).unwrap();
        assert!(!s.is_labeled(0));
        assert!(s.is_labeled(1));
        assert!(s.is_labeled(3));
        assert!(!s.is_labeled(4));
        assert_eq!(s.labeled_in(0..400), 300);
    }

    #[test]
    fn test_half_uses_withhold_branch() {
        // r = 0.5 → 1/(1-r) = 2 → every even index withheld
        let s = SupervisionSchedule::new(0.5).unwrap();
        assert!(!s.is_labeled(0));
        assert!(s.is_labeled(1));
        assert_eq!(s.labeled_in(0..100), 50);
    }

    #[test]
    fn test_non_integer_inverse_is_rounded() {
        // 1/0.3 = 3.33 → stride 3
        let s = SupervisionSchedule::new(0.3).unwrap();
        assert_eq!(s.labeled_in(0..30), 10);
        // 1/(1-0.7) = 3.33 → withhold every third
        let s = SupervisionSchedule::new(0.7).unwrap();
        assert_eq!(s.labeled_in(0..30), 20);
    }

    #[test]
    fn test_labeled_count_converges_to_ratio() {
        for &r in &[0.01, 0.1, 0.2, 0.25, 0.4] {
            let s = SupervisionSchedule::new(r).unwrap();
            let n = 10_000;
            let stride = (1.0 / r).round();
            let expected = n as f64 / stride;
            let got = s.labeled_in(0..n) as f64;
            assert!((got - expected).abs() <= 1.0, "r={r}: got {got}, expected {expected}");
        }
        for &r in &[0.5, 0.8, 0.9, 0.99] {
            let s = SupervisionSchedule::new(r).unwrap();
            let n = 10_000;
            let stride = (1.0 / (1.0 - r)).round();
            let expected = n as f64 / stride;
            let withheld = (n - s.labeled_in(0..n)) as f64;
            assert!((withheld - expected).abs() <= 1.0, "r={r}: withheld {withheld}, expected {expected}");
        }
    }

    #[test]
    fn test_deterministic() {
        let a = SupervisionSchedule::new(0.37).unwrap();
        let b = SupervisionSchedule::new(0.37).unwrap();
        assert!((0..500).all(|i| a.is_labeled(i) == b.is_labeled(i)));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(SupervisionSchedule::new(0.0).is_err());
        assert!(SupervisionSchedule::new(1.5).is_err());
        assert!(SupervisionSchedule::new(f64::NAN).is_err());
    }

    #[test]
    fn test_window_check() {
        let s = SupervisionSchedule::new(0.05).unwrap();
        assert!(s.check_window(20).is_ok());
        let s = SupervisionSchedule::new(0.1).unwrap();
        assert_eq!(
            s.check_window(5),
            Err(ConfigError::WindowTooSmall {
                ratio: 0.1,
                window_size: 5
            })
        );
    }
}
