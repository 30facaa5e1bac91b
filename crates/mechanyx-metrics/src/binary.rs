//! Binary diagnostic accuracy with Wilson score intervals.

use serde::{Deserialize, Serialize};

/// Two-sided 95% normal quantile.
pub const Z_95: f64 = 1.959_963_984_540_054;

/// 2×2 counts against a reference standard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryCounts {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
}

impl BinaryCounts {
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (bool, bool)>,
    {
        let mut c = Self::default();
        for (truth, pred) in pairs {
            match (truth, pred) {
                (true, true) => c.tp += 1,
                (false, true) => c.fp += 1,
                (false, false) => c.tn += 1,
                (true, false) => c.fn_ += 1,
            }
        }
        c
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }
}

/// A proportion with its confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proportion {
    pub successes: usize,
    pub n: usize,
    pub value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
}

impl Proportion {
    /// `None` when `n == 0`.
    pub fn wilson(successes: usize, n: usize, z: f64) -> Option<Self> {
        let (ci_low, ci_high) = wilson_interval(successes, n, z)?;
        Some(Self { successes, n, value: successes as f64 / n as f64, ci_low, ci_high })
    }
}

/// Wilson score interval, clamped to `[0, 1]`.
pub fn wilson_interval(successes: usize, n: usize, z: f64) -> Option<(f64, f64)> {
    if n == 0 {
        return None;
    }
    let n_f = n as f64;
    let p = successes as f64 / n_f;
    let z2 = z * z;
    let denom = 1.0 + z2 / n_f;
    let center = (p + z2 / (2.0 * n_f)) / denom;
    let offset = z * (p * (1.0 - p) / n_f + z2 / (4.0 * n_f * n_f)).sqrt() / denom;
    Some(((center - offset).max(0.0), (center + offset).min(1.0)))
}

/// Sensitivity, specificity, PPV and NPV. Each is `None` (JSON `null`)
/// when its denominator is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub counts: BinaryCounts,
    pub sensitivity: Option<Proportion>,
    pub specificity: Option<Proportion>,
    pub ppv: Option<Proportion>,
    pub npv: Option<Proportion>,
}

impl Diagnostics {
    pub fn compute(counts: BinaryCounts, z: f64) -> Self {
        let BinaryCounts { tp, fp, tn, fn_ } = counts;
        Self {
            counts,
            sensitivity: Proportion::wilson(tp, tp + fn_, z),
            specificity: Proportion::wilson(tn, tn + fp, z),
            ppv: Proportion::wilson(tp, tp + fp, z),
            npv: Proportion::wilson(tn, tn + fn_, z),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_formulas() {
        let d = Diagnostics::compute(BinaryCounts { tp: 8, fp: 1, tn: 9, fn_: 2 }, Z_95);
        assert_eq!(d.sensitivity.unwrap().value, 0.8);
        assert_eq!(d.specificity.unwrap().value, 0.9);
        assert!((d.ppv.unwrap().value - 8.0 / 9.0).abs() < 1e-12);
        assert!((d.npv.unwrap().value - 9.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_denominator_is_none() {
        let d = Diagnostics::compute(BinaryCounts { tp: 0, fp: 0, tn: 5, fn_: 0 }, Z_95);
        assert_eq!(d.sensitivity, None);
        assert_eq!(d.ppv, None);
        assert_eq!(d.specificity.unwrap().value, 1.0);
        let json = serde_json::to_value(&d).unwrap();
        assert!(json["sensitivity"].is_null());
        assert_eq!(json["counts"]["fn"], 0);
    }

    #[test]
    fn test_wilson_known_value() {
        // 8/10 at 95%: (0.4902, 0.9433)
        let (lo, hi) = wilson_interval(8, 10, Z_95).unwrap();
        assert!((lo - 0.4902).abs() < 1e-3, "{lo}");
        assert!((hi - 0.9433).abs() < 1e-3, "{hi}");
    }

    #[test]
    fn test_wilson_edges_stay_in_unit_interval() {
        let (lo, hi) = wilson_interval(0, 7, Z_95).unwrap();
        assert!(lo.abs() < 1e-12);
        assert!(hi > 0.0 && hi < 1.0);
        let (lo, hi) = wilson_interval(7, 7, Z_95).unwrap();
        assert!(lo < 1.0);
        assert!((hi - 1.0).abs() < 1e-12);
        assert_eq!(wilson_interval(0, 0, Z_95), None);
    }

    #[test]
    fn test_counts_from_pairs() {
        let c = BinaryCounts::from_pairs([(true, true), (true, false), (false, false), (false, true)]);
        assert_eq!(c, BinaryCounts { tp: 1, fp: 1, tn: 1, fn_: 1 });
        assert_eq!(c.total(), 4);
    }
}
