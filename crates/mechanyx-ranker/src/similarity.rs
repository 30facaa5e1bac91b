//! Vector similarity functions.
//!
//! Cosine compares direction only, so a barely-activated query scores the
//! same as a saturated one. The magnitude-weighted fit divides by the
//! reference norm alone and keeps that difference.

use mechanyx_common::MechanismVector;
use serde::{Deserialize, Serialize};

/// Cosine similarity; `0.0` when either vector has zero norm.
///
/// The reference is conformed to the query's length first.
pub fn cosine(query: &MechanismVector, reference: &MechanismVector) -> f64 {
    let reference = reference.conform_to(query.len());
    let (qn, rn) = (query.norm(), reference.norm());
    if qn == 0.0 || rn == 0.0 {
        return 0.0;
    }
    query.dot(&reference) / (qn * rn)
}

/// `clamp(q · r / ‖r‖, 0, 1)`; `0.0` when `‖r‖ = 0`.
pub fn weighted_fit(query: &MechanismVector, reference: &MechanismVector) -> f64 {
    let reference = reference.conform_to(query.len());
    let rn = reference.norm();
    if rn == 0.0 {
        return 0.0;
    }
    (query.dot(&reference) / rn).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cosine,
    #[default]
    WeightedFit,
}

impl Metric {
    pub fn score(&self, query: &MechanismVector, reference: &MechanismVector) -> f64 {
        match self {
            Metric::Cosine => cosine(query, reference),
            Metric::WeightedFit => weighted_fit(query, reference),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::WeightedFit => "weighted_fit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(xs: &[f64]) -> MechanismVector {
        MechanismVector::new(xs.to_vec())
    }

    #[test]
    fn test_cosine_symmetric_and_self_one() {
        let a = v(&[0.3, 0.1, 0.0, 0.5, 0.0, 0.2, 0.0]);
        let b = v(&[0.9, 0.0, 0.4, 0.0, 0.1, 0.0, 0.0]);
        assert!((cosine(&a, &b) - cosine(&b, &a)).abs() < 1e-12);
        assert!((cosine(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_norm_is_zero() {
        let z = v(&[0.0; 7]);
        let b = v(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(cosine(&z, &b), 0.0);
        assert_eq!(cosine(&b, &z), 0.0);
        assert_eq!(weighted_fit(&z, &b), 0.0);
        assert_eq!(weighted_fit(&b, &z), 0.0);
    }

    #[test]
    fn test_weighted_fit_keeps_magnitude_cosine_does_not() {
        let trial = v(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let low = v(&[0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let high = v(&[0.88, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        assert!((weighted_fit(&low, &trial) - 0.1).abs() < 1e-12);
        assert!((weighted_fit(&high, &trial) - 0.88).abs() < 1e-12);
        assert!((cosine(&low, &trial) - 1.0).abs() < 1e-12);
        assert!((cosine(&high, &trial) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_fit_monotone_along_reference() {
        let r = v(&[0.95, 0.05, 0.0, 0.0, 0.0, 0.0]);
        let mut prev = -1.0;
        for k in [0.0, 0.1, 0.3, 0.6, 0.9] {
            let q = v(&[0.95 * k, 0.05 * k, 0.0, 0.0, 0.0, 0.0]);
            let fit = weighted_fit(&q, &r);
            assert!(fit >= prev);
            prev = fit;
        }
    }

    #[test]
    fn test_reference_conformed_to_query_length() {
        let q6 = v(&[0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let r7 = v(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        // trailing axis dropped before the norm is taken
        assert!((weighted_fit(&q6, &r7) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_fit_is_clamped() {
        let q = v(&[2.0, 2.0]);
        let r = v(&[1.0, 1.0]);
        assert_eq!(weighted_fit(&q, &r), 1.0);
    }
}
