//! Grid-search threshold tuning on training predictions.
//!
//! Maximises macro-F1 (strict improvement, so the lowest threshold wins
//! ties), optionally under a ceiling on the PARP false-positive rate. When
//! no grid point meets the ceiling the best unconstrained point is still
//! reported, flagged with `constraint_satisfied = false`.

use mechanyx_common::DrugClass;
use mechanyx_metrics::{accuracy, macro_f1, parp_false_positive_rate};
use mechanyx_ranker::{predict_from_scores, ClassScores};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::softmax::SoftmaxModel;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPoint {
    pub threshold: f64,
    pub macro_f1: f64,
    pub parp_fpr: f64,
    pub accuracy: f64,
}

impl ThresholdPoint {
    fn initial() -> Self {
        Self { threshold: 0.0, macro_f1: -1.0, parp_fpr: 1.0, accuracy: 0.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningResult {
    /// Threshold to apply: the constrained optimum, or the unconstrained
    /// one when the ceiling could not be met.
    pub chosen: ThresholdPoint,
    pub max_parp_fpr: Option<f64>,
    pub constraint_satisfied: bool,
    pub best_unconstrained: ThresholdPoint,
    pub grid_size: usize,
}

/// Evaluate `predict` at every grid point against `truth`.
pub fn tune<F>(truth: &[DrugClass], grid: &[f64], max_parp_fpr: Option<f64>, predict: F) -> TuningResult
where
    F: Fn(f64) -> Vec<DrugClass>,
{
    let mut best = ThresholdPoint::initial();
    let mut best_constrained: Option<ThresholdPoint> = None;

    for &thr in grid {
        let pred = predict(thr);
        let point = ThresholdPoint {
            threshold: thr,
            macro_f1: macro_f1(truth, &pred),
            parp_fpr: parp_false_positive_rate(truth, &pred),
            accuracy: accuracy(truth, &pred),
        };
        if point.macro_f1 > best.macro_f1 {
            best = point;
        }
        let within = max_parp_fpr.map_or(true, |cap| point.parp_fpr <= cap);
        if within && best_constrained.map_or(true, |b| point.macro_f1 > b.macro_f1) {
            best_constrained = Some(point);
        }
    }

    let constraint_satisfied = best_constrained.is_some();
    if !constraint_satisfied {
        warn!(max_parp_fpr, "No threshold meets the PARP FPR ceiling; reporting the unconstrained optimum");
    }
    TuningResult {
        chosen: best_constrained.unwrap_or(best),
        max_parp_fpr,
        constraint_satisfied,
        best_unconstrained: best,
        grid_size: grid.len(),
    }
}

/// Tune the NONE threshold applied to per-class scores.
pub fn tune_none_threshold(
    truth: &[DrugClass],
    scores: &[ClassScores],
    grid: &[f64],
    max_parp_fpr: Option<f64>,
) -> TuningResult {
    tune(truth, grid, max_parp_fpr, |thr| {
        scores.iter().map(|s| predict_from_scores(s, thr)).collect()
    })
}

/// Tune the minimum best-actionable probability of a softmax model.
pub fn tune_prob_threshold(
    truth: &[DrugClass],
    model: &SoftmaxModel,
    probs: &[Vec<f64>],
    grid: &[f64],
    max_parp_fpr: Option<f64>,
) -> TuningResult {
    tune(truth, grid, max_parp_fpr, |thr| {
        probs.iter().map(|p| model.predict(p, thr)).collect()
    })
}
