//! Multi-class metrics over the fixed drug-class label set.
//!
//! Macro-F1 averages the actionable classes only; NONE is reported in the
//! confusion matrix but never scored as a class of its own.

use std::collections::BTreeMap;

use mechanyx_common::DrugClass;
use serde::{Deserialize, Serialize};

/// Rows are truth, columns are prediction, both in `DrugClass::ALL` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<DrugClass>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(truth: &[DrugClass], pred: &[DrugClass]) -> Self {
        let k = DrugClass::ALL.len();
        let mut counts = vec![vec![0usize; k]; k];
        for (t, p) in truth.iter().zip(pred) {
            counts[t.index()][p.index()] += 1;
        }
        Self { labels: DrugClass::ALL.to_vec(), counts }
    }

    pub fn get(&self, truth: DrugClass, pred: DrugClass) -> usize {
        self.counts[truth.index()][pred.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Precision, recall and F1 per class. Empty denominators count as one,
/// so a class that never appears scores zero rather than NaN.
pub fn per_class(truth: &[DrugClass], pred: &[DrugClass]) -> BTreeMap<DrugClass, ClassMetrics> {
    let mut tp: BTreeMap<DrugClass, usize> = BTreeMap::new();
    let mut fp: BTreeMap<DrugClass, usize> = BTreeMap::new();
    let mut fn_: BTreeMap<DrugClass, usize> = BTreeMap::new();
    for (t, p) in truth.iter().zip(pred) {
        if t == p {
            *tp.entry(*t).or_default() += 1;
        } else {
            *fp.entry(*p).or_default() += 1;
            *fn_.entry(*t).or_default() += 1;
        }
    }

    DrugClass::ALL
        .iter()
        .map(|c| {
            let tp = tp.get(c).copied().unwrap_or(0);
            let fp = fp.get(c).copied().unwrap_or(0);
            let fn_ = fn_.get(c).copied().unwrap_or(0);
            let precision = tp as f64 / (tp + fp).max(1) as f64;
            let recall = tp as f64 / (tp + fn_).max(1) as f64;
            let f1 = if precision + recall == 0.0 {
                0.0
            } else {
                2.0 * precision * recall / (precision + recall)
            };
            (*c, ClassMetrics { precision, recall, f1, support: tp + fn_ })
        })
        .collect()
}

pub fn accuracy(truth: &[DrugClass], pred: &[DrugClass]) -> f64 {
    let hits = truth.iter().zip(pred).filter(|(t, p)| t == p).count();
    hits as f64 / truth.len().max(1) as f64
}

pub fn macro_f1(truth: &[DrugClass], pred: &[DrugClass]) -> f64 {
    let pc = per_class(truth, pred);
    let f1s: Vec<f64> = DrugClass::ACTIONABLE.iter().map(|c| pc[c].f1).collect();
    f1s.iter().sum::<f64>() / f1s.len().max(1) as f64
}

/// Share of non-PARP truths predicted as PARP.
pub fn parp_false_positive_rate(truth: &[DrugClass], pred: &[DrugClass]) -> f64 {
    let (mut n, mut fp) = (0usize, 0usize);
    for (t, p) in truth.iter().zip(pred) {
        if *t != DrugClass::Parp {
            n += 1;
            if *p == DrugClass::Parp {
                fp += 1;
            }
        }
    }
    fp as f64 / n.max(1) as f64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub n: usize,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub parp_false_positive_rate: f64,
    pub per_class: BTreeMap<DrugClass, ClassMetrics>,
    pub confusion_matrix: ConfusionMatrix,
}

impl ClassificationReport {
    pub fn evaluate(truth: &[DrugClass], pred: &[DrugClass]) -> Self {
        Self {
            n: truth.len(),
            accuracy: accuracy(truth, pred),
            macro_f1: macro_f1(truth, pred),
            parp_false_positive_rate: parp_false_positive_rate(truth, pred),
            per_class: per_class(truth, pred),
            confusion_matrix: ConfusionMatrix::new(truth, pred),
        }
    }
}

/// Label counts in class order, zero-filled.
pub fn label_distribution(labels: &[DrugClass]) -> BTreeMap<DrugClass, usize> {
    let mut out: BTreeMap<DrugClass, usize> = DrugClass::ALL.iter().map(|c| (*c, 0)).collect();
    for l in labels {
        *out.entry(*l).or_default() += 1;
    }
    out
}
