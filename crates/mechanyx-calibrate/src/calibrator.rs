//! Per-gene percentile calibration of raw disruption scores.
//!
//! Built strictly from the training partition. Each gene keeps a sorted
//! list of its observed maxima with a `0.0` floor appended; genes never
//! seen in training fall back to the pooled global list.

use std::collections::BTreeMap;

use mechanyx_ranker::{CellLineFeatures, GeneCalibration};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const GLOBAL_KEY: &str = "__GLOBAL__";

/// Rank of `x` among the reference values, scaled so the list minimum
/// maps to `0.0` and the list maximum to `1.0`:
/// `#(values < x) / #(values < max)`, clamped to `[0, 1]`.
///
/// Ties at either end keep the extremes at `0.0` and `1.0`. A list whose
/// values are all equal answers `1.0` above the value and `0.0` otherwise;
/// an empty list answers `0.0`.
pub fn percentile(sorted: &[f64], x: f64) -> f64 {
    let Some(max) = sorted.last().copied() else {
        return 0.0;
    };
    let span = sorted.partition_point(|v| *v < max);
    if span == 0 {
        return if x > max { 1.0 } else { 0.0 };
    }
    let below = sorted.partition_point(|v| *v < x);
    (below as f64 / span as f64).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Calibrator {
    by_gene: BTreeMap<String, Vec<f64>>,
    global: Vec<f64>,
}

impl Calibrator {
    pub fn fit<'f, I>(train: I) -> Self
    where
        I: IntoIterator<Item = &'f CellLineFeatures>,
    {
        let mut by_gene: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        let mut global = Vec::new();
        for f in train {
            for (gene, raw) in &f.gene_raw_max {
                by_gene.entry(gene.to_ascii_uppercase()).or_default().push(*raw);
                global.push(*raw);
            }
        }
        for values in by_gene.values_mut() {
            values.push(0.0);
            values.sort_by(f64::total_cmp);
        }
        global.push(0.0);
        global.sort_by(f64::total_cmp);
        debug!(n_genes = by_gene.len(), n_global = global.len(), "Fitted gene calibrator");
        Self { by_gene, global }
    }

    pub fn n_genes(&self) -> usize {
        self.by_gene.len()
    }

    pub fn reference(&self, gene: &str) -> &[f64] {
        self.by_gene
            .get(&gene.trim().to_ascii_uppercase())
            .map_or(self.global.as_slice(), Vec::as_slice)
    }

    pub fn score(&self, gene: &str, raw: f64) -> f64 {
        percentile(self.reference(gene), raw)
    }

    /// Gene → reference list, with the pooled list under [`GLOBAL_KEY`].
    pub fn to_map(&self) -> BTreeMap<String, Vec<f64>> {
        let mut out = self.by_gene.clone();
        out.insert(GLOBAL_KEY.to_string(), self.global.clone());
        out
    }
}

impl GeneCalibration for Calibrator {
    fn calibrated(&self, gene: &str, raw: f64) -> f64 {
        self.score(gene, raw)
    }
}
