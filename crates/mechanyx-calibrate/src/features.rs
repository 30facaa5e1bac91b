//! Feature rows for the learned classifiers.
//!
//! Both layouts put the four actionable class scores first, in class
//! order, followed by the number of variants scored.

use mechanyx_common::DrugClass;
use mechanyx_ranker::{CellLineFeatures, ClassScores};

pub const SP_FEATURE_NAMES: [&str; 5] = ["PARP", "ATR", "WEE1", "DNA_PK", "n_variants_scored"];

pub const SPD_FEATURE_NAMES: [&str; 9] = [
    "PARP",
    "ATR",
    "WEE1",
    "DNA_PK",
    "n_variants_scored",
    "ess_PARP1",
    "ess_ATR",
    "ess_WEE1",
    "ess_PRKDC",
];

fn class_values(scores: &ClassScores) -> impl Iterator<Item = f64> + '_ {
    DrugClass::ACTIONABLE
        .iter()
        .map(|c| scores.get(c).copied().unwrap_or(0.0))
}

/// `[PARP, ATR, WEE1, DNA_PK, n_variants_scored]`.
pub fn sp_features(scores: &ClassScores, f: &CellLineFeatures) -> Vec<f64> {
    let mut row: Vec<f64> = class_values(scores).collect();
    row.push(f.n_variants_scored as f64);
    row
}

/// Grounded scores, variant count, then the raw target essentialities.
pub fn spd_features(grounded: &ClassScores, essentiality: &ClassScores, f: &CellLineFeatures) -> Vec<f64> {
    let mut row = sp_features(grounded, f);
    row.extend(class_values(essentiality));
    row
}
