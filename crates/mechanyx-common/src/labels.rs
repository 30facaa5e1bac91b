//! Drug-class labels and the threshold-plus-margin decision rule.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MechanyxError;

/// Mechanism class used both as ground truth and as a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DrugClass {
    #[serde(rename = "PARP")]
    Parp,
    #[serde(rename = "ATR")]
    Atr,
    #[serde(rename = "WEE1")]
    Wee1,
    #[serde(rename = "DNA_PK", alias = "DNA-PK")]
    DnaPk,
    /// No-action catch-all.
    #[serde(rename = "NONE")]
    None,
}

impl DrugClass {
    /// Full label set in reporting order.
    pub const ALL: [DrugClass; 5] = [
        DrugClass::Parp,
        DrugClass::Atr,
        DrugClass::Wee1,
        DrugClass::DnaPk,
        DrugClass::None,
    ];

    pub const ACTIONABLE: [DrugClass; 4] = [
        DrugClass::Parp,
        DrugClass::Atr,
        DrugClass::Wee1,
        DrugClass::DnaPk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DrugClass::Parp => "PARP",
            DrugClass::Atr => "ATR",
            DrugClass::Wee1 => "WEE1",
            DrugClass::DnaPk => "DNA_PK",
            DrugClass::None => "NONE",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            DrugClass::Parp => 0,
            DrugClass::Atr => 1,
            DrugClass::Wee1 => 2,
            DrugClass::DnaPk => 3,
            DrugClass::None => 4,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, DrugClass::None)
    }

    /// Unknown labels collapse to NONE.
    pub fn parse_or_none(s: &str) -> Self {
        s.parse().unwrap_or(DrugClass::None)
    }
}

impl fmt::Display for DrugClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrugClass {
    type Err = MechanyxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PARP" => Ok(DrugClass::Parp),
            "ATR" => Ok(DrugClass::Atr),
            "WEE1" => Ok(DrugClass::Wee1),
            "DNA_PK" | "DNAPK" => Ok(DrugClass::DnaPk),
            "NONE" => Ok(DrugClass::None),
            other => Err(MechanyxError::InvalidInput(format!("unknown drug class: {other}"))),
        }
    }
}

/// Which end of the statistic counts as a stronger signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// e.g. mean dose-response Z-score: more negative = more sensitive.
    LowerIsStronger,
    /// e.g. mechanism fit.
    HigherIsStronger,
}

/// Pick the strongest class, then refuse (NONE) unless it clears
/// `threshold` and beats the runner-up by at least `min_margin`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginRule {
    pub threshold: f64,
    pub min_margin: f64,
    pub direction: Direction,
}

impl MarginRule {
    /// Default outcome-label rule on mean Z-scores.
    pub fn z_score_label() -> Self {
        Self { threshold: -0.8, min_margin: 0.25, direction: Direction::LowerIsStronger }
    }

    /// Returns NONE for empty input, non-finite statistics, a best value
    /// that misses the threshold, or a gap under the margin.
    pub fn decide(&self, stats: &BTreeMap<DrugClass, f64>) -> DrugClass {
        let mut items: Vec<(DrugClass, f64)> = stats
            .iter()
            .filter(|(c, v)| c.is_actionable() && v.is_finite())
            .map(|(c, v)| (*c, *v))
            .collect();
        if items.is_empty() {
            return DrugClass::None;
        }

        // Strongest first; ties resolved by class order.
        items.sort_by(|a, b| {
            let ord = match self.direction {
                Direction::LowerIsStronger => a.1.total_cmp(&b.1),
                Direction::HigherIsStronger => b.1.total_cmp(&a.1),
            };
            ord.then(a.0.cmp(&b.0))
        });

        let (best_class, best) = items[0];
        let passes = match self.direction {
            Direction::LowerIsStronger => best <= self.threshold,
            Direction::HigherIsStronger => best >= self.threshold,
        };
        if !passes {
            return DrugClass::None;
        }
        if let Some(&(_, second)) = items.get(1) {
            if (second - best).abs() < self.min_margin {
                return DrugClass::None;
            }
        }
        best_class
    }
}

/// Where a label set came from. Serialized into every receipt that reports
/// metrics against derived labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelProvenance {
    pub source: String,
    pub statistic: String,
    pub rule: MarginRule,
    pub outcomes_validated: bool,
    pub caveat: String,
}

impl LabelProvenance {
    pub fn derived_from_summary(source: &str, statistic: &str, rule: MarginRule) -> Self {
        Self {
            source: source.to_string(),
            statistic: statistic.to_string(),
            rule,
            outcomes_validated: false,
            caveat: format!(
                "Labels are derived by thresholding {statistic} (threshold {}, margin {}); \
                 this is not an outcomes validation.",
                rule.threshold, rule.min_margin
            ),
        }
    }
}
