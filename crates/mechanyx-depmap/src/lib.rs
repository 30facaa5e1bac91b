//! DepMap (Cancer Dependency Map) grounding for class scores.
//!
//! Dependency-grounded predictors multiply each drug-class score by how
//! essential the class's target gene is in the sample's lineage. Scores
//! come from CRISPR gene-effect data and are normalised to `[0, 1]`.
//!
//! # Gene effect interpretation
//!
//! | Gene effect | Interpretation | Essentiality |
//! |-------------|----------------|--------------|
//! | ≤ -2.0 | Strongly essential | 1.0 |
//! | -1.0 | Moderately essential | 0.5 |
//! | ≥ 0 | Not essential | 0.0 |
//!
//! # Example
//!
//! ```rust,no_run
//! use mechanyx_depmap::{EssentialityProvider, EssentialityTable};
//!
//! fn main() -> mechanyx_common::Result<()> {
//!     let table = EssentialityTable::load_json("depmap_grounding.json".as_ref())?;
//!     let e = table.essentiality("Breast", "PARP1");
//!     println!("PARP1 essentiality in breast lines: {e:.3}");
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

pub mod table;

pub use table::{EssentialityTable, GeneEssentiality, CRISPR_GENE_EFFECT_FILE, MODEL_FILE};

/// Trait for accessing lineage essentiality.
///
/// Implementations can use:
/// - a precomputed grounding JSON file
/// - DepMap bulk CSVs (gene effect + model metadata)
/// - mock data (testing)
pub trait EssentialityProvider: Send + Sync {
    /// Essentiality of `gene` among cell lines of `lineage`, if measured.
    fn lineage_essentiality(&self, lineage: &str, gene: &str) -> Option<f64>;

    /// Pan-lineage essentiality of `gene`, if measured.
    fn global_essentiality(&self, gene: &str) -> Option<f64>;

    /// Lineage value, else global value, else `0.0`.
    fn essentiality(&self, lineage: &str, gene: &str) -> f64 {
        self.lineage_essentiality(lineage, gene)
            .or_else(|| self.global_essentiality(gene))
            .unwrap_or(0.0)
    }

    fn has_gene(&self, gene: &str) -> bool;
}

/// Map a CRISPR gene effect onto `[0, 1]`; more negative is more essential.
pub fn normalize_gene_effect(effect: f64) -> f64 {
    let clamped = effect.clamp(-2.0, 0.0);
    let normalized = (clamped + 2.0) / 2.0; // -2.0 -> 0.0, 0.0 -> 1.0
    1.0 - normalized
}

/// Default cache location for DepMap downloads.
pub fn default_data_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("mechanyx")
        .join("depmap")
}

// ── Mock Implementation for Testing ────────────────────────────────────────

/// Mock provider with hardcoded data for unit tests.
#[derive(Debug, Default)]
pub struct MockEssentialityProvider {
    lineage: HashMap<(String, String), f64>,
    global: HashMap<String, f64>,
}

impl MockEssentialityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lineage-specific essentiality score.
    pub fn with(mut self, lineage: &str, gene: &str, score: f64) -> Self {
        self.lineage
            .insert((lineage.to_string(), gene.to_ascii_uppercase()), score);
        self
    }

    pub fn with_global(mut self, gene: &str, score: f64) -> Self {
        self.global.insert(gene.to_ascii_uppercase(), score);
        self
    }
}

impl EssentialityProvider for MockEssentialityProvider {
    fn lineage_essentiality(&self, lineage: &str, gene: &str) -> Option<f64> {
        self.lineage
            .get(&(lineage.to_string(), gene.to_ascii_uppercase()))
            .copied()
    }

    fn global_essentiality(&self, gene: &str) -> Option<f64> {
        self.global.get(&gene.to_ascii_uppercase()).copied()
    }

    fn has_gene(&self, gene: &str) -> bool {
        let gene = gene.to_ascii_uppercase();
        self.global.contains_key(&gene) || self.lineage.keys().any(|(_, g)| *g == gene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_gene_effect() {
        assert!((normalize_gene_effect(-2.0) - 1.0).abs() < 1e-9);
        assert!((normalize_gene_effect(-1.0) - 0.5).abs() < 1e-9);
        assert!((normalize_gene_effect(0.0) - 0.0).abs() < 1e-9);

        // Clamped outside [-2, 0]
        assert!((normalize_gene_effect(-3.0) - 1.0).abs() < 1e-9);
        assert!((normalize_gene_effect(0.7) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_mock_lineage_then_global_then_zero() {
        let provider = MockEssentialityProvider::new()
            .with("Breast", "PARP1", 0.8)
            .with_global("PARP1", 0.4)
            .with_global("ATR", 0.9);

        assert_eq!(provider.essentiality("Breast", "parp1"), 0.8);
        assert_eq!(provider.essentiality("Lung", "PARP1"), 0.4);
        assert_eq!(provider.essentiality("Breast", "ATR"), 0.9);
        assert_eq!(provider.essentiality("Breast", "WEE1"), 0.0);
        assert!(provider.has_gene("PARP1"));
        assert!(!provider.has_gene("WEE1"));
    }
}
