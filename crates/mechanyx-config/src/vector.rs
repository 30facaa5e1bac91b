//! Vector builder rules: biomarker lookups, IO step function, variant
//! weighting and the HRD proxy derived from mutations.

use std::collections::BTreeMap;

use mechanyx_common::Dimensionality;
use serde::{Deserialize, Serialize};

use crate::gating::strings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorConfig {
    #[serde(default)]
    pub dimensionality: Dimensionality,

    /// HRD bucket label → DDR intensity.
    #[serde(default = "default_hrd_buckets")]
    pub hrd_buckets: BTreeMap<String, f64>,

    /// Numeric HRD score cut points used to pick a bucket.
    #[serde(default = "default_hrd_high_cutoff")]
    pub hrd_high_cutoff: f64,
    #[serde(default = "default_hrd_intermediate_cutoff")]
    pub hrd_intermediate_cutoff: f64,

    #[serde(default = "default_brca_ddr")]
    pub brca_somatic_ddr: f64,

    #[serde(default = "default_tmb_high")]
    pub tmb_high: f64,
    #[serde(default = "default_tmb_intermediate")]
    pub tmb_intermediate: f64,
    #[serde(default = "default_io_intermediate")]
    pub io_intermediate: f64,

    /// Axis key → member genes; fallback pathway mapping for mutations.
    #[serde(default = "default_pathway_genes")]
    pub pathway_genes: BTreeMap<String, Vec<String>>,

    /// p53-axis genes; their aggregate folds into DDR at `tp53_ddr_weight`.
    #[serde(default = "default_tp53_genes")]
    pub tp53_genes: Vec<String>,
    #[serde(default = "default_tp53_ddr_weight")]
    pub tp53_ddr_weight: f64,

    #[serde(default)]
    pub variant_weights: VariantWeights,

    #[serde(default)]
    pub hrd_proxy: HrdProxyConfig,

    /// Raw sequence-disruption range mapped linearly onto [0, 1].
    #[serde(default = "default_disruption_lo")]
    pub disruption_lo: f64,
    #[serde(default = "default_disruption_hi")]
    pub disruption_hi: f64,
}

fn default_hrd_buckets() -> BTreeMap<String, f64> {
    [("HRD-High", 0.8), ("HRD-Intermediate", 0.4), ("HRD-Low", 0.1)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}
fn default_hrd_high_cutoff() -> f64 { 42.0 }
fn default_hrd_intermediate_cutoff() -> f64 { 33.0 }
fn default_brca_ddr() -> f64 { 0.95 }
fn default_tmb_high() -> f64 { 20.0 }
fn default_tmb_intermediate() -> f64 { 10.0 }
fn default_io_intermediate() -> f64 { 0.5 }
fn default_tp53_genes() -> Vec<String> { strings(&["TP53", "MDM2", "CHEK2"]) }
fn default_tp53_ddr_weight() -> f64 { 0.5 }
fn default_disruption_lo() -> f64 { 1e-6 }
fn default_disruption_hi() -> f64 { 1e-3 }

fn default_pathway_genes() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("mapk".to_string(), strings(&["BRAF", "KRAS", "NRAS", "EGFR", "MAP2K1", "MAPK1"])),
        (
            "ddr".to_string(),
            strings(&["BRCA1", "BRCA2", "ATM", "ATR", "CHEK1", "RAD51", "PALB2", "MBD4"]),
        ),
        ("pi3k".to_string(), strings(&["PTEN", "PIK3CA", "AKT1", "AKT2", "MTOR"])),
        ("vegf".to_string(), strings(&["VEGFA", "VEGFR1", "VEGFR2", "KDR", "FLT1"])),
        ("her2".to_string(), strings(&["ERBB2", "ERBB3", "ERBB4"])),
    ])
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self {
            dimensionality: Dimensionality::default(),
            hrd_buckets: default_hrd_buckets(),
            hrd_high_cutoff: default_hrd_high_cutoff(),
            hrd_intermediate_cutoff: default_hrd_intermediate_cutoff(),
            brca_somatic_ddr: default_brca_ddr(),
            tmb_high: default_tmb_high(),
            tmb_intermediate: default_tmb_intermediate(),
            io_intermediate: default_io_intermediate(),
            pathway_genes: default_pathway_genes(),
            tp53_genes: default_tp53_genes(),
            tp53_ddr_weight: default_tp53_ddr_weight(),
            variant_weights: VariantWeights::default(),
            hrd_proxy: HrdProxyConfig::default(),
            disruption_lo: default_disruption_lo(),
            disruption_hi: default_disruption_hi(),
        }
    }
}

impl VectorConfig {
    pub fn is_tp53_gene(&self, gene: &str) -> bool {
        self.tp53_genes.iter().any(|g| g.eq_ignore_ascii_case(gene))
    }

    /// Axis keys a gene contributes to.
    pub fn axes_for_gene(&self, gene: &str) -> Vec<&str> {
        self.pathway_genes
            .iter()
            .filter(|(_, genes)| genes.iter().any(|g| g.eq_ignore_ascii_case(gene)))
            .map(|(axis, _)| axis.as_str())
            .collect()
    }
}

/// Per-variant contribution weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantWeights {
    #[serde(default = "default_lof")]
    pub loss_of_function: f64,
    #[serde(default = "default_missense")]
    pub missense: f64,
    #[serde(default = "default_high_impact")]
    pub high_impact: f64,
    #[serde(default = "default_moderate_impact")]
    pub moderate_impact: f64,
    #[serde(default = "default_unknown")]
    pub unknown: f64,
    #[serde(default = "default_hotspot_floor")]
    pub hotspot_floor: f64,
    #[serde(default = "default_hotspot_genes")]
    pub hotspot_genes: Vec<String>,
}

fn default_lof() -> f64 { 1.0 }
fn default_missense() -> f64 { 0.2 }
fn default_high_impact() -> f64 { 0.6 }
fn default_moderate_impact() -> f64 { 0.2 }
fn default_unknown() -> f64 { 0.05 }
fn default_hotspot_floor() -> f64 { 0.6 }
fn default_hotspot_genes() -> Vec<String> { strings(&["TP53", "BRAF", "KRAS", "NRAS"]) }

impl Default for VariantWeights {
    fn default() -> Self {
        Self {
            loss_of_function: default_lof(),
            missense: default_missense(),
            high_impact: default_high_impact(),
            moderate_impact: default_moderate_impact(),
            unknown: default_unknown(),
            hotspot_floor: default_hotspot_floor(),
            hotspot_genes: default_hotspot_genes(),
        }
    }
}

/// HRD score estimated from HRR gene mutations when no assay value exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrdProxyConfig {
    #[serde(default = "default_core_hrr")]
    pub core_genes: Vec<String>,
    #[serde(default = "default_extended_hrr")]
    pub extended_genes: Vec<String>,
    #[serde(default = "default_core_score")]
    pub core_score: f64,
    #[serde(default = "default_biallelic_score")]
    pub biallelic_score: f64,
    #[serde(default = "default_extended_score")]
    pub extended_score: f64,
    /// Returned when no HRR evidence exists; `None` leaves HRD unknown.
    #[serde(default)]
    pub default_score: Option<f64>,
    /// Copy-number proxy: `cna_base_score + cna_loss_step × losses` over
    /// core and extended HRR genes, clamped to `[0, 100]`.
    #[serde(default = "default_cna_base_score")]
    pub cna_base_score: f64,
    #[serde(default = "default_cna_loss_step")]
    pub cna_loss_step: f64,
}

fn default_core_hrr() -> Vec<String> {
    strings(&["BRCA1", "BRCA2", "PALB2", "RAD51C", "RAD51D", "BRIP1", "BARD1", "MBD4"])
}
fn default_extended_hrr() -> Vec<String> {
    strings(&["ATM", "CHEK2", "FANCA", "FANCC", "FANCD2", "RAD50", "MRE11", "NBN", "CDK12"])
}
fn default_core_score() -> f64 { 55.0 }
fn default_biallelic_score() -> f64 { 65.0 }
fn default_extended_score() -> f64 { 45.0 }
fn default_cna_base_score() -> f64 { 20.0 }
fn default_cna_loss_step() -> f64 { 12.0 }

impl Default for HrdProxyConfig {
    fn default() -> Self {
        Self {
            core_genes: default_core_hrr(),
            extended_genes: default_extended_hrr(),
            core_score: default_core_score(),
            biallelic_score: default_biallelic_score(),
            extended_score: default_extended_score(),
            default_score: None,
            cna_base_score: default_cna_base_score(),
            cna_loss_step: default_cna_loss_step(),
        }
    }
}
