//! Gene sets, class vectors and thresholds consumed by the gating engine
//! and the pathway (S/P/D) scorer.

use std::collections::BTreeMap;

use mechanyx_common::{Dimensionality, DrugClass, MechanismVector};
use serde::{Deserialize, Serialize};

// ── Gating ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatingConfig {
    /// Layout used when classifying cell lines.
    #[serde(default = "default_gating_dim")]
    pub dimensionality: Dimensionality,

    /// Minimum DDR activation before any class is considered.
    #[serde(default = "default_min_ddr")]
    pub min_ddr: f64,

    /// Minimum magnitude-weighted fit for the best class.
    #[serde(default = "default_min_fit")]
    pub min_fit: f64,

    /// Required gap between best and second-best fit. `0.0` disables the gate.
    #[serde(default)]
    pub fit_margin: f64,

    #[serde(default)]
    pub hrd: HrdGate,

    /// Evaluated in order; the first matching override wins.
    #[serde(default = "default_overrides")]
    pub overrides: Vec<GeneOverride>,

    #[serde(default = "default_class_vectors")]
    pub class_vectors: Vec<ClassVector>,
}

fn default_gating_dim() -> Dimensionality { Dimensionality::Six }
fn default_min_ddr() -> f64 { 0.25 }
fn default_min_fit() -> f64 { 0.25 }

impl Default for GatingConfig {
    fn default() -> Self {
        Self {
            dimensionality: default_gating_dim(),
            min_ddr: default_min_ddr(),
            min_fit: default_min_fit(),
            fit_margin: 0.0,
            hrd: HrdGate::default(),
            overrides: default_overrides(),
            class_vectors: default_class_vectors(),
        }
    }
}

impl GatingConfig {
    pub fn class_vector(&self, class: DrugClass) -> Option<MechanismVector> {
        self.class_vectors
            .iter()
            .find(|cv| cv.class == class)
            .map(|cv| cv.vector(self.dimensionality))
    }
}

/// HRD-aware DDR threshold: scores at or above `cutoff` lower the bar,
/// scores below it raise the bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrdGate {
    #[serde(default = "default_hrd_cutoff")]
    pub cutoff: f64,
    #[serde(default = "default_rescue_ddr")]
    pub rescue_min_ddr: f64,
    #[serde(default = "default_penalty_ddr")]
    pub penalty_min_ddr: f64,
}

fn default_hrd_cutoff() -> f64 { 42.0 }
fn default_rescue_ddr() -> f64 { 0.45 }
fn default_penalty_ddr() -> f64 { 0.70 }

impl Default for HrdGate {
    fn default() -> Self {
        Self {
            cutoff: default_hrd_cutoff(),
            rescue_min_ddr: default_rescue_ddr(),
            penalty_min_ddr: default_penalty_ddr(),
        }
    }
}

impl HrdGate {
    pub fn adjusted_min_ddr(&self, hrd_score: f64) -> f64 {
        if hrd_score >= self.cutoff {
            self.rescue_min_ddr
        } else {
            self.penalty_min_ddr
        }
    }
}

/// Gene-specific priority rule: a case whose primary gene is in `genes`
/// fires `class` once DDR reaches `min_ddr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneOverride {
    pub class: DrugClass,
    pub genes: Vec<String>,
    pub min_ddr: f64,
    /// Take the lower of `min_ddr` and the HRD-adjusted threshold when an
    /// HRD score is known.
    #[serde(default)]
    pub hrd_adjusted: bool,
}

impl GeneOverride {
    pub fn matches(&self, gene: &str) -> bool {
        let gene = gene.trim();
        self.genes.iter().any(|g| g.eq_ignore_ascii_case(gene))
    }
}

fn default_overrides() -> Vec<GeneOverride> {
    vec![
        GeneOverride {
            class: DrugClass::Parp,
            genes: strings(&[
                "BRCA1", "BRCA2", "PALB2", "RAD51C", "RAD51D", "BARD1", "BRIP1", "MBD4", "ATM",
                "CDK12",
            ]),
            min_ddr: 0.50,
            hrd_adjusted: true,
        },
        GeneOverride {
            class: DrugClass::Atr,
            genes: strings(&["ARID1A", "CHEK2"]),
            min_ddr: 0.40,
            hrd_adjusted: false,
        },
        GeneOverride {
            class: DrugClass::Wee1,
            genes: strings(&["WEE1", "CDC25A"]),
            min_ddr: 0.35,
            hrd_adjusted: false,
        },
    ]
}

/// MoA vector of a drug class, keyed by axis name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassVector {
    pub class: DrugClass,
    pub moa: BTreeMap<String, f64>,
}

impl ClassVector {
    pub fn vector(&self, dim: Dimensionality) -> MechanismVector {
        MechanismVector::from_axis_pairs(self.moa.iter().map(|(k, v)| (k.as_str(), *v)), dim)
    }
}

fn default_class_vectors() -> Vec<ClassVector> {
    let cv = |class, ddr: f64, mapk: f64| ClassVector {
        class,
        moa: BTreeMap::from([("ddr".to_string(), ddr), ("mapk".to_string(), mapk)]),
    };
    vec![
        cv(DrugClass::Parp, 0.95, 0.05),
        cv(DrugClass::Atr, 0.80, 0.20),
        cv(DrugClass::Wee1, 0.70, 0.30),
        cv(DrugClass::DnaPk, 0.90, 0.10),
    ]
}

// ── Pathway (S/P/D) ──────────────────────────────────────────────────────────

/// Gene sets for the sequence → pathway → class aggregation and the
/// drug/target tables used for dependency grounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathwayConfig {
    #[serde(default = "default_hrr")]
    pub hrr_genes: Vec<String>,
    #[serde(default = "default_ber")]
    pub ber_genes: Vec<String>,
    #[serde(default = "default_checkpoint")]
    pub checkpoint_genes: Vec<String>,
    #[serde(default = "default_atr_axis")]
    pub atr_axis_genes: Vec<String>,
    #[serde(default = "default_dnapk")]
    pub dnapk_genes: Vec<String>,
    /// Replication-stress regulators counted toward ATR and DDR-broad.
    #[serde(default = "default_atr_extra")]
    pub atr_extra_genes: Vec<String>,
    #[serde(default = "default_class_targets")]
    pub class_targets: BTreeMap<String, String>,
    #[serde(default = "default_drug_classes")]
    pub drug_classes: Vec<DrugMapping>,
    /// Genes the curated rule baseline treats as PARP-eligible.
    #[serde(default = "default_curated_ddr")]
    pub curated_ddr_genes: Vec<String>,
}

fn default_hrr() -> Vec<String> {
    strings(&["BRCA1", "BRCA2", "PALB2", "RAD51C", "RAD51D", "BRIP1", "BARD1", "CDK12"])
}
fn default_ber() -> Vec<String> { strings(&["MBD4"]) }
fn default_checkpoint() -> Vec<String> { strings(&["TP53"]) }
fn default_atr_axis() -> Vec<String> { strings(&["ATR", "CHEK1"]) }
fn default_dnapk() -> Vec<String> { strings(&["PRKDC"]) }
fn default_atr_extra() -> Vec<String> { strings(&["ATM", "CHEK2", "ARID1A"]) }

fn default_class_targets() -> BTreeMap<String, String> {
    [("PARP", "PARP1"), ("ATR", "ATR"), ("WEE1", "WEE1"), ("DNA_PK", "PRKDC")]
        .into_iter()
        .map(|(c, g)| (c.to_string(), g.to_string()))
        .collect()
}

fn default_drug_classes() -> Vec<DrugMapping> {
    vec![
        DrugMapping {
            class: DrugClass::Parp,
            drugs: strings(&["Olaparib", "Niraparib", "Talazoparib", "Rucaparib", "Veliparib"]),
        },
        DrugMapping { class: DrugClass::Atr, drugs: strings(&["AZD6738", "VE-822", "VE821"]) },
        DrugMapping { class: DrugClass::Wee1, drugs: strings(&["MK-1775"]) },
        DrugMapping { class: DrugClass::DnaPk, drugs: strings(&["NU7441"]) },
    ]
}

fn default_curated_ddr() -> Vec<String> {
    strings(&["BRCA1", "BRCA2", "ATM", "PALB2", "CHEK2", "RAD51C", "RAD51D", "BARD1", "BRIP1"])
}

impl Default for PathwayConfig {
    fn default() -> Self {
        Self {
            hrr_genes: default_hrr(),
            ber_genes: default_ber(),
            checkpoint_genes: default_checkpoint(),
            atr_axis_genes: default_atr_axis(),
            dnapk_genes: default_dnapk(),
            atr_extra_genes: default_atr_extra(),
            class_targets: default_class_targets(),
            drug_classes: default_drug_classes(),
            curated_ddr_genes: default_curated_ddr(),
        }
    }
}

impl PathwayConfig {
    /// Union of every mechanistic set plus the ATR extras.
    pub fn ddr_broad(&self) -> Vec<String> {
        let mut all: Vec<String> = self
            .hrr_genes
            .iter()
            .chain(&self.ber_genes)
            .chain(&self.checkpoint_genes)
            .chain(&self.atr_axis_genes)
            .chain(&self.dnapk_genes)
            .chain(&self.atr_extra_genes)
            .map(|g| g.to_ascii_uppercase())
            .collect();
        all.sort();
        all.dedup();
        all
    }

    pub fn class_for_drug(&self, drug: &str) -> Option<DrugClass> {
        let drug = drug.trim();
        self.drug_classes
            .iter()
            .find(|m| m.drugs.iter().any(|d| d == drug))
            .map(|m| m.class)
    }

    pub fn target_gene(&self, class: DrugClass) -> Option<&str> {
        self.class_targets.get(class.as_str()).map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrugMapping {
    pub class: DrugClass,
    pub drugs: Vec<String>,
}

pub(crate) fn strings(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|s| s.to_string()).collect()
}
