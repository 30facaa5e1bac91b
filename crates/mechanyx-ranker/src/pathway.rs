//! Pathway (S/P/D) class scoring for cell-line panels.
//!
//! - **S**: per-variant sequence disruption
//! - **P**: gene → pathway set → drug class aggregation (max per set)
//! - **D**: lineage essentiality of each class's target gene
//!
//! Also hosts the non-learned baselines: pathway-presence (P-only) and
//! the curated DDR-gene rule.

use std::collections::{BTreeMap, HashSet};

use mechanyx_common::{DrugClass, Mutation};
use mechanyx_config::PathwayConfig;
use mechanyx_depmap::EssentialityProvider;
use serde::{Deserialize, Serialize};

use crate::builder::ScoredVariant;

pub type ClassScores = BTreeMap<DrugClass, f64>;

/// Gene-level disruption calibration fit on a training partition.
pub trait GeneCalibration {
    fn calibrated(&self, gene: &str, raw: f64) -> f64;
}

/// Per-cell-line maxima of raw disruption within each gene set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellLineFeatures {
    pub model_id: String,
    pub lineage: String,
    pub hrr_max: f64,
    pub ber_max: f64,
    pub checkpoint_max: f64,
    pub atr_axis_max: f64,
    pub dnapk_max: f64,
    pub ddr_broad_max: f64,
    pub gene_raw_max: BTreeMap<String, f64>,
    pub n_variants_scored: usize,
    pub n_variants_considered: usize,
}

struct GeneSets {
    hrr: HashSet<String>,
    ber: HashSet<String>,
    checkpoint: HashSet<String>,
    atr_axis: HashSet<String>,
    dnapk: HashSet<String>,
    atr_extra: HashSet<String>,
    ddr_broad: HashSet<String>,
}

fn upper_set(genes: &[String]) -> HashSet<String> {
    genes.iter().map(|g| g.trim().to_ascii_uppercase()).collect()
}

pub struct PathwayScorer<'a> {
    cfg: &'a PathwayConfig,
    sets: GeneSets,
}

impl<'a> PathwayScorer<'a> {
    pub fn new(cfg: &'a PathwayConfig) -> Self {
        let sets = GeneSets {
            hrr: upper_set(&cfg.hrr_genes),
            ber: upper_set(&cfg.ber_genes),
            checkpoint: upper_set(&cfg.checkpoint_genes),
            atr_axis: upper_set(&cfg.atr_axis_genes),
            dnapk: upper_set(&cfg.dnapk_genes),
            atr_extra: upper_set(&cfg.atr_extra_genes),
            ddr_broad: cfg.ddr_broad().into_iter().collect(),
        };
        Self { cfg, sets }
    }

    pub fn is_ddr_broad(&self, gene: &str) -> bool {
        self.sets.ddr_broad.contains(&gene.trim().to_ascii_uppercase())
    }

    /// SNVs only; DDR-broad genes first, each half ordered by VEP impact
    /// (HIGH, MODERATE, LOW, other) with input order kept on ties.
    pub fn pick_variants<'m>(&self, mutations: &'m [Mutation], max_variants: usize) -> Vec<&'m Mutation> {
        fn impact_rank(m: &Mutation) -> u8 {
            match m.impact.as_deref().map(|s| s.trim().to_ascii_uppercase()).as_deref() {
                Some("HIGH") => 0,
                Some("MODERATE") => 1,
                Some("LOW") => 2,
                _ => 3,
            }
        }

        let snvs = mutations.iter().filter(|m| is_scorable_snv(m));
        let (mut ddr, mut other): (Vec<&Mutation>, Vec<&Mutation>) =
            snvs.partition(|m| self.is_ddr_broad(&m.gene));
        ddr.sort_by_key(|m| impact_rank(m));
        other.sort_by_key(|m| impact_rank(m));
        ddr.into_iter().chain(other).take(max_variants).collect()
    }

    /// Fold scored variants into per-set maxima.
    pub fn features(
        &self,
        model_id: &str,
        lineage: &str,
        scored: &[ScoredVariant],
        n_considered: usize,
    ) -> CellLineFeatures {
        let mut f = CellLineFeatures {
            model_id: model_id.to_string(),
            lineage: lineage.to_string(),
            n_variants_scored: scored.len(),
            n_variants_considered: n_considered,
            ..Default::default()
        };
        for s in scored {
            let gene = s.gene.trim().to_ascii_uppercase();
            let d = if s.disruption.is_finite() { s.disruption } else { 0.0 };
            let slot = f.gene_raw_max.entry(gene.clone()).or_insert(0.0);
            *slot = slot.max(d);

            let bump = |set: &HashSet<String>, acc: &mut f64| {
                if set.contains(&gene) {
                    *acc = acc.max(d);
                }
            };
            bump(&self.sets.hrr, &mut f.hrr_max);
            bump(&self.sets.ber, &mut f.ber_max);
            bump(&self.sets.checkpoint, &mut f.checkpoint_max);
            bump(&self.sets.atr_axis, &mut f.atr_axis_max);
            bump(&self.sets.dnapk, &mut f.dnapk_max);
            bump(&self.sets.ddr_broad, &mut f.ddr_broad_max);
        }
        f
    }

    /// S·P class scores on raw disruption.
    pub fn sp_scores_raw(&self, f: &CellLineFeatures) -> ClassScores {
        BTreeMap::from([
            (DrugClass::Parp, f.hrr_max.max(f.ber_max)),
            (DrugClass::Atr, f.ddr_broad_max.max(f.atr_axis_max)),
            (DrugClass::Wee1, f.checkpoint_max),
            (DrugClass::DnaPk, f.dnapk_max),
        ])
    }

    /// S·P class scores on gene-calibrated disruption. Genes without a
    /// scored variant contribute the calibrated value of `0.0`.
    pub fn sp_scores_calibrated(&self, f: &CellLineFeatures, calib: &dyn GeneCalibration) -> ClassScores {
        let g = |gene: &String| {
            let raw = f.gene_raw_max.get(gene).copied().unwrap_or(0.0);
            calib.calibrated(gene, raw)
        };
        let max_over = |sets: &[&HashSet<String>]| {
            sets.iter()
                .flat_map(|s| s.iter())
                .map(g)
                .fold(0.0_f64, f64::max)
        };
        let s = &self.sets;
        BTreeMap::from([
            (DrugClass::Parp, max_over(&[&s.hrr, &s.ber])),
            (DrugClass::Atr, max_over(&[&s.atr_axis, &s.checkpoint, &s.atr_extra])),
            (DrugClass::Wee1, max_over(&[&s.checkpoint])),
            (DrugClass::DnaPk, max_over(&[&s.dnapk])),
        ])
    }

    /// Essentiality of each class's target gene in `lineage`.
    pub fn essentialities(&self, lineage: &str, depmap: &dyn EssentialityProvider) -> ClassScores {
        DrugClass::ACTIONABLE
            .iter()
            .map(|c| {
                let e = self
                    .cfg
                    .target_gene(*c)
                    .map_or(0.0, |gene| depmap.essentiality(lineage, gene));
                (*c, e)
            })
            .collect()
    }

    /// S·P·D: each class score multiplied by its target's essentiality.
    pub fn ground(&self, scores: &ClassScores, lineage: &str, depmap: &dyn EssentialityProvider) -> ClassScores {
        let ess = self.essentialities(lineage, depmap);
        scores
            .iter()
            .map(|(c, s)| (*c, s * ess.get(c).copied().unwrap_or(0.0)))
            .collect()
    }

    /// Pathway-presence baseline in fixed priority order.
    pub fn p_only(&self, f: &CellLineFeatures) -> DrugClass {
        if f.n_variants_scored == 0 {
            DrugClass::None
        } else if f.hrr_max > 0.0 || f.ber_max > 0.0 {
            DrugClass::Parp
        } else if f.atr_axis_max > 0.0 || f.ddr_broad_max > 0.0 {
            DrugClass::Atr
        } else if f.checkpoint_max > 0.0 {
            DrugClass::Wee1
        } else if f.dnapk_max > 0.0 {
            DrugClass::DnaPk
        } else {
            DrugClass::None
        }
    }

    /// PARP when any mutated gene is on the curated DDR list.
    pub fn curated_baseline(&self, mutations: &[Mutation]) -> DrugClass {
        let curated = upper_set(&self.cfg.curated_ddr_genes);
        if mutations.iter().any(|m| curated.contains(&m.gene_upper())) {
            DrugClass::Parp
        } else {
            DrugClass::None
        }
    }
}

/// Highest-scoring class (first in class order on ties), or NONE when it
/// falls below `none_threshold`.
pub fn predict_from_scores(scores: &ClassScores, none_threshold: f64) -> DrugClass {
    let mut best: Option<(DrugClass, f64)> = None;
    for (c, s) in scores.iter().filter(|(c, _)| c.is_actionable()) {
        if best.map_or(true, |(_, b)| *s > b) {
            best = Some((*c, *s));
        }
    }
    match best {
        Some((c, s)) if s >= none_threshold => c,
        _ => DrugClass::None,
    }
}

/// Single-base substitution with a known alt allele. When a variant type
/// is present it must say SNV.
pub fn is_scorable_snv(m: &Mutation) -> bool {
    let alt_ok = m.alt.as_deref().is_some_and(|a| a.trim().len() == 1);
    let type_ok = match m.variant_type.as_deref() {
        Some(t) => t.trim().eq_ignore_ascii_case("snv"),
        None => m.ref_allele.as_deref().map_or(true, |r| r.trim().len() == 1),
    };
    alt_ok && type_ok && m.pos.is_some() && m.chrom.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechanyx_depmap::MockEssentialityProvider;
    use pretty_assertions::assert_eq;

    fn snv(gene: &str, impact: &str) -> Mutation {
        Mutation {
            gene: gene.into(),
            chrom: Some("1".into()),
            pos: Some(100),
            ref_allele: Some("A".into()),
            alt: Some("G".into()),
            variant_type: Some("SNV".into()),
            impact: Some(impact.into()),
            ..Default::default()
        }
    }

    fn sv(gene: &str, d: f64) -> ScoredVariant {
        ScoredVariant { gene: gene.into(), disruption: d }
    }

    struct Identity;
    impl GeneCalibration for Identity {
        fn calibrated(&self, _gene: &str, raw: f64) -> f64 {
            raw
        }
    }

    #[test]
    fn test_pick_variants_prioritises_ddr_then_impact() {
        let cfg = PathwayConfig::default();
        let p = PathwayScorer::new(&cfg);
        let mut indel = snv("BRCA1", "HIGH");
        indel.alt = Some("AT".into());
        let muts = vec![
            snv("TTN", "HIGH"),
            snv("ATM", "LOW"),
            indel,
            snv("BRCA2", "MODERATE"),
            snv("KRAS", "MODERATE"),
        ];
        let picked: Vec<&str> = p.pick_variants(&muts, 3).iter().map(|m| m.gene.as_str()).collect();
        assert_eq!(picked, vec!["BRCA2", "ATM", "TTN"]);
    }

    #[test]
    fn test_features_and_raw_scores() {
        let cfg = PathwayConfig::default();
        let p = PathwayScorer::new(&cfg);
        let f = p.features("ACH-1", "Breast", &[sv("BRCA2", 0.4), sv("TP53", 0.7), sv("brca2", 0.5)], 4);
        assert_eq!(f.hrr_max, 0.5);
        assert_eq!(f.checkpoint_max, 0.7);
        assert_eq!(f.ddr_broad_max, 0.7);
        assert_eq!(f.gene_raw_max["BRCA2"], 0.5);
        assert_eq!(f.n_variants_scored, 3);

        let s = p.sp_scores_raw(&f);
        assert_eq!(s[&DrugClass::Parp], 0.5);
        assert_eq!(s[&DrugClass::Atr], 0.7);
        assert_eq!(s[&DrugClass::Wee1], 0.7);
        assert_eq!(s[&DrugClass::DnaPk], 0.0);
    }

    #[test]
    fn test_calibrated_scores_use_driver_sets() {
        let cfg = PathwayConfig::default();
        let p = PathwayScorer::new(&cfg);
        let f = p.features("ACH-2", "Lung", &[sv("ARID1A", 0.3), sv("MBD4", 0.2)], 2);
        let s = p.sp_scores_calibrated(&f, &Identity);
        assert_eq!(s[&DrugClass::Parp], 0.2);
        assert_eq!(s[&DrugClass::Atr], 0.3);
        assert_eq!(s[&DrugClass::Wee1], 0.0);
    }

    #[test]
    fn test_depmap_grounding_multiplies_target_essentiality() {
        let cfg = PathwayConfig::default();
        let p = PathwayScorer::new(&cfg);
        let depmap = MockEssentialityProvider::new()
            .with("Breast", "PARP1", 0.5)
            .with_global("ATR", 0.2);
        let scores = BTreeMap::from([
            (DrugClass::Parp, 0.8),
            (DrugClass::Atr, 1.0),
            (DrugClass::Wee1, 0.9),
            (DrugClass::DnaPk, 0.0),
        ]);
        let g = p.ground(&scores, "Breast", &depmap);
        assert_eq!(g[&DrugClass::Parp], 0.4);
        assert_eq!(g[&DrugClass::Atr], 0.2);
        assert_eq!(g[&DrugClass::Wee1], 0.0);
    }

    #[test]
    fn test_predict_from_scores() {
        let scores = BTreeMap::from([(DrugClass::Parp, 0.3), (DrugClass::Atr, 0.3), (DrugClass::Wee1, 0.1)]);
        assert_eq!(predict_from_scores(&scores, 0.0), DrugClass::Parp);
        assert_eq!(predict_from_scores(&scores, 0.31), DrugClass::None);
        assert_eq!(predict_from_scores(&BTreeMap::new(), 0.0), DrugClass::None);
    }

    #[test]
    fn test_p_only_priority() {
        let cfg = PathwayConfig::default();
        let p = PathwayScorer::new(&cfg);
        let none = CellLineFeatures { hrr_max: 1.0, ..Default::default() };
        assert_eq!(p.p_only(&none), DrugClass::None);
        let f = p.features("x", "y", &[sv("TP53", 0.1)], 1);
        // TP53 sits in DDR-broad, so ATR outranks WEE1
        assert_eq!(p.p_only(&f), DrugClass::Atr);
        let f = p.features("x", "y", &[sv("TTN", 0.1)], 1);
        assert_eq!(p.p_only(&f), DrugClass::None);
    }

    #[test]
    fn test_curated_baseline() {
        let cfg = PathwayConfig::default();
        let p = PathwayScorer::new(&cfg);
        assert_eq!(p.curated_baseline(&[snv("chek2", "LOW")]), DrugClass::Parp);
        assert_eq!(p.curated_baseline(&[snv("KRAS", "HIGH")]), DrugClass::None);
    }
}
