//! Vector Builder: case biomarkers and mutation lists → mechanism vectors.
//!
//! Two sources feed a vector:
//! - cohort biomarkers (HRD call or score, somatic BRCA, TMB, MSI status)
//! - a somatic mutation list, aggregated per pathway axis either by
//!   consequence weight or by sequence-disruption scores
//!
//! Missing inputs contribute zero and never error. Output is clamped to
//! `[0, 1]` on every axis.

use std::collections::{BTreeMap, HashMap};

use mechanyx_common::{Axis, Biomarkers, CaseRecord, Dimensionality, MechanismVector, Mutation};
use mechanyx_config::VectorConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-axis pathway burden plus the p53 aggregate that folds into DDR.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathwayScores {
    pub axes: BTreeMap<Axis, f64>,
    pub tp53: f64,
}

impl PathwayScores {
    pub fn get(&self, axis: Axis) -> f64 {
        self.axes.get(&axis).copied().unwrap_or(0.0)
    }
}

/// One sequence-scored variant ready for aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredVariant {
    pub gene: String,
    pub disruption: f64,
}

pub struct VectorBuilder<'a> {
    cfg: &'a VectorConfig,
}

impl<'a> VectorBuilder<'a> {
    pub fn new(cfg: &'a VectorConfig) -> Self {
        Self { cfg }
    }

    pub fn dimensionality(&self) -> Dimensionality {
        self.cfg.dimensionality
    }

    // ── Biomarkers ───────────────────────────────────────────────────────────

    /// HRD bucket label for a numeric score.
    pub fn hrd_bucket(&self, score: f64) -> &'static str {
        if score >= self.cfg.hrd_high_cutoff {
            "HRD-High"
        } else if score >= self.cfg.hrd_intermediate_cutoff {
            "HRD-Intermediate"
        } else {
            "HRD-Low"
        }
    }

    fn bucket_value(&self, label: &str) -> f64 {
        let label = label.trim();
        self.cfg
            .hrd_buckets
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(label))
            .map_or(0.0, |(_, v)| *v)
    }

    /// `max(bucket lookup, brca_somatic_ddr if somatic BRCA)`.
    pub fn ddr_from_biomarkers(&self, b: &Biomarkers) -> f64 {
        let bucket = match (&b.hrd_proxy, b.hrd_score) {
            (Some(label), _) => self.bucket_value(label),
            (None, Some(score)) => self.bucket_value(self.hrd_bucket(score)),
            (None, None) => 0.0,
        };
        if b.brca_somatic {
            bucket.max(self.cfg.brca_somatic_ddr)
        } else {
            bucket
        }
    }

    /// Step function on TMB; MSI-H always saturates.
    pub fn io_from_biomarkers(&self, b: &Biomarkers) -> f64 {
        if b.is_msi_high() {
            return 1.0;
        }
        match b.tmb {
            Some(t) if t >= self.cfg.tmb_high => 1.0,
            Some(t) if t >= self.cfg.tmb_intermediate => self.cfg.io_intermediate,
            _ => 0.0,
        }
    }

    pub fn from_biomarkers(&self, b: &Biomarkers) -> MechanismVector {
        let dim = self.cfg.dimensionality;
        let mut v = MechanismVector::zeros(dim);
        v.set(Axis::Ddr, dim, self.ddr_from_biomarkers(b));
        v.set(Axis::Io, dim, self.io_from_biomarkers(b));
        v.clamp_unit()
    }

    /// Full case vector. Mutation-derived axes are combined with the
    /// biomarker axes by taking the larger value on each axis.
    pub fn build(&self, case: &CaseRecord) -> MechanismVector {
        let dim = self.cfg.dimensionality;
        let mut v = self.from_biomarkers(&case.biomarkers);
        if !case.mutations.is_empty() {
            let from_muts = self.from_pathway_scores(&self.weighted_pathway_scores(&case.mutations));
            for axis in dim.axes() {
                let merged = v.get(*axis, dim).max(from_muts.get(*axis, dim));
                v.set(*axis, dim, merged);
            }
        }
        debug!(case = %case.id, ddr = v.ddr(), "Built case vector");
        v.clamp_unit()
    }

    // ── Mutations ────────────────────────────────────────────────────────────

    /// Consequence/impact weight of one variant.
    pub fn variant_weight(&self, m: &Mutation) -> f64 {
        let w = &self.cfg.variant_weights;
        let cons = m
            .consequence
            .as_deref()
            .or(m.variant_type.as_deref())
            .unwrap_or("")
            .to_ascii_lowercase();
        let impact = m.impact.as_deref().unwrap_or("").trim().to_ascii_lowercase();

        const LOF_TERMS: [&str; 5] = ["frameshift", "stop_gained", "splice", "start_lost", "stop_lost"];
        let base = if m.likely_lof || LOF_TERMS.iter().any(|t| cons.contains(t)) {
            w.loss_of_function
        } else if cons.contains("missense") {
            w.missense
        } else if cons.contains("synonymous") {
            0.0
        } else if impact == "high" {
            w.high_impact
        } else if impact == "moderate" {
            w.moderate_impact
        } else if impact == "low" || impact == "modifier" {
            0.0
        } else {
            w.unknown
        };
        if base <= 0.0 {
            return 0.0;
        }

        let hotspot = w.hotspot_genes.iter().any(|g| g.eq_ignore_ascii_case(m.gene.trim()));
        if hotspot && (cons.contains("missense") || impact == "moderate" || impact == "high") {
            base.max(w.hotspot_floor)
        } else {
            base
        }
    }

    /// Per-axis mean of variant weights over mapped genes, clamped.
    pub fn weighted_pathway_scores(&self, mutations: &[Mutation]) -> PathwayScores {
        let mut acc = Accumulator::default();
        for m in mutations {
            let gene = m.gene_upper();
            if gene.is_empty() {
                continue;
            }
            let w = self.variant_weight(m);
            if w <= 0.0 {
                continue;
            }
            self.accumulate(&mut acc, &gene, w);
        }
        acc.finish(|x| x.clamp(0.0, 1.0))
    }

    /// Per-axis mean of raw disruption, then linearly scaled into `[0, 1]`.
    pub fn disruption_pathway_scores(&self, scored: &[ScoredVariant]) -> PathwayScores {
        let mut acc = Accumulator::default();
        for s in scored {
            let gene = s.gene.trim().to_ascii_uppercase();
            self.accumulate(&mut acc, &gene, s.disruption);
        }
        acc.finish(|x| self.scale_disruption(x))
    }

    fn accumulate(&self, acc: &mut Accumulator, gene: &str, value: f64) {
        if self.cfg.is_tp53_gene(gene) {
            acc.add(None, value);
            return;
        }
        for key in self.cfg.axes_for_gene(gene) {
            if let Some(axis) = Axis::from_key(key) {
                acc.add(Some(axis), value);
            }
        }
    }

    /// Linear map of `[lo, hi]` onto `[0, 1]`, saturating outside.
    pub fn scale_disruption(&self, x: f64) -> f64 {
        let (lo, hi) = (self.cfg.disruption_lo, self.cfg.disruption_hi);
        if !x.is_finite() || x <= lo {
            0.0
        } else if x >= hi {
            1.0
        } else {
            (x - lo) / (hi - lo)
        }
    }

    /// DDR takes `ddr + tp53_ddr_weight · tp53`; other axes copy through.
    pub fn from_pathway_scores(&self, scores: &PathwayScores) -> MechanismVector {
        let dim = self.cfg.dimensionality;
        let mut v = MechanismVector::zeros(dim);
        for axis in dim.axes() {
            let value = match axis {
                Axis::Ddr => scores.get(Axis::Ddr) + self.cfg.tp53_ddr_weight * scores.tp53,
                other => scores.get(*other),
            };
            v.set(*axis, dim, value);
        }
        v.clamp_unit()
    }

    // ── HRD proxy ────────────────────────────────────────────────────────────

    /// HRD score estimated from HRR gene hits when no assay value exists.
    ///
    /// Core HRR hit → `core_score`; two or more hits in one core gene →
    /// `biallelic_score`; extended HRR hit → `extended_score`; else the
    /// primary gene's tier; else the configured default.
    pub fn hrd_proxy_from_mutations(&self, mutations: &[Mutation], primary_gene: Option<&str>) -> Option<f64> {
        if mutations.is_empty() {
            return None;
        }
        let p = &self.cfg.hrd_proxy;
        let in_set = |set: &[String], g: &str| set.iter().any(|s| s.eq_ignore_ascii_case(g));

        let mut counts: HashMap<String, usize> = HashMap::new();
        for m in mutations {
            *counts.entry(m.gene_upper()).or_default() += 1;
        }

        let core: Vec<usize> = counts
            .iter()
            .filter(|(g, _)| in_set(&p.core_genes, g))
            .map(|(_, n)| *n)
            .collect();
        if !core.is_empty() {
            return Some(if core.iter().any(|n| *n >= 2) { p.biallelic_score } else { p.core_score });
        }
        if counts.keys().any(|g| in_set(&p.extended_genes, g)) {
            return Some(p.extended_score);
        }
        if let Some(g) = primary_gene.map(str::trim) {
            if in_set(&p.core_genes, g) {
                return Some(p.core_score);
            }
            if in_set(&p.extended_genes, g) {
                return Some(p.extended_score);
            }
        }
        p.default_score
    }
}

#[derive(Default)]
struct Accumulator {
    totals: BTreeMap<Axis, (f64, usize)>,
    tp53: (f64, usize),
}

impl Accumulator {
    fn add(&mut self, axis: Option<Axis>, value: f64) {
        let slot = match axis {
            Some(a) => self.totals.entry(a).or_insert((0.0, 0)),
            None => &mut self.tp53,
        };
        slot.0 += value;
        slot.1 += 1;
    }

    fn finish(self, scale: impl Fn(f64) -> f64) -> PathwayScores {
        let mean = |(total, n): (f64, usize)| if n == 0 { 0.0 } else { scale(total / n as f64) };
        PathwayScores {
            axes: self.totals.into_iter().map(|(a, t)| (a, mean(t))).collect(),
            tp53: mean(self.tp53),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cfg() -> VectorConfig {
        VectorConfig::default()
    }

    fn mutation(gene: &str, consequence: &str, impact: &str) -> Mutation {
        Mutation {
            gene: gene.into(),
            consequence: (!consequence.is_empty()).then(|| consequence.into()),
            impact: (!impact.is_empty()).then(|| impact.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_biomarker_vector() {
        let c = cfg();
        let b = VectorBuilder::new(&c);
        let bm = Biomarkers {
            hrd_proxy: Some("HRD-High".into()),
            tmb: Some(22.0),
            ..Default::default()
        };
        assert_eq!(b.from_biomarkers(&bm).values(), &[0.8, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_brca_somatic_lifts_ddr() {
        let c = cfg();
        let b = VectorBuilder::new(&c);
        let bm = Biomarkers { hrd_proxy: Some("hrd-low".into()), brca_somatic: true, ..Default::default() };
        assert_eq!(b.ddr_from_biomarkers(&bm), 0.95);
    }

    #[test]
    fn test_numeric_hrd_maps_to_bucket() {
        let c = cfg();
        let b = VectorBuilder::new(&c);
        let at = |s: f64| b.ddr_from_biomarkers(&Biomarkers { hrd_score: Some(s), ..Default::default() });
        assert_eq!(at(50.0), 0.8);
        assert_eq!(at(35.0), 0.4);
        assert_eq!(at(10.0), 0.1);
    }

    #[test]
    fn test_io_step_function() {
        let c = cfg();
        let b = VectorBuilder::new(&c);
        let io = |tmb: Option<f64>, msi: Option<&str>| {
            b.io_from_biomarkers(&Biomarkers { tmb, msi_status: msi.map(String::from), ..Default::default() })
        };
        assert_eq!(io(Some(20.0), None), 1.0);
        assert_eq!(io(Some(12.0), None), 0.5);
        assert_eq!(io(Some(3.0), None), 0.0);
        assert_eq!(io(None, Some("MSI-H")), 1.0);
        assert_eq!(io(None, None), 0.0);
    }

    #[test]
    fn test_missing_biomarkers_zero_fill() {
        let c = cfg();
        let v = VectorBuilder::new(&c).build(&CaseRecord { id: "x".into(), ..Default::default() });
        assert!(v.is_zero());
        assert_eq!(v.len(), 7);
    }

    #[test]
    fn test_variant_weights() {
        let c = cfg();
        let b = VectorBuilder::new(&c);
        assert_eq!(b.variant_weight(&mutation("BRCA2", "frameshift_variant", "")), 1.0);
        assert_eq!(b.variant_weight(&mutation("BRCA2", "missense_variant", "")), 0.2);
        assert_eq!(b.variant_weight(&mutation("BRCA2", "synonymous_variant", "HIGH")), 0.0);
        assert_eq!(b.variant_weight(&mutation("BRCA2", "", "HIGH")), 0.6);
        assert_eq!(b.variant_weight(&mutation("BRCA2", "", "modifier")), 0.0);
        assert_eq!(b.variant_weight(&mutation("BRCA2", "", "")), 0.05);
        // hotspot lift
        assert_eq!(b.variant_weight(&mutation("KRAS", "missense_variant", "")), 0.6);
    }

    #[test]
    fn test_weighted_pathway_mean_and_tp53_fold() {
        let c = cfg();
        let b = VectorBuilder::new(&c);
        let muts = vec![
            mutation("BRCA1", "stop_gained", ""),
            mutation("ATM", "missense_variant", ""),
            mutation("TP53", "missense_variant", ""),
            mutation("TTN", "frameshift_variant", ""),
        ];
        let scores = b.weighted_pathway_scores(&muts);
        assert!((scores.get(Axis::Ddr) - 0.6).abs() < 1e-12);
        assert!((scores.tp53 - 0.6).abs() < 1e-12);

        let v = b.from_pathway_scores(&scores);
        assert!((v.ddr() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_disruption_scaling() {
        let c = cfg();
        let b = VectorBuilder::new(&c);
        assert_eq!(b.scale_disruption(1e-7), 0.0);
        assert_eq!(b.scale_disruption(5e-3), 1.0);
        assert!((b.scale_disruption(5.005e-4) - 0.5).abs() < 1e-9);
        assert_eq!(b.scale_disruption(f64::NAN), 0.0);

        let scored = vec![ScoredVariant { gene: "KRAS".into(), disruption: 2e-3 }];
        assert_eq!(b.disruption_pathway_scores(&scored).get(Axis::Mapk), 1.0);
    }

    #[test]
    fn test_hrd_proxy_tiers() {
        let c = cfg();
        let b = VectorBuilder::new(&c);
        let m = |g: &str| mutation(g, "", "");
        assert_eq!(b.hrd_proxy_from_mutations(&[], None), None);
        assert_eq!(b.hrd_proxy_from_mutations(&[m("PALB2")], None), Some(55.0));
        assert_eq!(b.hrd_proxy_from_mutations(&[m("BRCA2"), m("brca2")], None), Some(65.0));
        assert_eq!(b.hrd_proxy_from_mutations(&[m("CDK12")], None), Some(45.0));
        assert_eq!(b.hrd_proxy_from_mutations(&[m("KRAS")], Some("BRCA1")), Some(55.0));
        assert_eq!(b.hrd_proxy_from_mutations(&[m("KRAS")], None), None);
    }

    #[test]
    fn test_case_merges_mutation_axes() {
        let c = cfg();
        let b = VectorBuilder::new(&c);
        let case = CaseRecord {
            id: "p1".into(),
            biomarkers: Biomarkers { hrd_proxy: Some("HRD-Intermediate".into()), ..Default::default() },
            mutations: vec![mutation("KRAS", "missense_variant", "")],
            ..Default::default()
        };
        let v = b.build(&case);
        assert_eq!(v.get(Axis::Ddr, Dimensionality::Seven), 0.4);
        assert_eq!(v.get(Axis::Mapk, Dimensionality::Seven), 0.6);
    }
}
