//! Gating engine: mechanism vector (+ primary gene, HRD score) → drug class.
//!
//! Decision order:
//! 1. gene override, evaluated in configuration order
//! 2. minimum DDR activation (HRD-adjusted when an HRD score is known)
//! 3. best magnitude-weighted fit against class MoA vectors, `≥ min_fit`
//! 4. best-vs-runner-up fit margin (disabled at `0.0`)
//!
//! Every branch falls back to NONE; nothing here can fail.

use std::collections::BTreeMap;

use mechanyx_common::{Direction, DrugClass, MarginRule, MechanismVector, Mutation};
use mechanyx_config::GatingConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::similarity::weighted_fit;

/// Which branch produced the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "branch", rename_all = "snake_case")]
pub enum DecisionPath {
    GeneOverride { gene: String, threshold: f64 },
    BelowActivation { ddr: f64, threshold: f64 },
    BestFit { fit: f64 },
    BelowMinFit { fit: f64, min_fit: f64 },
    AmbiguousFit { best: f64, second: f64, margin: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub class: DrugClass,
    /// Fit per actionable class. Zero when the activation gate fired first.
    pub fits: BTreeMap<DrugClass, f64>,
    pub path: DecisionPath,
}

pub struct GateEngine<'a> {
    cfg: &'a GatingConfig,
    class_vectors: Vec<(DrugClass, MechanismVector)>,
}

impl<'a> GateEngine<'a> {
    pub fn new(cfg: &'a GatingConfig) -> Self {
        let class_vectors = DrugClass::ACTIONABLE
            .iter()
            .filter_map(|c| cfg.class_vector(*c).map(|v| (*c, v)))
            .collect();
        Self { cfg, class_vectors }
    }

    /// DDR threshold used by the activation gate.
    pub fn effective_min_ddr(&self, hrd_score: Option<f64>) -> f64 {
        match hrd_score {
            Some(h) => self.cfg.hrd.adjusted_min_ddr(h),
            None => self.cfg.min_ddr,
        }
    }

    pub fn fits(&self, v: &MechanismVector) -> BTreeMap<DrugClass, f64> {
        self.class_vectors
            .iter()
            .map(|(c, cv)| (*c, weighted_fit(v, cv)))
            .collect()
    }

    pub fn decide(
        &self,
        v: &MechanismVector,
        primary_gene: Option<&str>,
        hrd_score: Option<f64>,
    ) -> Decision {
        let ddr = v.ddr();
        let effective = self.effective_min_ddr(hrd_score);

        if let Some(gene) = primary_gene.map(str::trim).filter(|g| !g.is_empty()) {
            for ov in self.cfg.overrides.iter().filter(|o| o.matches(gene)) {
                let threshold = match hrd_score {
                    Some(_) if ov.hrd_adjusted => ov.min_ddr.min(effective),
                    _ => ov.min_ddr,
                };
                if ddr >= threshold {
                    debug!(gene, class = %ov.class, ddr, threshold, "Gene override fired");
                    return Decision {
                        class: ov.class,
                        fits: self.fits(v),
                        path: DecisionPath::GeneOverride { gene: gene.to_ascii_uppercase(), threshold },
                    };
                }
            }
        }

        if ddr < effective {
            return Decision {
                class: DrugClass::None,
                fits: self.class_vectors.iter().map(|(c, _)| (*c, 0.0)).collect(),
                path: DecisionPath::BelowActivation { ddr, threshold: effective },
            };
        }

        let fits = self.fits(v);
        let mut ordered: Vec<(DrugClass, f64)> = fits.iter().map(|(c, f)| (*c, *f)).collect();
        ordered.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let Some(&(best_class, best)) = ordered.first() else {
            return Decision {
                class: DrugClass::None,
                fits,
                path: DecisionPath::BelowMinFit { fit: 0.0, min_fit: self.cfg.min_fit },
            };
        };
        if best < self.cfg.min_fit {
            return Decision {
                class: DrugClass::None,
                fits,
                path: DecisionPath::BelowMinFit { fit: best, min_fit: self.cfg.min_fit },
            };
        }

        let rule = MarginRule {
            threshold: self.cfg.min_fit,
            min_margin: self.cfg.fit_margin,
            direction: Direction::HigherIsStronger,
        };
        if self.cfg.fit_margin > 0.0 && rule.decide(&fits) == DrugClass::None {
            let second = ordered.get(1).map_or(0.0, |x| x.1);
            return Decision {
                class: DrugClass::None,
                fits,
                path: DecisionPath::AmbiguousFit { best, second, margin: self.cfg.fit_margin },
            };
        }

        Decision { class: best_class, fits, path: DecisionPath::BestFit { fit: best } }
    }

    /// Primary gene for the override layer: the first override set (in
    /// configuration order) with a mutated member; alphabetical within a set.
    pub fn primary_gene_from_mutations(&self, mutations: &[Mutation]) -> Option<String> {
        let mut mutated: Vec<String> = mutations.iter().map(Mutation::gene_upper).collect();
        mutated.sort();
        mutated.dedup();
        self.cfg
            .overrides
            .iter()
            .find_map(|ov| mutated.iter().find(|g| ov.matches(g)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn v6(ddr: f64, mapk: f64) -> MechanismVector {
        MechanismVector::new(vec![ddr, mapk, 0.0, 0.0, 0.0, 0.0])
    }

    #[test]
    fn test_below_activation_is_none_with_zero_fits() {
        let cfg = GatingConfig::default();
        let d = GateEngine::new(&cfg).decide(&v6(0.1, 0.0), None, None);
        assert_eq!(d.class, DrugClass::None);
        assert!(matches!(d.path, DecisionPath::BelowActivation { .. }));
        assert!(d.fits.values().all(|f| *f == 0.0));
        assert_eq!(d.fits.len(), 4);
    }

    #[test]
    fn test_best_fit_picks_parp_for_pure_ddr() {
        let cfg = GatingConfig::default();
        let d = GateEngine::new(&cfg).decide(&v6(0.9, 0.0), None, None);
        assert_eq!(d.class, DrugClass::Parp);
        assert!(matches!(d.path, DecisionPath::BestFit { .. }));
    }

    #[test]
    fn test_mapk_heavy_vector_prefers_wee1() {
        let cfg = GatingConfig::default();
        let d = GateEngine::new(&cfg).decide(&v6(0.4, 0.9), None, None);
        assert_eq!(d.class, DrugClass::Wee1);
    }

    #[test]
    fn test_hrd_adjusts_activation() {
        let cfg = GatingConfig::default();
        let engine = GateEngine::new(&cfg);
        // HRD-low raises the bar above 0.6
        assert_eq!(engine.decide(&v6(0.6, 0.0), None, Some(30.0)).class, DrugClass::None);
        // HRD-high lowers it to 0.45
        assert_eq!(engine.decide(&v6(0.5, 0.0), None, Some(50.0)).class, DrugClass::Parp);
    }

    #[test]
    fn test_gene_override_runs_before_activation_gate() {
        let cfg = GatingConfig::default();
        let engine = GateEngine::new(&cfg);
        // ARID1A at 0.40 beats an HRD-low activation bar of 0.70
        let d = engine.decide(&v6(0.42, 0.0), Some("arid1a"), Some(20.0));
        assert_eq!(d.class, DrugClass::Atr);
        assert!(matches!(d.path, DecisionPath::GeneOverride { .. }));
        // fits are still reported
        assert!(d.fits[&DrugClass::Parp] > 0.0);
    }

    #[test]
    fn test_parp_override_takes_lower_hrd_threshold() {
        let cfg = GatingConfig::default();
        let engine = GateEngine::new(&cfg);
        let d = engine.decide(&v6(0.46, 0.0), Some("BRCA2"), Some(60.0));
        assert_eq!(d.path, DecisionPath::GeneOverride { gene: "BRCA2".into(), threshold: 0.45 });
        // without HRD the override needs 0.50
        let d = engine.decide(&v6(0.46, 0.0), Some("BRCA2"), None);
        assert_eq!(d.class, DrugClass::Parp);
        assert!(matches!(d.path, DecisionPath::BestFit { .. }));
    }

    #[test]
    fn test_fit_margin_gate() {
        let cfg = GatingConfig { fit_margin: 0.2, ..GatingConfig::default() };
        let d = GateEngine::new(&cfg).decide(&v6(0.9, 0.0), None, None);
        assert_eq!(d.class, DrugClass::None);
        assert!(matches!(d.path, DecisionPath::AmbiguousFit { .. }));
    }

    #[test]
    fn test_primary_gene_priority() {
        let cfg = GatingConfig::default();
        let engine = GateEngine::new(&cfg);
        let m = |g: &str| Mutation { gene: g.into(), ..Default::default() };
        assert_eq!(
            engine.primary_gene_from_mutations(&[m("ARID1A"), m("PALB2"), m("BRCA2")]),
            Some("BRCA2".to_string())
        );
        assert_eq!(engine.primary_gene_from_mutations(&[m("CDC25A")]), Some("CDC25A".to_string()));
        assert_eq!(engine.primary_gene_from_mutations(&[m("KRAS")]), None);
    }
}
