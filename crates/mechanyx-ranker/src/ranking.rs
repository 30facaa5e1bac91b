//! Catalog ranking.

use std::cmp::Ordering;

use mechanyx_common::{MechanismVector, ReferenceCatalog};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::similarity::Metric;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub id: String,
    pub score: f64,
}

impl ScoredCandidate {
    /// Score descending, then id ascending.
    pub fn rank_order(a: &Self, b: &Self) -> Ordering {
        b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Ranker {
    pub metric: Metric,
    /// Leave zero-norm references out of the ranking entirely.
    pub skip_degenerate: bool,
}

impl Default for Ranker {
    fn default() -> Self {
        Self { metric: Metric::WeightedFit, skip_degenerate: false }
    }
}

impl Ranker {
    pub fn new(metric: Metric) -> Self {
        Self { metric, ..Self::default() }
    }

    pub fn skip_degenerate(mut self, skip: bool) -> Self {
        self.skip_degenerate = skip;
        self
    }

    pub fn rank(&self, query: &MechanismVector, catalog: &ReferenceCatalog) -> Vec<ScoredCandidate> {
        let mut out: Vec<ScoredCandidate> = catalog
            .iter()
            .filter(|e| !(self.skip_degenerate && e.moa.is_zero()))
            .map(|e| ScoredCandidate { id: e.id.clone(), score: self.metric.score(query, &e.moa) })
            .collect();
        out.sort_by(ScoredCandidate::rank_order);
        debug!(metric = self.metric.as_str(), n = out.len(), "Ranked catalog");
        out
    }

    pub fn top_k(&self, query: &MechanismVector, catalog: &ReferenceCatalog, k: usize) -> Vec<ScoredCandidate> {
        let mut ranked = self.rank(query, catalog);
        ranked.truncate(k);
        ranked
    }

    /// Highest score in the catalog, `0.0` when nothing is ranked.
    pub fn best_score(&self, query: &MechanismVector, catalog: &ReferenceCatalog) -> f64 {
        self.rank(query, catalog).first().map_or(0.0, |c| c.score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechanyx_common::Dimensionality;
    use pretty_assertions::assert_eq;

    fn catalog() -> ReferenceCatalog {
        ReferenceCatalog::from_json_str(
            r#"{
                "NCT-B": {"moa_vector": {"ddr": 1.0}},
                "NCT-A": {"moa_vector": {"ddr": 1.0}},
                "NCT-C": {"moa_vector": {"mapk": 1.0}},
                "NCT-Z": {"moa_vector": {}}
            }"#,
            Dimensionality::Seven,
        )
        .unwrap()
    }

    #[test]
    fn test_ties_broken_by_id() {
        let q = MechanismVector::new(vec![0.9, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let ids: Vec<String> = Ranker::default().rank(&q, &catalog()).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["NCT-A", "NCT-B", "NCT-C", "NCT-Z"]);
    }

    #[test]
    fn test_skip_degenerate_drops_zero_vectors() {
        let q = MechanismVector::new(vec![0.9, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let ranked = Ranker::default().skip_degenerate(true).rank(&q, &catalog());
        assert_eq!(ranked.len(), 3);
        assert!(ranked.iter().all(|c| c.id != "NCT-Z"));
    }

    #[test]
    fn test_top_k_and_best_score() {
        let q = MechanismVector::new(vec![0.88, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let r = Ranker::default();
        assert_eq!(r.top_k(&q, &catalog(), 2).len(), 2);
        assert!((r.best_score(&q, &catalog()) - 0.88).abs() < 1e-12);
        assert_eq!(r.best_score(&q, &ReferenceCatalog::default()), 0.0);
    }
}
