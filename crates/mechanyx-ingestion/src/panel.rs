//! Turn a cell-line mutation panel into per-line pathway features.
//!
//! Lines are processed one after another. Each picked variant is served
//! from the cache or, unless running cache-only, scored through the
//! retrying client. A variant that still fails is recorded and skipped;
//! the batch always completes.

use std::collections::BTreeMap;

use mechanyx_common::{Mutation, Result};
use mechanyx_config::{PathwayConfig, RetryConfig, VariantScoringConfig};
use mechanyx_ranker::{CellLineFeatures, PathwayScorer, ScoredVariant};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cache::VariantCache;
use crate::retry::{with_retry, RetryPolicy};
use crate::scorer::{VariantRequest, VariantScorer};

/// A variant that could not be scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub model_id: String,
    pub variant_key: String,
    pub error: String,
    pub attempts: u32,
    pub rate_limited: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringStats {
    pub lines: usize,
    pub variants_considered: usize,
    pub cache_hits: usize,
    pub scored_remote: usize,
    /// Not in the cache while running cache-only.
    pub skipped_uncached: usize,
    /// Missing coordinates or reference allele.
    pub skipped_incomplete: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PanelScoring {
    pub features: BTreeMap<String, CellLineFeatures>,
    pub errors: Vec<ItemError>,
    pub stats: ScoringStats,
}

pub struct PanelScorer<'a> {
    pathways: PathwayScorer<'a>,
    client: Option<&'a dyn VariantScorer>,
    policy: RetryPolicy,
    genome: String,
    use_cache_only: bool,
    flush_every: usize,
    max_variants: usize,
}

impl<'a> PanelScorer<'a> {
    /// `client` may be `None`, which behaves as cache-only.
    pub fn new(
        pathways: &'a PathwayConfig,
        scoring: &VariantScoringConfig,
        retry: &RetryConfig,
        max_variants: usize,
        client: Option<&'a dyn VariantScorer>,
    ) -> Self {
        Self {
            pathways: PathwayScorer::new(pathways),
            client,
            policy: RetryPolicy::from(retry),
            genome: scoring.genome.clone(),
            use_cache_only: scoring.use_cache_only || client.is_none(),
            flush_every: scoring.flush_every.max(1),
            max_variants,
        }
    }

    /// Score every `(model_id, lineage)` in order. Lines without
    /// mutations get empty features.
    #[instrument(skip_all, fields(lines = lines.len(), cache_only = self.use_cache_only))]
    pub async fn score_panel(
        &self,
        lines: &[(String, String)],
        mutations: &BTreeMap<String, Vec<Mutation>>,
        cache: &mut VariantCache,
    ) -> Result<PanelScoring> {
        let mut out = PanelScoring::default();
        for (i, (model_id, lineage)) in lines.iter().enumerate() {
            let muts = mutations.get(model_id).map(Vec::as_slice).unwrap_or(&[]);
            let f = self.score_line(model_id, lineage, muts, cache, &mut out).await;
            info!(
                line = i + 1,
                total = lines.len(),
                model_id = %model_id,
                scored = f.n_variants_scored,
                considered = f.n_variants_considered,
                cache_keys = cache.len(),
                "Scored cell line"
            );
            out.features.insert(model_id.clone(), f);
            out.stats.lines += 1;
            if (i + 1) % self.flush_every == 0 {
                cache.flush()?;
            }
        }
        cache.flush()?;
        Ok(out)
    }

    async fn score_line(
        &self,
        model_id: &str,
        lineage: &str,
        mutations: &[Mutation],
        cache: &mut VariantCache,
        out: &mut PanelScoring,
    ) -> CellLineFeatures {
        let picked = self.pathways.pick_variants(mutations, self.max_variants);
        out.stats.variants_considered += picked.len();
        let mut scored = Vec::new();

        for m in &picked {
            let Some(req) = VariantRequest::from_mutation(m, &self.genome) else {
                out.stats.skipped_incomplete += 1;
                continue;
            };
            if let Some(hit) = cache.get(&req.key) {
                out.stats.cache_hits += 1;
                scored.push(ScoredVariant { gene: req.gene.clone(), disruption: hit.disruption });
                continue;
            }
            let Some(client) = self.client.filter(|_| !self.use_cache_only) else {
                out.stats.skipped_uncached += 1;
                continue;
            };
            let request = &req;
            match with_retry(&self.policy, &req.key, move || client.score(request)).await {
                Ok(score) => {
                    out.stats.scored_remote += 1;
                    scored.push(ScoredVariant { gene: req.gene.clone(), disruption: score.disruption });
                    cache.insert(req.key.clone(), score);
                }
                Err(failure) => {
                    warn!(model_id, key = %req.key, error = %failure.message, "Variant scoring failed");
                    out.stats.failed += 1;
                    out.errors.push(ItemError {
                        model_id: model_id.to_string(),
                        variant_key: req.key.clone(),
                        error: failure.message,
                        attempts: failure.attempts,
                        rate_limited: failure.rate_limited,
                    });
                }
            }
        }
        self.pathways.features(model_id, lineage, &scored, picked.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::MockVariantScorer;
    use mechanyx_test_utils::snv;
    use pretty_assertions::assert_eq;

    fn quick_retry() -> RetryConfig {
        RetryConfig { max_attempts: 2, backoff_base_secs: 0.0, error_delay_secs: 0.0, ..Default::default() }
    }

    fn panel() -> BTreeMap<String, Vec<Mutation>> {
        BTreeMap::from([
            (
                "L1".to_string(),
                vec![
                    snv("BRCA2", "13", 100, "C", "T", "HIGH"),
                    snv("KRAS", "12", 200, "C", "A", "MODERATE"),
                ],
            ),
            ("L2".to_string(), vec![snv("TP53", "17", 300, "G", "A", "MODERATE")]),
        ])
    }

    #[tokio::test]
    async fn test_scores_and_records_failures() {
        let mock = MockVariantScorer::new()
            .with("hg38:chr13:100:C:T", 0.8)
            .failing("hg38:chr17:300:G:A");
        let pathways = PathwayConfig::default();
        let scoring = VariantScoringConfig::default();
        let scorer = PanelScorer::new(&pathways, &scoring, &quick_retry(), 12, Some(&mock));
        let lines = vec![("L1".to_string(), "Breast".to_string()), ("L2".to_string(), "Lung".to_string())];
        let mut cache = VariantCache::in_memory();

        let out = scorer.score_panel(&lines, &panel(), &mut cache).await.unwrap();
        assert_eq!(out.features["L1"].hrr_max, 0.8);
        assert_eq!(out.features["L1"].n_variants_scored, 2);
        assert_eq!(out.features["L2"].n_variants_scored, 0);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].attempts, 2);
        assert_eq!(out.stats.scored_remote, 2);
        assert_eq!(cache.len(), 2);
        // one call each for L1, two attempts for the failing L2 variant
        assert_eq!(mock.calls(), 4);
    }

    #[tokio::test]
    async fn test_cache_only_never_calls_client() {
        let mock = MockVariantScorer::new();
        let pathways = PathwayConfig::default();
        let scoring = VariantScoringConfig { use_cache_only: true, ..Default::default() };
        let scorer = PanelScorer::new(&pathways, &scoring, &quick_retry(), 12, Some(&mock));
        let mut cache = VariantCache::in_memory();
        cache.insert(
            "hg38:chr17:300:G:A".into(),
            crate::scorer::VariantScore::from_deltas(Some(-0.4), None, serde_json::Value::Null),
        );
        let lines = vec![("L1".to_string(), "Breast".to_string()), ("L2".to_string(), "Lung".to_string())];

        let out = scorer.score_panel(&lines, &panel(), &mut cache).await.unwrap();
        assert_eq!(mock.calls(), 0);
        assert_eq!(out.stats.skipped_uncached, 2);
        assert_eq!(out.stats.cache_hits, 1);
        assert_eq!(out.features["L2"].checkpoint_max, 0.4);
    }
}
