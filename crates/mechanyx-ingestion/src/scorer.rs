//! Sequence-disruption scoring for single variants.
//!
//! The HTTP scorer calls a sequence-model service twice per variant:
//!   POST {base}/api/evo/score_variant_multi  -> {"min_delta": ..}
//!   POST {base}/api/evo/score_variant_exon   -> {"exon_delta": ..}
//! and reports `disruption = max(|min_delta|, |exon_delta|)`, treating a
//! missing or non-numeric delta as 0.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use mechanyx_common::{MechanyxError, Mutation, Result};
use mechanyx_config::VariantScoringConfig;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

const MULTI_PATH: &str = "/api/evo/score_variant_multi";
const EXON_PATH: &str = "/api/evo/score_variant_exon";

/// One allele-resolved variant ready to send.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantRequest {
    /// Cache key, `genome:chrN:pos:REF:ALT`.
    #[serde(skip)]
    pub key: String,
    #[serde(skip)]
    pub gene: String,
    pub assembly: String,
    /// Without the `chr` prefix.
    pub chrom: String,
    pub pos: u64,
    #[serde(rename = "ref")]
    pub ref_allele: String,
    pub alt: String,
}

impl VariantRequest {
    /// `None` unless chromosome, position and both alleles are known.
    pub fn from_mutation(m: &Mutation, genome: &str) -> Option<Self> {
        let key = m.variant_key(genome)?;
        let ref_allele = m.ref_allele.as_deref().map(str::trim).filter(|r| !r.is_empty())?;
        let chrom = m.chrom.as_deref()?.trim();
        Some(Self {
            key,
            gene: m.gene_upper(),
            assembly: assembly_for(genome).to_string(),
            chrom: chrom.strip_prefix("chr").unwrap_or(chrom).to_string(),
            pos: m.pos?,
            ref_allele: ref_allele.to_ascii_uppercase(),
            alt: m.alt.as_deref()?.trim().to_ascii_uppercase(),
        })
    }
}

pub fn assembly_for(genome: &str) -> &'static str {
    if genome.eq_ignore_ascii_case("hg38") || genome.eq_ignore_ascii_case("grch38") {
        "GRCh38"
    } else {
        "GRCh37"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantScore {
    #[serde(default)]
    pub min_delta: Option<f64>,
    #[serde(default)]
    pub exon_delta: Option<f64>,
    #[serde(default)]
    pub disruption: f64,
    #[serde(default)]
    pub provenance: Value,
}

impl VariantScore {
    pub fn from_deltas(min_delta: Option<f64>, exon_delta: Option<f64>, provenance: Value) -> Self {
        let abs = |x: Option<f64>| x.filter(|v| v.is_finite()).map_or(0.0, f64::abs);
        Self {
            min_delta,
            exon_delta,
            disruption: abs(min_delta).max(abs(exon_delta)),
            provenance,
        }
    }
}

/// Trait for sequence-disruption backends.
#[async_trait]
pub trait VariantScorer: Send + Sync {
    async fn score(&self, variant: &VariantRequest) -> anyhow::Result<VariantScore>;

    fn name(&self) -> &str;
}

// ── HTTP backend ────────────────────────────────────────────────────────────

pub struct EvoApiScorer {
    client: reqwest::Client,
    api_base: String,
    model_id: String,
    windows: Vec<u32>,
    exon_flank: u32,
}

impl EvoApiScorer {
    pub fn new(cfg: &VariantScoringConfig) -> Result<Self> {
        let api_base = cfg
            .api_base
            .as_deref()
            .map(|b| b.trim_end_matches('/').to_string())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| MechanyxError::Config("variant_scoring.api_base is not set".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base,
            model_id: cfg.model_id.clone(),
            windows: cfg.windows.clone(),
            exon_flank: cfg.exon_flank,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.api_base, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?
            .error_for_status()?;
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl VariantScorer for EvoApiScorer {
    #[instrument(skip(self, variant), fields(key = %variant.key))]
    async fn score(&self, variant: &VariantRequest) -> anyhow::Result<VariantScore> {
        let mut payload = serde_json::to_value(variant)?;
        payload["model_id"] = json!(self.model_id);
        payload["windows"] = json!(self.windows);

        let multi = self.post(MULTI_PATH, &payload).await?;
        let mut exon_payload = payload.clone();
        exon_payload["flank"] = json!(self.exon_flank);
        let exon = self.post(EXON_PATH, &exon_payload).await?;

        let min_delta = multi.get("min_delta").and_then(Value::as_f64);
        let exon_delta = exon.get("exon_delta").and_then(Value::as_f64);
        debug!(?min_delta, ?exon_delta, "Scored variant");

        Ok(VariantScore::from_deltas(
            min_delta,
            exon_delta,
            json!({
                "method": "evo_api_multi_exon",
                "api_base": self.api_base,
                "model_id": self.model_id,
                "windows": self.windows,
                "exon_flank": self.exon_flank,
                "upstream_multi": multi.get("upstream_service"),
                "upstream_exon": exon.get("upstream_service"),
            }),
        ))
    }

    fn name(&self) -> &str {
        "evo_api"
    }
}

// ── Mock Implementation for Testing ────────────────────────────────────────

/// Scores by cache key; unknown keys score 0, failing keys error.
#[derive(Debug, Default)]
pub struct MockVariantScorer {
    scores: HashMap<String, f64>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl MockVariantScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, disruption: f64) -> Self {
        self.scores.insert(key.to_string(), disruption);
        self
    }

    pub fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VariantScorer for MockVariantScorer {
    async fn score(&self, variant: &VariantRequest) -> anyhow::Result<VariantScore> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&variant.key) {
            anyhow::bail!("503 service unavailable for {}", variant.key);
        }
        let d = self.scores.get(&variant.key).copied().unwrap_or(0.0);
        Ok(VariantScore::from_deltas(Some(-d), None, json!({"method": "mock"})))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
