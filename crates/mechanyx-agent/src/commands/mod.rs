//! One module per validation job.
//!
//! Every job follows the same shape: load and validate inputs (refusing
//! with a [`MechanyxError`] when something required is missing or empty),
//! compute, then write a single receipt through the shared [`Context`].
//! Jobs return the path of the receipt they wrote.

pub mod benchmark;
pub mod classify;
pub mod curated_baseline;
pub mod diagnostics;
pub mod gate_sweep;
pub mod manifest;
pub mod matchability;
pub mod mechanism_sanity;
pub mod rank_eval;
pub mod scoring_audit;
pub mod survival;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use mechanyx_common::{Dimensionality, MechanyxError, Mutation};
use mechanyx_config::Config;
use mechanyx_depmap::EssentialityTable;
use mechanyx_ingestion::{default_cache_path, EvoApiScorer, PanelScorer, PanelScoring, VariantCache, VariantScorer};
use mechanyx_metrics::{Bootstrap, Receipt, ReceiptWriter};
use mechanyx_ranker::Metric;
use tracing::{info, warn};

// ── Shared run context ──────────────────────────────────────────────────────

/// Configuration plus the receipt sink for one process run.
pub struct Context {
    pub config: Config,
    pub receipts: ReceiptWriter,
}

impl Context {
    /// Receipts go to `out_dir` when given, else to a fresh timestamped
    /// directory under `paths.receipts_root`.
    pub fn new(config: Config, out_dir: Option<PathBuf>) -> Self {
        let root = PathBuf::from(&config.paths.receipts_root);
        let precision = config.metrics.float_precision;
        let receipts = match out_dir {
            Some(dir) => ReceiptWriter::new(dir, root, precision),
            None => ReceiptWriter::timestamped(root, precision),
        };
        Self { config, receipts }
    }

    pub fn receipt(&self, name: &str) -> Receipt {
        Receipt::new(name, &self.config.version)
    }

    pub fn write(&self, receipt: &Receipt) -> anyhow::Result<PathBuf> {
        let path = self.receipts.write(receipt)?;
        println!("Wrote receipt: {}", path.display());
        Ok(path)
    }

    pub fn bootstrap(&self) -> Bootstrap {
        let m = &self.config.metrics;
        Bootstrap::new(m.bootstrap_resamples, m.bootstrap_seed, m.confidence)
    }
}

// ── Shared CLI values ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MetricArg {
    Cosine,
    WeightedFit,
}

impl From<MetricArg> for Metric {
    fn from(m: MetricArg) -> Self {
        match m {
            MetricArg::Cosine => Metric::Cosine,
            MetricArg::WeightedFit => Metric::WeightedFit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DimArg {
    #[value(name = "6d")]
    Six,
    #[value(name = "7d")]
    Seven,
}

impl From<DimArg> for Dimensionality {
    fn from(d: DimArg) -> Self {
        match d {
            DimArg::Six => Dimensionality::Six,
            DimArg::Seven => Dimensionality::Seven,
        }
    }
}

// ── Shared loaders ──────────────────────────────────────────────────────────

/// A grounding JSON file, or a DepMap release directory restricted to the
/// configured class target genes.
pub fn load_essentiality(path: &Path, config: &Config) -> mechanyx_common::Result<EssentialityTable> {
    if !path.exists() {
        return Err(MechanyxError::MissingInput(path.to_path_buf()));
    }
    if path.is_dir() {
        let genes: Vec<String> = config.pathways.class_targets.values().cloned().collect();
        EssentialityTable::load_depmap_dir(path, Some(genes.as_slice()))
    } else {
        EssentialityTable::load_json(path)
    }
}

/// Score a cell-line panel through the variant cache and, when an API
/// base is configured, the remote scorer. The cache is flushed on return.
pub async fn score_panel(
    config: &Config,
    lines: &[(String, String)],
    mutations: &BTreeMap<String, Vec<Mutation>>,
) -> anyhow::Result<PanelScoring> {
    let scoring = &config.variant_scoring;
    let client = match (&scoring.api_base, scoring.use_cache_only) {
        (Some(_), false) => Some(EvoApiScorer::new(scoring)?),
        _ => None,
    };
    if client.is_none() && !scoring.use_cache_only {
        warn!("variant_scoring.api_base not set; scoring from cache only");
    }
    let cache_path = scoring
        .cache_path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_cache_path);
    let mut cache = VariantCache::open(&cache_path);
    info!(cache = %cache_path.display(), entries = cache.len(), "Variant cache ready");

    let scorer = PanelScorer::new(
        &config.pathways,
        scoring,
        &config.retry,
        config.training.max_variants_per_line,
        client.as_ref().map(|c| c as &dyn VariantScorer),
    );
    Ok(scorer.score_panel(lines, mutations, &mut cache).await?)
}

pub fn pct(x: f64) -> String {
    format!("{:.1}%", x * 100.0)
}
