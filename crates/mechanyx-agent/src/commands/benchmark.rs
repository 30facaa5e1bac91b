//! Train/test benchmark of the variant-disruption classifiers.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use clap::Args;
use mechanyx_calibrate::{Benchmark, Stratifier};
use mechanyx_ingestion::{load_dose_response, load_models, load_mutations, LabelSet};
use serde::Serialize;
use tracing::{info, instrument};

use super::{load_essentiality, score_panel, Context};

#[derive(Debug, Clone, Args)]
pub struct BenchmarkArgs {
    #[arg(long)]
    pub dose_response: PathBuf,
    #[arg(long)]
    pub models: PathBuf,
    #[arg(long)]
    pub mutations: PathBuf,
    /// Essentiality grounding: a JSON table or a DepMap release directory.
    #[arg(long)]
    pub depmap: PathBuf,
}

#[derive(Debug, Serialize)]
struct Records<'a> {
    scoring_stats: &'a mechanyx_ingestion::ScoringStats,
    scoring_errors: &'a [mechanyx_ingestion::ItemError],
    train_ids: &'a [String],
    test_ids: &'a [String],
}

#[instrument(skip_all)]
pub async fn run(args: &BenchmarkArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let cfg = &ctx.config;
    let training = &cfg.training;

    let source = args.dose_response.display().to_string();
    let rows = load_dose_response(&args.dose_response)?;
    let label_set = LabelSet::derive(&rows, &cfg.pathways, cfg.labels.rule, &source)?;
    let models = load_models(&args.models)?;
    let depmap = load_essentiality(&args.depmap, cfg)?;

    let mut stratifier = Stratifier::new(training.seed);
    let ids = stratifier.subsample(&label_set.labels, training.n_per_class);
    let split = stratifier.split(&ids, &label_set.labels, training.test_frac)?;
    info!(selected = ids.len(), train = split.train.len(), test = split.test.len(), "Panel split");

    let keep: BTreeSet<String> = ids.iter().cloned().collect();
    let mutations = load_mutations(&args.mutations, Some(&keep))?;
    let lines: Vec<(String, String)> = ids
        .iter()
        .map(|id| (id.clone(), models.get(id).cloned().unwrap_or_else(|| "Unknown".to_string())))
        .collect();
    let scoring = score_panel(cfg, &lines, &mutations).await?;

    let labels: BTreeMap<_, _> = label_set
        .labels
        .iter()
        .filter(|(id, _)| keep.contains(*id))
        .map(|(id, c)| (id.clone(), *c))
        .collect();
    let report = Benchmark::new(training, &cfg.pathways, &depmap).run(&scoring.features, &labels, &split)?;

    for m in &report.methods {
        println!(
            "{:<24} test acc {:.3}  macro-F1 {:.3}  PARP FPR {:.3}",
            m.name, m.test.accuracy, m.test.macro_f1, m.test.parp_false_positive_rate
        );
    }
    if !scoring.errors.is_empty() {
        println!("{} variants failed to score; see receipt records", scoring.errors.len());
    }

    let receipt = ctx
        .receipt("variant_benchmark")
        .with_parameters(&serde_json::json!({
            "training": training,
            "variant_scoring": {
                "genome": cfg.variant_scoring.genome,
                "windows": cfg.variant_scoring.windows,
                "use_cache_only": cfg.variant_scoring.use_cache_only,
            },
            "label_rule": cfg.labels.rule,
            "config": cfg.snapshot(),
        }))?
        .with_input(&args.dose_response)?
        .with_input(&args.models)?
        .with_input(&args.mutations)?
        .with_metrics(&report)?
        .with_records(&Records {
            scoring_stats: &scoring.stats,
            scoring_errors: &scoring.errors,
            train_ids: &split.train,
            test_ids: &split.test,
        })?
        .with_label_provenance(label_set.provenance.clone());
    ctx.write(&receipt)
}
