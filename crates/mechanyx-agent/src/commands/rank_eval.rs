//! Top-k recall and MRR of catalog ranking over a labeled eval set.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use clap::Args;
use mechanyx_common::{Dimensionality, ReferenceCatalog};
use mechanyx_ingestion::load_eval_set;
use mechanyx_metrics::{mean, recall_at_k, reciprocal_rank};
use mechanyx_ranker::{Metric, Ranker, ScoredCandidate};
use serde::Serialize;
use tracing::{info, instrument};

use super::{Context, MetricArg};

const TOP_N: usize = 10;

#[derive(Debug, Clone, Args)]
pub struct RankEvalArgs {
    /// Labeled eval cases (`{"cases": [...]}`).
    #[arg(long)]
    pub eval: PathBuf,
    /// Reference MoA catalog.
    #[arg(long)]
    pub catalog: PathBuf,
    #[arg(long, value_enum, default_value_t = MetricArg::WeightedFit)]
    pub metric: MetricArg,
}

#[derive(Debug, Serialize)]
struct CaseResult {
    case_id: String,
    n_relevant: usize,
    recall: BTreeMap<String, f64>,
    mrr: f64,
    top_10: Vec<ScoredCandidate>,
}

#[derive(Debug, Serialize)]
struct Summary {
    n_cases: usize,
    n_trials: usize,
    recall: BTreeMap<String, f64>,
    mrr: f64,
}

#[instrument(skip_all, fields(eval = %args.eval.display()))]
pub fn run(args: &RankEvalArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    // Every case must carry labels; an unlabeled case refuses the whole run.
    let cases = load_eval_set(&args.eval)?;
    let catalog = ReferenceCatalog::load(&args.catalog, Dimensionality::Seven)?;
    let metric = Metric::from(args.metric);
    let ranker = Ranker::new(metric);
    let ks = &ctx.config.metrics.recall_ks;

    let mut per_case = Vec::with_capacity(cases.len());
    let mut recalls: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut rrs = Vec::with_capacity(cases.len());
    for case in &cases {
        let ranked = ranker.rank(&case.vector(), &catalog);
        let ids: Vec<String> = ranked.iter().map(|c| c.id.clone()).collect();
        let relevant: BTreeSet<String> = case.ground_truth.relevant_trials.iter().cloned().collect();

        let recall: BTreeMap<String, f64> = ks
            .iter()
            .map(|k| (format!("recall_at_{k}"), recall_at_k(&ids, &relevant, *k)))
            .collect();
        for (name, r) in &recall {
            recalls.entry(name.clone()).or_default().push(*r);
        }
        let rr = reciprocal_rank(&ids, case.ground_truth.primary_relevant_trial.as_deref(), &relevant);
        rrs.push(rr);

        per_case.push(CaseResult {
            case_id: case.case_id.clone(),
            n_relevant: relevant.len(),
            recall,
            mrr: rr,
            top_10: ranked.into_iter().take(TOP_N).collect(),
        });
    }

    let summary = Summary {
        n_cases: cases.len(),
        n_trials: catalog.len(),
        recall: recalls.iter().map(|(k, v)| (k.clone(), mean(v))).collect(),
        mrr: mean(&rrs),
    };
    info!(n_cases = summary.n_cases, mrr = summary.mrr, "Ranking evaluated");
    for (k, v) in &summary.recall {
        println!("{k}: {v:.3}");
    }
    println!("MRR: {:.3} over {} cases", summary.mrr, summary.n_cases);

    let receipt = ctx
        .receipt("eval_ranking")
        .with_parameters(&serde_json::json!({
            "metric": metric.as_str(),
            "recall_ks": ks,
        }))?
        .with_input(&args.eval)?
        .with_input(&args.catalog)?
        .with_metrics(&summary)?
        .with_records(&per_case)?
        .note("Metrics are only as valid as the provenance of the eval-set labels.");
    ctx.write(&receipt)
}
