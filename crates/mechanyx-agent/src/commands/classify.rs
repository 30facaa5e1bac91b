//! Gated drug-class classification of a cell-line panel against labels
//! derived from dose response.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use clap::Args;
use mechanyx_common::{Dimensionality, DrugClass, MechanismVector, Mutation};
use mechanyx_ingestion::{load_dose_response, load_hrd_proxy, load_models, load_mutations, LabelSet};
use mechanyx_metrics::{label_distribution, pearson, ClassificationReport};
use mechanyx_ranker::{Decision, GateEngine, PathwayScores, ScoredVariant, VectorBuilder};
use serde::Serialize;
use tracing::{info, instrument};

use super::{score_panel, Context, DimArg};

#[derive(Debug, Clone, Args)]
pub struct ClassifyArgs {
    /// Per-line drug response (`cell_line,drug_name,z_score`).
    #[arg(long)]
    pub dose_response: PathBuf,
    /// Model metadata (`model_id,lineage`).
    #[arg(long)]
    pub models: PathBuf,
    #[arg(long)]
    pub mutations: PathBuf,
    /// Vector layout for gating; defaults to `gating.dimensionality`.
    #[arg(long, value_enum)]
    pub dim: Option<DimArg>,
    /// Only classify the first N labeled lines (id order).
    #[arg(long)]
    pub max_lines: Option<usize>,
    /// Build vectors from variant disruption scores instead of
    /// consequence weights.
    #[arg(long)]
    pub score_variants: bool,
    /// Per-model HRD scores (JSON `{model_id: score}`, a CSV with an
    /// `HRD_SCORE`/`hrd_proxy` column, or a gene-level copy-number CSV).
    /// Lines missing from it fall back to the mutation proxy.
    #[arg(long)]
    pub hrd_proxy: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum HrdSource {
    External,
    Mutations,
}

#[derive(Debug, Serialize)]
struct Prediction {
    model_id: String,
    lineage: String,
    truth: DrugClass,
    predicted: DrugClass,
    ddr: f64,
    vector: Vec<f64>,
    primary_gene: Option<String>,
    hrd_proxy: Option<f64>,
    hrd_source: Option<HrdSource>,
    effective_min_ddr: f64,
    decision: Decision,
}

#[instrument(skip_all, fields(score_variants = args.score_variants))]
pub async fn run(args: &ClassifyArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let cfg = &ctx.config;
    let dim: Dimensionality = args.dim.map(Into::into).unwrap_or(cfg.gating.dimensionality);
    let mut vector_cfg = cfg.vector.clone();
    vector_cfg.dimensionality = dim;
    let mut gating_cfg = cfg.gating.clone();
    gating_cfg.dimensionality = dim;
    let builder = VectorBuilder::new(&vector_cfg);
    let engine = GateEngine::new(&gating_cfg);

    let source = args.dose_response.display().to_string();
    let rows = load_dose_response(&args.dose_response)?;
    let label_set = LabelSet::derive(&rows, &cfg.pathways, cfg.labels.rule, &source)?;
    let models = load_models(&args.models)?;
    let external_hrd = match &args.hrd_proxy {
        Some(path) => load_hrd_proxy(path, &cfg.vector.hrd_proxy)?,
        None => BTreeMap::new(),
    };

    let ids: Vec<String> = label_set
        .labels
        .keys()
        .take(args.max_lines.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    let keep: BTreeSet<String> = ids.iter().cloned().collect();
    let mutations = load_mutations(&args.mutations, Some(&keep))?;
    let lines: Vec<(String, String)> = ids
        .iter()
        .map(|id| (id.clone(), models.get(id).cloned().unwrap_or_else(|| "Unknown".to_string())))
        .collect();
    info!(lines = lines.len(), dim = dim.len(), "Classifying panel");

    let scores: BTreeMap<String, PathwayScores> = if args.score_variants {
        let scoring = score_panel(cfg, &lines, &mutations).await?;
        scoring
            .features
            .iter()
            .map(|(id, f)| {
                let scored: Vec<ScoredVariant> = f
                    .gene_raw_max
                    .iter()
                    .map(|(gene, d)| ScoredVariant { gene: gene.clone(), disruption: *d })
                    .collect();
                (id.clone(), builder.disruption_pathway_scores(&scored))
            })
            .collect()
    } else {
        ids.iter()
            .map(|id| {
                let muts = mutations.get(id).map(Vec::as_slice).unwrap_or(&[]);
                (id.clone(), builder.weighted_pathway_scores(muts))
            })
            .collect()
    };

    let empty: Vec<Mutation> = Vec::new();
    let mut predictions = Vec::with_capacity(lines.len());
    for (id, lineage) in &lines {
        let Some(truth) = label_set.labels.get(id).copied() else { continue };
        let muts = mutations.get(id).unwrap_or(&empty);
        let v = scores
            .get(id)
            .map(|s| builder.from_pathway_scores(s))
            .unwrap_or_else(|| MechanismVector::zeros(dim));
        let primary_gene = engine.primary_gene_from_mutations(muts);
        let (hrd_proxy, hrd_source) = match external_hrd.get(id) {
            Some(score) => (Some(*score), Some(HrdSource::External)),
            None => {
                let proxy = builder.hrd_proxy_from_mutations(muts, None);
                (proxy, proxy.map(|_| HrdSource::Mutations))
            }
        };
        let decision = engine.decide(&v, primary_gene.as_deref(), hrd_proxy);
        predictions.push(Prediction {
            model_id: id.clone(),
            lineage: lineage.clone(),
            truth,
            predicted: decision.class,
            ddr: v.ddr(),
            vector: v.values().to_vec(),
            primary_gene,
            hrd_proxy,
            hrd_source,
            effective_min_ddr: engine.effective_min_ddr(hrd_proxy),
            decision,
        });
    }

    let truth: Vec<DrugClass> = predictions.iter().map(|p| p.truth).collect();
    let pred: Vec<DrugClass> = predictions.iter().map(|p| p.predicted).collect();
    let report = ClassificationReport::evaluate(&truth, &pred);

    // DDR axis against mean PARP response; responders have negative Z.
    let (ddr, parp_z): (Vec<f64>, Vec<f64>) = predictions
        .iter()
        .filter_map(|p| {
            let z = label_set.mean_z.get(&p.model_id)?.get(&DrugClass::Parp)?;
            Some((p.ddr, *z))
        })
        .unzip();
    let ddr_parp_pearson = pearson(&ddr, &parp_z);

    println!(
        "Classified {} lines: accuracy {:.3}, macro-F1 {:.3}, PARP FPR {:.3}",
        report.n, report.accuracy, report.macro_f1, report.parp_false_positive_rate
    );
    if let Some(r) = ddr_parp_pearson {
        println!("Pearson(DDR, mean PARP z) = {r:.3}");
    }

    let n_external_hrd = predictions
        .iter()
        .filter(|p| p.hrd_source == Some(HrdSource::External))
        .count();
    if args.hrd_proxy.is_some() {
        info!(n_external_hrd, "External HRD proxy applied");
    }

    let mut receipt = ctx
        .receipt("gated_classification")
        .with_parameters(&serde_json::json!({
            "dimensionality": dim,
            "score_variants": args.score_variants,
            "max_lines": args.max_lines,
            "hrd_proxy_file": args.hrd_proxy.as_ref().map(|p| p.display().to_string()),
            "gating": &gating_cfg,
            "label_rule": cfg.labels.rule,
        }))?
        .with_input(&args.dose_response)?
        .with_input(&args.models)?
        .with_input(&args.mutations)?
        .with_metrics(&serde_json::json!({
            "report": report,
            "truth_distribution": label_distribution(&truth),
            "predicted_distribution": label_distribution(&pred),
            "ddr_vs_parp_mean_z_pearson": ddr_parp_pearson,
            "n_pearson_points": ddr.len(),
            "n_external_hrd": n_external_hrd,
        }))?
        .with_records(&predictions)?
        .with_label_provenance(label_set.provenance.clone());
    if let Some(path) = &args.hrd_proxy {
        receipt = receipt.with_input(path)?;
    }
    ctx.write(&receipt)
}
