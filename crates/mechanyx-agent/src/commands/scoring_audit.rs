//! Audit of the switch from cosine to magnitude-weighted fit.
//!
//! Two DDR patients of very different intensity score identically under
//! cosine; the weighted fit tells them apart. The prototype section shows
//! what a MAPK-driven and an IO-driven patient would be matched against.

use std::path::PathBuf;

use clap::Args;
use mechanyx_common::{Dimensionality, MechanismVector, ReferenceCatalog};
use mechanyx_ranker::{cosine, weighted_fit, Metric, Ranker};
use serde::Serialize;
use tracing::{info, instrument};

use super::Context;

const TOP_N: usize = 10;

#[derive(Debug, Clone, Args)]
pub struct ScoringAuditArgs {
    #[arg(long)]
    pub catalog: PathBuf,
}

#[derive(Debug, Serialize)]
struct IntensityCase {
    name: &'static str,
    patient_vector: Vec<f64>,
    before_cosine: f64,
    after_weighted: f64,
}

#[derive(Debug, Serialize)]
struct PrototypeMatch {
    trial_id: String,
    fit: f64,
    primary_moa: Option<String>,
}

#[derive(Debug, Serialize)]
struct Prototype {
    name: &'static str,
    patient_vector: Vec<f64>,
    top_matches: Vec<PrototypeMatch>,
}

fn unit(axis: usize, value: f64) -> Vec<f64> {
    let mut v = vec![0.0; Dimensionality::Seven.len()];
    v[axis] = value;
    v
}

fn intensity_cases() -> Vec<IntensityCase> {
    let trial = MechanismVector::new(unit(0, 1.0));
    [("ddr_low", 0.1), ("ddr_high", 0.88)]
        .into_iter()
        .map(|(name, ddr)| {
            let patient = MechanismVector::new(unit(0, ddr));
            IntensityCase {
                name,
                before_cosine: cosine(&patient, &trial),
                after_weighted: weighted_fit(&patient, &trial),
                patient_vector: patient.values().to_vec(),
            }
        })
        .collect()
}

fn prototypes(catalog: &ReferenceCatalog) -> Vec<Prototype> {
    let ranker = Ranker::new(Metric::WeightedFit).skip_degenerate(true);
    [("kras_mapk", unit(1, 0.9)), ("io_high", unit(5, 1.0))]
        .into_iter()
        .map(|(name, values)| {
            let patient = MechanismVector::new(values);
            let top_matches = ranker
                .top_k(&patient, catalog, TOP_N)
                .into_iter()
                .map(|c| PrototypeMatch {
                    primary_moa: catalog.get(&c.id).and_then(|e| e.primary_moa.clone()),
                    trial_id: c.id,
                    fit: c.score,
                })
                .collect();
            Prototype { name, patient_vector: patient.values().to_vec(), top_matches }
        })
        .collect()
}

#[instrument(skip_all, fields(catalog = %args.catalog.display()))]
pub fn run(args: &ScoringAuditArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let catalog = ReferenceCatalog::load(&args.catalog, Dimensionality::Seven)?;
    let cases = intensity_cases();
    let protos = prototypes(&catalog);

    for c in &cases {
        println!("{}: cosine {:.3} -> weighted {:.3}", c.name, c.before_cosine, c.after_weighted);
    }
    for p in &protos {
        let best = p.top_matches.first().map_or(0.0, |m| m.fit);
        println!("{}: {} matches, best fit {:.3}", p.name, p.top_matches.len(), best);
    }
    info!(n_trials = catalog.len(), "Scoring audit computed");

    let receipt = ctx
        .receipt("scoring_audit")
        .with_parameters(&serde_json::json!({ "top_n": TOP_N, "metric": "weighted_fit" }))?
        .with_input(&args.catalog)?
        .with_metrics(&serde_json::json!({
            "intensity_cases": cases,
            "n_trials": catalog.len(),
        }))?
        .with_records(&protos)?
        .note("Zero-vector references are excluded from prototype matching.");
    ctx.write(&receipt)
}
