//! Prevalence of patients with at least one well-fitting reference.

use std::path::PathBuf;

use clap::Args;
use mechanyx_common::{CaseRecord, ReferenceCatalog};
use mechanyx_ingestion::load_cohort;
use mechanyx_ranker::{weighted_fit, VectorBuilder};
use serde::Serialize;
use tracing::{info, instrument};

use super::{pct, Context};

#[derive(Debug, Clone, Args)]
pub struct MatchabilityArgs {
    /// Cohort JSON (`{"patients": [...]}` or a bare list).
    #[arg(long)]
    pub cohort: PathBuf,
    #[arg(long)]
    pub catalog: PathBuf,
}

/// A cohort patient's best fit against the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct PatientFit {
    pub patient_id: String,
    pub vector: Vec<f64>,
    pub best_fit: f64,
    /// References fitting above the matchable threshold.
    pub n_matches: usize,
    pub matchable: bool,
    pub os_days: Option<f64>,
    pub os_event: Option<bool>,
}

/// Build each patient's vector and score it against every non-degenerate
/// reference.
pub fn fit_cohort(
    cases: &[CaseRecord],
    catalog: &ReferenceCatalog,
    builder: &VectorBuilder<'_>,
    threshold: f64,
) -> Vec<PatientFit> {
    cases
        .iter()
        .map(|case| {
            let v = builder.build(case);
            let fits: Vec<f64> = catalog
                .iter()
                .filter(|e| !e.moa.is_zero())
                .map(|e| weighted_fit(&v, &e.moa))
                .collect();
            let best_fit = fits.iter().copied().fold(0.0, f64::max);
            let outcomes = case.outcomes.unwrap_or_default();
            PatientFit {
                patient_id: case.id.clone(),
                vector: v.values().to_vec(),
                best_fit,
                n_matches: fits.iter().filter(|f| **f > threshold).count(),
                matchable: best_fit > threshold,
                os_days: outcomes.os_days,
                os_event: outcomes.os_event,
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct Summary {
    n_patients: usize,
    n_trials: usize,
    n_matchable: usize,
    pct_matchable: f64,
    threshold: f64,
}

#[instrument(skip_all, fields(cohort = %args.cohort.display()))]
pub fn run(args: &MatchabilityArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let cases = load_cohort(&args.cohort)?;
    let builder = VectorBuilder::new(&ctx.config.vector);
    let catalog = ReferenceCatalog::load(&args.catalog, builder.dimensionality())?;
    let threshold = ctx.config.metrics.matchable_threshold;

    let fits = fit_cohort(&cases, &catalog, &builder, threshold);
    let n_matchable = fits.iter().filter(|f| f.matchable).count();
    let frac = if fits.is_empty() { 0.0 } else { n_matchable as f64 / fits.len() as f64 };
    let summary = Summary {
        n_patients: fits.len(),
        n_trials: catalog.len(),
        n_matchable,
        pct_matchable: (frac * 100.0 * 1000.0).round() / 1000.0,
        threshold,
    };
    info!(n = summary.n_patients, matchable = n_matchable, "Matchability computed");
    println!(
        "Matchable: {}/{} patients ({}) at fit > {}",
        n_matchable,
        summary.n_patients,
        pct(frac),
        threshold
    );

    let receipt = ctx
        .receipt("real_cohort_matchability")
        .with_parameters(&serde_json::json!({
            "matchable_threshold": threshold,
            "metric": "weighted_fit",
            "dimensionality": builder.dimensionality(),
        }))?
        .with_input(&args.cohort)?
        .with_input(&args.catalog)?
        .with_metrics(&summary)?
        .with_records(&fits)?
        .note("This is a real-cohort prevalence computation, not an outcomes validation.");
    ctx.write(&receipt)
}
