//! Overall survival of matchable versus non-matchable patients.

use std::path::PathBuf;

use clap::Args;
use mechanyx_common::{MechanyxError, ReferenceCatalog};
use mechanyx_ingestion::load_cohort;
use mechanyx_metrics::{cox_univariate, log_rank, GroupSummary, SurvivalObs, Z_95};
use mechanyx_ranker::VectorBuilder;
use serde::Serialize;
use tracing::{info, instrument, warn};

use super::matchability::fit_cohort;
use super::Context;

#[derive(Debug, Clone, Args)]
pub struct SurvivalArgs {
    #[arg(long)]
    pub cohort: PathBuf,
    #[arg(long)]
    pub catalog: PathBuf,
}

#[derive(Debug, Serialize)]
struct HazardRatio {
    hazard_ratio: f64,
    ci_low: f64,
    ci_high: f64,
    p_value: f64,
    interpretation: &'static str,
}

#[instrument(skip_all, fields(cohort = %args.cohort.display()))]
pub fn run(args: &SurvivalArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let cases = load_cohort(&args.cohort)?;
    let builder = VectorBuilder::new(&ctx.config.vector);
    let catalog = ReferenceCatalog::load(&args.catalog, builder.dimensionality())?;
    let threshold = ctx.config.metrics.matchable_threshold;

    let fits = fit_cohort(&cases, &catalog, &builder, threshold);
    let rows: Vec<(SurvivalObs, bool)> = fits
        .iter()
        .filter_map(|f| match (f.os_days, f.os_event) {
            (Some(time), Some(event)) => Some((SurvivalObs { time, event }, f.matchable)),
            _ => None,
        })
        .collect();
    if rows.is_empty() {
        return Err(MechanyxError::EmptyDataset(format!(
            "no patients with both os_days and os_event in {}",
            args.cohort.display()
        ))
        .into());
    }
    let dropped = fits.len() - rows.len();
    if dropped > 0 {
        warn!(dropped, "Patients without complete survival data excluded");
    }

    let group = |m: bool| -> Vec<SurvivalObs> { rows.iter().filter(|(_, g)| *g == m).map(|(o, _)| *o).collect() };
    let (matchable, rest) = (group(true), group(false));
    let obs: Vec<SurvivalObs> = rows.iter().map(|(o, _)| *o).collect();
    let x: Vec<f64> = rows.iter().map(|(_, g)| if *g { 1.0 } else { 0.0 }).collect();

    let lr = log_rank(&matchable, &rest);
    let cox = cox_univariate(&obs, &x).map(|fit| HazardRatio {
        hazard_ratio: fit.hazard_ratio,
        ci_low: (fit.coef - Z_95 * fit.se).exp(),
        ci_high: (fit.coef + Z_95 * fit.se).exp(),
        p_value: fit.p_value,
        interpretation: "hr_lt_1_better_survival_for_matchable",
    });

    let (sm, sn) = (GroupSummary::of(&matchable), GroupSummary::of(&rest));
    info!(n = obs.len(), matchable = sm.n, "Survival association computed");
    println!("Matchable: n={} events={} median={:?}", sm.n, sm.n_events, sm.median_days);
    println!("Non-matchable: n={} events={} median={:?}", sn.n, sn.n_events, sn.median_days);
    match &cox {
        Some(hr) => println!(
            "HR {:.3} (95% CI {:.3}-{:.3}), p={:.4}",
            hr.hazard_ratio, hr.ci_low, hr.ci_high, hr.p_value
        ),
        None => println!("Cox model not estimable"),
    }

    let receipt = ctx
        .receipt("real_cohort_survival")
        .with_parameters(&serde_json::json!({
            "matchable_threshold": threshold,
            "metric": "weighted_fit",
        }))?
        .with_input(&args.cohort)?
        .with_input(&args.catalog)?
        .with_metrics(&serde_json::json!({
            "n_analyzed": obs.len(),
            "n_excluded_missing_outcome": dropped,
            "groups": { "matchable": sm, "non_matchable": sn },
            "log_rank": lr,
            "cox": cox,
        }))?
        .note("Tests association of matchability with overall survival, not treatment benefit.");
    ctx.write(&receipt)
}
