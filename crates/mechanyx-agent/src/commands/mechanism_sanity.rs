//! Does a high-DDR patient fit DDR-targeting references better than the rest?

use std::path::PathBuf;

use clap::Args;
use mechanyx_common::{Dimensionality, MechanismVector, ReferenceCatalog};
use mechanyx_metrics::mean;
use mechanyx_ranker::weighted_fit;
use serde::Serialize;
use tracing::{info, instrument};

use super::Context;

/// DDR-high, MAPK-low, everything else near zero.
const PATIENT: [f64; 7] = [0.88, 0.12, 0.05, 0.02, 0.0, 0.0, 0.0];
const DDR_TRIAL_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Args)]
pub struct MechanismSanityArgs {
    #[arg(long)]
    pub catalog: PathBuf,
}

#[derive(Debug, Serialize)]
struct Summary {
    n_trials: usize,
    n_skipped_zero_vector: usize,
    n_ddr_trials: usize,
    n_non_ddr_trials: usize,
    mean_ddr_fit: f64,
    mean_non_ddr_fit: f64,
    separation_delta: f64,
}

#[instrument(skip_all, fields(catalog = %args.catalog.display()))]
pub fn run(args: &MechanismSanityArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let catalog = ReferenceCatalog::load(&args.catalog, Dimensionality::Seven)?;
    let patient = MechanismVector::new(PATIENT.to_vec());

    let mut skipped = 0;
    let (mut ddr_fits, mut other_fits) = (Vec::new(), Vec::new());
    for entry in catalog.iter() {
        if entry.moa.is_zero() {
            skipped += 1;
            continue;
        }
        let fit = weighted_fit(&patient, &entry.moa);
        if entry.moa.ddr() > DDR_TRIAL_THRESHOLD {
            ddr_fits.push(fit);
        } else {
            other_fits.push(fit);
        }
    }

    let summary = Summary {
        n_trials: catalog.len(),
        n_skipped_zero_vector: skipped,
        n_ddr_trials: ddr_fits.len(),
        n_non_ddr_trials: other_fits.len(),
        mean_ddr_fit: mean(&ddr_fits),
        mean_non_ddr_fit: mean(&other_fits),
        separation_delta: mean(&ddr_fits) - mean(&other_fits),
    };
    info!(
        ddr = summary.n_ddr_trials,
        non_ddr = summary.n_non_ddr_trials,
        delta = summary.separation_delta,
        "Mechanism sanity computed"
    );
    println!(
        "DDR trials: {} (mean fit {:.3}); non-DDR: {} (mean fit {:.3}); delta {:.3}",
        summary.n_ddr_trials,
        summary.mean_ddr_fit,
        summary.n_non_ddr_trials,
        summary.mean_non_ddr_fit,
        summary.separation_delta
    );

    let receipt = ctx
        .receipt("mechanism_sanity")
        .with_parameters(&serde_json::json!({
            "patient_vector": PATIENT,
            "ddr_trial_threshold": DDR_TRIAL_THRESHOLD,
            "metric": "weighted_fit",
        }))?
        .with_input(&args.catalog)?
        .with_metrics(&summary)?
        .note("Sanity check of the scoring geometry only; no patient outcomes are involved.");
    ctx.write(&receipt)
}
