//! Mechanyx: mechanism-fit scoring and validation jobs.
//! Entry point for the `mechanyx` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use mechanyx_agent::commands::{
    benchmark, classify, curated_baseline, diagnostics, gate_sweep, manifest, matchability,
    mechanism_sanity, rank_eval, scoring_audit, survival, Context,
};
use mechanyx_agent::exit_code;
use mechanyx_config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mechanyx", version, about = "Mechanism-fit scoring and validation receipts")]
struct Cli {
    /// Configuration file (TOML, YAML or JSON). Falls back to
    /// `MECHANYX_CONFIG`, then `mechanyx.toml`, then built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write receipts here instead of a timestamped run directory.
    #[arg(long, global = true)]
    out_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Recall@k and MRR of catalog ranking over a labeled eval set.
    RankEval(rank_eval::RankEvalArgs),
    /// DDR vs non-DDR reference separation for a DDR-high patient.
    MechanismSanity(mechanism_sanity::MechanismSanityArgs),
    /// Cosine vs weighted fit, plus prototype top matches.
    ScoringAudit(scoring_audit::ScoringAuditArgs),
    /// Share of cohort patients with a well-fitting reference.
    Matchability(matchability::MatchabilityArgs),
    /// Overall survival of matchable vs non-matchable patients.
    Survival(survival::SurvivalArgs),
    /// Gated drug-class classification of a cell-line panel.
    Classify(classify::ClassifyArgs),
    /// Train/test benchmark of the variant-disruption classifiers.
    Benchmark(benchmark::BenchmarkArgs),
    /// Curated DDR-gene rule on synthetic-lethality cases.
    CuratedBaseline(curated_baseline::CuratedBaselineArgs),
    /// Biomarker gate threshold sweep on a cohort.
    GateSweep(gate_sweep::GateSweepArgs),
    /// Sensitivity/specificity and risk statistics from a JSON table.
    Diagnostics(diagnostics::DiagnosticsArgs),
    /// SHA-256 manifest of the latest receipts and the given inputs.
    Manifest(manifest::ManifestArgs),
}

async fn dispatch(command: &Command, ctx: &Context) -> anyhow::Result<PathBuf> {
    match command {
        Command::RankEval(a) => rank_eval::run(a, ctx),
        Command::MechanismSanity(a) => mechanism_sanity::run(a, ctx),
        Command::ScoringAudit(a) => scoring_audit::run(a, ctx),
        Command::Matchability(a) => matchability::run(a, ctx),
        Command::Survival(a) => survival::run(a, ctx),
        Command::Classify(a) => classify::run(a, ctx).await,
        Command::Benchmark(a) => benchmark::run(a, ctx).await,
        Command::CuratedBaseline(a) => curated_baseline::run(a, ctx),
        Command::GateSweep(a) => gate_sweep::run(a, ctx),
        Command::Diagnostics(a) => diagnostics::run(a, ctx),
        Command::Manifest(a) => manifest::run(a, ctx),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mechanyx=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::from_path(path),
        None => Config::load(),
    };
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: could not load configuration: {e}");
            std::process::exit(exit_code(&e.into()));
        }
    };
    info!(version = %config.version, "Configuration loaded");

    let ctx = Context::new(config, cli.out_dir.clone());
    if let Err(e) = dispatch(&cli.command, &ctx).await {
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}
