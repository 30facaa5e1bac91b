//! Reproducibility manifest over the latest receipts.

use std::path::PathBuf;

use clap::Args;
use tracing::instrument;

use super::Context;

#[derive(Debug, Clone, Args)]
pub struct ManifestArgs {
    /// Input files to hash alongside the receipts (catalogs, tables).
    #[arg(long = "input")]
    pub inputs: Vec<PathBuf>,
}

#[instrument(skip_all, fields(inputs = args.inputs.len()))]
pub fn run(args: &ManifestArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let (path, manifest) = ctx.receipts.write_manifest(&ctx.config.version, &args.inputs)?;
    println!(
        "Hashed {} inputs and {} receipts",
        manifest.inputs.len(),
        manifest.outputs.len()
    );
    println!("Wrote manifest: {}", path.display());
    Ok(path)
}
