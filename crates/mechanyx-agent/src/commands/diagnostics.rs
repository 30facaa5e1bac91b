//! Diagnostic accuracy and two-arm risk statistics from a small JSON table.
//!
//! ```json
//! {
//!   "counts": {"tp": 8, "fp": 1, "tn": 9, "fn": 2},
//!   "pairs": [{"truth": true, "pred": false}],
//!   "arms": {"control": {"events": 12, "total": 40}, "intervention": {"events": 5, "total": 41}}
//! }
//! ```
//!
//! `counts` and `pairs` are alternatives; when both are given their
//! counts are summed. At least one section must be present.

use std::path::{Path, PathBuf};

use clap::Args;
use mechanyx_common::MechanyxError;
use mechanyx_metrics::{BinaryCounts, Diagnostics, RiskComparison, Z_95};
use serde::Deserialize;
use tracing::{info, instrument};

use super::Context;

#[derive(Debug, Clone, Args)]
pub struct DiagnosticsArgs {
    #[arg(long)]
    pub table: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Pair {
    truth: bool,
    pred: bool,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ArmCounts {
    events: u64,
    total: u64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Arms {
    control: ArmCounts,
    intervention: ArmCounts,
}

#[derive(Debug, Default, Deserialize)]
struct Table {
    #[serde(default)]
    counts: Option<BinaryCounts>,
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
    #[serde(default)]
    arms: Option<Arms>,
}

fn load_table(path: &Path) -> mechanyx_common::Result<Table> {
    if !path.exists() {
        return Err(MechanyxError::MissingInput(path.to_path_buf()));
    }
    let table: Table = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    if table.counts.is_none() && table.pairs.is_none() && table.arms.is_none() {
        return Err(MechanyxError::InvalidInput(format!(
            "{} has none of counts, pairs or arms",
            path.display()
        )));
    }
    if let Some(arms) = &table.arms {
        for (name, arm) in [("control", arms.control), ("intervention", arms.intervention)] {
            if arm.events > arm.total {
                return Err(MechanyxError::InvalidInput(format!(
                    "{name} arm has {} events out of {}",
                    arm.events, arm.total
                )));
            }
        }
    }
    Ok(table)
}

fn combined_counts(table: &Table) -> Option<BinaryCounts> {
    let from_pairs = table
        .pairs
        .as_ref()
        .map(|p| BinaryCounts::from_pairs(p.iter().map(|x| (x.truth, x.pred))));
    match (table.counts, from_pairs) {
        (Some(a), Some(b)) => Some(BinaryCounts {
            tp: a.tp + b.tp,
            fp: a.fp + b.fp,
            tn: a.tn + b.tn,
            fn_: a.fn_ + b.fn_,
        }),
        (a, b) => a.or(b),
    }
}

#[instrument(skip_all, fields(table = %args.table.display()))]
pub fn run(args: &DiagnosticsArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let table = load_table(&args.table)?;

    let diagnostics = combined_counts(&table).map(|c| Diagnostics::compute(c, Z_95));
    let risk = table.arms.map(|a| {
        RiskComparison::compute(a.control.events, a.control.total, a.intervention.events, a.intervention.total)
    });

    if let Some(d) = &diagnostics {
        let show = |p: Option<mechanyx_metrics::Proportion>| {
            p.map_or("n/a".to_string(), |p| format!("{:.3} [{:.3}, {:.3}]", p.value, p.ci_low, p.ci_high))
        };
        println!("Sensitivity {}", show(d.sensitivity));
        println!("Specificity {}", show(d.specificity));
        println!("PPV {}  NPV {}", show(d.ppv), show(d.npv));
    }
    if let Some(r) = &risk {
        println!(
            "ARR {:?}  RR {:?}  RRR {:?}  Fisher p={:.4}",
            r.arr, r.rr, r.rrr, r.fisher_two_sided_p
        );
    }
    info!(diagnostics = diagnostics.is_some(), risk = risk.is_some(), "Diagnostics computed");

    let receipt = ctx
        .receipt("diagnostic_metrics")
        .with_parameters(&serde_json::json!({ "z": Z_95, "interval": "wilson" }))?
        .with_input(&args.table)?
        .with_metrics(&serde_json::json!({
            "diagnostics": diagnostics,
            "risk": risk,
        }))?;
    ctx.write(&receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechanyx_test_utils::{temp_dir, write_fixture};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counts_and_pairs_are_summed() {
        let table: Table = serde_json::from_str(
            r#"{"counts": {"tp": 1, "fp": 0, "tn": 2, "fn": 0},
                "pairs": [{"truth": true, "pred": false}, {"truth": false, "pred": true}]}"#,
        )
        .unwrap();
        assert_eq!(combined_counts(&table), Some(BinaryCounts { tp: 1, fp: 1, tn: 2, fn_: 1 }));
    }

    #[test]
    fn test_rejects_impossible_arm() {
        let dir = temp_dir();
        let path = write_fixture(
            dir.path(),
            "t.json",
            r#"{"arms": {"control": {"events": 5, "total": 4}, "intervention": {"events": 1, "total": 4}}}"#,
        );
        let err = load_table(&path).unwrap_err();
        assert!(err.is_refusal());
    }
}
