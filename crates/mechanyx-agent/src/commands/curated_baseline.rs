//! Curated DDR-gene rule as a baseline on synthetic-lethality cases.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Args;
use mechanyx_common::DrugClass;
use mechanyx_ingestion::{load_sl_cases, SlCase};
use mechanyx_metrics::{mean, Bootstrap, Interval};
use mechanyx_ranker::PathwayScorer;
use serde::Serialize;
use tracing::{info, instrument};

use super::{pct, Context};

/// Drug named whenever the rule fires.
pub const PARP_DRUG: &str = "olaparib";

#[derive(Debug, Clone, Args)]
pub struct CuratedBaselineArgs {
    /// Synthetic-lethality cases (bare list or `{"cases": [...]}`).
    #[arg(long)]
    pub cases: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseRow {
    pub case_id: String,
    pub is_positive: bool,
    pub genes: Vec<String>,
    pub gt_drugs: Vec<String>,
    pub rule_fires: bool,
    pub prediction: Option<String>,
    /// Positives: the predicted drug is effective. Negatives: the rule
    /// stayed silent.
    pub correct: bool,
}

#[derive(Debug, Serialize)]
struct Estimate {
    value: f64,
    ci: Option<Interval>,
    n: usize,
}

impl Estimate {
    fn of(outcomes: &[bool], boot: &Bootstrap) -> Self {
        let as_f64: Vec<f64> = outcomes.iter().map(|b| if *b { 1.0 } else { 0.0 }).collect();
        Self { value: mean(&as_f64), ci: boot.bernoulli(outcomes), n: outcomes.len() }
    }
}

pub fn evaluate_cases(cases: &[SlCase], scorer: &PathwayScorer<'_>) -> Vec<CaseRow> {
    cases
        .iter()
        .map(|c| {
            let rule_fires = scorer.curated_baseline(&c.mutations) == DrugClass::Parp;
            let gt_drugs = c.effective_drugs();
            let prediction = rule_fires.then(|| PARP_DRUG.to_string());
            let correct = if c.is_positive() {
                rule_fires && gt_drugs.iter().any(|d| d == PARP_DRUG)
            } else {
                !rule_fires
            };
            let genes: BTreeSet<String> = c.mutations.iter().map(|m| m.gene_upper()).collect();
            CaseRow {
                case_id: c.case_id.clone(),
                is_positive: c.is_positive(),
                genes: genes.into_iter().collect(),
                gt_drugs,
                rule_fires,
                prediction,
                correct,
            }
        })
        .collect()
}

#[instrument(skip_all, fields(cases = %args.cases.display()))]
pub fn run(args: &CuratedBaselineArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let cases = load_sl_cases(&args.cases)?;
    let scorer = PathwayScorer::new(&ctx.config.pathways);
    let rows = evaluate_cases(&cases, &scorer);
    let boot = ctx.bootstrap();

    let (pos, neg): (Vec<&CaseRow>, Vec<&CaseRow>) = rows.iter().partition(|r| r.is_positive);
    let coverage: Vec<bool> = pos.iter().map(|r| r.rule_fires).collect();
    let at1_all: Vec<bool> = pos.iter().map(|r| r.correct).collect();
    let at1_covered: Vec<bool> = pos.iter().filter(|r| r.rule_fires).map(|r| r.correct).collect();
    let neg_fp: Vec<bool> = neg.iter().map(|r| r.rule_fires).collect();

    let coverage = Estimate::of(&coverage, &boot);
    let drug_at1_all = Estimate::of(&at1_all, &boot);
    let drug_at1_covered = Estimate::of(&at1_covered, &boot);
    let neg_parp_fp = Estimate::of(&neg_fp, &boot);
    info!(n = rows.len(), pos = pos.len(), covered = drug_at1_covered.n, "Curated baseline evaluated");
    println!(
        "Coverage {} | Drug@1 all {} | Drug@1 covered {} | negative PARP FP {}",
        pct(coverage.value),
        pct(drug_at1_all.value),
        pct(drug_at1_covered.value),
        pct(neg_parp_fp.value)
    );
    let metrics = serde_json::json!({
        "n_cases": rows.len(),
        "n_pos": pos.len(),
        "n_neg": neg.len(),
        "n_covered": drug_at1_covered.n,
        "coverage": coverage,
        "drug_at1_all": drug_at1_all,
        "drug_at1_covered": drug_at1_covered,
        "neg_parp_fp": neg_parp_fp,
    });

    let receipt = ctx
        .receipt("curated_ddr_baseline")
        .with_parameters(&serde_json::json!({
            "curated_ddr_genes": ctx.config.pathways.curated_ddr_genes,
            "predicted_drug": PARP_DRUG,
            "bootstrap": boot,
        }))?
        .with_input(&args.cases)?
        .with_metrics(&metrics)?
        .with_records(&rows)?
        .note("Case labels come from the benchmark file; no outcome data is used.");
    ctx.write(&receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechanyx_config::PathwayConfig;
    use mechanyx_ingestion::SlGroundTruth;
    use mechanyx_test_utils::snv;

    fn case(id: &str, gene: &str, positive: bool, drugs: &[&str]) -> SlCase {
        SlCase {
            case_id: id.into(),
            mutations: vec![snv(gene, "1", 1, "A", "G", "HIGH")],
            ground_truth: SlGroundTruth {
                synthetic_lethality_detected: positive,
                effective_drugs: drugs.iter().map(|d| d.to_string()).collect(),
            },
        }
    }

    #[test]
    fn test_rule_correctness() {
        let cfg = PathwayConfig::default();
        let scorer = PathwayScorer::new(&cfg);
        let rows = evaluate_cases(
            &[
                case("pos-hit", "BRCA1", true, &["Olaparib"]),
                case("pos-wrong-drug", "BRCA2", true, &["ceralasertib"]),
                case("pos-miss", "KRAS", true, &["olaparib"]),
                case("neg-fp", "BRCA1", false, &[]),
                case("neg-ok", "KRAS", false, &[]),
            ],
            &scorer,
        );
        let correct: Vec<bool> = rows.iter().map(|r| r.correct).collect();
        assert_eq!(correct, vec![true, false, false, false, true]);
        assert_eq!(rows[0].prediction.as_deref(), Some(PARP_DRUG));
        assert_eq!(rows[2].prediction, None);
    }
}
