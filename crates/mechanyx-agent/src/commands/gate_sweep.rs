//! Biomarker gate behaviour on a real cohort: threshold sensitivity,
//! clinical subgroups and rank correlations between markers and triggers.

use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use mechanyx_common::CaseRecord;
use mechanyx_config::GateSweepConfig;
use mechanyx_ingestion::load_cohort;
use mechanyx_metrics::spearman;
use mechanyx_ranker::{platinum_group, stage_group, GateTriggers, TriggerRates};
use serde::Serialize;
use tracing::{info, instrument};

use super::Context;

const MIN_CORRELATION_POINTS: usize = 3;

#[derive(Debug, Clone, Args)]
pub struct GateSweepArgs {
    #[arg(long)]
    pub cohort: PathBuf,
}

#[derive(Debug, Serialize)]
struct SweepPoint {
    threshold: f64,
    is_default: bool,
    #[serde(flatten)]
    rates: TriggerRates,
}

#[derive(Debug, Serialize)]
struct Correlation {
    var1: &'static str,
    var2: &'static str,
    spearman: Option<f64>,
    n: usize,
}

fn sweep(cases: &[CaseRecord], gates: &GateSweepConfig) -> (Vec<SweepPoint>, Vec<SweepPoint>) {
    let tmb = gates
        .tmb_thresholds
        .iter()
        .map(|t| SweepPoint {
            threshold: *t,
            is_default: *t == gates.fixed_tmb,
            rates: TriggerRates::for_cases(cases, *t, gates.fixed_hrd),
        })
        .collect();
    let hrd = gates
        .hrd_thresholds
        .iter()
        .map(|h| SweepPoint {
            threshold: *h,
            is_default: *h == gates.fixed_hrd,
            rates: TriggerRates::for_cases(cases, gates.fixed_tmb, *h),
        })
        .collect();
    (tmb, hrd)
}

fn subgroups(
    cases: &[CaseRecord],
    gates: &GateSweepConfig,
    key: fn(&CaseRecord) -> &'static str,
) -> BTreeMap<&'static str, TriggerRates> {
    let mut groups: BTreeMap<&'static str, Vec<&CaseRecord>> = BTreeMap::new();
    for c in cases {
        groups.entry(key(c)).or_default().push(c);
    }
    groups
        .into_iter()
        .map(|(g, members)| (g, TriggerRates::for_cases(members, gates.fixed_tmb, gates.fixed_hrd)))
        .collect()
}

/// Per-case columns; `None` marks a missing marker.
fn columns(cases: &[CaseRecord], gates: &GateSweepConfig) -> Vec<(&'static str, Vec<Option<f64>>)> {
    let flag = |b: bool| Some(if b { 1.0 } else { 0.0 });
    let triggers: Vec<GateTriggers> = cases
        .iter()
        .map(|c| GateTriggers::evaluate(&c.biomarkers, gates.fixed_tmb, gates.fixed_hrd))
        .collect();
    vec![
        ("tmb", cases.iter().map(|c| c.biomarkers.tmb).collect()),
        ("hrd", cases.iter().map(|c| c.biomarkers.hrd_score).collect()),
        ("msi_high", cases.iter().map(|c| flag(c.biomarkers.is_msi_high())).collect()),
        ("brca_any", cases.iter().map(|c| flag(c.biomarkers.brca_somatic)).collect()),
        ("io_boost", triggers.iter().map(|t| flag(t.io_boost)).collect()),
        ("parp_rescue", triggers.iter().map(|t| flag(t.parp_rescue)).collect()),
        ("parp_penalty", triggers.iter().map(|t| flag(t.parp_penalty)).collect()),
    ]
}

/// Pairwise-complete Spearman for every unordered pair of columns.
fn coherence(cols: &[(&'static str, Vec<Option<f64>>)]) -> Vec<Correlation> {
    let mut out = Vec::new();
    for (i, (n1, a)) in cols.iter().enumerate() {
        for (n2, b) in &cols[i + 1..] {
            let (x, y): (Vec<f64>, Vec<f64>) = a
                .iter()
                .zip(b)
                .filter_map(|(p, q)| Some(((*p)?, (*q)?)))
                .unzip();
            let rho = if x.len() >= MIN_CORRELATION_POINTS { spearman(&x, &y) } else { None };
            out.push(Correlation { var1: *n1, var2: *n2, spearman: rho, n: x.len() });
        }
    }
    out
}

#[instrument(skip_all, fields(cohort = %args.cohort.display()))]
pub fn run(args: &GateSweepArgs, ctx: &Context) -> anyhow::Result<PathBuf> {
    let cases = load_cohort(&args.cohort)?;
    let gates = &ctx.config.gates;

    let (tmb_sweep, hrd_sweep) = sweep(&cases, gates);
    let by_stage = subgroups(&cases, gates, |c| stage_group(c.stage.as_deref()));
    let by_platinum = subgroups(&cases, gates, |c| platinum_group(c.platinum_status.as_deref()));
    let correlations = coherence(&columns(&cases, gates));
    let overall = TriggerRates::for_cases(&cases, gates.fixed_tmb, gates.fixed_hrd);

    info!(n = cases.len(), "Gate sweep computed");
    println!("Cohort n={} at TMB>={} / HRD>={}", cases.len(), gates.fixed_tmb, gates.fixed_hrd);
    let show = |r: Option<f64>| r.map_or("n/a".to_string(), super::pct);
    println!(
        "IO boost {} | PARP rescue {} | PARP penalty {}",
        show(overall.io_boost_rate),
        show(overall.parp_rescue_rate),
        show(overall.parp_penalty_rate)
    );

    let receipt = ctx
        .receipt("biomarker_gate_sweep")
        .with_parameters(gates)?
        .with_input(&args.cohort)?
        .with_metrics(&serde_json::json!({
            "overall": overall,
            "threshold_sensitivity": { "tmb": tmb_sweep, "hrd": hrd_sweep },
            "subgroups": { "stage": by_stage, "platinum": by_platinum },
            "biological_coherence": correlations,
        }))?
        .note("Trigger rates describe gate behaviour only; they are not efficacy estimates.");
    ctx.write(&receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechanyx_ingestion::parse_cohort;
    use mechanyx_test_utils::sample_cohort_json;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sweep_marks_default_threshold() {
        let cases = parse_cohort(&sample_cohort_json()).unwrap();
        let gates = GateSweepConfig::default();
        let (tmb, hrd) = sweep(&cases, &gates);
        assert_eq!(tmb.len(), gates.tmb_thresholds.len());
        assert_eq!(hrd.iter().filter(|p| p.is_default).count(), 1);
        assert!(hrd.iter().all(|p| p.rates.n == cases.len()));
    }

    #[test]
    fn test_coherence_pairs_skip_diagonal() {
        let cases = parse_cohort(&sample_cohort_json()).unwrap();
        let gates = GateSweepConfig::default();
        let corr = coherence(&columns(&cases, &gates));
        assert_eq!(corr.len(), 7 * 6 / 2);
        assert!(corr.iter().all(|c| c.var1 != c.var2));
        // hrd is missing for P4, leaving three complete pairs
        let hrd_rescue = corr.iter().find(|c| c.var1 == "hrd" && c.var2 == "parp_rescue").unwrap();
        assert_eq!(hrd_rescue.n, 3);
    }
}
