use std::path::Path;

use mechanyx_agent::commands::{
    benchmark, classify, curated_baseline, diagnostics, gate_sweep, manifest, matchability, mechanism_sanity,
    rank_eval, scoring_audit, survival, Context, MetricArg,
};
use mechanyx_agent::exit_code;
use mechanyx_config::Config;
use mechanyx_metrics::{Manifest, Receipt};
use mechanyx_test_utils::{
    sample_catalog_json, sample_cohort_json, sample_dose_response_csv, sample_eval_json, sample_models_csv,
    sample_mutations_csv, temp_dir, write_fixture,
};
use pretty_assertions::assert_eq;
use serde_json::Value;

fn context(dir: &Path) -> Context {
    let mut config = Config::default();
    config.paths.receipts_root = dir.join("receipts").display().to_string();
    Context::new(config, Some(dir.join("run")))
}

#[test]
fn test_rank_eval_perfect_recall_on_sample() {
    let dir = temp_dir();
    let args = rank_eval::RankEvalArgs {
        eval: write_fixture(dir.path(), "eval.json", &sample_eval_json()),
        catalog: write_fixture(dir.path(), "catalog.json", &sample_catalog_json()),
        metric: MetricArg::WeightedFit,
    };
    let ctx = context(dir.path());
    let path = rank_eval::run(&args, &ctx).unwrap();

    let receipt = Receipt::load(&path).unwrap();
    assert_eq!(receipt.name, "eval_ranking");
    assert_eq!(receipt.metrics["n_cases"], 2);
    assert_eq!(receipt.metrics["recall"]["recall_at_3"], 1.0);
    assert_eq!(receipt.metrics["mrr"], 1.0);
    assert_eq!(receipt.inputs.len(), 2);
    assert!(dir.path().join("receipts").join("latest").join("eval_ranking.json").exists());
}

#[test]
fn test_rank_eval_refuses_unlabeled_cases() {
    let dir = temp_dir();
    let eval = r#"{"cases": [{"case_id": "X", "patient_moa_vector_7d": [1,0,0,0,0,0,0],
                             "ground_truth": {"relevant_trials": []}}]}"#;
    let args = rank_eval::RankEvalArgs {
        eval: write_fixture(dir.path(), "eval.json", eval),
        catalog: write_fixture(dir.path(), "catalog.json", &sample_catalog_json()),
        metric: MetricArg::Cosine,
    };
    let err = rank_eval::run(&args, &context(dir.path())).unwrap_err();
    assert_eq!(exit_code(&err), 2);
    assert!(!dir.path().join("run").join("eval_ranking.json").exists());
}

#[test]
fn test_missing_catalog_is_a_refusal() {
    let dir = temp_dir();
    let args = mechanism_sanity::MechanismSanityArgs { catalog: dir.path().join("nope.json") };
    let err = mechanism_sanity::run(&args, &context(dir.path())).unwrap_err();
    assert_eq!(exit_code(&err), 2);
}

#[test]
fn test_mechanism_sanity_separates_ddr_trials() {
    let dir = temp_dir();
    let args = mechanism_sanity::MechanismSanityArgs {
        catalog: write_fixture(dir.path(), "catalog.json", &sample_catalog_json()),
    };
    let receipt = Receipt::load(&mechanism_sanity::run(&args, &context(dir.path())).unwrap()).unwrap();
    let m = &receipt.metrics;
    assert_eq!(m["n_skipped_zero_vector"], 1);
    assert_eq!(m["n_ddr_trials"], 3);
    assert_eq!(m["n_non_ddr_trials"], 2);
    assert!(m["separation_delta"].as_f64().unwrap() > 0.5);
}

#[test]
fn test_scoring_audit_prototypes_skip_empty_reference() {
    let dir = temp_dir();
    let args = scoring_audit::ScoringAuditArgs {
        catalog: write_fixture(dir.path(), "catalog.json", &sample_catalog_json()),
    };
    let receipt = Receipt::load(&scoring_audit::run(&args, &context(dir.path())).unwrap()).unwrap();
    let protos = receipt.records.as_array().unwrap();
    assert_eq!(protos.len(), 2);
    for p in protos {
        let ids: Vec<&str> = p["top_matches"].as_array().unwrap().iter().map(|m| m["trial_id"].as_str().unwrap()).collect();
        assert!(!ids.contains(&"NCT-EMPTY"));
    }
    assert_eq!(protos[1]["top_matches"][0]["trial_id"], "NCT-PD1-01");
}

#[test]
fn test_matchability_and_survival_on_sample_cohort() {
    let dir = temp_dir();
    let cohort = write_fixture(dir.path(), "cohort.json", &sample_cohort_json());
    let catalog = write_fixture(dir.path(), "catalog.json", &sample_catalog_json());
    let ctx = context(dir.path());

    let args = matchability::MatchabilityArgs { cohort: cohort.clone(), catalog: catalog.clone() };
    let receipt = Receipt::load(&matchability::run(&args, &ctx).unwrap()).unwrap();
    assert_eq!(receipt.metrics["n_patients"], 4);
    assert!(receipt.metrics["n_matchable"].as_u64().unwrap() >= 1);
    assert_eq!(receipt.records.as_array().unwrap().len(), 4);

    let args = survival::SurvivalArgs { cohort, catalog };
    let receipt = Receipt::load(&survival::run(&args, &ctx).unwrap()).unwrap();
    assert_eq!(receipt.metrics["n_analyzed"], 4);
    let groups = &receipt.metrics["groups"];
    let n = groups["matchable"]["n"].as_u64().unwrap() + groups["non_matchable"]["n"].as_u64().unwrap();
    assert_eq!(n, 4);
}

#[test]
fn test_survival_refuses_cohort_without_outcomes() {
    let dir = temp_dir();
    let cohort = r#"{"cohort": {"patients": [{"patient_id": "P1", "hrd_proxy": "HRD-High"}]}}"#;
    let args = survival::SurvivalArgs {
        cohort: write_fixture(dir.path(), "cohort.json", cohort),
        catalog: write_fixture(dir.path(), "catalog.json", &sample_catalog_json()),
    };
    let err = survival::run(&args, &context(dir.path())).unwrap_err();
    assert_eq!(exit_code(&err), 2);
}

#[test]
fn test_gate_sweep_writes_receipt() {
    let dir = temp_dir();
    let args = gate_sweep::GateSweepArgs {
        cohort: write_fixture(dir.path(), "cohort.json", &sample_cohort_json()),
    };
    let receipt = Receipt::load(&gate_sweep::run(&args, &context(dir.path())).unwrap()).unwrap();
    assert_eq!(receipt.metrics["overall"]["n"], 4);
    assert_eq!(receipt.metrics["biological_coherence"].as_array().unwrap().len(), 21);
}

#[test]
fn test_diagnostics_refuses_empty_table() {
    let dir = temp_dir();
    let args = diagnostics::DiagnosticsArgs { table: write_fixture(dir.path(), "t.json", "{}") };
    let err = diagnostics::run(&args, &context(dir.path())).unwrap_err();
    assert_eq!(exit_code(&err), 2);
}

#[test]
fn test_diagnostics_from_counts() {
    let dir = temp_dir();
    let table = r#"{"counts": {"tp": 8, "fp": 1, "tn": 9, "fn": 2}}"#;
    let args = diagnostics::DiagnosticsArgs { table: write_fixture(dir.path(), "t.json", table) };
    let receipt = Receipt::load(&diagnostics::run(&args, &context(dir.path())).unwrap()).unwrap();
    assert_eq!(receipt.metrics["diagnostics"]["sensitivity"]["value"], 0.8);
    assert!(receipt.metrics["risk"].is_null());
}

#[tokio::test]
async fn test_classify_carries_label_provenance() {
    let dir = temp_dir();
    let args = classify::ClassifyArgs {
        dose_response: write_fixture(dir.path(), "dr.csv", &sample_dose_response_csv()),
        models: write_fixture(dir.path(), "models.csv", &sample_models_csv()),
        mutations: write_fixture(dir.path(), "muts.csv", &sample_mutations_csv()),
        dim: None,
        max_lines: None,
        score_variants: false,
        hrd_proxy: None,
    };
    let path = classify::run(&args, &context(dir.path())).await.unwrap();
    let receipt = Receipt::load(&path).unwrap();
    let provenance = receipt.label_provenance.unwrap();
    assert!(!provenance.outcomes_validated);
    let n = receipt.metrics["report"]["n"].as_u64().unwrap() as usize;
    assert_eq!(receipt.records.as_array().unwrap().len(), n);
    assert!(n > 0);
}

fn record<'a>(receipt: &'a Receipt, model_id: &str) -> &'a Value {
    receipt
        .records
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["model_id"] == model_id)
        .unwrap()
}

#[tokio::test]
async fn test_classify_prefers_external_hrd_proxy() {
    let dir = temp_dir();
    let args = |hrd_proxy| classify::ClassifyArgs {
        dose_response: write_fixture(dir.path(), "dr.csv", &sample_dose_response_csv()),
        models: write_fixture(dir.path(), "models.csv", &sample_models_csv()),
        mutations: write_fixture(dir.path(), "muts.csv", &sample_mutations_csv()),
        dim: None,
        max_lines: None,
        score_variants: false,
        hrd_proxy,
    };
    let ctx = context(dir.path());

    // No HRR mutation in ACH-000003, so without an external score the
    // plain activation threshold applies.
    let base = Receipt::load(&classify::run(&args(None), &ctx).await.unwrap()).unwrap();
    let line3 = record(&base, "ACH-000003");
    assert!(line3["hrd_proxy"].is_null());
    assert_eq!(line3["effective_min_ddr"], 0.25);

    let hrd = write_fixture(dir.path(), "hrd.json", r#"{"ACH-000003": 12.0}"#);
    let with_hrd = Receipt::load(&classify::run(&args(Some(hrd)), &ctx).await.unwrap()).unwrap();
    let line3 = record(&with_hrd, "ACH-000003");
    assert_eq!(line3["hrd_proxy"], 12.0);
    assert_eq!(line3["hrd_source"], "external");
    assert_eq!(line3["effective_min_ddr"], 0.7);

    // Lines absent from the file keep the mutation proxy (BRCA2 → 55).
    let line1 = record(&with_hrd, "ACH-000001");
    assert_eq!(line1["hrd_source"], "mutations");
    assert_eq!(line1["hrd_proxy"], 55.0);
    assert_eq!(line1["effective_min_ddr"], 0.45);
    assert_eq!(with_hrd.metrics["n_external_hrd"], 1);
    assert_eq!(with_hrd.inputs.len(), 4);
}

#[tokio::test]
async fn test_classify_refuses_missing_hrd_proxy_file() {
    let dir = temp_dir();
    let args = classify::ClassifyArgs {
        dose_response: write_fixture(dir.path(), "dr.csv", &sample_dose_response_csv()),
        models: write_fixture(dir.path(), "models.csv", &sample_models_csv()),
        mutations: write_fixture(dir.path(), "muts.csv", &sample_mutations_csv()),
        dim: None,
        max_lines: None,
        score_variants: false,
        hrd_proxy: Some(dir.path().join("hrd.csv")),
    };
    let err = classify::run(&args, &context(dir.path())).await.unwrap_err();
    assert_eq!(exit_code(&err), 2);
}

const SL_CASES: &str = r#"{"cases": [
  {"case_id": "pos-hit", "mutations": [{"gene": "BRCA1"}],
   "ground_truth": {"synthetic_lethality_detected": true, "effective_drugs": ["Olaparib"]}},
  {"case_id": "pos-wrong-drug", "mutations": [{"gene": "BRCA2"}],
   "ground_truth": {"synthetic_lethality_detected": true, "effective_drugs": ["Ceralasertib"]}},
  {"case_id": "pos-miss", "mutations": [{"gene": "KRAS"}],
   "ground_truth": {"synthetic_lethality_detected": true, "effective_drugs": ["Olaparib"]}},
  {"case_id": "neg-fp", "mutations": [{"gene": "BRCA1"}],
   "ground_truth": {"synthetic_lethality_detected": false}},
  {"case_id": "neg-ok", "mutations": [{"gene": "KRAS"}],
   "ground_truth": {"synthetic_lethality_detected": false}}
]}"#;

#[test]
fn test_curated_baseline_writes_receipt() {
    let dir = temp_dir();
    let args = curated_baseline::CuratedBaselineArgs { cases: write_fixture(dir.path(), "sl.json", SL_CASES) };
    let receipt = Receipt::load(&curated_baseline::run(&args, &context(dir.path())).unwrap()).unwrap();
    let m = &receipt.metrics;
    assert_eq!(receipt.name, "curated_ddr_baseline");
    assert_eq!(m["n_cases"], 5);
    assert_eq!(m["n_pos"], 3);
    assert_eq!(m["n_neg"], 2);
    assert_eq!(m["n_covered"], 2);
    assert!((m["coverage"]["value"].as_f64().unwrap() - 2.0 / 3.0).abs() < 1e-6);
    assert!((m["drug_at1_all"]["value"].as_f64().unwrap() - 1.0 / 3.0).abs() < 1e-6);
    // BRCA2 fires the rule but olaparib is not among its effective drugs
    assert_eq!(m["drug_at1_covered"]["value"], 0.5);
    assert_eq!(m["neg_parp_fp"]["value"], 0.5);

    let rows = receipt.records.as_array().unwrap();
    let correct: Vec<bool> = rows.iter().map(|r| r["correct"].as_bool().unwrap()).collect();
    assert_eq!(correct, vec![true, false, false, false, true]);
    assert_eq!(rows[0]["prediction"], "olaparib");
}

#[test]
fn test_curated_baseline_refuses_empty_or_missing_cases() {
    let dir = temp_dir();
    let ctx = context(dir.path());
    let empty = curated_baseline::CuratedBaselineArgs { cases: write_fixture(dir.path(), "sl.json", "[]") };
    assert_eq!(exit_code(&curated_baseline::run(&empty, &ctx).unwrap_err()), 2);

    let missing = curated_baseline::CuratedBaselineArgs { cases: dir.path().join("none.json") };
    assert_eq!(exit_code(&curated_baseline::run(&missing, &ctx).unwrap_err()), 2);
    assert!(!dir.path().join("run").join("curated_ddr_baseline.json").exists());
}

/// Twelve lines, four per label: PARP and ATR responders plus non-responders.
fn benchmark_panel(dir: &Path) -> benchmark::BenchmarkArgs {
    let mut dose = String::from("cell_line,drug_name,z_score\n");
    let mut models = String::from("model_id,lineage\n");
    let mut muts = String::from("model_id,gene,chrom,pos,ref,alt,variant_type,impact\n");
    for i in 0..12 {
        let id = format!("ACH-{i:06}");
        let (olaparib, azd, gene) = match i % 3 {
            0 => (-2.0, 0.0, "BRCA2"),
            1 => (0.0, -2.0, "ARID1A"),
            _ => (0.3, 0.3, "KRAS"),
        };
        dose.push_str(&format!("{id},Olaparib,{olaparib}\n{id},AZD6738,{azd}\n"));
        models.push_str(&format!("{id},Lung\n"));
        muts.push_str(&format!("{id},{gene},1,{},A,G,snv,HIGH\n", 1000 + i));
    }
    benchmark::BenchmarkArgs {
        dose_response: write_fixture(dir, "dr.csv", &dose),
        models: write_fixture(dir, "models.csv", &models),
        mutations: write_fixture(dir, "muts.csv", &muts),
        depmap: write_fixture(dir, "depmap.json", "{}"),
    }
}

#[tokio::test]
async fn test_benchmark_writes_receipt() {
    let dir = temp_dir();
    let args = benchmark_panel(dir.path());
    let mut ctx = context(dir.path());
    ctx.config.variant_scoring.use_cache_only = true;
    ctx.config.variant_scoring.cache_path = Some(dir.path().join("variant_cache.json").display().to_string());
    ctx.config.training.steps = 100;

    let receipt = Receipt::load(&benchmark::run(&args, &ctx).await.unwrap()).unwrap();
    assert_eq!(receipt.name, "variant_benchmark");
    assert_eq!(receipt.metrics["methods"].as_array().unwrap().len(), 6);
    assert_eq!(receipt.metrics["split"]["n_test"], 3);
    assert_eq!(receipt.metrics["split"]["n_train"], 9);

    let records = &receipt.records;
    assert_eq!(records["scoring_stats"]["lines"], 12);
    // Cache-only with an empty cache: every picked variant is skipped
    assert_eq!(records["scoring_stats"]["scored_remote"], 0);
    let n_ids = records["train_ids"].as_array().unwrap().len() + records["test_ids"].as_array().unwrap().len();
    assert_eq!(n_ids, 12);
    assert_eq!(receipt.parameters["config"]["training"]["steps"], 100);
    assert!(!receipt.label_provenance.unwrap().outcomes_validated);
}

#[tokio::test]
async fn test_benchmark_refuses_missing_grounding() {
    let dir = temp_dir();
    let mut args = benchmark_panel(dir.path());
    args.depmap = dir.path().join("no-depmap.json");
    let err = benchmark::run(&args, &context(dir.path())).await.unwrap_err();
    assert_eq!(exit_code(&err), 2);
}

#[test]
fn test_manifest_covers_latest_receipts() {
    let dir = temp_dir();
    let ctx = context(dir.path());
    let catalog = write_fixture(dir.path(), "catalog.json", &sample_catalog_json());
    mechanism_sanity::run(&mechanism_sanity::MechanismSanityArgs { catalog: catalog.clone() }, &ctx).unwrap();

    let path = manifest::run(&manifest::ManifestArgs { inputs: vec![catalog] }, &ctx).unwrap();
    assert!(path.ends_with("run/repro_manifest.json"));
    let m = Manifest::load(&dir.path().join("receipts").join("latest").join("repro_manifest.json")).unwrap();
    assert_eq!(m.inputs.len(), 1);
    assert!(m.outputs.contains_key("mechanism_sanity.json"));
    assert!(!m.outputs.contains_key("repro_manifest.json"));
}

#[test]
fn test_manifest_refuses_without_receipts() {
    let dir = temp_dir();
    let err = manifest::run(&manifest::ManifestArgs { inputs: vec![] }, &context(dir.path())).unwrap_err();
    assert_eq!(exit_code(&err), 2);
}
