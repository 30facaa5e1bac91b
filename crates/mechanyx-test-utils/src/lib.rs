//! Shared fixtures for Mechanyx integration tests.
//!
//! Everything here is synthetic; none of it reflects a real patient,
//! trial or cell line.

use std::path::{Path, PathBuf};

use mechanyx_common::{Biomarkers, CaseRecord, Mutation, Outcomes};

/// HRD-high, somatic BRCA1 patient. Builds to DDR 0.95 with no IO signal.
pub fn ddr_patient() -> CaseRecord {
    CaseRecord {
        id: "PT-DDR-01".into(),
        primary_gene: Some("BRCA1".into()),
        lineage: Some("Ovary/Fallopian Tube".into()),
        biomarkers: Biomarkers {
            hrd_proxy: Some("HRD-High".into()),
            hrd_score: Some(58.0),
            brca_somatic: true,
            tmb: Some(3.1),
            msi_status: Some("MSS".into()),
        },
        stage: Some("Stage IIIC".into()),
        platinum_status: Some("Sensitive".into()),
        outcomes: Some(Outcomes { os_days: Some(1460.0), os_event: Some(false) }),
        ..Default::default()
    }
}

/// TMB-high, MSI-H patient with no DDR evidence.
pub fn io_patient() -> CaseRecord {
    CaseRecord {
        id: "PT-IO-01".into(),
        biomarkers: Biomarkers {
            hrd_proxy: Some("HRD-Low".into()),
            tmb: Some(32.0),
            msi_status: Some("MSI-H".into()),
            ..Default::default()
        },
        stage: Some("IV".into()),
        outcomes: Some(Outcomes { os_days: Some(410.0), os_event: Some(true) }),
        ..Default::default()
    }
}

/// A single SNV with full coordinates.
pub fn snv(gene: &str, chrom: &str, pos: u64, r: &str, a: &str, impact: &str) -> Mutation {
    Mutation {
        gene: gene.into(),
        chrom: Some(chrom.into()),
        pos: Some(pos),
        ref_allele: Some(r.into()),
        alt: Some(a.into()),
        variant_type: Some("snv".into()),
        impact: Some(impact.into()),
        ..Default::default()
    }
}

/// Six-trial catalog: two PARP, one ATR, one MEK, one PD-1 and one
/// zero-vector entry.
pub fn sample_catalog_json() -> String {
    r#"{
  "NCT-PARP-01": {"moa_vector": {"ddr": 0.95, "mapk": 0.0, "pi3k": 0.0, "vegf": 0.0, "her2": 0.0, "io": 0.0, "efflux": 0.0},
                  "provenance": {"primary_moa": "PARP"}},
  "NCT-PARP-02": {"moa_vector": {"ddr": 0.9, "mapk": 0.05, "pi3k": 0.0, "vegf": 0.2, "her2": 0.0, "io": 0.0, "efflux": 0.0},
                  "provenance": {"primary_moa": "PARP"}},
  "NCT-ATR-01":  {"moa_vector": {"ddr": 0.7, "mapk": 0.3, "pi3k": 0.0, "vegf": 0.0, "her2": 0.0, "io": 0.0, "efflux": 0.0},
                  "provenance": {"primary_moa": "ATR"}},
  "NCT-MEK-01":  {"moa_vector": {"ddr": 0.0, "mapk": 0.95, "pi3k": 0.1, "vegf": 0.0, "her2": 0.0, "io": 0.0, "efflux": 0.0},
                  "provenance": {"primary_moa": "MEK"}},
  "NCT-PD1-01":  {"moa_vector": {"ddr": 0.0, "mapk": 0.0, "pi3k": 0.0, "vegf": 0.0, "her2": 0.0, "io": 1.0, "efflux": 0.0},
                  "provenance": {"primary_moa": "PD-1"}},
  "NCT-EMPTY":   {"moa_vector": {}}
}"#
    .to_string()
}

/// Labeled eval set against [`sample_catalog_json`].
pub fn sample_eval_json() -> String {
    r#"{
  "cases": [
    {"case_id": "C1", "patient_moa_vector_7d": [0.9, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
     "ground_truth": {"relevant_trials": ["NCT-PARP-01", "NCT-PARP-02"], "primary_relevant_trial": "NCT-PARP-01"}},
    {"case_id": "C2", "patient_moa_vector_7d": [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
     "ground_truth": {"relevant_trials": ["NCT-PD1-01"]}}
  ]
}"#
    .to_string()
}

/// Cohort export with four patients; two are DDR-matchable.
pub fn sample_cohort_json() -> String {
    r#"{
  "cohort": {
    "patients": [
      {"patient_id": "P1", "hrd_proxy": "HRD-High", "brca_somatic": "BRCA1", "tmb": 2.0, "msi_status": "MSS",
       "hrd_score": 61, "tumor_stage_2009": "Stage IIIC", "platinum_status": "Sensitive",
       "outcomes": {"os_days": 1500, "os_event": false}},
      {"patient_id": "P2", "hrd_proxy": "HRD-High", "brca_somatic": null, "tmb": 4.0,
       "hrd_score": 47, "tumor_stage_2009": "Stage IV", "platinum_status": "Resistant",
       "outcomes": {"os_days": 1200, "os_event": true}},
      {"patient_id": "P3", "hrd_proxy": "HRD-Low", "brca_somatic": "", "tmb": 12.0,
       "hrd_score": 20, "tumor_stage_2009": "Stage IIIB",
       "outcomes": {"os_days": 500, "os_event": true}},
      {"patient_id": "P4", "hrd_proxy": "HRD-Intermediate", "tmb": 1.0,
       "outcomes": {"os_days": 300, "os_event": true}}
    ]
  }
}"#
    .to_string()
}

/// `cell_line,drug_name,z_score` rows for three lines.
pub fn sample_dose_response_csv() -> String {
    "\
cell_line,drug_name,z_score
ACH-000001,Olaparib,-1.9
ACH-000001,Talazoparib,-1.5
ACH-000001,AZD6738,-0.2
ACH-000002,AZD6738,-1.6
ACH-000002,Olaparib,-0.3
ACH-000002,Adavosertib,-0.4
ACH-000003,Olaparib,-0.1
ACH-000003,Adavosertib,0.2
ACH-000003,Doxorubicin,-2.5
"
    .to_string()
}

pub fn sample_models_csv() -> String {
    "\
model_id,lineage
ACH-000001,Ovary/Fallopian Tube
ACH-000002,Lung
ACH-000003,Bowel
"
    .to_string()
}

pub fn sample_mutations_csv() -> String {
    "\
model_id,gene,chrom,pos,ref,alt,variant_type,impact
ACH-000001,BRCA2,13,32340300,C,T,snv,HIGH
ACH-000001,KRAS,12,25245350,C,A,snv,MODERATE
ACH-000002,ARID1A,1,26760856,G,A,snv,HIGH
ACH-000002,EGFR,7,55191822,T,G,snv,MODERATE
ACH-000003,APC,5,112838220,C,T,snv,HIGH
ACH-000003,TP53,17,7674220,C,T,snv,MODERATE
"
    .to_string()
}

/// Write `content` to `dir/name` and return the path.
pub fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("write fixture");
    path
}

/// Fresh temporary directory kept alive for the returned guard's lifetime.
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("create temp dir")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixtures_parse() {
        let v: serde_json::Value = serde_json::from_str(&sample_catalog_json()).unwrap();
        assert_eq!(v.as_object().unwrap().len(), 6);
        let v: serde_json::Value = serde_json::from_str(&sample_eval_json()).unwrap();
        assert_eq!(v["cases"].as_array().unwrap().len(), 2);
        let v: serde_json::Value = serde_json::from_str(&sample_cohort_json()).unwrap();
        assert_eq!(v["cohort"]["patients"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_write_fixture() {
        let dir = temp_dir();
        let p = write_fixture(dir.path(), "models.csv", &sample_models_csv());
        assert!(std::fs::read_to_string(p).unwrap().starts_with("model_id,lineage"));
    }
}
