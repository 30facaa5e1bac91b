//! JSON dataset loaders: labeled eval cases, cohort exports and
//! synthetic-lethality case sets.
//!
//! Every loader refuses rather than guesses: a missing file, an empty
//! dataset or a malformed required field is an error the caller reports
//! with exit code 2.

use std::path::Path;

use mechanyx_common::{CaseRecord, MechanismVector, MechanyxError, Mutation, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Expected length of an eval-set patient vector.
pub const EVAL_VECTOR_DIM: usize = 7;

fn read_json(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(MechanyxError::MissingInput(path.to_path_buf()));
    }
    Ok(std::fs::read_to_string(path)?)
}

// ── Ranking eval set ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundTruth {
    #[serde(default)]
    pub relevant_trials: Vec<String>,
    #[serde(default)]
    pub primary_relevant_trial: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
    pub case_id: String,
    #[serde(alias = "patient_moa_vector_7d")]
    pub patient_vector: Vec<f64>,
    #[serde(default)]
    pub ground_truth: GroundTruth,
}

impl EvalCase {
    pub fn vector(&self) -> MechanismVector {
        MechanismVector::new(self.patient_vector.clone())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct EvalFile {
    #[serde(default)]
    cases: Vec<EvalCase>,
}

pub fn load_eval_set(path: &Path) -> Result<Vec<EvalCase>> {
    let cases = parse_eval_set(&read_json(path)?)?;
    debug!(path = %path.display(), n = cases.len(), "Loaded eval set");
    Ok(cases)
}

/// Parse and validate: at least one case, 7-dim vectors and a non-empty
/// relevant set on every case.
pub fn parse_eval_set(content: &str) -> Result<Vec<EvalCase>> {
    let file: EvalFile = serde_json::from_str(content)?;
    if file.cases.is_empty() {
        return Err(MechanyxError::EmptyDataset("eval set has no cases".into()));
    }
    for case in &file.cases {
        if case.patient_vector.len() != EVAL_VECTOR_DIM {
            return Err(MechanyxError::InvalidInput(format!(
                "case {} has a {}-dim vector, expected {EVAL_VECTOR_DIM}",
                case.case_id,
                case.patient_vector.len()
            )));
        }
        if case.ground_truth.relevant_trials.is_empty() {
            return Err(MechanyxError::EmptyDataset(format!(
                "case {} has no relevant trials",
                case.case_id
            )));
        }
    }
    Ok(file.cases)
}

// ── Cohort ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct CohortFile {
    cohort: CohortBody,
}

#[derive(Debug, Clone, Deserialize)]
struct CohortBody {
    #[serde(default)]
    patients: Vec<CaseRecord>,
}

/// `{"cohort": {"patients": [...]}}`.
pub fn load_cohort(path: &Path) -> Result<Vec<CaseRecord>> {
    let patients = parse_cohort(&read_json(path)?)?;
    debug!(path = %path.display(), n = patients.len(), "Loaded cohort");
    Ok(patients)
}

pub fn parse_cohort(content: &str) -> Result<Vec<CaseRecord>> {
    let file: CohortFile = serde_json::from_str(content)?;
    if file.cohort.patients.is_empty() {
        return Err(MechanyxError::EmptyDataset("cohort has no patients".into()));
    }
    Ok(file.cohort.patients)
}

// ── Synthetic-lethality cases ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlGroundTruth {
    #[serde(default)]
    pub synthetic_lethality_detected: bool,
    #[serde(default)]
    pub effective_drugs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlCase {
    pub case_id: String,
    #[serde(default)]
    pub mutations: Vec<Mutation>,
    #[serde(default)]
    pub ground_truth: SlGroundTruth,
}

impl SlCase {
    pub fn is_positive(&self) -> bool {
        self.ground_truth.synthetic_lethality_detected
    }

    /// Lower-cased, trimmed effective drugs.
    pub fn effective_drugs(&self) -> Vec<String> {
        self.ground_truth
            .effective_drugs
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum SlFile {
    List(Vec<SlCase>),
    Wrapped { cases: Vec<SlCase> },
}

/// Either a bare JSON array of cases or `{"cases": [...]}`.
pub fn load_sl_cases(path: &Path) -> Result<Vec<SlCase>> {
    let cases = parse_sl_cases(&read_json(path)?)?;
    debug!(path = %path.display(), n = cases.len(), "Loaded synthetic-lethality cases");
    Ok(cases)
}

pub fn parse_sl_cases(content: &str) -> Result<Vec<SlCase>> {
    let cases = match serde_json::from_str::<SlFile>(content)? {
        SlFile::List(c) | SlFile::Wrapped { cases: c } => c,
    };
    if cases.is_empty() {
        return Err(MechanyxError::EmptyDataset("no synthetic-lethality cases".into()));
    }
    Ok(cases)
}
