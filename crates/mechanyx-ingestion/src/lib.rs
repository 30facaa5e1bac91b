//! mechanyx-ingestion: Input loading and variant scoring.
//!
//! JSON datasets (eval sets, cohorts, synthetic-lethality cases), CSV
//! panel tables, external HRD proxy scores, and the sequence-disruption
//! client with its retry wrapper and on-disk cache.

pub mod cache;
pub mod datasets;
pub mod hrd;
pub mod panel;
pub mod retry;
pub mod scorer;
pub mod tables;

pub use cache::{default_cache_path, VariantCache};
pub use datasets::{
    load_cohort, load_eval_set, load_sl_cases, parse_cohort, parse_eval_set, parse_sl_cases,
    EvalCase, GroundTruth, SlCase, SlGroundTruth, EVAL_VECTOR_DIM,
};
pub use hrd::{cna_loss_threshold, load_hrd_proxy, parse_hrd_json, read_hrd_csv};
pub use panel::{ItemError, PanelScorer, PanelScoring, ScoringStats};
pub use retry::{with_retry, RetryFailure, RetryPolicy};
pub use scorer::{EvoApiScorer, MockVariantScorer, VariantRequest, VariantScore, VariantScorer};
pub use tables::{load_dose_response, load_models, load_mutations, DoseResponseRow, LabelSet};
