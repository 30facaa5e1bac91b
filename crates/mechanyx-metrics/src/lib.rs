//! mechanyx-metrics: Evaluation statistics and receipt writing.
//!
//! Classification and retrieval metrics, binary diagnostics with Wilson
//! intervals, the seeded bootstrap, Fisher exact tests, survival
//! statistics and the JSON receipt writer shared by every validation job.

pub mod binary;
pub mod bootstrap;
pub mod classification;
pub mod contingency;
pub mod receipt;
pub mod retrieval;
pub mod survival;

pub use binary::{wilson_interval, BinaryCounts, Diagnostics, Proportion, Z_95};
pub use bootstrap::{Bootstrap, Interval};
pub use classification::{
    accuracy, label_distribution, macro_f1, parp_false_positive_rate, per_class, ClassMetrics,
    ClassificationReport, ConfusionMatrix,
};
pub use contingency::{fisher_exact_two_sided, Arm, RiskComparison};
pub use receipt::{round_floats, sha256_hex, InputDigest, Manifest, Receipt, ReceiptWriter, MANIFEST_NAME};
pub use retrieval::{mean, pearson, recall_at_k, reciprocal_rank, spearman};
pub use survival::{cox_univariate, log_rank, CoxFit, GroupSummary, KaplanMeier, LogRank, SurvivalObs};
