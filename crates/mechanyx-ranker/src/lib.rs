//! mechanyx-ranker: Mechanism-fit scoring engine.
//! Builds vectors from case data, scores them against reference MoA
//! vectors, and gates the result into a drug-class decision.

pub mod builder;
pub mod gating;
pub mod pathway;
pub mod ranking;
pub mod similarity;
pub mod triggers;

pub use builder::{PathwayScores, ScoredVariant, VectorBuilder};
pub use gating::{Decision, DecisionPath, GateEngine};
pub use pathway::{
    is_scorable_snv, predict_from_scores, CellLineFeatures, ClassScores, GeneCalibration,
    PathwayScorer,
};
pub use ranking::{Ranker, ScoredCandidate};
pub use similarity::{cosine, weighted_fit, Metric};
pub use triggers::{platinum_group, stage_group, GateTriggers, TriggerRates};
