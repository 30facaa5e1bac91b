//! mechanyx-calibrate: Train-partition fitting for the cell-line benchmark.
//!
//! Gene percentile calibration, seeded stratified splits, the softmax
//! classifier and threshold tuning, plus the benchmark that ties them
//! together.

pub mod benchmark;
pub mod calibrator;
pub mod features;
pub mod softmax;
pub mod split;
pub mod tuning;

pub use benchmark::{Benchmark, BenchmarkReport, MethodResult, SplitSummary};
pub use calibrator::{percentile, Calibrator, GLOBAL_KEY};
pub use features::{sp_features, spd_features, SPD_FEATURE_NAMES, SP_FEATURE_NAMES};
pub use softmax::{softmax, SoftmaxModel, SoftmaxParams};
pub use split::{Split, Stratifier};
pub use tuning::{tune, tune_none_threshold, tune_prob_threshold, ThresholdPoint, TuningResult};
