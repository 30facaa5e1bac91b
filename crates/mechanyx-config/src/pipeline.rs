//! Run-level parameters: labels, training, metrics, retry, variant scoring,
//! biomarker gate sweeps and output paths.

use mechanyx_common::MarginRule;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "MarginRule::z_score_label")]
    pub rule: MarginRule,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self { rule: MarginRule::z_score_label() }
    }
}

// ── Training ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_n_per_class")]
    pub n_per_class: usize,
    #[serde(default = "default_test_frac")]
    pub test_frac: f64,
    #[serde(default = "default_max_variants")]
    pub max_variants_per_line: usize,

    #[serde(default = "default_lr")]
    pub learning_rate: f64,
    #[serde(default = "default_reg")]
    pub l2: f64,
    #[serde(default = "default_steps")]
    pub steps: usize,

    /// Fixed NONE threshold used when tuning is off.
    #[serde(default)]
    pub none_threshold: f64,
    #[serde(default)]
    pub tune_none_threshold: bool,
    /// Optional ceiling on PARP false-positive rate during tuning.
    #[serde(default)]
    pub max_parp_fpr: Option<f64>,

    #[serde(default = "default_none_grid")]
    pub none_grid: Grid,
    #[serde(default = "default_prob_grid")]
    pub prob_grid: Grid,
}

fn default_seed() -> u64 { 1337 }
fn default_n_per_class() -> usize { 25 }
fn default_test_frac() -> f64 { 0.2 }
fn default_max_variants() -> usize { 12 }
fn default_lr() -> f64 { 0.5 }
fn default_reg() -> f64 { 1e-3 }
fn default_steps() -> usize { 2000 }
fn default_none_grid() -> Grid { Grid { start: 0.0, stop: 2.0, step: 0.05 } }
fn default_prob_grid() -> Grid { Grid { start: 0.0, stop: 0.90, step: 0.05 } }

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            n_per_class: default_n_per_class(),
            test_frac: default_test_frac(),
            max_variants_per_line: default_max_variants(),
            learning_rate: default_lr(),
            l2: default_reg(),
            steps: default_steps(),
            none_threshold: 0.0,
            tune_none_threshold: false,
            max_parp_fpr: None,
            none_grid: default_none_grid(),
            prob_grid: default_prob_grid(),
        }
    }
}

/// Inclusive arithmetic grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Grid {
    /// Values are generated by index and rounded to 3 d.p. so the last
    /// point lands exactly on `stop`.
    pub fn values(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.stop < self.start {
            return vec![self.start];
        }
        let n = ((self.stop - self.start) / self.step + 1e-9).floor() as usize;
        (0..=n)
            .map(|i| ((self.start + i as f64 * self.step) * 1000.0).round() / 1000.0)
            .collect()
    }
}

// ── Metrics ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_bootstrap_resamples")]
    pub bootstrap_resamples: usize,
    #[serde(default = "default_bootstrap_seed")]
    pub bootstrap_seed: u64,
    /// Two-sided interval level.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default = "default_recall_ks")]
    pub recall_ks: Vec<usize>,
    /// `best_fit` strictly above this makes a patient matchable.
    #[serde(default = "default_matchable")]
    pub matchable_threshold: f64,
    /// Decimal places kept when writing receipt floats.
    #[serde(default = "default_precision")]
    pub float_precision: u32,
}

fn default_bootstrap_resamples() -> usize { 2000 }
fn default_bootstrap_seed() -> u64 { 42 }
fn default_confidence() -> f64 { 0.95 }
fn default_recall_ks() -> Vec<usize> { vec![3, 5, 10] }
fn default_matchable() -> f64 { 0.5 }
fn default_precision() -> u32 { 6 }

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            bootstrap_resamples: default_bootstrap_resamples(),
            bootstrap_seed: default_bootstrap_seed(),
            confidence: default_confidence(),
            recall_ks: default_recall_ks(),
            matchable_threshold: default_matchable(),
            float_precision: default_precision(),
        }
    }
}

// ── Retry ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Rate-limited calls wait `base · 2^attempt` seconds.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: f64,
    /// Other failures wait this long before the next attempt.
    #[serde(default = "default_error_delay")]
    pub error_delay_secs: f64,
    #[serde(default = "default_rate_limit_markers")]
    pub rate_limit_markers: Vec<String>,
}

fn default_max_attempts() -> u32 { 3 }
fn default_backoff_base() -> f64 { 1.0 }
fn default_error_delay() -> f64 { 1.0 }
fn default_rate_limit_markers() -> Vec<String> {
    ["429", "quota", "rate limit", "too many requests"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base(),
            error_delay_secs: default_error_delay(),
            rate_limit_markers: default_rate_limit_markers(),
        }
    }
}

// ── Variant scoring ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantScoringConfig {
    /// Base URL of the sequence-scoring service. Unset means cache only.
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_exon_flank")]
    pub exon_flank: u32,
    #[serde(default = "default_windows")]
    pub windows: Vec<u32>,
    #[serde(default = "default_genome")]
    pub genome: String,
    /// Defaults to the user cache directory.
    #[serde(default)]
    pub cache_path: Option<String>,
    #[serde(default)]
    pub use_cache_only: bool,
    /// Persist the cache every N samples.
    #[serde(default = "default_flush_every")]
    pub flush_every: usize,
}

fn default_model_id() -> String { "evo2_1b".to_string() }
fn default_timeout() -> u64 { 60 }
fn default_exon_flank() -> u32 { 4096 }
fn default_windows() -> Vec<u32> { vec![1024, 2048, 4096, 8192] }
fn default_genome() -> String { "hg38".to_string() }
fn default_flush_every() -> usize { 1 }

impl Default for VariantScoringConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            model_id: default_model_id(),
            timeout_secs: default_timeout(),
            exon_flank: default_exon_flank(),
            windows: default_windows(),
            genome: default_genome(),
            cache_path: None,
            use_cache_only: false,
            flush_every: default_flush_every(),
        }
    }
}

// ── Biomarker gate sweep ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateSweepConfig {
    #[serde(default = "default_tmb_thresholds")]
    pub tmb_thresholds: Vec<f64>,
    #[serde(default = "default_hrd_thresholds")]
    pub hrd_thresholds: Vec<f64>,
    /// Operating points held fixed while the other axis is swept.
    #[serde(default = "default_fixed_tmb")]
    pub fixed_tmb: f64,
    #[serde(default = "default_fixed_hrd")]
    pub fixed_hrd: f64,
}

fn default_tmb_thresholds() -> Vec<f64> { vec![10.0, 15.0, 20.0, 25.0] }
fn default_hrd_thresholds() -> Vec<f64> { vec![30.0, 35.0, 40.0, 42.0, 45.0, 50.0] }
fn default_fixed_tmb() -> f64 { 20.0 }
fn default_fixed_hrd() -> f64 { 42.0 }

impl Default for GateSweepConfig {
    fn default() -> Self {
        Self {
            tmb_thresholds: default_tmb_thresholds(),
            hrd_thresholds: default_hrd_thresholds(),
            fixed_tmb: default_fixed_tmb(),
            fixed_hrd: default_fixed_hrd(),
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Receipts go to `<root>/<timestamp>/` with a copy in `<root>/latest/`.
    #[serde(default = "default_receipts_root")]
    pub receipts_root: String,
}

fn default_receipts_root() -> String { "receipts".to_string() }

impl Default for PathsConfig {
    fn default() -> Self {
        Self { receipts_root: default_receipts_root() }
    }
}
