//! Configuration loading for Mechanyx.
//! Reads mechanyx.toml from the current directory or the path in the
//! MECHANYX_CONFIG env var. YAML and JSON files are accepted by extension.
//!
//! Every threshold the pipeline uses lives here, so one file fully
//! describes a run and is echoed into its receipts.

use std::path::Path;

use mechanyx_common::{MechanyxError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod gating;
pub mod pipeline;
pub mod vector;


pub use gating::{ClassVector, DrugMapping, GatingConfig, GeneOverride, HrdGate, PathwayConfig};
pub use pipeline::{
    GateSweepConfig, Grid, LabelConfig, MetricsConfig, PathsConfig, RetryConfig, TrainingConfig,
    VariantScoringConfig,
};
pub use vector::{HrdProxyConfig, VariantWeights, VectorConfig};

pub const CONFIG_ENV: &str = "MECHANYX_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "mechanyx.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub vector: VectorConfig,
    #[serde(default)]
    pub gating: GatingConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub pathways: PathwayConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub variant_scoring: VariantScoringConfig,
    #[serde(default)]
    pub gates: GateSweepConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

fn default_version() -> String { "1".to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            vector: VectorConfig::default(),
            gating: GatingConfig::default(),
            labels: LabelConfig::default(),
            pathways: PathwayConfig::default(),
            training: TrainingConfig::default(),
            metrics: MetricsConfig::default(),
            retry: RetryConfig::default(),
            variant_scoring: VariantScoringConfig::default(),
            gates: GateSweepConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

impl Config {
    /// Resolve the config the way the CLI does: an explicit MECHANYX_CONFIG
    /// path must exist; a missing default file falls back to built-in values.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_path(Path::new(&path)),
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_path(path)
                } else {
                    warn!(
                        "{} not found; using built-in defaults. \
                         Copy mechanyx.example.toml to mechanyx.toml to override.",
                        DEFAULT_CONFIG_FILE
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MechanyxError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let config = match ext.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content)?,
            Some("json") => Self::from_json_str(&content)?,
            _ => Self::from_toml_str(&content)?,
        };
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MechanyxError::Config(e.to_string()))
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// JSON snapshot embedded in receipts.
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Reject values that would make a run meaningless rather than fail later.
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(MechanyxError::Config(msg));

        let t = &self.training;
        if !(0.0..1.0).contains(&t.test_frac) {
            return bad(format!("training.test_frac must be in [0, 1), got {}", t.test_frac));
        }
        if t.n_per_class == 0 {
            return bad("training.n_per_class must be positive".into());
        }
        if t.learning_rate <= 0.0 || !t.learning_rate.is_finite() {
            return bad(format!("training.learning_rate must be positive, got {}", t.learning_rate));
        }
        if let Some(fpr) = t.max_parp_fpr {
            if !(0.0..=1.0).contains(&fpr) {
                return bad(format!("training.max_parp_fpr must be in [0, 1], got {fpr}"));
            }
        }

        let m = &self.metrics;
        if !(0.0 < m.confidence && m.confidence < 1.0) {
            return bad(format!("metrics.confidence must be in (0, 1), got {}", m.confidence));
        }
        if m.bootstrap_resamples == 0 {
            return bad("metrics.bootstrap_resamples must be positive".into());
        }

        if self.retry.max_attempts == 0 {
            return bad("retry.max_attempts must be at least 1".into());
        }

        let v = &self.vector;
        if v.disruption_hi <= v.disruption_lo {
            return bad(format!(
                "vector.disruption_hi ({}) must exceed disruption_lo ({})",
                v.disruption_hi, v.disruption_lo
            ));
        }
        for axis in v.pathway_genes.keys() {
            if mechanyx_common::Axis::from_key(axis).is_none() {
                return bad(format!("vector.pathway_genes: unknown axis '{axis}'"));
            }
        }

        let g = &self.gating;
        for cv in &g.class_vectors {
            for axis in cv.moa.keys() {
                if mechanyx_common::Axis::from_key(axis).is_none() {
                    return bad(format!("gating.class_vectors[{}]: unknown axis '{axis}'", cv.class));
                }
            }
        }
        if g.class_vectors.iter().any(|cv| !cv.class.is_actionable()) {
            return bad("gating.class_vectors cannot define NONE".into());
        }

        Ok(())
    }
}
