use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MechanyxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing required input: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MechanyxError {
    /// Errors that must stop a run rather than produce metrics from
    /// missing or empty data. The binary maps these to exit code 2.
    pub fn is_refusal(&self) -> bool {
        matches!(
            self,
            Self::MissingInput(_) | Self::EmptyDataset(_) | Self::InvalidInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MechanyxError>;
