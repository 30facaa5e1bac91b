//! JSON receipts: one whole document per validation run.
//!
//! A receipt records when it was generated, the exact parameters, SHA-256
//! digests of every input file, the metrics and free-text notes. Floats
//! are rounded to a fixed number of decimals before writing so that a
//! write/read cycle reproduces identical values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use mechanyx_common::{LabelProvenance, MechanyxError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

pub const LATEST_DIR: &str = "latest";
pub const MANIFEST_NAME: &str = "repro_manifest";
const MANIFEST_EXTENSIONS: [&str; 3] = ["json", "txt", "csv"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputDigest {
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

impl InputDigest {
    pub fn of(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MechanyxError::MissingInput(path.to_path_buf()));
        }
        let data = std::fs::read(path)?;
        Ok(Self {
            path: path.display().to_string(),
            sha256: sha256_hex(&data),
            bytes: data.len() as u64,
        })
    }
}

pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub name: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub config_version: String,
    pub parameters: Value,
    pub inputs: Vec<InputDigest>,
    pub metrics: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_provenance: Option<LabelProvenance>,
    /// Per-item rows (cases, patients, cell lines).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub records: Value,
    #[serde(default)]
    pub notes: Vec<String>,
}

impl Receipt {
    pub fn new(name: &str, config_version: &str) -> Self {
        Self {
            name: name.to_string(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            config_version: config_version.to_string(),
            parameters: Value::Null,
            inputs: Vec::new(),
            metrics: Value::Null,
            label_provenance: None,
            records: Value::Null,
            notes: Vec::new(),
        }
    }

    pub fn with_parameters<T: Serialize>(mut self, params: &T) -> Result<Self> {
        self.parameters = serde_json::to_value(params)?;
        Ok(self)
    }

    pub fn with_metrics<T: Serialize>(mut self, metrics: &T) -> Result<Self> {
        self.metrics = serde_json::to_value(metrics)?;
        Ok(self)
    }

    pub fn with_records<T: Serialize>(mut self, records: &T) -> Result<Self> {
        self.records = serde_json::to_value(records)?;
        Ok(self)
    }

    pub fn with_input(mut self, path: &Path) -> Result<Self> {
        self.inputs.push(InputDigest::of(path)?);
        Ok(self)
    }

    /// Attach label provenance; its caveat is also copied into the notes.
    pub fn with_label_provenance(mut self, provenance: LabelProvenance) -> Self {
        self.notes.push(provenance.caveat.clone());
        self.label_provenance = Some(provenance);
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Serialized form with every float rounded to `precision` decimals.
    pub fn to_json_string(&self, precision: u32) -> Result<String> {
        let mut value = serde_json::to_value(self)?;
        round_floats(&mut value, precision);
        Ok(serde_json::to_string_pretty(&value)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MechanyxError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// SHA-256 of the run's inputs and of every artifact under `latest/`.
/// Two runs over the same inputs and configuration should produce the
/// same `outputs` map apart from receipt timestamps and run ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub generated_at: DateTime<Utc>,
    pub config_version: String,
    /// Input path → digest.
    pub inputs: BTreeMap<String, String>,
    /// File name under `latest/` → digest.
    pub outputs: BTreeMap<String, String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MechanyxError::MissingInput(path.to_path_buf()));
        }
        Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
    }
}

/// Round every float in place. Integers are left untouched.
pub fn round_floats(value: &mut Value, precision: u32) {
    match value {
        Value::Number(n) if n.is_f64() => {
            if let Some(x) = n.as_f64() {
                let scale = 10f64.powi(precision as i32);
                let rounded = (x * scale).round() / scale;
                if let Some(r) = serde_json::Number::from_f64(rounded) {
                    *n = r;
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|v| round_floats(v, precision)),
        Value::Object(map) => map.values_mut().for_each(|v| round_floats(v, precision)),
        _ => {}
    }
}

/// Writes receipts under `out_dir` and mirrors them to `<root>/latest/`.
#[derive(Debug, Clone)]
pub struct ReceiptWriter {
    out_dir: PathBuf,
    receipts_root: PathBuf,
    precision: u32,
}

impl ReceiptWriter {
    pub fn new(out_dir: impl Into<PathBuf>, receipts_root: impl Into<PathBuf>, precision: u32) -> Self {
        Self { out_dir: out_dir.into(), receipts_root: receipts_root.into(), precision }
    }

    /// `<root>/<UTC timestamp>/` as the output directory.
    pub fn timestamped(receipts_root: impl Into<PathBuf>, precision: u32) -> Self {
        let root = receipts_root.into();
        let out_dir = root.join(Utc::now().format("%Y%m%d_%H%M%S").to_string());
        Self::new(out_dir, root, precision)
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write `<out_dir>/<name>.json`, then copy it to the latest directory.
    /// Returns the primary path.
    pub fn write(&self, receipt: &Receipt) -> Result<PathBuf> {
        let body = receipt.to_json_string(self.precision)?;
        let file_name = format!("{}.json", receipt.name);

        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(&file_name);
        std::fs::write(&path, &body)?;

        let latest_dir = self.receipts_root.join(LATEST_DIR);
        std::fs::create_dir_all(&latest_dir)?;
        let latest = latest_dir.join(&file_name);
        if latest != path {
            std::fs::copy(&path, &latest)?;
        }
        debug!(latest = %latest.display(), "Refreshed latest receipt");
        info!(name = %receipt.name, path = %path.display(), "Wrote receipt");
        Ok(path)
    }

    /// Hash `inputs` and every `latest/*.{json,txt,csv}` artifact (an
    /// earlier manifest excluded), then write `repro_manifest.json` to the
    /// output directory and to `latest/`.
    pub fn write_manifest(&self, config_version: &str, inputs: &[PathBuf]) -> Result<(PathBuf, Manifest)> {
        let mut input_digests = BTreeMap::new();
        for path in inputs {
            let d = InputDigest::of(path)?;
            input_digests.insert(d.path, d.sha256);
        }

        let latest_dir = self.receipts_root.join(LATEST_DIR);
        let manifest_file = format!("{MANIFEST_NAME}.json");
        let mut outputs = BTreeMap::new();
        if latest_dir.is_dir() {
            for entry in std::fs::read_dir(&latest_dir)? {
                let path = entry?.path();
                let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                    continue;
                };
                let hashed = path.is_file()
                    && name != manifest_file
                    && path
                        .extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| MANIFEST_EXTENSIONS.contains(&e));
                if hashed {
                    outputs.insert(name, sha256_hex(&std::fs::read(&path)?));
                }
            }
        }
        if outputs.is_empty() {
            return Err(MechanyxError::EmptyDataset(format!(
                "no receipts under {} to hash",
                latest_dir.display()
            )));
        }

        let manifest = Manifest {
            generated_at: Utc::now(),
            config_version: config_version.to_string(),
            inputs: input_digests,
            outputs,
        };
        let body = serde_json::to_string_pretty(&manifest)?;
        std::fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(&manifest_file);
        std::fs::write(&path, &body)?;
        let latest = latest_dir.join(&manifest_file);
        if latest != path {
            std::fs::write(&latest, &body)?;
        }
        info!(
            inputs = manifest.inputs.len(),
            outputs = manifest.outputs.len(),
            path = %path.display(),
            "Wrote reproducibility manifest"
        );
        Ok((path, manifest))
    }
}
