//! Reference catalog of mechanism-of-action vectors.
//!
//! Catalogs are loaded once per run and never mutated. Two JSON shapes are
//! accepted for each entry:
//!
//! ```json
//! { "NCT01": { "moa_vector": { "ddr": 0.9 }, "provenance": { "primary_moa": "PARP" } } }
//! { "TRIAL1": { "ddr": 1.0 } }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{MechanyxError, Result};
use crate::mechanism::{Dimensionality, MechanismVector};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub moa: MechanismVector,
    #[serde(default)]
    pub primary_moa: Option<String>,
    #[serde(default)]
    pub provenance: Value,
}

/// Immutable id → entry map, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    dimensionality: Dimensionality,
    entries: BTreeMap<String, CatalogEntry>,
}

impl ReferenceCatalog {
    pub fn from_entries<I>(entries: I, dimensionality: Dimensionality) -> Self
    where
        I: IntoIterator<Item = CatalogEntry>,
    {
        let entries = entries
            .into_iter()
            .map(|e| {
                let e = CatalogEntry { moa: e.moa.conform_to(dimensionality.len()), ..e };
                (e.id.clone(), e)
            })
            .collect();
        Self { dimensionality, entries }
    }

    /// Load a catalog file. A missing file is a refusal error.
    pub fn load(path: &Path, dimensionality: Dimensionality) -> Result<Self> {
        if !path.exists() {
            return Err(MechanyxError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&content, dimensionality)?;
        debug!(path = %path.display(), n = catalog.len(), "Loaded reference catalog");
        Ok(catalog)
    }

    pub fn from_json_str(content: &str, dimensionality: Dimensionality) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(&value, dimensionality)
    }

    pub fn from_value(value: &Value, dimensionality: Dimensionality) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            MechanyxError::InvalidInput("reference catalog must be a JSON object".into())
        })?;

        let entries = obj.iter().map(|(id, raw)| {
            let moa_obj = raw
                .get("moa_vector")
                .and_then(Value::as_object)
                .or_else(|| raw.as_object());
            let pairs = moa_obj
                .into_iter()
                .flat_map(|m| m.iter())
                .map(|(k, v)| (k.as_str(), lenient_f64(v).unwrap_or(0.0)));
            let provenance = raw.get("provenance").cloned().unwrap_or(Value::Null);
            let primary_moa = provenance
                .get("primary_moa")
                .and_then(Value::as_str)
                .map(str::to_string);
            CatalogEntry {
                id: id.clone(),
                moa: MechanismVector::from_axis_pairs(pairs, dimensionality),
                primary_moa,
                provenance,
            }
        });

        Ok(Self::from_entries(entries, dimensionality))
    }

    pub fn dimensionality(&self) -> Dimensionality {
        self.dimensionality
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Numbers, numeric strings and booleans become `f64`; anything else is `None`.
pub fn lenient_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}
