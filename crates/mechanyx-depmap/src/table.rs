//! Essentiality table: lineage → gene → score, with a pan-lineage fallback.
//!
//! Built either from a grounding JSON document
//!
//! ```json
//! { "by_lineage": { "Breast": { "PARP1": { "essentiality_score": 0.8 } } },
//!   "global": { "PARP1": { "essentiality_score": 0.5 } } }
//! ```
//!
//! or from the DepMap bulk files `CRISPRGeneEffect.csv` + `Model.csv`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use mechanyx_common::{MechanyxError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{normalize_gene_effect, EssentialityProvider};

/// CRISPR gene effect filename
pub const CRISPR_GENE_EFFECT_FILE: &str = "CRISPRGeneEffect.csv";

/// Model (cell line metadata) filename
pub const MODEL_FILE: &str = "Model.csv";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneEssentiality {
    #[serde(default)]
    pub essentiality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_effect: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median_effect: Option<f64>,
    #[serde(default)]
    pub n_models: usize,
}

impl GeneEssentiality {
    fn from_effects(mut effects: Vec<f64>) -> Self {
        if effects.is_empty() {
            return Self::default();
        }
        let n = effects.len();
        let mean = effects.iter().sum::<f64>() / n as f64;
        effects.sort_by(f64::total_cmp);
        let mid = n / 2;
        let median = if n % 2 == 0 {
            (effects[mid - 1] + effects[mid]) / 2.0
        } else {
            effects[mid]
        };
        Self {
            essentiality_score: Some(normalize_gene_effect(mean)),
            mean_effect: Some(mean),
            median_effect: Some(median),
            n_models: n,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EssentialityTable {
    #[serde(default)]
    pub by_lineage: BTreeMap<String, BTreeMap<String, GeneEssentiality>>,
    #[serde(default)]
    pub global: BTreeMap<String, GeneEssentiality>,
}

impl EssentialityTable {
    pub fn load_json(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MechanyxError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&content)?;
        info!(
            "Loaded essentiality grounding: {} lineages, {} global genes",
            table.by_lineage.len(),
            table.global.len()
        );
        Ok(table)
    }

    /// Gene keys are upper-cased so lookups are case-insensitive.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let raw: Self = serde_json::from_str(content)?;
        let upper = |m: BTreeMap<String, GeneEssentiality>| {
            m.into_iter()
                .map(|(g, v)| (g.trim().to_ascii_uppercase(), v))
                .collect::<BTreeMap<_, _>>()
        };
        Ok(Self {
            by_lineage: raw
                .by_lineage
                .into_iter()
                .map(|(l, genes)| (l, upper(genes)))
                .collect(),
            global: upper(raw.global),
        })
    }

    /// Load `CRISPRGeneEffect.csv` and `Model.csv` from `data_dir`.
    pub fn load_depmap_dir(data_dir: &Path, genes: Option<&[String]>) -> Result<Self> {
        let gene_effect = data_dir.join(CRISPR_GENE_EFFECT_FILE);
        let model = data_dir.join(MODEL_FILE);
        for p in [&gene_effect, &model] {
            if !p.exists() {
                return Err(MechanyxError::MissingInput(p.clone()));
            }
        }
        let gene_effect = std::fs::read_to_string(&gene_effect)?;
        let model = std::fs::read_to_string(&model)?;
        Self::from_depmap_csv(&gene_effect, &model, genes)
    }

    /// Aggregate per-lineage and global mean gene effects. `genes`
    /// restricts the columns kept, which keeps memory small on the full
    /// 18k-gene matrix.
    pub fn from_depmap_csv(
        gene_effect_csv: &str,
        model_csv: &str,
        genes: Option<&[String]>,
    ) -> Result<Self> {
        let lineage_of = parse_model_lineages(model_csv)?;

        let mut reader = csv::Reader::from_reader(gene_effect_csv.as_bytes());
        // Headers look like "BRCA1 (672)"; the first column is the model id.
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.split(" (").next().unwrap_or(h).trim().to_ascii_uppercase())
            .collect();
        let wanted: Vec<(usize, String)> = headers
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, g)| {
                genes.map_or(true, |keep| keep.iter().any(|k| k.eq_ignore_ascii_case(g)))
            })
            .map(|(i, g)| (i, g.clone()))
            .collect();

        let mut per_lineage: HashMap<(String, String), Vec<f64>> = HashMap::new();
        let mut global: HashMap<String, Vec<f64>> = HashMap::new();
        let mut unmapped = 0usize;

        for record in reader.records() {
            let record = record?;
            let Some(model_id) = record.get(0).map(str::trim) else {
                continue;
            };
            let lineage = lineage_of.get(model_id);
            if lineage.is_none() {
                unmapped += 1;
            }
            for (i, gene) in &wanted {
                let Some(effect) = record.get(*i).and_then(|v| v.trim().parse::<f64>().ok()) else {
                    continue;
                };
                if !effect.is_finite() {
                    continue;
                }
                global.entry(gene.clone()).or_default().push(effect);
                if let Some(lineage) = lineage {
                    per_lineage
                        .entry((lineage.clone(), gene.clone()))
                        .or_default()
                        .push(effect);
                }
            }
        }

        if unmapped > 0 {
            warn!("{} gene-effect rows have no lineage in the model table", unmapped);
        }

        let mut table = Self::default();
        for ((lineage, gene), effects) in per_lineage {
            table
                .by_lineage
                .entry(lineage)
                .or_default()
                .insert(gene, GeneEssentiality::from_effects(effects));
        }
        for (gene, effects) in global {
            table.global.insert(gene, GeneEssentiality::from_effects(effects));
        }
        debug!(
            lineages = table.by_lineage.len(),
            genes = table.global.len(),
            "Built essentiality table from gene-effect matrix"
        );
        Ok(table)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn lineages(&self) -> Vec<&str> {
        self.by_lineage.keys().map(String::as_str).collect()
    }
}

impl EssentialityProvider for EssentialityTable {
    fn lineage_essentiality(&self, lineage: &str, gene: &str) -> Option<f64> {
        self.by_lineage
            .get(lineage)?
            .get(&gene.trim().to_ascii_uppercase())?
            .essentiality_score
            .filter(|v| v.is_finite())
    }

    fn global_essentiality(&self, gene: &str) -> Option<f64> {
        self.global
            .get(&gene.trim().to_ascii_uppercase())?
            .essentiality_score
            .filter(|v| v.is_finite())
    }

    fn has_gene(&self, gene: &str) -> bool {
        self.global.contains_key(&gene.trim().to_ascii_uppercase())
    }
}

/// `ModelID → OncotreeLineage` from DepMap's Model.csv (header-addressed).
fn parse_model_lineages(model_csv: &str) -> Result<HashMap<String, String>> {
    let mut reader = csv::Reader::from_reader(model_csv.as_bytes());
    let headers = reader.headers()?.clone();
    let col = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };
    let id_col = col(&["ModelID", "model_id"])
        .ok_or_else(|| MechanyxError::InvalidInput("model table lacks a ModelID column".into()))?;
    let lineage_col = col(&["OncotreeLineage", "lineage"]).ok_or_else(|| {
        MechanyxError::InvalidInput("model table lacks an OncotreeLineage column".into())
    })?;

    let mut out = HashMap::new();
    for record in reader.records() {
        let record = record?;
        if let (Some(id), Some(lineage)) = (record.get(id_col), record.get(lineage_col)) {
            let (id, lineage) = (id.trim(), lineage.trim());
            if !id.is_empty() && !lineage.is_empty() {
                out.insert(id.to_string(), lineage.to_string());
            }
        }
    }
    debug!("Loaded {} model lineage mappings", out.len());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GENE_EFFECT: &str = "\
ModelID,PARP1 (142),ATR (545),WEE1 (7465)
ACH-1,-1.0,-2.0,0.2
ACH-2,-0.6,-1.0,
ACH-3,-2.5,-1.5,-0.4
";

    const MODEL: &str = "\
ModelID,CellLineName,OncotreeLineage
ACH-1,LINE1,Breast
ACH-2,LINE2,Breast
ACH-3,LINE3,Lung
";

    #[test]
    fn test_from_depmap_csv_aggregates_by_lineage() {
        let t = EssentialityTable::from_depmap_csv(GENE_EFFECT, MODEL, None).unwrap();
        let breast_parp = &t.by_lineage["Breast"]["PARP1"];
        assert_eq!(breast_parp.n_models, 2);
        assert!((breast_parp.mean_effect.unwrap() - -0.8).abs() < 1e-12);
        assert!((t.essentiality("Breast", "PARP1") - 0.4).abs() < 1e-12);

        // WEE1 has one blank cell in Breast
        assert_eq!(t.by_lineage["Breast"]["WEE1"].n_models, 1);
        assert_eq!(t.essentiality("Breast", "WEE1"), 0.0);
    }

    #[test]
    fn test_gene_filter_limits_columns() {
        let keep = vec!["atr".to_string()];
        let t = EssentialityTable::from_depmap_csv(GENE_EFFECT, MODEL, Some(&keep)).unwrap();
        assert!(t.has_gene("ATR"));
        assert!(!t.has_gene("PARP1"));
    }

    #[test]
    fn test_unknown_lineage_falls_back_to_global() {
        let t = EssentialityTable::from_depmap_csv(GENE_EFFECT, MODEL, None).unwrap();
        let global = t.global_essentiality("ATR").unwrap();
        assert_eq!(t.essentiality("Skin", "ATR"), global);
        assert_eq!(t.essentiality("Skin", "PRKDC"), 0.0);
    }

    #[test]
    fn test_json_keys_are_case_insensitive() {
        let json = r#"{
            "by_lineage": {"Ovary": {"parp1": {"essentiality_score": 0.7}}},
            "global": {"Parp1": {"essentiality_score": 0.3}, "ATR": {"essentiality_score": null}}
        }"#;
        let t = EssentialityTable::from_json_str(json).unwrap();
        assert_eq!(t.essentiality("Ovary", "PARP1"), 0.7);
        assert_eq!(t.essentiality("Breast", "PARP1"), 0.3);
        assert_eq!(t.essentiality("Ovary", "ATR"), 0.0);
    }

    #[test]
    fn test_missing_model_column_is_invalid() {
        let err = EssentialityTable::from_depmap_csv(GENE_EFFECT, "ModelID,Name\nACH-1,x\n", None)
            .unwrap_err();
        assert!(err.is_refusal());
    }
}
