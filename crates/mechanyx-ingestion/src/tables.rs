//! CSV tables for cell-line panels: dose response, model metadata and
//! somatic mutations.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use mechanyx_common::{DrugClass, LabelProvenance, MarginRule, MechanyxError, Mutation, Result};
use mechanyx_config::PathwayConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    if !path.exists() {
        return Err(MechanyxError::MissingInput(path.to_path_buf()));
    }
    Ok(csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?)
}

// ── Dose response ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoseResponseRow {
    #[serde(alias = "model_id", alias = "ModelID")]
    pub cell_line: String,
    #[serde(alias = "DRUG_NAME")]
    pub drug_name: String,
    #[serde(alias = "Z_SCORE")]
    pub z_score: Option<f64>,
}

pub fn load_dose_response(path: &Path) -> Result<Vec<DoseResponseRow>> {
    let mut reader = open_csv(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<DoseResponseRow>, _>>()?;
    if rows.is_empty() {
        return Err(MechanyxError::EmptyDataset(format!("{} has no rows", path.display())));
    }
    debug!(path = %path.display(), n = rows.len(), "Loaded dose response");
    Ok(rows)
}

/// Derived labels plus the per-class mean Z they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSet {
    pub labels: BTreeMap<String, DrugClass>,
    pub mean_z: BTreeMap<String, BTreeMap<DrugClass, f64>>,
    pub provenance: LabelProvenance,
}

impl LabelSet {
    /// Mean Z per mapped drug class for every line, then `rule` picks the
    /// label. Drugs outside the class mapping and rows without a finite Z
    /// are ignored; lines left with no mapped drug are dropped.
    pub fn derive(rows: &[DoseResponseRow], pathways: &PathwayConfig, rule: MarginRule, source: &str) -> Result<Self> {
        let mut sums: BTreeMap<String, BTreeMap<DrugClass, (f64, usize)>> = BTreeMap::new();
        for row in rows {
            let Some(class) = pathways.class_for_drug(&row.drug_name) else {
                continue;
            };
            let Some(z) = row.z_score.filter(|z| z.is_finite()) else {
                continue;
            };
            let slot = sums
                .entry(row.cell_line.clone())
                .or_default()
                .entry(class)
                .or_insert((0.0, 0));
            slot.0 += z;
            slot.1 += 1;
        }
        if sums.is_empty() {
            return Err(MechanyxError::EmptyDataset(
                "no dose-response rows map to a drug class".into(),
            ));
        }

        let mean_z: BTreeMap<String, BTreeMap<DrugClass, f64>> = sums
            .into_iter()
            .map(|(line, by_class)| {
                let means = by_class
                    .into_iter()
                    .map(|(c, (sum, n))| (c, sum / n as f64))
                    .collect();
                (line, means)
            })
            .collect();
        let labels = mean_z
            .iter()
            .map(|(line, z)| (line.clone(), rule.decide(z)))
            .collect();
        info!(n_lines = mean_z.len(), "Derived dose-response labels");
        Ok(Self {
            labels,
            mean_z,
            provenance: LabelProvenance::derived_from_summary(source, "mean Z_SCORE per drug class", rule),
        })
    }
}

// ── Models ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct ModelRow {
    #[serde(alias = "ModelID")]
    model_id: String,
    #[serde(default, alias = "OncotreeLineage")]
    lineage: Option<String>,
}

/// `model_id → lineage`; blank lineages become `Unknown`.
pub fn load_models(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut reader = open_csv(path)?;
    let mut out = BTreeMap::new();
    for row in reader.deserialize::<ModelRow>() {
        let row = row?;
        let lineage = row
            .lineage
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        out.insert(row.model_id, lineage);
    }
    debug!(path = %path.display(), n = out.len(), "Loaded model metadata");
    Ok(out)
}

// ── Mutations ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct MutationRow {
    #[serde(alias = "ModelID")]
    model_id: String,
    #[serde(alias = "HugoSymbol")]
    gene: String,
    #[serde(default, alias = "Chrom")]
    chrom: Option<String>,
    #[serde(default, alias = "Pos")]
    pos: Option<u64>,
    #[serde(default, rename = "ref", alias = "Ref")]
    ref_allele: Option<String>,
    #[serde(default, alias = "Alt")]
    alt: Option<String>,
    #[serde(default, alias = "VariantType")]
    variant_type: Option<String>,
    #[serde(default, alias = "MolecularConsequence")]
    consequence: Option<String>,
    #[serde(default, alias = "VepImpact")]
    impact: Option<String>,
}

impl From<MutationRow> for Mutation {
    fn from(r: MutationRow) -> Self {
        Mutation {
            gene: r.gene,
            chrom: r.chrom,
            pos: r.pos,
            ref_allele: r.ref_allele,
            alt: r.alt,
            variant_type: r.variant_type,
            consequence: r.consequence,
            impact: r.impact,
            likely_lof: false,
        }
    }
}

/// Mutations grouped by model id, file order kept within a model. When
/// `keep` is given only those model ids are retained.
pub fn load_mutations(
    path: &Path,
    keep: Option<&BTreeSet<String>>,
) -> Result<BTreeMap<String, Vec<Mutation>>> {
    let mut reader = open_csv(path)?;
    let mut out: BTreeMap<String, Vec<Mutation>> = BTreeMap::new();
    for row in reader.deserialize::<MutationRow>() {
        let row = row?;
        if keep.is_some_and(|k| !k.contains(&row.model_id)) {
            continue;
        }
        let model_id = row.model_id.clone();
        out.entry(model_id).or_default().push(Mutation::from(row));
    }
    debug!(path = %path.display(), models = out.len(), "Loaded mutations");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechanyx_test_utils::{
        sample_dose_response_csv, sample_models_csv, sample_mutations_csv, temp_dir, write_fixture,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_labels_from_dose_response() {
        let dir = temp_dir();
        let path = write_fixture(dir.path(), "dr.csv", &sample_dose_response_csv());
        let rows = load_dose_response(&path).unwrap();
        let cfg = PathwayConfig::default();
        let set = LabelSet::derive(&rows, &cfg, MarginRule::z_score_label(), "dr.csv").unwrap();

        // Olaparib −1.9 and Talazoparib −1.5 average to −1.7; ATR −0.2
        assert!((set.mean_z["ACH-000001"][&DrugClass::Parp] + 1.7).abs() < 1e-12);
        assert_eq!(set.labels["ACH-000001"], DrugClass::Parp);
        assert_eq!(set.labels["ACH-000002"], DrugClass::Atr);
        // Only Olaparib maps for line 3, and −0.1 misses the threshold
        assert_eq!(set.labels["ACH-000003"], DrugClass::None);
        assert!(!set.provenance.outcomes_validated);
    }

    #[test]
    fn test_unmapped_drugs_only_is_refused() {
        let rows = vec![DoseResponseRow {
            cell_line: "X".into(),
            drug_name: "Doxorubicin".into(),
            z_score: Some(-3.0),
        }];
        let err = LabelSet::derive(&rows, &PathwayConfig::default(), MarginRule::z_score_label(), "x")
            .unwrap_err();
        assert!(err.is_refusal());
    }

    #[test]
    fn test_models_and_mutations() {
        let dir = temp_dir();
        let models = load_models(&write_fixture(dir.path(), "m.csv", &sample_models_csv())).unwrap();
        assert_eq!(models["ACH-000002"], "Lung");

        let path = write_fixture(dir.path(), "mut.csv", &sample_mutations_csv());
        let all = load_mutations(&path, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all["ACH-000001"][0].gene, "BRCA2");
        assert_eq!(all["ACH-000001"][0].pos, Some(32340300));

        let keep = BTreeSet::from(["ACH-000003".to_string()]);
        let some = load_mutations(&path, Some(&keep)).unwrap();
        assert_eq!(some.keys().collect::<Vec<_>>(), vec!["ACH-000003"]);
    }

    #[test]
    fn test_missing_table_is_refusal() {
        assert!(load_models(Path::new("/nonexistent/models.csv")).unwrap_err().is_refusal());
    }
}
