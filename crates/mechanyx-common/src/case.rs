//! Case / sample records: a biomarker bundle that is turned into a
//! mechanism vector exactly once.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::catalog::lenient_f64;

/// Cohort-level biomarkers. Every field is optional; absent fields
/// contribute zero to the built vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Biomarkers {
    /// Bucketed HRD call, e.g. `HRD-High`.
    #[serde(default)]
    pub hrd_proxy: Option<String>,
    /// Numeric HRD score (0–100 scale).
    #[serde(default, alias = "hrd", alias = "hrd_final", deserialize_with = "de_lenient_f64")]
    pub hrd_score: Option<f64>,
    #[serde(default, deserialize_with = "de_truthy")]
    pub brca_somatic: bool,
    #[serde(default, alias = "tmb_final", deserialize_with = "de_lenient_f64")]
    pub tmb: Option<f64>,
    #[serde(default)]
    pub msi_status: Option<String>,
}

impl Biomarkers {
    /// MSI-H spellings seen across cohort exports.
    pub fn is_msi_high(&self) -> bool {
        self.msi_status.as_deref().is_some_and(|s| {
            matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "msi-h" | "msih" | "msi_high" | "msi-high"
            )
        })
    }
}

/// Overall-survival outcome attached to a cohort record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Outcomes {
    #[serde(default, deserialize_with = "de_lenient_f64")]
    pub os_days: Option<f64>,
    #[serde(default)]
    pub os_event: Option<bool>,
}

/// One somatic variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    #[serde(alias = "HugoSymbol", alias = "hugo_symbol")]
    pub gene: String,
    #[serde(default, alias = "Chrom")]
    pub chrom: Option<String>,
    #[serde(default, alias = "Pos")]
    pub pos: Option<u64>,
    #[serde(default, rename = "ref", alias = "Ref")]
    pub ref_allele: Option<String>,
    #[serde(default, alias = "Alt")]
    pub alt: Option<String>,
    #[serde(default, alias = "VariantType")]
    pub variant_type: Option<String>,
    #[serde(default, alias = "MolecularConsequence")]
    pub consequence: Option<String>,
    #[serde(default, alias = "VepImpact")]
    pub impact: Option<String>,
    #[serde(default, alias = "LikelyLoF", deserialize_with = "de_truthy")]
    pub likely_lof: bool,
}

impl Mutation {
    pub fn gene_upper(&self) -> String {
        self.gene.trim().to_ascii_uppercase()
    }

    /// Single-nucleotide substitution with both alleles known.
    pub fn is_snv(&self) -> bool {
        match (self.ref_allele.as_deref(), self.alt.as_deref()) {
            (Some(r), Some(a)) => {
                let (r, a) = (r.to_ascii_uppercase(), a.to_ascii_uppercase());
                r.len() == 1 && a.len() == 1 && "ACGT".contains(&r) && "ACGT".contains(&a) && r != a
            }
            _ => false,
        }
    }

    /// Cache key `genome:chrN:pos:REF:ALT`, `None` without coordinates.
    pub fn variant_key(&self, genome: &str) -> Option<String> {
        let chrom = self.chrom.as_deref()?.trim();
        let pos = self.pos?;
        let alt = self.alt.as_deref()?.to_ascii_uppercase();
        let chrom = if chrom.starts_with("chr") { chrom.to_string() } else { format!("chr{chrom}") };
        let r = self.ref_allele.as_deref().unwrap_or("").to_ascii_uppercase();
        Some(format!("{genome}:{chrom}:{pos}:{r}:{alt}"))
    }
}

/// Immutable case record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    #[serde(alias = "patient_id", alias = "case_id", alias = "model_id")]
    pub id: String,
    #[serde(default)]
    pub primary_gene: Option<String>,
    #[serde(default)]
    pub lineage: Option<String>,
    #[serde(flatten)]
    pub biomarkers: Biomarkers,
    #[serde(default)]
    pub mutations: Vec<Mutation>,
    #[serde(default, alias = "tumor_stage_2009")]
    pub stage: Option<String>,
    #[serde(default)]
    pub platinum_status: Option<String>,
    #[serde(default)]
    pub outcomes: Option<Outcomes>,
}

fn de_truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|x| x != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            !(s.is_empty() || matches!(s.as_str(), "0" | "false" | "nan" | "none" | "null" | "no"))
        }
        Value::Null => false,
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    })
}

fn de_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(lenient_f64(&v).filter(|x| x.is_finite()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cohort_patient_shape() {
        let json = r#"{
            "patient_id": "TCGA-01",
            "hrd_proxy": "HRD-High",
            "brca_somatic": "BRCA1",
            "tmb": "12.5",
            "msi_status": "MSS",
            "outcomes": {"os_days": 800, "os_event": true}
        }"#;
        let c: CaseRecord = serde_json::from_str(json).unwrap();
        assert_eq!(c.id, "TCGA-01");
        assert!(c.biomarkers.brca_somatic);
        assert_eq!(c.biomarkers.tmb, Some(12.5));
        assert!(!c.biomarkers.is_msi_high());
        assert_eq!(c.outcomes.unwrap().os_days, Some(800.0));
    }

    #[test]
    fn test_brca_somatic_falsey_values() {
        for raw in [r#""""#, "null", "false", "0", r#""none""#] {
            let json = format!(r#"{{"id": "x", "brca_somatic": {raw}}}"#);
            let c: CaseRecord = serde_json::from_str(&json).unwrap();
            assert!(!c.biomarkers.brca_somatic, "{raw} should be falsey");
        }
    }

    #[test]
    fn test_msi_high_spellings() {
        for s in ["MSI-H", "msih", "MSI_HIGH", " msi-high "] {
            let b = Biomarkers { msi_status: Some(s.into()), ..Default::default() };
            assert!(b.is_msi_high(), "{s}");
        }
    }

    #[test]
    fn test_variant_key_and_snv() {
        let m = Mutation {
            gene: "brca1".into(),
            chrom: Some("17".into()),
            pos: Some(43_045_712),
            ref_allele: Some("g".into()),
            alt: Some("A".into()),
            ..Default::default()
        };
        assert!(m.is_snv());
        assert_eq!(m.gene_upper(), "BRCA1");
        assert_eq!(m.variant_key("hg38").as_deref(), Some("hg38:chr17:43045712:G:A"));
    }

    #[test]
    fn test_indel_is_not_snv() {
        let m = Mutation { ref_allele: Some("AT".into()), alt: Some("A".into()), ..Default::default() };
        assert!(!m.is_snv());
    }
}
