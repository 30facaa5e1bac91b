//! External HRD proxy scores keyed by model id.
//!
//! Accepted layouts:
//! - JSON object `{model_id: score}`, or `{model_id: {"hrd_score": ..}}`
//! - CSV with a model id column and one of `HRD_SCORE`, `HRD`,
//!   `hrd_proxy`, `hrd_score`
//! - gene-level copy-number CSV (`BRCA1` or `BRCA1 (672)` columns),
//!   scored from losses across the configured HRR genes

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use mechanyx_common::catalog::lenient_f64;
use mechanyx_common::{MechanyxError, Result};
use mechanyx_config::HrdProxyConfig;
use serde_json::Value;
use tracing::{debug, info};

const ID_COLUMNS: [&str; 3] = ["ModelID", "model_id", "DepMap_ID"];
const SCORE_COLUMNS: [&str; 4] = ["HRD_SCORE", "HRD", "hrd_proxy", "hrd_score"];

/// Load `model_id → HRD score` from a JSON or CSV file.
pub fn load_hrd_proxy(path: &Path, cfg: &HrdProxyConfig) -> Result<BTreeMap<String, f64>> {
    if !path.exists() {
        return Err(MechanyxError::MissingInput(path.to_path_buf()));
    }
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let out = if is_json {
        parse_hrd_json(&std::fs::read_to_string(path)?)?
    } else {
        read_hrd_csv(std::fs::File::open(path)?, cfg)?
    };
    if out.is_empty() {
        return Err(MechanyxError::EmptyDataset(format!("no HRD proxy scores in {}", path.display())));
    }
    info!(path = %path.display(), models = out.len(), "Loaded external HRD proxy");
    Ok(out)
}

pub fn parse_hrd_json(content: &str) -> Result<BTreeMap<String, f64>> {
    let Value::Object(map) = serde_json::from_str::<Value>(content)? else {
        return Err(MechanyxError::InvalidInput(
            "HRD proxy JSON must be an object keyed by model id".into(),
        ));
    };
    let mut out = BTreeMap::new();
    for (key, v) in &map {
        // Patient barcodes, not cell-line models
        if key.starts_with("TCGA-") {
            continue;
        }
        let score = match v {
            Value::Object(o) => o
                .get("hrd_score")
                .or_else(|| o.get("hrd_proxy"))
                .and_then(lenient_f64),
            other => lenient_f64(other),
        };
        if let Some(s) = score.filter(|s| s.is_finite()) {
            out.insert(key.clone(), s);
        }
    }
    Ok(out)
}

pub fn read_hrd_csv<R: Read>(reader: R, cfg: &HrdProxyConfig) -> Result<BTreeMap<String, f64>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |names: &[&str]| names.iter().find_map(|n| headers.iter().position(|h| h == *n));

    let id_col = column(&ID_COLUMNS[..]).ok_or_else(|| {
        MechanyxError::InvalidInput(format!("HRD proxy table needs one of {ID_COLUMNS:?}"))
    })?;

    let mut out = BTreeMap::new();
    if let Some(score_col) = column(&SCORE_COLUMNS[..]) {
        for rec in rdr.records() {
            let rec = rec?;
            let id = rec.get(id_col).unwrap_or_default();
            let score = rec.get(score_col).and_then(|s| s.parse::<f64>().ok());
            if let Some(score) = score.filter(|s| s.is_finite() && !id.is_empty()) {
                out.insert(id.to_string(), score);
            }
        }
        return Ok(out);
    }

    let mut gene_cols: Vec<usize> = cfg
        .core_genes
        .iter()
        .chain(&cfg.extended_genes)
        .filter_map(|gene| headers.iter().position(|h| is_gene_column(h, gene)))
        .collect();
    gene_cols.sort_unstable();
    gene_cols.dedup();
    if gene_cols.is_empty() {
        return Err(MechanyxError::InvalidInput(
            "HRD proxy table has neither a score column nor HRR gene copy-number columns".into(),
        ));
    }

    let mut rows: Vec<(String, Vec<f64>)> = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        let id = rec.get(id_col).unwrap_or_default();
        if id.is_empty() {
            continue;
        }
        let values = gene_cols
            .iter()
            .filter_map(|c| rec.get(*c).and_then(|s| s.parse::<f64>().ok()))
            .filter(|v| v.is_finite())
            .collect();
        rows.push((id.to_string(), values));
    }

    let all: Vec<f64> = rows.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    let threshold = cna_loss_threshold(&all);
    debug!(genes = gene_cols.len(), threshold, "Scoring HRD proxy from copy number");
    for (id, values) in rows {
        let losses = values.iter().filter(|v| **v <= threshold).count();
        let score = (cfg.cna_base_score + cfg.cna_loss_step * losses as f64).clamp(0.0, 100.0);
        out.insert(id, score);
    }
    Ok(out)
}

fn is_gene_column(header: &str, gene: &str) -> bool {
    let h = header.to_ascii_uppercase();
    let g = gene.trim().to_ascii_uppercase();
    h == g || h.strip_prefix(&g).is_some_and(|rest| rest.starts_with(' '))
}

/// Loss cut-off inferred from the value scale: log2 ratios sit near 0,
/// relative copy number near 1, absolute copy number near 2.
pub fn cna_loss_threshold(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.7;
    }
    let mut v = values.to_vec();
    v.sort_by(f64::total_cmp);
    let n = v.len();
    let median = if n % 2 == 1 { v[n / 2] } else { (v[n / 2 - 1] + v[n / 2]) / 2.0 };
    if median < 0.2 {
        -0.5
    } else if median < 1.4 {
        0.7
    } else {
        1.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechanyx_test_utils::{temp_dir, write_fixture};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_scores() {
        let map = parse_hrd_json(
            r#"{"ACH-000001": 48, "ACH-000002": {"hrd_score": "31.5"},
                "TCGA-AB-1234": 60, "ACH-000003": null}"#,
        )
        .unwrap();
        assert_eq!(
            map,
            BTreeMap::from([("ACH-000001".to_string(), 48.0), ("ACH-000002".to_string(), 31.5)])
        );
        assert!(parse_hrd_json("[1, 2]").unwrap_err().is_refusal());
    }

    #[test]
    fn test_csv_score_column() {
        let csv = "ModelID,HRD_SCORE\nACH-000001,50\nACH-000002,\nACH-000003,12.5\n";
        let map = read_hrd_csv(csv.as_bytes(), &HrdProxyConfig::default()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["ACH-000003"], 12.5);
    }

    #[test]
    fn test_copy_number_losses() {
        // log2-ratio scale: median −0.4, losses at ≤ −0.5; TTN is not an HRR gene
        let csv = "\
ModelID,BRCA1 (672),BRCA2 (675),TTN (7273)
ACH-000001,-1.0,-0.8,-3.0
ACH-000002,0.1,0.0,-3.0
";
        let map = read_hrd_csv(csv.as_bytes(), &HrdProxyConfig::default()).unwrap();
        assert_eq!(map["ACH-000001"], 44.0);
        assert_eq!(map["ACH-000002"], 20.0);
    }

    #[test]
    fn test_loss_threshold_scales() {
        assert_eq!(cna_loss_threshold(&[0.0, -0.1, 0.1]), -0.5);
        assert_eq!(cna_loss_threshold(&[1.0, 0.9, 1.1]), 0.7);
        assert_eq!(cna_loss_threshold(&[2.0, 2.0, 1.0]), 1.5);
        assert_eq!(cna_loss_threshold(&[]), 0.7);
    }

    #[test]
    fn test_unusable_files_are_refused() {
        let cfg = HrdProxyConfig::default();
        assert!(load_hrd_proxy(Path::new("/nonexistent/hrd.json"), &cfg).unwrap_err().is_refusal());
        let dir = temp_dir();
        let empty = write_fixture(dir.path(), "hrd.json", "{}");
        assert!(load_hrd_proxy(&empty, &cfg).unwrap_err().is_refusal());
        let no_genes = write_fixture(dir.path(), "cn.csv", "ModelID,TTN\nACH-000001,0.1\n");
        assert!(load_hrd_proxy(&no_genes, &cfg).unwrap_err().is_refusal());
    }
}
