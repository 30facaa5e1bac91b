//! Biomarker gate triggers and their rates across a cohort.
//!
//! - IO boost: `TMB ≥ t` or MSI-H
//! - PARP rescue: `HRD ≥ h`
//! - PARP penalty: HRD missing or `< h`

use mechanyx_common::{Biomarkers, CaseRecord};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateTriggers {
    pub io_boost: bool,
    pub parp_rescue: bool,
    pub parp_penalty: bool,
}

impl GateTriggers {
    pub fn evaluate(b: &Biomarkers, tmb_threshold: f64, hrd_threshold: f64) -> Self {
        let io_boost = b.tmb.is_some_and(|t| t >= tmb_threshold) || b.is_msi_high();
        let parp_rescue = b.hrd_score.is_some_and(|h| h >= hrd_threshold);
        let parp_penalty = b.hrd_score.map_or(true, |h| h < hrd_threshold);
        Self { io_boost, parp_rescue, parp_penalty }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRates {
    pub n: usize,
    /// `None` for an empty group.
    pub io_boost_rate: Option<f64>,
    pub parp_rescue_rate: Option<f64>,
    pub parp_penalty_rate: Option<f64>,
}

impl TriggerRates {
    pub fn from_triggers(triggers: &[GateTriggers]) -> Self {
        let n = triggers.len();
        let rate = |f: fn(&GateTriggers) -> bool| {
            (n > 0).then(|| triggers.iter().filter(|t| f(t)).count() as f64 / n as f64)
        };
        Self {
            n,
            io_boost_rate: rate(|t| t.io_boost),
            parp_rescue_rate: rate(|t| t.parp_rescue),
            parp_penalty_rate: rate(|t| t.parp_penalty),
        }
    }

    pub fn for_cases<'c, I>(cases: I, tmb_threshold: f64, hrd_threshold: f64) -> Self
    where
        I: IntoIterator<Item = &'c CaseRecord>,
    {
        let triggers: Vec<GateTriggers> = cases
            .into_iter()
            .map(|c| GateTriggers::evaluate(&c.biomarkers, tmb_threshold, hrd_threshold))
            .collect();
        Self::from_triggers(&triggers)
    }
}

/// `STAGE_III`, `STAGE_IV`, `OTHER`, or `UNKNOWN` when absent.
pub fn stage_group(stage: Option<&str>) -> &'static str {
    let Some(s) = stage.map(|s| s.trim().to_ascii_uppercase()).filter(|s| !s.is_empty()) else {
        return "UNKNOWN";
    };
    let s = s.strip_prefix("STAGE").map(str::trim).unwrap_or(&s);
    if s.starts_with("III") {
        "STAGE_III"
    } else if s.starts_with("IV") {
        "STAGE_IV"
    } else {
        "OTHER"
    }
}

/// Platinum response bucket, upper-cased.
pub fn platinum_group(status: Option<&str>) -> &'static str {
    let Some(s) = status.map(|s| s.trim().to_ascii_lowercase()).filter(|s| !s.is_empty()) else {
        return "UNKNOWN";
    };
    match s.as_str() {
        "sensitive" => "SENSITIVE",
        "resistant" => "RESISTANT",
        "tooearly" => "TOOEARLY",
        "missing" => "MISSING",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bm(tmb: Option<f64>, hrd: Option<f64>, msi: Option<&str>) -> Biomarkers {
        Biomarkers { tmb, hrd_score: hrd, msi_status: msi.map(String::from), ..Default::default() }
    }

    #[test]
    fn test_trigger_definitions() {
        let t = GateTriggers::evaluate(&bm(Some(25.0), Some(50.0), None), 20.0, 42.0);
        assert_eq!(t, GateTriggers { io_boost: true, parp_rescue: true, parp_penalty: false });

        let t = GateTriggers::evaluate(&bm(None, None, Some("MSI-H")), 20.0, 42.0);
        assert_eq!(t, GateTriggers { io_boost: true, parp_rescue: false, parp_penalty: true });

        let t = GateTriggers::evaluate(&bm(Some(5.0), Some(41.9), None), 20.0, 42.0);
        assert_eq!(t, GateTriggers { io_boost: false, parp_rescue: false, parp_penalty: true });
    }

    #[test]
    fn test_rates() {
        let cases: Vec<CaseRecord> = [Some(50.0), Some(30.0), None, Some(45.0)]
            .into_iter()
            .enumerate()
            .map(|(i, hrd)| CaseRecord {
                id: i.to_string(),
                biomarkers: bm(None, hrd, None),
                ..Default::default()
            })
            .collect();
        let r = TriggerRates::for_cases(&cases, 20.0, 42.0);
        assert_eq!(r.n, 4);
        assert_eq!(r.parp_rescue_rate, Some(0.5));
        assert_eq!(r.parp_penalty_rate, Some(0.5));
        assert_eq!(r.io_boost_rate, Some(0.0));

        let empty = TriggerRates::from_triggers(&[]);
        assert_eq!(empty.io_boost_rate, None);
    }

    #[test]
    fn test_subgroups() {
        assert_eq!(stage_group(Some("Stage IIIC")), "STAGE_III");
        assert_eq!(stage_group(Some("IV")), "STAGE_IV");
        assert_eq!(stage_group(Some("IIB")), "OTHER");
        assert_eq!(stage_group(None), "UNKNOWN");
        assert_eq!(platinum_group(Some("Sensitive")), "SENSITIVE");
        assert_eq!(platinum_group(Some("partial")), "OTHER");
        assert_eq!(platinum_group(Some("  ")), "UNKNOWN");
    }
}
