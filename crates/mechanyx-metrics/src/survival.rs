//! Overall-survival statistics for a two-group comparison.
//!
//! Kaplan–Meier product-limit estimate, the log-rank test (χ² with one
//! degree of freedom) and a univariate Cox proportional-hazards fit by
//! Newton–Raphson with Breslow handling of tied event times.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurvivalObs {
    pub time: f64,
    pub event: bool,
}

/// Two-sided normal p-value for a z statistic.
pub fn normal_two_sided_p(z: f64) -> f64 {
    libm::erfc(z.abs() / std::f64::consts::SQRT_2)
}

/// Upper tail of χ² with one degree of freedom.
pub fn chi2_1df_sf(stat: f64) -> f64 {
    if stat <= 0.0 {
        return 1.0;
    }
    libm::erfc((stat / 2.0).sqrt())
}

/// Distinct event times, ascending, with event counts.
fn event_times(obs: &[SurvivalObs]) -> Vec<(f64, usize)> {
    let mut times: Vec<f64> = obs.iter().filter(|o| o.event).map(|o| o.time).collect();
    times.sort_by(f64::total_cmp);
    let mut out: Vec<(f64, usize)> = Vec::new();
    for t in times {
        match out.last_mut() {
            Some((last, d)) if *last == t => *d += 1,
            _ => out.push((t, 1)),
        }
    }
    out
}

fn at_risk(obs: &[SurvivalObs], t: f64) -> usize {
    obs.iter().filter(|o| o.time >= t).count()
}

// ── Kaplan–Meier ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KaplanMeier {
    /// `(event time, survival just after it)`.
    pub steps: Vec<(f64, f64)>,
}

impl KaplanMeier {
    pub fn fit(obs: &[SurvivalObs]) -> Self {
        let mut s = 1.0;
        let steps = event_times(obs)
            .into_iter()
            .map(|(t, d)| {
                let n = at_risk(obs, t) as f64;
                s *= 1.0 - d as f64 / n;
                (t, s)
            })
            .collect();
        Self { steps }
    }

    /// First time the curve reaches 0.5 or below; `None` if it never does.
    pub fn median(&self) -> Option<f64> {
        self.steps.iter().find(|(_, s)| *s <= 0.5).map(|(t, _)| *t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub n: usize,
    pub n_events: usize,
    pub median_days: Option<f64>,
}

impl GroupSummary {
    pub fn of(obs: &[SurvivalObs]) -> Self {
        Self {
            n: obs.len(),
            n_events: obs.iter().filter(|o| o.event).count(),
            median_days: KaplanMeier::fit(obs).median(),
        }
    }
}

// ── Log-rank ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogRank {
    pub test_statistic: f64,
    pub p_value: f64,
}

/// `None` when either group is empty or the variance is zero.
pub fn log_rank(a: &[SurvivalObs], b: &[SurvivalObs]) -> Option<LogRank> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let pooled: Vec<SurvivalObs> = a.iter().chain(b).copied().collect();
    let (mut observed, mut expected, mut variance) = (0.0, 0.0, 0.0);
    for (t, d) in event_times(&pooled) {
        let n = at_risk(&pooled, t) as f64;
        let n1 = at_risk(a, t) as f64;
        let d = d as f64;
        let d1 = a.iter().filter(|o| o.event && o.time == t).count() as f64;
        observed += d1;
        expected += d * n1 / n;
        if n > 1.0 {
            variance += d * (n1 / n) * (1.0 - n1 / n) * (n - d) / (n - 1.0);
        }
    }
    if variance <= 0.0 {
        return None;
    }
    let stat = (observed - expected).powi(2) / variance;
    Some(LogRank { test_statistic: stat, p_value: chi2_1df_sf(stat) })
}

// ── Cox ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoxFit {
    pub coef: f64,
    pub hazard_ratio: f64,
    pub se: f64,
    pub z: f64,
    pub p_value: f64,
    pub iterations: usize,
}

const COX_MAX_ITER: usize = 50;
const COX_TOL: f64 = 1e-9;
const COX_MAX_STEP: f64 = 5.0;

/// Score and information of the Breslow partial likelihood at `beta`.
fn cox_derivatives(obs: &[SurvivalObs], x: &[f64], beta: f64) -> (f64, f64) {
    let (mut score, mut info) = (0.0, 0.0);
    for (t, d) in event_times(obs) {
        let (mut s0, mut s1, mut s2) = (0.0, 0.0, 0.0);
        for (o, xi) in obs.iter().zip(x) {
            if o.time >= t {
                let w = (beta * xi).exp();
                s0 += w;
                s1 += w * xi;
                s2 += w * xi * xi;
            }
        }
        let x_events: f64 = obs
            .iter()
            .zip(x)
            .filter(|(o, _)| o.event && o.time == t)
            .map(|(_, xi)| *xi)
            .sum();
        let d = d as f64;
        let mean = s1 / s0;
        score += x_events - d * mean;
        info += d * (s2 / s0 - mean * mean);
    }
    (score, info)
}

/// Univariate Cox fit of one covariate. `None` for mismatched input,
/// no events, zero information, or a diverging estimate.
pub fn cox_univariate(obs: &[SurvivalObs], x: &[f64]) -> Option<CoxFit> {
    if obs.len() != x.len() || !obs.iter().any(|o| o.event) {
        return None;
    }
    let mut beta = 0.0;
    let mut iterations = 0;
    let mut converged = false;
    for i in 1..=COX_MAX_ITER {
        iterations = i;
        let (score, info) = cox_derivatives(obs, x, beta);
        if !(info > 0.0) {
            return None;
        }
        let step = (score / info).clamp(-COX_MAX_STEP, COX_MAX_STEP);
        beta += step;
        if step.abs() < COX_TOL {
            converged = true;
            break;
        }
    }
    let (_, info) = cox_derivatives(obs, x, beta);
    if !converged || !beta.is_finite() || !(info > 0.0) {
        return None;
    }
    let se = 1.0 / info.sqrt();
    let z = beta / se;
    Some(CoxFit {
        coef: beta,
        hazard_ratio: beta.exp(),
        se,
        z,
        p_value: normal_two_sided_p(z),
        iterations,
    })
}
