//! Two-arm event tables: Fisher exact test and risk comparisons.
//!
//! Table layout:
//!
//! ```text
//!               event   no event
//! control         a        b
//! intervention    c        d
//! ```

use serde::{Deserialize, Serialize};

fn ln_choose(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    libm::lgamma(n as f64 + 1.0) - libm::lgamma(k as f64 + 1.0) - libm::lgamma((n - k) as f64 + 1.0)
}

/// Two-sided Fisher exact p-value: the summed probability of every table
/// with the observed margins that is no more likely than the observed one.
pub fn fisher_exact_two_sided(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let r1 = a + b;
    let c1 = a + c;
    let n = a + b + c + d;
    if n == 0 {
        return 1.0;
    }
    let ln_denom = ln_choose(n, r1);
    let hyper = |x: u64| (ln_choose(c1, x) + ln_choose(n - c1, r1 - x) - ln_denom).exp();

    let p_obs = hyper(a);
    let lo = r1.saturating_sub(n - c1);
    let hi = r1.min(c1);
    let p: f64 = (lo..=hi)
        .map(hyper)
        .filter(|px| *px <= p_obs * (1.0 + 1e-7) + 1e-15)
        .sum();
    p.min(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arm {
    pub n: u64,
    pub events: u64,
    /// `None` for an empty arm.
    pub rate: Option<f64>,
}

impl Arm {
    pub fn new(events: u64, n: u64) -> Self {
        let rate = (n > 0).then(|| events as f64 / n as f64);
        Self { n, events, rate }
    }
}

/// Control vs intervention event rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskComparison {
    pub control: Arm,
    pub intervention: Arm,
    /// Absolute risk reduction, control minus intervention.
    pub arr: Option<f64>,
    /// Intervention over control; `None` on a zero control rate.
    pub rr: Option<f64>,
    pub rrr: Option<f64>,
    pub fisher_two_sided_p: f64,
}

impl RiskComparison {
    pub fn compute(control_events: u64, control_n: u64, int_events: u64, int_n: u64) -> Self {
        let control = Arm::new(control_events, control_n);
        let intervention = Arm::new(int_events, int_n);
        let arr = control.rate.zip(intervention.rate).map(|(rc, ri)| rc - ri);
        let positive_control = control.rate.filter(|rc| *rc > 0.0);
        let rr = positive_control.zip(intervention.rate).map(|(rc, ri)| ri / rc);
        let rrr = positive_control.zip(arr).map(|(rc, arr)| arr / rc);
        let p = fisher_exact_two_sided(
            control_events,
            control_n.saturating_sub(control_events),
            int_events,
            int_n.saturating_sub(int_events),
        );
        Self { control, intervention, arr, rr, rrr, fisher_two_sided_p: p }
    }
}
