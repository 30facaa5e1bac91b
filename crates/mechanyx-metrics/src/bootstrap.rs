//! Seeded percentile bootstrap.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub low: f64,
    pub high: f64,
}

/// Bootstrap parameters. Defaults: 2000 resamples, seed 42, 95%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    pub resamples: usize,
    pub seed: u64,
    pub confidence: f64,
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self { resamples: 2000, seed: 42, confidence: 0.95 }
    }
}

impl Bootstrap {
    pub fn new(resamples: usize, seed: u64, confidence: f64) -> Self {
        Self { resamples, seed, confidence }
    }

    /// Percentile interval of `stat` over `resamples` index draws with
    /// replacement. Bounds sit at `⌊α/2·B⌋` and `⌊(1−α/2)·B⌋` of the
    /// sorted statistics. `None` for an empty sample or zero resamples.
    pub fn interval<F>(&self, n: usize, stat: F) -> Option<Interval>
    where
        F: Fn(&[usize]) -> f64,
    {
        if n == 0 || self.resamples == 0 {
            return None;
        }
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut idx = vec![0usize; n];
        let mut stats: Vec<f64> = Vec::with_capacity(self.resamples);
        for _ in 0..self.resamples {
            for slot in idx.iter_mut() {
                *slot = rng.gen_range(0..n);
            }
            stats.push(stat(&idx));
        }
        stats.sort_by(f64::total_cmp);

        let alpha = 1.0 - self.confidence;
        let b = self.resamples as f64;
        let last = self.resamples - 1;
        let lo = ((alpha / 2.0 * b).floor() as usize).min(last);
        let hi = (((1.0 - alpha / 2.0) * b).floor() as usize).min(last);
        Some(Interval { low: stats[lo], high: stats[hi] })
    }

    /// Interval for the mean of a 0/1 outcome list.
    pub fn bernoulli(&self, outcomes: &[bool]) -> Option<Interval> {
        self.interval(outcomes.len(), |idx| {
            idx.iter().filter(|i| outcomes[**i]).count() as f64 / idx.len() as f64
        })
    }

    pub fn mean(&self, values: &[f64]) -> Option<Interval> {
        self.interval(values.len(), |idx| {
            idx.iter().map(|i| values[*i]).sum::<f64>() / idx.len() as f64
        })
    }
}
