//! Multinomial logistic regression over class-score features.
//!
//! Full-batch gradient descent with L2 on z-scored inputs. Scaling is fit
//! on the training rows and stored with the model, so inference never
//! sees test statistics.

use mechanyx_common::{DrugClass, MechanyxError, Result};
use mechanyx_config::TrainingConfig;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxParams {
    pub learning_rate: f64,
    pub l2: f64,
    pub steps: usize,
    pub seed: u64,
}

impl Default for SoftmaxParams {
    fn default() -> Self {
        Self { learning_rate: 0.5, l2: 1e-3, steps: 2000, seed: 1337 }
    }
}

impl From<&TrainingConfig> for SoftmaxParams {
    fn from(cfg: &TrainingConfig) -> Self {
        Self { learning_rate: cfg.learning_rate, l2: cfg.l2, steps: cfg.steps, seed: cfg.seed }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxModel {
    pub classes: Vec<DrugClass>,
    /// `k × d`, one row per class.
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
    pub mu: Array1<f64>,
    pub sigma: Array1<f64>,
}

/// Softmax of one logit row, shifted by the row max.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    softmax_rows(Array2::from_shape_fn((1, logits.len()), |(_, j)| logits[j]))
        .row(0)
        .to_vec()
}

fn softmax_rows(mut z: Array2<f64>) -> Array2<f64> {
    for mut row in z.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row /= sum;
    }
    z
}

/// Rows as an `n × d` matrix; short rows are zero-padded, long ones cut.
fn to_matrix(rows: &[Vec<f64>], d: usize) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), d), |(i, j)| rows[i].get(j).copied().unwrap_or(0.0))
}

impl SoftmaxModel {
    /// Fit on `x` (rows of equal width) against `y`, over the full label
    /// set with NONE last.
    #[instrument(skip_all, fields(n = x.len()))]
    pub fn fit(x: &[Vec<f64>], y: &[DrugClass], params: &SoftmaxParams) -> Result<Self> {
        if x.is_empty() {
            return Err(MechanyxError::EmptyDataset("softmax training set is empty".into()));
        }
        if x.len() != y.len() {
            return Err(MechanyxError::InvalidInput(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        let d = x[0].len();
        if x.iter().any(|r| r.len() != d) {
            return Err(MechanyxError::InvalidInput("ragged feature rows".into()));
        }

        let classes = DrugClass::ALL.to_vec();
        let k = classes.len();
        let n = x.len();
        let x = to_matrix(x, d);
        let mu = x
            .mean_axis(Axis(0))
            .ok_or_else(|| MechanyxError::EmptyDataset("softmax training set is empty".into()))?;
        let sigma = x.std_axis(Axis(0), 0.0).mapv(|s| if s < 1e-8 { 1.0 } else { s });
        let xn = (&x - &mu) / &sigma;
        let onehot = Array2::from_shape_fn((n, k), |(i, c)| if classes[c] == y[i] { 1.0 } else { 0.0 });

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut w = Array2::from_shape_simple_fn((k, d), || {
            let z: f64 = StandardNormal.sample(&mut rng);
            0.01 * z
        });
        let mut b = Array1::<f64>::zeros(k);

        let scale = 1.0 / n as f64;
        for _ in 0..params.steps {
            let p = softmax_rows(xn.dot(&w.t()) + &b);
            let g = (p - &onehot) * scale;
            let dw = g.t().dot(&xn) + &w * params.l2;
            let db = g.sum_axis(Axis(0));
            w.scaled_add(-params.learning_rate, &dw);
            b.scaled_add(-params.learning_rate, &db);
        }
        debug!(k, d, steps = params.steps, "Fitted softmax regression");
        Ok(Self { classes, weights: w, bias: b, mu, sigma })
    }

    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        self.predict_proba_batch(&[row.to_vec()])
            .pop()
            .unwrap_or_default()
    }

    pub fn predict_proba_batch(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let xn = (&to_matrix(rows, self.mu.len()) - &self.mu) / &self.sigma;
        softmax_rows(xn.dot(&self.weights.t()) + &self.bias)
            .rows()
            .into_iter()
            .map(|r| r.to_vec())
            .collect()
    }

    /// Most probable class over the full label set, NONE included.
    pub fn argmax(&self, prob: &[f64]) -> DrugClass {
        let mut best: Option<(DrugClass, f64)> = None;
        for (c, p) in self.classes.iter().zip(prob) {
            if best.map_or(true, |(_, b)| *p > b) {
                best = Some((*c, *p));
            }
        }
        best.map_or(DrugClass::None, |(c, _)| c)
    }

    /// Best actionable class, or NONE when its probability is below
    /// `threshold`.
    pub fn predict(&self, prob: &[f64], threshold: f64) -> DrugClass {
        let mut best: Option<(DrugClass, f64)> = None;
        for (c, p) in self.classes.iter().zip(prob).filter(|(c, _)| c.is_actionable()) {
            if best.map_or(true, |(_, b)| *p > b) {
                best = Some((*c, *p));
            }
        }
        match best {
            Some((c, p)) if p >= threshold => c,
            _ => DrugClass::None,
        }
    }
}
