//! Multimodal S/P/D benchmark over a labeled cell-line panel.
//!
//! Given per-line features and a stratified split, fits the gene
//! calibrator and both softmax models on train only, tunes thresholds on
//! train predictions, then reports every method on both partitions.

use std::collections::BTreeMap;

use mechanyx_common::{DrugClass, Result};
use mechanyx_config::{PathwayConfig, TrainingConfig};
use mechanyx_depmap::EssentialityProvider;
use mechanyx_metrics::{label_distribution, ClassificationReport};
use mechanyx_ranker::{predict_from_scores, CellLineFeatures, ClassScores, PathwayScorer};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::calibrator::Calibrator;
use crate::features::{sp_features, spd_features};
use crate::softmax::{SoftmaxModel, SoftmaxParams};
use crate::split::Split;
use crate::tuning::{tune_none_threshold, tune_prob_threshold, TuningResult};

pub const ALWAYS_NONE: &str = "Always NONE";
pub const P_ONLY: &str = "P-only";
pub const SP: &str = "SP";
pub const SPD: &str = "SPD";
pub const LR_SP: &str = "LR-SP";
pub const LR_SPD: &str = "LR-SPD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodResult {
    pub name: String,
    pub train: ClassificationReport,
    pub test: ClassificationReport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub seed: u64,
    pub test_frac: f64,
    pub n_train: usize,
    pub n_test: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub split: SplitSummary,
    pub label_distribution: BTreeMap<String, BTreeMap<DrugClass, usize>>,
    pub calibrated_genes: usize,
    /// Keyed by method name; only present for tuned methods.
    pub tuning: BTreeMap<String, TuningResult>,
    /// Thresholds actually applied, keyed by method name.
    pub thresholds: BTreeMap<String, f64>,
    pub methods: Vec<MethodResult>,
}

impl BenchmarkReport {
    pub fn method(&self, name: &str) -> Option<&MethodResult> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Everything derived for one cell line once the calibrator is fit.
struct LineView {
    truth: DrugClass,
    p_only: DrugClass,
    sp: ClassScores,
    spd: ClassScores,
    sp_row: Vec<f64>,
    spd_row: Vec<f64>,
}

impl LineView {
    fn scores(&self, grounded: bool) -> &ClassScores {
        if grounded {
            &self.spd
        } else {
            &self.sp
        }
    }

    fn row(&self, grounded: bool) -> &[f64] {
        if grounded {
            &self.spd_row
        } else {
            &self.sp_row
        }
    }
}

/// Per-partition predictions for one method.
struct Predictions {
    train: Vec<DrugClass>,
    test: Vec<DrugClass>,
}

pub struct Benchmark<'a> {
    training: &'a TrainingConfig,
    scorer: PathwayScorer<'a>,
    depmap: &'a dyn EssentialityProvider,
}

impl<'a> Benchmark<'a> {
    pub fn new(
        training: &'a TrainingConfig,
        pathways: &'a PathwayConfig,
        depmap: &'a dyn EssentialityProvider,
    ) -> Self {
        Self { training, scorer: PathwayScorer::new(pathways), depmap }
    }

    /// Run every method. Lines in `split` without an entry in `features`
    /// are treated as having no scored variants.
    #[instrument(skip_all, fields(n_train = split.train.len(), n_test = split.test.len()))]
    pub fn run(
        &self,
        features: &BTreeMap<String, CellLineFeatures>,
        labels: &BTreeMap<String, DrugClass>,
        split: &Split,
    ) -> Result<BenchmarkReport> {
        let lookup = |id: &String| {
            features.get(id).cloned().unwrap_or_else(|| CellLineFeatures {
                model_id: id.clone(),
                ..Default::default()
            })
        };
        let train_feats: Vec<CellLineFeatures> = split.train.iter().map(lookup).collect();
        let test_feats: Vec<CellLineFeatures> = split.test.iter().map(lookup).collect();

        let calibrator = Calibrator::fit(&train_feats);
        debug!(genes = calibrator.n_genes(), "Calibrator fit on train partition");

        let view = |f: &CellLineFeatures| self.view(f, labels, &calibrator);
        let train: Vec<LineView> = train_feats.iter().map(view).collect();
        let test: Vec<LineView> = test_feats.iter().map(view).collect();
        let train_truth: Vec<DrugClass> = train.iter().map(|l| l.truth).collect();
        let test_truth: Vec<DrugClass> = test.iter().map(|l| l.truth).collect();

        let mut tuning = BTreeMap::new();
        let mut thresholds = BTreeMap::new();
        let mut predictions: Vec<(&str, Predictions)> = Vec::new();

        predictions.push((
            ALWAYS_NONE,
            Predictions {
                train: vec![DrugClass::None; train.len()],
                test: vec![DrugClass::None; test.len()],
            },
        ));
        predictions.push((
            P_ONLY,
            Predictions {
                train: train.iter().map(|l| l.p_only).collect(),
                test: test.iter().map(|l| l.p_only).collect(),
            },
        ));

        for (name, grounded) in [(SP, false), (SPD, true)] {
            let threshold = if self.training.tune_none_threshold {
                let train_scores: Vec<ClassScores> =
                    train.iter().map(|l| l.scores(grounded).clone()).collect();
                let result = tune_none_threshold(
                    &train_truth,
                    &train_scores,
                    &self.training.none_grid.values(),
                    self.training.max_parp_fpr,
                );
                let thr = result.chosen.threshold;
                tuning.insert(name.to_string(), result);
                thr
            } else {
                self.training.none_threshold
            };
            thresholds.insert(name.to_string(), threshold);
            predictions.push((
                name,
                Predictions {
                    train: train.iter().map(|l| predict_from_scores(l.scores(grounded), threshold)).collect(),
                    test: test.iter().map(|l| predict_from_scores(l.scores(grounded), threshold)).collect(),
                },
            ));
        }

        let params = SoftmaxParams::from(self.training);
        for (name, grounded) in [(LR_SP, false), (LR_SPD, true)] {
            let x_train: Vec<Vec<f64>> = train.iter().map(|l| l.row(grounded).to_vec()).collect();
            let x_test: Vec<Vec<f64>> = test.iter().map(|l| l.row(grounded).to_vec()).collect();
            let model = SoftmaxModel::fit(&x_train, &train_truth, &params)?;
            let p_train = model.predict_proba_batch(&x_train);
            let p_test = model.predict_proba_batch(&x_test);

            let preds = if self.training.tune_none_threshold {
                let result = tune_prob_threshold(
                    &train_truth,
                    &model,
                    &p_train,
                    &self.training.prob_grid.values(),
                    self.training.max_parp_fpr,
                );
                let thr = result.chosen.threshold;
                tuning.insert(name.to_string(), result);
                thresholds.insert(name.to_string(), thr);
                Predictions {
                    train: p_train.iter().map(|p| model.predict(p, thr)).collect(),
                    test: p_test.iter().map(|p| model.predict(p, thr)).collect(),
                }
            } else {
                Predictions {
                    train: p_train.iter().map(|p| model.argmax(p)).collect(),
                    test: p_test.iter().map(|p| model.argmax(p)).collect(),
                }
            };
            predictions.push((name, preds));
        }

        let methods: Vec<MethodResult> = predictions
            .into_iter()
            .map(|(name, p)| MethodResult {
                name: name.to_string(),
                train: ClassificationReport::evaluate(&train_truth, &p.train),
                test: ClassificationReport::evaluate(&test_truth, &p.test),
            })
            .collect();

        for m in &methods {
            info!(
                method = %m.name,
                test_macro_f1 = m.test.macro_f1,
                test_parp_fpr = m.test.parp_false_positive_rate,
                "Benchmark method"
            );
        }

        Ok(BenchmarkReport {
            split: SplitSummary {
                seed: self.training.seed,
                test_frac: self.training.test_frac,
                n_train: train.len(),
                n_test: test.len(),
            },
            label_distribution: BTreeMap::from([
                ("train".to_string(), label_distribution(&train_truth)),
                ("test".to_string(), label_distribution(&test_truth)),
            ]),
            calibrated_genes: calibrator.n_genes(),
            tuning,
            thresholds,
            methods,
        })
    }

    fn view(&self, f: &CellLineFeatures, labels: &BTreeMap<String, DrugClass>, calib: &Calibrator) -> LineView {
        let sp = self.scorer.sp_scores_calibrated(f, calib);
        let ess = self.scorer.essentialities(&f.lineage, self.depmap);
        let spd: ClassScores = sp
            .iter()
            .map(|(c, s)| (*c, s * ess.get(c).copied().unwrap_or(0.0)))
            .collect();
        LineView {
            truth: labels.get(&f.model_id).copied().unwrap_or(DrugClass::None),
            p_only: self.scorer.p_only(f),
            sp_row: sp_features(&sp, f),
            spd_row: spd_features(&spd, &ess, f),
            sp,
            spd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mechanyx_depmap::MockEssentialityProvider;
    use pretty_assertions::assert_eq;

    fn line(id: &str, gene: &str, d: f64, hrr: f64) -> CellLineFeatures {
        CellLineFeatures {
            model_id: id.to_string(),
            lineage: "Breast".to_string(),
            hrr_max: hrr,
            gene_raw_max: BTreeMap::from([(gene.to_string(), d)]),
            n_variants_scored: 1,
            n_variants_considered: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_runs_every_method_and_keeps_missing_lines() {
        let training = TrainingConfig { steps: 20, ..Default::default() };
        let pathways = PathwayConfig::default();
        let depmap = MockEssentialityProvider::new().with_global("PARP1", 0.5);
        let bench = Benchmark::new(&training, &pathways, &depmap);

        let features = BTreeMap::from([
            ("A".to_string(), line("A", "BRCA2", 0.9, 0.9)),
            ("B".to_string(), line("B", "KRAS", 0.4, 0.0)),
        ]);
        let labels = BTreeMap::from([
            ("A".to_string(), DrugClass::Parp),
            ("B".to_string(), DrugClass::None),
            ("C".to_string(), DrugClass::None),
        ]);
        let split = Split { train: vec!["A".into(), "B".into()], test: vec!["C".into()] };
        let report = bench.run(&features, &labels, &split).unwrap();

        let names: Vec<&str> = report.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec![ALWAYS_NONE, P_ONLY, SP, SPD, LR_SP, LR_SPD]);
        assert_eq!(report.split.n_test, 1);
        assert!(report.tuning.is_empty());
        // "C" has no features, so P-only abstains on it
        assert_eq!(report.method(P_ONLY).unwrap().test.accuracy, 1.0);
        assert_eq!(report.method(P_ONLY).unwrap().train.accuracy, 1.0);
        assert_eq!(report.label_distribution["train"][&DrugClass::Parp], 1);
    }
}
