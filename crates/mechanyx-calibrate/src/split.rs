//! Seeded stratified sampling and train/test splitting.
//!
//! One RNG is threaded through both steps, classes are visited in label
//! order and pools are sorted before shuffling, so a given seed always
//! yields the same partition.

use std::collections::{BTreeMap, BTreeSet};

use mechanyx_common::{DrugClass, MechanyxError, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<String>,
    pub test: Vec<String>,
}

impl Split {
    pub fn is_test(&self, id: &str) -> bool {
        self.test.binary_search_by(|t| t.as_str().cmp(id)).is_ok()
    }
}

/// Seeded sampler over labeled ids.
pub struct Stratifier {
    rng: StdRng,
}

fn by_class(ids: &[String], labels: &BTreeMap<String, DrugClass>) -> BTreeMap<DrugClass, Vec<String>> {
    let mut out: BTreeMap<DrugClass, Vec<String>> = BTreeMap::new();
    let unique: BTreeSet<&String> = ids.iter().collect();
    for id in unique {
        let class = labels.get(id).copied().unwrap_or(DrugClass::None);
        out.entry(class).or_default().push(id.clone());
    }
    out
}

impl Stratifier {
    pub fn new(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    /// Up to `n_per_class` ids drawn from each class; sorted output.
    pub fn subsample(&mut self, labels: &BTreeMap<String, DrugClass>, n_per_class: usize) -> Vec<String> {
        let ids: Vec<String> = labels.keys().cloned().collect();
        let mut chosen = Vec::new();
        for (class, mut pool) in by_class(&ids, labels) {
            pool.shuffle(&mut self.rng);
            pool.truncate(n_per_class);
            debug!(class = %class, n = pool.len(), "Sampled class");
            chosen.extend(pool);
        }
        chosen.sort();
        chosen
    }

    /// Per class: shuffle, then hold out
    /// `clamp(round(n·test_frac), 1, max(1, n − 1))` ids. Singleton classes
    /// therefore land entirely in test.
    pub fn split(
        &mut self,
        ids: &[String],
        labels: &BTreeMap<String, DrugClass>,
        test_frac: f64,
    ) -> Result<Split> {
        if !(0.0..1.0).contains(&test_frac) {
            return Err(MechanyxError::InvalidInput(format!("test_frac must be in [0, 1): {test_frac}")));
        }
        if ids.is_empty() {
            return Err(MechanyxError::EmptyDataset("no ids to split".into()));
        }
        let (mut train, mut test) = (Vec::new(), Vec::new());
        for (_, mut pool) in by_class(ids, labels) {
            pool.shuffle(&mut self.rng);
            let n = pool.len();
            let n_test = ((n as f64 * test_frac).round() as usize).clamp(1, (n - 1).max(1));
            test.extend(pool.drain(..n_test));
            train.extend(pool);
        }
        train.sort();
        test.sort();
        Ok(Split { train, test })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels(counts: &[(DrugClass, usize)]) -> BTreeMap<String, DrugClass> {
        let mut out = BTreeMap::new();
        for (class, n) in counts {
            for i in 0..*n {
                out.insert(format!("{}-{i:02}", class.as_str()), *class);
            }
        }
        out
    }

    #[test]
    fn test_subsample_caps_each_class() {
        let l = labels(&[(DrugClass::Parp, 10), (DrugClass::Atr, 3), (DrugClass::None, 40)]);
        let chosen = Stratifier::new(1337).subsample(&l, 5);
        assert_eq!(chosen.len(), 5 + 3 + 5);
        let mut sorted = chosen.clone();
        sorted.sort();
        assert_eq!(chosen, sorted);
    }

    #[test]
    fn test_split_is_stratified_and_deterministic() {
        let l = labels(&[(DrugClass::Parp, 10), (DrugClass::Wee1, 5), (DrugClass::DnaPk, 1)]);
        let ids: Vec<String> = l.keys().cloned().collect();
        let a = Stratifier::new(7).split(&ids, &l, 0.2).unwrap();
        let b = Stratifier::new(7).split(&ids, &l, 0.2).unwrap();
        assert_eq!(a, b);

        let count = |v: &[String], c: DrugClass| v.iter().filter(|id| l[*id] == c).count();
        assert_eq!(count(&a.test, DrugClass::Parp), 2);
        assert_eq!(count(&a.test, DrugClass::Wee1), 1);
        // n = 1 keeps its single member in test
        assert_eq!(count(&a.test, DrugClass::DnaPk), 1);
        assert_eq!(a.train.len() + a.test.len(), ids.len());
        assert!(a.is_test(&a.test[0]));
    }

    #[test]
    fn test_split_keeps_one_train_member() {
        let l = labels(&[(DrugClass::Atr, 2)]);
        let ids: Vec<String> = l.keys().cloned().collect();
        let s = Stratifier::new(1).split(&ids, &l, 0.9).unwrap();
        assert_eq!((s.train.len(), s.test.len()), (1, 1));
    }

    #[test]
    fn test_split_rejects_bad_input() {
        let l = labels(&[(DrugClass::Atr, 2)]);
        let ids: Vec<String> = l.keys().cloned().collect();
        assert!(Stratifier::new(1).split(&ids, &l, 1.0).is_err());
        assert!(Stratifier::new(1).split(&[], &l, 0.2).unwrap_err().is_refusal());
    }
}
