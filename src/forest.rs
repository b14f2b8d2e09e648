//! Bagged ensemble of Gini decision trees, fitted with `linfa-ensemble`.
//!
//! Only the fitted trees are kept; they serialize through `linfa-trees`'
//! serde support so the forest can sit inside the persisted model envelope.
//! The positive-class probability is the share of trees voting positive.

use linfa::prelude::*;
use linfa_ensemble::{EnsembleLearner, EnsembleLearnerParams};
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{arr2, Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ScoringError;

#[derive(Debug, Clone, Copy)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows every tree until its leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

#[derive(Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<DecisionTree<f64, bool>>,
}

impl fmt::Debug for RandomForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomForest")
            .field("n_features", &self.n_features)
            .field("n_trees", &self.trees.len())
            .finish()
    }
}

impl RandomForest {
    /// Fit `params.n_trees` trees, each on a full-size bootstrap resample of
    /// `(x, y)`. `rng` drives the resampling, so a seeded generator gives a
    /// reproducible forest.
    pub fn fit<const D: usize, R: Rng + Clone>(
        x: &[[f64; D]],
        y: &[bool],
        params: &ForestParams,
        rng: R,
    ) -> Result<Self, String> {
        if x.is_empty() {
            return Err("training set is empty".into());
        }
        if x.len() != y.len() {
            return Err(format!("{} rows but {} labels", x.len(), y.len()));
        }
        if params.n_trees == 0 {
            return Err("forest needs at least one tree".into());
        }
        if D == 0 {
            return Err("rows have no features".into());
        }

        let records = Array2::from_shape_vec((x.len(), D), x.iter().flatten().copied().collect())
            .map_err(|e| e.to_string())?;
        let dataset = Dataset::new(records, Array1::from(y.to_vec()));

        let tree_params = DecisionTree::<f64, bool>::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(params.max_depth)
            .min_weight_split(params.min_samples_split.max(2) as f32);

        let fitted: Result<EnsembleLearner<DecisionTree<f64, bool>>, linfa::Error> =
            EnsembleLearnerParams::new_fixed_rng(tree_params, rng)
                .ensemble_size(params.n_trees)
                .bootstrap_proportion(1.0)
                .fit(&dataset);
        let learner = fitted.map_err(|e| e.to_string())?;

        Ok(Self {
            n_features: D,
            trees: learner.models,
        })
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Share of trees predicting the positive class for `row`.
    pub fn predict_proba(&self, row: &[f64; 4]) -> Result<f64, ScoringError> {
        if self.trees.is_empty() {
            return Err(ScoringError::EmptyForest);
        }
        if self.n_features != row.len() {
            return Err(ScoringError::ShapeMismatch {
                expected: self.n_features,
                got: row.len(),
            });
        }

        let x = arr2(&[*row]);
        let positive = self
            .trees
            .iter()
            .filter(|tree| {
                let vote: Array1<bool> = tree.predict(&x);
                vote[0]
            })
            .count();
        Ok(positive as f64 / self.trees.len() as f64)
    }

    /// Structural check for forests read from untrusted storage.
    pub fn validate(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".into());
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if let Some(f) = tree.features().into_iter().find(|&f| f >= self.n_features) {
                return Err(format!("tree {} splits on feature {}", t, f));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(n_trees: usize) -> ForestParams {
        ForestParams { n_trees, max_depth: None, min_samples_split: 2 }
    }

    fn threshold_set() -> (Vec<[f64; 4]>, Vec<bool>) {
        let x: Vec<[f64; 4]> = (0..200).map(|i| [i as f64, (i % 7) as f64, 0.0, 1.0]).collect();
        let y: Vec<bool> = (0..200).map(|i| i >= 120).collect();
        (x, y)
    }

    #[test]
    fn test_single_threshold_is_learned() {
        let (x, y) = threshold_set();
        let forest = RandomForest::fit(&x, &y, &params(15), StdRng::seed_from_u64(7)).unwrap();

        assert_eq!(forest.n_trees(), 15);
        assert!(forest.predict_proba(&[10.0, 3.0, 0.0, 1.0]).unwrap() < 0.2);
        assert!(forest.predict_proba(&[190.0, 3.0, 0.0, 1.0]).unwrap() > 0.8);
        forest.validate().unwrap();
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = threshold_set();
        let a = RandomForest::fit(&x, &y, &params(5), StdRng::seed_from_u64(42)).unwrap();
        let b = RandomForest::fit(&x, &y, &params(5), StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let empty: Vec<[f64; 2]> = vec![];
        assert!(RandomForest::fit(&empty, &[], &params(3), StdRng::seed_from_u64(0)).is_err());
        assert!(RandomForest::fit(&[[1.0]], &[true, false], &params(3), StdRng::seed_from_u64(0)).is_err());
        assert!(RandomForest::fit(&[[1.0]], &[true], &params(0), StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_forest() {
        let forest = RandomForest { n_features: 4, trees: vec![] };
        assert!(forest.validate().is_err());
        assert_eq!(forest.predict_proba(&[0.0; 4]), Err(ScoringError::EmptyForest));
    }

    #[test]
    fn test_wrong_width_is_scoring_error() {
        let (x, y) = threshold_set();
        let x2: Vec<[f64; 2]> = x.iter().map(|r| [r[0], r[1]]).collect();
        let forest = RandomForest::fit(&x2, &y, &params(3), StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(
            forest.predict_proba(&[1.0, 2.0, 3.0, 4.0]),
            Err(ScoringError::ShapeMismatch { expected: 2, got: 4 })
        );
    }

    #[test]
    fn test_forest_survives_json() {
        let (x, y) = threshold_set();
        let forest = RandomForest::fit(&x, &y, &params(4), StdRng::seed_from_u64(3)).unwrap();
        let text = serde_json::to_string(&forest).unwrap();
        let back: RandomForest = serde_json::from_str(&text).unwrap();
        back.validate().unwrap();
        for row in [[5.0, 1.0, 0.0, 1.0], [150.0, 4.0, 0.0, 1.0]] {
            assert_eq!(forest.predict_proba(&row), back.predict_proba(&row));
        }
    }
}
