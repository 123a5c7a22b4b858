//! Concrete `ClassifierBackend` (C10): a small gradient-boosted ensemble of
//! regression trees built on `smartcore`, standing in for the source's
//! LightGBM binding. Hyperparameters mirror the source's fixed settings
//! (binary objective via squared-error-on-residuals, learning rate, leaf
//! and depth caps, a configurable round budget).

use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};

use super::classifier::{ClassifierBackend, ClassifierConfig, ModelHandle};

pub struct TreeBoosterHandle {
    trees: Vec<DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>>,
    learning_rate: f64,
    base_score: f64,
}

impl ModelHandle for TreeBoosterHandle {}

pub struct TreeBoosterBackend {
    learning_rate: f64,
    max_rounds: u32,
    max_depth: u16,
}

impl TreeBoosterBackend {
    pub fn new(config: &ClassifierConfig) -> Self {
        TreeBoosterBackend {
            learning_rate: config.learning_rate,
            max_rounds: config.max_boost_rounds,
            max_depth: 50,
        }
    }

    fn to_matrix(x: &[Vec<f64>]) -> DenseMatrix<f64> {
        let rows = x.len();
        let cols = x.first().map(|r| r.len()).unwrap_or(0);
        DenseMatrix::from_2d_vec(&x.to_vec())
            .unwrap_or_else(|_| DenseMatrix::zeros(rows, cols))
    }
}

impl ClassifierBackend for TreeBoosterBackend {
    type Handle = TreeBoosterHandle;

    fn train(&self, x: &[Vec<f64>], y: &[f64]) -> TreeBoosterHandle {
        let base_score = if y.is_empty() {
            0.5
        } else {
            y.iter().sum::<f64>() / y.len() as f64
        };

        let matrix = Self::to_matrix(x);
        let mut predictions = vec![base_score; y.len()];
        let mut trees = Vec::with_capacity(self.max_rounds as usize);

        for _ in 0..self.max_rounds {
            let residuals: Vec<f64> = y
                .iter()
                .zip(predictions.iter())
                .map(|(label, pred)| label - pred)
                .collect();

            let params = DecisionTreeRegressorParameters::default()
                .with_max_depth(self.max_depth)
                .with_min_samples_leaf(1);

            let tree = match DecisionTreeRegressor::fit(&matrix, &residuals, params) {
                Ok(t) => t,
                Err(_) => break,
            };
            let step: Vec<f64> = match tree.predict(&matrix) {
                Ok(p) => p,
                Err(_) => break,
            };
            for (pred, s) in predictions.iter_mut().zip(step.iter()) {
                *pred += self.learning_rate * s;
            }
            trees.push(tree);
        }

        TreeBoosterHandle {
            trees,
            learning_rate: self.learning_rate,
            base_score,
        }
    }

    fn predict(&self, handle: &TreeBoosterHandle, x: &[Vec<f64>]) -> Vec<f64> {
        if x.is_empty() {
            return Vec::new();
        }
        let matrix = Self::to_matrix(x);
        let mut scores = vec![handle.base_score; x.len()];
        for tree in &handle.trees {
            if let Ok(step) = tree.predict(&matrix) {
                for (score, s) in scores.iter_mut().zip(step.iter()) {
                    *score += handle.learning_rate * s;
                }
            }
        }
        scores.iter().map(|s| s.clamp(0.0, 1.0)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClassifierConfig {
        ClassifierConfig {
            features_length: 2,
            learning_rate: 0.3,
            max_boost_rounds: 5,
            one_time_training: false,
            train_budget_bytes: 100_000 * 3 * 8,
        }
    }

    #[test]
    fn predictions_are_clamped_to_unit_interval() {
        let backend = TreeBoosterBackend::new(&config());
        let x = vec![vec![0.0, 0.0], vec![1.0, 1.0], vec![2.0, 2.0]];
        let y = vec![0.0, 1.0, 1.0];
        let handle = backend.train(&x, &y);
        let p = backend.predict(&handle, &x);
        assert_eq!(p.len(), 3);
        for v in p {
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn empty_training_set_yields_neutral_base_score() {
        let backend = TreeBoosterBackend::new(&config());
        let handle = backend.train(&[], &[]);
        assert_eq!(handle.base_score, 0.5);
        assert!(backend.predict(&handle, &[]).is_empty());
    }
}
