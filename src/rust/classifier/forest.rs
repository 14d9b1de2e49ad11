use log::debug;
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::estimator::{check_fit_input, Estimator};
use super::tree::{Criterion, MaxFeatures, TreeModel, TreeParams};
use crate::features::FeatureMatrix;

/// Hyperparameters of a [`RandomForest`]. One value of this type is one
/// candidate in a grid search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub criterion: Criterion,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Fit each tree on a bootstrap resample instead of every row.
    pub bootstrap: bool,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
        }
    }
}

impl ForestParams {
    pub fn tree_params(&self) -> TreeParams {
        TreeParams {
            criterion: self.criterion,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: self.max_features,
        }
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.n_estimators == 0 {
            return Err(ClassifierError::configuration("n_estimators must be at least 1"));
        }
        self.tree_params().validate()
    }
}

/// Bagged ensemble of decision trees. A row is predicted positive when the
/// mean positive probability over all trees exceeds one half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<TreeModel>,
}

impl RandomForest {
    pub fn new() -> Self {
        Self::with_params(ForestParams::default())
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.trees.first().map(TreeModel::n_features)
    }

    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Array1<f64>, ClassifierError> {
        let n_features = self
            .n_features()
            .ok_or_else(|| ClassifierError::PredictionError("Random forest is not fitted".into()))?;
        if x.n_cols() != n_features {
            return Err(ClassifierError::configuration(format!(
                "Random forest expects {} features, got {}",
                n_features,
                x.n_cols()
            )));
        }
        let n_trees = self.trees.len() as f64;
        let proba: Vec<f64> = (0..x.n_rows())
            .into_par_iter()
            .map(|row| self.trees.iter().map(|tree| tree.proba(x, row)).sum::<f64>() / n_trees)
            .collect();
        Ok(Array1::from(proba))
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new()
    }
}

fn bootstrap_weights(n: usize, rng: &mut StdRng) -> Vec<f64> {
    let mut weights = vec![0.0; n];
    for _ in 0..n {
        weights[rng.random_range(0..n)] += 1.0;
    }
    weights
}

impl Estimator for RandomForest {
    type Params = ForestParams;

    fn with_params(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
        }
    }

    fn params(&self) -> &ForestParams {
        &self.params
    }

    fn fit(&mut self, x: &FeatureMatrix, y: ArrayView1<'_, u8>, seed: u64) -> Result<(), ClassifierError> {
        self.trees.clear();
        self.params.validate()?;
        check_fit_input(x, y)?;

        let mut rng = StdRng::seed_from_u64(seed);
        let tree_seeds: Vec<u64> = (0..self.params.n_estimators).map(|_| rng.random()).collect();
        let tree_params = self.params.tree_params();
        let n = x.n_rows();

        let trees = tree_seeds
            .into_par_iter()
            .map(|tree_seed| {
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let weights = if self.params.bootstrap {
                    bootstrap_weights(n, &mut rng)
                } else {
                    vec![1.0; n]
                };
                TreeModel::grow(x, y.view(), &weights, &tree_params, &mut rng)
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Fitted {} trees, deepest has depth {}",
            trees.len(),
            trees.iter().map(TreeModel::depth).max().unwrap_or(0)
        );
        self.trees = trees;
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Array1<u8>, ClassifierError> {
        Ok(self.predict_proba(x)?.mapv(|p| u8::from(p > 0.5)))
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn validate(&self, n_features: usize) -> Result<(), ClassifierError> {
        if self.trees.is_empty() {
            return Err(ClassifierError::configuration("Random forest has no trees"));
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features).map_err(|e| match e {
                ClassifierError::ConfigurationError(msg) => {
                    ClassifierError::configuration(format!("tree {}: {}", index, msg))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    fn toy() -> (FeatureMatrix, Array1<u8>) {
        let mut dense = Array2::<f64>::zeros((40, 3));
        let mut y = Array1::<u8>::zeros(40);
        for i in 0..40 {
            dense[[i, 1]] = (i % 7) as f64;
            if i % 2 == 0 {
                dense[[i, 0]] = 1.0;
                y[i] = 1;
            } else {
                dense[[i, 2]] = 0.5;
            }
        }
        (FeatureMatrix::from_dense(dense.view()), y)
    }

    #[test]
    fn test_learns_separable_column() {
        let (x, y) = toy();
        let mut forest = RandomForest::with_params(ForestParams {
            n_estimators: 15,
            ..ForestParams::default()
        });
        forest.fit(&x, y.view(), 42).unwrap();
        assert_eq!(forest.n_trees(), 15);
        assert_eq!(forest.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = toy();
        let params = ForestParams {
            n_estimators: 8,
            ..ForestParams::default()
        };
        let mut a = RandomForest::with_params(params.clone());
        let mut b = RandomForest::with_params(params);
        a.fit(&x, y.view(), 9).unwrap();
        b.fit(&x, y.view(), 9).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_zero_estimators() {
        let (x, y) = toy();
        let mut forest = RandomForest::with_params(ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        });
        assert!(matches!(
            forest.fit(&x, y.view(), 0),
            Err(ClassifierError::ConfigurationError(_))
        ));
        assert!(!forest.is_fitted());
    }

    #[test]
    fn test_probabilities_are_tree_averages() {
        let x = FeatureMatrix::from_dense(array![[0.0], [1.0]].view());
        let mut forest = RandomForest::with_params(ForestParams {
            n_estimators: 3,
            bootstrap: false,
            ..ForestParams::default()
        });
        forest.fit(&x, array![0u8, 1].view(), 5).unwrap();
        assert_eq!(forest.predict_proba(&x).unwrap(), array![0.0, 1.0]);
    }

    #[test]
    fn test_predict_requires_fit() {
        let (x, _) = toy();
        assert!(RandomForest::new().predict(&x).is_err());
    }
}
