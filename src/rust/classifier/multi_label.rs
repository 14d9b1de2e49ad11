use log::{debug, warn};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::estimator::Estimator;
use crate::features::FeatureMatrix;
use crate::utils::derive_seed;

/// One independent binary estimator per label column, all cloned from the
/// same unfitted base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiLabelClassifier<E> {
    base: E,
    estimators: Vec<E>,
    n_features: Option<usize>,
}

impl<E: Estimator> MultiLabelClassifier<E> {
    pub fn new(base: E) -> Self {
        Self {
            base,
            estimators: Vec::new(),
            n_features: None,
        }
    }

    pub fn base(&self) -> &E {
        &self.base
    }

    /// Fitted estimators in label column order.
    pub fn estimators(&self) -> &[E] {
        &self.estimators
    }

    pub fn n_labels(&self) -> usize {
        self.estimators.len()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    pub fn is_fitted(&self) -> bool {
        self.n_features.is_some()
    }

    /// Fits column `i` of `y` with seed `derive_seed(seed, i)`, so each
    /// column's model is independent of thread scheduling.
    pub fn fit(&mut self, x: &FeatureMatrix, y: ArrayView2<'_, u8>, seed: u64) -> Result<(), ClassifierError> {
        self.estimators.clear();
        self.n_features = None;
        if y.nrows() != x.n_rows() {
            return Err(ClassifierError::configuration(format!(
                "Feature matrix has {} rows but label matrix has {}",
                x.n_rows(),
                y.nrows()
            )));
        }
        if y.ncols() == 0 {
            return Err(ClassifierError::configuration("Label matrix has no columns"));
        }

        let estimators = (0..y.ncols())
            .into_par_iter()
            .map(|column| {
                let mut estimator = self.base.clone();
                estimator
                    .fit(x, y.column(column), derive_seed(seed, column as u64))
                    .map_err(|e| {
                        warn!("Fitting label column {} failed: {}", column, e);
                        match e {
                            ClassifierError::FitError(msg) => {
                                ClassifierError::FitError(format!("label column {}: {}", column, msg))
                            }
                            other => other,
                        }
                    })?;
                Ok(estimator)
            })
            .collect::<Result<Vec<E>, ClassifierError>>()?;

        debug!("Fitted {} label columns on {} features", estimators.len(), x.n_cols());
        self.estimators = estimators;
        self.n_features = Some(x.n_cols());
        Ok(())
    }

    /// Predicts an `n_rows x n_labels` 0/1 matrix.
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Array2<u8>, ClassifierError> {
        let n_features = self
            .n_features
            .ok_or_else(|| ClassifierError::PredictionError("Multi-label classifier is not fitted".into()))?;
        if x.n_cols() != n_features {
            return Err(ClassifierError::configuration(format!(
                "Model was fitted on {} features but input has {}",
                n_features,
                x.n_cols()
            )));
        }
        let columns = self
            .estimators
            .par_iter()
            .map(|estimator| estimator.predict(x))
            .collect::<Result<Vec<_>, ClassifierError>>()?;

        let mut predictions = Array2::zeros((x.n_rows(), columns.len()));
        for (j, column) in columns.iter().enumerate() {
            predictions.column_mut(j).assign(column);
        }
        Ok(predictions)
    }

    /// Checks every label column holds a fitted, well-formed estimator that
    /// reads the recorded feature width.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        let n_features = match self.n_features {
            Some(n) if !self.estimators.is_empty() => n,
            _ => return Err(ClassifierError::configuration("Multi-label classifier is not fitted")),
        };
        for (column, estimator) in self.estimators.iter().enumerate() {
            if !estimator.is_fitted() {
                return Err(ClassifierError::configuration(format!(
                    "Estimator for label column {} is not fitted",
                    column
                )));
            }
            estimator.validate(n_features).map_err(|e| {
                ClassifierError::configuration(format!("Estimator for label column {} is invalid: {}", column, e))
            })?;
        }
        Ok(())
    }
}
