use ndarray::{Array1, ArrayView1};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

use super::error::ClassifierError;
use crate::features::FeatureMatrix;

/// A single-output binary learner: fits one 0/1 label column against a
/// feature matrix and predicts one 0/1 value per row.
///
/// Implementations are cloned once per category by
/// [`MultiLabelClassifier`](super::MultiLabelClassifier); each clone is fitted
/// on its own column with its own seed.
pub trait Estimator: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned {
    /// Hyperparameters, one point of a search grid.
    type Params: Clone + fmt::Debug + PartialEq + Send + Sync;

    /// Creates an unfitted estimator with the given hyperparameters.
    fn with_params(params: Self::Params) -> Self;

    fn params(&self) -> &Self::Params;

    /// Fits on `x` against the binary column `y`. Re-fitting discards any
    /// previous state. The same seed and data always yield the same model.
    fn fit(
        &mut self,
        x: &FeatureMatrix,
        y: ArrayView1<'_, u8>,
        seed: u64,
    ) -> Result<(), ClassifierError>;

    fn predict(&self, x: &FeatureMatrix) -> Result<Array1<u8>, ClassifierError>;

    fn is_fitted(&self) -> bool;

    /// Checks a fitted (possibly deserialized) estimator is structurally
    /// sound and reads exactly `n_features` columns.
    fn validate(&self, n_features: usize) -> Result<(), ClassifierError>;
}

/// Checks shared by every estimator's `fit`.
pub(crate) fn check_fit_input(x: &FeatureMatrix, y: ArrayView1<'_, u8>) -> Result<(), ClassifierError> {
    if x.n_rows() == 0 {
        return Err(ClassifierError::fit("Cannot fit on zero samples"));
    }
    if x.n_rows() != y.len() {
        return Err(ClassifierError::fit(format!(
            "Feature matrix has {} rows but label column has {}",
            x.n_rows(),
            y.len()
        )));
    }
    if let Some(bad) = y.iter().find(|&&v| v > 1) {
        return Err(ClassifierError::data(format!("Label value {} is not binary", bad)));
    }
    Ok(())
}
