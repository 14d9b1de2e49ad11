use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::builder::ClassifierBuilder;
use super::error::ClassifierError;
use super::estimator::Estimator;
use super::forest::RandomForest;
use super::multi_label::MultiLabelClassifier;
use super::ClassifierInfo;
use crate::categories::Categories;
use crate::features::{FeatureMatrix, FeatureStage, FeatureUnion};

/// A fitted message classifier: the feature pipeline plus one binary
/// model per category.
///
/// # Thread Safety
///
/// Prediction takes `&self` and never mutates state, so a classifier can be
/// shared across threads behind an `Arc`.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use disaster_response::{Categories, Classifier, ForestParams};
/// use ndarray::array;
///
/// let categories = Categories::new(vec!["water", "food"])?;
/// let classifier = Classifier::builder()
///     .with_categories(categories)
///     .with_params(ForestParams { n_estimators: 5, ..ForestParams::default() })
///     .fit(
///         &["we need water", "send food", "water and food please", "hello"],
///         array![[1u8, 0], [0, 1], [1, 1], [0, 0]].view(),
///     )?;
///
/// let labels = classifier.predict("is there any water")?;
/// assert_eq!(labels.len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classifier<E = RandomForest> {
    categories: Categories,
    features: FeatureUnion,
    model: MultiLabelClassifier<E>,
    seed: u64,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier<RandomForest> {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> ClassifierBuilder<RandomForest> {
        ClassifierBuilder::new()
    }
}

impl<E: Estimator> Classifier<E> {
    pub(crate) fn from_parts(
        categories: Categories,
        features: FeatureUnion,
        model: MultiLabelClassifier<E>,
        seed: u64,
    ) -> Result<Self, ClassifierError> {
        let classifier = Self {
            categories,
            features,
            model,
            seed,
        };
        classifier.validate()?;
        Ok(classifier)
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> ClassifierInfo {
        ClassifierInfo {
            num_categories: self.categories.len(),
            category_labels: self.categories.names().to_vec(),
            vocabulary_size: self.features.lexical().map_or(0, |v| v.vocabulary_size()),
            feature_width: self.features.width().unwrap_or(0),
            params: format!("{:?}", self.params()),
            seed: self.seed,
        }
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn features(&self) -> &FeatureUnion {
        &self.features
    }

    pub fn model(&self) -> &MultiLabelClassifier<E> {
        &self.model
    }

    /// Hyperparameters every category model was fitted with.
    pub fn params(&self) -> &E::Params {
        self.model.base().params()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Maps messages through the fitted feature pipeline.
    pub fn transform<S: AsRef<str>>(&self, messages: &[S]) -> Result<FeatureMatrix, ClassifierError> {
        let messages: Vec<&str> = messages.iter().map(AsRef::as_ref).collect();
        self.features.transform(&messages)
    }

    /// Predicts a `messages.len() x categories.len()` matrix of 0/1 labels.
    /// Row `i` belongs to `messages[i]`; column `j` to category `j`.
    pub fn predict_batch<S: AsRef<str>>(&self, messages: &[S]) -> Result<Array2<u8>, ClassifierError> {
        let x = self.transform(messages)?;
        let predictions = self.model.predict(&x)?;
        if predictions.ncols() != self.categories.len() {
            return Err(ClassifierError::configuration(format!(
                "Model produced {} label columns for {} categories",
                predictions.ncols(),
                self.categories.len()
            )));
        }
        Ok(predictions)
    }

    /// Predicts the label of every category for one message, in category order.
    ///
    /// Empty and punctuation-only messages are valid input; they are scored
    /// on the word-count column alone.
    pub fn predict_ordered(&self, message: &str) -> Result<Vec<(String, u8)>, ClassifierError> {
        let predictions = self.predict_batch(&[message])?;
        Ok(self
            .categories
            .iter()
            .zip(predictions.row(0).iter())
            .map(|(name, &label)| (name.to_string(), label))
            .collect())
    }

    /// Predicts the label of every category for one message.
    pub fn predict(&self, message: &str) -> Result<HashMap<String, u8>, ClassifierError> {
        Ok(self.predict_ordered(message)?.into_iter().collect())
    }

    /// Checks that the pipeline widths and category count line up.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        self.features.validate()?;
        let width = self
            .features
            .width()
            .ok_or_else(|| ClassifierError::configuration("Feature pipeline is not fitted"))?;
        self.model.validate()?;
        if self.model.n_features() != Some(width) {
            return Err(ClassifierError::configuration(format!(
                "Feature pipeline produces {} columns but model expects {:?}",
                width,
                self.model.n_features()
            )));
        }
        if self.model.n_labels() != self.categories.len() {
            return Err(ClassifierError::configuration(format!(
                "Model has {} label columns for {} categories",
                self.model.n_labels(),
                self.categories.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ForestParams;
    use ndarray::array;

    fn small_classifier() -> Classifier {
        Classifier::builder()
            .with_categories(Categories::new(vec!["water", "food"]).unwrap())
            .with_params(ForestParams {
                n_estimators: 5,
                bootstrap: false,
                max_features: crate::classifier::MaxFeatures::All,
                ..ForestParams::default()
            })
            .fit(
                &["water", "we need water", "send food", "hello there", "food and shelter today"],
                array![[1u8, 0], [1, 0], [0, 1], [0, 0], [0, 1]].view(),
            )
            .unwrap()
    }

    #[test]
    fn test_class_info() {
        let classifier = small_classifier();
        let info = classifier.info();
        assert_eq!(info.num_categories, 2);
        assert_eq!(info.category_labels, vec!["water", "food"]);
        assert_eq!(info.feature_width, info.vocabulary_size + 1);
    }

    #[test]
    fn test_predict_returns_every_category() {
        let classifier = small_classifier();
        let labels = classifier.predict("water please").unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels["water"], 1);
        assert_eq!(labels["food"], 0);
        assert!(classifier.predict("").is_ok());
    }

    #[test]
    fn test_batch_shape() {
        let classifier = small_classifier();
        let predictions = classifier.predict_batch(&["water", "food", "", "?!"]).unwrap();
        assert_eq!(predictions.dim(), (4, 2));
        assert!(predictions.iter().all(|&v| v <= 1));
    }
}
