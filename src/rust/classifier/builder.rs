use log::info;
use ndarray::ArrayView2;
use std::sync::Arc;

use super::classifier::Classifier;
use super::error::ClassifierError;
use super::estimator::Estimator;
use super::forest::RandomForest;
use super::multi_label::MultiLabelClassifier;
use crate::categories::Categories;
use crate::features::{FeatureMatrix, FeatureStage, FeatureUnion, VectorizerConfig};
use crate::text::{LemmaDictionary, Tokenizer};

/// A builder for fitting a [`Classifier`] with a fluent interface.
///
/// Defaults: the 36 disaster-response categories, the built-in lemma
/// dictionary, default vectorizer settings, a default random forest and
/// seed 42.
#[derive(Debug, Clone)]
pub struct ClassifierBuilder<E = RandomForest> {
    categories: Categories,
    tokenizer: Tokenizer,
    vectorizer: VectorizerConfig,
    estimator: E,
    seed: u64,
}

impl ClassifierBuilder<RandomForest> {
    /// Creates a builder with default configuration
    ///
    /// # Example
    /// ```
    /// use disaster_response::ClassifierBuilder;
    ///
    /// let builder = ClassifierBuilder::new().with_seed(7);
    /// assert_eq!(builder.seed(), 7);
    /// ```
    pub fn new() -> Self {
        Self {
            categories: Categories::default(),
            tokenizer: Tokenizer::default(),
            vectorizer: VectorizerConfig::default(),
            estimator: RandomForest::default(),
            seed: 42,
        }
    }
}

impl Default for ClassifierBuilder<RandomForest> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Estimator> ClassifierBuilder<E> {
    pub fn with_categories(mut self, categories: Categories) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_tokenizer(mut self, tokenizer: Tokenizer) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Uses `dictionary` for lemmatization instead of the built-in one.
    pub fn with_dictionary(self, dictionary: Arc<LemmaDictionary>) -> Self {
        self.with_tokenizer(Tokenizer::new(dictionary))
    }

    pub fn with_vectorizer_config(mut self, config: VectorizerConfig) -> Self {
        self.vectorizer = config;
        self
    }

    /// Replaces the per-category estimator, possibly with another type.
    pub fn with_estimator<F: Estimator>(self, estimator: F) -> ClassifierBuilder<F> {
        ClassifierBuilder {
            categories: self.categories,
            tokenizer: self.tokenizer,
            vectorizer: self.vectorizer,
            estimator,
            seed: self.seed,
        }
    }

    /// Replaces the estimator's hyperparameters.
    pub fn with_params(mut self, params: E::Params) -> Self {
        self.estimator = E::with_params(params);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// A fresh, unfitted copy of the feature pipeline.
    pub fn feature_union(&self) -> FeatureUnion {
        FeatureUnion::standard(self.tokenizer.clone(), self.vectorizer.clone())
    }

    /// Fits the feature pipeline and one estimator per category.
    ///
    /// `labels` must have one row per message and one column per category.
    pub fn fit<S: AsRef<str>>(
        &self,
        messages: &[S],
        labels: ArrayView2<'_, u8>,
    ) -> Result<Classifier<E>, ClassifierError> {
        self.vectorizer.validate()?;
        validate_training_data(messages.len(), labels, &self.categories)?;

        let messages: Vec<&str> = messages.iter().map(AsRef::as_ref).collect();
        let mut features = self.feature_union();
        let x = features.fit_transform(&messages)?;
        info!(
            "Fitting {} category models on {} messages x {} features",
            self.categories.len(),
            x.n_rows(),
            x.n_cols()
        );
        self.fit_with_features(features, &x, labels)
    }

    /// Fits the estimators on an already transformed matrix.
    pub(crate) fn fit_with_features(
        &self,
        features: FeatureUnion,
        x: &FeatureMatrix,
        labels: ArrayView2<'_, u8>,
    ) -> Result<Classifier<E>, ClassifierError> {
        let mut model = MultiLabelClassifier::new(self.estimator.clone());
        model.fit(x, labels, self.seed)?;
        Classifier::from_parts(self.categories.clone(), features, model, self.seed)
    }
}

/// Checks the training batch lines up with the category list.
pub(crate) fn validate_training_data(
    n_messages: usize,
    labels: ArrayView2<'_, u8>,
    categories: &Categories,
) -> Result<(), ClassifierError> {
    if n_messages == 0 {
        return Err(ClassifierError::validation("Training data has no messages"));
    }
    if labels.nrows() != n_messages {
        return Err(ClassifierError::validation(format!(
            "Got {} messages but {} label rows",
            n_messages,
            labels.nrows()
        )));
    }
    if labels.ncols() != categories.len() {
        return Err(ClassifierError::validation(format!(
            "Label matrix has {} columns for {} categories",
            labels.ncols(),
            categories.len()
        )));
    }
    if let Some(((row, column), value)) = labels.indexed_iter().find(|&(_, &v)| v > 1) {
        return Err(ClassifierError::data(format!(
            "Label for category '{}' in row {} is {}, expected 0 or 1",
            categories.name(column).unwrap_or("?"),
            row,
            value
        )));
    }
    Ok(())
}
