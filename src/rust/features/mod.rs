//! Feature extraction: sparse matrix type, extractors and their composition.

mod matrix;
mod tfidf;
mod union;
pub(crate) mod word_count;

pub use matrix::FeatureMatrix;
pub use tfidf::{TfidfVectorizer, VectorizerConfig};
pub use union::{FeatureStep, FeatureUnion};
pub use word_count::{count_words, WordCounter};

use crate::classifier::ClassifierError;

/// A pipeline stage that learns state from a training batch and maps
/// message batches to feature rows, one row per message, in input order.
pub trait FeatureStage {
    /// Learns the stage's state from the training messages.
    fn fit(&mut self, messages: &[&str]) -> Result<(), ClassifierError>;

    /// Maps messages to feature rows using the fitted state.
    fn transform(&self, messages: &[&str]) -> Result<FeatureMatrix, ClassifierError>;

    /// Number of output columns, known once fitted.
    fn width(&self) -> Option<usize>;

    fn fit_transform(&mut self, messages: &[&str]) -> Result<FeatureMatrix, ClassifierError> {
        self.fit(messages)?;
        self.transform(messages)
    }
}
