use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::matrix::FeatureMatrix;
use super::FeatureStage;
use crate::classifier::ClassifierError;

/// Number of words per message as an `n x 1` matrix.
///
/// Each message is trimmed and split on single spaces; every segment counts,
/// including the empty ones produced by repeated spaces. A blank message
/// therefore counts as one word. Fitted models depend on this exact count.
pub fn count_words<S: AsRef<str>>(messages: &[S]) -> Array2<f64> {
    Array2::from_shape_fn((messages.len(), 1), |(i, _)| word_count(messages[i].as_ref()) as f64)
}

pub(crate) fn word_count(message: &str) -> usize {
    message.trim().split(' ').count()
}

/// Stateless feature stage wrapping [`count_words`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WordCounter;

impl WordCounter {
    pub fn new() -> Self {
        Self
    }
}

impl FeatureStage for WordCounter {
    fn fit(&mut self, _messages: &[&str]) -> Result<(), ClassifierError> {
        Ok(())
    }

    fn transform(&self, messages: &[&str]) -> Result<FeatureMatrix, ClassifierError> {
        Ok(FeatureMatrix::from_dense(count_words(messages).view()))
    }

    fn width(&self) -> Option<usize> {
        Some(1)
    }
}
