use log::debug;
use serde::{Deserialize, Serialize};

use super::matrix::FeatureMatrix;
use super::tfidf::{TfidfVectorizer, VectorizerConfig};
use super::word_count::WordCounter;
use super::FeatureStage;
use crate::classifier::ClassifierError;
use crate::text::Tokenizer;

/// One branch of a [`FeatureUnion`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FeatureStep {
    Lexical(TfidfVectorizer),
    WordCount(WordCounter),
}

impl FeatureStage for FeatureStep {
    fn fit(&mut self, messages: &[&str]) -> Result<(), ClassifierError> {
        match self {
            Self::Lexical(stage) => stage.fit(messages),
            Self::WordCount(stage) => stage.fit(messages),
        }
    }

    fn transform(&self, messages: &[&str]) -> Result<FeatureMatrix, ClassifierError> {
        match self {
            Self::Lexical(stage) => stage.transform(messages),
            Self::WordCount(stage) => stage.transform(messages),
        }
    }

    fn width(&self) -> Option<usize> {
        match self {
            Self::Lexical(stage) => stage.width(),
            Self::WordCount(stage) => stage.width(),
        }
    }
}

/// Ordered list of named feature steps whose outputs are concatenated
/// column-wise, in list order, into one matrix per batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureUnion {
    steps: Vec<(String, FeatureStep)>,
}

impl FeatureUnion {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    /// The message pipeline: TF-IDF block followed by the word-count column.
    pub fn standard(tokenizer: Tokenizer, config: VectorizerConfig) -> Self {
        Self::new()
            .with_step("lexical", FeatureStep::Lexical(TfidfVectorizer::new(tokenizer, config)))
            .with_step("word_count", FeatureStep::WordCount(WordCounter::new()))
    }

    pub fn with_step(mut self, name: impl Into<String>, step: FeatureStep) -> Self {
        self.steps.push((name.into(), step));
        self
    }

    pub fn steps(&self) -> &[(String, FeatureStep)] {
        &self.steps
    }

    /// The first lexical step, if any.
    pub fn lexical(&self) -> Option<&TfidfVectorizer> {
        self.steps.iter().find_map(|(_, step)| match step {
            FeatureStep::Lexical(vectorizer) => Some(vectorizer),
            FeatureStep::WordCount(_) => None,
        })
    }

    /// Checks every fitted step is internally consistent.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.steps.is_empty() {
            return Err(ClassifierError::configuration("Feature union has no steps"));
        }
        for (name, step) in &self.steps {
            if let FeatureStep::Lexical(vectorizer) = step {
                vectorizer.validate().map_err(|e| {
                    ClassifierError::configuration(format!("Step '{}': {}", name, e))
                })?;
            }
        }
        Ok(())
    }
}

impl Default for FeatureUnion {
    fn default() -> Self {
        Self::standard(Tokenizer::default(), VectorizerConfig::default())
    }
}

impl FeatureStage for FeatureUnion {
    fn fit(&mut self, messages: &[&str]) -> Result<(), ClassifierError> {
        if self.steps.is_empty() {
            return Err(ClassifierError::configuration("Feature union has no steps"));
        }
        for (name, step) in self.steps.iter_mut() {
            debug!("Fitting feature step '{}'", name);
            step.fit(messages)?;
        }
        Ok(())
    }

    fn transform(&self, messages: &[&str]) -> Result<FeatureMatrix, ClassifierError> {
        let mut blocks = self.steps.iter().map(|(name, step)| {
            let block = step.transform(messages)?;
            if block.n_rows() != messages.len() {
                return Err(ClassifierError::configuration(format!(
                    "Feature step '{}' produced {} rows for {} messages",
                    name,
                    block.n_rows(),
                    messages.len()
                )));
            }
            Ok(block)
        });
        let first = blocks
            .next()
            .ok_or_else(|| ClassifierError::configuration("Feature union has no steps"))??;
        blocks.try_fold(first, |acc, block| acc.hstack(&block?))
    }

    fn width(&self) -> Option<usize> {
        if self.steps.is_empty() {
            return None;
        }
        self.steps.iter().map(|(_, step)| step.width()).sum()
    }
}
