use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::lemmatizer::LemmaDictionary;

lazy_static! {
    static ref NON_ALPHANUMERIC: Regex =
        Regex::new(r"[^A-Za-z0-9]").expect("constant pattern compiles");
}

/// Converts raw messages into normalized, lemmatized token sequences.
///
/// The lemma dictionary is injected at construction and travels with the
/// fitted pipeline, so inference tokenizes exactly as training did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tokenizer {
    dictionary: Arc<LemmaDictionary>,
}

impl Tokenizer {
    pub fn new(dictionary: Arc<LemmaDictionary>) -> Self {
        Self { dictionary }
    }

    pub fn dictionary(&self) -> &LemmaDictionary {
        &self.dictionary
    }

    /// Tokenizes a message:
    /// 1. every character outside `[A-Za-z0-9]` becomes a space
    /// 2. lower-case
    /// 3. split on whitespace
    /// 4. lemmatize each token
    /// 5. strip surrounding whitespace
    pub fn tokenize(&self, message: &str) -> Vec<String> {
        let normalized = NON_ALPHANUMERIC.replace_all(message, " ").to_lowercase();
        normalized
            .split_whitespace()
            .map(|token| self.dictionary.lemmatize(token).trim().to_string())
            .collect()
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(LemmaDictionary::builtin())
    }
}
