use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::matrix::FeatureMatrix;
use super::FeatureStage;
use crate::classifier::ClassifierError;
use crate::text::Tokenizer;
use crate::utils::l2_normalize;

/// Vocabulary and weighting options for [`TfidfVectorizer`].
///
/// The defaults keep every term seen in the training corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerConfig {
    /// Keep only the `n` terms with the highest corpus frequency.
    pub max_features: Option<usize>,
    /// Ignore terms that appear in fewer documents than this.
    pub min_df: usize,
    /// Ignore terms that appear in more than this fraction of documents.
    pub max_df: f64,
    /// Add one to document frequencies, as if an extra document contained every term.
    pub smooth_idf: bool,
    /// Replace term frequency `tf` with `1 + ln(tf)`.
    pub sublinear_tf: bool,
    /// Scale each row to unit L2 norm.
    pub normalize: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: None,
            min_df: 1,
            max_df: 1.0,
            smooth_idf: true,
            sublinear_tf: false,
            normalize: true,
        }
    }
}

impl VectorizerConfig {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.max_features == Some(0) {
            return Err(ClassifierError::configuration("max_features must be positive"));
        }
        if self.min_df == 0 {
            return Err(ClassifierError::configuration("min_df must be at least 1"));
        }
        if !(self.max_df > 0.0 && self.max_df <= 1.0) {
            return Err(ClassifierError::configuration(format!(
                "max_df must be in (0, 1], got {}",
                self.max_df
            )));
        }
        Ok(())
    }
}

/// Term-frequency x inverse-document-frequency features over a vocabulary
/// frozen at fit time. Tokens outside the vocabulary contribute nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    config: VectorizerConfig,
    tokenizer: Tokenizer,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(tokenizer: Tokenizer, config: VectorizerConfig) -> Self {
        Self {
            config,
            tokenizer,
            vocabulary: BTreeMap::new(),
            idf: Vec::new(),
        }
    }

    pub fn config(&self) -> &VectorizerConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    /// Checks that vocabulary indices and idf weights describe the same columns.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.vocabulary.len() != self.idf.len() {
            return Err(ClassifierError::configuration(format!(
                "Vocabulary has {} terms but {} idf weights",
                self.vocabulary.len(),
                self.idf.len()
            )));
        }
        let mut seen = vec![false; self.idf.len()];
        for (term, &idx) in &self.vocabulary {
            if idx >= seen.len() || seen[idx] {
                return Err(ClassifierError::configuration(format!(
                    "Vocabulary term '{}' has invalid column {}",
                    term, idx
                )));
            }
            seen[idx] = true;
        }
        Ok(())
    }

    fn term_counts(&self, message: &str) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for token in self.tokenizer.tokenize(message) {
            if !token.is_empty() {
                *counts.entry(token).or_insert(0) += 1;
            }
        }
        counts
    }

    fn weight(&self, count: usize, column: usize) -> f64 {
        let tf = count as f64;
        let tf = if self.config.sublinear_tf { 1.0 + tf.ln() } else { tf };
        tf * self.idf[column]
    }
}

impl FeatureStage for TfidfVectorizer {
    fn fit(&mut self, messages: &[&str]) -> Result<(), ClassifierError> {
        self.config.validate()?;
        if messages.is_empty() {
            return Err(ClassifierError::fit("Cannot fit vectorizer on an empty corpus"));
        }

        let n_docs = messages.len();
        let per_doc: Vec<HashMap<String, usize>> =
            messages.par_iter().map(|m| self.term_counts(m)).collect();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        let mut term_freq: HashMap<&str, usize> = HashMap::new();
        for counts in &per_doc {
            for (term, &count) in counts {
                *doc_freq.entry(term.as_str()).or_insert(0) += 1;
                *term_freq.entry(term.as_str()).or_insert(0) += count;
            }
        }

        let max_doc_count = self.config.max_df * n_docs as f64;
        let mut kept: Vec<&str> = doc_freq
            .iter()
            .filter(|&(_, &df)| df >= self.config.min_df && df as f64 <= max_doc_count)
            .map(|(&term, _)| term)
            .collect();

        if let Some(limit) = self.config.max_features {
            kept.sort_by(|a, b| term_freq[b].cmp(&term_freq[a]).then_with(|| a.cmp(b)));
            kept.truncate(limit);
        }
        kept.sort_unstable();

        if kept.is_empty() {
            return Err(ClassifierError::fit(
                "Empty vocabulary: no term satisfies the document frequency limits",
            ));
        }
        debug!(
            "Vocabulary pruning kept {} of {} terms",
            kept.len(),
            doc_freq.len()
        );

        let n = n_docs as f64;
        self.idf = kept
            .iter()
            .map(|term| {
                let df = doc_freq[term] as f64;
                if self.config.smooth_idf {
                    ((1.0 + n) / (1.0 + df)).ln() + 1.0
                } else {
                    (n / df).ln() + 1.0
                }
            })
            .collect();
        self.vocabulary = kept
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term.to_string(), idx))
            .collect();

        info!(
            "Fitted vocabulary of {} terms over {} messages",
            self.vocabulary.len(),
            n_docs
        );
        Ok(())
    }

    fn transform(&self, messages: &[&str]) -> Result<FeatureMatrix, ClassifierError> {
        if !self.is_fitted() {
            return Err(ClassifierError::configuration(
                "Vectorizer must be fitted before transform",
            ));
        }
        let rows: Vec<Vec<(usize, f64)>> = messages
            .par_iter()
            .map(|message| {
                let mut entries: Vec<(usize, f64)> = self
                    .term_counts(message)
                    .into_iter()
                    .filter_map(|(term, count)| {
                        self.vocabulary
                            .get(&term)
                            .map(|&column| (column, self.weight(count, column)))
                    })
                    .collect();
                entries.sort_by_key(|&(column, _)| column);
                if self.config.normalize {
                    let mut values: Vec<f64> = entries.iter().map(|&(_, v)| v).collect();
                    l2_normalize(&mut values);
                    for (entry, v) in entries.iter_mut().zip(values) {
                        entry.1 = v;
                    }
                }
                entries
            })
            .collect();

        let mut matrix = FeatureMatrix::new(self.vocabulary.len());
        for entries in rows {
            matrix.push_row(entries)?;
        }
        Ok(matrix)
    }

    fn width(&self) -> Option<usize> {
        self.is_fitted().then(|| self.vocabulary.len())
    }
}
