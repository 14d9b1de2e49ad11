use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::ClassifierError;
use crate::dataset::OutlierPolicy;
use crate::features::VectorizerConfig;
use crate::search::{ForestGrid, Scoring};

/// Settings of one training run. Every field has a default, so a JSON file
/// only needs the fields it changes.
///
/// ```
/// use disaster_response::TrainingConfig;
///
/// let config: TrainingConfig = serde_json::from_str(r#"{ "seed": 7, "cv_folds": 5 }"#).unwrap();
/// assert_eq!(config.seed, 7);
/// assert_eq!(config.table, "messages");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub seed: u64,
    /// Fraction of messages held out for evaluation.
    pub test_size: f64,
    /// Table the ETL step writes messages to.
    pub table: String,
    pub cv_folds: usize,
    pub scoring: Scoring,
    pub vectorizer: VectorizerConfig,
    pub grid: ForestGrid,
    pub outlier_policy: OutlierPolicy,
    /// Worker threads; 0 lets rayon pick.
    pub threads: usize,
    /// Lemma dictionary file replacing the built-in one.
    pub lemma_dictionary: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            test_size: 0.2,
            table: "messages".to_string(),
            cv_folds: 3,
            scoring: Scoring::default(),
            vectorizer: VectorizerConfig::default(),
            grid: ForestGrid::default(),
            outlier_policy: OutlierPolicy::default(),
            threads: 0,
            lemma_dictionary: None,
        }
    }
}

impl TrainingConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        info!("Reading training configuration from {:?}", path);
        let text = fs::read_to_string(path).map_err(|e| {
            ClassifierError::configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: TrainingConfig = serde_json::from_str(&text).map_err(|e| {
            ClassifierError::configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ClassifierError::configuration(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if self.table.is_empty() {
            return Err(ClassifierError::configuration("table must not be empty"));
        }
        if self.cv_folds < 2 {
            return Err(ClassifierError::configuration(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        self.vectorizer.validate()?;
        self.grid.validate()?;
        self.outlier_policy.validate()
    }
}
