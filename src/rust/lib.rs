//! Multi-label classification of disaster-response messages.
//!
//! Messages are tokenized and lemmatized, turned into TF-IDF features plus a
//! word count, and scored by one independent random forest per category.
//! A training run searches a hyperparameter grid with cross-validation,
//! evaluates the winner on a held-out split and saves it as a single file.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use disaster_response::{Categories, Classifier, ForestParams, ModelStore, RandomForest};
//! use ndarray::array;
//!
//! let classifier = Classifier::builder()
//!     .with_categories(Categories::new(vec!["water", "food"])?)
//!     .with_params(ForestParams { n_estimators: 10, ..ForestParams::default() })
//!     .fit(
//!         &["we need water", "send food", "no water or food left", "all is well"],
//!         array![[1u8, 0], [0, 1], [1, 1], [0, 0]].view(),
//!     )?;
//!
//! let dir = tempfile::tempdir()?;
//! let store = ModelStore::new(dir.path().join("classifier.model"));
//! store.save(&classifier)?;
//! let loaded = store.load::<RandomForest>()?;
//!
//! let labels = loaded.predict("Water is needed in the village")?;
//! assert_eq!(labels.len(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! A fitted [`Classifier`] is immutable and `Send + Sync`; share it with
//! `Arc` and call `predict` from any number of threads.

pub mod categories;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod evaluation;
pub mod features;
pub mod model_store;
mod runtime;
pub mod search;
pub mod text;
pub mod train;
mod utils;

pub use categories::{Categories, CATEGORY_NAMES};
pub use classifier::{
    Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo, Criterion, DecisionTree, Estimator,
    ForestParams, MaxFeatures, MultiLabelClassifier, RandomForest, TreeParams,
};
pub use config::TrainingConfig;
pub use dataset::{Dataset, DatasetError, OutlierPolicy};
pub use evaluation::{evaluate, CategoryReport, ClassMetrics, EvaluationReport};
pub use features::{count_words, FeatureMatrix, FeatureStage, FeatureUnion, TfidfVectorizer, VectorizerConfig};
pub use model_store::{ModelStore, StoreError};
pub use runtime::{ensure_initialized, initialize, RuntimeConfig};
pub use search::{CandidateResult, ForestGrid, GridSearch, Scoring, SearchOutcome};
pub use text::{LemmaDictionary, Tokenizer};
pub use train::{train, TrainingOutcome};

/// Initializes `env_logger`, defaulting to `info` when `RUST_LOG` is unset.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}
