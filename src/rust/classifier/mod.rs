mod error;
mod estimator;
mod tree;
mod forest;
mod multi_label;
#[allow(clippy::module_inception)]
mod classifier;
pub mod builder;

pub use error::ClassifierError;
pub use estimator::Estimator;
pub use tree::{Criterion, DecisionTree, MaxFeatures, TreeParams};
pub use forest::{ForestParams, RandomForest};
pub use multi_label::MultiLabelClassifier;
pub use classifier::Classifier;
pub use builder::ClassifierBuilder;

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierInfo {
    /// Number of categories the classifier predicts
    pub num_categories: usize,
    /// Category names in output column order
    pub category_labels: Vec<String>,
    /// Number of terms in the fitted vocabulary
    pub vocabulary_size: usize,
    /// Total feature columns: vocabulary plus the word-count column
    pub feature_width: usize,
    /// Debug rendering of the estimator hyperparameters
    pub params: String,
    /// Seed the category models were fitted with
    pub seed: u64,
}
