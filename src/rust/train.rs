//! One training run: split, trim, search, refit and evaluate.

use log::info;
use std::sync::Arc;
use std::time::Instant;

use crate::classifier::{Classifier, ClassifierBuilder, ClassifierError, ForestParams};
use crate::config::TrainingConfig;
use crate::dataset::Dataset;
use crate::evaluation::{evaluate, EvaluationReport};
use crate::search::{CandidateResult, GridSearch};
use crate::text::LemmaDictionary;

/// Everything a training run produces.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub classifier: Classifier,
    pub best_params: ForestParams,
    pub best_score: Option<f64>,
    pub candidates: Vec<CandidateResult<ForestParams>>,
    pub report: EvaluationReport,
    pub train_size: usize,
    pub test_size: usize,
}

/// Runs the whole pipeline on `dataset` with `config`. Identical inputs and
/// seed give identical outcomes.
pub fn train(
    dataset: &Dataset,
    config: &TrainingConfig,
    dictionary: Arc<LemmaDictionary>,
) -> Result<TrainingOutcome, ClassifierError> {
    config.validate()?;
    let start = Instant::now();

    let (train_split, test_split) = dataset.train_test_split(config.test_size, config.seed)?;
    let train_split = train_split.apply_outlier_policy(&config.outlier_policy)?;

    info!("Building model...");
    let builder = ClassifierBuilder::new()
        .with_categories(dataset.categories().clone())
        .with_dictionary(dictionary)
        .with_vectorizer_config(config.vectorizer.clone())
        .with_seed(config.seed);
    let search = GridSearch::new(builder, config.grid.candidates())
        .with_folds(config.cv_folds)
        .with_scoring(config.scoring);

    info!("Training model...");
    let outcome = search.fit(train_split.messages(), train_split.labels())?;
    info!("Training finished in {:.2?}", start.elapsed());

    info!("Evaluating model...");
    let report = evaluate(&outcome.classifier, test_split.messages(), test_split.labels())?;

    Ok(TrainingOutcome {
        classifier: outcome.classifier,
        best_params: outcome.best_params,
        best_score: outcome.best_score,
        candidates: outcome.candidates,
        report,
        train_size: train_split.len(),
        test_size: test_split.len(),
    })
}
