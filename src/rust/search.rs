//! Exhaustive, cross-validated hyperparameter search over a classifier.

use log::{info, warn};
use ndarray::{ArrayView2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Range;

use crate::classifier::builder::validate_training_data;
use crate::classifier::{
    Classifier, ClassifierBuilder, ClassifierError, Criterion, Estimator, ForestParams, MaxFeatures,
    MultiLabelClassifier, RandomForest,
};
use crate::evaluation::binary_report;
use crate::features::{FeatureMatrix, FeatureStage};

/// Metric used to rank candidates on held-out folds. Higher is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Fraction of rows whose whole label vector is predicted exactly.
    #[default]
    SubsetAccuracy,
    /// Fraction of individual label cells predicted correctly.
    HammingAccuracy,
    /// Mean over label columns of the per-column macro F1.
    MacroF1,
}

impl Scoring {
    pub fn score(self, truth: ArrayView2<'_, u8>, predicted: ArrayView2<'_, u8>) -> f64 {
        let n_rows = truth.nrows();
        if n_rows == 0 || truth.dim() != predicted.dim() {
            return 0.0;
        }
        match self {
            Scoring::SubsetAccuracy => {
                let exact = truth
                    .outer_iter()
                    .zip(predicted.outer_iter())
                    .filter(|(t, p)| t == p)
                    .count();
                exact as f64 / n_rows as f64
            }
            Scoring::HammingAccuracy => {
                let cells = truth.len();
                if cells == 0 {
                    return 0.0;
                }
                let correct = truth.iter().zip(predicted.iter()).filter(|(t, p)| t == p).count();
                correct as f64 / cells as f64
            }
            Scoring::MacroF1 => {
                let n_cols = truth.ncols();
                if n_cols == 0 {
                    return 0.0;
                }
                let total: f64 = truth
                    .axis_iter(Axis(1))
                    .zip(predicted.axis_iter(Axis(1)))
                    .map(|(t, p)| binary_report("", t, p).macro_avg.f1)
                    .sum();
                total / n_cols as f64
            }
        }
    }
}

/// Grid of random-forest hyperparameters. Candidates are the cartesian
/// product of the lists, enumerated with the last field varying fastest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestGrid {
    pub n_estimators: Vec<usize>,
    pub criterion: Vec<Criterion>,
    pub max_depth: Vec<Option<usize>>,
    pub min_samples_split: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
}

impl Default for ForestGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![50, 100],
            criterion: vec![Criterion::Gini, Criterion::Entropy],
            max_depth: vec![None],
            min_samples_split: vec![2],
            max_features: vec![MaxFeatures::Sqrt],
        }
    }
}

impl ForestGrid {
    /// A grid holding exactly one candidate.
    pub fn single(params: &ForestParams) -> Self {
        Self {
            n_estimators: vec![params.n_estimators],
            criterion: vec![params.criterion],
            max_depth: vec![params.max_depth],
            min_samples_split: vec![params.min_samples_split],
            max_features: vec![params.max_features],
        }
    }

    pub fn len(&self) -> usize {
        self.n_estimators.len()
            * self.criterion.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.max_features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut candidates = Vec::with_capacity(self.len());
        for &n_estimators in &self.n_estimators {
            for &criterion in &self.criterion {
                for &max_depth in &self.max_depth {
                    for &min_samples_split in &self.min_samples_split {
                        for &max_features in &self.max_features {
                            candidates.push(ForestParams {
                                n_estimators,
                                criterion,
                                max_depth,
                                min_samples_split,
                                max_features,
                                ..ForestParams::default()
                            });
                        }
                    }
                }
            }
        }
        candidates
    }

    /// Only checks that every axis has a value. Individual candidates are
    /// validated when fitted, so one bad combination does not sink the grid.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.is_empty() {
            return Err(ClassifierError::configuration(
                "Search grid is empty: every parameter list needs at least one value",
            ));
        }
        Ok(())
    }
}

/// Cross-validation result of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult<P> {
    pub params: P,
    pub fold_scores: Vec<f64>,
    /// `None` when the candidate failed or was never scored.
    pub mean_score: Option<f64>,
    /// Why the candidate was excluded, if it was.
    pub error: Option<String>,
}

impl<P> CandidateResult<P> {
    pub fn is_excluded(&self) -> bool {
        self.error.is_some()
    }
}

/// The refitted winner of a search plus the score of every candidate.
#[derive(Debug, Clone)]
pub struct SearchOutcome<E: Estimator> {
    pub classifier: Classifier<E>,
    pub best_params: E::Params,
    /// Mean held-out score of the winner; `None` when only one candidate
    /// was given and cross-validation was skipped.
    pub best_score: Option<f64>,
    pub candidates: Vec<CandidateResult<E::Params>>,
}

/// Features and labels of one cross-validation fold.
struct Fold {
    x_train: FeatureMatrix,
    y_train: ndarray::Array2<u8>,
    x_test: FeatureMatrix,
    y_test: ndarray::Array2<u8>,
}

/// Contiguous, unshuffled k-fold test ranges. The first `n % k` folds hold
/// one extra row.
pub(crate) fn kfold_ranges(n: usize, k: usize) -> Vec<Range<usize>> {
    let base = n / k;
    let extra = n % k;
    let mut start = 0;
    (0..k)
        .map(|fold| {
            let size = base + usize::from(fold < extra);
            let range = start..start + size;
            start += size;
            range
        })
        .collect()
}

/// Fits one classifier per candidate on k-1 folds, scores it on the
/// remaining fold, and refits the best candidate on all rows.
///
/// A candidate whose fit or prediction fails on any fold is logged and
/// excluded; the search only fails when every candidate does. Ties keep the
/// earliest candidate.
#[derive(Debug, Clone)]
pub struct GridSearch<E: Estimator = RandomForest> {
    builder: ClassifierBuilder<E>,
    candidates: Vec<E::Params>,
    folds: usize,
    scoring: Scoring,
}

impl<E: Estimator> GridSearch<E> {
    pub fn new(builder: ClassifierBuilder<E>, candidates: Vec<E::Params>) -> Self {
        Self {
            builder,
            candidates,
            folds: 3,
            scoring: Scoring::default(),
        }
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.folds = folds;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn candidates(&self) -> &[E::Params] {
        &self.candidates
    }

    pub fn fit<S: AsRef<str>>(
        &self,
        messages: &[S],
        labels: ArrayView2<'_, u8>,
    ) -> Result<SearchOutcome<E>, ClassifierError> {
        if self.candidates.is_empty() {
            return Err(ClassifierError::configuration("Grid search needs at least one candidate"));
        }
        validate_training_data(messages.len(), labels, self.builder.categories())?;

        if self.candidates.len() == 1 {
            info!("Single candidate, skipping cross-validation");
            let params = self.candidates[0].clone();
            let classifier = self.builder.clone().with_params(params.clone()).fit(messages, labels)?;
            return Ok(SearchOutcome {
                classifier,
                best_params: params.clone(),
                best_score: None,
                candidates: vec![CandidateResult {
                    params,
                    fold_scores: Vec::new(),
                    mean_score: None,
                    error: None,
                }],
            });
        }

        if self.folds < 2 {
            return Err(ClassifierError::configuration(format!(
                "Cross-validation needs at least 2 folds, got {}",
                self.folds
            )));
        }
        if messages.len() < self.folds {
            return Err(ClassifierError::configuration(format!(
                "Cannot split {} messages into {} folds",
                messages.len(),
                self.folds
            )));
        }

        let messages: Vec<&str> = messages.iter().map(AsRef::as_ref).collect();
        let folds = self.prepare_folds(&messages, labels)?;
        info!(
            "Evaluating {} candidates with {}-fold cross-validation ({:?})",
            self.candidates.len(),
            self.folds,
            self.scoring
        );

        let results: Vec<CandidateResult<E::Params>> = self
            .candidates
            .par_iter()
            .enumerate()
            .map(|(index, params)| self.evaluate_candidate(index, params, &folds))
            .collect();

        let mut best: Option<(usize, f64)> = None;
        for (index, result) in results.iter().enumerate() {
            if let Some(score) = result.mean_score {
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((index, score));
                }
            }
        }
        let (best_index, best_score) = best.ok_or_else(|| {
            ClassifierError::fit(format!("All {} search candidates failed", results.len()))
        })?;
        let excluded = results.iter().filter(|r| r.is_excluded()).count();
        if excluded > 0 {
            warn!("{} of {} candidates were excluded from the search", excluded, results.len());
        }

        let best_params = results[best_index].params.clone();
        info!(
            "Best candidate #{} scored {:.4}: {:?}; refitting on {} messages",
            best_index,
            best_score,
            best_params,
            messages.len()
        );
        let classifier = self
            .builder
            .clone()
            .with_params(best_params.clone())
            .fit(&messages, labels)?;

        Ok(SearchOutcome {
            classifier,
            best_params,
            best_score: Some(best_score),
            candidates: results,
        })
    }

    /// Fits the feature pipeline once per fold; every candidate reuses it.
    fn prepare_folds(&self, messages: &[&str], labels: ArrayView2<'_, u8>) -> Result<Vec<Fold>, ClassifierError> {
        let n = messages.len();
        kfold_ranges(n, self.folds)
            .into_par_iter()
            .enumerate()
            .map(|(index, test_range)| {
                let train_rows: Vec<usize> = (0..n).filter(|i| !test_range.contains(i)).collect();
                let test_rows: Vec<usize> = test_range.collect();
                info!(
                    "Fold {}: {} train / {} test messages",
                    index + 1,
                    train_rows.len(),
                    test_rows.len()
                );
                let train_messages: Vec<&str> = train_rows.iter().map(|&i| messages[i]).collect();
                let test_messages: Vec<&str> = test_rows.iter().map(|&i| messages[i]).collect();

                let mut features = self.builder.feature_union();
                let x_train = features.fit_transform(&train_messages)?;
                let x_test = features.transform(&test_messages)?;
                Ok(Fold {
                    x_train,
                    y_train: labels.select(Axis(0), &train_rows),
                    x_test,
                    y_test: labels.select(Axis(0), &test_rows),
                })
            })
            .collect()
    }

    fn evaluate_candidate(&self, index: usize, params: &E::Params, folds: &[Fold]) -> CandidateResult<E::Params> {
        let scores: Result<Vec<f64>, ClassifierError> = folds
            .iter()
            .map(|fold| {
                let mut model = MultiLabelClassifier::new(E::with_params(params.clone()));
                model.fit(&fold.x_train, fold.y_train.view(), self.builder.seed())?;
                let predicted = model.predict(&fold.x_test)?;
                Ok(self.scoring.score(fold.y_test.view(), predicted.view()))
            })
            .collect();

        match scores {
            Ok(fold_scores) => {
                let mean_score = crate::utils::mean(&fold_scores);
                info!("Candidate #{} {:?}: mean score {:.4?}", index, params, mean_score);
                CandidateResult {
                    params: params.clone(),
                    fold_scores,
                    mean_score,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Candidate #{} {:?} excluded: {}", index, params, e);
                CandidateResult {
                    params: params.clone(),
                    fold_scores: Vec::new(),
                    mean_score: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_kfold_ranges_cover_rows_once() {
        let ranges = kfold_ranges(10, 3);
        assert_eq!(ranges, vec![0..4, 4..7, 7..10]);
        assert_eq!(kfold_ranges(6, 3), vec![0..2, 2..4, 4..6]);
    }

    #[test]
    fn test_folds_split_every_message_once() {
        let builder = ClassifierBuilder::new()
            .with_categories(crate::categories::Categories::new(vec!["water", "food"]).unwrap());
        let search = GridSearch::new(builder, vec![ForestParams::default()]).with_folds(3);
        let messages = [
            "water", "need water", "food please", "send food", "hello", "water now", "food now", "thanks",
            "more water",
        ];
        let labels = array![[1u8, 0], [1, 0], [0, 1], [0, 1], [0, 0], [1, 0], [0, 1], [0, 0], [1, 0]];

        let folds = search.prepare_folds(&messages, labels.view()).unwrap();
        assert_eq!(folds.len(), 3);
        for (fold, test_range) in folds.iter().zip(kfold_ranges(messages.len(), 3)) {
            assert_eq!(fold.x_test.n_rows(), test_range.len());
            assert_eq!(fold.x_train.n_rows(), messages.len() - test_range.len());
            assert_eq!(fold.y_train.nrows(), fold.x_train.n_rows());
            assert_eq!(fold.y_test, labels.slice(ndarray::s![test_range, ..]));
            assert_eq!(fold.x_train.n_cols(), fold.x_test.n_cols());
        }
    }

    #[test]
    fn test_grid_enumeration_order() {
        let grid = ForestGrid {
            n_estimators: vec![10, 20],
            criterion: vec![Criterion::Gini, Criterion::Entropy],
            ..ForestGrid::default()
        };
        let candidates = grid.candidates();
        assert_eq!(candidates.len(), 4);
        assert_eq!(grid.len(), 4);
        assert_eq!(
            candidates
                .iter()
                .map(|p| (p.n_estimators, p.criterion))
                .collect::<Vec<_>>(),
            vec![
                (10, Criterion::Gini),
                (10, Criterion::Entropy),
                (20, Criterion::Gini),
                (20, Criterion::Entropy),
            ]
        );
    }

    #[test]
    fn test_empty_grid_is_invalid() {
        let grid = ForestGrid {
            max_depth: Vec::new(),
            ..ForestGrid::default()
        };
        assert!(grid.candidates().is_empty());
        assert!(grid.validate().is_err());
        assert!(ForestGrid::default().validate().is_ok());
    }

    #[test]
    fn test_scoring_metrics() {
        let truth = array![[1u8, 0], [0, 1], [1, 1], [0, 0]];
        let predicted = array![[1u8, 0], [0, 0], [1, 1], [1, 0]];
        assert_eq!(Scoring::SubsetAccuracy.score(truth.view(), predicted.view()), 0.5);
        assert_eq!(Scoring::HammingAccuracy.score(truth.view(), predicted.view()), 0.75);
        let perfect = Scoring::MacroF1.score(truth.view(), truth.view());
        assert!((perfect - 1.0).abs() < 1e-12);
    }
}
