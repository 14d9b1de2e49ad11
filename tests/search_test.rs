mod common;

use disaster_response::{Classifier, ClassifierError, Criterion, ForestGrid, ForestParams, GridSearch, Scoring};

#[test]
fn test_failing_candidate_is_excluded() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let (messages, labels) = common::corpus();
    let broken = ForestParams {
        n_estimators: 0,
        ..common::exact_params()
    };
    let search = GridSearch::new(Classifier::builder(), vec![broken.clone(), common::exact_params()]);

    let outcome = search.fit(&messages, labels.view())?;
    assert_eq!(outcome.candidates.len(), 2);
    assert!(outcome.candidates[0].is_excluded());
    assert!(outcome.candidates[0].mean_score.is_none());
    assert!(outcome.candidates[0].error.as_deref().unwrap_or("").contains("n_estimators"));
    assert!(!outcome.candidates[1].is_excluded());
    assert_eq!(outcome.candidates[1].fold_scores.len(), 3);

    assert_eq!(outcome.best_params, common::exact_params());
    assert_eq!(outcome.best_score, outcome.candidates[1].mean_score);
    assert_eq!(outcome.classifier.params(), &common::exact_params());
    Ok(())
}

#[test]
fn test_all_candidates_failing_is_an_error() {
    let (messages, labels) = common::corpus();
    let broken = |n_estimators| ForestParams {
        n_estimators,
        min_samples_split: 0,
        ..ForestParams::default()
    };
    let search = GridSearch::new(Classifier::builder(), vec![broken(2), broken(3)]);

    match search.fit(&messages, labels.view()) {
        Err(ClassifierError::FitError(msg)) => assert!(msg.contains("All 2")),
        other => panic!("expected fit error, got {:?}", other.map(|o| o.best_params)),
    }
}

#[test]
fn test_ties_go_to_the_first_candidate() -> Result<(), Box<dyn std::error::Error>> {
    let (messages, labels) = common::corpus();
    let first = ForestParams {
        n_estimators: 3,
        ..common::exact_params()
    };
    let second = ForestParams {
        n_estimators: 4,
        ..common::exact_params()
    };
    let outcome = GridSearch::new(Classifier::builder(), vec![first.clone(), second])
        .with_scoring(Scoring::HammingAccuracy)
        .fit(&messages, labels.view())?;

    assert_eq!(outcome.candidates[0].mean_score, outcome.candidates[1].mean_score);
    assert_eq!(outcome.best_params, first);
    Ok(())
}

#[test]
fn test_single_candidate_skips_cross_validation() -> Result<(), Box<dyn std::error::Error>> {
    let (messages, labels) = common::corpus();
    let grid = ForestGrid::single(&common::exact_params());
    assert_eq!(grid.len(), 1);

    let outcome = GridSearch::new(Classifier::builder(), grid.candidates()).fit(&messages, labels.view())?;
    assert!(outcome.best_score.is_none());
    assert_eq!(outcome.candidates.len(), 1);
    assert!(outcome.candidates[0].fold_scores.is_empty());
    assert_eq!(outcome.classifier.predict("we need water")?["water"], 1);
    Ok(())
}

#[test]
fn test_grid_candidates_reach_the_search() -> Result<(), Box<dyn std::error::Error>> {
    let (messages, labels) = common::corpus();
    let grid = ForestGrid {
        n_estimators: vec![2, 3],
        criterion: vec![Criterion::Gini, Criterion::Entropy],
        max_features: vec![common::exact_params().max_features],
        ..ForestGrid::default()
    };
    let outcome = GridSearch::new(Classifier::builder(), grid.candidates())
        .with_folds(2)
        .with_scoring(Scoring::MacroF1)
        .fit(&messages, labels.view())?;

    assert_eq!(outcome.candidates.len(), 4);
    for candidate in &outcome.candidates {
        assert_eq!(candidate.fold_scores.len(), 2);
        let score = candidate.mean_score.expect("scored");
        assert!((0.0..=1.0).contains(&score));
    }
    let best = outcome.best_score.expect("cross-validated");
    assert!(outcome
        .candidates
        .iter()
        .all(|c| c.mean_score.map_or(true, |s| s <= best)));
    Ok(())
}

#[test]
fn test_invalid_fold_settings() {
    let (messages, labels) = common::corpus();
    let candidates = vec![common::exact_params(), ForestParams::default()];

    let one_fold = GridSearch::new(Classifier::builder(), candidates.clone()).with_folds(1);
    assert!(matches!(
        one_fold.fit(&messages, labels.view()),
        Err(ClassifierError::ConfigurationError(_))
    ));

    let too_many = GridSearch::new(Classifier::builder(), candidates).with_folds(messages.len() + 1);
    assert!(matches!(
        too_many.fit(&messages, labels.view()),
        Err(ClassifierError::ConfigurationError(_))
    ));

    let empty = GridSearch::new(Classifier::builder(), Vec::new());
    assert!(empty.fit(&messages, labels.view()).is_err());
}
