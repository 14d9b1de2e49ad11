mod common;

use disaster_response::{
    train, Categories, Dataset, ForestGrid, LemmaDictionary, MaxFeatures, OutlierPolicy, TrainingConfig,
};

fn small_config() -> TrainingConfig {
    TrainingConfig {
        grid: ForestGrid {
            n_estimators: vec![2, 3],
            max_features: vec![MaxFeatures::All],
            ..ForestGrid::default()
        },
        ..TrainingConfig::default()
    }
}

fn corpus_dataset() -> Dataset {
    let (messages, labels) = common::corpus();
    Dataset::new(messages, labels, Categories::disaster_response()).expect("valid dataset")
}

#[test]
fn test_training_run_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dataset = corpus_dataset();
    let outcome = train(&dataset, &small_config(), LemmaDictionary::builtin())?;

    assert_eq!(outcome.train_size + outcome.test_size, dataset.len());
    assert_eq!(outcome.test_size, (0.2 * dataset.len() as f64).ceil() as usize);
    assert_eq!(outcome.candidates.len(), 4);
    assert!(outcome.best_score.is_some());
    assert_eq!(outcome.report.categories().len(), 36);

    let water = outcome.report.get("water").expect("water report");
    assert!(water.accuracy > 0.9);
    assert_eq!(outcome.classifier.predict("we need water in the camp")?["water"], 1);
    Ok(())
}

#[test]
fn test_never_positive_category_is_reported_not_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = corpus_dataset();
    let outcome = train(&dataset, &small_config(), LemmaDictionary::builtin())?;

    let offer = outcome.report.get("offer").expect("offer report");
    assert!(offer.degenerate);
    assert!(!offer.present[1]);
    assert_eq!(offer.classes[1].precision, 0.0);
    assert_eq!(offer.accuracy, 1.0);
    assert!(offer.macro_avg.f1.is_finite());
    assert!(outcome.report.degenerate_categories().contains(&"offer"));
    assert!(outcome.report.mean_macro_f1().is_finite());

    let rendered = outcome.report.to_string();
    assert!(rendered.contains("offer"));
    assert!(rendered.contains("Mean macro F1 over 36 categories"));
    Ok(())
}

#[test]
fn test_same_seed_same_outcome() -> Result<(), Box<dyn std::error::Error>> {
    let dataset = corpus_dataset();
    let config = small_config();
    let first = train(&dataset, &config, LemmaDictionary::builtin())?;
    let second = train(&dataset, &config, LemmaDictionary::builtin())?;

    assert_eq!(first.report, second.report);
    assert_eq!(first.best_params, second.best_params);
    assert_eq!(first.candidates, second.candidates);
    assert_eq!(first.classifier.model(), second.classifier.model());
    Ok(())
}

#[test]
fn test_outlier_trimming_only_shrinks_training_split() -> Result<(), Box<dyn std::error::Error>> {
    let (mut messages, labels) = common::corpus();
    messages[0] = format!("{} we need water", "please ".repeat(200));
    let dataset = Dataset::new(messages, labels, Categories::disaster_response())?;

    let keep = train(&dataset, &small_config(), LemmaDictionary::builtin())?;
    let trimmed = train(
        &dataset,
        &TrainingConfig {
            outlier_policy: OutlierPolicy::TrimUpperIqr { multiplier: 1.5 },
            ..small_config()
        },
        LemmaDictionary::builtin(),
    )?;

    assert_eq!(keep.test_size, trimmed.test_size);
    assert!(trimmed.train_size <= keep.train_size);
    Ok(())
}

#[test]
fn test_invalid_config_fails_before_training() {
    let dataset = corpus_dataset();
    let config = TrainingConfig {
        test_size: 0.0,
        ..small_config()
    };
    assert!(train(&dataset, &config, LemmaDictionary::builtin()).is_err());
}
