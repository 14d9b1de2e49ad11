mod common;

use disaster_response::{Categories, ModelStore, RandomForest, StoreError};
use std::fs;

#[test]
fn test_save_and_load_preserves_predictions() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let classifier = common::fitted_classifier();
    let dir = tempfile::tempdir()?;
    let store = ModelStore::new(dir.path().join("classifier.model"));

    assert!(!store.exists());
    assert!(!store.verify()?);
    store.save(&classifier)?;
    assert!(store.exists());
    assert!(store.verify()?);

    let loaded = store.load::<RandomForest>()?;
    let (messages, _) = common::corpus();
    assert_eq!(loaded.predict_batch(&messages)?, classifier.predict_batch(&messages)?);
    assert_eq!(
        loaded.predict("Water is needed in the village")?,
        classifier.predict("Water is needed in the village")?
    );
    assert_eq!(loaded.info(), classifier.info());
    Ok(())
}

#[test]
fn test_overwrite_existing_artifact() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = common::fitted_classifier();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("classifier.model");
    fs::write(&path, b"stale contents")?;

    let store = ModelStore::new(&path);
    assert!(!store.verify()?);
    store.save(&classifier)?;
    assert!(store.verify()?);

    // No temporary file is left next to the artifact
    let entries = fs::read_dir(dir.path())?.count();
    assert_eq!(entries, 1);
    Ok(())
}

#[test]
fn test_corrupted_artifact_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = common::fitted_classifier();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("classifier.model");
    let store = ModelStore::new(&path);
    store.save(&classifier)?;

    let mut bytes = fs::read(&path)?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, &bytes)?;

    assert!(!store.verify()?);
    match store.load::<RandomForest>() {
        Err(StoreError::ChecksumMismatch { expected, actual }) => assert_ne!(expected, actual),
        other => panic!("expected checksum mismatch, got {:?}", other.map(|_| ())),
    }
    Ok(())
}

#[test]
fn test_truncated_and_foreign_files() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("classifier.model");
    let store = ModelStore::new(&path);

    fs::write(&path, b"DRM")?;
    assert!(matches!(store.load::<RandomForest>(), Err(StoreError::InvalidFormat(_))));

    fs::write(&path, vec![0u8; 128])?;
    assert!(matches!(store.load::<RandomForest>(), Err(StoreError::InvalidFormat(_))));
    assert!(!store.verify()?);
    Ok(())
}

#[test]
fn test_load_for_rejects_other_categories() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = common::fitted_classifier();
    let dir = tempfile::tempdir()?;
    let store = ModelStore::new(dir.path().join("classifier.model"));
    store.save(&classifier)?;

    assert!(store.load_for::<RandomForest>(&Categories::disaster_response()).is_ok());

    let other = Categories::new(vec!["water", "food"])?;
    assert!(matches!(
        store.load_for::<RandomForest>(&other),
        Err(StoreError::CategoryMismatch(_))
    ));
    Ok(())
}

#[test]
fn test_missing_file_is_io_error() {
    let store = ModelStore::new("/nonexistent/dir/classifier.model");
    assert!(matches!(store.load::<RandomForest>(), Err(StoreError::Io(_))));
}

#[test]
fn test_save_creates_parent_directories() -> Result<(), Box<dyn std::error::Error>> {
    let classifier = common::fitted_classifier();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("models").join("nested").join("classifier.model");

    disaster_response::model_store::save(&classifier, &path)?;
    assert!(path.exists());
    let loaded = disaster_response::model_store::load(&path)?;
    assert_eq!(loaded.categories(), classifier.categories());
    Ok(())
}
