mod common;

use disaster_response::{ModelStore, CATEGORY_NAMES};
use std::process::{Command, Output};

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_disaster-response"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("binary runs")
}

#[test]
fn test_wrong_argument_count_prints_usage() {
    for args in [&[][..], &["train"][..], &["train", "data/DisasterResponse.db"][..]] {
        let output = run(args);
        assert!(output.status.success(), "args: {:?}", args);
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Please provide the filepath"), "args: {:?}", args);
    }
}

#[test]
fn test_missing_database_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let database = dir.path().join("absent.db");
    let model = dir.path().join("classifier.model");

    let output = run(&[
        "train",
        database.to_str().ok_or("non-UTF-8 temp path")?,
        model.to_str().ok_or("non-UTF-8 temp path")?,
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: Failed to load"));
    assert!(!model.exists());
    Ok(())
}

#[test]
fn test_missing_model_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let model = dir.path().join("absent.model");

    let output = run(&["classify", model.to_str().ok_or("non-UTF-8 temp path")?, "We need water"]);
    assert_eq!(output.status.code(), Some(1));
    Ok(())
}

#[test]
fn test_classify_prints_every_category_in_order() -> Result<(), Box<dyn std::error::Error>> {
    common::init();
    let dir = tempfile::tempdir()?;
    let model = dir.path().join("classifier.model");
    ModelStore::new(&model).save(&common::fitted_classifier())?;

    let output = run(&[
        "classify",
        model.to_str().ok_or("non-UTF-8 temp path")?,
        "We need water in the village",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout)?;
    let mut lines = stdout.lines();
    assert_eq!(lines.next(), Some("Message: We need water in the village"));
    let flags: Vec<(String, String)> = lines
        .map(|line| {
            let mut fields = line.split_whitespace();
            (
                fields.next().unwrap_or_default().to_string(),
                fields.next().unwrap_or_default().to_string(),
            )
        })
        .collect();

    assert_eq!(flags.len(), CATEGORY_NAMES.len());
    for ((name, flag), expected) in flags.iter().zip(CATEGORY_NAMES) {
        assert_eq!(name, expected);
        assert!(flag == "0" || flag == "1", "{}: {}", name, flag);
    }
    let water = flags.iter().find(|(name, _)| name == "water").map(|(_, flag)| flag.as_str());
    assert_eq!(water, Some("1"));
    Ok(())
}
