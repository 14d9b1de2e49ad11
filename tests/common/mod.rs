#![allow(dead_code)]

use disaster_response::{Categories, Classifier, ForestParams, MaxFeatures};
use env_logger::{Builder, Env};
use ndarray::{Array2, ArrayView2};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;

const SUBJECTS: [&str; 4] = ["we", "people", "families", "children"];
const VERBS: [&str; 4] = ["need", "want", "are asking for", "lack"];
const PLACES: [&str; 4] = ["the village", "the camp", "our town", "the city"];
/// Item word and the category it switches on.
const ITEMS: [(&str, &str); 5] = [
    ("water", "water"),
    ("food", "food"),
    ("shelter", "shelter"),
    ("medicine", "medical_products"),
    ("blankets", "clothing"),
];
const CHATTER: [&str; 4] = [
    "hello how are you today",
    "thank you for the update",
    "good morning everyone",
    "see you tomorrow friend",
];

// Initialize test logger
pub fn init() {
    let _ = Builder::from_env(Env::default().default_filter_or("warn"))
        .is_test(true)
        .try_init();
}

/// Synthetic labelled messages over all 36 categories. Only the item word
/// separates the item categories; `offer` never occurs.
pub fn corpus() -> (Vec<String>, Array2<u8>) {
    let categories = Categories::disaster_response();
    let column = |name: &str| categories.index_of(name).expect("known category");

    let mut messages = Vec::new();
    let mut rows: Vec<Vec<usize>> = Vec::new();
    for (p, place) in PLACES.iter().enumerate() {
        for subject in SUBJECTS {
            for verb in VERBS {
                for (item, category) in ITEMS {
                    messages.push(format!("{} {} {} in {}", subject, verb, item, place));
                    rows.push(vec![column("related"), column("aid_related"), column(category)]);
                }
            }
        }
        for chatter in CHATTER {
            messages.push(format!("{} {}", chatter, p));
            rows.push(Vec::new());
        }
    }

    let mut labels = Array2::zeros((messages.len(), categories.len()));
    for (i, columns) in rows.iter().enumerate() {
        for &j in columns {
            labels[[i, j]] = 1;
        }
    }
    (messages, labels)
}

/// Deterministic forest settings: every tree sees every row and feature.
pub fn exact_params() -> ForestParams {
    ForestParams {
        n_estimators: 3,
        bootstrap: false,
        max_features: MaxFeatures::All,
        ..ForestParams::default()
    }
}

pub fn fitted_classifier() -> Classifier {
    let (messages, labels) = corpus();
    Classifier::builder()
        .with_params(exact_params())
        .fit(&messages, labels.view())
        .expect("Failed to fit classifier")
}

/// Writes `messages` and `labels` to a `messages` table shaped like the ETL output.
pub async fn write_database(
    path: &Path,
    messages: &[String],
    labels: ArrayView2<'_, u8>,
) -> Result<(), sqlx::Error> {
    let categories = Categories::disaster_response();
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    let definitions: Vec<String> = categories.iter().map(|c| format!("\"{}\" INTEGER", c)).collect();
    sqlx::query(&format!(
        "CREATE TABLE messages (id INTEGER PRIMARY KEY, message TEXT, genre TEXT, {})",
        definitions.join(", ")
    ))
    .execute(&pool)
    .await?;

    let names: Vec<String> = categories.iter().map(|c| format!("\"{}\"", c)).collect();
    let placeholders = vec!["?"; categories.len() + 1].join(", ");
    let insert = format!(
        "INSERT INTO messages (message, {}) VALUES ({})",
        names.join(", "),
        placeholders
    );
    let mut tx = pool.begin().await?;
    for (message, row) in messages.iter().zip(labels.outer_iter()) {
        let mut query = sqlx::query(&insert).bind(message.as_str());
        for &value in row.iter() {
            query = query.bind(i64::from(value));
        }
        query.execute(&mut *tx).await?;
    }
    tx.commit().await?;
    pool.close().await;
    Ok(())
}

/// Runs one statement against the database at `path`.
pub async fn execute(path: &Path, sql: &str) -> Result<(), sqlx::Error> {
    let options = SqliteConnectOptions::new().filename(path);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    sqlx::query(sql).execute(&pool).await?;
    pool.close().await;
    Ok(())
}
