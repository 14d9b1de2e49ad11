//! Labelled messages as produced by the ETL step, and the train/test split.

use lazy_static::lazy_static;
use log::{debug, info};
use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashSet;
use std::path::Path;

use crate::categories::Categories;
use crate::classifier::builder::validate_training_data;
use crate::classifier::ClassifierError;
use crate::features::word_count::word_count;
use crate::utils::quantile;

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("constant pattern compiles");
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Database error")]
    Database(#[from] sqlx::Error),
    #[error("Table '{0}' does not exist")]
    MissingTable(String),
    #[error("Table '{table}' is missing columns: {columns:?}")]
    MissingColumns { table: String, columns: Vec<String> },
    #[error("Row {row} has no message")]
    MissingMessage { row: usize },
    #[error("Row {row}: category '{category}' is {value}, expected 0 or 1")]
    InvalidLabel {
        row: usize,
        category: String,
        value: String,
    },
    #[error("Table '{0}' has no rows")]
    Empty(String),
    #[error(transparent)]
    Invalid(#[from] ClassifierError),
}

/// Whether unusually long messages are dropped from the training split.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutlierPolicy {
    /// Train on every message.
    #[default]
    Keep,
    /// Drop messages whose word count exceeds `Q3 + multiplier * (Q3 - Q1)`.
    TrimUpperIqr { multiplier: f64 },
}

impl OutlierPolicy {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        match *self {
            OutlierPolicy::TrimUpperIqr { multiplier } if !(multiplier.is_finite() && multiplier >= 0.0) => {
                Err(ClassifierError::configuration(format!(
                    "IQR multiplier must be a non-negative number, got {}",
                    multiplier
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Messages with one 0/1 label row each, columns in category order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    messages: Vec<String>,
    labels: Array2<u8>,
    categories: Categories,
}

impl Dataset {
    pub fn new(messages: Vec<String>, labels: Array2<u8>, categories: Categories) -> Result<Self, ClassifierError> {
        validate_training_data(messages.len(), labels.view(), &categories)?;
        Ok(Self {
            messages,
            labels,
            categories,
        })
    }

    /// Reads `message` and every category column from `table`.
    ///
    /// The schema is checked before any row is read; NULL messages and
    /// labels other than 0 or 1 are rejected with the offending row.
    pub async fn from_sqlite<P: AsRef<Path>>(
        path: P,
        table: &str,
        categories: &Categories,
    ) -> Result<Self, DatasetError> {
        if !IDENTIFIER.is_match(table) {
            return Err(ClassifierError::configuration(format!("Invalid table name '{}'", table)).into());
        }
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        info!("Reading table '{}' from {:?}", table, path.as_ref());

        let schema = sqlx::query(&format!("PRAGMA table_info(\"{}\")", table))
            .fetch_all(&pool)
            .await?;
        if schema.is_empty() {
            return Err(DatasetError::MissingTable(table.to_string()));
        }
        let present: HashSet<String> = schema
            .iter()
            .map(|row| row.try_get::<String, _>("name"))
            .collect::<Result<_, _>>()?;
        let missing: Vec<String> = std::iter::once("message")
            .chain(categories.iter())
            .filter(|column| !present.contains(*column))
            .map(str::to_string)
            .collect();
        if !missing.is_empty() {
            return Err(DatasetError::MissingColumns {
                table: table.to_string(),
                columns: missing,
            });
        }

        let columns: Vec<String> = std::iter::once("message")
            .chain(categories.iter())
            .map(|c| format!("\"{}\"", c))
            .collect();
        let query = format!("SELECT {} FROM \"{}\"", columns.join(", "), table);
        let rows = sqlx::query(&query).fetch_all(&pool).await?;
        pool.close().await;
        if rows.is_empty() {
            return Err(DatasetError::Empty(table.to_string()));
        }

        let mut messages = Vec::with_capacity(rows.len());
        let mut labels = Array2::<u8>::zeros((rows.len(), categories.len()));
        for (i, row) in rows.iter().enumerate() {
            let message: Option<String> = row.try_get(0)?;
            messages.push(message.ok_or(DatasetError::MissingMessage { row: i })?);
            for (j, category) in categories.iter().enumerate() {
                let value: Option<i64> = row.try_get(j + 1)?;
                labels[[i, j]] = match value {
                    Some(0) => 0,
                    Some(1) => 1,
                    other => {
                        return Err(DatasetError::InvalidLabel {
                            row: i,
                            category: category.to_string(),
                            value: other.map_or_else(|| "NULL".to_string(), |v| v.to_string()),
                        })
                    }
                };
            }
        }
        info!("Loaded {} messages with {} categories", messages.len(), categories.len());
        Ok(Self::new(messages, labels, categories.clone())?)
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn labels(&self) -> ArrayView2<'_, u8> {
        self.labels.view()
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The rows at `indices`, in that order.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        Dataset {
            messages: indices.iter().map(|&i| self.messages[i].clone()).collect(),
            labels: self.labels.select(Axis(0), indices),
            categories: self.categories.clone(),
        }
    }

    /// Shuffles rows with `seed` and holds out `ceil(test_size * n)` of them.
    /// Returns `(train, test)`.
    pub fn train_test_split(&self, test_size: f64, seed: u64) -> Result<(Dataset, Dataset), ClassifierError> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ClassifierError::configuration(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }
        let n = self.len();
        let n_test = (test_size * n as f64).ceil() as usize;
        if n_test == 0 || n_test >= n {
            return Err(ClassifierError::configuration(format!(
                "test_size {} leaves no rows on one side of the split of {} messages",
                test_size, n
            )));
        }
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test, train) = order.split_at(n_test);
        info!("Split {} messages into {} train and {} test", n, train.len(), test.len());
        Ok((self.subset(train), self.subset(test)))
    }

    /// Applies `policy` and returns the rows that remain.
    pub fn apply_outlier_policy(&self, policy: &OutlierPolicy) -> Result<Dataset, ClassifierError> {
        policy.validate()?;
        let multiplier = match *policy {
            OutlierPolicy::Keep => return Ok(self.clone()),
            OutlierPolicy::TrimUpperIqr { multiplier } => multiplier,
        };
        let counts: Vec<f64> = self.messages.iter().map(|m| word_count(m) as f64).collect();
        let mut sorted = counts.clone();
        sorted.sort_by(f64::total_cmp);
        let (q1, q3) = match (quantile(&sorted, 0.25), quantile(&sorted, 0.75)) {
            (Some(q1), Some(q3)) => (q1, q3),
            _ => return Ok(self.clone()),
        };
        let upper = q3 + multiplier * (q3 - q1);
        let kept: Vec<usize> = counts
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count <= upper)
            .map(|(i, _)| i)
            .collect();
        debug!("Word count quartiles {} / {}, upper fence {}", q1, q3, upper);
        info!(
            "Outlier trimming removed {} of {} training messages",
            self.len() - kept.len(),
            self.len()
        );
        Ok(self.subset(&kept))
    }
}
