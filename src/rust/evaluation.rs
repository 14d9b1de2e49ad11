//! Per-category precision, recall and F1 on held-out messages.
//!
//! Every ratio with a zero denominator is reported as `0.0`, so a category
//! with no positive examples in the test split still gets a defined report.

use log::{info, warn};
use ndarray::{ArrayView1, ArrayView2, Axis};
use std::fmt;

use crate::categories::Categories;
use crate::classifier::{Classifier, ClassifierError, Estimator};

/// Precision, recall and F1 for one class, or an average over classes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Classification report for one category column.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryReport {
    pub name: String,
    /// Metrics for label 0 and label 1, in that order.
    pub classes: [ClassMetrics; 2],
    /// Whether each class occurs in the truth or the predictions.
    pub present: [bool; 2],
    pub accuracy: f64,
    /// Unweighted mean over the present classes.
    pub macro_avg: ClassMetrics,
    /// Support-weighted mean over both classes.
    pub weighted_avg: ClassMetrics,
    /// True when some metric hit a zero denominator and was set to `0.0`.
    pub degenerate: bool,
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    (denominator > 0).then(|| numerator as f64 / denominator as f64)
}

/// Builds the report for one binary column.
pub fn binary_report(name: &str, truth: ArrayView1<'_, u8>, predicted: ArrayView1<'_, u8>) -> CategoryReport {
    let n = truth.len();
    let mut true_positive = [0usize; 2];
    let mut true_count = [0usize; 2];
    let mut predicted_count = [0usize; 2];
    let mut correct = 0;
    for (&t, &p) in truth.iter().zip(predicted.iter()) {
        let (t, p) = (usize::from(t.min(1)), usize::from(p.min(1)));
        true_count[t] += 1;
        predicted_count[p] += 1;
        if t == p {
            true_positive[t] += 1;
            correct += 1;
        }
    }

    let mut degenerate = false;
    let mut classes = [ClassMetrics::default(); 2];
    for class in 0..2 {
        let precision = ratio(true_positive[class], predicted_count[class]);
        let recall = ratio(true_positive[class], true_count[class]);
        let (precision, recall) = match (precision, recall) {
            (Some(p), Some(r)) => (p, r),
            (p, r) => {
                degenerate = true;
                (p.unwrap_or(0.0), r.unwrap_or(0.0))
            }
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        classes[class] = ClassMetrics {
            precision,
            recall,
            f1,
            support: true_count[class],
        };
    }

    let present = [
        true_count[0] + predicted_count[0] > 0,
        true_count[1] + predicted_count[1] > 0,
    ];
    let n_present = present.iter().filter(|&&p| p).count();
    let present_mean = |metric: fn(&ClassMetrics) -> f64| {
        if n_present == 0 {
            return 0.0;
        }
        classes
            .iter()
            .zip(present)
            .filter(|(_, p)| *p)
            .map(|(c, _)| metric(c))
            .sum::<f64>()
            / n_present as f64
    };
    let weighted_mean = |metric: fn(&ClassMetrics) -> f64| {
        if n == 0 {
            return 0.0;
        }
        classes.iter().map(|c| metric(c) * c.support as f64).sum::<f64>() / n as f64
    };

    CategoryReport {
        name: name.to_string(),
        classes,
        present,
        accuracy: ratio(correct, n).unwrap_or(0.0),
        macro_avg: ClassMetrics {
            precision: present_mean(|c| c.precision),
            recall: present_mean(|c| c.recall),
            f1: present_mean(|c| c.f1),
            support: n,
        },
        weighted_avg: ClassMetrics {
            precision: weighted_mean(|c| c.precision),
            recall: weighted_mean(|c| c.recall),
            f1: weighted_mean(|c| c.f1),
            support: n,
        },
        degenerate,
    }
}

/// Reports for every category of a held-out batch, in category order.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    categories: Vec<CategoryReport>,
}

impl EvaluationReport {
    pub fn categories(&self) -> &[CategoryReport] {
        &self.categories
    }

    pub fn get(&self, name: &str) -> Option<&CategoryReport> {
        self.categories.iter().find(|report| report.name == name)
    }

    pub fn mean_macro_f1(&self) -> f64 {
        crate::utils::mean(&self.categories.iter().map(|r| r.macro_avg.f1).collect::<Vec<_>>()).unwrap_or(0.0)
    }

    pub fn mean_accuracy(&self) -> f64 {
        crate::utils::mean(&self.categories.iter().map(|r| r.accuracy).collect::<Vec<_>>()).unwrap_or(0.0)
    }

    /// Names of categories whose metrics needed the zero-division fallback.
    pub fn degenerate_categories(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|r| r.degenerate)
            .map(|r| r.name.as_str())
            .collect()
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, label: &str, m: &ClassMetrics) -> fmt::Result {
    writeln!(
        f,
        "{:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        label, m.precision, m.recall, m.f1, m.support
    )
}

impl fmt::Display for CategoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for (class, metrics) in self.classes.iter().enumerate() {
            if self.present[class] {
                write_row(f, &class.to_string(), metrics)?;
            }
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        write_row(f, "macro avg", &self.macro_avg)?;
        write_row(f, "weighted avg", &self.weighted_avg)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.categories {
            writeln!(f, "{}", report)?;
        }
        write!(
            f,
            "Mean macro F1 over {} categories: {:.4}",
            self.categories.len(),
            self.mean_macro_f1()
        )
    }
}

/// Scores an already predicted label matrix against the truth.
pub fn evaluate_predictions(
    categories: &Categories,
    truth: ArrayView2<'_, u8>,
    predicted: ArrayView2<'_, u8>,
) -> Result<EvaluationReport, ClassifierError> {
    if truth.dim() != predicted.dim() {
        return Err(ClassifierError::configuration(format!(
            "Truth has shape {:?} but predictions have shape {:?}",
            truth.dim(),
            predicted.dim()
        )));
    }
    if truth.ncols() != categories.len() {
        return Err(ClassifierError::configuration(format!(
            "Label matrix has {} columns for {} categories",
            truth.ncols(),
            categories.len()
        )));
    }
    let reports: Vec<CategoryReport> = categories
        .iter()
        .zip(truth.axis_iter(Axis(1)).zip(predicted.axis_iter(Axis(1))))
        .map(|(name, (t, p))| binary_report(name, t, p))
        .collect();

    for report in reports.iter().filter(|r| r.degenerate) {
        warn!(
            "Category '{}' has an undefined metric on this split (support {} / {}); reported as 0.0",
            report.name, report.classes[1].support, report.classes[0].support
        );
    }
    Ok(EvaluationReport { categories: reports })
}

/// Predicts `messages` with `classifier` and scores every category.
pub fn evaluate<E: Estimator, S: AsRef<str>>(
    classifier: &Classifier<E>,
    messages: &[S],
    labels: ArrayView2<'_, u8>,
) -> Result<EvaluationReport, ClassifierError> {
    if labels.nrows() != messages.len() {
        return Err(ClassifierError::validation(format!(
            "Got {} messages but {} label rows",
            messages.len(),
            labels.nrows()
        )));
    }
    let predicted = classifier.predict_batch(messages)?;
    let report = evaluate_predictions(classifier.categories(), labels, predicted.view())?;
    info!(
        "Evaluated {} messages: mean macro F1 {:.4}, mean accuracy {:.4}",
        messages.len(),
        report.mean_macro_f1(),
        report.mean_accuracy()
    );
    Ok(report)
}
