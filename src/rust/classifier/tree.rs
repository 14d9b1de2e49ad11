use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::ClassifierError;
use super::estimator::{check_fit_input, Estimator};
use crate::features::FeatureMatrix;

/// Values closer than this are treated as equal when searching thresholds.
const FEATURE_THRESHOLD: f64 = 1e-7;
const IMPURITY_EPSILON: f64 = 1e-12;

/// Impurity measure used to rank candidate splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    Gini,
    Entropy,
}

impl Criterion {
    fn impurity(self, weights: [f64; 2]) -> f64 {
        let total = weights[0] + weights[1];
        if total <= 0.0 {
            return 0.0;
        }
        let p = [weights[0] / total, weights[1] / total];
        match self {
            Criterion::Gini => 1.0 - p[0] * p[0] - p[1] * p[1],
            Criterion::Entropy => p
                .iter()
                .filter(|&&pk| pk > 0.0)
                .map(|&pk| -pk * pk.log2())
                .sum(),
        }
    }
}

/// How many features to consider when looking for the best split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    All,
    Count(usize),
    Fraction(f64),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match *self {
            MaxFeatures::Sqrt => n.sqrt() as usize,
            MaxFeatures::Log2 => {
                if n_features > 0 {
                    n.log2() as usize
                } else {
                    0
                }
            }
            MaxFeatures::All => n_features,
            MaxFeatures::Count(k) => k,
            MaxFeatures::Fraction(f) => (f * n) as usize,
        };
        k.clamp(1, n_features.max(1))
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        match *self {
            MaxFeatures::Count(0) => Err(ClassifierError::configuration("max_features count must be positive")),
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(ClassifierError::configuration(
                format!("max_features fraction must be in (0, 1], got {}", f),
            )),
            _ => Ok(()),
        }
    }
}

/// Growth limits for a single decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeParams {
    pub criterion: Criterion,
    /// `None` grows until leaves are pure or too small to split.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            criterion: Criterion::Gini,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
        }
    }
}

impl TreeParams {
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.max_depth == Some(0) {
            return Err(ClassifierError::configuration("max_depth must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(ClassifierError::configuration(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(ClassifierError::configuration("min_samples_leaf must be at least 1"));
        }
        self.max_features.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Node {
    Leaf {
        /// Weighted fraction of positive samples that reached this leaf.
        proba: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree. Rows go left when `x[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct TreeModel {
    nodes: Vec<Node>,
    n_features: usize,
}

impl TreeModel {
    /// Grows a tree on the rows with positive `weights` (bootstrap counts or ones).
    pub(crate) fn grow(
        x: &FeatureMatrix,
        y: ArrayView1<'_, u8>,
        weights: &[f64],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Result<TreeModel, ClassifierError> {
        params.validate()?;
        if weights.len() != x.n_rows() {
            return Err(ClassifierError::fit(format!(
                "Expected {} sample weights, got {}",
                x.n_rows(),
                weights.len()
            )));
        }
        let grower = Grower {
            x,
            y: y.view(),
            weights,
            params,
            max_features: params.max_features.resolve(x.n_cols()),
        };
        Ok(TreeModel {
            nodes: grower.grow(rng),
            n_features: x.n_cols(),
        })
    }

    pub(crate) fn n_features(&self) -> usize {
        self.n_features
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Node::Split { left, right, .. } = self.nodes[id] {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        max_depth
    }

    /// Probability of the positive class for row `row` of `x`.
    pub(crate) fn proba(&self, x: &FeatureMatrix, row: usize) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes[id] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if x.get(row, feature) <= threshold { left } else { right };
                }
            }
        }
    }

    /// Checks the tree reads `n_features` columns, child links point forward
    /// inside the node table and leaf probabilities lie in [0, 1].
    pub(crate) fn validate(&self, n_features: usize) -> Result<(), ClassifierError> {
        if self.nodes.is_empty() {
            return Err(ClassifierError::configuration("Decision tree has no nodes"));
        }
        if self.n_features != n_features {
            return Err(ClassifierError::configuration(format!(
                "Decision tree expects {} features but the model reads {}",
                self.n_features, n_features
            )));
        }
        for (id, node) in self.nodes.iter().enumerate() {
            let valid = match *node {
                Node::Leaf { proba } => (0.0..=1.0).contains(&proba),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    feature < self.n_features
                        && !threshold.is_nan()
                        && left > id
                        && right > id
                        && left < self.nodes.len()
                        && right < self.nodes.len()
                }
            };
            if !valid {
                return Err(ClassifierError::configuration(format!(
                    "Decision tree node {} is malformed",
                    id
                )));
            }
        }
        Ok(())
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted mean impurity of the two children.
    impurity: f64,
}

enum FeatureSearch {
    Constant,
    Searched(Option<SplitCandidate>),
}

struct SortedPoint {
    value: f64,
    weights: [f64; 2],
    count: usize,
}

struct Grower<'a> {
    x: &'a FeatureMatrix,
    y: ArrayView1<'a, u8>,
    weights: &'a [f64],
    params: &'a TreeParams,
    max_features: usize,
}

impl<'a> Grower<'a> {
    fn grow(&self, rng: &mut StdRng) -> Vec<Node> {
        let root: Vec<usize> = (0..self.x.n_rows()).filter(|&i| self.weights[i] > 0.0).collect();
        let mut nodes = vec![Node::Leaf { proba: 0.0 }];
        let mut pending = vec![(0usize, root, 0usize)];

        while let Some((id, samples, depth)) = pending.pop() {
            let totals = self.class_weights(&samples);
            let total = totals[0] + totals[1];
            let proba = if total > 0.0 { totals[1] / total } else { 0.0 };

            let split = if self.is_leaf(samples.len(), totals, depth) {
                None
            } else {
                self.best_split(&samples, totals, rng)
            };

            match split {
                None => nodes[id] = Node::Leaf { proba },
                Some(split) => {
                    let (left, right): (Vec<usize>, Vec<usize>) = samples
                        .iter()
                        .copied()
                        .partition(|&row| self.x.get(row, split.feature) <= split.threshold);
                    let left_id = nodes.len();
                    let right_id = left_id + 1;
                    nodes.push(Node::Leaf { proba });
                    nodes.push(Node::Leaf { proba });
                    nodes[id] = Node::Split {
                        feature: split.feature,
                        threshold: split.threshold,
                        left: left_id,
                        right: right_id,
                    };
                    pending.push((right_id, right, depth + 1));
                    pending.push((left_id, left, depth + 1));
                }
            }
        }
        nodes
    }

    fn class_weights(&self, samples: &[usize]) -> [f64; 2] {
        let mut totals = [0.0; 2];
        for &row in samples {
            totals[self.y[row] as usize] += self.weights[row];
        }
        totals
    }

    fn is_leaf(&self, n_samples: usize, totals: [f64; 2], depth: usize) -> bool {
        self.params.max_depth.map_or(false, |max| depth >= max)
            || n_samples < self.params.min_samples_split
            || n_samples < 2 * self.params.min_samples_leaf
            || totals[0] <= 0.0
            || totals[1] <= 0.0
    }

    /// Visits features in random order until `max_features` non-constant
    /// ones have been searched. Features with no stored value in the node
    /// are constant zero and never visited.
    fn best_split(&self, samples: &[usize], totals: [f64; 2], rng: &mut StdRng) -> Option<SplitCandidate> {
        let mut columns: HashMap<usize, Vec<(f64, usize)>> = HashMap::new();
        for &row in samples {
            let (indices, values) = self.x.row(row);
            for (&j, &v) in indices.iter().zip(values) {
                columns.entry(j).or_default().push((v, row));
            }
        }
        let mut features: Vec<usize> = columns.keys().copied().collect();
        features.sort_unstable();
        features.shuffle(rng);

        let mut visited = 0;
        let mut best: Option<SplitCandidate> = None;
        for feature in features {
            if visited >= self.max_features {
                break;
            }
            let mut entries = columns.remove(&feature).unwrap_or_default();
            match self.search_feature(feature, &mut entries, samples.len(), totals) {
                FeatureSearch::Constant => continue,
                FeatureSearch::Searched(candidate) => {
                    visited += 1;
                    if let Some(candidate) = candidate {
                        let better = best
                            .as_ref()
                            .map_or(true, |b| candidate.impurity < b.impurity - IMPURITY_EPSILON);
                        if better {
                            best = Some(candidate);
                        }
                    }
                }
            }
        }
        best
    }

    fn search_feature(
        &self,
        feature: usize,
        entries: &mut [(f64, usize)],
        n_node: usize,
        totals: [f64; 2],
    ) -> FeatureSearch {
        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        let zero_count = n_node - entries.len();
        let (first, last) = match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => (first.0, last.0),
            _ => return FeatureSearch::Constant,
        };
        if zero_count == 0 && last - first <= FEATURE_THRESHOLD {
            return FeatureSearch::Constant;
        }

        let mut nonzero = [0.0; 2];
        for &(_, row) in entries.iter() {
            nonzero[self.y[row] as usize] += self.weights[row];
        }

        // implicit zeros are merged into the sorted order as a single point
        let negatives = entries.partition_point(|&(v, _)| v < 0.0);
        let mut points = Vec::with_capacity(entries.len() + 1);
        let point = |&(value, row): &(f64, usize)| {
            let mut weights = [0.0; 2];
            weights[self.y[row] as usize] = self.weights[row];
            SortedPoint { value, weights, count: 1 }
        };
        points.extend(entries[..negatives].iter().map(point));
        if zero_count > 0 {
            points.push(SortedPoint {
                value: 0.0,
                weights: [totals[0] - nonzero[0], totals[1] - nonzero[1]],
                count: zero_count,
            });
        }
        points.extend(entries[negatives..].iter().map(point));

        let total_weight = totals[0] + totals[1];
        let min_leaf = self.params.min_samples_leaf;
        let mut left = [0.0; 2];
        let mut left_count = 0;
        let mut best: Option<SplitCandidate> = None;

        for i in 0..points.len() - 1 {
            left[0] += points[i].weights[0];
            left[1] += points[i].weights[1];
            left_count += points[i].count;

            let (current, next) = (points[i].value, points[i + 1].value);
            if next <= current + FEATURE_THRESHOLD {
                continue;
            }
            let right_count = n_node - left_count;
            if left_count < min_leaf || right_count < min_leaf {
                continue;
            }
            let right = [totals[0] - left[0], totals[1] - left[1]];
            let (left_weight, right_weight) = (left[0] + left[1], right[0] + right[1]);
            if left_weight <= 0.0 || right_weight <= 0.0 {
                continue;
            }

            let impurity = (left_weight * self.params.criterion.impurity(left)
                + right_weight * self.params.criterion.impurity(right))
                / total_weight;
            let mut threshold = current / 2.0 + next / 2.0;
            if threshold >= next || !threshold.is_finite() {
                threshold = current;
            }
            let better = best
                .as_ref()
                .map_or(true, |b| impurity < b.impurity - IMPURITY_EPSILON);
            if better {
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        FeatureSearch::Searched(best)
    }
}

/// A single CART decision tree over all training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    params: TreeParams,
    model: Option<TreeModel>,
}

impl DecisionTree {
    pub fn new() -> Self {
        Self::with_params(TreeParams::default())
    }

    pub fn depth(&self) -> Option<usize> {
        self.model.as_ref().map(TreeModel::depth)
    }

    pub fn node_count(&self) -> Option<usize> {
        self.model.as_ref().map(TreeModel::node_count)
    }

    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Array1<f64>, ClassifierError> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| ClassifierError::PredictionError("Decision tree is not fitted".into()))?;
        if x.n_cols() != model.n_features() {
            return Err(ClassifierError::configuration(format!(
                "Decision tree expects {} features, got {}",
                model.n_features(),
                x.n_cols()
            )));
        }
        Ok(Array1::from_iter((0..x.n_rows()).map(|i| model.proba(x, i))))
    }
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for DecisionTree {
    type Params = TreeParams;

    fn with_params(params: TreeParams) -> Self {
        Self { params, model: None }
    }

    fn params(&self) -> &TreeParams {
        &self.params
    }

    fn fit(&mut self, x: &FeatureMatrix, y: ArrayView1<'_, u8>, seed: u64) -> Result<(), ClassifierError> {
        self.model = None;
        check_fit_input(x, y)?;
        let weights = vec![1.0; x.n_rows()];
        let mut rng = StdRng::seed_from_u64(seed);
        self.model = Some(TreeModel::grow(x, y, &weights, &self.params, &mut rng)?);
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> Result<Array1<u8>, ClassifierError> {
        Ok(self.predict_proba(x)?.mapv(|p| u8::from(p > 0.5)))
    }

    fn is_fitted(&self) -> bool {
        self.model.is_some()
    }

    fn validate(&self, n_features: usize) -> Result<(), ClassifierError> {
        self.model
            .as_ref()
            .ok_or_else(|| ClassifierError::configuration("Decision tree is not fitted"))?
            .validate(n_features)
    }
}
