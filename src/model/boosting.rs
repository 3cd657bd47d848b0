//! Gradient-boosted regression trees with a squared-error loss.
//!
//! Each stage fits a depth-limited regression tree to the current residuals and adds
//! it to the ensemble scaled by the learning rate. Rows can be subsampled per stage
//! (stochastic boosting); the sampler is seeded so fits are reproducible.

use crate::model::error::ModelError;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Boosting hyper-parameters.
///
/// `Default` is the deployment configuration; [`BoosterParams::cross_validation`] is
/// the lighter one used inside leave-one-station-out runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows drawn (without replacement) for each stage, in `(0, 1]`.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 150,
            max_depth: 3,
            learning_rate: 0.08,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 42,
        }
    }
}

impl BoosterParams {
    pub fn cross_validation() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn predict(&self, x: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    residuals: &'a [f64],
    n_features: usize,
    params: &'a BoosterParams,
}

impl TreeBuilder<'_> {
    fn build(&self, rows: Vec<usize>, depth: usize) -> Node {
        let total: f64 = rows.iter().map(|&i| self.residuals[i]).sum();
        let mean = total / rows.len() as f64;

        if depth >= self.params.max_depth || rows.len() < self.params.min_samples_split.max(2) {
            return Node::Leaf(mean);
        }
        let Some(best) = self.best_split(&rows, total) else {
            return Node::Leaf(mean);
        };

        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.x[i][best.feature] <= best.threshold);

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(left, depth + 1)),
            right: Box::new(self.build(right, depth + 1)),
        }
    }

    /// Split maximizing the reduction of the sum of squared residuals.
    fn best_split(&self, rows: &[usize], total: f64) -> Option<SplitCandidate> {
        let n = rows.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_score = total * total / n as f64;
        let mut best: Option<SplitCandidate> = None;
        let mut sorted = rows.to_vec();

        for feature in 0..self.n_features {
            sorted.sort_by_key(|&i| OrderedFloat(self.x[i][feature]));
            let mut left_sum = 0.0;
            for pos in 0..n - 1 {
                left_sum += self.residuals[sorted[pos]];
                let n_left = pos + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let here = self.x[sorted[pos]][feature];
                let next = self.x[sorted[pos + 1]][feature];
                if here == next {
                    continue;
                }
                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / n_left as f64
                    + right_sum * right_sum / n_right as f64
                    - parent_score;
                if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// An additive ensemble of regression trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedRegressor {
    n_features: usize,
    base_score: f64,
    learning_rate: f64,
    trees: Vec<Node>,
}

impl GradientBoostedRegressor {
    /// Fits the ensemble to `x` (one row per sample) and targets `y`.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] for empty input, mismatched lengths, ragged rows or
    /// non-finite values.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &BoosterParams) -> Result<Self, ModelError> {
        let n_features = validate_training_set(x, y)?;
        let n = y.len();
        let base_score = y.iter().sum::<f64>() / n as f64;
        let mut predictions = vec![base_score; n];
        let mut rng = StdRng::seed_from_u64(params.seed);
        let sample_size = ((n as f64 * params.subsample.clamp(0.0, 1.0)).round() as usize).clamp(1, n);

        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = y.iter().zip(&predictions).map(|(t, p)| t - p).collect();
            let rows = if sample_size < n {
                rand::seq::index::sample(&mut rng, n, sample_size).into_vec()
            } else {
                (0..n).collect()
            };
            let tree = TreeBuilder {
                x,
                residuals: &residuals,
                n_features,
                params,
            }
            .build(rows, 0);

            for (p, row) in predictions.iter_mut().zip(x) {
                *p += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);
        }

        Ok(Self {
            n_features,
            base_score,
            learning_rate: params.learning_rate,
            trees,
        })
    }

    /// Predicts one sample.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::FeatureCountMismatch`] if `features` does not have the
    /// length the model was trained with.
    pub fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.n_features {
            return Err(ModelError::FeatureCountMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        Ok(self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(features)).sum::<f64>())
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

fn validate_training_set(x: &[Vec<f64>], y: &[f64]) -> Result<usize, ModelError> {
    if x.is_empty() || y.is_empty() {
        return Err(ModelError::EmptyTrainingSet);
    }
    if x.len() != y.len() {
        return Err(ModelError::LengthMismatch {
            features: x.len(),
            targets: y.len(),
        });
    }
    let width = x[0].len();
    for (i, (row, target)) in x.iter().zip(y).enumerate() {
        if row.len() != width {
            return Err(ModelError::RaggedRow {
                row: i,
                expected: width,
                actual: row.len(),
            });
        }
        if !target.is_finite() || row.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite(i));
        }
    }
    Ok(width)
}
