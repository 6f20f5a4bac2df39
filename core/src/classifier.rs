//! Classifier capability: the seam every algorithm plugs into.
//!
//! RULE: Fitting never mutates the classifier. `fit` consumes
//! hyperparameters by reference and returns a new FittedModel, which
//! is immutable from then on (write-once, read-many).
//!
//! The search harness and the hierarchical predictor only ever see
//! these two traits; which algorithm sits behind them is configuration.

use crate::{
    error::{HeistError, HeistResult},
    types::Label,
};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A trainable model with fixed hyperparameters.
pub trait Classifier: Debug {
    /// Stable algorithm name, used in logs.
    fn name(&self) -> &'static str;

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>>;
}

/// Learned parameters of a fitted classifier.
pub trait FittedModel: Debug + Send + Sync {
    /// Sorted labels seen at fit time. Columns of `predict_proba` and
    /// `decision_function` follow this order.
    fn classes(&self) -> &[Label];

    /// Number of feature columns seen at fit time.
    fn n_features(&self) -> usize;

    /// Per-class probabilities; each row sums to 1.
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>>;

    /// Per-class decision scores; higher wins.
    fn decision_function(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>> {
        self.predict_proba(x)
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> HeistResult<Vec<Label>> {
        let scores = self.decision_function(x)?;
        let classes = self.classes();
        Ok(scores
            .axis_iter(Axis(0))
            .map(|row| classes[argmax(row)])
            .collect())
    }
}

/// How training rows are weighted by class frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    #[default]
    Uniform,
    /// Class c weighs n / (k * n_c).
    Balanced,
}

impl ClassWeight {
    pub fn sample_weights(&self, encoded: &[usize], n_classes: usize) -> Vec<f64> {
        match self {
            Self::Uniform => vec![1.0; encoded.len()],
            Self::Balanced => {
                let mut counts = vec![0usize; n_classes];
                for &c in encoded {
                    counts[c] += 1;
                }
                let n = encoded.len() as f64;
                let per_class: Vec<f64> = counts
                    .iter()
                    .map(|&count| if count == 0 { 0.0 } else { n / (n_classes as f64 * count as f64) })
                    .collect();
                encoded.iter().map(|&c| per_class[c]).collect()
            }
        }
    }
}

/// Sorted distinct labels of a training target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassIndex {
    classes: Vec<Label>,
}

impl ClassIndex {
    /// Needs at least two distinct classes.
    pub fn from_labels(y: &[Label]) -> HeistResult<Self> {
        let mut classes = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(HeistError::DegenerateTarget {
                reason: format!("need at least 2 classes to fit, got {}", classes.len()),
            });
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[Label] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Column index of each label. A label outside the index is an error.
    pub fn encode(&self, y: &[Label]) -> HeistResult<Vec<usize>> {
        y.iter()
            .map(|l| {
                self.classes.binary_search(l).map_err(|_| HeistError::DegenerateTarget {
                    reason: format!("label {l} is not one of the fitted classes {:?}", self.classes),
                })
            })
            .collect()
    }

    pub fn into_classes(self) -> Vec<Label> {
        self.classes
    }
}

/// Shared input validation for `fit`.
pub fn check_training_input(x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<()> {
    if x.nrows() != y.len() {
        return Err(HeistError::LengthMismatch { left: x.nrows(), right: y.len() });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(HeistError::DegenerateTarget {
            reason: format!("cannot fit on a {}x{} matrix", x.nrows(), x.ncols()),
        });
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(HeistError::DegenerateTarget {
            reason: "training matrix contains non-finite values".into(),
        });
    }
    Ok(())
}

/// Shared input validation for inference.
pub fn check_feature_count(expected: usize, x: ArrayView2<'_, f64>) -> HeistResult<()> {
    if x.ncols() != expected {
        return Err(HeistError::LengthMismatch { left: expected, right: x.ncols() });
    }
    Ok(())
}

/// Index of the largest value; first wins on ties.
pub fn argmax(row: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

/// Row-wise softmax, in place.
pub fn softmax_rows(scores: &mut Array2<f64>) {
    for mut row in scores.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

/// Row-wise normalisation to sum 1; all-zero rows become uniform.
pub fn normalize_rows(scores: &mut Array2<f64>) {
    let k = scores.ncols() as f64;
    for mut row in scores.axis_iter_mut(Axis(0)) {
        let sum = row.sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        } else {
            row.fill(1.0 / k);
        }
    }
}

pub fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}
