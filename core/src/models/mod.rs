//! Concrete classifier capabilities.
//!
//! Every algorithm here implements `Classifier` and returns its own
//! immutable `FittedModel`. None of them is special to the pipeline:
//! the roster in `candidate.rs` decides which ones get trained.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod mlp;
pub mod neighbors;
pub mod one_vs_rest;
mod tree;

pub use boosting::{BoostingParams, GradientBoosting, Objective};
pub use forest::{Forest, ForestKind, ForestParams};
pub use linear::{
    LinearSvc, LinearSvcParams, LogisticParams, LogisticRegression, MultiClass, RidgeClassifier,
    RidgeParams, SgdClassifier, SgdParams,
};
pub use mlp::{Mlp, MlpParams};
pub use neighbors::{KNeighbors, KNeighborsParams, NeighborWeights};
pub use one_vs_rest::OneVsRest;

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Column-wise z-scoring fitted on training data.
/// Constant columns keep a unit scale so they map to zero.
#[derive(Debug, Clone)]
pub(crate) struct Standardizer {
    mean:  Array1<f64>,
    scale: Array1<f64>,
}

impl Standardizer {
    pub(crate) fn fit(x: ArrayView2<'_, f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let mean = x.sum_axis(Axis(0)) / n;
        let mut scale = Array1::zeros(x.ncols());
        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let var = column.iter().map(|v| (v - mean[j]).powi(2)).sum::<f64>() / n;
            scale[j] = if var > 1e-24 { var.sqrt() } else { 1.0 };
        }
        Self { mean, scale }
    }

    pub(crate) fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        (&x - &self.mean) / &self.scale
    }
}

/// One-hot encoding of class indices.
pub(crate) fn one_hot(encoded: &[usize], n_classes: usize) -> Array2<f64> {
    let mut y = Array2::<f64>::zeros((encoded.len(), n_classes));
    for (i, &c) in encoded.iter().enumerate() {
        y[[i, c]] = 1.0;
    }
    y
}
