//! Brute-force k-nearest-neighbours vote.

use crate::{
    classifier::{check_feature_count, check_training_input, ClassIndex, Classifier, FittedModel},
    error::{HeistError, HeistResult},
    types::Label,
};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborWeights {
    #[default]
    Uniform,
    /// Votes weighted by inverse distance; exact matches take the vote.
    Distance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KNeighborsParams {
    pub n_neighbors: usize,
    pub weights:     NeighborWeights,
}

impl Default for KNeighborsParams {
    fn default() -> Self {
        Self { n_neighbors: 5, weights: NeighborWeights::Uniform }
    }
}

#[derive(Debug, Clone)]
pub struct KNeighbors {
    params: KNeighborsParams,
}

impl KNeighbors {
    pub fn new(params: KNeighborsParams) -> HeistResult<Self> {
        if params.n_neighbors == 0 {
            return Err(HeistError::InvalidHyperparameter {
                param:  "n_neighbors",
                reason: "must be at least 1".into(),
            });
        }
        Ok(Self { params })
    }
}

impl Classifier for KNeighbors {
    fn name(&self) -> &'static str {
        "k_neighbors"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>> {
        check_training_input(x, y)?;
        if x.nrows() < self.params.n_neighbors {
            return Err(HeistError::DegenerateTarget {
                reason: format!(
                    "n_neighbors is {} but only {} training rows",
                    self.params.n_neighbors,
                    x.nrows()
                ),
            });
        }
        let index = ClassIndex::from_labels(y)?;
        Ok(Box::new(FittedKNeighbors {
            encoded: index.encode(y)?,
            classes: index.into_classes(),
            points:  x.to_owned(),
            params:  self.params.clone(),
        }))
    }
}

#[derive(Debug)]
pub struct FittedKNeighbors {
    classes: Vec<Label>,
    encoded: Vec<usize>,
    points:  Array2<f64>,
    params:  KNeighborsParams,
}

impl FittedModel for FittedKNeighbors {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.points.ncols()
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>> {
        check_feature_count(self.points.ncols(), x)?;
        let k = self.params.n_neighbors;
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.classes.len()));

        for (query, mut out) in x.axis_iter(Axis(0)).zip(proba.axis_iter_mut(Axis(0))) {
            let mut dist: Vec<(f64, usize)> = self
                .points
                .axis_iter(Axis(0))
                .enumerate()
                .map(|(i, p)| {
                    let d2: f64 = p.iter().zip(query.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                    (d2.sqrt(), i)
                })
                .collect();
            dist.select_nth_unstable_by(k - 1, |a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let nearest = &dist[..k];

            let exact = nearest.iter().any(|(d, _)| *d == 0.0);
            for &(d, i) in nearest {
                let vote = match self.params.weights {
                    NeighborWeights::Uniform => 1.0,
                    NeighborWeights::Distance if exact => f64::from(u8::from(d == 0.0)),
                    NeighborWeights::Distance => 1.0 / d,
                };
                out[self.encoded[i]] += vote;
            }
            let total = out.sum();
            out.mapv_inplace(|v| v / total);
        }
        Ok(proba)
    }
}
