//! Multilayer perceptron: ReLU hidden layers, softmax output,
//! cross-entropy loss with L2 penalty, trained by mini-batch Adam.

use crate::{
    classifier::{check_feature_count, check_training_input, softmax_rows, ClassIndex, Classifier, FittedModel},
    error::{HeistError, HeistResult},
    models::{one_hot, Standardizer},
    rng::{RngBank, StreamSlot, StreamRng},
    types::Label,
};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlpParams {
    pub hidden_layer_sizes: Vec<usize>,
    /// L2 penalty.
    pub alpha:              f64,
    pub learning_rate_init: f64,
    pub max_iter:           usize,
    pub batch_size:         usize,
    pub seed:               u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: vec![100],
            alpha:              1e-4,
            learning_rate_init: 1e-3,
            max_iter:           200,
            batch_size:         200,
            seed:               0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Mlp {
    params: MlpParams,
}

impl Mlp {
    pub fn new(params: MlpParams) -> HeistResult<Self> {
        if params.hidden_layer_sizes.contains(&0) {
            return Err(HeistError::InvalidHyperparameter {
                param:  "hidden_layer_sizes",
                reason: "every layer needs at least one unit".into(),
            });
        }
        if !(params.learning_rate_init > 0.0 && params.learning_rate_init.is_finite()) {
            return Err(HeistError::InvalidHyperparameter {
                param:  "learning_rate_init",
                reason: format!("must be positive and finite, got {}", params.learning_rate_init),
            });
        }
        if !(params.alpha >= 0.0 && params.alpha.is_finite()) {
            return Err(HeistError::InvalidHyperparameter {
                param:  "alpha",
                reason: format!("must be non-negative and finite, got {}", params.alpha),
            });
        }
        if params.max_iter == 0 || params.batch_size == 0 {
            return Err(HeistError::InvalidHyperparameter {
                param:  "max_iter",
                reason: "max_iter and batch_size must be at least 1".into(),
            });
        }
        Ok(Self { params })
    }
}

/// Weights and biases of every layer, input to output.
#[derive(Debug, Clone)]
struct Layers {
    weights: Vec<Array2<f64>>,
    biases:  Vec<Array1<f64>>,
}

impl Layers {
    /// Glorot-uniform initialisation.
    fn init(sizes: &[usize], rng: &mut StreamRng) -> Self {
        let mut weights = Vec::new();
        let mut biases = Vec::new();
        for pair in sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = (6.0 / (fan_in + fan_out) as f64).sqrt();
            weights.push(Array2::from_shape_simple_fn((fan_in, fan_out), || rng.uniform(-bound, bound)));
            biases.push(Array1::from_shape_simple_fn(fan_out, || rng.uniform(-bound, bound)));
        }
        Self { weights, biases }
    }

    fn zeros_like(&self) -> Self {
        Self {
            weights: self.weights.iter().map(|w| Array2::zeros(w.raw_dim())).collect(),
            biases:  self.biases.iter().map(|b| Array1::zeros(b.raw_dim())).collect(),
        }
    }

    /// Activations of every layer; the last is the softmax output.
    fn forward(&self, input: Array2<f64>) -> Vec<Array2<f64>> {
        let last = self.weights.len() - 1;
        let mut activations = vec![input];
        for (l, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let mut z = activations[l].dot(w) + b;
            if l == last {
                softmax_rows(&mut z);
            } else {
                z.mapv_inplace(|v| v.max(0.0));
            }
            activations.push(z);
        }
        activations
    }

    /// Gradients of mean cross-entropy plus L2 over a batch.
    fn backward(&self, activations: &[Array2<f64>], target: &Array2<f64>, alpha: f64) -> Self {
        let m = target.nrows() as f64;
        let mut grads = self.zeros_like();
        let mut delta = (&activations[self.weights.len()] - target) / m;
        for l in (0..self.weights.len()).rev() {
            grads.weights[l] = activations[l].t().dot(&delta) + &self.weights[l] * (alpha / m);
            grads.biases[l] = delta.sum_axis(Axis(0));
            if l > 0 {
                let mut upstream = delta.dot(&self.weights[l].t());
                ndarray::Zip::from(&mut upstream)
                    .and(&activations[l])
                    .for_each(|d, &a| if a <= 0.0 { *d = 0.0 });
                delta = upstream;
            }
        }
        grads
    }
}

struct Adam {
    first:  Layers,
    second: Layers,
    step:   i32,
}

impl Adam {
    fn new(layers: &Layers) -> Self {
        Self { first: layers.zeros_like(), second: layers.zeros_like(), step: 0 }
    }

    fn update(&mut self, layers: &mut Layers, grads: &Layers, lr: f64) {
        self.step += 1;
        let rate = lr * (1.0 - BETA2.powi(self.step)).sqrt() / (1.0 - BETA1.powi(self.step));
        for l in 0..layers.weights.len() {
            adam_step(&mut layers.weights[l], &mut self.first.weights[l], &mut self.second.weights[l], &grads.weights[l], rate);
            adam_step(&mut layers.biases[l], &mut self.first.biases[l], &mut self.second.biases[l], &grads.biases[l], rate);
        }
    }
}

fn adam_step<D: ndarray::Dimension>(
    param: &mut ndarray::Array<f64, D>,
    m: &mut ndarray::Array<f64, D>,
    v: &mut ndarray::Array<f64, D>,
    grad: &ndarray::Array<f64, D>,
    rate: f64,
) {
    ndarray::Zip::from(param)
        .and(m)
        .and(v)
        .and(grad)
        .for_each(|p, m, v, &g| {
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            *p -= rate * *m / (v.sqrt() + EPSILON);
        });
}

impl Classifier for Mlp {
    fn name(&self) -> &'static str {
        "mlp"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>> {
        check_training_input(x, y)?;
        let index = ClassIndex::from_labels(y)?;
        let target = one_hot(&index.encode(y)?, index.len());
        let scaler = Standardizer::fit(x);
        let xs = scaler.transform(x);
        let p = &self.params;

        let mut sizes = vec![x.ncols()];
        sizes.extend(&p.hidden_layer_sizes);
        sizes.push(index.len());

        let mut rng = RngBank::new(p.seed).for_stream(StreamSlot::Mlp);
        let mut layers = Layers::init(&sizes, &mut rng);
        let mut adam = Adam::new(&layers);
        let mut order: Vec<usize> = (0..x.nrows()).collect();
        let batch = p.batch_size.min(x.nrows());

        for _ in 0..p.max_iter {
            rng.shuffle(&mut order);
            for chunk in order.chunks(batch) {
                let activations = layers.forward(xs.select(Axis(0), chunk));
                let grads = layers.backward(&activations, &target.select(Axis(0), chunk), p.alpha);
                adam.update(&mut layers, &grads, p.learning_rate_init);
            }
        }

        Ok(Box::new(FittedMlp {
            classes: index.into_classes(),
            n_features: x.ncols(),
            scaler,
            layers,
        }))
    }
}

#[derive(Debug)]
pub struct FittedMlp {
    classes:    Vec<Label>,
    n_features: usize,
    scaler:     Standardizer,
    layers:     Layers,
}

impl FittedModel for FittedMlp {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>> {
        check_feature_count(self.n_features, x)?;
        let mut activations = self.layers.forward(self.scaler.transform(x));
        Ok(activations.pop().unwrap_or_default())
    }
}
