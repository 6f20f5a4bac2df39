//! Gradient-boosted regression trees with second-order (gradient/hessian)
//! split gain, in the style of xgboost.
//!
//! Objectives:
//!   - binary:logistic: exactly two classes, one tree per round
//!   - multi:softmax: k classes, k trees per round, num_class required
//!   - multi:softprob: as softmax; identical outputs here

use crate::{
    classifier::{
        check_feature_count, check_training_input, sigmoid, softmax_rows, ClassIndex, Classifier,
        FittedModel,
    },
    error::{HeistError, HeistResult},
    models::one_hot,
    types::Label,
};
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

const MIN_HESSIAN: f64 = 1e-16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    #[serde(rename = "binary:logistic")]
    BinaryLogistic,
    #[serde(rename = "multi:softmax")]
    MultiSoftmax,
    #[serde(rename = "multi:softprob")]
    MultiSoftprob,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostingParams {
    pub objective:        Objective,
    pub n_estimators:     usize,
    pub max_depth:        usize,
    pub learning_rate:    f64,
    pub reg_lambda:       f64,
    pub min_child_weight: f64,
    pub num_class:        Option<usize>,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            objective:        Objective::BinaryLogistic,
            n_estimators:     100,
            max_depth:        6,
            learning_rate:    0.3,
            reg_lambda:       1.0,
            min_child_weight: 1.0,
            num_class:        None,
        }
    }
}

impl BoostingParams {
    pub fn validate(&self) -> HeistResult<()> {
        let invalid = |param: &'static str, reason: String| {
            Err(HeistError::InvalidHyperparameter { param, reason })
        };
        if self.n_estimators == 0 {
            return invalid("n_estimators", "must be at least 1".into());
        }
        if self.max_depth == 0 {
            return invalid("max_depth", "must be at least 1".into());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return invalid("learning_rate", format!("must be positive and finite, got {}", self.learning_rate));
        }
        if !(self.reg_lambda >= 0.0 && self.reg_lambda.is_finite()) {
            return invalid("reg_lambda", format!("must be non-negative and finite, got {}", self.reg_lambda));
        }
        if !(self.min_child_weight >= 0.0 && self.min_child_weight.is_finite()) {
            return invalid(
                "min_child_weight",
                format!("must be non-negative and finite, got {}", self.min_child_weight),
            );
        }
        match (self.objective, self.num_class) {
            (Objective::MultiSoftmax | Objective::MultiSoftprob, None) => {
                invalid("num_class", "multiclass objectives require num_class".into())
            }
            (Objective::MultiSoftmax | Objective::MultiSoftprob, Some(k)) if k < 2 => {
                invalid("num_class", format!("must be at least 2, got {k}"))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    params: BoostingParams,
}

impl GradientBoosting {
    pub fn new(params: BoostingParams) -> HeistResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    fn check_classes(&self, n_classes: usize) -> HeistResult<()> {
        match (self.params.objective, self.params.num_class) {
            (Objective::BinaryLogistic, _) if n_classes != 2 => Err(HeistError::DegenerateTarget {
                reason: format!("binary:logistic needs exactly 2 classes, target has {n_classes}"),
            }),
            (Objective::MultiSoftmax | Objective::MultiSoftprob, Some(k)) if n_classes > k => {
                Err(HeistError::DegenerateTarget {
                    reason: format!("num_class is {k} but target has {n_classes} classes"),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Classifier for GradientBoosting {
    fn name(&self) -> &'static str {
        "gradient_boosting"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>> {
        check_training_input(x, y)?;
        let index = ClassIndex::from_labels(y)?;
        self.check_classes(index.len())?;
        let encoded = index.encode(y)?;
        let n = x.nrows();
        let p = &self.params;

        // binary:logistic keeps a single margin column
        let outputs = if p.objective == Objective::BinaryLogistic { 1 } else { index.len() };
        let target = if outputs == 1 {
            Array2::from_shape_fn((n, 1), |(i, _)| encoded[i] as f64)
        } else {
            one_hot(&encoded, outputs)
        };

        let mut margin = Array2::<f64>::zeros((n, outputs));
        let mut rounds = Vec::with_capacity(p.n_estimators);
        for _ in 0..p.n_estimators {
            let prob = link(&margin);
            let mut round = Vec::with_capacity(outputs);
            for k in 0..outputs {
                let grad: Vec<f64> = (0..n).map(|i| prob[[i, k]] - target[[i, k]]).collect();
                let hess: Vec<f64> = (0..n)
                    .map(|i| {
                        let pk = prob[[i, k]];
                        let h = if outputs == 1 { pk * (1.0 - pk) } else { 2.0 * pk * (1.0 - pk) };
                        h.max(MIN_HESSIAN)
                    })
                    .collect();
                let tree = RegressionTree::grow(x, &grad, &hess, p);
                for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                    margin[[i, k]] += p.learning_rate * tree.value(row);
                }
                round.push(tree);
            }
            rounds.push(round);
        }

        Ok(Box::new(FittedBoosting {
            classes: index.into_classes(),
            n_features: x.ncols(),
            learning_rate: p.learning_rate,
            rounds,
        }))
    }
}

/// Margins → probabilities: sigmoid for one column, softmax otherwise.
fn link(margin: &Array2<f64>) -> Array2<f64> {
    if margin.ncols() == 1 {
        margin.mapv(sigmoid)
    } else {
        let mut prob = margin.clone();
        softmax_rows(&mut prob);
        prob
    }
}

#[derive(Debug)]
pub struct FittedBoosting {
    classes:       Vec<Label>,
    n_features:    usize,
    learning_rate: f64,
    rounds:        Vec<Vec<RegressionTree>>,
}

impl FittedBoosting {
    fn margins(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let outputs = self.rounds.first().map_or(1, Vec::len);
        let mut margin = Array2::<f64>::zeros((x.nrows(), outputs));
        for (i, row) in x.axis_iter(Axis(0)).enumerate() {
            for round in &self.rounds {
                for (k, tree) in round.iter().enumerate() {
                    margin[[i, k]] += self.learning_rate * tree.value(row);
                }
            }
        }
        margin
    }
}

impl FittedModel for FittedBoosting {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>> {
        check_feature_count(self.n_features, x)?;
        let prob = link(&self.margins(x));
        if prob.ncols() == 1 {
            let p1 = prob.column(0);
            return Ok(Array2::from_shape_fn((x.nrows(), 2), |(i, k)| {
                if k == 1 { p1[i] } else { 1.0 - p1[i] }
            }));
        }
        Ok(prob)
    }
}

#[derive(Debug, Clone)]
enum RegressionNode {
    Leaf(f64),
    Split {
        feature:   usize,
        threshold: f64,
        left:      usize,
        right:     usize,
    },
}

#[derive(Debug, Clone)]
struct RegressionTree {
    nodes: Vec<RegressionNode>,
}

impl RegressionTree {
    fn grow(x: ArrayView2<'_, f64>, grad: &[f64], hess: &[f64], params: &BoostingParams) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.build(x, grad, hess, params, (0..x.nrows()).collect(), 0);
        tree
    }

    fn value(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                RegressionNode::Leaf(w) => return *w,
                RegressionNode::Split { feature, threshold, left, right } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    fn build(
        &mut self,
        x: ArrayView2<'_, f64>,
        grad: &[f64],
        hess: &[f64],
        params: &BoostingParams,
        rows: Vec<usize>,
        depth: usize,
    ) -> usize {
        let g: f64 = rows.iter().map(|&r| grad[r]).sum();
        let h: f64 = rows.iter().map(|&r| hess[r]).sum();
        let leaf = -g / (h + params.reg_lambda);

        let split = if depth < params.max_depth && rows.len() >= 2 {
            best_split(x, grad, hess, params, &rows, g, h)
        } else {
            None
        };
        let Some((feature, threshold)) = split else {
            self.nodes.push(RegressionNode::Leaf(leaf));
            return self.nodes.len() - 1;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| x[[r, feature]] <= threshold);
        let id = self.nodes.len();
        self.nodes.push(RegressionNode::Leaf(leaf));
        let left = self.build(x, grad, hess, params, left_rows, depth + 1);
        let right = self.build(x, grad, hess, params, right_rows, depth + 1);
        self.nodes[id] = RegressionNode::Split { feature, threshold, left, right };
        id
    }
}

fn best_split(
    x: ArrayView2<'_, f64>,
    grad: &[f64],
    hess: &[f64],
    params: &BoostingParams,
    rows: &[usize],
    g: f64,
    h: f64,
) -> Option<(usize, f64)> {
    let lambda = params.reg_lambda;
    let parent = g * g / (h + lambda);
    let mut best: Option<(usize, f64, f64)> = None;

    for feature in 0..x.ncols() {
        let mut sorted = rows.to_vec();
        sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
        let (mut gl, mut hl) = (0.0, 0.0);
        for pair in sorted.windows(2) {
            let (r, next) = (pair[0], pair[1]);
            gl += grad[r];
            hl += hess[r];
            let (v, v_next) = (x[[r, feature]], x[[next, feature]]);
            if v_next <= v {
                continue;
            }
            let (gr, hr) = (g - gl, h - hl);
            if hl < params.min_child_weight || hr < params.min_child_weight {
                continue;
            }
            let gain = gl * gl / (hl + lambda) + gr * gr / (hr + lambda) - parent;
            if gain > 1e-12 && best.is_none_or(|(_, _, b)| gain > b) {
                best = Some((feature, v + (v_next - v) / 2.0, gain));
            }
        }
    }
    best.map(|(feature, threshold, _)| (feature, threshold))
}
