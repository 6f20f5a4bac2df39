//! Linear classifiers on standardized features.
//!
//! All four share one fitted form (`FittedLinear`): a coefficient matrix
//! with one column per class, an intercept per class, and the link used
//! to turn decision scores into probabilities. Only logistic regression
//! is natively probabilistic; ridge, SGD and linear SVC expose a
//! normalised link of their margins so they still satisfy the
//! `predict_proba` contract, while `predict` uses the raw margins.

use crate::{
    classifier::{
        check_feature_count, check_training_input, normalize_rows, sigmoid, softmax_rows,
        ClassIndex, ClassWeight, Classifier, FittedModel,
    },
    error::{HeistError, HeistResult},
    models::{one_hot, Standardizer},
    rng::{RngBank, StreamSlot},
    types::Label,
};
use ndarray::{s, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

// ── Hyperparameters ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiClass {
    /// One sigmoid per class, probabilities renormalised.
    Ovr,
    /// Single softmax over all classes.
    #[default]
    Multinomial,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticParams {
    /// Inverse regularisation strength.
    pub c:            f64,
    pub max_iter:     usize,
    pub class_weight: ClassWeight,
    pub multi_class:  MultiClass,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c:            1.0,
            max_iter:     300,
            class_weight: ClassWeight::Uniform,
            multi_class:  MultiClass::Multinomial,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeParams {
    pub alpha:        f64,
    pub class_weight: ClassWeight,
}

impl Default for RidgeParams {
    fn default() -> Self {
        Self { alpha: 1.0, class_weight: ClassWeight::Uniform }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdParams {
    pub alpha:        f64,
    pub epochs:       usize,
    pub eta0:         f64,
    pub class_weight: ClassWeight,
    pub seed:         u64,
}

impl Default for SgdParams {
    fn default() -> Self {
        Self {
            alpha:        1e-4,
            epochs:       20,
            eta0:         0.01,
            class_weight: ClassWeight::Uniform,
            seed:         0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearSvcParams {
    pub c:            f64,
    pub max_iter:     usize,
    pub class_weight: ClassWeight,
}

impl Default for LinearSvcParams {
    fn default() -> Self {
        Self { c: 1.0, max_iter: 500, class_weight: ClassWeight::Uniform }
    }
}

fn require_positive(param: &'static str, value: f64) -> HeistResult<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(HeistError::InvalidHyperparameter {
            param,
            reason: format!("must be positive, got {value}"),
        })
    }
}

fn require_iterations(param: &'static str, value: usize) -> HeistResult<()> {
    if value == 0 {
        return Err(HeistError::InvalidHyperparameter {
            param,
            reason: "must be at least 1".into(),
        });
    }
    Ok(())
}

// ── Fitted form ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Softmax,
    Sigmoid,
}

#[derive(Debug)]
pub struct FittedLinear {
    classes:    Vec<Label>,
    n_features: usize,
    scaler:     Standardizer,
    coef:       Array2<f64>,
    intercept:  Array1<f64>,
    link:       Link,
}

impl FittedModel for FittedLinear {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn decision_function(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>> {
        check_feature_count(self.n_features, x)?;
        Ok(self.scaler.transform(x).dot(&self.coef) + &self.intercept)
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>> {
        let mut scores = self.decision_function(x)?;
        match self.link {
            Link::Softmax => softmax_rows(&mut scores),
            Link::Sigmoid => {
                scores.mapv_inplace(sigmoid);
                normalize_rows(&mut scores);
            }
        }
        Ok(scores)
    }
}

/// Standardized design matrix, class index and per-row weights.
struct Prepared {
    index:   ClassIndex,
    encoded: Vec<usize>,
    scaler:  Standardizer,
    xs:      Array2<f64>,
    weights: Array1<f64>,
}

fn prepare(x: ArrayView2<'_, f64>, y: &[Label], class_weight: ClassWeight) -> HeistResult<Prepared> {
    check_training_input(x, y)?;
    let index = ClassIndex::from_labels(y)?;
    let encoded = index.encode(y)?;
    let weights = Array1::from(class_weight.sample_weights(&encoded, index.len()));
    let scaler = Standardizer::fit(x);
    let xs = scaler.transform(x);
    Ok(Prepared { index, encoded, scaler, xs, weights })
}

impl Prepared {
    fn finish(self, coef: Array2<f64>, intercept: Array1<f64>, link: Link) -> Box<dyn FittedModel> {
        Box::new(FittedLinear {
            n_features: self.xs.ncols(),
            classes: self.index.into_classes(),
            scaler: self.scaler,
            coef,
            intercept,
            link,
        })
    }

    /// ±1 target per class column.
    fn signed_targets(&self) -> Array2<f64> {
        one_hot(&self.encoded, self.index.len()).mapv(|v| if v > 0.0 { 1.0 } else { -1.0 })
    }

    fn max_row_norm_sq(&self) -> f64 {
        self.xs
            .axis_iter(Axis(0))
            .map(|row| row.dot(&row))
            .fold(1e-12, f64::max)
    }
}

// ── Logistic regression ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    params: LogisticParams,
}

impl LogisticRegression {
    pub fn new(params: LogisticParams) -> HeistResult<Self> {
        require_positive("c", params.c)?;
        require_iterations("max_iter", params.max_iter)?;
        Ok(Self { params })
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>> {
        let prep = prepare(x, y, self.params.class_weight)?;
        let link = match self.params.multi_class {
            MultiClass::Multinomial => Link::Softmax,
            MultiClass::Ovr => Link::Sigmoid,
        };
        let targets = one_hot(&prep.encoded, prep.index.len());
        let total = prep.weights.sum();
        let reg = 1.0 / (self.params.c * total);
        // step below 1/L for the weighted-mean loss
        let step = 1.0 / (0.5 * prep.max_row_norm_sq() + reg);

        let shares = (&prep.weights / total).insert_axis(Axis(1));
        let (d, k) = (prep.xs.ncols(), prep.index.len());
        let mut coef = Array2::<f64>::zeros((d, k));
        let mut intercept = Array1::<f64>::zeros(k);
        for _ in 0..self.params.max_iter {
            let mut prob = prep.xs.dot(&coef) + &intercept;
            match link {
                Link::Softmax => softmax_rows(&mut prob),
                Link::Sigmoid => prob.mapv_inplace(sigmoid),
            }
            let err = (prob - &targets) * &shares;
            let grad_w = prep.xs.t().dot(&err) + &coef * reg;
            let grad_b = err.sum_axis(Axis(0));
            coef.scaled_add(-step, &grad_w);
            intercept.scaled_add(-step, &grad_b);
        }
        Ok(prep.finish(coef, intercept, link))
    }
}

// ── Ridge classifier ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RidgeClassifier {
    params: RidgeParams,
}

impl RidgeClassifier {
    pub fn new(params: RidgeParams) -> HeistResult<Self> {
        if !(params.alpha >= 0.0) {
            return Err(HeistError::InvalidHyperparameter {
                param:  "alpha",
                reason: format!("must be non-negative, got {}", params.alpha),
            });
        }
        Ok(Self { params })
    }
}

impl Classifier for RidgeClassifier {
    fn name(&self) -> &'static str {
        "ridge"
    }

    /// Weighted least squares on ±1 targets with an unpenalised intercept.
    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>> {
        let prep = prepare(x, y, self.params.class_weight)?;
        let (n, d) = prep.xs.dim();

        let mut design = Array2::<f64>::ones((n, d + 1));
        design.slice_mut(s![.., ..d]).assign(&prep.xs);
        let weighted = &design * &prep.weights.view().insert_axis(Axis(1));

        let mut gram = design.t().dot(&weighted);
        for j in 0..d {
            gram[[j, j]] += self.params.alpha;
        }
        let rhs = weighted.t().dot(&prep.signed_targets());
        let theta = solve(gram, rhs)?;

        let coef = theta.slice(s![..d, ..]).to_owned();
        let intercept = theta.row(d).to_owned();
        Ok(prep.finish(coef, intercept, Link::Softmax))
    }
}

/// Gaussian elimination with partial pivoting; `a` is square.
fn solve(mut a: Array2<f64>, mut b: Array2<f64>) -> HeistResult<Array2<f64>> {
    let n = a.nrows();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(HeistError::DegenerateTarget {
                reason: "ridge system is singular".into(),
            });
        }
        if pivot != col {
            for j in 0..n {
                a.swap([col, j], [pivot, j]);
            }
            for j in 0..b.ncols() {
                b.swap([col, j], [pivot, j]);
            }
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                a[[row, j]] -= factor * a[[col, j]];
            }
            for j in 0..b.ncols() {
                b[[row, j]] -= factor * b[[col, j]];
            }
        }
    }
    let mut x = Array2::<f64>::zeros(b.dim());
    for row in (0..n).rev() {
        for j in 0..b.ncols() {
            let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[[k, j]]).sum();
            x[[row, j]] = (b[[row, j]] - tail) / a[[row, row]];
        }
    }
    Ok(x)
}

// ── SGD (hinge loss, one-vs-rest) ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SgdClassifier {
    params: SgdParams,
}

impl SgdClassifier {
    pub fn new(params: SgdParams) -> HeistResult<Self> {
        require_positive("alpha", params.alpha)?;
        require_positive("eta0", params.eta0)?;
        require_iterations("epochs", params.epochs)?;
        Ok(Self { params })
    }
}

impl Classifier for SgdClassifier {
    fn name(&self) -> &'static str {
        "sgd"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>> {
        let prep = prepare(x, y, self.params.class_weight)?;
        let targets = prep.signed_targets();
        let (n, d) = prep.xs.dim();
        let k = prep.index.len();
        let p = &self.params;

        let mut rng = RngBank::new(p.seed).for_stream(StreamSlot::Sgd);
        let mut coef = Array2::<f64>::zeros((d, k));
        let mut intercept = Array1::<f64>::zeros(k);
        let mut order: Vec<usize> = (0..n).collect();
        let mut t = 0.0;
        for _ in 0..p.epochs {
            rng.shuffle(&mut order);
            for &i in &order {
                let eta = p.eta0 / (1.0 + p.alpha * p.eta0 * t);
                let row = prep.xs.row(i);
                for c in 0..k {
                    let yc = targets[[i, c]];
                    let margin = yc * (row.dot(&coef.column(c)) + intercept[c]);
                    coef.column_mut(c).mapv_inplace(|w| w * (1.0 - eta * p.alpha));
                    if margin < 1.0 {
                        let step = eta * prep.weights[i] * yc;
                        coef.column_mut(c).scaled_add(step, &row);
                        intercept[c] += step;
                    }
                }
                t += 1.0;
            }
        }
        Ok(prep.finish(coef, intercept, Link::Sigmoid))
    }
}

// ── Linear SVC (squared hinge, one-vs-rest) ──────────────────────────────────

#[derive(Debug, Clone)]
pub struct LinearSvc {
    params: LinearSvcParams,
}

impl LinearSvc {
    pub fn new(params: LinearSvcParams) -> HeistResult<Self> {
        require_positive("c", params.c)?;
        require_iterations("max_iter", params.max_iter)?;
        Ok(Self { params })
    }
}

impl Classifier for LinearSvc {
    fn name(&self) -> &'static str {
        "linear_svc"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>> {
        let prep = prepare(x, y, self.params.class_weight)?;
        let targets = prep.signed_targets();
        let total = prep.weights.sum();
        let reg = 1.0 / (self.params.c * total);
        let step = 1.0 / (2.0 * prep.max_row_norm_sq() + reg);

        let shares = (&prep.weights / total).insert_axis(Axis(1));
        let (d, k) = (prep.xs.ncols(), prep.index.len());
        let mut coef = Array2::<f64>::zeros((d, k));
        let mut intercept = Array1::<f64>::zeros(k);
        for _ in 0..self.params.max_iter {
            let scores = prep.xs.dot(&coef) + &intercept;
            // d/dz of max(0, 1 - y z)^2
            let mut dz = Array2::<f64>::zeros(scores.dim());
            ndarray::Zip::from(&mut dz)
                .and(&scores)
                .and(&targets)
                .for_each(|g, &z, &yc| *g = -2.0 * yc * (1.0 - yc * z).max(0.0));
            let dz = dz * &shares;
            let grad_w = prep.xs.t().dot(&dz) + &coef * reg;
            let grad_b = dz.sum_axis(Axis(0));
            coef.scaled_add(-step, &grad_w);
            intercept.scaled_add(-step, &grad_b);
        }
        Ok(prep.finish(coef, intercept, Link::Sigmoid))
    }
}
