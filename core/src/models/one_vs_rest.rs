//! One-vs-rest decomposition over any binary-capable classifier.
//!
//! One sub-model per class is fitted on "this class (1) vs the rest (0)".
//! Decision score for a class is its sub-model's probability of 1; the
//! prediction is the highest score, probabilities are the scores
//! normalised to sum to 1.

use crate::{
    classifier::{check_feature_count, normalize_rows, ClassIndex, Classifier, FittedModel},
    error::HeistResult,
    types::Label,
};
use ndarray::{Array2, ArrayView2};

#[derive(Debug)]
pub struct OneVsRest {
    inner: Box<dyn Classifier>,
}

impl OneVsRest {
    pub fn new(inner: Box<dyn Classifier>) -> Self {
        Self { inner }
    }
}

impl Classifier for OneVsRest {
    fn name(&self) -> &'static str {
        "one_vs_rest"
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>> {
        let index = ClassIndex::from_labels(y)?;
        let estimators = index
            .classes()
            .iter()
            .map(|class| {
                let binary: Vec<Label> = y.iter().map(|l| Label::from(l == class)).collect();
                self.inner.fit(x, &binary)
            })
            .collect::<HeistResult<Vec<_>>>()?;

        log::debug!(
            "one_vs_rest: fitted {} {} sub-models",
            estimators.len(),
            self.inner.name()
        );
        Ok(Box::new(FittedOneVsRest {
            classes: index.into_classes(),
            n_features: x.ncols(),
            estimators,
        }))
    }
}

#[derive(Debug)]
pub struct FittedOneVsRest {
    classes:    Vec<Label>,
    n_features: usize,
    estimators: Vec<Box<dyn FittedModel>>,
}

impl FittedModel for FittedOneVsRest {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn decision_function(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>> {
        check_feature_count(self.n_features, x)?;
        let mut scores = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (k, estimator) in self.estimators.iter().enumerate() {
            let proba = estimator.predict_proba(x)?;
            // sub-model classes are [0, 1]; positive is the last column
            let positive = estimator.classes().iter().position(|&c| c == 1).unwrap_or(proba.ncols() - 1);
            scores.column_mut(k).assign(&proba.column(positive));
        }
        Ok(scores)
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>> {
        let mut scores = self.decision_function(x)?;
        normalize_rows(&mut scores);
        Ok(scores)
    }
}
