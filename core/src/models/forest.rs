//! Tree ensembles: bagged random forest and extremely randomized trees.

use crate::{
    classifier::{check_feature_count, check_training_input, ClassIndex, ClassWeight, Classifier, FittedModel},
    error::{HeistError, HeistResult},
    models::tree::{DecisionTree, SplitStrategy, TreeParams},
    rng::{RngBank, StreamSlot},
    types::Label,
};
use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators:      usize,
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub class_weight:      ClassWeight,
    pub seed:              u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators:      100,
            max_depth:         None,
            min_samples_split: 2,
            class_weight:      ClassWeight::Uniform,
            seed:              0,
        }
    }
}

impl ForestParams {
    pub fn balanced() -> Self {
        Self { class_weight: ClassWeight::Balanced, ..Self::default() }
    }

    pub fn validate(&self) -> HeistResult<()> {
        if self.n_estimators == 0 {
            return Err(HeistError::InvalidHyperparameter {
                param:  "n_estimators",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_depth == Some(0) {
            return Err(HeistError::InvalidHyperparameter {
                param:  "max_depth",
                reason: "must be at least 1 when set".into(),
            });
        }
        if self.min_samples_split < 2 {
            return Err(HeistError::InvalidHyperparameter {
                param:  "min_samples_split",
                reason: format!("must be at least 2, got {}", self.min_samples_split),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForestKind {
    /// Bootstrap rows, best split over sqrt(d) features.
    RandomForest,
    /// All rows, random thresholds over sqrt(d) features.
    ExtraTrees,
}

#[derive(Debug, Clone)]
pub struct Forest {
    kind:   ForestKind,
    params: ForestParams,
}

impl Forest {
    pub fn new(kind: ForestKind, params: ForestParams) -> HeistResult<Self> {
        params.validate()?;
        Ok(Self { kind, params })
    }
}

impl Classifier for Forest {
    fn name(&self) -> &'static str {
        match self.kind {
            ForestKind::RandomForest => "random_forest",
            ForestKind::ExtraTrees => "extra_trees",
        }
    }

    fn fit(&self, x: ArrayView2<'_, f64>, y: &[Label]) -> HeistResult<Box<dyn FittedModel>> {
        check_training_input(x, y)?;
        let index = ClassIndex::from_labels(y)?;
        let encoded = index.encode(y)?;
        let base_weights = self.params.class_weight.sample_weights(&encoded, index.len());

        let n = x.nrows();
        let tree_params = TreeParams {
            max_depth:         self.params.max_depth,
            min_samples_split: self.params.min_samples_split,
            max_features:      ((x.ncols() as f64).sqrt() as usize).max(1),
            strategy:          match self.kind {
                ForestKind::RandomForest => SplitStrategy::Best,
                ForestKind::ExtraTrees => SplitStrategy::Random,
            },
        };

        let bank = RngBank::new(self.params.seed);
        let trees = (0..self.params.n_estimators)
            .map(|t| {
                let mut rng = bank.for_member(StreamSlot::Tree, t);
                match self.kind {
                    ForestKind::RandomForest => {
                        let mut draws = vec![0u32; n];
                        for _ in 0..n {
                            draws[rng.next_below(n)] += 1;
                        }
                        let weights: Vec<f64> = base_weights
                            .iter()
                            .zip(&draws)
                            .map(|(w, &d)| w * f64::from(d))
                            .collect();
                        let rows = (0..n).filter(|&i| draws[i] > 0).collect();
                        DecisionTree::grow(x, &encoded, &weights, rows, index.len(), &tree_params, &mut rng)
                    }
                    ForestKind::ExtraTrees => {
                        let rows = (0..n).collect();
                        DecisionTree::grow(x, &encoded, &base_weights, rows, index.len(), &tree_params, &mut rng)
                    }
                }
            })
            .collect();

        log::debug!(
            "{}: fitted {} trees on {n} rows, {} classes",
            self.name(),
            self.params.n_estimators,
            index.len()
        );
        Ok(Box::new(FittedForest {
            classes: index.into_classes(),
            n_features: x.ncols(),
            trees,
        }))
    }
}

#[derive(Debug)]
pub struct FittedForest {
    classes:    Vec<Label>,
    n_features: usize,
    trees:      Vec<DecisionTree>,
}

impl FittedModel for FittedForest {
    fn classes(&self) -> &[Label] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> HeistResult<Array2<f64>> {
        check_feature_count(self.n_features, x)?;
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (row, mut out) in x.axis_iter(Axis(0)).zip(proba.axis_iter_mut(Axis(0))) {
            for tree in &self.trees {
                for (o, p) in out.iter_mut().zip(tree.distribution(row)) {
                    *o += p;
                }
            }
        }
        proba /= self.trees.len() as f64;
        Ok(proba)
    }
}
