//! Candidate specifications for the model search.
//!
//! RULE: Hyperparameters are typed, one struct per algorithm.
//! A candidate is (display name, algorithm + hyperparameters,
//! one-vs-rest flag) and nothing else; building it is the only place
//! where hyperparameters are validated.

use crate::{
    classifier::{ClassWeight, Classifier},
    error::HeistResult,
    models::{
        BoostingParams, Forest, ForestKind, ForestParams, GradientBoosting, KNeighbors,
        KNeighborsParams, LinearSvc, LinearSvcParams, LogisticParams, LogisticRegression, Mlp,
        MlpParams, MultiClass, Objective, OneVsRest, RidgeClassifier, RidgeParams, SgdClassifier,
        SgdParams,
    },
};
use serde::{Deserialize, Serialize};

/// Number of ransomware families in the Bitcoin heist label space.
pub const FAMILY_LABEL_SPACE: usize = 28;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum Algorithm {
    GradientBoosting(BoostingParams),
    ExtraTrees(ForestParams),
    RandomForest(ForestParams),
    Mlp(MlpParams),
    Ridge(RidgeParams),
    KNeighbors(KNeighborsParams),
    Sgd(SgdParams),
    LinearSvc(LinearSvcParams),
    LogisticRegression(LogisticParams),
}

impl Algorithm {
    /// Validate hyperparameters and build the classifier.
    pub fn build(&self) -> HeistResult<Box<dyn Classifier>> {
        Ok(match self {
            Self::GradientBoosting(p) => Box::new(GradientBoosting::new(p.clone())?),
            Self::ExtraTrees(p) => Box::new(Forest::new(ForestKind::ExtraTrees, p.clone())?),
            Self::RandomForest(p) => Box::new(Forest::new(ForestKind::RandomForest, p.clone())?),
            Self::Mlp(p) => Box::new(Mlp::new(p.clone())?),
            Self::Ridge(p) => Box::new(RidgeClassifier::new(p.clone())?),
            Self::KNeighbors(p) => Box::new(KNeighbors::new(p.clone())?),
            Self::Sgd(p) => Box::new(SgdClassifier::new(p.clone())?),
            Self::LinearSvc(p) => Box::new(LinearSvc::new(p.clone())?),
            Self::LogisticRegression(p) => Box::new(LogisticRegression::new(p.clone())?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name:        String,
    #[serde(flatten)]
    pub algorithm:   Algorithm,
    #[serde(default)]
    pub one_vs_rest: bool,
}

impl CandidateSpec {
    pub fn new(name: impl Into<String>, algorithm: Algorithm, one_vs_rest: bool) -> Self {
        Self { name: name.into(), algorithm, one_vs_rest }
    }

    /// Build the classifier, wrapped in one-vs-rest when flagged.
    pub fn build(&self) -> HeistResult<Box<dyn Classifier>> {
        let inner = self.algorithm.build()?;
        if self.one_vs_rest {
            Ok(Box::new(OneVsRest::new(inner)))
        } else {
            Ok(inner)
        }
    }
}

/// The family-classifier roster, in submission order.
pub fn default_roster() -> Vec<CandidateSpec> {
    let balanced_forest = ForestParams::balanced();
    vec![
        CandidateSpec::new(
            "xgb",
            Algorithm::GradientBoosting(BoostingParams {
                objective: Objective::BinaryLogistic,
                n_estimators: 2,
                ..BoostingParams::default()
            }),
            true,
        ),
        CandidateSpec::new(
            "xgb multi inherent",
            Algorithm::GradientBoosting(BoostingParams {
                objective: Objective::MultiSoftmax,
                n_estimators: 2,
                num_class: Some(FAMILY_LABEL_SPACE),
                ..BoostingParams::default()
            }),
            false,
        ),
        CandidateSpec::new("et", Algorithm::ExtraTrees(balanced_forest.clone()), false),
        CandidateSpec::new("mlp", Algorithm::Mlp(MlpParams::default()), false),
        CandidateSpec::new(
            "ridge",
            Algorithm::Ridge(RidgeParams { class_weight: ClassWeight::Balanced, ..RidgeParams::default() }),
            false,
        ),
        CandidateSpec::new("kneighbors", Algorithm::KNeighbors(KNeighborsParams::default()), false),
        CandidateSpec::new(
            "sgd",
            Algorithm::Sgd(SgdParams { class_weight: ClassWeight::Balanced, ..SgdParams::default() }),
            false,
        ),
        CandidateSpec::new(
            "lsvc",
            Algorithm::LinearSvc(LinearSvcParams {
                class_weight: ClassWeight::Balanced,
                ..LinearSvcParams::default()
            }),
            false,
        ),
        CandidateSpec::new("rf", Algorithm::RandomForest(balanced_forest), true),
        CandidateSpec::new(
            "lr ovr",
            Algorithm::LogisticRegression(LogisticParams {
                class_weight: ClassWeight::Balanced,
                multi_class: MultiClass::Ovr,
                ..LogisticParams::default()
            }),
            false,
        ),
        CandidateSpec::new(
            "lr multiclass",
            Algorithm::LogisticRegression(LogisticParams {
                class_weight: ClassWeight::Balanced,
                multi_class: MultiClass::Multinomial,
                ..LogisticParams::default()
            }),
            false,
        ),
    ]
}

/// Balanced random forest, used for both production stages by default.
pub fn balanced_random_forest(name: &str) -> CandidateSpec {
    CandidateSpec::new(name, Algorithm::RandomForest(ForestParams::balanced()), false)
}
