use crate::{
    candidate::{balanced_random_forest, default_roster, Algorithm, CandidateSpec},
    error::{HeistError, HeistResult},
    models::{BoostingParams, ForestParams, KNeighborsParams, LogisticParams, MlpParams, Objective},
    search::DEFAULT_CV_FOLDS,
    table::MIN_CLASS_OCCURRENCES,
    types::{Label, DEFAULT_BACKGROUND_LABEL},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitConfig {
    pub test_fraction: f64,
    pub seed:          u64,
}

impl SplitConfig {
    pub const fn new(test_fraction: f64, seed: u64) -> Self {
        Self { test_fraction, seed }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub background_label:      Label,
    /// Classes with this many rows or fewer are left out of the family search.
    pub min_class_occurrences: usize,
    pub cv_folds:              usize,
    /// Split of the ransomware subset used by the family search.
    pub search_split:          SplitConfig,
    /// Split used to train and score the production family model and detector.
    pub model_split:           SplitConfig,
    /// Split of the full table used to score the hierarchical predictor.
    pub evaluation_split:      SplitConfig,
    pub roster:                Vec<CandidateSpec>,
    pub family_model:          CandidateSpec,
    pub detector_model:        CandidateSpec,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            background_label:      DEFAULT_BACKGROUND_LABEL,
            min_class_occurrences: MIN_CLASS_OCCURRENCES,
            cv_folds:              DEFAULT_CV_FOLDS,
            search_split:          SplitConfig::new(0.25, 0),
            model_split:           SplitConfig::new(0.40, 22),
            evaluation_split:      SplitConfig::new(0.25, 0),
            roster:                default_roster(),
            family_model:          balanced_random_forest("rf family"),
            detector_model:        balanced_random_forest("rf detector"),
        }
    }
}

impl ExperimentConfig {
    /// Load from a JSON file. Absent fields keep their defaults.
    /// In tests, use ExperimentConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> HeistResult<()> {
        if self.cv_folds < 2 {
            return Err(HeistError::InvalidConfig {
                reason: format!("cv_folds must be at least 2, got {}", self.cv_folds),
            });
        }
        for (name, split) in [
            ("search_split", self.search_split),
            ("model_split", self.model_split),
            ("evaluation_split", self.evaluation_split),
        ] {
            if !(split.test_fraction > 0.0 && split.test_fraction < 1.0) {
                return Err(HeistError::InvalidConfig {
                    reason: format!("{name}.test_fraction must be in (0, 1), got {}", split.test_fraction),
                });
            }
        }
        let mut names = std::collections::HashSet::new();
        if let Some(dup) = self.roster.iter().find(|c| !names.insert(c.name.as_str())) {
            log::warn!("config: roster name '{}' repeats; the repeat will be reported as failed", dup.name);
        }
        Ok(())
    }

    /// Config with small, fast models for use in tests.
    pub fn default_test() -> Self {
        let small_forest = ForestParams { n_estimators: 10, ..ForestParams::balanced() };
        Self {
            roster: vec![
                CandidateSpec::new("rf", Algorithm::RandomForest(small_forest.clone()), false),
                CandidateSpec::new("rf ovr", Algorithm::RandomForest(small_forest.clone()), true),
                CandidateSpec::new(
                    "xgb",
                    Algorithm::GradientBoosting(BoostingParams {
                        objective: Objective::BinaryLogistic,
                        n_estimators: 5,
                        max_depth: 3,
                        ..BoostingParams::default()
                    }),
                    true,
                ),
                CandidateSpec::new(
                    "kneighbors",
                    Algorithm::KNeighbors(KNeighborsParams { n_neighbors: 3, ..KNeighborsParams::default() }),
                    false,
                ),
                CandidateSpec::new("lr", Algorithm::LogisticRegression(LogisticParams::default()), false),
                CandidateSpec::new(
                    "mlp",
                    Algorithm::Mlp(MlpParams { hidden_layer_sizes: vec![8], max_iter: 20, ..MlpParams::default() }),
                    false,
                ),
            ],
            family_model: CandidateSpec::new("rf family", Algorithm::RandomForest(small_forest.clone()), false),
            detector_model: CandidateSpec::new("rf detector", Algorithm::RandomForest(small_forest), false),
            ..Self::default()
        }
    }
}
