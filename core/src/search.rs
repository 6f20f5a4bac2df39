//! Model search harness.
//!
//! RULE: One bad candidate never sinks the search. Every failure
//! (build, fit, cross-validation, evaluation) is captured in that
//! candidate's row and the next candidate runs.
//!
//! RULE: Rows come back in submission order. Picking the production
//! model from the table is a human decision made after the run.

use crate::{
    candidate::CandidateSpec,
    classifier::FittedModel,
    error::{HeistError, HeistResult},
    metrics::{accuracy, mean_std},
    split::StratifiedKFold,
    types::Label,
};
use ndarray::{ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Instant;

pub const DEFAULT_CV_FOLDS: usize = 5;

/// Train/test matrices shared by every candidate.
#[derive(Debug, Clone, Copy)]
pub struct SearchData<'a> {
    pub x_train: ArrayView2<'a, f64>,
    pub y_train: &'a [Label],
    pub x_test:  ArrayView2<'a, f64>,
    pub y_test:  &'a [Label],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    Build,
    Fit,
    CrossValidation,
    Evaluation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateOutcome {
    Scored {
        cv_scores:     Vec<f64>,
        cv_mean:       f64,
        cv_std:        f64,
        test_accuracy: f64,
    },
    Failed {
        stage:  SearchStage,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub name:        String,
    pub one_vs_rest: bool,
    pub outcome:     CandidateOutcome,
}

impl ComparisonRow {
    pub fn is_scored(&self) -> bool {
        matches!(self.outcome, CandidateOutcome::Scored { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn scored(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|r| r.is_scored())
    }

    pub fn failed(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|r| !r.is_scored())
    }

    pub fn row(&self, name: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Fixed-width text rendering, one line per candidate.
    pub fn render(&self) -> String {
        let width = self.rows.iter().map(|r| r.name.len()).max().unwrap_or(4).max(4);
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<width$}  {:>3}  {:>8}  {:>8}  {:>8}  status",
            "name", "ovr", "cv_mean", "cv_std", "test_acc"
        );
        for row in &self.rows {
            let ovr = if row.one_vs_rest { "yes" } else { "no" };
            let _ = match &row.outcome {
                CandidateOutcome::Scored { cv_mean, cv_std, test_accuracy, .. } => writeln!(
                    out,
                    "{:<width$}  {:>3}  {:>8.4}  {:>8.4}  {:>8.4}  ok",
                    row.name, ovr, cv_mean, cv_std, test_accuracy
                ),
                CandidateOutcome::Failed { stage, reason } => writeln!(
                    out,
                    "{:<width$}  {:>3}  {:>8}  {:>8}  {:>8}  failed at {stage:?}: {reason}",
                    row.name, ovr, "-", "-", "-"
                ),
            };
        }
        out
    }
}

/// A fitted candidate, keyed by its display name.
#[derive(Debug)]
pub struct NamedModel {
    pub name:  String,
    pub model: Box<dyn FittedModel>,
}

#[derive(Debug, Default)]
pub struct SearchOutcome {
    /// Fitted models of the scored candidates, in submission order.
    pub fitted: Vec<NamedModel>,
    pub table:  ComparisonTable,
}

impl SearchOutcome {
    pub fn model(&self, name: &str) -> Option<&dyn FittedModel> {
        self.fitted.iter().find(|m| m.name == name).map(|m| m.model.as_ref())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ModelSearch {
    cv: StratifiedKFold,
}

impl Default for ModelSearch {
    fn default() -> Self {
        Self::new(DEFAULT_CV_FOLDS)
    }
}

impl ModelSearch {
    pub fn new(cv_folds: usize) -> Self {
        Self { cv: StratifiedKFold::new(cv_folds) }
    }

    pub fn run(&self, data: &SearchData<'_>, roster: &[CandidateSpec]) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();

        for spec in roster {
            let started = Instant::now();
            let duplicate = outcome.table.row(&spec.name).is_some();
            let result = if duplicate {
                Err((SearchStage::Build, format!("duplicate candidate name '{}'", spec.name)))
            } else {
                self.evaluate(data, spec)
            };

            let row_outcome = match result {
                Ok((model, scored)) => {
                    if let CandidateOutcome::Scored { cv_mean, cv_std, test_accuracy, .. } = &scored {
                        log::info!(
                            "search: candidate='{}' cv_mean={cv_mean:.4} cv_std={cv_std:.4} test_acc={test_accuracy:.4} elapsed_ms={}",
                            spec.name,
                            started.elapsed().as_millis()
                        );
                    }
                    outcome.fitted.push(NamedModel { name: spec.name.clone(), model });
                    scored
                }
                Err((stage, reason)) => {
                    log::warn!("search: candidate='{}' failed at {stage:?}: {reason}", spec.name);
                    CandidateOutcome::Failed { stage, reason }
                }
            };
            outcome.table.rows.push(ComparisonRow {
                name:        spec.name.clone(),
                one_vs_rest: spec.one_vs_rest,
                outcome:     row_outcome,
            });
        }

        log::info!(
            "search: {} candidates, {} scored, {} failed",
            roster.len(),
            outcome.table.scored().count(),
            outcome.table.failed().count()
        );
        outcome
    }

    /// Build → fit → cross-validate → score one candidate.
    fn evaluate(
        &self,
        data: &SearchData<'_>,
        spec: &CandidateSpec,
    ) -> Result<(Box<dyn FittedModel>, CandidateOutcome), (SearchStage, String)> {
        let at = |stage: SearchStage| move |e: HeistError| (stage, e.to_string());

        let classifier = spec.build().map_err(at(SearchStage::Build))?;
        let model = classifier
            .fit(data.x_train, data.y_train)
            .map_err(at(SearchStage::Fit))?;
        let cv_scores = self
            .cross_validate(data, spec)
            .map_err(at(SearchStage::CrossValidation))?;
        let test_accuracy = model
            .predict(data.x_test)
            .and_then(|predicted| accuracy(data.y_test, &predicted))
            .map_err(at(SearchStage::Evaluation))?;

        let (cv_mean, cv_std) = mean_std(&cv_scores);
        Ok((model, CandidateOutcome::Scored { cv_scores, cv_mean, cv_std, test_accuracy }))
    }

    /// Accuracy of a fresh fit on each fold's validation rows.
    fn cross_validate(&self, data: &SearchData<'_>, spec: &CandidateSpec) -> HeistResult<Vec<f64>> {
        let classifier = spec.build()?;
        self.cv
            .split(data.y_train)?
            .iter()
            .map(|fold| {
                let x_fit = data.x_train.select(Axis(0), &fold.train);
                let y_fit: Vec<Label> = fold.train.iter().map(|&i| data.y_train[i]).collect();
                let x_val = data.x_train.select(Axis(0), &fold.validation);
                let y_val: Vec<Label> = fold.validation.iter().map(|&i| data.y_train[i]).collect();

                let model = classifier.fit(x_fit.view(), &y_fit)?;
                accuracy(&y_val, &model.predict(x_val.view())?)
            })
            .collect()
    }
}
