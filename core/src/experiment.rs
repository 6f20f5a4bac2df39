//! Full experiment: search, production models, lookup, composed evaluation.
//!
//! STAGE ORDER:
//!   1. Sort by (year, day).
//!   2. Ransomware subset, rare classes dropped.
//!   3. Model search over the roster.
//!   4. Family model + weighted one-vs-rest ROC AUC.
//!   5. Known-address lookup from the whole sorted table.
//!   6. Detector + binary ROC AUC.
//!   7. Hierarchical predictor accuracy.
//!   8. Lookup overlap with the evaluation rows, and the accuracy a
//!      lookup built without the evaluation rows would get.
//!
//! RULE: The caller's table is never mutated. Every split is seeded from
//! the config, so the same table and config give the same report.

use crate::{
    classifier::FittedModel,
    config::{ExperimentConfig, SplitConfig},
    error::{HeistError, HeistResult},
    lookup::KnownAddressLookup,
    metrics::{accuracy, roc_auc_binary, roc_auc_weighted_ovr},
    predictor::{detector_targets, HierarchicalPredictor},
    search::{ComparisonTable, ModelSearch, SearchData},
    split::train_test_split,
    table::FeatureTable,
    types::{Label, DETECTOR_RANSOMWARE},
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub total_rows:              usize,
    pub ransomware_rows:         usize,
    /// Families that survived the rare-class filter, in label order.
    pub families:                Vec<Label>,
    pub search:                  ComparisonTable,
    pub family_model:            String,
    pub family_roc_auc:          f64,
    pub detector_model:          String,
    pub detector_roc_auc:        f64,
    pub lookup_size:             usize,
    pub evaluation_rows:         usize,
    pub master_accuracy:         f64,
    /// Evaluation rows whose address the full lookup already holds.
    pub lookup_overlap:          usize,
    pub holdout_lookup_accuracy: f64,
    pub route_counts:            BTreeMap<String, usize>,
}

/// Rows split into a train part and a held-out part.
struct Partition {
    train: FeatureTable,
    test:  FeatureTable,
}

fn partition(table: &FeatureTable, split: SplitConfig) -> HeistResult<Partition> {
    let idx = train_test_split(table.len(), split.test_fraction, split.seed)?;
    Ok(Partition { train: table.select(&idx.train)?, test: table.select(&idx.test)? })
}

pub fn run_experiment(
    table: &FeatureTable,
    config: &ExperimentConfig,
) -> HeistResult<(ExperimentReport, HierarchicalPredictor)> {
    config.validate()?;
    let background = config.background_label;

    // ── 1. Time order ────────────────────────────────────────
    let mut sorted = table.clone();
    sorted.sort_by_time();
    let all_labels = sorted.labels()?;
    log::info!("experiment: rows={} columns={}", sorted.len(), sorted.columns().len());

    // ── 2. Ransomware subset ─────────────────────────────────
    let ransomware = sorted
        .filter(|r| r.label.is_some_and(|l| l != background))
        .retain_frequent_classes(config.min_class_occurrences);
    let families: Vec<Label> = ransomware.label_counts().into_keys().collect();
    log::info!(
        "experiment: ransomware_rows={} families={} (classes with <= {} rows dropped)",
        ransomware.len(),
        families.len(),
        config.min_class_occurrences
    );
    if families.len() < 2 {
        return Err(HeistError::DegenerateTarget {
            reason: format!("need at least two ransomware families, found {}", families.len()),
        });
    }

    // ── 3. Model search ──────────────────────────────────────
    let search_part = partition(&ransomware, config.search_split)?;
    let (x_train, y_train) = (search_part.train.matrix()?, search_part.train.labels()?);
    let (x_test, y_test) = (search_part.test.matrix()?, search_part.test.labels()?);
    let search = ModelSearch::new(config.cv_folds).run(
        &SearchData {
            x_train: x_train.view(),
            y_train: &y_train,
            x_test:  x_test.view(),
            y_test:  &y_test,
        },
        &config.roster,
    );

    // ── 4. Family model ──────────────────────────────────────
    let family_part = partition(&ransomware, config.model_split)?;
    let family = config
        .family_model
        .build()?
        .fit(family_part.train.matrix()?.view(), &family_part.train.labels()?)?;
    let family_roc_auc = family_auc(family.as_ref(), &family_part.test)?;
    log::info!(
        "experiment: family_model='{}' weighted_ovr_roc_auc={family_roc_auc:.4}",
        config.family_model.name
    );

    // ── 5. Lookup ────────────────────────────────────────────
    let lookup = KnownAddressLookup::build(&sorted, background);

    // ── 6. Detector ──────────────────────────────────────────
    let detector_part = partition(&sorted, config.model_split)?;
    let detector_y = detector_targets(&detector_part.train.labels()?, background);
    let detector = config
        .detector_model
        .build()?
        .fit(detector_part.train.matrix()?.view(), &detector_y)?;
    let detector_roc_auc = detector_auc(detector.as_ref(), &detector_part.test, background)?;
    log::info!(
        "experiment: detector_model='{}' roc_auc={detector_roc_auc:.4}",
        config.detector_model.name
    );

    // ── 7. Composed evaluation ───────────────────────────────
    let predictor = HierarchicalPredictor::new(
        lookup,
        detector,
        family,
        sorted.columns().to_vec(),
        background,
    )?;
    let eval_idx = train_test_split(
        sorted.len(),
        config.evaluation_split.test_fraction,
        config.evaluation_split.seed,
    )?;
    let eval_test = sorted.select(&eval_idx.test)?;
    let eval_truth: Vec<Label> = eval_idx.test.iter().map(|&i| all_labels[i]).collect();
    let decisions = predictor.decide(&eval_test)?;
    let predicted: Vec<Label> = decisions.iter().map(|d| d.label).collect();
    let master_accuracy = accuracy(&eval_truth, &predicted)?;

    let mut route_counts = BTreeMap::new();
    for d in &decisions {
        *route_counts.entry(d.route.as_str().to_string()).or_insert(0) += 1;
    }

    // ── 8. Lookup leakage ────────────────────────────────────
    let lookup_overlap = predictor.lookup().overlap(&eval_test);
    let holdout_lookup_accuracy =
        holdout_accuracy(&predictor, &sorted, &eval_idx.train, &eval_test, &eval_truth, background)?;
    log::info!(
        "experiment: master_accuracy={master_accuracy:.4} eval_rows={} lookup_overlap={lookup_overlap} holdout_lookup_accuracy={holdout_lookup_accuracy:.4}",
        eval_test.len()
    );
    if lookup_overlap > 0 {
        log::warn!(
            "experiment: {lookup_overlap} of {} evaluation rows are answered from a lookup that saw them",
            eval_test.len()
        );
    }

    let report = ExperimentReport {
        total_rows: sorted.len(),
        ransomware_rows: ransomware.len(),
        families,
        search: search.table,
        family_model: config.family_model.name.clone(),
        family_roc_auc,
        detector_model: config.detector_model.name.clone(),
        detector_roc_auc,
        lookup_size: predictor.lookup().len(),
        evaluation_rows: eval_test.len(),
        master_accuracy,
        lookup_overlap,
        holdout_lookup_accuracy,
        route_counts,
    };
    Ok((report, predictor))
}

/// Weighted one-vs-rest ROC AUC on held-out rows. Rows whose family the
/// model never saw cannot be ranked and are left out.
fn family_auc(model: &dyn FittedModel, held_out: &FeatureTable) -> HeistResult<f64> {
    let classes = model.classes();
    let scored = held_out.filter(|r| r.label.is_some_and(|l| classes.contains(&l)));
    if scored.len() < held_out.len() {
        log::warn!(
            "experiment: {} held-out rows carry a family absent from training",
            held_out.len() - scored.len()
        );
    }
    let proba = model.predict_proba(scored.matrix()?.view())?;
    roc_auc_weighted_ovr(&scored.labels()?, proba.view(), classes)
}

fn detector_auc(model: &dyn FittedModel, held_out: &FeatureTable, background: Label) -> HeistResult<f64> {
    let truth: Vec<bool> = held_out
        .labels()?
        .iter()
        .map(|&l| l != background)
        .collect();
    let proba: Array2<f64> = model.predict_proba(held_out.matrix()?.view())?;
    let column = model
        .classes()
        .iter()
        .position(|&c| c == DETECTOR_RANSOMWARE)
        .ok_or_else(|| HeistError::DegenerateTarget {
            reason: "detector never saw a ransomware row".to_string(),
        })?;
    roc_auc_binary(&truth, &proba.column(column).to_vec())
}

/// Accuracy of the same models behind a lookup that only knows the
/// evaluation split's training rows.
fn holdout_accuracy(
    predictor: &HierarchicalPredictor,
    sorted: &FeatureTable,
    train_rows: &[usize],
    eval_test: &FeatureTable,
    truth: &[Label],
    background: Label,
) -> HeistResult<f64> {
    let mut train_rows = train_rows.to_vec();
    train_rows.sort_unstable();
    let holdout_lookup = KnownAddressLookup::build(&sorted.select(&train_rows)?, background);
    let predicted: Vec<Label> = predictor
        .decide_with(&holdout_lookup, eval_test)?
        .into_iter()
        .map(|d| d.label)
        .collect();
    accuracy(truth, &predicted)
}
