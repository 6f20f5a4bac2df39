//! End-to-end test: raw rows → preprocess → experiment → predictor.
//!
//! 100 synthetic transactions, background label 99, two families.
//! Address "X" is first seen as family 1, so every later "X" row is
//! answered as family 1 no matter what its features look like.

use heist_core::{
    candidate::{Algorithm, CandidateSpec},
    config::ExperimentConfig,
    experiment::run_experiment,
    ingest::RawTransaction,
    lookup::KnownAddressLookup,
    models::ForestParams,
    predictor::{detector_targets, HierarchicalPredictor, Route},
    preprocess::{HeistPreprocessor, Preprocessor, FEATURE_COLUMNS},
    table::FeatureTable,
    types::Label,
};

const BACKGROUND: Label = 99;

fn raw(address: String, day: u32, profile: u32, label: Option<Label>) -> RawTransaction {
    let wobble = f64::from(day % 7);
    let (length, weight, count, looped, income) = match profile {
        // background: short chains, large payments
        0 => (2.0 + wobble, 0.5, 1.0, 0.0, 5e9 + wobble * 1e7),
        // family 1: long chains, small weight
        1 => (140.0 + wobble, 0.01, 400.0, 0.0, 3e8 + wobble * 1e6),
        // family 2: looped coins
        _ => (60.0 + wobble, 2.0, 30.0, 25.0, 8e7 + wobble * 1e5),
    };
    RawTransaction {
        address,
        year: 2016,
        day,
        length,
        weight,
        count,
        looped,
        neighbors: 2.0,
        income,
        label,
    }
}

/// 59 background rows, "X" twice, 20 more of family 1, 19 of family 2.
fn synthetic_rows() -> Vec<RawTransaction> {
    let mut rows = Vec::new();
    // Out of time order on purpose: the family-2 sighting of X is listed first.
    rows.push(raw("X".into(), 50, 2, Some(2)));
    rows.push(raw("X".into(), 3, 1, Some(1)));
    for i in 0..59 {
        rows.push(raw(format!("bg-{i}"), 10 + i, 0, Some(BACKGROUND)));
    }
    for i in 0..20 {
        rows.push(raw(format!("fam1-{i}"), 20 + i, 1, Some(1)));
    }
    for i in 0..19 {
        rows.push(raw(format!("fam2-{i}"), 30 + i, 2, Some(2)));
    }
    rows
}

fn config() -> ExperimentConfig {
    ExperimentConfig { background_label: BACKGROUND, ..ExperimentConfig::default_test() }
}

fn training_table() -> FeatureTable {
    HeistPreprocessor.preprocess(&synthetic_rows()).expect("preprocess")
}

#[test]
fn preprocessing_keeps_every_row_and_the_feature_schema() {
    let table = training_table();
    assert_eq!(table.len(), 100);
    assert_eq!(table.columns(), FEATURE_COLUMNS.map(String::from).as_slice());
    assert!(
        table.records().iter().all(|r| r.features.iter().all(|v| v.is_finite())),
        "log income keeps every feature finite"
    );
}

#[test]
fn experiment_reports_every_stage() {
    let _ = env_logger::builder().is_test(true).try_init();
    let table = training_table();
    let before = table.clone();
    let (report, _) = run_experiment(&table, &config()).expect("experiment runs");

    assert_eq!(table, before, "the caller's table must not be touched");
    assert_eq!(report.total_rows, 100);
    assert_eq!(report.ransomware_rows, 41);
    assert_eq!(report.families, vec![1, 2]);
    assert_eq!(report.search.rows.len(), config().roster.len(), "one row per candidate");
    assert!(report.search.scored().count() > 0, "{}", report.search.render());

    assert!(report.family_roc_auc > 0.9, "families are separable (auc={})", report.family_roc_auc);
    assert!(report.detector_roc_auc > 0.9, "background is separable (auc={})", report.detector_roc_auc);
    assert_eq!(report.lookup_size, 40, "X plus 39 single-sighting family addresses");

    assert_eq!(report.evaluation_rows, 25, "ceil(0.25 * 100)");
    assert!((0.0..=1.0).contains(&report.master_accuracy));
    assert!(report.master_accuracy > 0.9, "accuracy={}", report.master_accuracy);
    assert!(report.holdout_lookup_accuracy > 0.8, "accuracy={}", report.holdout_lookup_accuracy);

    let routed: usize = report.route_counts.values().sum();
    assert_eq!(routed, report.evaluation_rows, "every evaluation row takes exactly one route");
    assert_eq!(
        report.route_counts.get("known_address").copied().unwrap_or(0),
        report.lookup_overlap,
        "rows already in the lookup are exactly the ones it answers"
    );
}

#[test]
fn memorized_address_is_forced_to_its_first_family() {
    let (_, predictor) = run_experiment(&training_table(), &config()).expect("experiment runs");
    assert_eq!(predictor.lookup().get("X"), Some(1), "day 3 sighting beats day 50");

    // X again, looking exactly like background traffic.
    let probe = HeistPreprocessor
        .preprocess(&[
            raw("X".into(), 40, 0, None),
            raw("fresh-bg".into(), 41, 0, None),
            raw("fresh-fam2".into(), 42, 2, None),
        ])
        .unwrap();
    let decisions = predictor.decide(&probe).unwrap();

    assert_eq!(decisions[0].label, 1);
    assert_eq!(decisions[0].route, Route::KnownAddress);
    assert_eq!(decisions[1].label, BACKGROUND, "unseen background-like row is gated out");
    assert_eq!(decisions[2].label, 2, "unseen family-2-like row is attributed");
    assert_eq!(decisions[2].route, Route::Family);
}

#[test]
fn single_family_cannot_run_the_experiment() {
    let rows: Vec<RawTransaction> = synthetic_rows()
        .into_iter()
        .filter(|r| r.label != Some(2))
        .collect();
    let table = HeistPreprocessor.preprocess(&rows).unwrap();
    assert!(run_experiment(&table, &config()).is_err(), "one family leaves nothing to attribute");
}

#[test]
fn unlabeled_training_row_is_rejected() {
    let mut rows = synthetic_rows();
    rows.push(raw("mystery".into(), 77, 1, None));
    let table = HeistPreprocessor.preprocess(&rows).unwrap();
    assert!(run_experiment(&table, &config()).is_err(), "training rows must all carry a label");
}

/// 80 background rows, 15 family-1 rows all at address "X", 5 family-2 rows.
/// Models and lookup see a 95-row slice holding every "X" row; later "X"
/// rows dressed up with family-2 features still come out as family 1.
#[test]
fn reference_scenario_forces_x_to_family_one() {
    let mut rows = Vec::new();
    for i in 0..15 {
        rows.push(raw("X".into(), 5 + i, 1, Some(1)));
    }
    for i in 0..5 {
        rows.push(raw(format!("b-{i}"), 30 + i, 2, Some(2)));
    }
    for i in 0..80 {
        rows.push(raw(format!("bg-{i}"), 10 + i % 50, 0, Some(BACKGROUND)));
    }
    let all = HeistPreprocessor.preprocess(&rows).unwrap();
    assert_eq!(all.len(), 100);
    let training = all.select(&(0..95).collect::<Vec<_>>()).unwrap();

    let future: Vec<RawTransaction> = (0..5).map(|i| raw("X".into(), 31 + i, 2, None)).collect();
    let future = HeistPreprocessor.preprocess(&future).unwrap();

    let forest = || ForestParams { n_estimators: 10, ..ForestParams::balanced() };
    let x = training.matrix().unwrap();
    let labels = training.labels().unwrap();
    let detector = CandidateSpec::new("detector", Algorithm::RandomForest(forest()), false)
        .build()
        .unwrap()
        .fit(x.view(), &detector_targets(&labels, BACKGROUND))
        .unwrap();
    let ransomware = training.filter(|r| r.label != Some(BACKGROUND));
    let family = CandidateSpec::new("family", Algorithm::RandomForest(forest()), false)
        .build()
        .unwrap()
        .fit(ransomware.matrix().unwrap().view(), &ransomware.labels().unwrap())
        .unwrap();

    let predictor = HierarchicalPredictor::new(
        KnownAddressLookup::build(&training, BACKGROUND),
        detector,
        family,
        training.columns().to_vec(),
        BACKGROUND,
    )
    .unwrap();

    assert_eq!(
        predictor.predict(&future).unwrap(),
        vec![1; 5],
        "every future X row must be family 1 despite family-2 features"
    );
}
