//! Integration tests for the classifier capabilities.
//!
//! Every algorithm in the roster must:
//! 1. Learn three well-separated families
//! 2. Return probability rows that sum to 1, columns in `classes()` order
//! 3. Refuse inputs with the wrong number of features
//! 4. Refit identically from the same seed

use heist_core::{
    candidate::{default_roster, Algorithm, CandidateSpec},
    classifier::{ClassIndex, ClassWeight},
    error::HeistError,
    metrics::accuracy,
    models::{
        BoostingParams, ForestParams, KNeighborsParams, LinearSvcParams, LogisticParams, MlpParams,
        MultiClass, NeighborWeights, Objective, RidgeParams, SgdParams,
    },
    types::Label,
};
use ndarray::Array2;

const FAMILIES: [Label; 3] = [4, 9, 17];

/// Triangle of clusters: each family is linearly separable from the others.
fn clusters(per_class: usize, shift: f64) -> (Array2<f64>, Vec<Label>) {
    let centers = [[0.0, 10.0, 1.0], [10.0, -5.0, 2.0], [-10.0, -5.0, 3.0]];
    let n = per_class * FAMILIES.len();
    let x = Array2::from_shape_fn((n, 3), |(i, j)| {
        let jitter = ((i * 13 + j * 5) % 7) as f64 * 0.15 + shift;
        centers[i / per_class][j] + jitter
    });
    let y = (0..n).map(|i| FAMILIES[i / per_class]).collect();
    (x, y)
}

/// One small-but-complete configuration per algorithm.
fn every_algorithm() -> Vec<CandidateSpec> {
    vec![
        CandidateSpec::new(
            "xgb ovr",
            Algorithm::GradientBoosting(BoostingParams { n_estimators: 10, max_depth: 3, ..BoostingParams::default() }),
            true,
        ),
        CandidateSpec::new(
            "xgb softprob",
            Algorithm::GradientBoosting(BoostingParams {
                objective: Objective::MultiSoftprob,
                n_estimators: 10,
                max_depth: 3,
                num_class: Some(3),
                ..BoostingParams::default()
            }),
            false,
        ),
        CandidateSpec::new(
            "et",
            Algorithm::ExtraTrees(ForestParams { n_estimators: 10, ..ForestParams::balanced() }),
            false,
        ),
        CandidateSpec::new(
            "rf",
            Algorithm::RandomForest(ForestParams { n_estimators: 10, max_depth: Some(4), ..ForestParams::default() }),
            false,
        ),
        CandidateSpec::new(
            "mlp",
            Algorithm::Mlp(MlpParams {
                hidden_layer_sizes: vec![16],
                learning_rate_init: 0.01,
                max_iter: 100,
                ..MlpParams::default()
            }),
            false,
        ),
        CandidateSpec::new(
            "ridge",
            Algorithm::Ridge(RidgeParams { class_weight: ClassWeight::Balanced, ..RidgeParams::default() }),
            false,
        ),
        CandidateSpec::new("kneighbors", Algorithm::KNeighbors(KNeighborsParams::default()), false),
        CandidateSpec::new(
            "kneighbors distance",
            Algorithm::KNeighbors(KNeighborsParams { n_neighbors: 3, weights: NeighborWeights::Distance }),
            false,
        ),
        CandidateSpec::new(
            "sgd",
            Algorithm::Sgd(SgdParams { class_weight: ClassWeight::Balanced, ..SgdParams::default() }),
            false,
        ),
        CandidateSpec::new("lsvc", Algorithm::LinearSvc(LinearSvcParams::default()), false),
        CandidateSpec::new(
            "lr ovr",
            Algorithm::LogisticRegression(LogisticParams { multi_class: MultiClass::Ovr, ..LogisticParams::default() }),
            false,
        ),
        CandidateSpec::new("lr multinomial", Algorithm::LogisticRegression(LogisticParams::default()), false),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1 & 2: learning and probability contract
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn every_algorithm_learns_separable_families() {
    let (x_train, y_train) = clusters(20, 0.0);
    let (x_test, y_test) = clusters(6, 0.1);

    for spec in every_algorithm() {
        let model = spec
            .build()
            .unwrap_or_else(|e| panic!("{} should build: {e}", spec.name))
            .fit(x_train.view(), &y_train)
            .unwrap_or_else(|e| panic!("{} should fit: {e}", spec.name));

        assert_eq!(model.classes(), &FAMILIES, "{}: classes must be the sorted families", spec.name);
        assert_eq!(model.n_features(), 3, "{}", spec.name);

        let predicted = model.predict(x_test.view()).unwrap();
        let acc = accuracy(&y_test, &predicted).unwrap();
        assert!(acc >= 0.9, "{} should separate the clusters (accuracy {acc})", spec.name);
    }
}

#[test]
fn probabilities_are_rows_summing_to_one() {
    let (x_train, y_train) = clusters(20, 0.0);
    let (x_test, _) = clusters(4, 0.3);

    for spec in every_algorithm() {
        let model = spec.build().unwrap().fit(x_train.view(), &y_train).unwrap();
        let proba = model.predict_proba(x_test.view()).unwrap();
        assert_eq!(proba.dim(), (x_test.nrows(), FAMILIES.len()), "{}", spec.name);
        for row in proba.rows() {
            let sum: f64 = row.sum();
            assert!((sum - 1.0).abs() < 1e-9, "{}: row sums to {sum}", spec.name);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)), "{}: {row:?}", spec.name);
        }
        let scores = model.decision_function(x_test.view()).unwrap();
        assert_eq!(scores.dim(), proba.dim(), "{}: one score column per class", spec.name);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: input validation
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn wrong_feature_count_is_rejected() {
    let (x_train, y_train) = clusters(10, 0.0);
    let narrow = Array2::<f64>::zeros((2, 2));
    for spec in every_algorithm() {
        let model = spec.build().unwrap().fit(x_train.view(), &y_train).unwrap();
        assert!(
            matches!(model.predict(narrow.view()), Err(HeistError::LengthMismatch { .. })),
            "{} must refuse a 2-column matrix",
            spec.name
        );
    }
}

#[test]
fn single_class_target_cannot_be_fitted() {
    let (x, _) = clusters(5, 0.0);
    let y = vec![4; x.nrows()];
    for spec in every_algorithm() {
        let err = spec.build().unwrap().fit(x.view(), &y).unwrap_err();
        assert!(matches!(err, HeistError::DegenerateTarget { .. }), "{}: got {err:?}", spec.name);
    }
}

#[test]
fn invalid_hyperparameters_fail_at_build() {
    let bad = [
        Algorithm::GradientBoosting(BoostingParams { learning_rate: 0.0, ..BoostingParams::default() }),
        Algorithm::GradientBoosting(BoostingParams { objective: Objective::MultiSoftmax, ..BoostingParams::default() }),
        Algorithm::ExtraTrees(ForestParams { min_samples_split: 1, ..ForestParams::default() }),
        Algorithm::Mlp(MlpParams { hidden_layer_sizes: vec![0], ..MlpParams::default() }),
        Algorithm::Ridge(RidgeParams { alpha: -1.0, ..RidgeParams::default() }),
        Algorithm::KNeighbors(KNeighborsParams { n_neighbors: 0, ..KNeighborsParams::default() }),
        Algorithm::LinearSvc(LinearSvcParams { c: 0.0, ..LinearSvcParams::default() }),
        Algorithm::LogisticRegression(LogisticParams { max_iter: 0, ..LogisticParams::default() }),
    ];
    for algorithm in bad {
        assert!(
            matches!(algorithm.build(), Err(HeistError::InvalidHyperparameter { .. })),
            "{algorithm:?} should be rejected"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: determinism
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn same_seed_same_model() {
    let (x_train, y_train) = clusters(15, 0.0);
    let (x_test, _) = clusters(5, 0.5);
    for spec in every_algorithm() {
        let a = spec.build().unwrap().fit(x_train.view(), &y_train).unwrap();
        let b = spec.build().unwrap().fit(x_train.view(), &y_train).unwrap();
        assert_eq!(
            a.predict_proba(x_test.view()).unwrap(),
            b.predict_proba(x_test.view()).unwrap(),
            "{} must be reproducible",
            spec.name
        );
    }
}

#[test]
fn default_roster_matches_reference_lineup() {
    let roster = default_roster();
    let names: Vec<&str> = roster.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "xgb",
            "xgb multi inherent",
            "et",
            "mlp",
            "ridge",
            "kneighbors",
            "sgd",
            "lsvc",
            "rf",
            "lr ovr",
            "lr multiclass"
        ]
    );
    let wrapped: Vec<&str> = roster.iter().filter(|c| c.one_vs_rest).map(|c| c.name.as_str()).collect();
    assert_eq!(wrapped, vec!["xgb", "rf"], "only the binary xgb and the forest are wrapped");
    assert!(roster.iter().all(|c| c.build().is_ok()), "every default candidate must build");
}

#[test]
fn candidate_specs_round_trip_through_json() {
    let json = r#"{ "name": "deep rf", "algorithm": "random_forest", "n_estimators": 3, "one_vs_rest": true }"#;
    let spec: CandidateSpec = serde_json::from_str(json).unwrap();
    assert!(spec.one_vs_rest);
    match &spec.algorithm {
        Algorithm::RandomForest(p) => {
            assert_eq!(p.n_estimators, 3);
            assert_eq!(p.min_samples_split, 2, "absent fields keep their defaults");
        }
        other => panic!("expected a random forest, got {other:?}"),
    }
}

#[test]
fn class_index_refuses_labels_it_never_saw() {
    let index = ClassIndex::from_labels(&[9, 4, 17, 4]).unwrap();
    assert_eq!(index.encode(&[4, 17, 9]).unwrap(), vec![0, 2, 1]);
    assert!(
        matches!(index.encode(&[4, 5]), Err(HeistError::DegenerateTarget { .. })),
        "label 5 must not be folded into column 0"
    );
}
