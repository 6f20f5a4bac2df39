//! Integration tests for reading the dataset files and loading config.

use heist_core::{
    config::ExperimentConfig,
    error::HeistError,
    ingest::read_transactions,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn temp_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write csv");
    file
}

#[test]
fn missing_file_names_the_expected_path() {
    let path = std::path::Path::new("no/such/dir/bitcoin_train.csv");
    let err = read_transactions(path).unwrap_err();
    match &err {
        HeistError::InputMissing { path } => assert!(path.ends_with("bitcoin_train.csv")),
        other => panic!("expected InputMissing, got {other:?}"),
    }
    assert!(err.to_string().contains("no/such/dir"), "message must say where to look: {err}");
}

#[test]
fn reads_labeled_rows_and_ignores_index_column() {
    let file = temp_file(
        "Unnamed: 0,address,year,day,length,weight,count,looped,neighbors,income,label\n\
         0,1AbC,2016,11,18,0.008,1,0,2,100050000,28\n\
         1,1XyZ,2017,5,144,0.5,900,12,1,30000000,3\n",
    );
    let rows = read_transactions(file.path()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].address, "1AbC");
    assert_eq!(rows[0].label, Some(28));
    assert_eq!(rows[1].year, 2017);
    assert_eq!(rows[1].looped, 12.0);
}

#[test]
fn label_column_is_optional() {
    let file = temp_file(
        "address,year,day,length,weight,count,looped,neighbors,income\n\
         1AbC,2016,11,18,0.008,1,0,2,100050000\n",
    );
    let rows = read_transactions(file.path()).unwrap();
    assert_eq!(rows[0].label, None);
}

#[test]
fn malformed_number_is_a_csv_error() {
    let file = temp_file(
        "address,year,day,length,weight,count,looped,neighbors,income\n\
         1AbC,twenty,11,18,0.008,1,0,2,100050000\n",
    );
    assert!(matches!(read_transactions(file.path()), Err(HeistError::Csv(_))));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn defaults_follow_the_reference_experiment() {
    let config = ExperimentConfig::default();
    assert_eq!(config.background_label, 28);
    assert_eq!(config.min_class_occurrences, 4);
    assert_eq!(config.cv_folds, 5);
    assert_eq!((config.search_split.test_fraction, config.search_split.seed), (0.25, 0));
    assert_eq!((config.model_split.test_fraction, config.model_split.seed), (0.40, 22));
    assert_eq!((config.evaluation_split.test_fraction, config.evaluation_split.seed), (0.25, 0));
    assert_eq!(config.roster.len(), 11);
    config.validate().unwrap();
}

#[test]
fn partial_config_file_keeps_defaults() {
    let file = temp_file(r#"{ "background_label": 99, "cv_folds": 3 }"#);
    let config = ExperimentConfig::load(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.background_label, 99);
    assert_eq!(config.cv_folds, 3);
    assert_eq!(config.model_split, ExperimentConfig::default().model_split);
    assert_eq!(config.roster, ExperimentConfig::default().roster);
}

#[test]
fn invalid_config_is_rejected() {
    let file = temp_file(r#"{ "cv_folds": 1 }"#);
    assert!(ExperimentConfig::load(file.path().to_str().unwrap()).is_err());

    let mut config = ExperimentConfig::default_test();
    config.model_split.test_fraction = 1.5;
    assert!(matches!(config.validate(), Err(HeistError::InvalidConfig { .. })));

    assert!(ExperimentConfig::load("does/not/exist.json").is_err());
}
