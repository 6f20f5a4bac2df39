//! heist-runner: runs the ransomware attribution experiment end to end.
//!
//! Usage:
//!   heist-runner
//!   heist-runner --train bitcoin_train.csv --test bitcoin_test.csv
//!   heist-runner --config experiment.json --json report.json

use anyhow::Result;
use heist_core::{
    config::ExperimentConfig,
    experiment::run_experiment,
    ingest::read_transactions,
    preprocess::{HeistPreprocessor, Preprocessor},
};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

const DEFAULT_TRAIN: &str = "../DataHacks-2021/Intermediate Track 1 (Bitcoin)/Datasets/bitcoin_train.csv";
const DEFAULT_TEST: &str = "../DataHacks-2021/Intermediate Track 1 (Bitcoin)/Datasets/bitcoin_test.csv";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let train_path = parse_arg(&args, "--train").unwrap_or(DEFAULT_TRAIN);
    let test_path = parse_arg(&args, "--test").unwrap_or(DEFAULT_TEST);
    let config_path = parse_arg(&args, "--config");
    let json_path = parse_arg(&args, "--json");

    println!("Bitcoin Heist: ransomware attribution");
    println!("  train:   {train_path}");
    println!("  test:    {test_path}");
    println!("  config:  {}", config_path.unwrap_or("(defaults)"));
    println!();

    let config = match config_path {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };

    // Both files must exist before any training starts.
    let train_rows = read_transactions(Path::new(train_path))?;
    let test_rows = read_transactions(Path::new(test_path))?;

    let preprocessor = HeistPreprocessor;
    let train = preprocessor.preprocess(&train_rows)?;
    let test = preprocessor.preprocess(&test_rows)?;

    let (report, predictor) = run_experiment(&train, &config)?;

    println!("=== Family model search ===");
    println!("{}", report.search.render());
    println!("=== Production models ===");
    println!("  family   '{}': weighted OvR ROC AUC {:.4}", report.family_model, report.family_roc_auc);
    println!("  detector '{}': ROC AUC {:.4}", report.detector_model, report.detector_roc_auc);
    println!();
    println!("=== Hierarchical predictor ===");
    println!("  known addresses:          {}", report.lookup_size);
    println!("  evaluation rows:          {}", report.evaluation_rows);
    println!("  accuracy:                 {:.4}", report.master_accuracy);
    println!("  rows already in lookup:   {}", report.lookup_overlap);
    println!("  accuracy, held-out lookup: {:.4}", report.holdout_lookup_accuracy);
    for (route, count) in &report.route_counts {
        println!("  route {route:<14} {count}");
    }
    println!();

    let decisions = predictor.decide(&test)?;
    let mut by_label = BTreeMap::new();
    let mut by_route = BTreeMap::new();
    for d in &decisions {
        *by_label.entry(d.label).or_insert(0usize) += 1;
        *by_route.entry(d.route.as_str()).or_insert(0usize) += 1;
    }
    println!("=== Test file predictions ({} rows) ===", decisions.len());
    for (label, count) in &by_label {
        println!("  label {label:>3}: {count}");
    }
    for (route, count) in &by_route {
        println!("  route {route:<14} {count}");
    }

    if let Some(path) = json_path {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        log::info!("runner: report written to {path}");
    }
    Ok(())
}

fn parse_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
