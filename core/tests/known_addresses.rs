//! Integration tests for the known-address lookup.
//!
//! 1. The first labeled sighting of an address wins
//! 2. Background and unlabeled rows are never memorized
//! 3. Building is idempotent and leaves the table untouched
//! 4. Sorting by time decides which sighting counts as first

use heist_core::{
    lookup::KnownAddressLookup,
    table::{FeatureTable, TransactionRecord},
    types::Label,
};

const BACKGROUND: Label = 28;

fn record(address: &str, year: u32, day: u32, label: Option<Label>) -> TransactionRecord {
    TransactionRecord {
        address: address.to_string(),
        year,
        day,
        features: vec![f64::from(day)],
        label,
    }
}

fn table(records: Vec<TransactionRecord>) -> FeatureTable {
    FeatureTable::new(vec!["day".to_string()], records).expect("valid table")
}

#[test]
fn first_occurrence_wins() {
    let t = table(vec![
        record("1A", 2016, 10, Some(3)),
        record("1A", 2016, 20, Some(5)),
        record("1B", 2016, 30, Some(5)),
    ]);
    let lookup = KnownAddressLookup::build(&t, BACKGROUND);
    assert_eq!(lookup.get("1A"), Some(3), "later re-label must not overwrite");
    assert_eq!(lookup.get("1B"), Some(5));
    assert_eq!(lookup.len(), 2);
}

#[test]
fn background_and_unlabeled_rows_are_skipped() {
    let t = table(vec![
        record("bg", 2016, 1, Some(BACKGROUND)),
        record("none", 2016, 2, None),
        record("bg-then-family", 2016, 3, Some(BACKGROUND)),
        record("bg-then-family", 2016, 4, Some(9)),
    ]);
    let lookup = KnownAddressLookup::build(&t, BACKGROUND);
    assert!(!lookup.contains("bg"), "background addresses are not memorized");
    assert!(!lookup.contains("none"), "unlabeled rows are not memorized");
    assert_eq!(
        lookup.get("bg-then-family"),
        Some(9),
        "a background sighting does not block a later family label"
    );
}

#[test]
fn build_is_idempotent_and_pure() {
    let t = table(vec![
        record("1A", 2016, 10, Some(3)),
        record("1C", 2017, 1, Some(4)),
        record("1A", 2016, 11, Some(8)),
    ]);
    let before = t.clone();
    let first = KnownAddressLookup::build(&t, BACKGROUND);
    let second = KnownAddressLookup::build(&t, BACKGROUND);
    assert_eq!(first, second, "same table must give the same lookup");
    assert_eq!(t, before, "building must not mutate the table");
}

#[test]
fn time_order_decides_first_sighting() {
    // Out of order on disk: the 2017 row comes first.
    let mut t = table(vec![
        record("1A", 2017, 5, Some(6)),
        record("1A", 2016, 200, Some(2)),
    ]);
    assert_eq!(KnownAddressLookup::build(&t, BACKGROUND).get("1A"), Some(6));

    t.sort_by_time();
    assert_eq!(
        KnownAddressLookup::build(&t, BACKGROUND).get("1A"),
        Some(2),
        "after sorting the 2016 sighting is the first"
    );
}

#[test]
fn overlap_counts_rows_not_addresses() {
    let lookup = KnownAddressLookup::build(&table(vec![record("1A", 2016, 1, Some(3))]), BACKGROUND);
    let probe = table(vec![
        record("1A", 2016, 2, None),
        record("1A", 2016, 3, None),
        record("1Z", 2016, 4, None),
    ]);
    assert_eq!(lookup.overlap(&probe), 2);
    assert!(KnownAddressLookup::default().is_empty());
}
