//! Integration tests for the rare-family filter applied before the search.
//!
//! A family needs more than MIN_CLASS_OCCURRENCES rows to stay in.

use heist_core::{
    error::HeistError,
    table::{FeatureTable, TransactionRecord, MIN_CLASS_OCCURRENCES},
    types::Label,
};

fn table_with_counts(counts: &[(Label, usize)]) -> FeatureTable {
    let mut records = Vec::new();
    for &(label, count) in counts {
        for i in 0..count {
            records.push(TransactionRecord {
                address: format!("{label}-{i}"),
                year: 2016,
                day: i as u32,
                features: vec![i as f64],
                label: Some(label),
            });
        }
    }
    FeatureTable::new(vec!["x".to_string()], records).expect("valid table")
}

#[test]
fn threshold_is_four() {
    assert_eq!(MIN_CLASS_OCCURRENCES, 4);
}

#[test]
fn family_with_four_rows_is_dropped() {
    let t = table_with_counts(&[(1, 4), (2, 10)]);
    let kept = t.retain_frequent_classes(MIN_CLASS_OCCURRENCES);
    assert!(!kept.label_counts().contains_key(&1), "4 occurrences is not enough");
    assert_eq!(kept.len(), 10);
}

#[test]
fn family_with_five_rows_is_kept() {
    let t = table_with_counts(&[(1, 5), (2, 10)]);
    let kept = t.retain_frequent_classes(MIN_CLASS_OCCURRENCES);
    assert_eq!(kept.label_counts().get(&1), Some(&5), "5 occurrences must survive");
    assert_eq!(kept.len(), 15);
}

#[test]
fn filter_preserves_row_order() {
    let t = table_with_counts(&[(3, 6), (4, 1), (5, 7)]);
    let kept = t.retain_frequent_classes(MIN_CLASS_OCCURRENCES);
    let addresses: Vec<&str> = kept.records().iter().map(|r| r.address.as_str()).collect();
    assert_eq!(addresses.first(), Some(&"3-0"));
    assert_eq!(addresses.last(), Some(&"5-6"));
    assert_eq!(kept.columns(), t.columns(), "schema is unchanged");
}

#[test]
fn select_keeps_the_requested_order() {
    let t = table_with_counts(&[(1, 3), (2, 2)]);
    let picked = t.select(&[4, 0]).unwrap();
    let addresses: Vec<&str> = picked.records().iter().map(|r| r.address.as_str()).collect();
    assert_eq!(addresses, vec!["2-1", "1-0"]);
}

#[test]
fn select_past_the_end_is_an_error() {
    let t = table_with_counts(&[(1, 3)]);
    assert!(matches!(t.select(&[0, 3]), Err(HeistError::RowOutOfRange { row: 3, len: 3 })));
}
