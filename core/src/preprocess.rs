//! Raw rows → feature table.
//!
//! RULE: Preprocessing is a pure function of its input rows.
//! No fitted state is carried between calls, so train and test
//! tables built by the same preprocessor always share a schema.

use crate::{
    error::HeistResult,
    ingest::RawTransaction,
    table::{FeatureTable, TransactionRecord},
};

/// Capability: turn raw rows into a feature table.
pub trait Preprocessor {
    fn preprocess(&self, rows: &[RawTransaction]) -> HeistResult<FeatureTable>;
}

/// Feature columns produced by [`HeistPreprocessor`], in order.
pub const FEATURE_COLUMNS: [&str; 8] = [
    "year",
    "day",
    "length",
    "weight",
    "count",
    "looped",
    "neighbors",
    "log_income",
];

/// Default preprocessor. Keeps the graph features as-is, with income
/// (satoshi, spanning several orders of magnitude) on a log scale.
/// The address is kept on the record for the lookup, not as a feature.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeistPreprocessor;

impl Preprocessor for HeistPreprocessor {
    fn preprocess(&self, rows: &[RawTransaction]) -> HeistResult<FeatureTable> {
        let columns = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let records = rows
            .iter()
            .map(|row| TransactionRecord {
                address:  row.address.clone(),
                year:     row.year,
                day:      row.day,
                features: vec![
                    f64::from(row.year),
                    f64::from(row.day),
                    row.length,
                    row.weight,
                    row.count,
                    row.looped,
                    row.neighbors,
                    row.income.max(0.0).ln_1p(),
                ],
                label:    row.label,
            })
            .collect();
        FeatureTable::new(columns, records)
    }
}
