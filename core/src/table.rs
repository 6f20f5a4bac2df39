//! Feature table: the labeled rows every stage of the pipeline consumes.
//!
//! RULE: A table's schema is fixed at construction. Every record carries
//! exactly `columns.len()` feature values, and two tables only meet
//! (train vs inference) when their schemas are identical.

use crate::{
    error::{HeistError, HeistResult},
    types::{Address, Label},
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classes with this many occurrences or fewer cannot support
/// cross-validation and are dropped before the family search.
pub const MIN_CLASS_OCCURRENCES: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub address:  Address,
    pub year:     u32,
    pub day:      u32,
    /// Feature values, aligned to the owning table's columns.
    pub features: Vec<f64>,
    pub label:    Option<Label>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    records: Vec<TransactionRecord>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, records: Vec<TransactionRecord>) -> HeistResult<Self> {
        if let Some(bad) = records.iter().find(|r| r.features.len() != columns.len()) {
            return Err(HeistError::LengthMismatch {
                left:  columns.len(),
                right: bad.features.len(),
            });
        }
        Ok(Self { columns, records })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[TransactionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Dense (rows × columns) feature matrix.
    pub fn matrix(&self) -> HeistResult<Array2<f64>> {
        let flat: Vec<f64> = self
            .records
            .iter()
            .flat_map(|r| r.features.iter().copied())
            .collect();
        Ok(Array2::from_shape_vec((self.records.len(), self.columns.len()), flat)?)
    }

    /// Labels in row order. Fails on the first unlabeled row.
    pub fn labels(&self) -> HeistResult<Vec<Label>> {
        self.records
            .iter()
            .enumerate()
            .map(|(row, r)| r.label.ok_or(HeistError::MissingLabel { row }))
            .collect()
    }

    /// Stable sort by (year, day): arrival order is the natural key
    /// for anything that memorizes "first seen".
    pub fn sort_by_time(&mut self) {
        self.records.sort_by_key(|r| (r.year, r.day));
    }

    /// Rows at `indices`, in that order. Any index past the end is an error.
    pub fn select(&self, indices: &[usize]) -> HeistResult<Self> {
        let records = indices
            .iter()
            .map(|&i| {
                self.records.get(i).cloned().ok_or(HeistError::RowOutOfRange {
                    row: i,
                    len: self.records.len(),
                })
            })
            .collect::<HeistResult<Vec<_>>>()?;
        Ok(Self { columns: self.columns.clone(), records })
    }

    pub fn filter<F>(&self, mut keep: F) -> Self
    where
        F: FnMut(&TransactionRecord) -> bool,
    {
        Self {
            columns: self.columns.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Occurrences per label, ordered by label. Unlabeled rows are skipped.
    pub fn label_counts(&self) -> BTreeMap<Label, usize> {
        let mut counts = BTreeMap::new();
        for label in self.records.iter().filter_map(|r| r.label) {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    pub fn ensure_same_schema(&self, expected: &[String]) -> HeistResult<()> {
        if self.columns != expected {
            return Err(HeistError::SchemaMismatch {
                expected: expected.to_vec(),
                actual:   self.columns.clone(),
            });
        }
        Ok(())
    }

    /// Drop every class with `min_exclusive` occurrences or fewer.
    pub fn retain_frequent_classes(&self, min_exclusive: usize) -> Self {
        let counts = self.label_counts();
        self.filter(|r| {
            r.label
                .and_then(|l| counts.get(&l))
                .is_some_and(|&n| n > min_exclusive)
        })
    }
}
