//! Train/test splitting and stratified k-fold partitioning.

use crate::{
    error::{HeistError, HeistResult},
    rng::{RngBank, StreamSlot},
    types::Label,
};
use std::collections::BTreeMap;

/// Row indices of one side of a split, in permutation order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainTest {
    pub train: Vec<usize>,
    pub test:  Vec<usize>,
}

/// Shuffle `0..n` with `seed` and hold out `ceil(test_fraction * n)` rows.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> HeistResult<TrainTest> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(HeistError::InvalidConfig {
            reason: format!("test fraction must be in (0, 1), got {test_fraction}"),
        });
    }
    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(HeistError::DegenerateTarget {
            reason: format!("cannot split {n} rows with test fraction {test_fraction}"),
        });
    }

    let mut order: Vec<usize> = (0..n).collect();
    RngBank::new(seed).for_stream(StreamSlot::Split).shuffle(&mut order);
    let train = order.split_off(n_test);
    Ok(TrainTest { train, test: order })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train:      Vec<usize>,
    pub validation: Vec<usize>,
}

/// Stratified k-fold without shuffling: each class's rows are dealt
/// round-robin across folds in row order.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    pub folds: usize,
}

impl StratifiedKFold {
    pub fn new(folds: usize) -> Self {
        Self { folds }
    }

    pub fn split(&self, labels: &[Label]) -> HeistResult<Vec<Fold>> {
        if self.folds < 2 {
            return Err(HeistError::InvalidConfig {
                reason: format!("cross-validation needs at least 2 folds, got {}", self.folds),
            });
        }
        if labels.len() < self.folds {
            return Err(HeistError::DegenerateTarget {
                reason: format!("{} rows cannot fill {} folds", labels.len(), self.folds),
            });
        }

        let mut by_class: BTreeMap<Label, Vec<usize>> = BTreeMap::new();
        for (i, &label) in labels.iter().enumerate() {
            by_class.entry(label).or_default().push(i);
        }
        if let Some((label, rows)) = by_class.iter().find(|(_, rows)| rows.len() < self.folds) {
            log::warn!(
                "cv: class {label} has {} rows, fewer than {} folds",
                rows.len(),
                self.folds
            );
        }

        let mut fold_of = vec![0usize; labels.len()];
        let mut next = 0usize;
        for rows in by_class.values() {
            for &row in rows {
                fold_of[row] = next % self.folds;
                next += 1;
            }
        }

        Ok((0..self.folds)
            .map(|k| {
                let (validation, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&i| fold_of[i] == k);
                Fold { train, validation }
            })
            .collect())
    }
}
