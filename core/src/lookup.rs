//! Known-address lookup: exact-match memory of labeled ransomware addresses.
//!
//! RULE: First occurrence wins. A later row with the same address never
//! overwrites the stored label, so the table's row order decides; callers
//! sort by (year, day) first so the earliest sighting is the one kept.

use crate::{
    table::FeatureTable,
    types::{Address, Label},
};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownAddressLookup {
    entries: HashMap<Address, Label>,
}

impl KnownAddressLookup {
    /// Memorize every non-background, labeled record of `table`.
    pub fn build(table: &FeatureTable, background: Label) -> Self {
        let mut entries = HashMap::new();
        let mut conflicts = 0usize;
        for record in table.records() {
            let Some(label) = record.label.filter(|&l| l != background) else {
                continue;
            };
            match entries.get(&record.address) {
                Some(&kept) if kept != label => conflicts += 1,
                Some(_) => {}
                None => {
                    entries.insert(record.address.clone(), label);
                }
            }
        }
        log::info!(
            "lookup: memorized {} addresses from {} rows ({conflicts} conflicting re-labels ignored)",
            entries.len(),
            table.len()
        );
        Self { entries }
    }

    pub fn get(&self, address: &str) -> Option<Label> {
        self.entries.get(address).copied()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.entries.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many records of `table` would be answered from memory.
    pub fn overlap(&self, table: &FeatureTable) -> usize {
        table.records().iter().filter(|r| self.contains(&r.address)).count()
    }
}
