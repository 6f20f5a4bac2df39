//! CSV ingestion for the train/test transaction files.

use crate::{
    error::{HeistError, HeistResult},
    types::Label,
};
use serde::Deserialize;
use std::path::Path;

/// One raw row as it appears in the dataset files.
/// Columns not named here (e.g. a pandas index column) are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTransaction {
    pub address:   String,
    pub year:      u32,
    pub day:       u32,
    pub length:    f64,
    pub weight:    f64,
    pub count:     f64,
    pub looped:    f64,
    pub neighbors: f64,
    pub income:    f64,
    #[serde(default)]
    pub label:     Option<Label>,
}

/// Read every row of a dataset file.
/// A missing file is fatal and reported with the expected location.
pub fn read_transactions(path: &Path) -> HeistResult<Vec<RawTransaction>> {
    if !path.is_file() {
        return Err(HeistError::InputMissing {
            path: path.display().to_string(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<Result<Vec<RawTransaction>, csv::Error>>()?;
    log::info!("ingest: read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}
