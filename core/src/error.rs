use thiserror::Error;

#[derive(Error, Debug)]
pub enum HeistError {
    #[error("Input missing: expected dataset at {path}")]
    InputMissing { path: String },

    #[error("Schema mismatch: expected columns {expected:?}, got {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual:   Vec<String>,
    },

    #[error("Row {row} has no label")]
    MissingLabel { row: usize },

    #[error("Row {row} is out of range for a table of {len} rows")]
    RowOutOfRange { row: usize, len: usize },

    #[error("Invalid hyperparameter '{param}': {reason}")]
    InvalidHyperparameter { param: &'static str, reason: String },

    #[error("Degenerate target: {reason}")]
    DegenerateTarget { reason: String },

    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type HeistResult<T> = Result<T, HeistError>;
