//! heist-core: ransomware transaction attribution on the Bitcoin heist data.
//!
//! Known-address lookup, a binary background/ransomware gate, and a
//! family classifier, plus the harness that compares family models.

pub mod candidate;
pub mod classifier;
pub mod config;
pub mod error;
pub mod experiment;
pub mod ingest;
pub mod lookup;
pub mod metrics;
pub mod models;
pub mod predictor;
pub mod preprocess;
pub mod rng;
pub mod search;
pub mod split;
pub mod table;
pub mod types;
