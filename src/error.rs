//! Error types for Ethochain

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, aggregating or exporting a cohort
#[derive(Debug, Error)]
pub enum EthoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read delimited file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing required column '{column}' in {}", file.display())]
    MissingColumn { file: PathBuf, column: String },

    #[error("Invalid timestamp '{value}' in {} at row {row}", file.display())]
    TimeParse {
        file: PathBuf,
        row: usize,
        value: String,
    },

    #[error("Event {index} of sequence '{sequence}' has no behavioral category")]
    MissingCategory { sequence: String, index: usize },

    #[error("Invalid job configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown grouping policy: {0}")]
    UnknownGroupingPolicy(String),
}
