//! Error types for domain processing

use thiserror::Error;

/// Result type alias for domain processing operations
pub type Result<T> = std::result::Result<T, ProcessError>;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("invalid location: end {end} is before start {start}")]
    InvalidLocation { start: usize, end: usize },

    #[error("protein {0} has zero length")]
    EmptyProtein(String),

    #[error("length of protein {0} is unknown (no length and no sequence)")]
    UnknownLength(String),

    #[error("consensus statistics failed: {0}")]
    Consensus(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}
