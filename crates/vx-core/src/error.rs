//! Error types for voxstat

use thiserror::Error;

/// voxstat error type
#[derive(Error, Debug)]
pub enum Error {
    /// Reading an input volume, or creating or writing an output volume
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON in a volume header sidecar (`<file>.json`) or a run
    /// options file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed input set or options. Raised before any position is fitted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Stream desynchronization or malformed volume data discovered mid-run.
    #[error("Computation error: {0}")]
    Computation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
