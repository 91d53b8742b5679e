//! Error types for mvatrain
//!
//! Every failure in the training core is fatal for the processor being
//! trained: nothing here is retried, and nothing is downgraded to a
//! warning. The orchestrator decides whether a failed processor aborts
//! the whole run.

use thiserror::Error;

/// mvatrain error type
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or incomplete processor configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Numerically degenerate least-squares fit
    #[error("solver error: {0}")]
    Solver(String),

    /// The external fitting toolkit rejected the dataset or failed to fit
    #[error("external toolkit error: {0}")]
    ExternalTool(String),

    /// Artifact payload compression failed
    #[error("codec error: {0}")]
    Codec(String),

    /// Columnar dataset export failed
    #[error("dataset export error: {0}")]
    Export(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
