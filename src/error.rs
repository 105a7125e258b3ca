//! Error types for the cortical engine.
//!
//! This module provides a unified error type for all fallible operations,
//! using the `thiserror` crate for ergonomic error handling.
//!
//! Fatal conditions (missing config files, serialization failures) surface
//! as `Err` values for the caller to abort on. Non-fatal domain errors
//! (an integer outside the encodable range, a bit probe out of bounds) are
//! *not* represented here: those return empty results and emit a `log`
//! diagnostic, and callers treat them as no-ops.

use thiserror::Error;

/// The main error type for cortical operations.
#[derive(Error, Debug)]
pub enum CorticalError {
    /// A configuration parameter failed validation
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Worker pool could not be built
    #[error("worker pool: {0}")]
    Pool(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error occurred
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration parse error
    #[error("config parse error: {0}")]
    Config(#[from] serde_json::Error),
}

/// A specialized `Result` type for cortical operations.
pub type Result<T> = std::result::Result<T, CorticalError>;
