//! Error types for cotejo
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)
//!
//! Only startup validation errors propagate to the caller; anything local to a
//! single registration unit or record is logged and absorbed by the driver.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Cotejo error types
#[derive(Error, Debug)]
pub enum Error {
    /// Cover file missing at startup
    #[error("cover file not found: {0}\nPass the CSV listing reference/moving image and landmark pairs.")]
    CoverNotFound(PathBuf),

    /// Cover file present but lacking required columns
    #[error("cover file is missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    /// Invalid or missing run parameter
    #[error("invalid run configuration: {0}")]
    Config(String),

    /// Landmark file unreadable or malformed
    #[error("landmark file {path}: {reason}")]
    Landmarks {
        /// Offending file
        path: PathBuf,
        /// What went wrong while parsing
        reason: String,
    },

    /// Point sets cannot be compared
    #[error("point sets differ in length: {left} vs {right}")]
    PointCountMismatch {
        /// Left set cardinality
        left: usize,
        /// Right set cardinality
        right: usize,
    },

    /// Result table parse or persist problem
    #[error("result table error: {0}")]
    Table(String),

    /// Worker pool construction failed
    #[error("failed to build worker pool: {0}")]
    Pool(String),

    /// External registration command failed
    #[error("registration command failed with {status}: {command}")]
    CommandFailed {
        /// Exit status description
        status: String,
        /// The shell line that failed
        command: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
