//! Error types for unform library.

use std::io;
use thiserror::Error;

/// Result type alias for unform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur at the crate boundary.
///
/// The reconciliation walk itself never fails; per-field problems are
/// reported as [`Issue`](crate::render::Issue)s on the result instead.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed JSON input.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The block graph could not be built from the input.
    #[error("Invalid block graph: {0}")]
    InvalidBlockGraph(String),

    /// The schema template has an unsupported shape.
    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    /// Error during rendering of the output record.
    #[error("Rendering error: {0}")]
    Render(String),
}
