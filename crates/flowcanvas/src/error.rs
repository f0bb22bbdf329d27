//! Error types for flowcanvas host operations.
//!
//! Gesture-level problems (unresolved links, malformed drops, rejected
//! resizes, clipboard failures) never reach the host; they are logged and
//! handled where they occur. [`CanvasError`] covers the host-facing entry
//! points only: loading documents, validating configuration and exporting.

use std::io;

use thiserror::Error;

/// The main error type for flowcanvas host operations.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{err}")]
    Document { err: serde_json::Error, src: String },

    #[error("Export error: {0}")]
    Export(#[from] crate::export::Error),
}

impl CanvasError {
    /// Create a new `Document` error with the associated source text.
    pub fn new_document_error(err: serde_json::Error, src: impl Into<String>) -> Self {
        Self::Document {
            err,
            src: src.into(),
        }
    }
}
