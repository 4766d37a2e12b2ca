//! Error types for the forecasting transformer
//!
//! Every forward computation is fallible: a tensor whose shape disagrees with
//! the configured widths or windows stops the call and is returned unchanged
//! to the caller. Nothing is retried and no fallback value is substituted.

use thiserror::Error;

/// Errors raised while building or running the model
#[derive(Error, Debug)]
pub enum TransformerError {
    /// A tensor dimension disagrees with what the operation expects
    #[error("Shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        got: String,
    },

    /// Input sequence is longer than the positional encoding table
    #[error("Sequence length {len} exceeds positional encoding window {window}")]
    SequenceTooLong { len: usize, window: usize },

    /// Configuration rejected by `TransformerConfig::validate`
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TransformerError {
    /// Build a `ShapeMismatch` from any two debug-printable shapes
    pub fn shape_mismatch(
        context: &'static str,
        expected: impl std::fmt::Debug,
        got: impl std::fmt::Debug,
    ) -> Self {
        Self::ShapeMismatch {
            context,
            expected: format!("{:?}", expected),
            got: format!("{:?}", got),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, TransformerError>;
