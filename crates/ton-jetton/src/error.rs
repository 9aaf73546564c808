//! Error types for Jetton operations.

use thiserror::Error;

/// Errors that can occur during Jetton operations.
#[derive(Debug, Error)]
pub enum JettonError {
    /// Cell operation error.
    #[error("Cell error: {0}")]
    CellError(#[from] ton_cell::CellError),

    /// Get method returned unexpected result.
    #[error("Unexpected get method result: {0}")]
    UnexpectedResult(String),

    /// Stack is empty or has insufficient entries.
    #[error("Stack underflow: expected {expected} entries, got {actual}")]
    StackUnderflow { expected: usize, actual: usize },

    /// Invalid stack entry type.
    #[error("Invalid stack entry type: expected {expected}, got {actual}")]
    InvalidStackEntry {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Result type for Jetton operations.
pub type JettonResult<T> = Result<T, JettonError>;
