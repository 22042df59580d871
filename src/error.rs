//! Error types for seqflow
//!
//! Degenerate input (zero step, zero size, zero workers) never produces an
//! error: those sequences are simply empty. The only failures come from the
//! concurrent combinators, whose background tasks can panic or be aborted.

use std::any::Any;
use thiserror::Error;
use tokio::task::JoinError;

/// Main error type for seqflow operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeqError {
    /// A worker task panicked while processing an item
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
    /// A background task was aborted before it finished
    #[error("operation cancelled")]
    Cancelled,
    /// A background task could not be joined
    #[error("failed to join background task: {0}")]
    Join(String),
}

impl From<JoinError> for SeqError {
    fn from(err: JoinError) -> Self {
        if err.is_cancelled() {
            SeqError::Cancelled
        } else if err.is_panic() {
            SeqError::WorkerPanicked(panic_message(err.into_panic().as_ref()))
        } else {
            SeqError::Join(err.to_string())
        }
    }
}

/// Result type for seqflow operations
pub type SeqResult<T> = Result<T, SeqError>;

/// Best-effort rendering of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
