//! Unified error handling for the session layer.
//!
//! Everything a handler can fail with collapses into [`HandlerError`]: either
//! the connection is gone (the unwind signal the handler stack consumes
//! silently), or a programming error occurred and the stack reports it to the
//! client before tearing the connection down.

use thiserror::Error;

/// Errors that can occur while driving a connection's handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The connection is finished: transport error, EOF, oversized input
    /// buffer, or an explicit close. Terminal for the connection and never
    /// reported to the client.
    #[error("connection closed")]
    Disconnect,

    /// An unexpected internal failure. The handler stack prints a visible
    /// banner with the message, then tears the connection down.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<crate::db::DbError> for HandlerError {
    fn from(e: crate::db::DbError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

/// Result type for handler-layer operations.
pub type HandlerResult<T> = Result<T, HandlerError>;
