//! Error types for dwell-core

use thiserror::Error;

/// A backend call that rejected, errored or timed out.
///
/// Cloneable so one failure can be handed to every caller joined on the
/// same in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{call} failed: {message}")]
pub struct RpcError {
    /// Name of the backend call
    pub call: &'static str,
    /// Message reported by the backend
    pub message: String,
}

impl RpcError {
    pub fn new(call: &'static str, message: impl Into<String>) -> Self {
        Self {
            call,
            message: message.into(),
        }
    }
}

/// Main error type for the dwell-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Backend RPC failure, surfaced unchanged
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for dwell-core
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_error_is_transparent() {
        let err: Error = RpcError::new("app_detail", "no such app").into();
        assert_eq!(err.to_string(), "app_detail failed: no such app");
    }
}
