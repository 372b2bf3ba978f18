use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Failure taxonomy shared across the platform.
///
/// Transport failures drive reconnects, validation failures drop the
/// offending payload while keeping the connection alive, and persistence
/// failures are logged without ever reaching the broadcast path or the
/// sender. Merge conflicts are not errors; the reconciliation engine
/// resolves them deterministically.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Channel-level failure; the session reconnects and flags the UI.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Empty or malformed payload; dropped, logged, connection kept.
    #[error("validation failure: {0}")]
    Validation(String),

    /// Durable or mirror store failure; isolated per operation.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// JSON error body returned by the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ErrorResponse {
    /// Stable machine-readable code.
    pub code: String,
    /// Human-readable description.
    pub message: String,
}

impl ErrorResponse {
    /// Creates an error body from a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}
