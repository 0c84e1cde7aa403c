//! Top-level error type for the gateway.
//!
//! Component errors (tool, auth, session, registry) flatten into the
//! domain-level kinds the API surface maps onto HTTP statuses.

use thiserror::Error;

use crate::auth::AuthError;
use crate::registry::RegistryError;
use crate::session::SessionError;
use crate::tool::ToolError;

/// Domain-level error kinds.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller-supplied data violates a declared schema or range (400)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Missing, expired, or invalid credentials (401)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted (403)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Unknown session, user, or location (404)
    #[error("not found: {what}")]
    NotFound {
        what: String,
        /// Nearest candidates, when applicable (unknown locations)
        suggestions: Vec<String>,
    },

    /// Duplicate email or conflicting admin operation (409)
    #[error("conflict: {0}")]
    Conflict(String),

    /// The overall request deadline elapsed (408)
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// An external dependency failed after retry (503 when user-fatal)
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Unexpected failure (500)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound {
            what: what.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn not_found_with_suggestions(
        what: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self::NotFound {
            what: what.into(),
            suggestions,
        }
    }
}

impl From<ToolError> for Error {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::InvalidInput(msg) => Self::InvalidInput(msg),
            ToolError::BackendUnavailable(msg) | ToolError::BackendRejected(msg) => {
                Self::BackendUnavailable(msg)
            }
            ToolError::Timeout(msg) => Self::BackendUnavailable(format!("timed out: {}", msg)),
            ToolError::Internal(msg) => Self::Internal(msg),
        }
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials | AuthError::Inactive | AuthError::InvalidToken => {
                Self::Unauthorized(err.to_string())
            }
            AuthError::DuplicateEmail(_) | AuthError::Conflict(_) => {
                Self::Conflict(err.to_string())
            }
            AuthError::PasswordPolicy(msg) => Self::InvalidInput(msg),
            AuthError::UserNotFound(id) => Self::not_found(format!("user {}", id)),
            AuthError::Forbidden(msg) => Self::Forbidden(msg),
            AuthError::Storage(msg) | AuthError::Hash(msg) => Self::Internal(msg),
        }
    }
}

impl From<SessionError> for Error {
    fn from(err: SessionError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;
