//! Shared primitives for all Rust crates in sentinel-purger.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across sentinel-purger crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Failure categories of a purge run.
///
/// Every variant is fatal for the run; nothing is retried locally.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Access token acquisition failed.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Network-level failure, including timeouts and unreadable bodies.
    #[error("transport error: {0}")]
    Transport(String),

    /// The purge endpoint answered with something other than 202 Accepted.
    #[error("purge request rejected (status={status}): {body}")]
    PurgeSubmit {
        /// HTTP status code returned by the management API.
        status: u16,
        /// Raw response body, kept for diagnostics.
        body: String,
    },

    /// The purge was accepted but no operation handle came back.
    #[error("missing operation handle: {0}")]
    MissingOperationHandle(String),

    /// The status endpoint answered with something other than 200 OK.
    #[error("failed to retrieve purge status (status={status}): {body}")]
    StatusFetch {
        /// HTTP status code returned by the status endpoint.
        status: u16,
        /// Raw response body, kept for diagnostics.
        body: String,
    },

    /// The status document was malformed or carried no status.
    #[error("could not parse purge status: {0}")]
    StatusParse(String),

    /// The purge job reported a status outside the in-flight set.
    #[error("unrecognized purge job status: {0}")]
    UnrecognizedStatus(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Prefixes the error message with `context`, keeping the error kind.
    ///
    /// Structured variants keep their status code and fold the context into
    /// the body.
    #[must_use]
    pub fn with_context(self, context: impl AsRef<str>) -> Self {
        let context = context.as_ref();
        match self {
            Self::Config(message) => Self::Config(format!("{context}: {message}")),
            Self::Validation(message) => Self::Validation(format!("{context}: {message}")),
            Self::Auth(message) => Self::Auth(format!("{context}: {message}")),
            Self::Transport(message) => Self::Transport(format!("{context}: {message}")),
            Self::PurgeSubmit { status, body } => Self::PurgeSubmit {
                status,
                body: format!("{context}: {body}"),
            },
            Self::MissingOperationHandle(message) => {
                Self::MissingOperationHandle(format!("{context}: {message}"))
            }
            Self::StatusFetch { status, body } => Self::StatusFetch {
                status,
                body: format!("{context}: {body}"),
            },
            Self::StatusParse(message) => Self::StatusParse(format!("{context}: {message}")),
            Self::UnrecognizedStatus(message) => {
                Self::UnrecognizedStatus(format!("{context}: {message}"))
            }
            Self::Internal(message) => Self::Internal(format!("{context}: {message}")),
        }
    }
}
