//! Error types for the mirror engine.

use docsync_protocol::ProtocolError;
use docsync_schema::SchemaError;
use thiserror::Error;

/// Result type for mirror operations.
pub type MirrorResult<T> = Result<T, MirrorError>;

/// Errors that can occur while mirroring.
///
/// Problems with individual documents are never errors; they surface as
/// skipped entries in a reconcile report.
#[derive(Error, Debug)]
pub enum MirrorError {
    /// Configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The remote has no schema deployed for the dataset.
    #[error("remote schema unavailable: {hint}")]
    SchemaUnavailable {
        /// What the user should do about it.
        hint: String,
    },

    /// The remote schema could not be parsed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// The remote rejected the credentials.
    #[error("authentication failed: {0}")]
    Auth(AuthFailure),

    /// The host node store failed.
    #[error("node store error: {0}")]
    NodeStore(String),

    /// A remote call did not finish in time.
    #[error("operation timed out")]
    Timeout,

    /// The operation was cancelled.
    #[error("mirror cancelled")]
    Cancelled,

    /// A remote payload could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Local file access failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why the remote rejected a request.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The token is unknown or malformed.
    #[error("the token is invalid")]
    InvalidCredential,
    /// The session behind the token has expired.
    #[error("the session has expired; create a new token")]
    ExpiredCredential,
    /// The token belongs to a different project.
    #[error("the token does not belong to this project")]
    ProjectMismatch,
}

impl AuthFailure {
    /// Classifies an authorization failure from the status code and message
    /// the remote answered with. Returns `None` for non-auth statuses.
    pub fn classify(status: u16, message: &str) -> Option<Self> {
        let message = message.to_ascii_lowercase();
        match status {
            401 if message.contains("expired") => Some(Self::ExpiredCredential),
            401 => Some(Self::InvalidCredential),
            403 if message.contains("project") => Some(Self::ProjectMismatch),
            403 => Some(Self::InvalidCredential),
            _ => None,
        }
    }
}

impl MirrorError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates the error raised when no schema is deployed.
    pub fn schema_unavailable(dataset: &str, tag: &str) -> Self {
        Self::SchemaUnavailable {
            hint: format!(
                "no GraphQL API is deployed for dataset \"{dataset}\" with tag \"{tag}\"; \
                 deploy one with `sanity graphql deploy` and restart"
            ),
        }
    }

    /// Maps an unsuccessful remote status to an error.
    pub fn from_remote_status(status: u16, message: &str) -> Self {
        if let Some(failure) = AuthFailure::classify(status, message) {
            return Self::Auth(failure);
        }
        let message = format!("remote answered {status}: {message}");
        match status {
            408 | 429 | 500..=599 => Self::transport_retryable(message),
            _ => Self::transport_fatal(message),
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            MirrorError::Transport { retryable, .. } => *retryable,
            MirrorError::Timeout => true,
            _ => false,
        }
    }
}
