//! Error types for protocol decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while decoding remote payloads.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON could not be parsed or did not match the expected shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A document is missing a required system field.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::InvalidDocument("missing _id".into());
        assert_eq!(err.to_string(), "invalid document: missing _id");

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(ProtocolError::from(json_err).to_string().starts_with("json error"));
    }
}
