//! Error types for schema handling.

use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while reading a remote schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The SDL text could not be parsed.
    #[error("schema parse error: {message}")]
    Parse {
        /// Parser diagnostic, including the offending input.
        message: String,
    },

    /// The schema parsed but declares nothing usable.
    #[error("schema declares no object types")]
    Empty,
}

impl SchemaError {
    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SchemaError::parse("expected '}'");
        assert_eq!(err.to_string(), "schema parse error: expected '}'");
        assert_eq!(
            SchemaError::Empty.to_string(),
            "schema declares no object types"
        );
    }
}
