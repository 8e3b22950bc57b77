//! Error types shared by every stage of the engine.

use crate::schema::SchemaViolation;

/// Errors produced while resolving, validating or reconciling configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value failed its parameter definition. Always recoverable.
    #[error(transparent)]
    SchemaViolation(#[from] SchemaViolation),

    /// An externally supplied fragment could not be parsed.
    #[error("Malformed input in {origin}: {reason}")]
    MalformedInput { origin: String, reason: String },

    /// Required identifiers are missing or inconsistent. Nothing may be written.
    #[error("Fatal configuration error: {0}")]
    Fatal(String),

    /// The resolution collaborator chose to cancel.
    #[error("Operation cancelled")]
    Cancelled,
}

impl ConfigError {
    pub fn malformed(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::MalformedInput {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        ConfigError::Fatal(message.into())
    }

    /// Whether the failing unit can be skipped without compromising the result.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConfigError::SchemaViolation(_) | ConfigError::MalformedInput { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = ConfigError::malformed("defaults/defaults.json", "expected object");
        assert_eq!(
            err.to_string(),
            "Malformed input in defaults/defaults.json: expected object"
        );
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_fatal_not_recoverable() {
        assert!(!ConfigError::fatal("project_id is required").is_recoverable());
        assert!(!ConfigError::Cancelled.is_recoverable());
    }
}
