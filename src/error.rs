//! Errors raised by the file-backed shell around the engine.

use std::io;
use std::path::Path;

use atlantis_core::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Parse error in {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),
}

impl ShellError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        ShellError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    pub fn parse(path: &Path, reason: impl Into<String>) -> Self {
        ShellError::Parse {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the user chose to cancel.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ShellError::Config(ConfigError::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, ShellError>;
