//! Errors raised while loading or validating render options.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or checking `RenderOptions`.
#[derive(Error, Debug)]
pub enum OptionsError {
    #[error("IO error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid option `{name}`: {message}")]
    Invalid { name: &'static str, message: String },
}

impl OptionsError {
    pub(crate) fn invalid(name: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            message: message.into(),
        }
    }
}

/// Result type for option handling.
pub type OptionsResult<T> = Result<T, OptionsError>;
