//! Environment file errors.

use thiserror::Error;

/// Errors raised when mutating an environment document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvFileError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: &'static str },
}
