//! Order-preserving model of `KEY=VALUE` environment files.
//!
//! The document is parsed into an ordered list of lines, mutated in place, and
//! serialized back. Lines the model does not touch (comments, blanks, spacing,
//! anything it does not understand) are reproduced byte-for-byte.

mod document;
mod error;
mod parser;

pub use document::{EnvDocument, Line, SetOutcome};
pub use error::EnvFileError;
pub use parser::parse;

/// Check that a key can be written as `KEY=...` and found again by an
/// anchored literal match.
pub fn validate_key(key: &str) -> Result<(), EnvFileError> {
    if key.is_empty() {
        return Err(EnvFileError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot be empty",
        });
    }
    if key.starts_with('#') {
        return Err(EnvFileError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot start with '#'",
        });
    }
    if key.contains('=') {
        return Err(EnvFileError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot contain '='",
        });
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(EnvFileError::InvalidKey {
            key: key.to_string(),
            reason: "key cannot contain whitespace or control characters",
        });
    }
    Ok(())
}

/// Check that a value survives a write/parse cycle unchanged.
///
/// The format has no quoting, so everything after the first `=` is taken
/// literally. Only characters that would split or truncate the line are
/// refused.
pub fn validate_value(key: &str, value: &str) -> Result<(), EnvFileError> {
    if let Some(c) = value.chars().find(|c| matches!(c, '\n' | '\r' | '\0')) {
        return Err(EnvFileError::InvalidValue {
            key: key.to_string(),
            reason: match c {
                '\0' => "value cannot contain NUL",
                _ => "value cannot contain line breaks",
            },
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("BOT_TOKEN").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("A=B").is_err());
        assert!(validate_key("A B").is_err());
        assert!(validate_key("#A").is_err());
    }

    #[test]
    fn test_validate_value() {
        assert!(validate_value("K", "a/b&c\\d=e#f 'g' \"h\"").is_ok());
        assert!(validate_value("K", "").is_ok());
        assert!(validate_value("K", "line1\nline2").is_err());
        assert!(validate_value("K", "cr\r").is_err());
        assert!(validate_value("K", "nul\0").is_err());
    }
}
