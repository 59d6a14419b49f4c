//! Ordered environment document.

use std::fmt;

use crate::error::EnvFileError;
use crate::{validate_key, validate_value};

/// A single line of an environment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// `KEY=VALUE`; the key is everything before the first `=`.
    Entry { key: String, value: String },
    /// A line whose first non-blank character is `#`.
    Comment(String),
    /// An empty line.
    Blank,
    /// Anything else, kept verbatim.
    Other(String),
}

impl Line {
    fn key(&self) -> Option<&str> {
        match self {
            Line::Entry { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Entry { key, value } => write!(f, "{}={}", key, value),
            Line::Comment(text) | Line::Other(text) => f.write_str(text),
            Line::Blank => Ok(()),
        }
    }
}

/// What `EnvDocument::set` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOutcome {
    /// The first matching line was rewritten.
    Replaced { previous: String },
    /// No line matched; a new one was added at the end.
    Appended,
}

/// An environment file as an ordered list of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvDocument {
    lines: Vec<Line>,
    /// Per line: whether the terminator after it is `\r\n`
    crlf: Vec<bool>,
    trailing_newline: bool,
}

impl EnvDocument {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(lines: Vec<Line>, crlf: Vec<bool>, trailing_newline: bool) -> Self {
        debug_assert_eq!(lines.len(), crlf.len());
        Self {
            lines,
            crlf,
            trailing_newline,
        }
    }

    /// All lines in file order.
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Value of the first line whose key matches exactly.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Value of the last line whose key matches exactly.
    ///
    /// This is what dotenv-style loaders end up using when a key repeats.
    pub fn get_last(&self, key: &str) -> Option<&str> {
        self.entries()
            .filter(|(k, _)| *k == key)
            .last()
            .map(|(_, v)| v)
    }

    /// Whether any line carries this key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lines.iter().any(|line| line.key() == Some(key))
    }

    /// `(key, value)` pairs in file order, duplicates included.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            Line::Entry { key, value } => Some((key.as_str(), value.as_str())),
            _ => None,
        })
    }

    /// Keys in file order, duplicates included.
    pub fn keys(&self) -> Vec<&str> {
        self.entries().map(|(k, _)| k).collect()
    }

    /// Replace the first `KEY=` line or append a new one.
    ///
    /// Appended entries are preceded by a blank line when the document is not
    /// empty. The key and value are validated before anything changes.
    pub fn set(&mut self, key: &str, value: &str) -> Result<SetOutcome, EnvFileError> {
        validate_key(key)?;
        validate_value(key, value)?;

        for line in self.lines.iter_mut() {
            if let Line::Entry { key: k, value: v } = line {
                if k == key {
                    let previous = std::mem::replace(v, value.to_string());
                    return Ok(SetOutcome::Replaced { previous });
                }
            }
        }

        let crlf = self.preferred_crlf();
        if !self.trailing_newline {
            if let Some(last) = self.crlf.last_mut() {
                *last = crlf;
            }
        }
        if !self.lines.is_empty() {
            self.push(Line::Blank, crlf);
        }
        self.push(
            Line::Entry {
                key: key.to_string(),
                value: value.to_string(),
            },
            crlf,
        );
        self.trailing_newline = true;
        Ok(SetOutcome::Appended)
    }

    fn push(&mut self, line: Line, crlf: bool) {
        self.lines.push(line);
        self.crlf.push(crlf);
    }

    /// Terminator of the last terminated line; `\n` when there is none.
    fn preferred_crlf(&self) -> bool {
        let terminated = if self.trailing_newline {
            self.crlf.len()
        } else {
            self.crlf.len().saturating_sub(1)
        };
        self.crlf[..terminated].last().copied().unwrap_or(false)
    }
}

impl fmt::Display for EnvDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let last = self.lines.len().saturating_sub(1);
        for (i, (line, crlf)) in self.lines.iter().zip(&self.crlf).enumerate() {
            write!(f, "{}", line)?;
            if i < last || self.trailing_newline {
                f.write_str(if *crlf { "\r\n" } else { "\n" })?;
            }
        }
        Ok(())
    }
}
