//! Run identifiers embedded in issue and comment text.
//!
//! Grammar: the marker `RunnerID:` immediately followed by one or more
//! characters from `[A-Za-z0-9_-]`. The first well-formed occurrence in the
//! text wins; a marker with nothing valid after it is skipped. The token is
//! opaque and never interpreted further.

use std::fmt;

pub const MARKER: &str = "RunnerID:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(String);

impl RunId {
    /// Returns `None` when `value` is empty or contains characters outside the
    /// token alphabet.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() || !value.chars().all(is_token_char) {
            return None;
        }
        Some(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The context line written into issue bodies and comments.
    pub fn context_line(&self) -> String {
        format!("{MARKER}{}", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

pub fn parse(text: &str) -> Option<RunId> {
    let mut rest = text;
    while let Some(idx) = rest.find(MARKER) {
        rest = &rest[idx + MARKER.len()..];
        let token: String = rest.chars().take_while(|c| is_token_char(*c)).collect();
        if !token.is_empty() {
            return Some(RunId(token));
        }
    }
    None
}
