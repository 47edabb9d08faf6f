use std::fmt;

/// A position in the original query text, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A SPARQL parse error, carrying position and a humanized message with a likely cause.
#[derive(Debug, thiserror::Error)]
#[error("parse error at {position}: {message}")]
pub struct ParseError {
    pub position: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        ParseError { position, message: message.into() }
    }
}

/// Query text size cap.
pub const MAX_QUERY_BYTES: usize = 1024 * 1024;
/// Parser recursion depth cap.
pub const MAX_PARSE_DEPTH: u32 = 128;
