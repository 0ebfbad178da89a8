//! Error handling for the loading layer
//!
//! Buffer and tree operations are total: out-of-range arguments clamp
//! instead of failing, so only the file-loading path reports errors.

use std::fmt;

/// Category of the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// File system or I/O errors
    Io,
    /// Text that could not be decoded in the configured encoding
    Encoding,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "IO"),
            Self::Encoding => write!(f, "Encoding"),
        }
    }
}

/// A structured error from the buffer loading layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferError {
    /// What kind of error occurred
    pub kind: ErrorKind,
    /// Human-readable description
    pub message: String,
}

impl BufferError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Check if the message contains a substring (useful for tests)
    pub fn contains_msg(&self, sub: &str) -> bool {
        self.message.contains(sub)
    }
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BufferError {}

impl From<std::io::Error> for BufferError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string())
    }
}

/// Result alias for loading operations.
pub type Result<T> = std::result::Result<T, BufferError>;

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
