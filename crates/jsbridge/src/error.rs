//! Error types for the bridge.
//!
//! Every failure crossing the bridge is one of three kinds: the host misused
//! the bridge, ahead-of-time compilation failed, or running script raised an
//! exception. Engine exceptions never escape as anything else.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur at the bridge boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The bridge was used incorrectly: a foreign or stale handle, a malformed
    /// artifact, a value of the wrong type, an invalid configuration.
    #[error("invalid use of the bridge: {0}")]
    Host(String),

    /// Ahead-of-time compilation of source text failed.
    #[error("JavaScript compilation error: {0}")]
    Compile(String),

    /// An exception was raised while running script.
    #[error("JavaScript exception: {message}")]
    Script {
        message: String,
        stack: Option<String>,
    },
}

/// Discriminant of [`Error`], stable across the C ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Host,
    Script,
    Compile,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Host => "host",
            ErrorKind::Script => "script",
            ErrorKind::Compile => "compile",
        };
        f.write_str(name)
    }
}

impl Error {
    pub fn host(message: impl Into<String>) -> Self {
        Error::Host(message.into())
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Error::Compile(message.into())
    }

    pub fn script(message: impl Into<String>) -> Self {
        Error::Script {
            message: message.into(),
            stack: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Host(_) => ErrorKind::Host,
            Error::Compile(_) => ErrorKind::Compile,
            Error::Script { .. } => ErrorKind::Script,
        }
    }

    /// The message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Error::Host(msg) | Error::Compile(msg) => msg,
            Error::Script { message, .. } => message,
        }
    }

    /// The script stack trace, when the engine produced one.
    pub fn stack(&self) -> Option<&str> {
        match self {
            Error::Script { stack, .. } => stack.as_deref(),
            _ => None,
        }
    }

    /// Whether the message (or stack trace) contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.message().contains(needle) || self.stack().is_some_and(|s| s.contains(needle))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Host(format!("I/O error: {}", err))
    }
}
