//! Error types and handling
//!
//! Provides the unified error type for the entire crate. Every error
//! carries a kind that tells the caller whether the failure came from a
//! bug, an external system, bad input, or an expired record.

use std::fmt;

use thiserror::Error;

/// Result type for emberdns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A bug or violated precondition inside the crate.
    Internal,
    /// I/O failure or a failure reported by a backend.
    External,
    /// Invalid input from a user or caller.
    Argument,
    /// A record's expiration instant is in the past.
    Expiration,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Internal => write!(f, "InternalError"),
            ErrorKind::External => write!(f, "ExternalError"),
            ErrorKind::Argument => write!(f, "ArgumentError"),
            ErrorKind::Expiration => write!(f, "ExpirationError"),
        }
    }
}

/// Main error type for emberdns
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Internal error (bug or violated precondition)
    #[error("{0}")]
    Internal(String),

    /// External error (I/O or backend failure)
    #[error("{0}")]
    External(String),

    /// Argument error (invalid input)
    #[error("{0}")]
    Argument(String),

    /// Expiration error (record expired)
    #[error("{0}")]
    Expiration(String),

    /// Aggregated errors from a multi-line parse
    #[error("{0}")]
    Set(ErrorSet),
}

impl Error {
    /// Make an internal error from a message.
    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    /// Make an external error from a message.
    pub fn external(message: impl Into<String>) -> Self {
        Error::External(message.into())
    }

    /// Make an argument error from a message.
    pub fn argument(message: impl Into<String>) -> Self {
        Error::Argument(message.into())
    }

    /// Make an expiration error from a message.
    pub fn expiration(message: impl Into<String>) -> Self {
        Error::Expiration(message.into())
    }

    /// Make an internal error with an underlying cause appended.
    pub fn internal_caused(message: &str, cause: impl fmt::Display) -> Self {
        Error::Internal(format!("{}: {}", message, cause))
    }

    /// Make an external error with an underlying cause appended.
    pub fn external_caused(message: &str, cause: impl fmt::Display) -> Self {
        Error::External(format!("{}: {}", message, cause))
    }

    /// Make an argument error with an underlying cause appended.
    pub fn argument_caused(message: &str, cause: impl fmt::Display) -> Self {
        Error::Argument(format!("{}: {}", message, cause))
    }

    /// Get the kind of this error.
    ///
    /// An error set reports the kind of its first member, or
    /// [`ErrorKind::Internal`] when empty.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Internal(_) => ErrorKind::Internal,
            Error::External(_) => ErrorKind::External,
            Error::Argument(_) => ErrorKind::Argument,
            Error::Expiration(_) => ErrorKind::Expiration,
            Error::Set(set) => set.0.first().map(Error::kind).unwrap_or(ErrorKind::Internal),
        }
    }
}

/// List of errors collected from a multi-line parse.
///
/// Displays as one error message per line so the REST layer can hand the
/// whole batch back to the client.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorSet(pub Vec<Error>);

impl ErrorSet {
    /// Create an empty set.
    pub fn new() -> Self {
        ErrorSet(Vec::new())
    }

    /// Append an error to the set.
    pub fn push(&mut self, err: Error) {
        self.0.push(err);
    }

    /// Check whether any error was collected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Turn the set into a result: `Ok(())` when empty, `Err` otherwise.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Set(self))
        }
    }
}

impl fmt::Display for ErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let texts: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", texts.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind() {
        assert_eq!(Error::internal("x").kind(), ErrorKind::Internal);
        assert_eq!(Error::external("x").kind(), ErrorKind::External);
        assert_eq!(Error::argument("x").kind(), ErrorKind::Argument);
        assert_eq!(Error::expiration("x").kind(), ErrorKind::Expiration);
    }

    #[test]
    fn error_display_with_cause() {
        let err = Error::external_caused("failed to open database", "no such file");
        assert_eq!(err.to_string(), "failed to open database: no such file");
    }

    #[test]
    fn error_set_display() {
        let mut set = ErrorSet::new();
        set.push(Error::argument("line 1: invalid format: foo"));
        set.push(Error::argument("line 3: invalid format: bar"));
        let err = Error::Set(set);

        assert_eq!(
            err.to_string(),
            "line 1: invalid format: foo\nline 3: invalid format: bar"
        );
        assert_eq!(err.kind(), ErrorKind::Argument);
    }

    #[test]
    fn error_set_into_result() {
        assert!(ErrorSet::new().into_result().is_ok());

        let mut set = ErrorSet::new();
        set.push(Error::argument("oops"));
        assert!(set.into_result().is_err());
    }

    #[test]
    fn kind_display() {
        assert_eq!(ErrorKind::Internal.to_string(), "InternalError");
        assert_eq!(ErrorKind::Expiration.to_string(), "ExpirationError");
    }
}
