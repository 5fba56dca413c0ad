//! Error types for the messaging core.

use thiserror::Error;

/// Result type alias for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Errors surfaced by the message store and the phone number parser.
#[derive(Error, Debug)]
pub enum MessagingError {
    /// The input does not reduce to exactly seven digits.
    #[error("Invalid phone number: {0}")]
    InvalidNumber(String),

    /// The number is well formed but has never been seen by the store.
    ///
    /// Read-state and hide operations require an existing number; they
    /// never create one as a side effect.
    #[error("Unknown phone number: {0}")]
    UnknownNumber(String),

    /// No thread exists with this id.
    #[error("Thread not found: {0}")]
    ThreadNotFound(i64),

    /// No text exists with this id.
    #[error("Text not found: {0}")]
    TextNotFound(i64),

    /// The participant set collapsed to the sender alone.
    #[error("No recipients besides the sender")]
    NoRecipients,

    /// Underlying database failure.
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Filesystem failure while opening the database.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = MessagingError::InvalidNumber("12ab".to_string());
        assert_eq!(error.to_string(), "Invalid phone number: 12ab");

        let error = MessagingError::UnknownNumber("555-0001".to_string());
        assert_eq!(error.to_string(), "Unknown phone number: 555-0001");

        let error = MessagingError::ThreadNotFound(42);
        assert_eq!(error.to_string(), "Thread not found: 42");

        let error = MessagingError::TextNotFound(7);
        assert_eq!(error.to_string(), "Text not found: 7");

        let error = MessagingError::NoRecipients;
        assert_eq!(error.to_string(), "No recipients besides the sender");
    }

    #[test]
    fn test_io_error_conversion() {
        use std::io::{Error, ErrorKind};

        let io_error = Error::new(ErrorKind::NotFound, "no such directory");
        let error: MessagingError = io_error.into();
        assert!(matches!(error, MessagingError::Io(_)));
        assert!(error.to_string().contains("no such directory"));
    }
}
