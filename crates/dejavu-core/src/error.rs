//! Error types for dejavu.

use thiserror::Error;

/// Result type alias using dejavu's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dejavu operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Media could not be decoded (bad image, unreadable video, no frames)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Search operation failed
    #[error("Search error: {0}")]
    Search(String),

    /// Chat platform send/edit/resolve failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Full-history session could not be opened or broke mid-iteration
    #[error("History session error: {0}")]
    History(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must abort an enclosing sweep or command.
    ///
    /// Store, configuration and history-session failures are fatal. Download,
    /// decode, embedding and send failures only affect the item at hand.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Config(_) | Error::History(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("chat state".to_string());
        assert_eq!(err.to_string(), "Not found: chat state");
    }

    #[test]
    fn test_error_display_decode() {
        let err = Error::Decode("no frames".to_string());
        assert_eq!(err.to_string(), "Decode error: no frames");
    }

    #[test]
    fn test_error_display_transport() {
        let err = Error::Transport("429 Too Many Requests".to_string());
        assert_eq!(err.to_string(), "Transport error: 429 Too Many Requests");
    }

    #[test]
    fn test_error_display_history() {
        let err = Error::History("session expired".to_string());
        assert_eq!(err.to_string(), "History session error: session expired");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::History("x".into()).is_fatal());
        assert!(Error::Config("x".into()).is_fatal());
        assert!(Error::Database(sqlx::Error::PoolClosed).is_fatal());

        assert!(!Error::Decode("x".into()).is_fatal());
        assert!(!Error::Embedding("x".into()).is_fatal());
        assert!(!Error::Transport("x".into()).is_fatal());
        assert!(!Error::Request("x".into()).is_fatal());
        assert!(!Error::Internal("x".into()).is_fatal());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
