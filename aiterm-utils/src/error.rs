//! Error types for aiterm
//!
//! Provides a unified error type used across all aiterm crates.

use std::path::PathBuf;

/// Main error type for aiterm operations
#[derive(Debug, thiserror::Error)]
pub enum AitermError {
    // === Request validation ===

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // === Session errors ===

    #[error("no such session: {0}")]
    SessionNotFound(String),

    // === Process errors ===

    #[error("failed to spawn process: {0}")]
    Spawn(String),

    #[error("PTY error: {0}")]
    Pty(String),

    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Bridge errors ===

    #[error("bridge error: {0}")]
    Bridge(String),

    // === Configuration errors ===

    #[error("configuration error: {0}")]
    Config(String),

    // === Transport errors (client side) ===

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("server error: {0}")]
    Server(String),

    // === Internal errors ===

    #[error("internal error: {0}")]
    Internal(String),
}

impl AitermError {
    /// Create an invalid-argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a spawn error
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    /// Create a PTY error
    pub fn pty(msg: impl Into<String>) -> Self {
        Self::Pty(msg.into())
    }

    /// Create a bridge error
    pub fn bridge(msg: impl Into<String>) -> Self {
        Self::Bridge(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is the caller's fault (bad request or unknown id)
    /// rather than a failure inside the daemon.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::SessionNotFound(_) | Self::Config(_)
        )
    }
}

/// Result type alias using AitermError
pub type Result<T> = std::result::Result<T, AitermError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AitermError::SessionNotFound("abc12345".into());
        assert_eq!(err.to_string(), "no such session: abc12345");
    }

    #[test]
    fn test_is_client_error() {
        assert!(AitermError::invalid_argument("argv must not be empty").is_client_error());
        assert!(AitermError::SessionNotFound("x".into()).is_client_error());
        assert!(!AitermError::pty("write failed").is_client_error());
        assert!(!AitermError::spawn("no such file").is_client_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: AitermError = io_err.into();
        assert!(matches!(err, AitermError::Io(_)));
    }
}
