/// db-bridge Error Module
///
/// This module defines the error types shared across the crate. Every
/// failure surfaces to the caller as a `BridgeError`; nothing is retried
/// or recovered internally, and the originating driver error is kept as
/// the source so callers can inspect the real cause.
use thiserror::Error;

/// A driver-level error from one of the wrapped client libraries.
///
/// Kept as a separate enum so that `BridgeError::Connection` and
/// `BridgeError::Query` can both carry the original cause regardless of
/// which backend produced it.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Mysql(#[from] mysql::Error),

    #[error(transparent)]
    Postgres(#[from] postgres::Error),
}

/// Error type covering every failure mode of the crate:
/// - Configuration resolution (missing file, missing profile, bad keys)
/// - Driver selection (unknown driver tag)
/// - Connection establishment and query execution (wrapping driver errors)
/// - Statement permission guards
/// - Lookup helpers that were told a missing row is fatal
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration loading and resolution errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown driver tag in a profile or credentials record
    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    /// The driver failed to open a connection
    #[error("Connection error: {0}")]
    Connection(#[source] DriverError),

    /// The driver failed to execute or fetch
    #[error("Query error: {0}")]
    Query(#[source] DriverError),

    /// A disallowed SQL command was attempted
    #[error("Permission error: {0}")]
    Permission(String),

    /// A uniqueness lookup matched zero rows and was told to treat that as fatal
    #[error("Not found: {0}")]
    NotFound(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Wraps a driver error that occurred while opening a connection.
    pub fn connection(err: impl Into<DriverError>) -> Self {
        BridgeError::Connection(err.into())
    }

    /// Wraps a driver error that occurred while executing or fetching.
    pub fn query(err: impl Into<DriverError>) -> Self {
        BridgeError::Query(err.into())
    }
}

/// Type alias for Result to use BridgeError as the error type.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = BridgeError::Config("profile 'x' not found".to_string());
        assert!(config_err.to_string().contains("Configuration error"));

        let driver_err = BridgeError::UnsupportedDriver("oracle".to_string());
        assert_eq!(driver_err.to_string(), "Unsupported driver: oracle");

        let perm_err = BridgeError::Permission("no WHERE clause".to_string());
        assert!(perm_err.to_string().contains("Permission error"));
    }

    #[test]
    fn test_driver_error_source_preserved() {
        use std::error::Error;

        let err = BridgeError::query(rusqlite::Error::ExecuteReturnedResults);
        assert!(err.to_string().contains("Query error"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BridgeError = io_err.into();
        match err {
            BridgeError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }
    }
}
