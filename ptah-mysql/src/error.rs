//! Error types for MySQL operations.

use std::fmt;
use std::time::Duration;

use ptah_migrate::MigrationError;
use thiserror::Error;

/// Result type for MySQL operations.
pub type MysqlResult<T> = Result<T, MysqlError>;

/// Error type for MySQL operations.
#[derive(Debug, Error)]
pub enum MysqlError {
    /// MySQL driver error.
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A catalog row could not be decoded.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Timeout error.
    #[error("Timeout error: operation exceeded {0:?}")]
    Timeout(Duration),
}

impl MysqlError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(msg: impl Into<String>) -> Self {
        Self::Deserialization(msg.into())
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::Connection(_) | Self::Mysql(mysql_async::Error::Io(_))
        )
    }

    /// Server message with its error code, or the driver message.
    pub fn message(&self) -> String {
        match self {
            Self::Mysql(mysql_async::Error::Server(e)) => format!("{} (error {})", e.message, e.code),
            Self::Mysql(e) => e.to_string(),
            Self::Config(msg) | Self::Connection(msg) | Self::Deserialization(msg) => msg.clone(),
            Self::Timeout(_) => self.to_string(),
        }
    }

    /// Convert into a [`MigrationError`] naming the attempted operation.
    pub fn during(self, operation: impl fmt::Display) -> MigrationError {
        match self {
            Self::Timeout(after) => MigrationError::Timeout(after),
            ref e if e.is_connection_error() => MigrationError::connection(e.message()),
            e => MigrationError::database(format!("{operation}: {}", e.message())),
        }
    }
}

impl From<mysql_async::FromRowError> for MysqlError {
    fn from(err: mysql_async::FromRowError) -> Self {
        Self::Deserialization(format!("unexpected row shape: {:?}", err.0))
    }
}

impl From<MysqlError> for MigrationError {
    fn from(err: MysqlError) -> Self {
        match err {
            MysqlError::Timeout(after) => MigrationError::Timeout(after),
            ref e if e.is_connection_error() => MigrationError::connection(e.message()),
            e => MigrationError::database(e.message()),
        }
    }
}
