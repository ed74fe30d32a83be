//! Error types for PostgreSQL operations.

use std::fmt;
use std::time::Duration;

use ptah_migrate::MigrationError;
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// A catalog row had an unexpected shape.
    #[error("unexpected catalog row: {0}")]
    Row(String),

    /// Timeout error.
    #[error("operation timed out after {0}ms")]
    Timeout(u64),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a timeout error.
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout(after.as_millis() as u64)
    }

    /// Check if this is a connection error.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Config(_) | Self::Connection(_) => true,
            Self::Postgres(e) => e.is_closed(),
            _ => false,
        }
    }

    /// Check if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Server message with its SQLSTATE, or the driver message.
    pub fn message(&self) -> String {
        match self {
            Self::Postgres(e) => match e.as_db_error() {
                Some(db) => format!("{} (SQLSTATE {})", db.message(), db.code().code()),
                None => e.to_string(),
            },
            Self::Config(msg) | Self::Connection(msg) | Self::Row(msg) => msg.clone(),
            Self::Timeout(_) => self.to_string(),
        }
    }

    /// Convert into a [`MigrationError`] naming the attempted operation.
    pub fn during(self, operation: impl fmt::Display) -> MigrationError {
        match self {
            Self::Timeout(ms) => MigrationError::Timeout(Duration::from_millis(ms)),
            ref e if e.is_connection_error() => MigrationError::connection(e.message()),
            e => MigrationError::database(format!("{operation}: {}", e.message())),
        }
    }
}

impl From<PgError> for MigrationError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Timeout(ms) => MigrationError::Timeout(Duration::from_millis(ms)),
            ref e if e.is_connection_error() => MigrationError::connection(e.message()),
            e => MigrationError::database(e.message()),
        }
    }
}
