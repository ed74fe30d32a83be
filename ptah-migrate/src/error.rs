//! Error types for generation, introspection and migrations.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Could not connect to the database.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Database operation error.
    #[error("Database error: {0}")]
    Database(String),

    /// A catalog query failed while reading the live schema.
    #[error("Introspection failed while {phase}: {message}")]
    Introspection {
        /// What was being read.
        phase: String,
        /// Driver message.
        message: String,
    },

    /// A connection string scheme with no driver.
    #[error("Unsupported dialect: {0}")]
    UnsupportedDialect(String),

    /// Schema scanning error.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid migration file or format.
    #[error("Invalid migration: {0}")]
    InvalidMigration(String),

    /// Two migrations registered with one version.
    #[error("Duplicate migration version {0}")]
    DuplicateVersion(i64),

    /// A migration failed and its transaction was rolled back.
    #[error("Migration {version} failed and was rolled back: {message}")]
    MigrationFailed {
        /// Version of the failing migration.
        version: i64,
        /// Underlying error.
        message: String,
    },

    /// Template substitution failed.
    #[error("Template error: {0}")]
    Template(String),

    /// A statement exceeded the configured timeout.
    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// No changes to migrate.
    #[error("No schema changes detected")]
    NoChanges,

    /// General migration error.
    #[error("Migration error: {0}")]
    Other(String),
}

impl MigrationError {
    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create an introspection error for a phase.
    pub fn introspection(phase: impl Into<String>, message: impl ToString) -> Self {
        Self::Introspection {
            phase: phase.into(),
            message: message.to_string(),
        }
    }

    /// Create a template error.
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    /// Create a migration file error.
    pub fn migration_file(msg: impl Into<String>) -> Self {
        Self::InvalidMigration(msg.into())
    }

    /// Create an other error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this is a recoverable error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoChanges | Self::Timeout(_))
    }
}

impl From<ptah_schema::SchemaError> for MigrationError {
    fn from(err: ptah_schema::SchemaError) -> Self {
        Self::Schema(err.to_string())
    }
}
