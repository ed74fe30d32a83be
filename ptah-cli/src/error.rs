//! CLI error types and result alias.

use miette::Diagnostic;
use ptah_migrate::MigrationError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(ptah::cli::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(code(ptah::cli::config))]
    Config(String),

    /// No database URL anywhere
    #[error("no database URL given")]
    #[diagnostic(
        code(ptah::cli::missing_dsn),
        help("pass one as an argument, set DATABASE_URL, or add `url` under [database] in ptah.toml")
    )]
    MissingDsn,

    /// A URL scheme with no driver
    #[error("unsupported dialect in database URL: {0}")]
    #[diagnostic(
        code(ptah::cli::unsupported_dialect),
        help("use a postgres://, postgresql://, mysql:// or mariadb:// URL")
    )]
    UnsupportedDialect(String),

    /// Schema scanning error
    #[error("Schema error: {0}")]
    #[diagnostic(code(ptah::cli::schema))]
    Schema(String),

    /// Database error
    #[error("Database error: {0}")]
    #[diagnostic(code(ptah::cli::database))]
    Database(String),

    /// Migration error
    #[error("{0}")]
    #[diagnostic(code(ptah::cli::migration))]
    Migration(#[from] MigrationError),

    /// Ctrl-C
    #[error("interrupted")]
    #[diagnostic(code(ptah::cli::interrupted))]
    Interrupted,
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Interrupted => 130,
            _ => 1,
        }
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {err}"))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Config(format!("Failed to serialize JSON: {err}"))
    }
}

impl From<ptah_schema::SchemaError> for CliError {
    fn from(err: ptah_schema::SchemaError) -> Self {
        CliError::Schema(err.to_string())
    }
}

impl From<ptah_postgres::PgError> for CliError {
    fn from(err: ptah_postgres::PgError) -> Self {
        CliError::Database(err.to_string())
    }
}

impl From<ptah_mysql::MysqlError> for CliError {
    fn from(err: ptah_mysql::MysqlError) -> Self {
        CliError::Database(err.to_string())
    }
}
