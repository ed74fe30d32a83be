//! Command implementations for the ptah CLI.

pub mod bootstrap;
pub mod db;
pub mod generate;
pub mod migrate;

use std::path::Path;

use ptah_migrate::{DatabaseConnection, IntrospectionConfig};
use ptah_mysql::MysqlConnection;
use ptah_postgres::PgConnection;
use ptah_schema::{Dialect, SchemaModel, parse_directory};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CliError, CliResult};
use crate::output;

/// State shared by every command.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub config: Config,
}

impl Context {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Introspection settings that hide the configured tracking table.
    pub fn introspection_config(&self) -> IntrospectionConfig {
        IntrospectionConfig::default().exclude_table(self.config.migrations.table_name.clone())
    }
}

/// Scan a source directory, reporting diagnostics and dependency problems as
/// warnings.
pub fn load_model(dir: &Path) -> CliResult<SchemaModel> {
    let outcome = parse_directory(dir)?;
    for diagnostic in &outcome.diagnostics {
        output::warn(&diagnostic.to_string());
    }

    let resolution = outcome.model.resolve();
    for cycle in &resolution.cycles {
        output::warn(&format!(
            "foreign key cycle between {}; those constraints are added after the tables",
            cycle.join(", ")
        ));
    }
    for (table, target) in &resolution.unresolved {
        output::warn(&format!("table {table} references undeclared table {target}"));
    }
    if outcome.model.tables.is_empty() {
        output::warn(&format!("no tables declared under {}", dir.display()));
    }

    info!(
        tables = outcome.model.tables.len(),
        enums = outcome.model.enums.len(),
        diagnostics = outcome.diagnostics.len(),
        "loaded schema model"
    );
    Ok(outcome.model)
}

/// Dialect of a DSN, or an error naming the scheme.
pub fn dialect_for(dsn: &str) -> CliResult<Dialect> {
    Dialect::from_dsn(dsn).ok_or_else(|| {
        let scheme = dsn.split_once("://").map_or("<none>", |(scheme, _)| scheme);
        CliError::UnsupportedDialect(scheme.to_string())
    })
}

/// Open a connection with the driver matching the DSN scheme.
pub async fn connect(dsn: &str) -> CliResult<Box<dyn DatabaseConnection>> {
    let conn: Box<dyn DatabaseConnection> = match dialect_for(dsn)? {
        Dialect::Postgres => Box::new(PgConnection::connect_url(dsn).await?),
        Dialect::MySql => Box::new(MysqlConnection::connect_url(dsn).await?),
        Dialect::Generic => return Err(CliError::UnsupportedDialect("generic".to_string())),
    };
    debug!(dialect = %conn.dialect(), database = conn.database_name(), "connected");
    Ok(conn)
}

/// Run statements in one transaction, rolling back on the first failure.
pub async fn execute_all(conn: &mut dyn DatabaseConnection, statements: &[String]) -> CliResult<()> {
    conn.begin().await?;
    for sql in statements {
        if let Err(e) = conn.execute(sql).await {
            if let Err(rollback) = conn.rollback().await {
                warn!(error = %rollback, "rollback failed");
            }
            return Err(e.into());
        }
    }
    conn.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_for() {
        assert_eq!(dialect_for("postgresql://localhost/db").unwrap(), Dialect::Postgres);
        assert_eq!(dialect_for("mariadb://localhost/db").unwrap(), Dialect::MySql);

        let err = dialect_for("sqlite://data.db").unwrap_err();
        assert_eq!(err.to_string(), "unsupported dialect in database URL: sqlite");
        assert!(matches!(dialect_for("localhost/db"), Err(CliError::UnsupportedDialect(s)) if s == "<none>"));
    }

    #[test]
    fn test_introspection_config_hides_tracking_table() {
        let mut ctx = Context::default();
        ctx.config.migrations.table_name = "app_versions".to_string();
        let config = ctx.introspection_config();
        assert!(!config.should_include_table("app_versions"));
        assert!(!config.should_include_table("schema_migrations"));
        assert!(config.should_include_table("users"));
    }
}
