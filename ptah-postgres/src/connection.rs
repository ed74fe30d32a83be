//! PostgreSQL connection.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDateTime;
use ptah_migrate::{DatabaseConnection, MigrateResult, MigrationRecord, TrackingTable};
use ptah_schema::Dialect;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, SimpleQueryMessage};
use tracing::{debug, info, warn};

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};

/// One client connection. The socket is driven by a spawned task that ends
/// when the client is dropped.
pub struct PgConnection {
    client: Client,
    config: PgConfig,
    current_schema: String,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("host", &self.config.host)
            .field("database", &self.config.database)
            .field("current_schema", &self.current_schema)
            .finish()
    }
}

impl PgConnection {
    /// Connect using a database URL.
    pub async fn connect_url(url: &str) -> PgResult<Self> {
        Self::connect(PgConfig::from_url(url)?).await
    }

    /// Connect with a parsed configuration.
    pub async fn connect(config: PgConfig) -> PgResult<Self> {
        let pg_config = config.to_pg_config();
        let (client, connection) = tokio::time::timeout(config.connect_timeout, pg_config.connect(NoTls))
            .await
            .map_err(|_| PgError::timeout(config.connect_timeout))??;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection closed with error");
            }
        });

        let mut conn = Self {
            client,
            config,
            current_schema: String::new(),
        };
        let row = conn.query_one("SELECT current_schema()::text", &[]).await?;
        conn.current_schema = row
            .try_get::<_, Option<String>>(0)?
            .unwrap_or_else(|| "public".to_string());

        info!(
            host = %conn.config.host,
            database = %conn.config.database,
            schema = %conn.current_schema,
            "connected to postgres"
        );
        Ok(conn)
    }

    /// The connection configuration.
    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    /// Schema used when introspection does not name one.
    pub fn current_schema(&self) -> &str {
        &self.current_schema
    }

    /// Run a driver call under the statement timeout.
    async fn timed<T, F>(&self, fut: F) -> PgResult<T>
    where
        F: Future<Output = Result<T, tokio_postgres::Error>>,
    {
        match self.config.statement_timeout {
            Some(limit) => timeout(limit, fut).await,
            None => Ok(fut.await?),
        }
    }

    /// Execute a query and return all rows.
    pub async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Vec<Row>> {
        debug!(sql = %sql, "Executing query");
        self.timed(self.client.query(sql, params)).await
    }

    /// Execute a query and return exactly one row.
    pub async fn query_one(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> PgResult<Row> {
        debug!(sql = %sql, "Executing query_one");
        self.timed(self.client.query_one(sql, params)).await
    }

    /// Execute one statement over the simple query protocol, returning the
    /// number of affected rows.
    pub async fn execute_simple(&self, sql: &str) -> PgResult<u64> {
        debug!(sql = %sql, "Executing statement");
        let messages = self.timed(self.client.simple_query(sql)).await?;
        Ok(messages
            .iter()
            .map(|m| match m {
                SimpleQueryMessage::CommandComplete(n) => *n,
                _ => 0,
            })
            .sum())
    }
}

async fn timeout<T, F>(limit: Duration, fut: F) -> PgResult<T>
where
    F: Future<Output = Result<T, tokio_postgres::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(PgError::timeout(limit)),
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for PgConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn database_name(&self) -> &str {
        &self.config.database
    }

    async fn execute(&mut self, sql: &str) -> MigrateResult<u64> {
        self.execute_simple(sql)
            .await
            .map_err(|e| e.during(format!("executing `{}`", statement_preview(sql))))
    }

    async fn applied_migrations(&mut self, table: &TrackingTable) -> MigrateResult<Vec<MigrationRecord>> {
        let exists = self
            .query_one(
                "SELECT to_regclass(quote_ident($1)) IS NOT NULL",
                &[&table.name()],
            )
            .await
            .map_err(|e| e.during("checking tracking table"))?;
        if !exists.try_get::<_, bool>(0).map_err(|e| PgError::from(e).during("checking tracking table"))? {
            return Ok(Vec::new());
        }

        let rows = self
            .query(&table.select_sql(Dialect::Postgres), &[])
            .await
            .map_err(|e| e.during("reading tracking table"))?;
        rows.iter()
            .map(|row| {
                let applied_at: NaiveDateTime = row.try_get("applied_at")?;
                Ok(MigrationRecord {
                    version: row.try_get("version")?,
                    description: row.try_get("description")?,
                    applied_at: applied_at.and_utc(),
                })
            })
            .collect::<Result<Vec<_>, tokio_postgres::Error>>()
            .map_err(|e| PgError::from(e).during("reading tracking table"))
    }
}

/// First line of a statement, shortened for error messages.
fn statement_preview(sql: &str) -> String {
    let line = sql.lines().map(str::trim).find(|l| !l.is_empty() && !l.starts_with("--")).unwrap_or("");
    if line.chars().count() > 60 {
        format!("{}...", line.chars().take(60).collect::<String>())
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_preview() {
        assert_eq!(
            statement_preview("-- add users\nCREATE TABLE \"users\" (\n    \"id\" SERIAL PRIMARY KEY\n)"),
            "CREATE TABLE \"users\" ("
        );
        let long = format!("ALTER TABLE t ADD COLUMN {}", "x".repeat(80));
        assert!(statement_preview(&long).ends_with("..."));
        assert_eq!(statement_preview(&long).chars().count(), 63);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_pg_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, tokio_postgres::Error>(())
        };
        let err = timeout(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(err.is_timeout());
    }
}
