//! MySQL connection wrapper.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDateTime;
use mysql_async::prelude::*;
use mysql_async::{Conn, Params, Row};
use ptah_migrate::{DatabaseConnection, MigrateResult, MigrationRecord, TrackingTable, generator_for};
use ptah_schema::Dialect;
use tracing::{debug, info};

use crate::config::MysqlConfig;
use crate::error::{MysqlError, MysqlResult};

/// A single MySQL connection.
pub struct MysqlConnection {
    conn: Conn,
    config: MysqlConfig,
}

impl std::fmt::Debug for MysqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MysqlConnection")
            .field("host", &self.config.host)
            .field("database", &self.config.database)
            .finish()
    }
}

impl MysqlConnection {
    /// Connect using a database URL.
    pub async fn connect_url(url: &str) -> MysqlResult<Self> {
        Self::connect(MysqlConfig::from_url(url)?).await
    }

    /// Connect with a parsed configuration.
    pub async fn connect(config: MysqlConfig) -> MysqlResult<Self> {
        let conn = tokio::time::timeout(config.connect_timeout, Conn::new(config.to_opts_builder()))
            .await
            .map_err(|_| MysqlError::Timeout(config.connect_timeout))??;
        info!(host = %config.host, database = %config.database, "connected to mysql");
        Ok(Self { conn, config })
    }

    /// The connection configuration.
    pub fn config(&self) -> &MysqlConfig {
        &self.config
    }

    /// Close the connection politely.
    pub async fn close(self) -> MysqlResult<()> {
        self.conn.disconnect().await?;
        Ok(())
    }

    /// Execute a prepared query and return all rows.
    pub async fn query_params<P>(&mut self, query: &str, params: P) -> MysqlResult<Vec<Row>>
    where
        P: Into<Params> + Send,
    {
        debug!(query = %query, "Executing parameterized query");
        let limit = self.config.statement_timeout;
        timed(limit, self.conn.exec(query, params)).await
    }

    /// Execute a statement over the text protocol and return the number of
    /// affected rows.
    pub async fn execute_text(&mut self, query: &str) -> MysqlResult<u64> {
        debug!(query = %query, "Executing statement");
        let limit = self.config.statement_timeout;
        timed(limit, self.conn.query_drop(query)).await?;
        Ok(self.conn.affected_rows())
    }

    /// Database used when introspection does not name one.
    pub(crate) fn target_database(&self, schema: Option<&String>) -> String {
        schema.cloned().unwrap_or_else(|| self.config.database.clone())
    }
}

async fn timed<T, F>(limit: Option<Duration>, fut: F) -> MysqlResult<T>
where
    F: Future<Output = Result<T, mysql_async::Error>>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(MysqlError::Timeout(limit)),
        },
        None => Ok(fut.await?),
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for MysqlConnection {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn database_name(&self) -> &str {
        &self.config.database
    }

    async fn execute(&mut self, sql: &str) -> MigrateResult<u64> {
        self.execute_text(sql)
            .await
            .map_err(|e| e.during(format!("executing `{}`", sql.lines().next().unwrap_or("").trim())))
    }

    async fn applied_migrations(&mut self, table: &TrackingTable) -> MigrateResult<Vec<MigrationRecord>> {
        let rows = self
            .query_params(
                "SELECT COUNT(*) FROM information_schema.tables WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
                (table.name(),),
            )
            .await
            .map_err(|e| e.during("checking tracking table"))?;
        let exists = rows
            .into_iter()
            .next()
            .map(mysql_async::from_row_opt::<(i64,)>)
            .transpose()
            .map_err(|e| MysqlError::from(e).during("checking tracking table"))?
            .is_some_and(|(count,)| count > 0);
        if !exists {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT version, description, CAST(applied_at AS CHAR) FROM {} ORDER BY version",
            generator_for(Dialect::MySql).quote_identifier(table.name())
        );
        let rows = self
            .query_params(&sql, Params::Empty)
            .await
            .map_err(|e| e.during("reading tracking table"))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let (version, description, applied_at) = mysql_async::from_row_opt::<(i64, String, String)>(row)
                .map_err(|e| MysqlError::from(e).during("reading tracking table"))?;
            let applied_at = parse_timestamp(&applied_at).ok_or_else(|| {
                MysqlError::deserialization(format!("invalid applied_at '{applied_at}' for version {version}"))
                    .during("reading tracking table")
            })?;
            records.push(MigrationRecord {
                version,
                description,
                applied_at: applied_at.and_utc(),
            });
        }
        Ok(records)
    }
}

/// Parse a `DATETIME`/`TIMESTAMP` rendered as text.
fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
