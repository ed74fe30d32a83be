//! The connection seam between the runner and database drivers.

use ptah_schema::Dialect;

use crate::error::MigrateResult;
use crate::history::{MigrationRecord, TrackingTable};
use crate::introspect::Introspector;

/// A live database connection.
///
/// Drivers implement statement execution, the tracking table query and
/// introspection; transaction control has defaults that issue plain SQL.
#[async_trait::async_trait]
pub trait DatabaseConnection: Introspector {
    /// Dialect family of the connected server.
    fn dialect(&self) -> Dialect;

    /// Name of the connected database.
    fn database_name(&self) -> &str;

    /// Execute one statement, returning the number of affected rows.
    async fn execute(&mut self, sql: &str) -> MigrateResult<u64>;

    /// Start a transaction.
    async fn begin(&mut self) -> MigrateResult<()> {
        let sql = match self.dialect() {
            Dialect::MySql => "START TRANSACTION",
            _ => "BEGIN",
        };
        self.execute(sql).await.map(|_| ())
    }

    /// Commit the open transaction.
    async fn commit(&mut self) -> MigrateResult<()> {
        self.execute("COMMIT").await.map(|_| ())
    }

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> MigrateResult<()> {
        self.execute("ROLLBACK").await.map(|_| ())
    }

    /// Applied migrations, oldest first. A missing tracking table reads as
    /// no migrations.
    async fn applied_migrations(&mut self, table: &TrackingTable) -> MigrateResult<Vec<MigrationRecord>>;
}
