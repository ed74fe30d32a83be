//! Versioned migration runner.
//!
//! Migrations are applied in ascending version order, each inside its own
//! transaction together with its tracking row. A failure rolls back the
//! failing migration and stops the run; earlier migrations stay committed.
//! There is no cross-process lock, so concurrent runners against one
//! database must be serialized by the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ptah_schema::Dialect;
use tracing::{debug, info, warn};

use crate::connection::DatabaseConnection;
use crate::error::{MigrateResult, MigrationError};
use crate::history::{MigrationRecord, TrackingTable};
use crate::splitter::split_statements;

/// Produces a migration's SQL for a dialect.
pub type SqlFn = Arc<dyn Fn(Dialect) -> String + Send + Sync>;

/// One versioned migration.
#[derive(Clone)]
pub struct Migration {
    version: i64,
    description: String,
    up: SqlFn,
    down: SqlFn,
}

impl Migration {
    /// Create a migration whose SQL depends on the dialect.
    pub fn new(
        version: i64,
        description: impl Into<String>,
        up: impl Fn(Dialect) -> String + Send + Sync + 'static,
        down: impl Fn(Dialect) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            up: Arc::new(up),
            down: Arc::new(down),
        }
    }

    /// Create a migration from fixed SQL text.
    pub fn sql(version: i64, description: impl Into<String>, up: impl Into<String>, down: impl Into<String>) -> Self {
        let (up, down) = (up.into(), down.into());
        Self::new(version, description, move |_| up.clone(), move |_| down.clone())
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Forward statements for a dialect.
    pub fn up_statements(&self, dialect: Dialect) -> Vec<String> {
        split_statements(&(self.up)(dialect), dialect)
    }

    /// Reverse statements for a dialect.
    pub fn down_statements(&self, dialect: Dialect) -> Vec<String> {
        split_statements(&(self.down)(dialect), dialect)
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("version", &self.version)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Registered migrations keyed by version.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    migrations: BTreeMap<i64, Migration>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a migration. Versions must be positive and unique.
    pub fn register(&mut self, migration: Migration) -> MigrateResult<()> {
        if migration.version <= 0 {
            return Err(MigrationError::migration_file(format!(
                "version must be positive, got {}",
                migration.version
            )));
        }
        if self.migrations.contains_key(&migration.version) {
            return Err(MigrationError::DuplicateVersion(migration.version));
        }
        self.migrations.insert(migration.version, migration);
        Ok(())
    }

    /// Register several migrations.
    pub fn extend(&mut self, migrations: impl IntoIterator<Item = Migration>) -> MigrateResult<()> {
        migrations.into_iter().try_for_each(|m| self.register(m))
    }

    pub fn get(&self, version: i64) -> Option<&Migration> {
        self.migrations.get(&version)
    }

    /// Migrations in ascending version order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Migration> {
        self.migrations.values()
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }
}

/// What `status` found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Tracking rows, oldest first.
    pub applied: Vec<MigrationRecord>,
    /// Registered versions above the current version: `up` runs these.
    pub pending: Vec<(i64, String)>,
    /// Registered versions at or below the current version that were never
    /// applied. `up` does not run these.
    pub skipped: Vec<(i64, String)>,
}

impl MigrationStatus {
    /// Highest applied version, or 0.
    pub fn current_version(&self) -> i64 {
        self.applied.iter().map(|r| r.version).max().unwrap_or(0)
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current version: {}", self.current_version())?;
        for record in &self.applied {
            writeln!(
                f,
                "  [applied] {:>4} {} ({})",
                record.version,
                record.description,
                record.applied_at.format("%Y-%m-%d %H:%M:%S")
            )?;
        }
        for (version, description) in &self.pending {
            writeln!(f, "  [pending] {version:>4} {description}")?;
        }
        for (version, description) in &self.skipped {
            writeln!(f, "  [skipped] {version:>4} {description}")?;
        }
        Ok(())
    }
}

/// Outcome of `up` or `down`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Versions applied (`up`) or reverted (`down`), in execution order.
    pub versions: Vec<i64>,
    /// Whether nothing was executed.
    pub dry_run: bool,
    /// In dry-run mode, the statements that would run, per version.
    pub preview: Vec<(i64, Vec<String>)>,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// Applies and reverts registered migrations over one connection.
pub struct MigrationRunner<'a, C: DatabaseConnection + ?Sized> {
    conn: &'a mut C,
    registry: &'a MigrationRegistry,
    table: TrackingTable,
    dry_run: bool,
}

impl<'a, C: DatabaseConnection + ?Sized> MigrationRunner<'a, C> {
    pub fn new(conn: &'a mut C, registry: &'a MigrationRegistry) -> Self {
        Self {
            conn,
            registry,
            table: TrackingTable::default(),
            dry_run: false,
        }
    }

    /// Use a different tracking table.
    pub fn tracking_table(mut self, table: TrackingTable) -> Self {
        self.table = table;
        self
    }

    /// Report what would run without executing anything.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    async fn ensure_table(&mut self) -> MigrateResult<()> {
        let sql = self.table.create_sql(self.conn.dialect());
        self.conn.execute(&sql).await?;
        Ok(())
    }

    /// Applied records plus pending and skipped versions.
    pub async fn status(&mut self) -> MigrateResult<MigrationStatus> {
        let applied = self.conn.applied_migrations(&self.table).await?;
        let current = applied.iter().map(|r| r.version).max().unwrap_or(0);

        let mut status = MigrationStatus {
            applied,
            ..Default::default()
        };
        for migration in self.registry.iter() {
            let entry = (migration.version, migration.description.clone());
            if migration.version > current {
                status.pending.push(entry);
            } else if !status.applied.iter().any(|r| r.version == migration.version) {
                status.skipped.push(entry);
            }
        }
        Ok(status)
    }

    /// Apply every registered migration above the current version.
    pub async fn up(&mut self) -> MigrateResult<RunReport> {
        let dialect = self.conn.dialect();
        let mut report = RunReport {
            dry_run: self.dry_run,
            ..Default::default()
        };

        if !self.dry_run {
            self.ensure_table().await?;
        }
        let current = self
            .conn
            .applied_migrations(&self.table)
            .await?
            .iter()
            .map(|r| r.version)
            .max()
            .unwrap_or(0);

        let registry = self.registry;
        for migration in registry.iter().filter(|m| m.version > current) {
            let statements = migration.up_statements(dialect);
            if self.dry_run {
                report.preview.push((migration.version, statements));
                report.versions.push(migration.version);
                continue;
            }

            info!(version = migration.version, description = %migration.description, "applying migration");
            let record = self
                .table
                .insert_sql(dialect, migration.version, &migration.description);
            self.run_in_transaction(migration.version, statements, record).await?;
            report.versions.push(migration.version);
        }

        if report.is_empty() {
            info!(current, "database is up to date");
        }
        Ok(report)
    }

    /// Revert applied migrations above `target`, newest first.
    pub async fn down(&mut self, target: i64) -> MigrateResult<RunReport> {
        let dialect = self.conn.dialect();
        let mut report = RunReport {
            dry_run: self.dry_run,
            ..Default::default()
        };

        let mut applied: Vec<i64> = self
            .conn
            .applied_migrations(&self.table)
            .await?
            .into_iter()
            .map(|r| r.version)
            .filter(|v| *v > target)
            .collect();
        applied.sort_unstable_by(|a, b| b.cmp(a));

        let registry = self.registry;
        for version in applied {
            let migration = registry.get(version).ok_or_else(|| {
                MigrationError::migration_file(format!("applied migration {version} is not registered"))
            })?;
            let statements = migration.down_statements(dialect);
            if self.dry_run {
                report.preview.push((version, statements));
                report.versions.push(version);
                continue;
            }

            info!(version, description = %migration.description, "reverting migration");
            let record = self.table.delete_sql(dialect, version);
            self.run_in_transaction(version, statements, record).await?;
            report.versions.push(version);
        }
        Ok(report)
    }

    async fn run_in_transaction(&mut self, version: i64, statements: Vec<String>, record: String) -> MigrateResult<()> {
        self.conn.begin().await?;

        for sql in statements.iter().chain(std::iter::once(&record)) {
            debug!(version, %sql, "executing");
            if let Err(e) = self.conn.execute(sql).await {
                self.rollback(version).await;
                return Err(MigrationError::MigrationFailed {
                    version,
                    message: e.to_string(),
                });
            }
        }

        if let Err(e) = self.conn.commit().await {
            self.rollback(version).await;
            return Err(MigrationError::MigrationFailed {
                version,
                message: e.to_string(),
            });
        }
        Ok(())
    }

    async fn rollback(&mut self, version: i64) {
        if let Err(e) = self.conn.rollback().await {
            warn!(version, error = %e, "rollback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;
    use pretty_assertions::assert_eq;

    fn registry() -> MigrationRegistry {
        let mut registry = MigrationRegistry::new();
        registry
            .extend([
                Migration::sql(1, "create users", "CREATE TABLE users (id INT);", "DROP TABLE users;"),
                Migration::new(
                    2,
                    "create posts",
                    |d| match d {
                        Dialect::MySql => "CREATE TABLE posts (id INT) ENGINE=InnoDB;".to_string(),
                        _ => "CREATE TABLE posts (id INT);".to_string(),
                    },
                    |_| "DROP TABLE posts;".to_string(),
                ),
                Migration::sql(3, "index", "CREATE INDEX i ON posts (id); SELECT 'a;b';", "DROP INDEX i;"),
            ])
            .unwrap();
        registry
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let mut registry = registry();
        assert!(matches!(
            registry.register(Migration::sql(2, "again", "", "")),
            Err(MigrationError::DuplicateVersion(2))
        ));
        assert!(registry.register(Migration::sql(0, "zero", "", "")).is_err());
        assert_eq!(registry.len(), 3);
    }

    #[tokio::test]
    async fn test_up_applies_in_order_once() {
        let registry = registry();
        let mut conn = MockConnection::new(Dialect::Postgres);

        let report = MigrationRunner::new(&mut conn, &registry).up().await.unwrap();
        assert_eq!(report.versions, vec![1, 2, 3]);
        assert_eq!(conn.applied_versions(), vec![1, 2, 3]);
        assert!(conn.executed.contains(&"SELECT 'a;b'".to_string()));
        assert_eq!(conn.executed.iter().filter(|s| *s == "BEGIN").count(), 3);
        assert_eq!(conn.executed.iter().filter(|s| *s == "COMMIT").count(), 3);

        let again = MigrationRunner::new(&mut conn, &registry).up().await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_failure_rolls_back_and_stops() {
        let registry = registry();
        let mut conn = MockConnection::new(Dialect::Postgres);
        conn.fail_on("CREATE TABLE posts");

        let err = MigrationRunner::new(&mut conn, &registry).up().await.unwrap_err();
        assert!(matches!(err, MigrationError::MigrationFailed { version: 2, .. }));
        assert_eq!(conn.applied_versions(), vec![1]);
        assert!(conn.executed.contains(&"ROLLBACK".to_string()));
        assert!(!conn.executed.iter().any(|s| s.starts_with("CREATE INDEX")));
    }

    #[tokio::test]
    async fn test_down_reverts_descending() {
        let registry = registry();
        let mut conn = MockConnection::new(Dialect::MySql);
        MigrationRunner::new(&mut conn, &registry).up().await.unwrap();
        assert!(conn.executed.contains(&"START TRANSACTION".to_string()));
        assert!(conn.executed.contains(&"CREATE TABLE posts (id INT) ENGINE=InnoDB".to_string()));
        conn.executed.clear();

        let report = MigrationRunner::new(&mut conn, &registry).down(1).await.unwrap();
        assert_eq!(report.versions, vec![3, 2]);
        assert_eq!(conn.applied_versions(), vec![1]);
        let drops: Vec<_> = conn.executed.iter().filter(|s| s.starts_with("DROP")).cloned().collect();
        assert_eq!(drops, vec!["DROP INDEX i", "DROP TABLE posts"]);
    }

    #[tokio::test]
    async fn test_dry_run_executes_nothing() {
        let registry = registry();
        let mut conn = MockConnection::new(Dialect::Postgres);

        let report = MigrationRunner::new(&mut conn, &registry)
            .dry_run(true)
            .up()
            .await
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.versions, vec![1, 2, 3]);
        assert_eq!(report.preview[2].1, vec!["CREATE INDEX i ON posts (id)", "SELECT 'a;b'"]);
        assert!(conn.executed.is_empty());
    }

    #[tokio::test]
    async fn test_status_reports_pending_and_skipped() {
        let registry = registry();
        let mut conn = MockConnection::new(Dialect::Postgres);
        conn.record(2, "create posts");

        let status = MigrationRunner::new(&mut conn, &registry).status().await.unwrap();
        assert_eq!(status.current_version(), 2);
        assert_eq!(status.pending, vec![(3, "index".to_string())]);
        assert_eq!(status.skipped, vec![(1, "create users".to_string())]);
        assert!(status.to_string().contains("[pending]    3 index"));
    }
}
