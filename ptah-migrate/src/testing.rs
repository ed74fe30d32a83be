//! In-memory connection for unit tests.

use chrono::Utc;
use ptah_schema::Dialect;

use crate::connection::DatabaseConnection;
use crate::error::{MigrateResult, MigrationError};
use crate::history::{MigrationRecord, TrackingTable};
use crate::introspect::{ColumnInfo, ConstraintInfo, DatabaseSchema, EnumInfo, IndexInfo, IntrospectionConfig, Introspector, TableInfo};

/// Records executed SQL and simulates the tracking table, honouring
/// transactions.
#[derive(Debug)]
pub struct MockConnection {
    dialect: Dialect,
    pub executed: Vec<String>,
    pub schema: DatabaseSchema,
    records: Vec<MigrationRecord>,
    staged: Option<Vec<MigrationRecord>>,
    fail_on: Vec<String>,
}

impl MockConnection {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            executed: Vec::new(),
            schema: DatabaseSchema::default(),
            records: Vec::new(),
            staged: None,
            fail_on: Vec::new(),
        }
    }

    /// Fail any statement starting with `prefix`.
    pub fn fail_on(&mut self, prefix: &str) {
        self.fail_on.push(prefix.to_string());
    }

    /// Pretend a version was applied earlier.
    pub fn record(&mut self, version: i64, description: &str) {
        self.records.push(MigrationRecord {
            version,
            description: description.to_string(),
            applied_at: Utc::now(),
        });
        self.records.sort_by_key(|r| r.version);
    }

    pub fn applied_versions(&self) -> Vec<i64> {
        self.records.iter().map(|r| r.version).collect()
    }

    fn records_mut(&mut self) -> &mut Vec<MigrationRecord> {
        match &mut self.staged {
            Some(staged) => staged,
            None => &mut self.records,
        }
    }
}

fn parse_insert(sql: &str) -> Option<(i64, String)> {
    let values = &sql[sql.find("VALUES (")? + 8..];
    let (version, rest) = values.split_once(',')?;
    let description = &rest[rest.find('\'')? + 1..rest.rfind('\'')?];
    Some((version.trim().parse().ok()?, description.replace("''", "'")))
}

#[async_trait::async_trait]
impl Introspector for MockConnection {
    async fn get_tables(&mut self, _config: &IntrospectionConfig) -> MigrateResult<Vec<TableInfo>> {
        Ok(self
            .schema
            .tables
            .iter()
            .map(|t| TableInfo {
                columns: Vec::new(),
                ..t.clone()
            })
            .collect())
    }

    async fn get_columns(&mut self, _config: &IntrospectionConfig, table: &str) -> MigrateResult<Vec<ColumnInfo>> {
        if self.fail_on.iter().any(|f| f == "columns") {
            return Err(MigrationError::database("permission denied"));
        }
        Ok(self.schema.table(table).map(|t| t.columns.clone()).unwrap_or_default())
    }

    async fn get_enums(&mut self, _config: &IntrospectionConfig) -> MigrateResult<Vec<EnumInfo>> {
        Ok(self.schema.enums.clone())
    }

    async fn get_indexes(&mut self, _config: &IntrospectionConfig) -> MigrateResult<Vec<IndexInfo>> {
        Ok(self.schema.indexes.clone())
    }

    async fn get_constraints(&mut self, _config: &IntrospectionConfig) -> MigrateResult<Vec<ConstraintInfo>> {
        Ok(self.schema.constraints.clone())
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for MockConnection {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn database_name(&self) -> &str {
        "mock"
    }

    async fn execute(&mut self, sql: &str) -> MigrateResult<u64> {
        self.executed.push(sql.to_string());
        if self.fail_on.iter().any(|prefix| sql.starts_with(prefix.as_str())) {
            return Err(MigrationError::database(format!("rejected: {sql}")));
        }

        match sql {
            "BEGIN" | "START TRANSACTION" => self.staged = Some(self.records.clone()),
            "COMMIT" => {
                if let Some(staged) = self.staged.take() {
                    self.records = staged;
                }
            }
            "ROLLBACK" => self.staged = None,
            _ if sql.starts_with("INSERT INTO") => {
                if let Some((version, description)) = parse_insert(sql) {
                    self.records_mut().push(MigrationRecord {
                        version,
                        description,
                        applied_at: Utc::now(),
                    });
                }
            }
            _ if sql.starts_with("DELETE FROM") => {
                if let Some(version) = sql.rsplit("= ").next().and_then(|v| v.trim().parse::<i64>().ok()) {
                    self.records_mut().retain(|r| r.version != version);
                }
            }
            _ => {}
        }
        Ok(1)
    }

    async fn applied_migrations(&mut self, _table: &TrackingTable) -> MigrateResult<Vec<MigrationRecord>> {
        let mut records = self.records.clone();
        records.sort_by_key(|r| r.version);
        Ok(records)
    }
}
