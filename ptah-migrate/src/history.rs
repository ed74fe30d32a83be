//! Migration history tracking.

use chrono::{DateTime, Utc};
use ptah_schema::Dialect;
use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};
use crate::sql::{generator_for, quote_literal};

/// Default name of the tracking table.
pub const DEFAULT_TABLE: &str = "schema_migrations";

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Migration version.
    pub version: i64,
    /// Human readable description.
    pub description: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

/// The table recording applied migrations, and the SQL used to maintain it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingTable {
    name: String,
}

impl Default for TrackingTable {
    fn default() -> Self {
        Self {
            name: DEFAULT_TABLE.to_string(),
        }
    }
}

impl TrackingTable {
    /// Use a custom table name. Only letters, digits and `_` are accepted.
    pub fn new(name: impl Into<String>) -> MigrateResult<Self> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(MigrationError::other(format!(
                "invalid tracking table name '{name}'"
            )));
        }
        Ok(Self { name })
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `CREATE TABLE IF NOT EXISTS` for the tracking table.
    pub fn create_sql(&self, dialect: Dialect) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    \
             version BIGINT PRIMARY KEY,\n    \
             description TEXT NOT NULL,\n    \
             applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP\n)",
            self.quoted(dialect)
        )
    }

    /// Record a version as applied.
    pub fn insert_sql(&self, dialect: Dialect, version: i64, description: &str) -> String {
        format!(
            "INSERT INTO {} (version, description) VALUES ({version}, {})",
            self.quoted(dialect),
            quote_literal(description)
        )
    }

    /// Forget an applied version.
    pub fn delete_sql(&self, dialect: Dialect, version: i64) -> String {
        format!("DELETE FROM {} WHERE version = {version}", self.quoted(dialect))
    }

    /// Read every record, oldest version first.
    pub fn select_sql(&self, dialect: Dialect) -> String {
        format!(
            "SELECT version, description, applied_at FROM {} ORDER BY version",
            self.quoted(dialect)
        )
    }

    fn quoted(&self, dialect: Dialect) -> String {
        generator_for(dialect).quote_identifier(&self.name)
    }
}

pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
