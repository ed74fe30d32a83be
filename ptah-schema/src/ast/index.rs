//! Index definitions.

use serde::{Deserialize, Serialize};

use super::PlatformOverrides;
use crate::dialect::Dialect;

/// An index on one or more columns of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    /// Access method as declared (`type="GIN"`, `type="FULLTEXT"`).
    pub method: Option<String>,
    /// Partial index predicate.
    pub condition: Option<String>,
    pub overrides: PlatformOverrides,
}

impl Index {
    /// Create a plain index.
    pub fn new(
        name: impl Into<String>,
        table: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            method: None,
            condition: None,
            overrides: PlatformOverrides::new(),
        }
    }

    /// Name of the implicit index created by a field's `index` flag.
    pub fn implicit_name(table: &str, column: &str) -> String {
        format!("idx_{table}_{column}")
    }

    /// Mark the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Operator class for a dialect (`platform.<d>.ops`).
    pub fn ops_for(&self, dialect: Dialect) -> Option<&str> {
        self.overrides.get(dialect, "ops")
    }

    /// Upper-cased access method.
    pub fn method_upper(&self) -> Option<String> {
        self.method.as_deref().map(str::to_ascii_uppercase)
    }
}
