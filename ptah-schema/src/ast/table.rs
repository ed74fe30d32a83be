//! Tables, columns and foreign keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlatformOverrides;
use crate::dialect::Dialect;
use crate::error::SchemaError;

/// A `table(column)` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub table: String,
    pub column: String,
}

impl Reference {
    /// Create a reference.
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl FromStr for Reference {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchemaError::InvalidReference {
            reference: s.to_string(),
        };
        let trimmed = s.trim();
        let (table, rest) = trimmed.split_once('(').ok_or_else(invalid)?;
        let column = rest.strip_suffix(')').ok_or_else(invalid)?;
        let (table, column) = (table.trim(), column.trim());

        let is_ident =
            |v: &str| !v.is_empty() && v.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.');
        if !is_ident(table) || !is_ident(column) {
            return Err(invalid());
        }
        Ok(Self::new(table, column))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.table, self.column)
    }
}

/// A foreign key constraint on a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Referenced table and column.
    pub references: Reference,
    /// `ON DELETE` action, as written (e.g. `CASCADE`).
    pub on_delete: Option<String>,
}

/// A column placed in a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Rust type the field was declared on (the table struct or an embed group).
    pub owner: String,
    /// Declared SQL type, before dialect overrides.
    pub sql_type: String,
    pub nullable: bool,
    pub primary: bool,
    pub unique: bool,
    pub indexed: bool,
    /// Default literal, rendered verbatim.
    pub default: Option<String>,
    /// Default expression (e.g. `NOW()`), rendered verbatim; wins over `default`.
    pub default_fn: Option<String>,
    pub check: Option<String>,
    /// Enum type name when the column is declared `type="ENUM"`.
    pub enum_name: Option<String>,
    pub enum_values: Vec<String>,
    pub foreign_key: Option<ForeignKey>,
    pub comment: Option<String>,
    pub overrides: PlatformOverrides,
}

impl Column {
    /// Whether the column is an enum.
    pub fn is_enum(&self) -> bool {
        self.enum_name.is_some()
    }

    /// The declared type with the dialect's `type` override applied.
    pub fn type_for(&self, dialect: Dialect) -> &str {
        self.overrides
            .get(dialect, "type")
            .unwrap_or(self.sql_type.as_str())
    }

    /// Whether the dialect overrides the declared type.
    pub fn has_type_override(&self, dialect: Dialect) -> bool {
        self.overrides.get(dialect, "type").is_some()
    }

    /// Check expression for the dialect.
    pub fn check_for(&self, dialect: Dialect) -> Option<&str> {
        self.overrides
            .get(dialect, "check")
            .or(self.check.as_deref())
    }

    /// Default clause body for the dialect.
    pub fn default_for(&self, dialect: Dialect) -> Option<&str> {
        self.overrides
            .get(dialect, "default")
            .or(self.default_fn.as_deref())
            .or(self.default.as_deref())
    }

    /// The table this column references, if any.
    pub fn referenced_table(&self) -> Option<&str> {
        self.foreign_key
            .as_ref()
            .map(|fk| fk.references.table.as_str())
    }
}

/// A table in the schema model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    /// Rust type the table was declared on.
    pub type_name: String,
    pub comment: Option<String>,
    pub columns: Vec<Column>,
    pub overrides: PlatformOverrides,
}

impl Table {
    /// Create an empty table.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            comment: None,
            columns: Vec::new(),
            overrides: PlatformOverrides::new(),
        }
    }

    /// Add a column unless one with the same name exists.
    ///
    /// Returns `false` when the column was ignored as a duplicate.
    pub fn add_column(&mut self, column: Column) -> bool {
        if self.column(&column.name).is_some() {
            return false;
        }
        self.columns.push(column);
        true
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Primary key column names, in declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Columns declared on the given Rust type.
    pub fn columns_owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a Column> {
        self.columns.iter().filter(move |c| c.owner == owner)
    }

    /// Tables referenced by foreign keys, in column order, without duplicates.
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps: Vec<String> = Vec::new();
        for table in self.columns.iter().filter_map(Column::referenced_table) {
            if !deps.iter().any(|d| d == table) {
                deps.push(table.to_string());
            }
        }
        deps
    }

    /// Table-level override for a dialect.
    pub fn override_for(&self, dialect: Dialect, key: &str) -> Option<&str> {
        self.overrides.get(dialect, key)
    }

    /// Comment for a dialect (`platform.<d>.comment` wins over `comment`).
    pub fn comment_for(&self, dialect: Dialect) -> Option<&str> {
        self.override_for(dialect, "comment")
            .or(self.comment.as_deref())
    }
}
