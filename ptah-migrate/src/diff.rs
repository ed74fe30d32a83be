//! Structural comparison of the declared model against a live database.
//!
//! Everything is matched by name; a rename reads as one removal plus one
//! addition. Column types are compared after rendering the declared type for
//! the live dialect and passing both sides through [`normalize_type`].

use std::fmt;

use ptah_schema::{Column, Dialect, EnumType, Index, SchemaModel, Table};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::introspect::{ColumnInfo, DatabaseSchema, EnumInfo, IndexInfo, TableInfo, normalize_type};
use crate::sql::generator_for;

/// Differences between the declared model and a live schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Declared tables missing from the database, dependencies first.
    pub added_tables: Vec<Table>,
    /// Live tables no longer declared.
    pub removed_tables: Vec<TableInfo>,
    pub modified_tables: Vec<TableDiff>,
    pub added_enums: Vec<EnumType>,
    pub removed_enums: Vec<EnumInfo>,
    pub modified_enums: Vec<EnumDiff>,
    pub added_indexes: Vec<Index>,
    pub removed_indexes: Vec<IndexInfo>,
}

/// Column level changes to one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDiff {
    pub name: String,
    pub added_columns: Vec<Column>,
    pub removed_columns: Vec<ColumnInfo>,
    pub modified_columns: Vec<ColumnDiff>,
}

impl TableDiff {
    fn is_empty(&self) -> bool {
        self.added_columns.is_empty() && self.removed_columns.is_empty() && self.modified_columns.is_empty()
    }
}

/// A column whose type or nullability differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDiff {
    pub name: String,
    /// Live type, as the catalog reports it.
    pub old_type: String,
    /// Declared type, rendered for the dialect.
    pub new_type: String,
    pub old_nullable: bool,
    pub new_nullable: bool,
    pub type_changed: bool,
    /// The declared column.
    pub declared: Column,
    /// The live column, for reverse statements.
    pub live: ColumnInfo,
}

impl ColumnDiff {
    /// Whether nullability differs.
    pub fn nullability_changed(&self) -> bool {
        self.old_nullable != self.new_nullable
    }
}

/// Value changes to a native enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDiff {
    pub name: String,
    pub added_values: Vec<String>,
    pub removed_values: Vec<String>,
}

impl SchemaDiff {
    /// Check if there are any differences.
    pub fn has_changes(&self) -> bool {
        !(self.added_tables.is_empty()
            && self.removed_tables.is_empty()
            && self.modified_tables.is_empty()
            && self.added_enums.is_empty()
            && self.removed_enums.is_empty()
            && self.modified_enums.is_empty()
            && self.added_indexes.is_empty()
            && self.removed_indexes.is_empty())
    }

    /// Get a human-readable summary of the diff.
    pub fn summary(&self) -> String {
        let counts = [
            (self.added_tables.len(), "added tables"),
            (self.removed_tables.len(), "removed tables"),
            (self.modified_tables.len(), "modified tables"),
            (self.added_enums.len(), "added enums"),
            (self.removed_enums.len(), "removed enums"),
            (self.modified_enums.len(), "modified enums"),
            (self.added_indexes.len(), "added indexes"),
            (self.removed_indexes.len(), "removed indexes"),
        ];
        let parts: Vec<String> = counts
            .iter()
            .filter(|(n, _)| *n > 0)
            .map(|(n, label)| format!("{n} {label}"))
            .collect();

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.has_changes() {
            return writeln!(f, "No changes");
        }
        for e in &self.added_enums {
            writeln!(f, "+ enum {} ({})", e.name, e.values.join(", "))?;
        }
        for e in &self.removed_enums {
            writeln!(f, "- enum {}", e.name)?;
        }
        for e in &self.modified_enums {
            writeln!(f, "~ enum {}", e.name)?;
            for v in &e.added_values {
                writeln!(f, "    + value {v}")?;
            }
            for v in &e.removed_values {
                writeln!(f, "    - value {v}")?;
            }
        }
        for t in &self.added_tables {
            writeln!(f, "+ table {} ({} columns)", t.name, t.columns.len())?;
        }
        for t in &self.removed_tables {
            writeln!(f, "- table {}", t.name)?;
        }
        for t in &self.modified_tables {
            writeln!(f, "~ table {}", t.name)?;
            for c in &t.added_columns {
                writeln!(f, "    + column {} {}", c.name, c.sql_type)?;
            }
            for c in &t.removed_columns {
                writeln!(f, "    - column {} {}", c.name, c.full_type())?;
            }
            for c in &t.modified_columns {
                write!(f, "    ~ column {}", c.name)?;
                if c.type_changed {
                    write!(f, " type {} -> {}", c.old_type, c.new_type)?;
                }
                if c.nullability_changed() {
                    write!(f, " {} -> {}", nullability(c.old_nullable), nullability(c.new_nullable))?;
                }
                writeln!(f)?;
            }
        }
        for i in &self.added_indexes {
            writeln!(f, "+ index {} on {} ({})", i.name, i.table, i.columns.join(", "))?;
        }
        for i in &self.removed_indexes {
            writeln!(f, "- index {} on {}", i.name, i.table)?;
        }
        Ok(())
    }
}

fn nullability(nullable: bool) -> &'static str {
    if nullable { "NULL" } else { "NOT NULL" }
}

/// Compare the declared model with a live schema read from a `dialect` server.
pub fn diff_schema(model: &SchemaModel, live: &DatabaseSchema, dialect: Dialect) -> SchemaDiff {
    let generator = generator_for(dialect);
    let mut diff = SchemaDiff::default();

    for table in model.ordered_tables() {
        let Some(live_table) = live.table(&table.name) else {
            diff.added_tables.push(table.clone());
            continue;
        };

        let mut table_diff = TableDiff {
            name: table.name.clone(),
            added_columns: Vec::new(),
            removed_columns: Vec::new(),
            modified_columns: Vec::new(),
        };
        for column in &table.columns {
            let Some(live_column) = live_table.column(&column.name) else {
                table_diff.added_columns.push(column.clone());
                continue;
            };
            let declared = normalize_type(&generator.comparable_type(column));
            let type_changed = declared != live_column.normalized_type();
            if type_changed || column.nullable != live_column.nullable {
                table_diff.modified_columns.push(ColumnDiff {
                    name: column.name.clone(),
                    old_type: live_column.full_type(),
                    new_type: generator.column_type(column),
                    old_nullable: live_column.nullable,
                    new_nullable: column.nullable,
                    type_changed,
                    declared: column.clone(),
                    live: live_column.clone(),
                });
            }
        }
        table_diff.removed_columns = live_table
            .columns
            .iter()
            .filter(|c| table.column(&c.name).is_none())
            .cloned()
            .collect();

        if !table_diff.is_empty() {
            diff.modified_tables.push(table_diff);
        }
    }

    diff.removed_tables = live
        .tables
        .iter()
        .filter(|t| model.table(&t.name).is_none())
        .cloned()
        .collect();

    if dialect.has_native_enums() {
        diff_enums(model, live, &mut diff);
    }

    diff.added_indexes = model
        .indexes
        .values()
        .filter(|i| live.index(&i.name).is_none())
        .cloned()
        .collect();
    diff.removed_indexes = live
        .indexes
        .iter()
        .filter(|i| model.table(&i.table).is_some())
        .filter(|i| !i.primary && !live.is_constraint_name(&i.name))
        .filter(|i| !model.indexes.contains_key(&i.name))
        .cloned()
        .collect();

    debug!(summary = %diff.summary(), "compared schemas");
    diff
}

fn diff_enums(model: &SchemaModel, live: &DatabaseSchema, diff: &mut SchemaDiff) {
    for declared in model.enums.values() {
        match live.enum_type(&declared.name) {
            None => diff.added_enums.push(declared.clone()),
            Some(existing) => {
                let added_values: Vec<String> = declared
                    .values
                    .iter()
                    .filter(|v| !existing.values.contains(v))
                    .cloned()
                    .collect();
                let removed_values: Vec<String> = existing
                    .values
                    .iter()
                    .filter(|v| !declared.values.contains(v))
                    .cloned()
                    .collect();
                if !added_values.is_empty() || !removed_values.is_empty() {
                    diff.modified_enums.push(EnumDiff {
                        name: declared.name.clone(),
                        added_values,
                        removed_values,
                    });
                }
            }
        }
    }
    diff.removed_enums = live
        .enums
        .iter()
        .filter(|e| !model.enums.contains_key(&e.name))
        .cloned()
        .collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspect::{ConstraintInfo, ConstraintKind};
    use ptah_schema::parse_source;
    use pretty_assertions::assert_eq;

    const SRC: &str = r#"
/// schema:table name="users"
/// schema:index name="idx_users_name" fields="name"
struct User {
    /// schema:field name="id" type="SERIAL" primary
    id: i32,
    /// schema:field name="email" type="VARCHAR(255)" not_null unique
    email: String,
    /// schema:field name="name" type="TEXT"
    name: String,
    /// schema:field name="status" type="ENUM" enum="active,inactive,banned" not_null
    status: String,
}

/// schema:table name="posts"
struct Post {
    /// schema:field name="id" type="SERIAL" primary
    id: i32,
}
"#;

    fn live_postgres() -> DatabaseSchema {
        let mut users = TableInfo::new("users");
        let mut email = ColumnInfo::new("email", "character varying").not_null();
        email.char_max_length = Some(255);
        let mut status = ColumnInfo::new("status", "USER-DEFINED").not_null();
        status.udt_name = "enum_users_status".to_string();
        users.columns = vec![
            ColumnInfo::new("id", "integer").not_null(),
            email,
            ColumnInfo::new("name", "text"),
            status,
        ];
        DatabaseSchema {
            tables: vec![users],
            enums: vec![EnumInfo {
                name: "enum_users_status".to_string(),
                values: vec!["active".to_string(), "inactive".to_string(), "banned".to_string()],
            }],
            indexes: vec![
                IndexInfo {
                    name: "users_pkey".to_string(),
                    table: "users".to_string(),
                    columns: vec!["id".to_string()],
                    unique: true,
                    primary: true,
                    method: Some("btree".to_string()),
                    definition: None,
                },
                IndexInfo {
                    name: "users_email_key".to_string(),
                    table: "users".to_string(),
                    columns: vec!["email".to_string()],
                    unique: true,
                    primary: false,
                    method: Some("btree".to_string()),
                    definition: None,
                },
                IndexInfo {
                    name: "idx_users_name".to_string(),
                    table: "users".to_string(),
                    columns: vec!["name".to_string()],
                    unique: false,
                    primary: false,
                    method: Some("btree".to_string()),
                    definition: None,
                },
            ],
            constraints: vec![ConstraintInfo {
                name: "users_email_key".to_string(),
                table: "users".to_string(),
                kind: ConstraintKind::Unique,
                columns: vec!["email".to_string()],
                referenced_table: None,
                referenced_columns: vec![],
                on_delete: None,
            }],
        }
    }

    #[test]
    fn test_matching_schema_has_only_missing_table() {
        let model = parse_source("m.rs", SRC).model;
        let diff = diff_schema(&model, &live_postgres(), Dialect::Postgres);

        assert_eq!(diff.added_tables.len(), 1);
        assert_eq!(diff.added_tables[0].name, "posts");
        assert!(diff.modified_tables.is_empty(), "{diff}");
        assert!(diff.removed_indexes.is_empty());
        assert!(diff.modified_enums.is_empty());
        assert_eq!(diff.summary(), "1 added tables");
    }

    #[test]
    fn test_column_changes() {
        let model = parse_source("m.rs", SRC).model;
        let mut live = live_postgres();
        let users = &mut live.tables[0];
        users.columns.retain(|c| c.name != "name");
        users.columns.push(ColumnInfo::new("legacy", "text"));
        users.columns[0] = ColumnInfo::new("id", "bigint").not_null();
        users.columns[1].nullable = true;

        let diff = diff_schema(&model, &live, Dialect::Postgres);
        let table = &diff.modified_tables[0];
        assert_eq!(table.added_columns[0].name, "name");
        assert_eq!(table.removed_columns[0].name, "legacy");

        let id = table.modified_columns.iter().find(|c| c.name == "id").unwrap();
        assert!(id.type_changed);
        assert!(!id.nullability_changed());
        assert_eq!(id.new_type, "SERIAL");
        assert_eq!(id.declared.sql_type, "SERIAL");
        assert_eq!(id.live.full_type(), "bigint");

        let email = table.modified_columns.iter().find(|c| c.name == "email").unwrap();
        assert!(!email.type_changed);
        assert!(email.nullability_changed());
    }

    #[test]
    fn test_enum_values() {
        let model = parse_source("m.rs", SRC).model;
        let mut live = live_postgres();
        live.enums[0].values = vec!["active".to_string(), "inactive".to_string(), "legacy".to_string()];
        live.enums.push(EnumInfo {
            name: "enum_old".to_string(),
            values: vec!["x".to_string()],
        });

        let diff = diff_schema(&model, &live, Dialect::Postgres);
        assert_eq!(
            diff.modified_enums,
            vec![EnumDiff {
                name: "enum_users_status".to_string(),
                added_values: vec!["banned".to_string()],
                removed_values: vec!["legacy".to_string()],
            }]
        );
        assert_eq!(diff.removed_enums[0].name, "enum_old");

        let mysql = diff_schema(&model, &live, Dialect::MySql);
        assert!(mysql.modified_enums.is_empty());
        assert!(mysql.removed_enums.is_empty());
    }

    #[test]
    fn test_index_changes() {
        let model = parse_source("m.rs", SRC).model;
        let mut live = live_postgres();
        live.indexes[2].name = "idx_users_old".to_string();

        let diff = diff_schema(&model, &live, Dialect::Postgres);
        assert_eq!(diff.added_indexes.len(), 1);
        assert_eq!(diff.added_indexes[0].name, "idx_users_name");
        assert_eq!(diff.removed_indexes.len(), 1);
        assert_eq!(diff.removed_indexes[0].name, "idx_users_old");
    }

    #[test]
    fn test_removed_table_and_empty_diff() {
        let model = parse_source("m.rs", "").model;
        let diff = diff_schema(&model, &DatabaseSchema::default(), Dialect::Postgres);
        assert!(!diff.has_changes());
        assert_eq!(diff.summary(), "No changes");
        assert_eq!(diff.to_string(), "No changes\n");

        let diff = diff_schema(&model, &live_postgres(), Dialect::Postgres);
        assert_eq!(diff.removed_tables[0].name, "users");
        assert!(diff.removed_indexes.is_empty());
    }
}
