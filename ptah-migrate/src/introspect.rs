//! Live database introspection.
//!
//! Drivers implement the phase methods of [`Introspector`]; the provided
//! [`Introspector::introspect`] runs them in order and assembles a
//! [`DatabaseSchema`], which is the read-only input to the differ.

use std::fmt;
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{MigrateResult, MigrationError};
use crate::history::DEFAULT_TABLE;

/// Configuration for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrospectionConfig {
    /// Schema (Postgres) or database (MySQL) to read. `None` uses the
    /// connection's current one.
    pub database_schema: Option<String>,
    /// Tables to include (empty = all).
    pub include_tables: Vec<String>,
    /// Tables to exclude.
    pub exclude_tables: Vec<String>,
    /// Whether to include views.
    pub include_views: bool,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            database_schema: None,
            include_tables: Vec::new(),
            exclude_tables: vec![DEFAULT_TABLE.to_string()],
            include_views: false,
        }
    }
}

impl IntrospectionConfig {
    /// Create a new introspection config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the schema or database to introspect.
    pub fn database_schema(mut self, schema: impl Into<String>) -> Self {
        self.database_schema = Some(schema.into());
        self
    }

    /// Include only these tables.
    pub fn include_tables(mut self, tables: Vec<String>) -> Self {
        self.include_tables = tables;
        self
    }

    /// Exclude these tables.
    pub fn exclude_tables(mut self, tables: Vec<String>) -> Self {
        self.exclude_tables = tables;
        self
    }

    /// Also exclude one table (e.g. a renamed tracking table).
    pub fn exclude_table(mut self, table: impl Into<String>) -> Self {
        self.exclude_tables.push(table.into());
        self
    }

    /// Whether to include views.
    pub fn include_views(mut self, include: bool) -> Self {
        self.include_views = include;
        self
    }

    /// Check if a table should be included.
    pub fn should_include_table(&self, name: &str) -> bool {
        if self.exclude_tables.iter().any(|t| t == name) {
            return false;
        }
        self.include_tables.is_empty() || self.include_tables.iter().any(|t| t == name)
    }
}

/// A table or view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    /// `BASE TABLE` or `VIEW`.
    pub table_type: String,
    pub comment: Option<String>,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// Create a base table with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_type: "BASE TABLE".to_string(),
            comment: None,
            columns: Vec::new(),
        }
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Whether this is a view.
    pub fn is_view(&self) -> bool {
        self.table_type.eq_ignore_ascii_case("VIEW")
    }
}

/// A column as reported by the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    /// Catalog data type (`integer`, `character varying`, `USER-DEFINED`).
    pub data_type: String,
    /// Underlying type name (Postgres `udt_name`, e.g. `int4`).
    pub udt_name: String,
    /// Full column type (MySQL `COLUMN_TYPE`, e.g. `enum('a','b')`).
    pub column_type: Option<String>,
    pub nullable: bool,
    pub default: Option<String>,
    pub char_max_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub ordinal_position: i64,
    pub auto_increment: bool,
    pub primary_key: bool,
    pub unique: bool,
}

impl ColumnInfo {
    /// Create a nullable column of the given type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            udt_name: data_type.clone(),
            data_type,
            nullable: true,
            ..Self::default()
        }
    }

    /// Set nullability.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// The complete type, with length / precision where the catalog splits
    /// them out.
    pub fn full_type(&self) -> String {
        if let Some(column_type) = &self.column_type {
            return column_type.clone();
        }
        let data_type = self.data_type.to_ascii_lowercase();
        match data_type.as_str() {
            "user-defined" => self.udt_name.clone(),
            "array" => format!("{}[]", self.udt_name.trim_start_matches('_')),
            "character varying" | "character" | "varchar" | "char" => match self.char_max_length {
                Some(len) => format!("{data_type}({len})"),
                None => data_type,
            },
            "numeric" | "decimal" => match (self.numeric_precision, self.numeric_scale) {
                (Some(p), Some(s)) => format!("{data_type}({p},{s})"),
                (Some(p), None) => format!("{data_type}({p})"),
                _ => data_type,
            },
            _ => data_type,
        }
    }

    /// [`full_type`](Self::full_type) passed through [`normalize_type`].
    pub fn normalized_type(&self) -> String {
        normalize_type(&self.full_type())
    }
}

/// A native enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumInfo {
    pub name: String,
    pub values: Vec<String>,
}

/// An index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
    pub primary: bool,
    /// Access method (`btree`, `gin`, `FULLTEXT`).
    pub method: Option<String>,
    /// Catalog definition text, when the database provides one.
    pub definition: Option<String>,
}

/// Kind of table constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
}

impl ConstraintKind {
    /// Parse an `information_schema` constraint type.
    pub fn from_catalog(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRIMARY KEY" => Some(Self::PrimaryKey),
            "UNIQUE" => Some(Self::Unique),
            "FOREIGN KEY" => Some(Self::ForeignKey),
            "CHECK" => Some(Self::Check),
            _ => None,
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::Unique => "UNIQUE",
            Self::ForeignKey => "FOREIGN KEY",
            Self::Check => "CHECK",
        })
    }
}

/// A table constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintInfo {
    pub name: String,
    pub table: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    pub referenced_table: Option<String>,
    pub referenced_columns: Vec<String>,
    pub on_delete: Option<String>,
}

/// Everything read from a live database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub tables: Vec<TableInfo>,
    pub enums: Vec<EnumInfo>,
    pub indexes: Vec<IndexInfo>,
    pub constraints: Vec<ConstraintInfo>,
}

impl DatabaseSchema {
    /// Get a table by name.
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Get an enum by name.
    pub fn enum_type(&self, name: &str) -> Option<&EnumInfo> {
        self.enums.iter().find(|e| e.name == name)
    }

    /// Get an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Indexes on a table.
    pub fn indexes_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a IndexInfo> {
        self.indexes.iter().filter(move |i| i.table == table)
    }

    /// Whether some constraint is named `name` (its index backs it).
    pub fn is_constraint_name(&self, name: &str) -> bool {
        self.constraints.iter().any(|c| c.name == name)
    }

    /// Whether the database holds no tables or enums.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.enums.is_empty()
    }

    /// Copy constraint information onto columns and indexes.
    pub fn annotate_keys(&mut self) {
        for constraint in &self.constraints {
            let Some(table) = self.tables.iter_mut().find(|t| t.name == constraint.table) else {
                continue;
            };
            match constraint.kind {
                ConstraintKind::PrimaryKey => {
                    for column in table.columns.iter_mut().filter(|c| constraint.columns.contains(&c.name)) {
                        column.primary_key = true;
                    }
                }
                ConstraintKind::Unique if constraint.columns.len() == 1 => {
                    if let Some(column) = table.columns.iter_mut().find(|c| c.name == constraint.columns[0]) {
                        column.unique = true;
                    }
                }
                _ => {}
            }
        }

        for index in &mut self.indexes {
            if self
                .constraints
                .iter()
                .any(|c| c.kind == ConstraintKind::PrimaryKey && c.name == index.name && c.table == index.table)
            {
                index.primary = true;
            }
        }
    }
}

impl fmt::Display for DatabaseSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, "(empty database)");
        }
        for e in &self.enums {
            writeln!(f, "enum {} ({})", e.name, e.values.join(", "))?;
        }
        if !self.enums.is_empty() {
            writeln!(f)?;
        }

        for table in &self.tables {
            write!(f, "{} {}", if table.is_view() { "view" } else { "table" }, table.name)?;
            if let Some(comment) = &table.comment {
                write!(f, "  -- {comment}")?;
            }
            writeln!(f)?;
            for column in &table.columns {
                write!(f, "  {} {}", column.name, column.full_type())?;
                if !column.nullable {
                    write!(f, " NOT NULL")?;
                }
                if column.primary_key {
                    write!(f, " PRIMARY KEY")?;
                } else if column.unique {
                    write!(f, " UNIQUE")?;
                }
                if column.auto_increment {
                    write!(f, " AUTO_INCREMENT")?;
                }
                if let Some(default) = &column.default {
                    write!(f, " DEFAULT {default}")?;
                }
                writeln!(f)?;
            }
            for constraint in self
                .constraints
                .iter()
                .filter(|c| c.table == table.name && c.kind == ConstraintKind::ForeignKey)
            {
                writeln!(
                    f,
                    "  {} ({}) -> {}({})",
                    constraint.name,
                    constraint.columns.join(", "),
                    constraint.referenced_table.as_deref().unwrap_or("?"),
                    constraint.referenced_columns.join(", ")
                )?;
            }
            for index in self.indexes_for(&table.name).filter(|i| !i.primary) {
                writeln!(
                    f,
                    "  {}index {} ({})",
                    if index.unique { "unique " } else { "" },
                    index.name,
                    index.columns.join(", ")
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Reads a live schema, one phase at a time.
#[async_trait::async_trait]
pub trait Introspector: Send {
    /// Tables (and views) in the target schema, without columns.
    async fn get_tables(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<TableInfo>>;

    /// Columns of one table, in ordinal order.
    async fn get_columns(&mut self, config: &IntrospectionConfig, table: &str) -> MigrateResult<Vec<ColumnInfo>>;

    /// Native enum types. Dialects without them return nothing.
    async fn get_enums(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<EnumInfo>>;

    /// All indexes in the target schema.
    async fn get_indexes(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<IndexInfo>>;

    /// All table constraints in the target schema.
    async fn get_constraints(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<ConstraintInfo>>;

    /// Read the whole schema. Any failing phase fails the call.
    async fn introspect(&mut self, config: &IntrospectionConfig) -> MigrateResult<DatabaseSchema> {
        let mut tables: Vec<TableInfo> = with_phase(self.get_tables(config).await, || "reading tables".to_string())?
            .into_iter()
            .filter(|t| config.should_include_table(&t.name))
            .filter(|t| config.include_views || !t.is_view())
            .collect();

        for table in &mut tables {
            let name = table.name.clone();
            table.columns = with_phase(self.get_columns(config, &name).await, || {
                format!("reading columns for table {name}")
            })?;
            debug!(table = %table.name, columns = table.columns.len(), "read columns");
        }

        let enums = with_phase(self.get_enums(config).await, || "reading enums".to_string())?;
        let keep = |table: &str| tables.iter().any(|t| t.name == table);
        let indexes = with_phase(self.get_indexes(config).await, || "reading indexes".to_string())?
            .into_iter()
            .filter(|i| keep(&i.table))
            .collect();
        let constraints = with_phase(self.get_constraints(config).await, || "reading constraints".to_string())?
            .into_iter()
            .filter(|c| keep(&c.table))
            .collect();

        let mut schema = DatabaseSchema {
            tables,
            enums,
            indexes,
            constraints,
        };
        schema.annotate_keys();
        info!(
            tables = schema.tables.len(),
            enums = schema.enums.len(),
            indexes = schema.indexes.len(),
            "introspected database"
        );
        Ok(schema)
    }
}

fn with_phase<T>(result: MigrateResult<T>, phase: impl FnOnce() -> String) -> MigrateResult<T> {
    result.map_err(|e| match e {
        MigrationError::Timeout(_) | MigrationError::Connection(_) | MigrationError::Introspection { .. } => e,
        MigrationError::Database(message) => MigrationError::introspection(phase(), message),
        other => MigrationError::introspection(phase(), other),
    })
}

static SPACING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*([(,])\s*").expect("valid regex"));
static CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+\)").expect("valid regex"));
static DISPLAY_WIDTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(tinyint|smallint|mediumint|int|integer|bigint)\(\d+\)").expect("valid regex")
});

/// Normalize a type name so declared and catalog spellings compare equal.
///
/// Case and spacing are folded, aliases mapped to one name
/// (`int4`/`serial` to `integer`, `character varying` to `varchar`,
/// `timestamp with time zone` to `timestamptz`), MySQL display widths and
/// `auto_increment` dropped, and `tinyint(1)` read as `boolean`.
pub fn normalize_type(raw: &str) -> String {
    let lowered = raw.to_ascii_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    let without_ai = collapsed.replace(" auto_increment", "").replace("auto_increment", "");
    let spaced = SPACING.replace_all(without_ai.trim(), "$1");
    let spaced = CLOSE.replace_all(&spaced, ")").into_owned();

    if let Some(base) = spaced.strip_suffix("[]") {
        return format!("{}[]", normalize_type(base));
    }
    if spaced == "tinyint(1)" {
        return "boolean".to_string();
    }
    let unwidthed = DISPLAY_WIDTH.replace(&spaced, "$1").into_owned();

    let (base, args) = match unwidthed.find('(') {
        Some(pos) => unwidthed.split_at(pos),
        None => (unwidthed.as_str(), ""),
    };
    let base = match base.trim() {
        "int4" | "int" | "integer" | "serial" | "serial4" => "integer",
        "int8" | "bigint" | "bigserial" | "serial8" => "bigint",
        "int2" | "smallint" | "smallserial" | "serial2" => "smallint",
        "bool" | "boolean" => "boolean",
        "character varying" | "varchar" => "varchar",
        "character" | "char" | "bpchar" => "char",
        "timestamp with time zone" | "timestamptz" => "timestamptz",
        "timestamp without time zone" | "timestamp" => "timestamp",
        "time with time zone" | "timetz" => "timetz",
        "time without time zone" | "time" => "time",
        "double precision" | "float8" | "double" => "double",
        "float4" | "real" => "real",
        "decimal" | "numeric" => "numeric",
        other => other,
    };
    format!("{base}{args}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_aliases() {
        assert_eq!(normalize_type("SERIAL"), "integer");
        assert_eq!(normalize_type("int4"), "integer");
        assert_eq!(normalize_type("INT AUTO_INCREMENT"), "integer");
        assert_eq!(normalize_type("int(11)"), "integer");
        assert_eq!(normalize_type("BIGINT AUTO_INCREMENT"), "bigint");
        assert_eq!(normalize_type("bigint(20) unsigned"), "bigint unsigned");
        assert_eq!(normalize_type("tinyint(1)"), "boolean");
        assert_eq!(normalize_type("BOOLEAN"), "boolean");
        assert_eq!(normalize_type("character varying(255)"), "varchar(255)");
        assert_eq!(normalize_type("VARCHAR(255)"), "varchar(255)");
        assert_eq!(normalize_type("timestamp with time zone"), "timestamptz");
        assert_eq!(normalize_type("TIMESTAMP"), "timestamp");
        assert_eq!(normalize_type("DOUBLE PRECISION"), "double");
        assert_eq!(normalize_type("DECIMAL(10, 2)"), "numeric(10,2)");
        assert_eq!(normalize_type("_int4[]"), "_int4[]");
        assert_eq!(normalize_type("int4[]"), "integer[]");
    }

    #[test]
    fn test_normalize_enum_lists() {
        assert_eq!(
            normalize_type("ENUM('active', 'inactive')"),
            normalize_type("enum('active','inactive')")
        );
    }

    #[test]
    fn test_full_type() {
        let mut col = ColumnInfo::new("email", "character varying");
        col.char_max_length = Some(255);
        assert_eq!(col.full_type(), "character varying(255)");
        assert_eq!(col.normalized_type(), "varchar(255)");

        let mut status = ColumnInfo::new("status", "USER-DEFINED");
        status.udt_name = "enum_users_status".to_string();
        assert_eq!(status.full_type(), "enum_users_status");

        let mut price = ColumnInfo::new("price", "numeric");
        price.numeric_precision = Some(10);
        price.numeric_scale = Some(2);
        assert_eq!(price.full_type(), "numeric(10,2)");

        let mut flag = ColumnInfo::new("flag", "tinyint");
        flag.column_type = Some("tinyint(1)".to_string());
        assert_eq!(flag.normalized_type(), "boolean");
    }

    #[test]
    fn test_config_filters() {
        let config = IntrospectionConfig::new();
        assert!(!config.should_include_table("schema_migrations"));
        assert!(config.should_include_table("users"));

        let only = IntrospectionConfig::new().include_tables(vec!["users".to_string()]);
        assert!(only.should_include_table("users"));
        assert!(!only.should_include_table("posts"));
    }

    #[test]
    fn test_annotate_keys() {
        let mut users = TableInfo::new("users");
        users.columns = vec![
            ColumnInfo::new("id", "integer").not_null(),
            ColumnInfo::new("email", "text"),
        ];
        let mut schema = DatabaseSchema {
            tables: vec![users],
            indexes: vec![IndexInfo {
                name: "users_pkey".to_string(),
                table: "users".to_string(),
                columns: vec!["id".to_string()],
                unique: true,
                primary: false,
                method: Some("btree".to_string()),
                definition: None,
            }],
            constraints: vec![
                ConstraintInfo {
                    name: "users_pkey".to_string(),
                    table: "users".to_string(),
                    kind: ConstraintKind::PrimaryKey,
                    columns: vec!["id".to_string()],
                    referenced_table: None,
                    referenced_columns: vec![],
                    on_delete: None,
                },
                ConstraintInfo {
                    name: "users_email_key".to_string(),
                    table: "users".to_string(),
                    kind: ConstraintKind::Unique,
                    columns: vec!["email".to_string()],
                    referenced_table: None,
                    referenced_columns: vec![],
                    on_delete: None,
                },
            ],
            ..Default::default()
        };
        schema.annotate_keys();

        let users = schema.table("users").unwrap();
        assert!(users.column("id").unwrap().primary_key);
        assert!(users.column("email").unwrap().unique);
        assert!(schema.indexes[0].primary);
        assert!(schema.to_string().contains("id integer NOT NULL PRIMARY KEY"));
    }

    #[test]
    fn test_constraint_kind_from_catalog() {
        assert_eq!(ConstraintKind::from_catalog("FOREIGN KEY"), Some(ConstraintKind::ForeignKey));
        assert_eq!(ConstraintKind::from_catalog("primary key"), Some(ConstraintKind::PrimaryKey));
        assert_eq!(ConstraintKind::from_catalog("EXCLUDE"), None);
    }

    #[tokio::test]
    async fn test_introspect_filters_and_wraps_errors() {
        use crate::testing::MockConnection;
        use ptah_schema::Dialect;

        let mut conn = MockConnection::new(Dialect::Postgres);
        let mut users = TableInfo::new("users");
        users.columns = vec![ColumnInfo::new("id", "integer").not_null()];
        let mut view = TableInfo::new("active_users");
        view.table_type = "VIEW".to_string();
        conn.schema.tables = vec![users, view, TableInfo::new("schema_migrations")];

        let schema = conn.introspect(&IntrospectionConfig::default()).await.unwrap();
        let names: Vec<_> = schema.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users"]);
        assert_eq!(schema.tables[0].columns.len(), 1);

        conn.fail_on("columns");
        let err = conn.introspect(&IntrospectionConfig::default()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Introspection failed while reading columns for table users: permission denied"
        );
    }
}
