//! Dialect SQL generation.
//!
//! Each [`Dialect`] maps to one [`DialectGenerator`]. The trait's provided
//! methods hold the rendering rules all dialects share (column order, naming,
//! primary key placement, foreign key clauses); implementations override the
//! hooks where their SQL differs.

mod generic;
mod migration;
mod mysql;
mod postgres;

use std::fmt::Write as _;

use ptah_schema::{Column, Dialect, EnumType, ForeignKey, Index, Resolution, SchemaModel, Table};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::introspect::DatabaseSchema;

pub use generic::GenericGenerator;
pub use migration::{MigrationOptions, MigrationSql, generate_migration};
pub use mysql::MySqlGenerator;
pub use postgres::PostgresGenerator;

/// Renders DDL for one dialect.
///
/// Statements are returned without a trailing `;`.
pub trait DialectGenerator: Send + Sync {
    /// The dialect this generator renders.
    fn dialect(&self) -> Dialect;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Translate a declared SQL type.
    fn map_type(&self, sql_type: &str) -> String {
        sql_type.to_string()
    }

    /// Type used for an enum column.
    fn enum_column_type(&self, column: &Column) -> String;

    /// Extra check needed to constrain an enum column, if any.
    fn enum_check(&self, _column: &Column) -> Option<String> {
        None
    }

    /// The rendered type of a column.
    fn column_type(&self, column: &Column) -> String {
        let dialect = self.dialect();
        if column.has_type_override(dialect) {
            return column.type_for(dialect).to_string();
        }
        if column.is_enum() {
            return self.enum_column_type(column);
        }
        self.map_type(&column.sql_type)
    }

    /// Column type as it reads back from the catalog, for comparison.
    fn comparable_type(&self, column: &Column) -> String {
        self.column_type(column)
    }

    /// Inline comment clause for a column.
    fn column_comment(&self, _column: &Column) -> Option<String> {
        None
    }

    /// Full column definition inside `CREATE TABLE` or `ADD COLUMN`.
    fn column_definition(&self, column: &Column, inline_primary_key: bool) -> String {
        let dialect = self.dialect();
        let mut parts = vec![self.quote_identifier(&column.name), self.column_type(column)];

        if inline_primary_key {
            parts.push("PRIMARY KEY".to_string());
        } else if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if column.unique && !column.primary {
            parts.push("UNIQUE".to_string());
        }
        if let Some(default) = column.default_for(dialect) {
            parts.push(format!("DEFAULT {default}"));
        }
        if !column.has_type_override(dialect) {
            if let Some(check) = self.enum_check(column) {
                parts.push(format!("CHECK ({check})"));
            }
        }
        if let Some(check) = column.check_for(dialect) {
            parts.push(format!("CHECK ({check})"));
        }
        if let Some(comment) = self.column_comment(column) {
            parts.push(comment);
        }
        parts.join(" ")
    }

    /// `CONSTRAINT ... FOREIGN KEY ... REFERENCES ...` clause.
    fn foreign_key_clause(&self, column: &str, fk: &ForeignKey) -> String {
        let mut clause = format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.quote_identifier(&fk.name),
            self.quote_identifier(column),
            self.quote_identifier(&fk.references.table),
            self.quote_identifier(&fk.references.column),
        );
        if let Some(action) = &fk.on_delete {
            let _ = write!(clause, " ON DELETE {}", action.to_ascii_uppercase());
        }
        clause
    }

    /// Table options appended after the closing parenthesis.
    fn table_options(&self, _table: &Table) -> Option<String> {
        None
    }

    /// `CREATE TABLE` statement. Foreign keys for which `inline_fk` returns
    /// `false` are left out.
    fn create_table(&self, table: &Table, inline_fk: &dyn Fn(&ForeignKey) -> bool) -> String {
        let pk = table.primary_key();
        let inline_pk = pk.len() == 1;

        let mut lines: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c, inline_pk && c.primary))
            .collect();

        if pk.len() > 1 {
            let cols: Vec<String> = pk.iter().map(|c| self.quote_identifier(c)).collect();
            lines.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }
        for column in &table.columns {
            if let Some(fk) = column.foreign_key.as_ref().filter(|fk| inline_fk(*fk)) {
                lines.push(self.foreign_key_clause(&column.name, fk));
            }
        }

        let mut sql = format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.quote_identifier(&table.name),
            lines.join(",\n    ")
        );
        if let Some(options) = self.table_options(table) {
            sql.push(' ');
            sql.push_str(&options);
        }
        sql
    }

    /// Comment statements issued after `CREATE TABLE`.
    fn comment_statements(&self, _table: &Table) -> Vec<String> {
        Vec::new()
    }

    /// `CREATE INDEX` statement.
    fn create_index(&self, index: &Index) -> String;

    /// `DROP INDEX` statement.
    fn drop_index(&self, name: &str, _table: &str) -> String {
        format!("DROP INDEX IF EXISTS {}", self.quote_identifier(name))
    }

    /// `CREATE TYPE ... AS ENUM`, for dialects with native enums.
    fn create_enum(&self, _e: &EnumType) -> Option<String> {
        None
    }

    /// `DROP TYPE`, for dialects with native enums.
    fn drop_enum(&self, _name: &str) -> Option<String> {
        None
    }

    /// Add a value to a native enum.
    fn add_enum_value(&self, _name: &str, _value: &str) -> Option<String> {
        None
    }

    /// `DROP TABLE` statement.
    fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", self.quote_identifier(name))
    }

    /// `ALTER TABLE ... ADD COLUMN`.
    fn add_column(&self, table: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(column, false)
        )
    }

    /// `ALTER TABLE ... DROP COLUMN`.
    fn drop_column(&self, table: &str, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            self.quote_identifier(table),
            self.quote_identifier(column)
        )
    }

    /// Change a column's type to the one `column` declares.
    fn alter_column_type(&self, table: &str, column: &Column) -> String;

    /// Set or drop `NOT NULL` to match `column`.
    fn alter_nullability(&self, table: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL",
            self.quote_identifier(table),
            self.quote_identifier(&column.name),
            if column.nullable { "DROP" } else { "SET" }
        )
    }

    /// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY`.
    fn add_foreign_key(&self, table: &str, column: &str, fk: &ForeignKey) -> String {
        format!(
            "ALTER TABLE {} ADD {}",
            self.quote_identifier(table),
            self.foreign_key_clause(column, fk)
        )
    }

    /// Statements wrapped around a batch of drops that may violate foreign keys.
    fn drop_guard(&self) -> Option<(String, String)> {
        None
    }
}

static POSTGRES: PostgresGenerator = PostgresGenerator;
static MYSQL: MySqlGenerator = MySqlGenerator;
static GENERIC: GenericGenerator = GenericGenerator;

/// The generator for a dialect.
pub fn generator_for(dialect: Dialect) -> &'static dyn DialectGenerator {
    match dialect {
        Dialect::Postgres => &POSTGRES,
        Dialect::MySql => &MYSQL,
        Dialect::Generic => &GENERIC,
    }
}

/// DDL for one table: its `CREATE TABLE`, comments and indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDdl {
    pub name: String,
    pub create: String,
    pub comments: Vec<String>,
    pub indexes: Vec<String>,
}

impl TableDdl {
    /// All statements for the table, in order.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.create.as_str())
            .chain(self.comments.iter().map(String::as_str))
            .chain(self.indexes.iter().map(String::as_str))
    }
}

/// A named statement (an enum, or a deferred constraint on a table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedDdl {
    /// Enum name, or the table a deferred constraint is added to.
    pub name: String,
    pub sql: String,
}

/// A complete schema rendered for one dialect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSchema {
    pub dialect: Dialect,
    pub enums: Vec<NamedDdl>,
    pub tables: Vec<TableDdl>,
    /// Foreign keys added after every table exists (cycles).
    pub deferred: Vec<NamedDdl>,
    pub resolution: Resolution,
}

impl GeneratedSchema {
    /// Every statement in execution order.
    pub fn statements(&self) -> Vec<&str> {
        self.enums
            .iter()
            .map(|e| e.sql.as_str())
            .chain(self.tables.iter().flat_map(TableDdl::statements))
            .chain(self.deferred.iter().map(|d| d.sql.as_str()))
            .collect()
    }

    /// A script with a header naming the dialect.
    pub fn to_sql(&self) -> String {
        let mut out = format!("-- ptah schema ({})\n", self.dialect);
        for stmt in self.statements() {
            out.push('\n');
            out.push_str(stmt);
            out.push_str(";\n");
        }
        out
    }
}

/// Render the whole model for a dialect.
pub fn generate_schema(model: &SchemaModel, dialect: Dialect) -> GeneratedSchema {
    let generator = generator_for(dialect);
    let resolution = model.resolve();

    let enums = model
        .enums
        .values()
        .filter_map(|e| {
            generator.create_enum(e).map(|sql| NamedDdl {
                name: e.name.clone(),
                sql,
            })
        })
        .collect();

    let mut tables = Vec::new();
    let mut deferred = Vec::new();
    for table in resolution.order.iter().filter_map(|n| model.table(n)) {
        let inline = |fk: &ForeignKey| !resolution.is_deferred(&table.name, &fk.references.table);
        tables.push(TableDdl {
            name: table.name.clone(),
            create: generator.create_table(table, &inline),
            comments: generator.comment_statements(table),
            indexes: model
                .indexes_for(&table.name)
                .map(|i| generator.create_index(i))
                .collect(),
        });

        for column in &table.columns {
            if let Some(fk) = column.foreign_key.as_ref().filter(|fk| !inline(*fk)) {
                deferred.push(NamedDdl {
                    name: table.name.clone(),
                    sql: generator.add_foreign_key(&table.name, &column.name, fk),
                });
            }
        }
    }

    debug!(
        dialect = %dialect,
        tables = tables.len(),
        deferred = deferred.len(),
        "generated schema"
    );
    GeneratedSchema {
        dialect,
        enums,
        tables,
        deferred,
        resolution,
    }
}

/// Statements dropping every declared table (dependents first), then enums.
pub fn drop_schema_sql(model: &SchemaModel, dialect: Dialect) -> Vec<String> {
    let generator = generator_for(dialect);
    let resolution = model.resolve();

    let mut statements: Vec<String> = resolution
        .order
        .iter()
        .rev()
        .map(|t| generator.drop_table(t))
        .collect();
    if resolution.has_cycles() {
        if let Some((before, after)) = generator.drop_guard() {
            statements.insert(0, before);
            statements.push(after);
        }
    }
    statements.extend(
        model
            .enums
            .keys()
            .filter_map(|name| generator.drop_enum(name)),
    );
    statements
}

/// Statements dropping every table and enum found in a live database.
pub fn drop_all_sql(schema: &DatabaseSchema, dialect: Dialect) -> Vec<String> {
    let generator = generator_for(dialect);
    let mut statements: Vec<String> = schema
        .tables
        .iter()
        .map(|t| generator.drop_table(&t.name))
        .collect();
    if let Some((before, after)) = generator.drop_guard() {
        statements.insert(0, before);
        statements.push(after);
    }
    statements.extend(schema.enums.iter().filter_map(|e| generator.drop_enum(&e.name)));
    statements
}

/// Quote a string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
