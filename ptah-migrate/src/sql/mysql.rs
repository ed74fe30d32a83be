//! MySQL / MariaDB DDL.

use ptah_schema::{Column, Dialect, Index, Table, quote_values};

use super::{DialectGenerator, quote_literal};

/// Declared type to MySQL type.
const TYPE_MAP: [(&str, &str); 6] = [
    ("SERIAL", "INT AUTO_INCREMENT"),
    ("BIGSERIAL", "BIGINT AUTO_INCREMENT"),
    ("JSONB", "JSON"),
    ("TIMESTAMPTZ", "TIMESTAMP"),
    ("BYTEA", "BLOB"),
    ("UUID", "CHAR(36)"),
];

/// MySQL generator. Enums are inline column types.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlGenerator;

impl DialectGenerator for MySqlGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn map_type(&self, sql_type: &str) -> String {
        let trimmed = sql_type.trim();
        TYPE_MAP
            .iter()
            .find(|(from, _)| trimmed.eq_ignore_ascii_case(from))
            .map_or_else(|| trimmed.to_string(), |(_, to)| to.to_string())
    }

    fn enum_column_type(&self, column: &Column) -> String {
        format!("ENUM({})", quote_values(&column.enum_values))
    }

    fn column_comment(&self, column: &Column) -> Option<String> {
        column
            .comment
            .as_deref()
            .map(|c| format!("COMMENT {}", quote_literal(c)))
    }

    fn table_options(&self, table: &Table) -> Option<String> {
        let engine = table.override_for(Dialect::MySql, "engine").unwrap_or("InnoDB");
        let mut options = format!("ENGINE={engine}");
        if let Some(comment) = table.comment_for(Dialect::MySql) {
            options.push_str(" COMMENT=");
            options.push_str(&quote_literal(comment));
        }
        Some(options)
    }

    fn create_index(&self, index: &Index) -> String {
        let method = index.method_upper();
        let kind = match method.as_deref() {
            Some("FULLTEXT") => "FULLTEXT ",
            Some("SPATIAL") => "SPATIAL ",
            _ if index.unique => "UNIQUE ",
            _ => "",
        };
        let using = match method.as_deref() {
            Some(m @ ("BTREE" | "HASH")) => format!(" USING {m}"),
            _ => String::new(),
        };
        let cols: Vec<String> = index.columns.iter().map(|c| self.quote_identifier(c)).collect();
        format!(
            "CREATE {kind}INDEX {} ON {} ({}){using}",
            self.quote_identifier(&index.name),
            self.quote_identifier(&index.table),
            cols.join(", ")
        )
    }

    fn drop_index(&self, name: &str, table: &str) -> String {
        format!(
            "DROP INDEX {} ON {}",
            self.quote_identifier(name),
            self.quote_identifier(table)
        )
    }

    fn alter_column_type(&self, table: &str, column: &Column) -> String {
        self.alter_nullability(table, column)
    }

    /// `MODIFY COLUMN` replaces the whole definition, so default, comment and
    /// `AUTO_INCREMENT` are restated. `UNIQUE` is left out; repeating it would
    /// add a second unique key.
    fn alter_nullability(&self, table: &str, column: &Column) -> String {
        let mut column = column.clone();
        column.unique = false;
        format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            self.quote_identifier(table),
            self.column_definition(&column, false)
        )
    }

    fn drop_guard(&self) -> Option<(String, String)> {
        Some((
            "SET FOREIGN_KEY_CHECKS = 0".to_string(),
            "SET FOREIGN_KEY_CHECKS = 1".to_string(),
        ))
    }
}
