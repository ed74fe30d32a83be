//! PostgreSQL DDL.

use ptah_schema::{Column, Dialect, EnumType, Index, Table};

use super::{DialectGenerator, quote_literal};

const INDEX_METHODS: [&str; 6] = ["BTREE", "HASH", "GIST", "SPGIST", "GIN", "BRIN"];

/// PostgreSQL generator. Enums are native types.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresGenerator;

impl DialectGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn enum_column_type(&self, column: &Column) -> String {
        match &column.enum_name {
            Some(name) => self.quote_identifier(name),
            None => column.sql_type.clone(),
        }
    }

    fn comparable_type(&self, column: &Column) -> String {
        if column.is_enum() && !column.has_type_override(Dialect::Postgres) {
            return column.enum_name.clone().unwrap_or_default();
        }
        self.column_type(column)
    }

    fn comment_statements(&self, table: &Table) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(comment) = table.comment_for(Dialect::Postgres) {
            out.push(format!(
                "COMMENT ON TABLE {} IS {}",
                self.quote_identifier(&table.name),
                quote_literal(comment)
            ));
        }
        for column in &table.columns {
            if let Some(comment) = &column.comment {
                out.push(format!(
                    "COMMENT ON COLUMN {}.{} IS {}",
                    self.quote_identifier(&table.name),
                    self.quote_identifier(&column.name),
                    quote_literal(comment)
                ));
            }
        }
        out
    }

    fn create_index(&self, index: &Index) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let method = index
            .method_upper()
            .filter(|m| INDEX_METHODS.contains(&m.as_str()))
            .map(|m| format!(" USING {m}"))
            .unwrap_or_default();
        let ops = index.ops_for(Dialect::Postgres);
        let cols: Vec<String> = index
            .columns
            .iter()
            .map(|c| match ops {
                Some(ops) => format!("{} {ops}", self.quote_identifier(c)),
                None => self.quote_identifier(c),
            })
            .collect();

        let mut sql = format!(
            "CREATE {unique}INDEX {} ON {}{method} ({})",
            self.quote_identifier(&index.name),
            self.quote_identifier(&index.table),
            cols.join(", ")
        );
        if let Some(condition) = &index.condition {
            sql.push_str(" WHERE ");
            sql.push_str(condition);
        }
        sql
    }

    fn create_enum(&self, e: &EnumType) -> Option<String> {
        Some(format!(
            "CREATE TYPE {} AS ENUM ({})",
            self.quote_identifier(&e.name),
            e.quoted_values()
        ))
    }

    fn drop_enum(&self, name: &str) -> Option<String> {
        Some(format!("DROP TYPE IF EXISTS {} CASCADE", self.quote_identifier(name)))
    }

    fn add_enum_value(&self, name: &str, value: &str) -> Option<String> {
        Some(format!(
            "ALTER TYPE {} ADD VALUE IF NOT EXISTS {}",
            self.quote_identifier(name),
            quote_literal(value)
        ))
    }

    fn drop_table(&self, name: &str) -> String {
        format!("DROP TABLE IF EXISTS {} CASCADE", self.quote_identifier(name))
    }

    fn alter_column_type(&self, table: &str, column: &Column) -> String {
        let col = self.quote_identifier(&column.name);
        let new_type = storage_type(&self.column_type(column));
        format!(
            "ALTER TABLE {} ALTER COLUMN {col} TYPE {new_type} USING {col}::{new_type}",
            self.quote_identifier(table)
        )
    }
}

/// The concrete type behind a serial pseudo-type. Serials are only valid in
/// `CREATE TABLE` and `ADD COLUMN`.
fn storage_type(column_type: &str) -> String {
    match column_type.trim().to_ascii_uppercase().as_str() {
        "SERIAL" | "SERIAL4" => "integer".to_string(),
        "BIGSERIAL" | "SERIAL8" => "bigint".to_string(),
        "SMALLSERIAL" | "SERIAL2" => "smallint".to_string(),
        _ => column_type.to_string(),
    }
}
