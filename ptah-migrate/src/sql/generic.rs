//! Portable DDL for engines without a dedicated generator.

use ptah_schema::{Column, Dialect, Index, quote_values};

use super::DialectGenerator;

/// Generic generator: declared types verbatim, enums as `TEXT` plus a check.
#[derive(Debug, Default, Clone, Copy)]
pub struct GenericGenerator;

impl DialectGenerator for GenericGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Generic
    }

    fn enum_column_type(&self, _column: &Column) -> String {
        "TEXT".to_string()
    }

    fn enum_check(&self, column: &Column) -> Option<String> {
        column.is_enum().then(|| {
            format!(
                "{} IN ({})",
                self.quote_identifier(&column.name),
                quote_values(&column.enum_values)
            )
        })
    }

    fn create_index(&self, index: &Index) -> String {
        let cols: Vec<String> = index.columns.iter().map(|c| self.quote_identifier(c)).collect();
        format!(
            "CREATE {}INDEX {} ON {} ({})",
            if index.unique { "UNIQUE " } else { "" },
            self.quote_identifier(&index.name),
            self.quote_identifier(&index.table),
            cols.join(", ")
        )
    }

    fn alter_column_type(&self, table: &str, column: &Column) -> String {
        format!(
            "ALTER TABLE {} ALTER COLUMN {} TYPE {}",
            self.quote_identifier(table),
            self.quote_identifier(&column.name),
            self.column_type(column)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ptah_schema::parse_source;

    const SRC: &str = r#"
/// schema:table name="tickets"
/// schema:index name="idx_tickets_open" fields="state,id" type="GIN" condition="state = 'open'"
struct Ticket {
    /// schema:field name="id" type="INTEGER" primary
    id: i32,
    /// schema:field name="tenant" type="INTEGER" primary
    tenant: i32,
    /// schema:field name="state" type="ENUM" enum="open,closed" not_null
    state: String,
}
"#;

    #[test]
    fn test_enum_as_checked_text() {
        let model = parse_source("t.rs", SRC).model;
        let table = model.table("tickets").unwrap();
        let sql = GenericGenerator.create_table(table, &|_| true);
        assert!(sql.contains("\"state\" TEXT NOT NULL CHECK (\"state\" IN ('open', 'closed'))"));
        assert!(sql.contains("PRIMARY KEY (\"id\", \"tenant\")"));
        assert!(sql.contains("\"id\" INTEGER NOT NULL"));
    }

    #[test]
    fn test_index_drops_method_and_condition() {
        let model = parse_source("t.rs", SRC).model;
        assert_eq!(
            GenericGenerator.create_index(&model.indexes["idx_tickets_open"]),
            "CREATE INDEX \"idx_tickets_open\" ON \"tickets\" (\"state\", \"id\")"
        );
    }

    #[test]
    fn test_no_native_enums() {
        assert!(GenericGenerator.add_enum_value("e", "x").is_none());
    }
}
