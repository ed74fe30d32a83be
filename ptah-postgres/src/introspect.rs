//! Catalog introspection for PostgreSQL.
//!
//! Tables and columns come from `information_schema`; enums, indexes and
//! constraints from the `pg_catalog` relations, which keep multi-column key
//! order intact. Every identifier is cast to `text` so rows decode as plain
//! strings regardless of the catalog domain types.

use indexmap::IndexMap;
use ptah_migrate::{
    ColumnInfo, ConstraintInfo, ConstraintKind, EnumInfo, IndexInfo, IntrospectionConfig, Introspector,
    MigrateResult, TableInfo,
};
use tokio_postgres::Row;

use crate::connection::PgConnection;
use crate::error::PgError;

const TABLES_SQL: &str = "\
SELECT c.relname::text AS name,
       CASE c.relkind WHEN 'v' THEN 'VIEW' WHEN 'm' THEN 'VIEW' ELSE 'BASE TABLE' END AS table_type,
       obj_description(c.oid, 'pg_class') AS comment
FROM pg_class c
JOIN pg_namespace n ON n.oid = c.relnamespace
WHERE n.nspname = $1 AND c.relkind IN ('r', 'p', 'v', 'm')
ORDER BY c.relname";

const COLUMNS_SQL: &str = "\
SELECT column_name::text AS name,
       data_type::text AS data_type,
       udt_name::text AS udt_name,
       is_nullable::text = 'YES' AS nullable,
       column_default::text AS column_default,
       character_maximum_length::int8 AS char_max_length,
       numeric_precision::int8 AS numeric_precision,
       numeric_scale::int8 AS numeric_scale,
       ordinal_position::int8 AS ordinal_position,
       is_identity::text = 'YES' AS is_identity
FROM information_schema.columns
WHERE table_schema = $1 AND table_name = $2
ORDER BY ordinal_position";

const ENUMS_SQL: &str = "\
SELECT t.typname::text AS name, e.enumlabel::text AS value
FROM pg_type t
JOIN pg_enum e ON e.enumtypid = t.oid
JOIN pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = $1
ORDER BY t.typname, e.enumsortorder";

const INDEXES_SQL: &str = "\
SELECT tablename::text AS table_name, indexname::text AS index_name, indexdef
FROM pg_indexes
WHERE schemaname = $1
ORDER BY tablename, indexname";

const CONSTRAINTS_SQL: &str = "\
SELECT con.conname::text AS name,
       rel.relname::text AS table_name,
       con.contype::text AS kind,
       ARRAY(SELECT a.attname::text
             FROM unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord)
             JOIN pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum
             ORDER BY k.ord) AS columns,
       ref.relname::text AS referenced_table,
       ARRAY(SELECT a.attname::text
             FROM unnest(con.confkey) WITH ORDINALITY AS k(attnum, ord)
             JOIN pg_attribute a ON a.attrelid = con.confrelid AND a.attnum = k.attnum
             ORDER BY k.ord) AS referenced_columns,
       con.confdeltype::text AS on_delete
FROM pg_constraint con
JOIN pg_class rel ON rel.oid = con.conrelid
JOIN pg_namespace n ON n.oid = rel.relnamespace
LEFT JOIN pg_class ref ON ref.oid = con.confrelid
WHERE n.nspname = $1 AND con.contype IN ('p', 'u', 'f', 'c')
ORDER BY rel.relname, con.conname";

impl PgConnection {
    fn target_schema(&self, config: &IntrospectionConfig) -> String {
        config
            .database_schema
            .clone()
            .unwrap_or_else(|| self.current_schema().to_string())
    }
}

#[async_trait::async_trait]
impl Introspector for PgConnection {
    async fn get_tables(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<TableInfo>> {
        let schema = self.target_schema(config);
        let rows = self.query(TABLES_SQL, &[&schema]).await?;
        rows.iter()
            .map(|row| {
                Ok(TableInfo {
                    name: row.try_get("name")?,
                    table_type: row.try_get("table_type")?,
                    comment: row.try_get("comment")?,
                    columns: Vec::new(),
                })
            })
            .collect::<Result<_, tokio_postgres::Error>>()
            .map_err(|e| PgError::from(e).into())
    }

    async fn get_columns(&mut self, config: &IntrospectionConfig, table: &str) -> MigrateResult<Vec<ColumnInfo>> {
        let schema = self.target_schema(config);
        let rows = self.query(COLUMNS_SQL, &[&schema, &table]).await?;
        rows.iter()
            .map(column_from_row)
            .collect::<Result<_, tokio_postgres::Error>>()
            .map_err(|e| PgError::from(e).into())
    }

    async fn get_enums(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<EnumInfo>> {
        let schema = self.target_schema(config);
        let rows = self.query(ENUMS_SQL, &[&schema]).await?;
        let mut enums: IndexMap<String, Vec<String>> = IndexMap::new();
        for row in &rows {
            let name: String = row.try_get("name").map_err(PgError::from)?;
            let value: String = row.try_get("value").map_err(PgError::from)?;
            enums.entry(name).or_default().push(value);
        }
        Ok(enums
            .into_iter()
            .map(|(name, values)| EnumInfo { name, values })
            .collect())
    }

    async fn get_indexes(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<IndexInfo>> {
        let schema = self.target_schema(config);
        let rows = self.query(INDEXES_SQL, &[&schema]).await?;
        let mut indexes = Vec::with_capacity(rows.len());
        for row in &rows {
            let table: String = row.try_get("table_name").map_err(PgError::from)?;
            let name: String = row.try_get("index_name").map_err(PgError::from)?;
            let definition: String = row.try_get("indexdef").map_err(PgError::from)?;
            let parsed = parse_index_definition(&definition);
            indexes.push(IndexInfo {
                name,
                table,
                columns: parsed.columns,
                unique: parsed.unique,
                primary: false,
                method: parsed.method,
                definition: Some(definition),
            });
        }
        Ok(indexes)
    }

    async fn get_constraints(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<ConstraintInfo>> {
        let schema = self.target_schema(config);
        let rows = self.query(CONSTRAINTS_SQL, &[&schema]).await?;
        let mut constraints = Vec::with_capacity(rows.len());
        for row in &rows {
            let code: String = row.try_get("kind").map_err(PgError::from)?;
            let Some(kind) = constraint_kind(&code) else {
                continue;
            };
            let on_delete: Option<String> = row.try_get("on_delete").map_err(PgError::from)?;
            constraints.push(ConstraintInfo {
                name: row.try_get("name").map_err(PgError::from)?,
                table: row.try_get("table_name").map_err(PgError::from)?,
                kind,
                columns: row.try_get("columns").map_err(PgError::from)?,
                referenced_table: row.try_get("referenced_table").map_err(PgError::from)?,
                referenced_columns: row.try_get("referenced_columns").map_err(PgError::from)?,
                on_delete: match kind {
                    ConstraintKind::ForeignKey => on_delete.as_deref().and_then(delete_action).map(str::to_string),
                    _ => None,
                },
            });
        }
        Ok(constraints)
    }
}

fn column_from_row(row: &Row) -> Result<ColumnInfo, tokio_postgres::Error> {
    let default: Option<String> = row.try_get("column_default")?;
    let is_identity: bool = row.try_get("is_identity")?;
    let auto_increment = is_identity || default.as_deref().is_some_and(|d| d.starts_with("nextval("));
    Ok(ColumnInfo {
        name: row.try_get("name")?,
        data_type: row.try_get("data_type")?,
        udt_name: row.try_get("udt_name")?,
        column_type: None,
        nullable: row.try_get("nullable")?,
        default,
        char_max_length: row.try_get("char_max_length")?,
        numeric_precision: row.try_get("numeric_precision")?,
        numeric_scale: row.try_get("numeric_scale")?,
        ordinal_position: row.try_get("ordinal_position")?,
        auto_increment,
        primary_key: false,
        unique: false,
    })
}

/// `pg_constraint.contype` to a constraint kind.
fn constraint_kind(code: &str) -> Option<ConstraintKind> {
    match code {
        "p" => Some(ConstraintKind::PrimaryKey),
        "u" => Some(ConstraintKind::Unique),
        "f" => Some(ConstraintKind::ForeignKey),
        "c" => Some(ConstraintKind::Check),
        _ => None,
    }
}

/// `pg_constraint.confdeltype` to its SQL action.
fn delete_action(code: &str) -> Option<&'static str> {
    match code {
        "a" => Some("NO ACTION"),
        "r" => Some("RESTRICT"),
        "c" => Some("CASCADE"),
        "n" => Some("SET NULL"),
        "d" => Some("SET DEFAULT"),
        _ => None,
    }
}

/// What can be read back out of a `pg_indexes.indexdef` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIndex {
    pub unique: bool,
    pub method: Option<String>,
    pub columns: Vec<String>,
}

/// Parse `CREATE [UNIQUE] INDEX name ON table [USING method] (cols) ...`.
///
/// Columns come from the key list that follows the table (and method), so a
/// trailing `INCLUDE (...)` or partial-index `WHERE (...)` is not mistaken for
/// it. Operator classes and sort options are dropped; expressions are kept
/// whole.
pub fn parse_index_definition(definition: &str) -> ParsedIndex {
    let unique = definition.contains("UNIQUE INDEX");

    let (method, list_start) = match definition.find(" USING ") {
        Some(at) => {
            let rest = &definition[at + 7..];
            let method: String = rest.chars().take_while(|c| c.is_ascii_alphanumeric() || *c == '_').collect();
            (Some(method).filter(|m| !m.is_empty()), at + 7)
        }
        None => (None, definition.find(" ON ").map_or(0, |at| at + 4)),
    };

    let columns = definition[list_start..]
        .find('(')
        .and_then(|open| balanced(&definition[list_start + open..]))
        .map(|inner| split_top_level(inner).into_iter().map(index_element).collect())
        .unwrap_or_default();

    ParsedIndex { unique, method, columns }
}

/// Contents of the parenthesized group `text` starts with.
fn balanced(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[1..i]);
                }
            }
            _ => {}
        }
    }
    None
}

fn split_top_level(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let (mut depth, mut quoted, mut start) = (0i32, false, 0);
    for (i, c) in list.char_indices() {
        match c {
            '"' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            ',' if !quoted && depth == 0 => {
                parts.push(list[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(list[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Column name of one key element, or the expression itself.
fn index_element(element: &str) -> String {
    if element.starts_with('(') {
        return element.to_string();
    }
    if let Some(rest) = element.strip_prefix('"') {
        if let Some(end) = rest.find('"') {
            return rest[..end].to_string();
        }
    }
    let token = element.split_whitespace().next().unwrap_or(element);
    if token.contains('(') {
        element.to_string()
    } else {
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_unique_btree() {
        let parsed = parse_index_definition("CREATE UNIQUE INDEX users_email_key ON public.users USING btree (email)");
        assert_eq!(
            parsed,
            ParsedIndex {
                unique: true,
                method: Some("btree".to_string()),
                columns: vec!["email".to_string()],
            }
        );
    }

    #[test]
    fn test_parse_opclass_and_partial() {
        let parsed = parse_index_definition(
            "CREATE INDEX idx_items_name ON public.items USING gin (name gin_trgm_ops) WHERE (deleted_at IS NULL)",
        );
        assert!(!parsed.unique);
        assert_eq!(parsed.method.as_deref(), Some("gin"));
        assert_eq!(parsed.columns, vec!["name"]);
    }

    #[test]
    fn test_parse_composite_quoted_and_sorted() {
        let parsed = parse_index_definition(
            "CREATE INDEX idx_orders ON public.orders USING btree (\"Customer\", created_at DESC NULLS LAST) INCLUDE (total)",
        );
        assert_eq!(parsed.columns, vec!["Customer", "created_at"]);
    }

    #[test]
    fn test_parse_expression_index() {
        let parsed =
            parse_index_definition("CREATE UNIQUE INDEX idx_lower_email ON public.users USING btree (lower((email)::text))");
        assert!(parsed.unique);
        assert_eq!(parsed.columns, vec!["lower((email)::text)"]);
    }

    #[test]
    fn test_parse_without_method() {
        let parsed = parse_index_definition("CREATE INDEX plain ON t (a, b)");
        assert_eq!(parsed.method, None);
        assert_eq!(parsed.columns, vec!["a", "b"]);
    }

    #[test]
    fn test_catalog_codes() {
        assert_eq!(constraint_kind("p"), Some(ConstraintKind::PrimaryKey));
        assert_eq!(constraint_kind("f"), Some(ConstraintKind::ForeignKey));
        assert_eq!(constraint_kind("x"), None);
        assert_eq!(delete_action("c"), Some("CASCADE"));
        assert_eq!(delete_action("n"), Some("SET NULL"));
        assert_eq!(delete_action(" "), None);
    }
}
