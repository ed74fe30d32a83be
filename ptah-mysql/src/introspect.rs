//! Catalog introspection for MySQL and MariaDB.

use indexmap::IndexMap;
use mysql_async::from_row_opt;
use ptah_migrate::{
    ColumnInfo, ConstraintInfo, ConstraintKind, EnumInfo, IndexInfo, IntrospectionConfig, Introspector,
    MigrateResult, TableInfo,
};

use crate::connection::MysqlConnection;
use crate::error::MysqlError;

const TABLES_SQL: &str = "\
SELECT TABLE_NAME, TABLE_TYPE, NULLIF(TABLE_COMMENT, '')
FROM information_schema.tables
WHERE TABLE_SCHEMA = ?
ORDER BY TABLE_NAME";

const COLUMNS_SQL: &str = "\
SELECT COLUMN_NAME, DATA_TYPE, COLUMN_TYPE, IS_NULLABLE = 'YES', COLUMN_DEFAULT,
       CHARACTER_MAXIMUM_LENGTH, NUMERIC_PRECISION, NUMERIC_SCALE, ORDINAL_POSITION, EXTRA
FROM information_schema.columns
WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
ORDER BY ORDINAL_POSITION";

const STATISTICS_SQL: &str = "\
SELECT TABLE_NAME, INDEX_NAME, COLUMN_NAME, NON_UNIQUE, INDEX_TYPE
FROM information_schema.statistics
WHERE TABLE_SCHEMA = ?
ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX";

const CONSTRAINTS_SQL: &str = "\
SELECT tc.CONSTRAINT_NAME, tc.TABLE_NAME, tc.CONSTRAINT_TYPE, kcu.COLUMN_NAME,
       kcu.REFERENCED_TABLE_NAME, kcu.REFERENCED_COLUMN_NAME, rc.DELETE_RULE
FROM information_schema.table_constraints tc
LEFT JOIN information_schema.key_column_usage kcu
       ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
      AND kcu.TABLE_NAME = tc.TABLE_NAME
      AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
LEFT JOIN information_schema.referential_constraints rc
       ON rc.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA
      AND rc.TABLE_NAME = tc.TABLE_NAME
      AND rc.CONSTRAINT_NAME = tc.CONSTRAINT_NAME
WHERE tc.TABLE_SCHEMA = ?
ORDER BY tc.TABLE_NAME, tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION";

type ColumnRow = (
    String,
    String,
    String,
    bool,
    Option<String>,
    Option<i64>,
    Option<i64>,
    Option<i64>,
    i64,
    String,
);

/// One `information_schema.statistics` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsRow {
    pub table: String,
    pub index: String,
    /// `None` for functional key parts.
    pub column: Option<String>,
    pub non_unique: bool,
    pub index_type: String,
}

/// One `table_constraints` row joined with its key columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRow {
    pub name: String,
    pub table: String,
    pub constraint_type: String,
    pub column: Option<String>,
    pub referenced_table: Option<String>,
    pub referenced_column: Option<String>,
    pub delete_rule: Option<String>,
}

#[async_trait::async_trait]
impl Introspector for MysqlConnection {
    async fn get_tables(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<TableInfo>> {
        let database = self.target_database(config.database_schema.as_ref());
        let rows = self.query_params(TABLES_SQL, (database,)).await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            let (name, table_type, comment) =
                from_row_opt::<(String, String, Option<String>)>(row).map_err(MysqlError::from)?;
            tables.push(TableInfo {
                name,
                table_type,
                comment,
                columns: Vec::new(),
            });
        }
        Ok(tables)
    }

    async fn get_columns(&mut self, config: &IntrospectionConfig, table: &str) -> MigrateResult<Vec<ColumnInfo>> {
        let database = self.target_database(config.database_schema.as_ref());
        let rows = self.query_params(COLUMNS_SQL, (database, table)).await?;
        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let (
                name,
                data_type,
                column_type,
                nullable,
                default,
                char_max_length,
                numeric_precision,
                numeric_scale,
                ordinal_position,
                extra,
            ) = from_row_opt::<ColumnRow>(row).map_err(MysqlError::from)?;
            columns.push(ColumnInfo {
                name,
                udt_name: data_type.clone(),
                data_type,
                column_type: Some(column_type),
                nullable,
                default,
                char_max_length,
                numeric_precision,
                numeric_scale,
                ordinal_position,
                auto_increment: extra.to_ascii_lowercase().contains("auto_increment"),
                primary_key: false,
                unique: false,
            });
        }
        Ok(columns)
    }

    async fn get_enums(&mut self, _config: &IntrospectionConfig) -> MigrateResult<Vec<EnumInfo>> {
        // Enums are column types here; COLUMN_TYPE carries the value list.
        Ok(Vec::new())
    }

    async fn get_indexes(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<IndexInfo>> {
        let database = self.target_database(config.database_schema.as_ref());
        let rows = self.query_params(STATISTICS_SQL, (database,)).await?;
        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            let (table, index, column, non_unique, index_type) =
                from_row_opt::<(String, String, Option<String>, i64, String)>(row).map_err(MysqlError::from)?;
            stats.push(StatisticsRow {
                table,
                index,
                column,
                non_unique: non_unique != 0,
                index_type,
            });
        }
        Ok(group_statistics(stats))
    }

    async fn get_constraints(&mut self, config: &IntrospectionConfig) -> MigrateResult<Vec<ConstraintInfo>> {
        let database = self.target_database(config.database_schema.as_ref());
        let rows = self.query_params(CONSTRAINTS_SQL, (database,)).await?;
        let mut constraint_rows = Vec::with_capacity(rows.len());
        for row in rows {
            let (name, table, constraint_type, column, referenced_table, referenced_column, delete_rule) =
                from_row_opt::<(
                    String,
                    String,
                    String,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                    Option<String>,
                )>(row)
                .map_err(MysqlError::from)?;
            constraint_rows.push(ConstraintRow {
                name,
                table,
                constraint_type,
                column,
                referenced_table,
                referenced_column,
                delete_rule,
            });
        }
        Ok(group_constraints(constraint_rows))
    }
}

/// Fold per-column statistics rows into one index each, keeping key order.
pub fn group_statistics(rows: Vec<StatisticsRow>) -> Vec<IndexInfo> {
    let mut indexes: IndexMap<(String, String), IndexInfo> = IndexMap::new();
    for row in rows {
        let index = indexes
            .entry((row.table.clone(), row.index.clone()))
            .or_insert_with(|| IndexInfo {
                primary: row.index == "PRIMARY",
                name: row.index.clone(),
                table: row.table.clone(),
                columns: Vec::new(),
                unique: !row.non_unique,
                method: Some(row.index_type.clone()),
                definition: None,
            });
        if let Some(column) = row.column {
            index.columns.push(column);
        }
    }
    indexes.into_values().collect()
}

/// Fold constraint rows (one per key column) into constraints.
pub fn group_constraints(rows: Vec<ConstraintRow>) -> Vec<ConstraintInfo> {
    let mut constraints: IndexMap<(String, String), ConstraintInfo> = IndexMap::new();
    for row in rows {
        let Some(kind) = ConstraintKind::from_catalog(&row.constraint_type) else {
            continue;
        };
        let constraint = constraints
            .entry((row.table.clone(), row.name.clone()))
            .or_insert_with(|| ConstraintInfo {
                name: row.name.clone(),
                table: row.table.clone(),
                kind,
                columns: Vec::new(),
                referenced_table: row.referenced_table.clone(),
                referenced_columns: Vec::new(),
                on_delete: row.delete_rule.clone(),
            });
        if let Some(column) = row.column {
            constraint.columns.push(column);
        }
        if let Some(column) = row.referenced_column {
            constraint.referenced_columns.push(column);
        }
    }
    constraints.into_values().collect()
}
