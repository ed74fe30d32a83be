//! Migration SQL from a [`SchemaDiff`].

use ptah_schema::{Column, Dialect, EnumType, ForeignKey, Index, PlatformOverrides, SchemaModel, Table};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DialectGenerator, generator_for};
use crate::diff::SchemaDiff;
use crate::introspect::{ColumnInfo, IndexInfo, TableInfo};

/// Options for [`generate_migration`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Emit drops for tables, columns and enums that are no longer declared.
    pub allow_drop: bool,
}

/// Forward and reverse statements for one migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSql {
    pub up: Vec<String>,
    pub down: Vec<String>,
}

impl MigrationSql {
    /// Whether the migration does nothing.
    pub fn is_empty(&self) -> bool {
        self.up.is_empty()
    }

    /// Forward statements as a script.
    pub fn up_script(&self) -> String {
        script(&self.up)
    }

    /// Reverse statements as a script.
    pub fn down_script(&self) -> String {
        script(&self.down)
    }
}

fn script(statements: &[String]) -> String {
    statements.iter().map(|s| format!("{s};\n")).collect::<Vec<_>>().join("\n")
}

/// Turn a diff into ordered forward statements and best-effort reverse
/// statements.
///
/// Drops are emitted only with [`MigrationOptions::allow_drop`]. Ordering is
/// by statement kind; dependencies between ALTERs are not analysed.
pub fn generate_migration(
    diff: &SchemaDiff,
    model: &SchemaModel,
    dialect: Dialect,
    options: MigrationOptions,
) -> MigrationSql {
    let generator = generator_for(dialect);
    let resolution = model.resolve();
    let mut up = Vec::new();
    let mut down = Vec::new();

    // Forward.
    up.extend(diff.added_enums.iter().filter_map(|e| generator.create_enum(e)));
    for e in &diff.modified_enums {
        up.extend(e.added_values.iter().filter_map(|v| generator.add_enum_value(&e.name, v)));
    }

    let mut deferred = Vec::new();
    for table in &diff.added_tables {
        let inline = |fk: &ForeignKey| !resolution.is_deferred(&table.name, &fk.references.table);
        up.push(generator.create_table(table, &inline));
        up.extend(generator.comment_statements(table));
        for column in &table.columns {
            if let Some(fk) = column.foreign_key.as_ref().filter(|fk| !inline(*fk)) {
                deferred.push(generator.add_foreign_key(&table.name, &column.name, fk));
            }
        }
    }
    up.append(&mut deferred);

    for table in &diff.modified_tables {
        for column in &table.added_columns {
            up.push(generator.add_column(&table.name, column));
            if let Some(fk) = &column.foreign_key {
                up.push(generator.add_foreign_key(&table.name, &column.name, fk));
            }
        }
    }
    for table in &diff.modified_tables {
        for c in table.modified_columns.iter().filter(|c| c.type_changed) {
            up.push(generator.alter_column_type(&table.name, &c.declared));
        }
    }
    for table in &diff.modified_tables {
        for c in table.modified_columns.iter().filter(|c| c.nullability_changed()) {
            if c.type_changed && modify_sets_nullability(dialect) {
                continue;
            }
            up.push(generator.alter_nullability(&table.name, &c.declared));
        }
    }
    up.extend(diff.added_indexes.iter().map(|i| generator.create_index(i)));
    up.extend(
        diff.removed_indexes
            .iter()
            .map(|i| generator.drop_index(&i.name, &i.table)),
    );

    if options.allow_drop {
        for table in &diff.modified_tables {
            up.extend(
                table
                    .removed_columns
                    .iter()
                    .map(|c| generator.drop_column(&table.name, &c.name)),
            );
        }
        let drops: Vec<String> = diff
            .removed_tables
            .iter()
            .map(|t| generator.drop_table(&t.name))
            .collect();
        match generator.drop_guard() {
            Some((before, after)) if drops.len() > 1 => {
                up.push(before);
                up.extend(drops);
                up.push(after);
            }
            _ => up.extend(drops),
        }
        up.extend(diff.removed_enums.iter().filter_map(|e| generator.drop_enum(&e.name)));
    }

    // Reverse.
    if options.allow_drop {
        down.extend(
            diff.removed_enums
                .iter()
                .filter_map(|e| generator.create_enum(&EnumType::new(&e.name, e.values.iter().cloned()))),
        );
        down.extend(
            diff.removed_tables
                .iter()
                .filter(|t| !t.columns.is_empty())
                .map(|t| generator.create_table(&table_from_info(t, dialect), &|_| true)),
        );
        for table in &diff.modified_tables {
            for c in &table.removed_columns {
                down.push(generator.add_column(&table.name, &column_from_info(&table.name, c, dialect)));
            }
        }
    }
    down.extend(diff.removed_indexes.iter().map(|i| recreate_index(generator, i)));
    down.extend(
        diff.added_indexes
            .iter()
            .rev()
            .map(|i| generator.drop_index(&i.name, &i.table)),
    );
    for table in diff.modified_tables.iter().rev() {
        for c in table.modified_columns.iter().filter(|c| c.nullability_changed()) {
            if c.type_changed && modify_sets_nullability(dialect) {
                continue;
            }
            down.push(generator.alter_nullability(&table.name, &column_from_info(&table.name, &c.live, dialect)));
        }
    }
    for table in diff.modified_tables.iter().rev() {
        for c in table.modified_columns.iter().filter(|c| c.type_changed) {
            down.push(generator.alter_column_type(&table.name, &column_from_info(&table.name, &c.live, dialect)));
        }
    }
    for table in diff.modified_tables.iter().rev() {
        for column in table.added_columns.iter().rev() {
            down.push(generator.drop_column(&table.name, &column.name));
        }
    }
    down.extend(diff.added_tables.iter().rev().map(|t| generator.drop_table(&t.name)));
    down.extend(diff.added_enums.iter().rev().filter_map(|e| generator.drop_enum(&e.name)));

    debug!(up = up.len(), down = down.len(), %dialect, "generated migration");
    MigrationSql { up, down }
}

/// MySQL's `MODIFY COLUMN` restates nullability along with the type.
fn modify_sets_nullability(dialect: Dialect) -> bool {
    dialect == Dialect::MySql
}

fn recreate_index(generator: &dyn DialectGenerator, info: &IndexInfo) -> String {
    if let Some(definition) = &info.definition {
        return definition.clone();
    }
    let mut index = Index::new(&info.name, &info.table, info.columns.iter().cloned());
    index.unique = info.unique;
    index.method = info.method.clone();
    generator.create_index(&index)
}

/// Rebuild a live column as a model column, keeping its full type, default and
/// nullability.
fn column_from_info(table: &str, info: &ColumnInfo, dialect: Dialect) -> Column {
    let mut sql_type = info.full_type();
    if dialect == Dialect::MySql && info.auto_increment && !sql_type.to_ascii_lowercase().contains("auto_increment") {
        sql_type.push_str(" AUTO_INCREMENT");
    }
    Column {
        name: info.name.clone(),
        owner: table.to_string(),
        sql_type,
        nullable: info.nullable,
        primary: info.primary_key,
        unique: info.unique,
        indexed: false,
        default: info.default.clone(),
        default_fn: None,
        check: None,
        enum_name: None,
        enum_values: Vec::new(),
        foreign_key: None,
        comment: None,
        overrides: PlatformOverrides::new(),
    }
}

fn table_from_info(info: &TableInfo, dialect: Dialect) -> Table {
    let mut table = Table::new(&info.name, &info.name);
    table.comment = info.comment.clone();
    for column in &info.columns {
        table.add_column(column_from_info(&info.name, column, dialect));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_schema;
    use crate::introspect::DatabaseSchema;
    use ptah_schema::parse_source;
    use pretty_assertions::assert_eq;

    const SRC: &str = r#"
/// schema:table name="users"
struct User {
    /// schema:field name="id" type="SERIAL" primary
    id: i32,
    /// schema:field name="email" type="TEXT" not_null index
    email: String,
    /// schema:field name="role" type="ENUM" enum="admin,member" not_null
    role: String,
}

/// schema:table name="posts"
struct Post {
    /// schema:field name="id" type="SERIAL" primary
    id: i32,
    /// schema:field name="user_id" type="INTEGER" foreign="users(id)"
    user_id: i32,
}
"#;

    #[test]
    fn test_fresh_database() {
        let model = parse_source("m.rs", SRC).model;
        let diff = diff_schema(&model, &DatabaseSchema::default(), Dialect::Postgres);
        let sql = generate_migration(&diff, &model, Dialect::Postgres, MigrationOptions::default());

        assert_eq!(sql.up.len(), 4);
        assert!(sql.up[0].starts_with("CREATE TYPE \"enum_users_role\""));
        assert!(sql.up[1].starts_with("CREATE TABLE \"users\""));
        assert!(sql.up[2].starts_with("CREATE TABLE \"posts\""));
        assert_eq!(
            sql.up[3],
            "CREATE INDEX \"idx_users_email\" ON \"users\" (\"email\")"
        );
        assert_eq!(
            sql.down,
            vec![
                "DROP INDEX IF EXISTS \"idx_users_email\"",
                "DROP TABLE IF EXISTS \"posts\" CASCADE",
                "DROP TABLE IF EXISTS \"users\" CASCADE",
                "DROP TYPE IF EXISTS \"enum_users_role\" CASCADE",
            ]
        );
    }

    #[test]
    fn test_alterations_and_guarded_drops() {
        let model = parse_source("m.rs", SRC).model;
        let mut users = TableInfo::new("users");
        let mut id = ColumnInfo::new("id", "bigint").not_null();
        id.auto_increment = true;
        let mut email = ColumnInfo::new("email", "varchar");
        email.char_max_length = Some(255);
        email.default = Some("'n/a'".to_string());
        users.columns = vec![id, email, ColumnInfo::new("nickname", "text")];
        let live = DatabaseSchema {
            tables: vec![users, TableInfo::new("legacy")],
            ..Default::default()
        };

        let diff = diff_schema(&model, &live, Dialect::MySql);
        let kept = generate_migration(&diff, &model, Dialect::MySql, MigrationOptions::default());
        assert!(kept.up.iter().all(|s| !s.starts_with("DROP")));
        assert!(kept.up.iter().all(|s| !s.contains("DROP COLUMN")));

        let sql = generate_migration(&diff, &model, Dialect::MySql, MigrationOptions { allow_drop: true });
        let position = |prefix: &str| sql.up.iter().position(|s| s.starts_with(prefix)).unwrap();

        assert!(position("CREATE TABLE `posts`") < position("ALTER TABLE `users` ADD COLUMN `role`"));
        assert!(sql.up.contains(&"ALTER TABLE `users` MODIFY COLUMN `email` TEXT NOT NULL".to_string()));
        assert!(sql.up.contains(&"ALTER TABLE `users` DROP COLUMN `nickname`".to_string()));
        assert!(sql.up.contains(&"DROP TABLE IF EXISTS `legacy`".to_string()));
        assert!(position("ALTER TABLE `users` DROP COLUMN") < position("DROP TABLE"));

        assert!(sql.down.contains(&"ALTER TABLE `users` ADD COLUMN `nickname` text".to_string()));
        assert!(sql.up.contains(&"ALTER TABLE `users` MODIFY COLUMN `id` INT AUTO_INCREMENT NOT NULL".to_string()));
        assert!(sql.down.contains(&"ALTER TABLE `users` MODIFY COLUMN `email` varchar(255) DEFAULT 'n/a'".to_string()));
        assert!(sql.down.contains(&"ALTER TABLE `users` MODIFY COLUMN `id` bigint AUTO_INCREMENT NOT NULL".to_string()));
        assert!(sql.down.contains(&"ALTER TABLE `users` DROP COLUMN `role`".to_string()));
    }

    #[test]
    fn test_postgres_type_change_round_trip() {
        let model = parse_source("m.rs", SRC).model;
        let mut users = TableInfo::new("users");
        let mut email = ColumnInfo::new("email", "character varying").not_null();
        email.char_max_length = Some(120);
        let mut role = ColumnInfo::new("role", "USER-DEFINED").not_null();
        role.udt_name = "enum_users_role".to_string();
        users.columns = vec![ColumnInfo::new("id", "bigint").not_null(), email, role];
        let live = DatabaseSchema {
            tables: vec![users, TableInfo::new("posts")],
            ..Default::default()
        };

        let diff = diff_schema(&model, &live, Dialect::Postgres);
        let sql = generate_migration(&diff, &model, Dialect::Postgres, MigrationOptions::default());
        assert!(sql.up.contains(&"ALTER TABLE \"users\" ALTER COLUMN \"id\" TYPE integer USING \"id\"::integer".to_string()));
        assert!(sql.down.contains(&"ALTER TABLE \"users\" ALTER COLUMN \"id\" TYPE bigint USING \"id\"::bigint".to_string()));
        assert!(sql.down.contains(
            &"ALTER TABLE \"users\" ALTER COLUMN \"email\" TYPE character varying(120) USING \"email\"::character varying(120)"
                .to_string()
        ));
    }

    #[test]
    fn test_scripts() {
        let sql = MigrationSql {
            up: vec!["CREATE TABLE a (id INT)".to_string(), "SELECT 1".to_string()],
            down: vec![],
        };
        assert_eq!(sql.up_script(), "CREATE TABLE a (id INT);\n\nSELECT 1;\n");
        assert_eq!(sql.down_script(), "");
        assert!(!sql.is_empty());
        assert!(MigrationSql::default().is_empty());
    }
}
