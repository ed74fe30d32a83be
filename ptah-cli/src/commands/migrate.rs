//! Migration commands: `migrate`, `up`, `down` and `status`.

use std::path::Path;

use ptah_migrate::{
    MigrationFileManager, MigrationOptions, MigrationRegistry, MigrationRunner, RunReport, SchemaDiff,
    diff_schema, generate_migration,
};
use tracing::info;

use crate::cli::{DownArgs, MigrateArgs, StatusArgs, UpArgs};
use crate::commands::{Context, connect, load_model};
use crate::error::CliResult;
use crate::output;

/// Run `ptah migrate`
pub async fn migrate(ctx: &Context, args: MigrateArgs) -> CliResult<()> {
    let model = load_model(&args.dir)?;
    let dsn = ctx.config.resolve_dsn(args.dsn)?;
    let mut conn = connect(&dsn).await?;

    let live = conn.introspect(&ctx.introspection_config()).await?;
    let dialect = conn.dialect();
    let diff = diff_schema(&model, &live, dialect);
    let sql = generate_migration(
        &diff,
        &model,
        dialect,
        MigrationOptions {
            allow_drop: args.allow_drop,
        },
    );

    if !args.allow_drop && has_removals(&diff) {
        output::warn("objects no longer declared were left in place; pass --allow-drop to drop them");
    }
    if sql.is_empty() {
        output::info("No schema changes detected");
        return Ok(());
    }

    match args.output {
        Some(dir) => {
            let file = MigrationFileManager::new(dir).write_next(&args.description, &sql).await?;
            output::success(&format!("Wrote migration {} to {}", file.version, file.path.display()));
        }
        None => {
            print!("{}", sql.up_script());
            if !sql.down.is_empty() {
                println!("\n-- down\n");
                print!("{}", sql.down_script());
            }
        }
    }
    Ok(())
}

/// Whether the diff holds anything only `--allow-drop` would remove.
pub fn has_removals(diff: &SchemaDiff) -> bool {
    !diff.removed_tables.is_empty()
        || !diff.removed_enums.is_empty()
        || diff.modified_tables.iter().any(|t| !t.removed_columns.is_empty())
}

/// Read every migration file in a directory into a registry.
pub async fn load_registry(dir: &Path) -> CliResult<MigrationRegistry> {
    let migrations = MigrationFileManager::new(dir).load().await?;
    let mut registry = MigrationRegistry::new();
    registry.extend(migrations)?;
    info!(dir = %dir.display(), count = registry.len(), "loaded migrations");
    Ok(registry)
}

/// Run `ptah up`
pub async fn up(ctx: &Context, args: UpArgs) -> CliResult<()> {
    let dsn = ctx.config.resolve_dsn(args.dsn)?;
    let registry = load_registry(&ctx.config.migrations_dir(args.migrations)).await?;
    if registry.is_empty() {
        output::info("No migrations found");
        return Ok(());
    }

    let mut conn = connect(&dsn).await?;
    let mut runner = MigrationRunner::new(conn.as_mut(), &registry)
        .tracking_table(ctx.config.tracking_table()?)
        .dry_run(args.dry_run);

    let status = runner.status().await?;
    for (version, description) in &status.skipped {
        output::warn(&format!(
            "migration {version} ({description}) is below the current version and will not run"
        ));
    }

    let report = runner.up().await?;
    report_run(&report, "Applied");
    Ok(())
}

/// Run `ptah down`
pub async fn down(ctx: &Context, args: DownArgs) -> CliResult<()> {
    let registry = load_registry(&ctx.config.migrations_dir(args.migrations)).await?;
    let mut conn = connect(&args.dsn).await?;
    let report = MigrationRunner::new(conn.as_mut(), &registry)
        .tracking_table(ctx.config.tracking_table()?)
        .dry_run(args.dry_run)
        .down(args.target)
        .await?;
    report_run(&report, "Reverted");
    Ok(())
}

/// Run `ptah status`
pub async fn status(ctx: &Context, args: StatusArgs) -> CliResult<()> {
    let dsn = ctx.config.resolve_dsn(args.dsn)?;
    let registry = load_registry(&ctx.config.migrations_dir(args.migrations)).await?;
    let mut conn = connect(&dsn).await?;
    let status = MigrationRunner::new(conn.as_mut(), &registry)
        .tracking_table(ctx.config.tracking_table()?)
        .status()
        .await?;
    print!("{status}");
    Ok(())
}

fn report_run(report: &RunReport, verb: &str) {
    if report.dry_run {
        for (version, statements) in &report.preview {
            println!("-- {version}");
            output::script(statements);
        }
        output::info(&format!("Dry run: {} migration(s) would run", report.preview.len()));
    } else if report.is_empty() {
        output::success("Already up to date");
    } else {
        output::success(&format!("{verb} {} migration(s)", report.versions.len()));
        for version in &report.versions {
            output::list_item(&version.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use ptah_migrate::{ColumnInfo, DatabaseSchema, TableInfo};
    use ptah_schema::{Dialect, parse_source};

    use super::*;

    const SOURCE: &str = r#"
/// schema:table name="accounts"
pub struct Account {
    /// schema:field name="id" type="SERIAL" primary
    pub id: i32,
}
"#;

    fn live_with_extra_column() -> DatabaseSchema {
        let mut accounts = TableInfo::new("accounts");
        accounts.columns = vec![
            ColumnInfo::new("id", "integer").not_null(),
            ColumnInfo::new("legacy_code", "text"),
        ];
        DatabaseSchema {
            tables: vec![accounts],
            ..Default::default()
        }
    }

    #[test]
    fn test_has_removals_sees_dropped_columns() {
        let model = parse_source("accounts.rs", SOURCE).model;
        let diff = diff_schema(&model, &live_with_extra_column(), Dialect::Postgres);
        assert!(has_removals(&diff));
        assert!(!has_removals(&SchemaDiff::default()));
    }

    #[tokio::test]
    async fn test_load_registry_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("0001_create_accounts.up.sql"), "CREATE TABLE accounts (id INT);").unwrap();
        std::fs::write(dir.path().join("0001_create_accounts.down.sql"), "DROP TABLE accounts;").unwrap();
        std::fs::write(dir.path().join("0002_add_name.up.sql"), "ALTER TABLE accounts ADD name TEXT;").unwrap();

        let registry = load_registry(dir.path()).await.unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get(2).unwrap().description(), "add_name");
    }
}
