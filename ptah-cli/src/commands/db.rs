//! Commands that work against a live database: `write-db`, `read-db`,
//! `compare`, `drop-schema` and `drop-all`.

use ptah_migrate::{DatabaseSchema, GeneratedSchema, diff_schema, drop_all_sql, drop_schema_sql, generate_schema};

use crate::cli::{CompareArgs, DropAllArgs, DropSchemaArgs, ReadDbArgs, WriteDbArgs};
use crate::commands::{Context, connect, dialect_for, execute_all, load_model};
use crate::error::CliResult;
use crate::output;

/// Statements that create the parts of a generated schema missing from a
/// live database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WritePlan {
    pub statements: Vec<String>,
    pub created_tables: Vec<String>,
    pub skipped_tables: Vec<String>,
    pub created_enums: Vec<String>,
    pub skipped_enums: Vec<String>,
}

impl WritePlan {
    /// Plan creation of every enum and table not already present. Deferred
    /// foreign keys are only added to tables created here.
    pub fn new(generated: &GeneratedSchema, live: &DatabaseSchema) -> Self {
        let mut plan = Self::default();

        for e in &generated.enums {
            if live.enum_type(&e.name).is_some() {
                plan.skipped_enums.push(e.name.clone());
            } else {
                plan.statements.push(e.sql.clone());
                plan.created_enums.push(e.name.clone());
            }
        }

        for table in &generated.tables {
            if live.table(&table.name).is_some() {
                plan.skipped_tables.push(table.name.clone());
            } else {
                plan.statements.extend(table.statements().map(str::to_string));
                plan.created_tables.push(table.name.clone());
            }
        }

        plan.statements.extend(
            generated
                .deferred
                .iter()
                .filter(|d| plan.created_tables.contains(&d.name))
                .map(|d| d.sql.clone()),
        );
        plan
    }
}

/// Run `ptah write-db`
pub async fn write_db(ctx: &Context, args: WriteDbArgs) -> CliResult<()> {
    let model = load_model(&args.dir)?;
    let dsn = ctx.config.resolve_dsn(args.dsn)?;
    let mut conn = connect(&dsn).await?;

    let live = conn.introspect(&ctx.introspection_config()).await?;
    let plan = WritePlan::new(&generate_schema(&model, conn.dialect()), &live);

    for name in plan.skipped_enums.iter().chain(&plan.skipped_tables) {
        output::info(&format!("{name} already exists, skipped"));
    }
    if plan.statements.is_empty() {
        output::success("Nothing to create");
        return Ok(());
    }

    execute_all(conn.as_mut(), &plan.statements).await?;
    output::success(&format!(
        "Created {} table(s) and {} enum(s) in {}",
        plan.created_tables.len(),
        plan.created_enums.len(),
        conn.database_name()
    ));
    Ok(())
}

/// Run `ptah read-db`
pub async fn read_db(ctx: &Context, args: ReadDbArgs) -> CliResult<()> {
    let dsn = ctx.config.resolve_dsn(args.dsn)?;
    let mut conn = connect(&dsn).await?;

    let mut config = ctx.introspection_config().include_views(args.include_views);
    if let Some(schema) = args.schema {
        config = config.database_schema(schema);
    }
    let schema = conn.introspect(&config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
    } else if schema.is_empty() {
        output::info(&format!("{} has no tables", conn.database_name()));
    } else {
        print!("{schema}");
    }
    Ok(())
}

/// Run `ptah compare`
pub async fn compare(ctx: &Context, args: CompareArgs) -> CliResult<()> {
    let model = load_model(&args.dir)?;
    let dsn = ctx.config.resolve_dsn(args.dsn)?;
    let mut conn = connect(&dsn).await?;

    let live = conn.introspect(&ctx.introspection_config()).await?;
    let diff = diff_schema(&model, &live, conn.dialect());
    if diff.has_changes() {
        print!("{diff}");
        output::info(&diff.summary());
    } else {
        output::success("No changes");
    }
    Ok(())
}

/// Run `ptah drop-schema`
pub async fn drop_schema(ctx: &Context, args: DropSchemaArgs) -> CliResult<()> {
    let model = load_model(&args.dir)?;
    let dsn = ctx.config.resolve_dsn(args.dsn)?;
    let statements = drop_schema_sql(&model, dialect_for(&dsn)?);

    output::header("Drop schema");
    output::kv("Tables", &model.tables.len().to_string());
    output::kv("Enums", &model.enums.len().to_string());
    if !output::confirm_typed("Drop every declared table and enum?", "yes")?
        || !output::confirm_typed("This cannot be undone.", "DROP SCHEMA")?
    {
        println!("cancelled");
        return Ok(());
    }

    let mut conn = connect(&dsn).await?;
    execute_all(conn.as_mut(), &statements).await?;
    output::success(&format!("Dropped {} table(s)", model.tables.len()));
    Ok(())
}

/// Run `ptah drop-all`
pub async fn drop_all(ctx: &Context, args: DropAllArgs) -> CliResult<()> {
    let dsn = ctx.config.resolve_dsn(args.dsn)?;
    dialect_for(&dsn)?;
    let mut conn = connect(&dsn).await?;

    let config = ctx.introspection_config().exclude_tables(Vec::new());
    let live = conn.introspect(&config).await?;
    if live.is_empty() {
        output::info(&format!("{} is already empty", conn.database_name()));
        return Ok(());
    }

    output::header("Drop everything");
    output::kv("Database", conn.database_name());
    output::kv("Tables", &live.tables.len().to_string());
    output::kv("Enums", &live.enums.len().to_string());
    let database = conn.database_name().to_string();
    if !output::confirm_typed("Drop every table and enum in the database?", "DELETE EVERYTHING")?
        || !output::confirm_typed("Confirm the database name.", &database)?
    {
        println!("cancelled");
        return Ok(());
    }

    let statements = drop_all_sql(&live, conn.dialect());
    execute_all(conn.as_mut(), &statements).await?;
    output::success(&format!("Dropped {} table(s) from {database}", live.tables.len()));
    Ok(())
}
