//! `ptah generate` - render DDL from annotated sources.

use std::path::Path;

use ptah_migrate::generate_schema;
use ptah_schema::{Dialect, SchemaModel};

use crate::cli::GenerateArgs;
use crate::commands::load_model;
use crate::error::CliResult;
use crate::output;

/// Run the generate command
pub async fn run(args: GenerateArgs) -> CliResult<()> {
    let model = load_model(&args.dir)?;
    let dialects = match args.dialect.as_deref() {
        Some(name) => vec![Dialect::from_name(name)],
        None => Dialect::ALL.to_vec(),
    };

    match args.output {
        Some(dir) => write_scripts(&model, &dialects, &dir),
        None => {
            let scripts: Vec<String> = dialects.iter().map(|d| render(&model, *d)).collect();
            print!("{}", scripts.join("\n"));
            Ok(())
        }
    }
}

/// The full script for one dialect.
pub fn render(model: &SchemaModel, dialect: Dialect) -> String {
    generate_schema(model, dialect).to_sql()
}

fn write_scripts(model: &SchemaModel, dialects: &[Dialect], dir: &Path) -> CliResult<()> {
    std::fs::create_dir_all(dir)?;
    for dialect in dialects {
        let path = dir.join(format!("schema.{dialect}.sql"));
        std::fs::write(&path, render(model, *dialect))?;
        output::success(&format!("wrote {}", path.display()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ptah_schema::parse_source;

    use super::*;

    const SOURCE: &str = r#"
/// schema:table name="warehouses"
pub struct Warehouse {
    /// schema:field name="id" type="SERIAL" primary
    pub id: i32,
    /// schema:field name="kind" type="ENUM" enum="central,satellite" not_null
    pub kind: String,
}
"#;

    #[test]
    fn test_render_is_deterministic() {
        let model = parse_source("warehouses.rs", SOURCE).model;
        assert_eq!(render(&model, Dialect::Postgres), render(&model, Dialect::Postgres));
    }

    #[test]
    fn test_write_scripts() {
        let model = parse_source("warehouses.rs", SOURCE).model;
        let dir = tempfile::tempdir().unwrap();
        write_scripts(&model, &Dialect::ALL, dir.path()).unwrap();

        let mysql = std::fs::read_to_string(dir.path().join("schema.mysql.sql")).unwrap();
        assert!(mysql.contains("ENUM('central', 'satellite')"));
        let postgres = std::fs::read_to_string(dir.path().join("schema.postgres.sql")).unwrap();
        assert!(postgres.contains("CREATE TYPE"));
        assert!(dir.path().join("schema.generic.sql").exists());
    }
}
