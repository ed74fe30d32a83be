//! `ptah bootstrap` - apply the embedded role, extension and grant scripts.

use indexmap::IndexMap;
use ptah_migrate::{BootstrapVars, Bootstrapper};

use crate::cli::BootstrapArgs;
use crate::commands::{Context, connect};
use crate::error::CliResult;
use crate::output;

/// Run the bootstrap command
pub async fn run(ctx: &Context, args: BootstrapArgs) -> CliResult<()> {
    let bootstrapper = Bootstrapper::new(vars(&ctx.config.bootstrap, &args.vars)?);

    if args.dry_run {
        for file in bootstrapper.preview()? {
            println!("-- {}", file.name);
            println!("{}", file.sql.trim_end());
            println!();
        }
        return Ok(());
    }

    let dsn = ctx.config.resolve_dsn(args.dsn)?;
    let mut conn = connect(&dsn).await?;
    let applied = bootstrapper.apply(conn.as_mut()).await?;

    output::success(&format!("Bootstrapped {}", conn.database_name()));
    for name in applied {
        output::list_item(name);
    }
    Ok(())
}

/// Defaults, then `[bootstrap]` from the config file, then `--var` flags.
pub fn vars(configured: &IndexMap<String, String>, assignments: &[String]) -> CliResult<BootstrapVars> {
    let mut vars = BootstrapVars::default();
    for (name, value) in configured {
        vars.set(name.clone(), value.clone())?;
    }
    for assignment in assignments {
        vars.set_assignment(assignment)?;
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut configured = IndexMap::new();
        configured.insert("operational_user".to_string(), "from_config".to_string());
        configured.insert("background_worker_user".to_string(), "jobs".to_string());

        let vars = vars(&configured, &["operational_user=from_flag".to_string()]).unwrap();
        assert_eq!(vars.get("operational_user"), Some("from_flag"));
        assert_eq!(vars.get("background_worker_user"), Some("jobs"));
    }

    #[test]
    fn test_invalid_assignment() {
        assert!(vars(&IndexMap::new(), &["operational_user".to_string()]).is_err());
        assert!(vars(&IndexMap::new(), &["operational_user=bad name".to_string()]).is_err());
    }
}
