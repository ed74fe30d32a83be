//! Bootstrap migrator.
//!
//! A fixed set of Postgres setup scripts (roles, extensions, grants) is
//! embedded in the binary. Each script is rendered by substituting
//! `{{ name }}` placeholders, then applied in filename order inside its own
//! transaction. The scripts only use existence-checked statements, so
//! running them again is harmless.

use std::sync::LazyLock;

use indexmap::IndexMap;
use ptah_schema::Dialect;
use regex_lite::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::connection::DatabaseConnection;
use crate::error::{MigrateResult, MigrationError};
use crate::history::is_identifier;
use crate::splitter::split_statements;

/// Embedded scripts, in application order.
pub const FILES: [(&str, &str); 3] = [
    ("001_roles.sql", include_str!("../bootstrap/001_roles.sql")),
    ("002_extensions.sql", include_str!("../bootstrap/002_extensions.sql")),
    ("003_grants.sql", include_str!("../bootstrap/003_grants.sql")),
];

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("valid regex"));

/// Template variables. Values must be plain SQL identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapVars {
    values: IndexMap<String, String>,
}

impl Default for BootstrapVars {
    fn default() -> Self {
        let mut values = IndexMap::new();
        values.insert("operational_user".to_string(), "ptah_app".to_string());
        values.insert("background_worker_user".to_string(), "ptah_worker".to_string());
        Self { values }
    }
}

impl BootstrapVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> MigrateResult<()> {
        let (name, value) = (name.into(), value.into());
        if !is_identifier(&value) {
            return Err(MigrationError::template(format!(
                "value for '{name}' must be an identifier, got '{value}'"
            )));
        }
        if !self.values.contains_key(&name) {
            warn!(variable = %name, "bootstrap variable is not used by the built-in scripts");
        }
        self.values.insert(name, value);
        Ok(())
    }

    /// Set a variable from `name=value`.
    pub fn set_assignment(&mut self, assignment: &str) -> MigrateResult<()> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| MigrationError::template(format!("expected name=value, got '{assignment}'")))?;
        self.set(name.trim(), value.trim())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Substitute every `{{ name }}` in `template`. Unknown names are an error.
pub fn render(template: &str, vars: &BootstrapVars) -> MigrateResult<String> {
    let mut unknown: Vec<String> = Vec::new();
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        match vars.get(name) {
            Some(value) => value.to_string(),
            None => {
                if !unknown.iter().any(|u| u == name) {
                    unknown.push(name.to_string());
                }
                String::new()
            }
        }
    });
    if !unknown.is_empty() {
        return Err(MigrationError::template(format!(
            "unknown placeholder(s): {}",
            unknown.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

/// A rendered script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub name: &'static str,
    pub sql: String,
    pub statements: Vec<String>,
}

/// Renders and applies the embedded scripts.
#[derive(Debug, Clone, Default)]
pub struct Bootstrapper {
    vars: BootstrapVars,
}

impl Bootstrapper {
    pub fn new(vars: BootstrapVars) -> Self {
        Self { vars }
    }

    /// Render every script without touching a database.
    pub fn preview(&self) -> MigrateResult<Vec<RenderedFile>> {
        let mut files: Vec<(&'static str, &'static str)> = FILES.to_vec();
        files.sort_by_key(|(name, _)| *name);
        files
            .into_iter()
            .map(|(name, template)| {
                let sql = render(template, &self.vars)?;
                let statements = split_statements(&sql, Dialect::Postgres);
                Ok(RenderedFile { name, sql, statements })
            })
            .collect()
    }

    /// Apply every script, one transaction per file. Returns the applied file
    /// names.
    pub async fn apply<C: DatabaseConnection + ?Sized>(&self, conn: &mut C) -> MigrateResult<Vec<&'static str>> {
        if conn.dialect() != Dialect::Postgres {
            return Err(MigrationError::UnsupportedDialect(format!(
                "bootstrap scripts target postgres, connected to {}",
                conn.dialect()
            )));
        }

        let files = self.preview()?;
        let mut applied = Vec::with_capacity(files.len());
        for file in files {
            info!(file = file.name, statements = file.statements.len(), "applying bootstrap script");
            conn.begin().await?;
            for sql in &file.statements {
                debug!(file = file.name, %sql, "executing");
                if let Err(e) = conn.execute(sql).await {
                    return Err(abort(conn, file.name, "failed", e).await);
                }
            }
            if let Err(e) = conn.commit().await {
                return Err(abort(conn, file.name, "failed to commit", e).await);
            }
            applied.push(file.name);
        }
        Ok(applied)
    }
}

/// Roll back the open transaction and name the script in the error.
async fn abort<C: DatabaseConnection + ?Sized>(
    conn: &mut C,
    file: &str,
    what: &str,
    error: MigrationError,
) -> MigrationError {
    if let Err(rollback) = conn.rollback().await {
        warn!(file, error = %rollback, "rollback failed");
    }
    MigrationError::other(format!("bootstrap script {file} {what} and was rolled back: {error}"))
}
