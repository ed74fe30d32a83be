//! Migration file management.
//!
//! A migration is a pair of files in one directory:
//! `<version>_<description>.up.sql` and an optional
//! `<version>_<description>.down.sql`.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::runner::Migration;
use crate::sql::MigrationSql;

const UP_SUFFIX: &str = ".up.sql";
const DOWN_SUFFIX: &str = ".down.sql";

/// A migration read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// Path to the `.up.sql` file.
    pub path: PathBuf,
    pub version: i64,
    pub description: String,
    pub up_sql: String,
    /// Empty when there is no `.down.sql` file.
    pub down_sql: String,
}

impl MigrationFile {
    /// Turn the file pair into a runnable migration.
    pub fn into_migration(self) -> Migration {
        Migration::sql(self.version, self.description, self.up_sql, self.down_sql)
    }
}

/// Migration file reader/writer.
#[derive(Debug, Clone)]
pub struct MigrationFileManager {
    /// Directory where migrations are stored.
    migrations_dir: PathBuf,
}

impl MigrationFileManager {
    /// Create a new file manager.
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }

    /// Get the migrations directory.
    pub fn migrations_dir(&self) -> &Path {
        &self.migrations_dir
    }

    /// Ensure the migrations directory exists.
    pub async fn ensure_dir(&self) -> MigrateResult<()> {
        tokio::fs::create_dir_all(&self.migrations_dir).await?;
        Ok(())
    }

    /// List all migrations, ascending by version.
    ///
    /// A missing directory holds no migrations. A malformed `.up.sql` name or
    /// a repeated version is an error.
    pub async fn list_migrations(&self) -> MigrateResult<Vec<MigrationFile>> {
        let mut migrations: Vec<MigrationFile> = Vec::new();
        if !tokio::fs::try_exists(&self.migrations_dir).await? {
            return Ok(migrations);
        }

        let mut entries = tokio::fs::read_dir(&self.migrations_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(stem) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(UP_SUFFIX))
            else {
                continue;
            };
            let (version, description) = parse_migration_name(stem)?;
            if migrations.iter().any(|m| m.version == version) {
                return Err(MigrationError::DuplicateVersion(version));
            }

            let up_sql = tokio::fs::read_to_string(&path).await?;
            let down_path = self.migrations_dir.join(format!("{stem}{DOWN_SUFFIX}"));
            let down_sql = if tokio::fs::try_exists(&down_path).await? {
                tokio::fs::read_to_string(&down_path).await?
            } else {
                String::new()
            };

            debug!(version, path = %path.display(), "found migration file");
            migrations.push(MigrationFile {
                path,
                version,
                description,
                up_sql,
                down_sql,
            });
        }

        migrations.sort_by_key(|m| m.version);
        Ok(migrations)
    }

    /// Load every migration file as a runnable migration.
    pub async fn load(&self) -> MigrateResult<Vec<Migration>> {
        Ok(self
            .list_migrations()
            .await?
            .into_iter()
            .map(MigrationFile::into_migration)
            .collect())
    }

    /// The version the next written migration gets.
    pub async fn next_version(&self) -> MigrateResult<i64> {
        let latest = self.list_migrations().await?.last().map_or(0, |m| m.version);
        Ok(latest + 1)
    }

    /// Write `sql` as the next migration pair and return what was written.
    pub async fn write_next(&self, description: &str, sql: &MigrationSql) -> MigrateResult<MigrationFile> {
        self.ensure_dir().await?;

        let version = self.next_version().await?;
        let description = slug(description);
        let stem = format!("{version:04}_{description}");
        let up_path = self.migrations_dir.join(format!("{stem}{UP_SUFFIX}"));
        let down_path = self.migrations_dir.join(format!("{stem}{DOWN_SUFFIX}"));

        let up_sql = sql.up_script();
        let down_sql = sql.down_script();
        tokio::fs::write(&up_path, &up_sql).await?;
        tokio::fs::write(&down_path, &down_sql).await?;

        debug!(version, path = %up_path.display(), "wrote migration");
        Ok(MigrationFile {
            path: up_path,
            version,
            description,
            up_sql,
            down_sql,
        })
    }
}

/// Parse `<version>_<description>` into its parts.
fn parse_migration_name(name: &str) -> MigrateResult<(i64, String)> {
    let (version, description) = name.split_once('_').ok_or_else(|| {
        MigrationError::migration_file(format!("Invalid migration name format: {name}"))
    })?;
    let version = version
        .parse::<i64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| MigrationError::migration_file(format!("Invalid migration version in: {name}")))?;
    Ok((version, description.to_string()))
}

/// Lowercase, with runs of anything but letters and digits turned into `_`.
fn slug(description: &str) -> String {
    let mut out = String::new();
    for c in description.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    let out = out.trim_end_matches('_').to_string();
    if out.is_empty() { "migration".to_string() } else { out }
}
