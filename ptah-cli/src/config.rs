//! CLI configuration handling.

use indexmap::IndexMap;
use ptah_migrate::{DEFAULT_TABLE, TrackingTable};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "ptah.toml";

/// Default migrations directory (relative to project root)
pub const MIGRATIONS_DIR: &str = "migrations";

/// ptah CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Migration configuration
    pub migrations: MigrationConfig,

    /// Bootstrap template variables
    pub bootstrap: IndexMap<String, String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the given file, or `ptah.toml` in the working directory when it
    /// exists, or defaults.
    pub fn discover(explicit: Option<&Path>) -> CliResult<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = PathBuf::from(CONFIG_FILE_NAME);
                if path.is_file() { Self::load(&path) } else { Ok(Self::default()) }
            }
        }
    }

    /// The DSN from the command line (or `DATABASE_URL`), else the config
    /// file.
    pub fn resolve_dsn(&self, arg: Option<String>) -> CliResult<String> {
        arg.filter(|s| !s.trim().is_empty())
            .or_else(|| self.database.url.clone())
            .ok_or(CliError::MissingDsn)
    }

    /// Migrations directory from the command line, else the config file.
    pub fn migrations_dir(&self, arg: Option<PathBuf>) -> PathBuf {
        arg.unwrap_or_else(|| PathBuf::from(&self.migrations.directory))
    }

    /// The configured tracking table.
    pub fn tracking_table(&self) -> CliResult<TrackingTable> {
        TrackingTable::new(&self.migrations.table_name).map_err(|e| CliError::Config(e.to_string()))
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL
    pub url: Option<String>,
}

/// Migration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Directory for migration files
    pub directory: String,

    /// Migration table name
    pub table_name: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            directory: MIGRATIONS_DIR.to_string(),
            table_name: DEFAULT_TABLE.to_string(),
        }
    }
}
