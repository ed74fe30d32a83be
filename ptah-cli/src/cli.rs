//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// ptah - schema modeling, DDL generation and migrations
#[derive(Parser, Debug)]
#[command(name = "ptah")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "ptah - schema modeling, DDL generation and migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to the configuration file (defaults to ./ptah.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate DDL for one dialect, or for all of them
    Generate(GenerateArgs),

    /// Create the declared schema in a database, skipping existing objects
    WriteDb(WriteDbArgs),

    /// Print the schema of a live database
    ReadDb(ReadDbArgs),

    /// Show the differences between declarations and a live database
    Compare(CompareArgs),

    /// Produce migration SQL from the differences
    Migrate(MigrateArgs),

    /// Drop the declared tables and enums
    DropSchema(DropSchemaArgs),

    /// Drop every table and enum in the database
    DropAll(DropAllArgs),

    /// Apply pending versioned migrations
    Up(UpArgs),

    /// Revert versioned migrations down to a target version
    Down(DownArgs),

    /// Show versioned migration status
    Status(StatusArgs),

    /// Apply the built-in role, extension and grant scripts
    Bootstrap(BootstrapArgs),
}

// =============================================================================
// Schema Commands
// =============================================================================

/// Arguments for the `generate` command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Directory of annotated Rust sources
    pub dir: PathBuf,

    /// Dialect to generate (postgres, mysql, generic); all when omitted
    pub dialect: Option<String>,

    /// Write `schema.<dialect>.sql` files here instead of printing
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `write-db` command
#[derive(Args, Debug)]
pub struct WriteDbArgs {
    /// Directory of annotated Rust sources
    pub dir: PathBuf,

    /// Database URL
    #[arg(env = "DATABASE_URL")]
    pub dsn: Option<String>,
}

/// Arguments for the `read-db` command
#[derive(Args, Debug)]
pub struct ReadDbArgs {
    /// Database URL
    #[arg(env = "DATABASE_URL")]
    pub dsn: Option<String>,

    /// Print JSON instead of a report
    #[arg(long)]
    pub json: bool,

    /// Schema (Postgres) or database (MySQL) to read
    #[arg(long)]
    pub schema: Option<String>,

    /// Include views
    #[arg(long)]
    pub include_views: bool,
}

/// Arguments for the `compare` command
#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Directory of annotated Rust sources
    pub dir: PathBuf,

    /// Database URL
    #[arg(env = "DATABASE_URL")]
    pub dsn: Option<String>,
}

/// Arguments for the `migrate` command
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Directory of annotated Rust sources
    pub dir: PathBuf,

    /// Database URL
    #[arg(env = "DATABASE_URL")]
    pub dsn: Option<String>,

    /// Write the next versioned migration pair into this directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include DROP statements for removed tables, columns and enums
    #[arg(long)]
    pub allow_drop: bool,

    /// Description used in the migration file name
    #[arg(short, long, default_value = "schema changes")]
    pub description: String,
}

/// Arguments for the `drop-schema` command
#[derive(Args, Debug)]
pub struct DropSchemaArgs {
    /// Directory of annotated Rust sources
    pub dir: PathBuf,

    /// Database URL
    #[arg(env = "DATABASE_URL")]
    pub dsn: Option<String>,
}

/// Arguments for the `drop-all` command
#[derive(Args, Debug)]
pub struct DropAllArgs {
    /// Database URL
    #[arg(env = "DATABASE_URL")]
    pub dsn: Option<String>,
}

// =============================================================================
// Versioned Migration Commands
// =============================================================================

/// Arguments for the `up` command
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Database URL
    #[arg(env = "DATABASE_URL")]
    pub dsn: Option<String>,

    /// Migrations directory
    #[arg(short, long)]
    pub migrations: Option<PathBuf>,

    /// Show what would run without executing
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `down` command
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Database URL
    pub dsn: String,

    /// Version to revert down to (0 reverts everything)
    pub target: i64,

    /// Migrations directory
    #[arg(short, long)]
    pub migrations: Option<PathBuf>,

    /// Show what would run without executing
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `status` command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Database URL
    #[arg(env = "DATABASE_URL")]
    pub dsn: Option<String>,

    /// Migrations directory
    #[arg(short, long)]
    pub migrations: Option<PathBuf>,
}

/// Arguments for the `bootstrap` command
#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// Database URL (not needed with --dry-run)
    #[arg(env = "DATABASE_URL")]
    pub dsn: Option<String>,

    /// Template variable as name=value (repeatable)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Render the scripts without connecting
    #[arg(long)]
    pub dry_run: bool,
}
