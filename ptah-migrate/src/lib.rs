//! # ptah-migrate
//!
//! DDL generation, schema comparison and migrations for ptah.
//!
//! This crate provides functionality for:
//! - Rendering a [`SchemaModel`](ptah_schema::SchemaModel) as Postgres, MySQL or generic DDL
//! - Reading a live schema through the [`Introspector`] trait
//! - Diffing the declared model against a live schema
//! - Generating migration SQL from a diff
//! - Running versioned, transactional up/down migrations
//! - Applying the embedded bootstrap scripts
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌───────────────┐
//! │ SchemaModel  │────▶│ Schema Differ  │────▶│ Migration SQL │
//! └──────────────┘     └────────────────┘     └───────────────┘
//!        │                     ▲                      │
//!        ▼                     │                      ▼
//! ┌──────────────┐     ┌────────────────┐     ┌───────────────┐
//! │ DDL per      │     │ Introspector   │     │ Migration     │
//! │ dialect      │     │ (drivers)      │     │ files/runner  │
//! └──────────────┘     └────────────────┘     └───────────────┘
//! ```
//!
//! Database drivers live in `ptah-postgres` and `ptah-mysql`; both implement
//! [`DatabaseConnection`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use ptah_migrate::{Migration, MigrationRegistry, MigrationRunner};
//!
//! let mut registry = MigrationRegistry::new();
//! registry.register(Migration::sql(
//!     1,
//!     "create users",
//!     "CREATE TABLE users (id INT PRIMARY KEY);",
//!     "DROP TABLE users;",
//! ))?;
//!
//! let report = MigrationRunner::new(&mut conn, &registry).up().await?;
//! println!("applied {:?}", report.versions);
//! ```
//!
//! ## Migration Files
//!
//! ```text
//! migrations/
//! ├── 0001_create_users.up.sql
//! ├── 0001_create_users.down.sql
//! └── 0002_add_posts.up.sql
//! ```

pub mod bootstrap;
pub mod connection;
pub mod diff;
pub mod error;
pub mod file;
pub mod history;
pub mod introspect;
pub mod runner;
pub mod splitter;
pub mod sql;

#[cfg(test)]
mod testing;

pub use bootstrap::{BootstrapVars, Bootstrapper, RenderedFile};
pub use connection::DatabaseConnection;
pub use diff::{ColumnDiff, EnumDiff, SchemaDiff, TableDiff, diff_schema};
pub use error::{MigrateResult, MigrationError};
pub use file::{MigrationFile, MigrationFileManager};
pub use history::{DEFAULT_TABLE, MigrationRecord, TrackingTable};
pub use introspect::{
    ColumnInfo, ConstraintInfo, ConstraintKind, DatabaseSchema, EnumInfo, IndexInfo, IntrospectionConfig,
    Introspector, TableInfo, normalize_type,
};
pub use runner::{Migration, MigrationRegistry, MigrationRunner, MigrationStatus, RunReport};
pub use splitter::split_statements;
pub use sql::{
    DialectGenerator, GeneratedSchema, MigrationOptions, MigrationSql, drop_all_sql, drop_schema_sql,
    generate_migration, generate_schema, generator_for,
};
