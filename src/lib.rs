//! # ptah
//!
//! Annotation-driven schema modeling, multi-dialect DDL generation and
//! migrations.
//!
//! Tables are declared with `schema:` directives in the doc comments of
//! ordinary Rust structs. ptah turns them into a dialect-neutral model,
//! renders DDL for PostgreSQL, MySQL/MariaDB or generic SQL, compares the
//! model with a live database and produces migrations.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ptah::prelude::*;
//!
//! /// schema:table name="users"
//! pub struct User {
//!     /// schema:field name="id" type="SERIAL" primary
//!     pub id: i32,
//!     /// schema:field name="email" type="VARCHAR(255)" not_null unique
//!     pub email: String,
//! }
//!
//! let outcome = parse_directory("src/models")?;
//! let ddl = generate_schema(&outcome.model, Dialect::Postgres);
//! println!("{}", ddl.to_sql());
//! ```
//!
//! Database drivers are separate crates (`ptah-postgres`, `ptah-mysql`), and
//! the `ptah` binary lives in `ptah-cli`.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Annotation parsing, the schema model and dependency resolution.
pub mod schema {
    pub use ptah_schema::*;
}

/// DDL generation, diffing, introspection and migrations.
pub mod migrate {
    pub use ptah_migrate::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::migrate::{
        DatabaseConnection, DatabaseSchema, IntrospectionConfig, Introspector, MigrationOptions, MigrationRegistry,
        MigrationRunner, SchemaDiff, diff_schema, generate_migration, generate_schema,
    };
    pub use crate::schema::{Dialect, SchemaModel, parse_directory, parse_source};
}

// Re-export key types at the crate root
pub use migrate::{MigrateResult, MigrationError};
pub use schema::{SchemaError, SchemaModel};
