//! # ptah-schema
//!
//! Annotation parser, schema model and dependency resolver for ptah.
//!
//! This crate provides:
//! - The `schema:` directive grammar, read from doc comments in Rust sources
//! - A two-pass builder that turns declarations into a [`SchemaModel`]
//! - Embed groups spliced inline, as a JSON column, or as a relation
//! - Foreign key ordering with explicit cycle detection
//!
//! ## Example
//!
//! ```rust,ignore
//! use ptah_schema::parse_directory;
//!
//! let outcome = parse_directory("src/models")?;
//! for diagnostic in &outcome.diagnostics {
//!     eprintln!("{diagnostic}");
//! }
//! let order = outcome.model.resolve().order;
//! ```

pub mod ast;
pub mod dialect;
pub mod error;
pub mod graph;
pub mod parser;

pub use ast::*;
pub use dialect::Dialect;
pub use error::{SchemaDiagnostic, SchemaError, SchemaResult};
pub use graph::{DeferredEdge, Resolution};
pub use parser::{ParseOutcome, parse_directory, parse_source, parse_sources};
