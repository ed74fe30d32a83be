//! Schema model types.
//!
//! Declarations found in source annotations are collected into these types.
//! [`FieldDecl`] is a field as written, before it is placed into a table;
//! [`Column`] is the placed result owned by exactly one [`Table`].

mod embed;
mod enums;
mod index;
mod overrides;
mod schema;
mod table;

pub use embed::*;
pub use enums::*;
pub use index::*;
pub use overrides::*;
pub use schema::*;
pub use table::*;
