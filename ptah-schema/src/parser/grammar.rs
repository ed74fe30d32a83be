//! Pest grammar for `schema:` directives.

use pest_derive::Parser;

/// The directive parser.
#[derive(Parser)]
#[grammar = "parser/directive.pest"]
pub struct DirectiveParser;
