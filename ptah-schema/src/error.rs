//! Error types for annotation parsing and schema building.

// These warnings are false positives - the fields are used by derive macros
#![allow(unused_assignments)]

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Errors that can occur while scanning sources and building the schema model.
#[derive(Error, Debug, Diagnostic)]
pub enum SchemaError {
    /// Error reading a file or directory.
    #[error("failed to read {path}")]
    #[diagnostic(code(ptah::schema::io_error))]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A Rust source file that `syn` could not parse.
    #[error("failed to parse Rust source: {message}")]
    #[diagnostic(code(ptah::schema::source_error))]
    SourceError { message: String },

    /// Grammar failure inside a `schema:` directive.
    #[error("syntax error in directive: {message}")]
    #[diagnostic(code(ptah::schema::syntax_error))]
    SyntaxError {
        #[source_code]
        src: String,
        #[label("error here")]
        span: miette::SourceSpan,
        message: String,
    },

    /// A directive that is well-formed but not valid where it appears.
    #[error("invalid `{kind}` directive: {message}")]
    #[diagnostic(code(ptah::schema::invalid_directive))]
    InvalidDirective { kind: String, message: String },

    /// A directive missing one of its required attributes.
    #[error("`{kind}` directive is missing required attribute `{attribute}`")]
    #[diagnostic(
        code(ptah::schema::missing_attribute),
        help("add {attribute}=\"...\" to the directive")
    )]
    MissingAttribute { kind: String, attribute: String },

    /// An attribute whose value cannot be interpreted.
    #[error("invalid value `{value}` for attribute `{attribute}`")]
    #[diagnostic(code(ptah::schema::invalid_value))]
    InvalidValue { attribute: String, value: String },

    /// A foreign key target that is not of the form `table(column)`.
    #[error("invalid foreign reference `{reference}`")]
    #[diagnostic(
        code(ptah::schema::invalid_reference),
        help("references are written as table(column)")
    )]
    InvalidReference { reference: String },

    /// An `embedded` directive naming a type that is not an embed group.
    #[error("unknown embed group `{group}` referenced from table `{table}`")]
    #[diagnostic(
        code(ptah::schema::unknown_embed),
        help("mark the struct with `schema:embed`")
    )]
    UnknownEmbed { group: String, table: String },

    /// An index listing a column its table does not have.
    #[error("index `{index}` references unknown column `{column}`")]
    #[diagnostic(code(ptah::schema::unknown_column))]
    UnknownColumn { index: String, column: String },

    /// Duplicate definition.
    #[error("duplicate {kind} `{name}`")]
    #[diagnostic(code(ptah::schema::duplicate))]
    Duplicate { kind: String, name: String },
}

impl SchemaError {
    /// Create a syntax error with source location.
    pub fn syntax(
        src: impl Into<String>,
        offset: usize,
        len: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::SyntaxError {
            src: src.into(),
            span: (offset, len).into(),
            message: message.into(),
        }
    }

    /// Create an invalid directive error.
    pub fn invalid_directive(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDirective {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create a missing attribute error.
    pub fn missing(kind: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::MissingAttribute {
            kind: kind.into(),
            attribute: attribute.into(),
        }
    }

    /// Create an invalid value error.
    pub fn invalid_value(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Create a duplicate definition error.
    pub fn duplicate(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Duplicate {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// A per-declaration problem found during a scan.
///
/// Diagnostics never abort the scan; the offending declaration is skipped
/// and the rest of the sources are still processed.
#[derive(Debug)]
pub struct SchemaDiagnostic {
    /// File the declaration was found in.
    pub file: String,
    /// 1-based line of the offending doc comment (0 when unknown).
    pub line: usize,
    /// What went wrong.
    pub error: SchemaError,
}

impl SchemaDiagnostic {
    /// Create a diagnostic for a location.
    pub fn new(file: impl Into<String>, line: usize, error: SchemaError) -> Self {
        Self {
            file: file.into(),
            line,
            error,
        }
    }
}

impl fmt::Display for SchemaDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error {
            SchemaError::SyntaxError { message, .. } => {
                write!(f, "{}:{}: syntax error: {}", self.file, self.line, message)
            }
            other => write!(f, "{}:{}: {}", self.file, self.line, other),
        }
    }
}

#[cfg(test)]
#[allow(unused_assignments)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error() {
        let err = SchemaError::syntax("schema:table name=", 18, 0, "expected string");

        match err {
            SchemaError::SyntaxError { src, span, message } => {
                assert_eq!(src, "schema:table name=");
                assert_eq!(span.offset(), 18);
                assert_eq!(message, "expected string");
            }
            _ => panic!("Expected SyntaxError"),
        }
    }

    #[test]
    fn test_missing_attribute_display() {
        let err = SchemaError::missing("field", "type");
        assert_eq!(
            err.to_string(),
            "`field` directive is missing required attribute `type`"
        );
    }

    #[test]
    fn test_unknown_embed_display() {
        let err = SchemaError::UnknownEmbed {
            group: "Audit".to_string(),
            table: "users".to_string(),
        };
        assert!(err.to_string().contains("Audit"));
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_diagnostic_display_includes_location() {
        let diag = SchemaDiagnostic::new(
            "src/models.rs",
            12,
            SchemaError::InvalidReference {
                reference: "users.id".to_string(),
            },
        );
        assert_eq!(
            diag.to_string(),
            "src/models.rs:12: invalid foreign reference `users.id`"
        );
    }

    #[test]
    fn test_diagnostic_display_syntax_message() {
        let diag = SchemaDiagnostic::new(
            "a.rs",
            3,
            SchemaError::syntax("schema:", 7, 0, "expected kind"),
        );
        assert_eq!(diag.to_string(), "a.rs:3: syntax error: expected kind");
    }

    #[test]
    fn test_error_codes() {
        use miette::Diagnostic as _;

        let err = SchemaError::duplicate("table", "users");
        assert_eq!(
            err.code().map(|c| c.to_string()),
            Some("ptah::schema::duplicate".to_string())
        );
    }
}
