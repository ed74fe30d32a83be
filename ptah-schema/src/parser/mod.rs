//! Annotation parser for Rust sources.

mod builder;
mod directive;
mod grammar;
mod scanner;

use std::path::Path;

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::ast::SchemaModel;
use crate::error::{SchemaDiagnostic, SchemaError, SchemaResult};

pub use directive::{AttributeBag, DIRECTIVE_PREFIX, Directive, DirectiveKind, parse_directive};
pub use grammar::{DirectiveParser, Rule};
pub use scanner::{ScannedField, ScannedStruct, scan_source};

use builder::Collector;

/// The model built from a scan plus every problem found along the way.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub model: SchemaModel,
    pub diagnostics: Vec<SchemaDiagnostic>,
}

impl ParseOutcome {
    /// Whether the scan produced no diagnostics.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Scan every `*.rs` file below `root` and build the schema model.
///
/// Files are visited in sorted path order. Only an unreadable `root` is an
/// error; problems inside files become diagnostics.
pub fn parse_directory(root: impl AsRef<Path>) -> SchemaResult<ParseOutcome> {
    let root = root.as_ref();
    std::fs::read_dir(root).map_err(|source| SchemaError::IoError {
        path: root.display().to_string(),
        source,
    })?;

    let mut collector = Collector::new();
    let mut diagnostics = Vec::new();
    let mut files = 0usize;

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| root.display().to_string());
                let error = match e.into_io_error() {
                    Some(source) => SchemaError::IoError {
                        path: path.clone(),
                        source,
                    },
                    None => SchemaError::invalid_directive("scan", "filesystem loop"),
                };
                diagnostics.push(SchemaDiagnostic::new(path, 0, error));
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "rs") {
            continue;
        }

        let label = path.display().to_string();
        let source = match std::fs::read_to_string(path) {
            Ok(source) => source,
            Err(source) => {
                diagnostics.push(SchemaDiagnostic::new(
                    &label,
                    0,
                    SchemaError::IoError {
                        path: label.clone(),
                        source,
                    },
                ));
                continue;
            }
        };

        debug!(file = %label, "scanning");
        let structs = scan_source(&label, &source, &mut diagnostics);
        collector.collect(&label, structs);
        files += 1;
    }

    let (model, mut build_diagnostics) = collector.build();
    diagnostics.append(&mut build_diagnostics);
    info!(
        files,
        tables = model.tables.len(),
        diagnostics = diagnostics.len(),
        "parsed schema annotations"
    );
    Ok(ParseOutcome { model, diagnostics })
}

/// Build a model from a single source text.
pub fn parse_source(label: &str, source: &str) -> ParseOutcome {
    parse_sources([(label, source)])
}

/// Build a model from several `(label, source)` pairs.
pub fn parse_sources<'a>(sources: impl IntoIterator<Item = (&'a str, &'a str)>) -> ParseOutcome {
    let mut collector = Collector::new();
    let mut diagnostics = Vec::new();
    for (label, source) in sources {
        let structs = scan_source(label, source, &mut diagnostics);
        collector.collect(label, structs);
    }
    let (model, mut build_diagnostics) = collector.build();
    diagnostics.append(&mut build_diagnostics);
    ParseOutcome { model, diagnostics }
}
