//! Extract directives from Rust source files.
//!
//! Directives live in doc comments. `syn` keeps doc comments as `#[doc]`
//! attributes, so a struct's directives are its doc attributes and a field's
//! directives are the doc attributes on the field.

use syn::spanned::Spanned;
use syn::{Attribute, Expr, ExprLit, Fields, GenericArgument, Item, Lit, Meta, PathArguments, Type};

use super::directive::{Directive, parse_directive};
use crate::error::{SchemaDiagnostic, SchemaError};

/// A struct with at least one directive on it or its fields.
#[derive(Debug, Clone)]
pub struct ScannedStruct {
    pub name: String,
    pub line: usize,
    pub directives: Vec<Directive>,
    pub fields: Vec<ScannedField>,
}

/// A struct field and its directives.
#[derive(Debug, Clone)]
pub struct ScannedField {
    /// Field identifier; `None` for tuple fields.
    pub ident: Option<String>,
    /// Innermost named type, with `Option`, `Box`, `Arc`, `Rc` and `Vec` peeled.
    pub type_name: Option<String>,
    pub line: usize,
    pub directives: Vec<Directive>,
}

/// Scan one file.
///
/// Directive errors are pushed to `diagnostics` and the directive is dropped.
/// A file `syn` cannot parse yields one diagnostic and no structs.
pub fn scan_source(
    file: &str,
    source: &str,
    diagnostics: &mut Vec<SchemaDiagnostic>,
) -> Vec<ScannedStruct> {
    let parsed = match syn::parse_file(source) {
        Ok(parsed) => parsed,
        Err(e) => {
            let line = e.span().start().line;
            diagnostics.push(SchemaDiagnostic::new(
                file,
                line,
                SchemaError::SourceError {
                    message: e.to_string(),
                },
            ));
            return Vec::new();
        }
    };

    let mut structs = Vec::new();
    scan_items(file, &parsed.items, &mut structs, diagnostics);
    structs
}

fn scan_items(
    file: &str,
    items: &[Item],
    out: &mut Vec<ScannedStruct>,
    diagnostics: &mut Vec<SchemaDiagnostic>,
) {
    for item in items {
        match item {
            Item::Struct(s) => {
                let directives = doc_directives(file, &s.attrs, diagnostics);
                let fields = match &s.fields {
                    Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
                    Fields::Unnamed(unnamed) => unnamed.unnamed.iter().collect(),
                    Fields::Unit => Vec::new(),
                };
                let fields: Vec<ScannedField> = fields
                    .into_iter()
                    .map(|f| ScannedField {
                        ident: f.ident.as_ref().map(ToString::to_string),
                        type_name: type_name(&f.ty),
                        line: f.span().start().line,
                        directives: doc_directives(file, &f.attrs, diagnostics),
                    })
                    .collect();

                if directives.is_empty() && fields.iter().all(|f| f.directives.is_empty()) {
                    continue;
                }
                out.push(ScannedStruct {
                    name: s.ident.to_string(),
                    line: s.ident.span().start().line,
                    directives,
                    fields,
                });
            }
            Item::Mod(m) => {
                if let Some((_, items)) = &m.content {
                    scan_items(file, items, out, diagnostics);
                }
            }
            _ => {}
        }
    }
}

fn doc_directives(
    file: &str,
    attrs: &[Attribute],
    diagnostics: &mut Vec<SchemaDiagnostic>,
) -> Vec<Directive> {
    let mut found = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("doc")) {
        let Meta::NameValue(nv) = &attr.meta else {
            continue;
        };
        let Expr::Lit(ExprLit {
            lit: Lit::Str(text),
            ..
        }) = &nv.value
        else {
            continue;
        };

        let first_line = attr.span().start().line;
        for (offset, line_text) in text.value().lines().enumerate() {
            let line = first_line + offset;
            match parse_directive(line_text, line) {
                Ok(Some(directive)) => found.push(directive),
                Ok(None) => {}
                Err(error) => diagnostics.push(SchemaDiagnostic::new(file, line, error)),
            }
        }
    }
    found
}

fn type_name(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(tp) => {
            let segment = tp.path.segments.last()?;
            let ident = segment.ident.to_string();
            let wrapper = matches!(ident.as_str(), "Option" | "Box" | "Arc" | "Rc" | "Vec");
            if wrapper {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    let inner = args.args.iter().find_map(|arg| match arg {
                        GenericArgument::Type(t) => Some(t),
                        _ => None,
                    });
                    if let Some(inner) = inner {
                        return type_name(inner);
                    }
                }
            }
            Some(ident)
        }
        Type::Reference(r) => type_name(&r.elem),
        Type::Paren(p) => type_name(&p.elem),
        Type::Group(g) => type_name(&g.elem),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::DirectiveKind;

    #[test]
    fn test_scan_struct_and_fields() {
        let src = r#"
/// A registered user.
/// schema:table name="users"
pub struct User {
    /// schema:field name="id" type="SERIAL" primary
    pub id: i32,
    /// Not a directive.
    pub cache: String,
    /// schema:embedded mode="inline" prefix="home_"
    pub address: Option<Address>,
}

struct Unannotated {
    x: i32,
}
"#;
        let mut diags = Vec::new();
        let structs = scan_source("user.rs", src, &mut diags);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(structs.len(), 1);

        let user = &structs[0];
        assert_eq!(user.name, "User");
        assert_eq!(user.directives.len(), 1);
        assert_eq!(user.directives[0].kind, DirectiveKind::Table);
        assert_eq!(user.directives[0].line, 3);

        assert_eq!(user.fields.len(), 3);
        assert_eq!(user.fields[0].directives[0].line, 5);
        assert!(user.fields[1].directives.is_empty());
        assert_eq!(user.fields[2].type_name.as_deref(), Some("Address"));
        assert_eq!(user.fields[2].ident.as_deref(), Some("address"));
    }

    #[test]
    fn test_scan_inline_module() {
        let src = r#"
mod models {
    /// schema:embed
    pub struct Audit {
        /// schema:field name="created_at" type="TIMESTAMP"
        pub created_at: String,
    }
}
"#;
        let mut diags = Vec::new();
        let structs = scan_source("lib.rs", src, &mut diags);
        assert_eq!(structs.len(), 1);
        assert_eq!(structs[0].name, "Audit");
        assert_eq!(structs[0].directives[0].kind, DirectiveKind::Embed);
    }

    #[test]
    fn test_bad_directive_is_reported_and_skipped() {
        let src = r#"
/// schema:table name="items"
struct Item {
    /// schema:field name="id type="INT"
    id: i32,
    /// schema:field name="sku" type="TEXT"
    sku: String,
}
"#;
        let mut diags = Vec::new();
        let structs = scan_source("items.rs", src, &mut diags);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].file, "items.rs");
        assert_eq!(diags[0].line, 4);
        assert!(structs[0].fields[0].directives.is_empty());
        assert_eq!(structs[0].fields[1].directives.len(), 1);
    }

    #[test]
    fn test_unparseable_file_is_a_diagnostic() {
        let mut diags = Vec::new();
        let structs = scan_source("broken.rs", "struct {", &mut diags);
        assert!(structs.is_empty());
        assert_eq!(diags.len(), 1);
        assert!(matches!(diags[0].error, SchemaError::SourceError { .. }));
    }

    #[test]
    fn test_type_name_peels_wrappers() {
        let ty: Type = syn::parse_str("Option<Box<crate::models::Address>>").unwrap();
        assert_eq!(type_name(&ty).as_deref(), Some("Address"));
        let ty: Type = syn::parse_str("&'static str").unwrap();
        assert_eq!(type_name(&ty).as_deref(), Some("str"));
    }
}
