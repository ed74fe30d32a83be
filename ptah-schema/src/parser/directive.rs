//! Directive parsing and the normalized attribute bag.

use std::fmt;

use indexmap::IndexMap;
use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::Pair;

use super::grammar::{DirectiveParser, Rule};
use crate::ast::{PlatformOverrides, Reference};
use crate::error::{SchemaError, SchemaResult};

/// Prefix that marks a doc comment line as a directive.
pub const DIRECTIVE_PREFIX: &str = "schema:";

/// The kind of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirectiveKind {
    Table,
    Field,
    Index,
    /// Marks a struct as an embed group.
    Embed,
    /// Splices an embed group into the enclosing table.
    Embedded,
}

impl DirectiveKind {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "table" => Some(Self::Table),
            "field" => Some(Self::Field),
            "index" => Some(Self::Index),
            "embed" => Some(Self::Embed),
            "embedded" => Some(Self::Embedded),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Field => "field",
            Self::Index => "index",
            Self::Embed => "embed",
            Self::Embedded => "embedded",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attributes of one directive, verbose and shorthand forms merged.
///
/// Shorthand `key` is stored as `key="true"`. The first occurrence of a key
/// wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeBag {
    kind: Option<DirectiveKind>,
    entries: IndexMap<String, String>,
}

impl AttributeBag {
    /// Create an empty bag for a directive kind.
    pub fn new(kind: DirectiveKind) -> Self {
        Self {
            kind: Some(kind),
            entries: IndexMap::new(),
        }
    }

    /// Insert a value. Returns `false` when the key was already present.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, value.into());
        true
    }

    /// Raw value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Owned value of a key, empty values treated as absent.
    pub fn string(&self, key: &str) -> Option<String> {
        self.get(key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Value of a required key.
    pub fn require(&self, key: &str) -> SchemaResult<String> {
        self.string(key).ok_or_else(|| {
            SchemaError::missing(self.kind.map(DirectiveKind::as_str).unwrap_or("directive"), key)
        })
    }

    /// Boolean value of a key; absent keys are `false`.
    pub fn flag(&self, key: &str) -> SchemaResult<bool> {
        match self.get(key) {
            None => Ok(false),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" | "" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(SchemaError::invalid_value(key, v)),
            },
        }
    }

    /// Comma separated list value.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A `table(column)` reference value.
    pub fn reference(&self, key: &str) -> SchemaResult<Option<Reference>> {
        self.string(key).map(|v| v.parse()).transpose()
    }

    /// Collect `platform.<dialect>.<key>` entries.
    pub fn overrides(&self) -> PlatformOverrides {
        let mut overrides = PlatformOverrides::new();
        for (key, value) in &self.entries {
            let Some(rest) = key.strip_prefix("platform.") else {
                continue;
            };
            if let Some((platform, attribute)) = rest.split_once('.') {
                if !platform.is_empty() && !attribute.is_empty() {
                    overrides.insert(platform, attribute, value.clone());
                }
            }
        }
        overrides
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One parsed `schema:` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub attrs: AttributeBag,
    /// 1-based source line (0 when unknown).
    pub line: usize,
}

/// Parse one doc comment line.
///
/// Returns `Ok(None)` for lines that are not directives.
pub fn parse_directive(text: &str, line: usize) -> SchemaResult<Option<Directive>> {
    let text = text.trim();
    if !text.starts_with(DIRECTIVE_PREFIX) {
        return Ok(None);
    }

    let mut pairs = DirectiveParser::parse(Rule::directive, text).map_err(|e| {
        let (offset, len) = match e.location {
            InputLocation::Pos(p) => (p, 0),
            InputLocation::Span((s, end)) => (s, end.saturating_sub(s)),
        };
        SchemaError::syntax(text, offset, len, e.variant.message().to_string())
    })?;

    let Some(directive) = pairs.next() else {
        return Ok(None);
    };

    let mut kind = None;
    let mut attrs = AttributeBag::default();
    for pair in directive.into_inner() {
        match pair.as_rule() {
            Rule::kind => {
                let k = DirectiveKind::from_keyword(pair.as_str())
                    .ok_or_else(|| SchemaError::invalid_directive(pair.as_str(), "unknown kind"))?;
                attrs.kind = Some(k);
                kind = Some(k);
            }
            Rule::verbose => {
                let (key, value) = verbose_attribute(pair);
                if !attrs.insert(key.clone(), value) {
                    tracing::debug!(key = %key, "ignoring repeated attribute");
                }
            }
            Rule::shorthand => {
                let key = pair.as_str().to_string();
                if !attrs.insert(key.clone(), "true") {
                    tracing::debug!(key = %key, "ignoring repeated attribute");
                }
            }
            _ => {}
        }
    }

    let kind = kind.ok_or_else(|| SchemaError::syntax(text, 0, text.len(), "missing directive kind"))?;
    Ok(Some(Directive { kind, attrs, line }))
}

fn verbose_attribute(pair: Pair<'_, Rule>) -> (String, String) {
    let mut key = String::new();
    let mut value = String::new();
    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::key => key = part.as_str().to_string(),
            Rule::string => {
                let raw = part
                    .into_inner()
                    .next()
                    .map(|inner| inner.as_str())
                    .unwrap_or_default();
                value = unescape(raw);
            }
            _ => {}
        }
    }
    (key, value)
}

/// Resolve `\"` and `\\`; other escapes are kept as written.
fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('"' | '\\')) => out.push(next),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(text: &str) -> Directive {
        parse_directive(text, 1).unwrap().unwrap()
    }

    #[test]
    fn test_non_directive_lines() {
        assert!(parse_directive("A user account.", 1).unwrap().is_none());
        assert!(parse_directive("", 1).unwrap().is_none());
        assert!(parse_directive("see schema: below", 1).unwrap().is_none());
    }

    #[test]
    fn test_verbose_and_shorthand_merge() {
        let d = parse(r#" schema:field name="id" type="SERIAL" primary not_null="true" "#);
        assert_eq!(d.kind, DirectiveKind::Field);
        assert_eq!(d.attrs.get("name"), Some("id"));
        assert_eq!(d.attrs.get("type"), Some("SERIAL"));
        assert!(d.attrs.flag("primary").unwrap());
        assert!(d.attrs.flag("not_null").unwrap());
        assert!(!d.attrs.flag("unique").unwrap());
    }

    #[test]
    fn test_shorthand_and_verbose_forms_are_equivalent() {
        let a = parse("schema:field name=\"x\" type=\"INT\" unique");
        let b = parse("schema:field name=\"x\" type=\"INT\" unique=\"true\"");
        assert_eq!(a.attrs, b.attrs);
    }

    #[test]
    fn test_first_duplicate_wins() {
        let d = parse(r#"schema:table name="users" name="accounts""#);
        assert_eq!(d.attrs.get("name"), Some("users"));
        assert_eq!(d.attrs.len(), 1);
    }

    #[test]
    fn test_escapes() {
        let d = parse(r#"schema:field name="note" type="TEXT" check="note <> '\"'" comment="a \\ b""#);
        assert_eq!(d.attrs.get("check"), Some(r#"note <> '"'"#));
        assert_eq!(d.attrs.get("comment"), Some(r"a \ b"));
    }

    #[test]
    fn test_invalid_flag_value() {
        let d = parse(r#"schema:field name="x" type="INT" unique="maybe""#);
        assert!(matches!(
            d.attrs.flag("unique"),
            Err(SchemaError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_list_and_reference() {
        let d = parse(r#"schema:index name="i" fields="a, b,,c""#);
        assert_eq!(d.attrs.list("fields"), vec!["a", "b", "c"]);

        let d = parse(r#"schema:field name="u" type="INT" foreign="users(id)""#);
        assert_eq!(
            d.attrs.reference("foreign").unwrap(),
            Some(Reference::new("users", "id"))
        );

        let d = parse(r#"schema:field name="u" type="INT" foreign="users""#);
        assert!(d.attrs.reference("foreign").is_err());
    }

    #[test]
    fn test_overrides() {
        let d = parse(
            r#"schema:field name="d" type="JSONB" platform.mysql.type="JSON" platform.mysql.check="JSON_VALID(d)" platform.bogus="x""#,
        );
        let o = d.attrs.overrides();
        assert_eq!(o.get_platform("mysql", "type"), Some("JSON"));
        assert_eq!(o.get_platform("mysql", "check"), Some("JSON_VALID(d)"));
        assert_eq!(o.iter().count(), 2);
    }

    #[test]
    fn test_require_reports_kind() {
        let d = parse("schema:field type=\"INT\"");
        let err = d.attrs.require("name").unwrap_err();
        assert_eq!(
            err.to_string(),
            "`field` directive is missing required attribute `name`"
        );
    }

    #[test]
    fn test_syntax_error_location() {
        let err = parse_directive("schema:table name=\"users", 7).unwrap_err();
        match err {
            SchemaError::SyntaxError { src, .. } => assert_eq!(src, "schema:table name=\"users"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape(r#"a\"b"#), "a\"b");
        assert_eq!(unescape(r"a\\b"), r"a\b");
        assert_eq!(unescape(r"a\nb"), r"a\nb");
    }
}
