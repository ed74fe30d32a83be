//! Field declarations and embedded groups.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Column, EnumType, ForeignKey, PlatformOverrides, Reference};
use crate::error::SchemaError;

/// A field as declared on a struct, before it is placed into a table.
///
/// The same declaration can be placed into several tables when it belongs to
/// an embed group; names derived from the table (enum and foreign key names)
/// are computed at placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub owner: String,
    pub sql_type: String,
    pub not_null: bool,
    pub primary: bool,
    pub unique: bool,
    pub index: bool,
    pub default: Option<String>,
    pub default_fn: Option<String>,
    pub check: Option<String>,
    pub enum_values: Vec<String>,
    pub foreign: Option<Reference>,
    pub foreign_key_name: Option<String>,
    pub on_delete: Option<String>,
    pub comment: Option<String>,
    pub overrides: PlatformOverrides,
}

impl FieldDecl {
    /// Whether the declared type is `ENUM`.
    pub fn is_enum(&self) -> bool {
        self.sql_type.eq_ignore_ascii_case("enum")
    }

    /// Place the field into `table`, prefixing its column name.
    pub fn place(&self, table: &str, prefix: &str) -> Column {
        let name = format!("{prefix}{}", self.name);
        let enum_name = self
            .is_enum()
            .then(|| EnumType::name_for(table, &name));
        let foreign_key = self.foreign.as_ref().map(|reference| ForeignKey {
            name: self
                .foreign_key_name
                .clone()
                .unwrap_or_else(|| foreign_key_name(table, &name)),
            references: reference.clone(),
            on_delete: self.on_delete.clone(),
        });

        Column {
            owner: self.owner.clone(),
            sql_type: self.sql_type.clone(),
            nullable: !(self.not_null || self.primary),
            primary: self.primary,
            unique: self.unique,
            indexed: self.index,
            default: self.default.clone(),
            default_fn: self.default_fn.clone(),
            check: self.check.clone(),
            enum_name,
            enum_values: self.enum_values.clone(),
            foreign_key,
            comment: self.comment.clone(),
            overrides: self.overrides.clone(),
            name,
        }
    }
}

/// Default constraint name for a foreign key on `table.column`.
pub fn foreign_key_name(table: &str, column: &str) -> String {
    format!("fk_{table}_{column}")
}

/// How an embed group is spliced into a host table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedMode {
    /// The group's fields become columns of the host table.
    Inline,
    /// The group collapses into one JSON column.
    Json,
    /// The group becomes a foreign key column to another table.
    Relation,
}

impl FromStr for EmbedMode {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "json" => Ok(Self::Json),
            "relation" => Ok(Self::Relation),
            _ => Err(SchemaError::invalid_value("mode", s)),
        }
    }
}

impl fmt::Display for EmbedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Inline => "inline",
            Self::Json => "json",
            Self::Relation => "relation",
        })
    }
}

/// A struct marked `schema:embed`: a reusable bundle of fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedGroup {
    pub name: String,
    pub fields: Vec<FieldDecl>,
}

/// A `schema:embedded` directive on a struct field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedDecl {
    pub mode: EmbedMode,
    /// Rust type of the embedded field (the group).
    pub group: String,
    /// Rust field name the directive is attached to.
    pub field_name: String,
    pub name: Option<String>,
    pub sql_type: Option<String>,
    pub prefix: Option<String>,
    /// Foreign key column for relation mode.
    pub field: Option<String>,
    pub reference: Option<Reference>,
    pub on_delete: Option<String>,
    pub not_null: bool,
    pub comment: Option<String>,
    pub overrides: PlatformOverrides,
}

impl EmbedDecl {
    /// Column produced in JSON mode.
    pub fn json_column(&self) -> Column {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| format!("{}_data", self.field_name));
        self.single_column(name, self.sql_type.as_deref().unwrap_or("JSONB"), None)
    }

    /// Column produced in relation mode.
    ///
    /// Returns `None` when the directive lacks `field` or `ref`.
    pub fn relation_column(&self, table: &str) -> Option<Column> {
        let name = self.field.clone()?;
        let reference = self.reference.clone()?;
        let fk = ForeignKey {
            name: foreign_key_name(table, &name),
            references: reference,
            on_delete: self.on_delete.clone(),
        };
        Some(self.single_column(
            name,
            self.sql_type.as_deref().unwrap_or("INTEGER"),
            Some(fk),
        ))
    }

    fn single_column(&self, name: String, sql_type: &str, foreign_key: Option<ForeignKey>) -> Column {
        Column {
            name,
            owner: self.group.clone(),
            sql_type: sql_type.to_string(),
            nullable: !self.not_null,
            primary: false,
            unique: false,
            indexed: false,
            default: None,
            default_fn: None,
            check: None,
            enum_name: None,
            enum_values: Vec::new(),
            foreign_key,
            comment: self.comment.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str, sql_type: &str) -> FieldDecl {
        FieldDecl {
            name: name.to_string(),
            owner: "Address".to_string(),
            sql_type: sql_type.to_string(),
            not_null: false,
            primary: false,
            unique: false,
            index: false,
            default: None,
            default_fn: None,
            check: None,
            enum_values: vec![],
            foreign: None,
            foreign_key_name: None,
            on_delete: None,
            comment: None,
            overrides: PlatformOverrides::new(),
        }
    }

    fn embed(mode: EmbedMode) -> EmbedDecl {
        EmbedDecl {
            mode,
            group: "Address".to_string(),
            field_name: "address".to_string(),
            name: None,
            sql_type: None,
            prefix: None,
            field: None,
            reference: None,
            on_delete: None,
            not_null: false,
            comment: None,
            overrides: PlatformOverrides::new(),
        }
    }

    #[test]
    fn test_place_with_prefix_derives_names() {
        let mut d = decl("status", "ENUM");
        d.enum_values = vec!["a".into(), "b".into()];
        d.foreign = Some(Reference::new("countries", "code"));

        let c = d.place("users", "home_");
        assert_eq!(c.name, "home_status");
        assert_eq!(c.enum_name.as_deref(), Some("enum_users_home_status"));
        assert_eq!(
            c.foreign_key.as_ref().map(|fk| fk.name.as_str()),
            Some("fk_users_home_status")
        );
        assert_eq!(c.owner, "Address");
    }

    #[test]
    fn test_primary_implies_not_null() {
        let mut d = decl("id", "SERIAL");
        d.primary = true;
        assert!(!d.place("t", "").nullable);
        assert!(decl("x", "TEXT").place("t", "").nullable);
    }

    #[test]
    fn test_explicit_foreign_key_name_kept() {
        let mut d = decl("owner_id", "INTEGER");
        d.foreign = Some(Reference::new("users", "id"));
        d.foreign_key_name = Some("owner_fk".to_string());
        let c = d.place("items", "");
        assert_eq!(c.foreign_key.map(|fk| fk.name), Some("owner_fk".to_string()));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!("inline".parse::<EmbedMode>().unwrap(), EmbedMode::Inline);
        assert_eq!("JSON".parse::<EmbedMode>().unwrap(), EmbedMode::Json);
        assert_eq!("relation".parse::<EmbedMode>().unwrap(), EmbedMode::Relation);
        assert!("merge".parse::<EmbedMode>().is_err());
    }

    #[test]
    fn test_json_column_defaults() {
        let c = embed(EmbedMode::Json).json_column();
        assert_eq!(c.name, "address_data");
        assert_eq!(c.sql_type, "JSONB");
        assert!(c.nullable);
    }

    #[test]
    fn test_relation_column() {
        let mut e = embed(EmbedMode::Relation);
        assert!(e.relation_column("orders").is_none());

        e.field = Some("address_id".to_string());
        e.reference = Some(Reference::new("addresses", "id"));
        e.on_delete = Some("SET NULL".to_string());
        e.not_null = true;

        let c = e.relation_column("orders").unwrap();
        assert_eq!(c.name, "address_id");
        assert_eq!(c.sql_type, "INTEGER");
        assert!(!c.nullable);
        let fk = c.foreign_key.unwrap();
        assert_eq!(fk.name, "fk_orders_address_id");
        assert_eq!(fk.references.table, "addresses");
        assert_eq!(fk.on_delete.as_deref(), Some("SET NULL"));
    }
}
