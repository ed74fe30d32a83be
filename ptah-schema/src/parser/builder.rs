//! Two-pass schema model construction.
//!
//! Pass one ([`Collector::collect`]) records tables, field declarations,
//! indexes and embed groups from every scanned file. Pass two
//! ([`Collector::build`]) places fields into tables and resolves embedding
//! directives against the complete set of embed groups, so the order files
//! are scanned in does not matter.

use indexmap::IndexMap;
use tracing::debug;

use super::directive::{AttributeBag, Directive, DirectiveKind};
use super::scanner::ScannedStruct;
use crate::ast::{
    EmbedDecl, EmbedMode, EmbeddedGroup, EnumType, FieldDecl, Index, SchemaModel, Table,
};
use crate::error::{SchemaDiagnostic, SchemaError, SchemaResult};

/// Where a declaration came from.
#[derive(Debug, Clone)]
struct Origin {
    file: String,
    line: usize,
}

/// A table with the members of the struct that declared it.
#[derive(Debug, Clone)]
struct TableDecl {
    table: Table,
    members: Vec<Member>,
    origin: Origin,
}

#[derive(Debug, Clone)]
struct IndexDecl {
    index: Index,
    origin: Origin,
}

#[derive(Debug, Clone)]
enum Member {
    Field(FieldDecl),
    Embedded(EmbedDecl, Origin),
}

/// Declarations gathered across all files.
#[derive(Debug, Default)]
pub(crate) struct Collector {
    tables: IndexMap<String, TableDecl>,
    indexes: Vec<IndexDecl>,
    groups: IndexMap<String, EmbeddedGroup>,
    diagnostics: Vec<SchemaDiagnostic>,
}

impl Collector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn report(&mut self, origin: &Origin, error: SchemaError) {
        tracing::warn!(file = %origin.file, line = origin.line, "{error}");
        self.diagnostics
            .push(SchemaDiagnostic::new(&origin.file, origin.line, error));
    }

    /// Pass one: record the declarations of one file.
    pub(crate) fn collect(&mut self, file: &str, structs: Vec<ScannedStruct>) {
        for s in structs {
            let origin = |line: usize| Origin {
                file: file.to_string(),
                line,
            };

            let mut declared: Option<(Table, Origin)> = None;
            let mut is_group = false;
            let mut index_directives: Vec<&Directive> = Vec::new();

            for directive in &s.directives {
                let at = origin(directive.line);
                match directive.kind {
                    DirectiveKind::Table => {
                        if declared.is_some() {
                            self.report(
                                &at,
                                SchemaError::invalid_directive("table", "struct already declares a table"),
                            );
                            continue;
                        }
                        match table_decl(&s.name, &directive.attrs) {
                            Ok(table) => declared = Some((table, at)),
                            Err(e) => self.report(&at, e),
                        }
                    }
                    DirectiveKind::Embed => is_group = true,
                    DirectiveKind::Index => index_directives.push(directive),
                    DirectiveKind::Field | DirectiveKind::Embedded => self.report(
                        &at,
                        SchemaError::invalid_directive(
                            directive.kind.as_str(),
                            "belongs on a struct field, not on a struct",
                        ),
                    ),
                }
            }

            for directive in index_directives {
                let at = origin(directive.line);
                let Some(table) = declared.as_ref().map(|(t, _)| t.name.clone()) else {
                    self.report(
                        &at,
                        SchemaError::invalid_directive("index", "struct has no `schema:table` directive"),
                    );
                    continue;
                };
                match index_decl(&table, &directive.attrs) {
                    Ok(index) => self.indexes.push(IndexDecl { index, origin: at }),
                    Err(e) => self.report(&at, e),
                }
            }

            let mut members = Vec::new();
            for field in &s.fields {
                for directive in &field.directives {
                    let at = origin(directive.line);
                    let result = match directive.kind {
                        DirectiveKind::Field => {
                            field_decl(&s.name, &directive.attrs).map(Member::Field)
                        }
                        DirectiveKind::Embedded => embed_decl(
                            field.ident.as_deref().unwrap_or("embedded"),
                            field.type_name.as_deref(),
                            &directive.attrs,
                        )
                        .map(|decl| Member::Embedded(decl, at.clone())),
                        other => Err(SchemaError::invalid_directive(
                            other.as_str(),
                            "belongs on a struct, not on a field",
                        )),
                    };
                    match result {
                        Ok(member) => members.push(member),
                        Err(e) => self.report(&at, e),
                    }
                }
            }

            if is_group {
                self.collect_group(&s.name, origin(s.line), &members);
            }

            if let Some((table, at)) = declared {
                if self.tables.contains_key(&table.name) {
                    debug!(table = %table.name, file, "ignoring duplicate table declaration");
                } else {
                    self.tables.insert(
                        table.name.clone(),
                        TableDecl {
                            table,
                            members,
                            origin: at,
                        },
                    );
                }
            }
        }
    }

    /// Record an embed group. Groups are referenced by type name, so a second
    /// group with the same name is reported and ignored.
    fn collect_group(&mut self, name: &str, at: Origin, members: &[Member]) {
        if self.groups.contains_key(name) {
            self.report(&at, SchemaError::duplicate("embed group", name));
            return;
        }
        let mut fields = Vec::new();
        for member in members {
            match member {
                Member::Field(f) => fields.push(f.clone()),
                Member::Embedded(embed, origin) => self.report(
                    origin,
                    SchemaError::invalid_directive(
                        "embedded",
                        format!("embed group `{name}` cannot embed `{}`; nesting is not supported", embed.group),
                    ),
                ),
            }
        }
        self.groups.insert(
            name.to_string(),
            EmbeddedGroup {
                name: name.to_string(),
                fields,
            },
        );
    }

    /// Pass two: build the model.
    pub(crate) fn build(mut self) -> (SchemaModel, Vec<SchemaDiagnostic>) {
        let mut model = SchemaModel::new();
        model.embedded = self.groups.clone();

        let tables: Vec<TableDecl> = self.tables.values().cloned().collect();
        for decl in tables {
            let mut table = decl.table;
            for member in decl.members {
                match member {
                    Member::Field(field) => place_field(&mut table, &field, ""),
                    Member::Embedded(embed, origin) => self.splice(&mut table, &embed, &origin),
                }
            }

            for column in &table.columns {
                if let Some(enum_name) = &column.enum_name {
                    if !model.add_enum(EnumType::new(enum_name.clone(), column.enum_values.clone())) {
                        debug!(name = %enum_name, "ignoring duplicate enum");
                    }
                }
            }
            if table.columns.is_empty() {
                debug!(table = %table.name, origin = %decl.origin.file, "table has no columns");
            }
            model.add_table(table);
        }

        let indexes = std::mem::take(&mut self.indexes);
        for decl in indexes {
            if let Some(table) = model.tables.get(&decl.index.table) {
                let unknown: Vec<String> = decl
                    .index
                    .columns
                    .iter()
                    .filter(|c| table.column(c).is_none())
                    .cloned()
                    .collect();
                if !unknown.is_empty() {
                    for column in unknown {
                        self.report(
                            &decl.origin,
                            SchemaError::UnknownColumn {
                                index: decl.index.name.clone(),
                                column,
                            },
                        );
                    }
                    continue;
                }
            }
            let name = decl.index.name.clone();
            if !model.add_index(decl.index) {
                debug!(index = %name, "ignoring duplicate index");
            }
        }

        let implicit: Vec<Index> = model
            .tables
            .values()
            .flat_map(|t| {
                t.columns
                    .iter()
                    .filter(|c| c.indexed)
                    .map(|c| Index::new(Index::implicit_name(&t.name, &c.name), &t.name, [&c.name]))
            })
            .collect();
        for index in implicit {
            model.add_index(index);
        }

        (model, self.diagnostics)
    }

    fn splice(&mut self, table: &mut Table, embed: &EmbedDecl, origin: &Origin) {
        match embed.mode {
            EmbedMode::Inline => {
                let Some(group) = self.groups.get(&embed.group).cloned() else {
                    self.report(
                        origin,
                        SchemaError::UnknownEmbed {
                            group: embed.group.clone(),
                            table: table.name.clone(),
                        },
                    );
                    return;
                };
                let prefix = embed.prefix.clone().unwrap_or_default();
                for field in &group.fields {
                    place_field(table, field, &prefix);
                }
            }
            EmbedMode::Json => {
                if !table.add_column(embed.json_column()) {
                    debug!(table = %table.name, "ignoring duplicate json column");
                }
            }
            EmbedMode::Relation => match embed.relation_column(&table.name) {
                Some(column) => {
                    table.add_column(column);
                }
                None => self.report(
                    origin,
                    SchemaError::invalid_directive("embedded", "relation mode needs `field` and `ref`"),
                ),
            },
        }
    }
}

fn place_field(table: &mut Table, field: &FieldDecl, prefix: &str) {
    let column = field.place(&table.name, prefix);
    let name = column.name.clone();
    if !table.add_column(column) {
        debug!(table = %table.name, column = %name, "ignoring duplicate column");
    }
}

fn table_decl(type_name: &str, attrs: &AttributeBag) -> SchemaResult<Table> {
    let mut table = Table::new(attrs.require("name")?, type_name);
    table.comment = attrs.string("comment");
    table.overrides = attrs.overrides();
    Ok(table)
}

fn index_decl(table: &str, attrs: &AttributeBag) -> SchemaResult<Index> {
    let name = attrs.require("name")?;
    let columns = attrs.list("fields");
    if columns.is_empty() {
        return Err(SchemaError::missing("index", "fields"));
    }
    let mut index = Index::new(name, table, columns);
    index.unique = attrs.flag("unique")?;
    index.method = attrs.string("type");
    index.condition = attrs.string("condition");
    index.overrides = attrs.overrides();
    Ok(index)
}

fn field_decl(owner: &str, attrs: &AttributeBag) -> SchemaResult<FieldDecl> {
    let decl = FieldDecl {
        name: attrs.require("name")?,
        owner: owner.to_string(),
        sql_type: attrs.require("type")?,
        not_null: attrs.flag("not_null")?,
        primary: attrs.flag("primary")?,
        unique: attrs.flag("unique")?,
        index: attrs.flag("index")?,
        default: attrs.string("default"),
        default_fn: attrs.string("default_fn"),
        check: attrs.string("check"),
        enum_values: attrs.list("enum"),
        foreign: attrs.reference("foreign")?,
        foreign_key_name: attrs.string("foreign_key_name"),
        on_delete: attrs.string("on_delete"),
        comment: attrs.string("comment"),
        overrides: attrs.overrides(),
    };
    if decl.is_enum() && decl.enum_values.is_empty() {
        return Err(SchemaError::missing("field", "enum"));
    }
    Ok(decl)
}

fn embed_decl(field_name: &str, type_name: Option<&str>, attrs: &AttributeBag) -> SchemaResult<EmbedDecl> {
    let mode = attrs.require("mode")?.parse::<EmbedMode>()?;
    let decl = EmbedDecl {
        mode,
        group: type_name.unwrap_or(field_name).to_string(),
        field_name: field_name.to_string(),
        name: attrs.string("name"),
        sql_type: attrs.string("type"),
        prefix: attrs.string("prefix"),
        field: attrs.string("field"),
        reference: attrs.reference("ref")?,
        on_delete: attrs.string("on_delete"),
        not_null: attrs.flag("not_null")?,
        comment: attrs.string("comment"),
        overrides: attrs.overrides(),
    };
    if mode == EmbedMode::Relation {
        if decl.field.is_none() {
            return Err(SchemaError::missing("embedded", "field"));
        }
        if decl.reference.is_none() {
            return Err(SchemaError::missing("embedded", "ref"));
        }
    }
    Ok(decl)
}
