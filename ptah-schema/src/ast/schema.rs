//! The top-level schema model.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{EmbeddedGroup, EnumType, Index, Table};
use crate::graph::{self, Resolution};

/// All tables, indexes, enums and embed groups found in one scan.
///
/// Maps preserve declaration order. Every map is keyed by name and the first
/// declaration of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub tables: IndexMap<String, Table>,
    pub indexes: IndexMap<String, Index>,
    pub enums: IndexMap<String, EnumType>,
    pub embedded: IndexMap<String, EmbeddedGroup>,
    /// Table name to the tables it references, including itself when
    /// self-referencing.
    pub dependencies: IndexMap<String, Vec<String>>,
}

impl SchemaModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, recording its dependencies. Returns `false` for a duplicate.
    pub fn add_table(&mut self, table: Table) -> bool {
        if self.tables.contains_key(&table.name) {
            return false;
        }
        self.dependencies
            .insert(table.name.clone(), table.dependencies());
        self.tables.insert(table.name.clone(), table);
        true
    }

    /// Add an index. Returns `false` for a duplicate.
    pub fn add_index(&mut self, index: Index) -> bool {
        if self.indexes.contains_key(&index.name) {
            return false;
        }
        self.indexes.insert(index.name.clone(), index);
        true
    }

    /// Add an enum. Returns `false` for a duplicate.
    pub fn add_enum(&mut self, e: EnumType) -> bool {
        if self.enums.contains_key(&e.name) {
            return false;
        }
        self.enums.insert(e.name.clone(), e);
        true
    }

    /// Get a table by name.
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Indexes declared on a table, in declaration order.
    pub fn indexes_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Index> {
        self.indexes.values().filter(move |i| i.table == table)
    }

    /// Enums used by a table's columns, in column order.
    pub fn enums_for(&self, table: &Table) -> Vec<&EnumType> {
        table
            .columns
            .iter()
            .filter_map(|c| c.enum_name.as_deref())
            .filter_map(|name| self.enums.get(name))
            .collect()
    }

    /// Order tables by foreign key dependency.
    pub fn resolve(&self) -> Resolution {
        graph::resolve(self.tables.keys().map(String::as_str), &self.dependencies)
    }

    /// Tables in dependency order.
    pub fn ordered_tables(&self) -> Vec<&Table> {
        self.resolve()
            .order
            .iter()
            .filter_map(|name| self.tables.get(name))
            .collect()
    }

    /// Whether the model declares nothing.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.indexes.is_empty() && self.enums.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Column, ForeignKey, PlatformOverrides, Reference};

    fn fk_column(name: &str, target: &str) -> Column {
        Column {
            name: name.to_string(),
            owner: "T".to_string(),
            sql_type: "INTEGER".to_string(),
            nullable: true,
            primary: false,
            unique: false,
            indexed: false,
            default: None,
            default_fn: None,
            check: None,
            enum_name: None,
            enum_values: vec![],
            foreign_key: Some(ForeignKey {
                name: format!("fk_{name}"),
                references: Reference::new(target, "id"),
                on_delete: None,
            }),
            comment: None,
            overrides: PlatformOverrides::new(),
        }
    }

    #[test]
    fn test_add_table_records_dependencies() {
        let mut model = SchemaModel::new();
        let mut posts = Table::new("posts", "Post");
        posts.add_column(fk_column("author_id", "users"));

        assert!(model.add_table(posts));
        assert!(model.add_table(Table::new("users", "User")));
        assert!(!model.add_table(Table::new("users", "Account")));

        assert_eq!(model.dependencies["posts"], vec!["users"]);
        assert_eq!(model.tables["users"].type_name, "User");
    }

    #[test]
    fn test_ordered_tables() {
        let mut model = SchemaModel::new();
        let mut posts = Table::new("posts", "Post");
        posts.add_column(fk_column("author_id", "users"));
        model.add_table(posts);
        model.add_table(Table::new("users", "User"));

        let names: Vec<_> = model.ordered_tables().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["users", "posts"]);
    }
}
