//! Database metadata consumed by the compiler: tables, columns and the typed
//! edges between them. The schema provider resolves all of this before a
//! QCode is built; selections carry their own copies so a compile never has
//! to chase references.

use serde::{Deserialize, Serialize};

use crate::sql::Dialect;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub sql_type: String,
    pub is_array: bool,
}

impl Column {
    pub fn new(name: &str, sql_type: &str) -> Self {
        Column {
            name: name.to_string(),
            sql_type: sql_type.to_string(),
            is_array: false,
        }
    }
}

/// One table, with everything the generator needs to know about it. For
/// embedded relations `typ` holds the JSON column type (`json` or `jsonb`),
/// which picks the record-set function on Postgres.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    pub typ: String,
    pub columns: Vec<Column>,
    pub primary_col: Option<Column>,
    pub full_text: Vec<Column>,
}

impl TableInfo {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// One side of a relation: a column and the table it lives on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelCol {
    pub table: String,
    pub col: Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelKind {
    OneToOne,
    OneToMany,
    /// Through a junction table; the junction itself arrives as an entry in
    /// the selection's `joins`.
    ManyToMany,
    /// Child rows live inside a JSON column of the parent row.
    Embedded,
    /// Self-referential; compiled to a recursive CTE.
    Recursive,
}

/// A typed edge between two selections. `left` is the child side, `right`
/// the parent side (or the junction, for many-to-many).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelKind,
    pub left: RelCol,
    pub right: RelCol,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSchema {
    pub db_type: Dialect,
    pub version: u32,
    pub tables: Vec<TableInfo>,
}

impl DbSchema {
    pub fn table(&self, name: &str) -> Option<&TableInfo> {
        self.tables.iter().find(|t| t.name == name)
    }
}
