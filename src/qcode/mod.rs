//! The typed, resolved query tree the compiler consumes. A QCode is produced
//! by the upstream resolver: argument presence has been validated, relations
//! resolved, selection ids densely assigned. The compiler trusts all of it.

mod expr;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::schema::{Column, DbSchema, Relation, TableInfo};

pub use expr::{Exp, ExpOp, ExpVal, ValType};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    #[default]
    Query,
    Subscription,
    Mutation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelType {
    #[default]
    Normal,
    /// Emits no wrapper of its own; its Member children each emit a full
    /// sub-select against a different concrete type.
    Union,
    Member,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipType {
    #[default]
    None,
    /// Required arguments were not provided: the field is emitted as a
    /// literal NULL and no sub-select is scheduled.
    UserNeeded,
    /// The selection is dropped entirely.
    Remove,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDir {
    #[default]
    Asc,
    Desc,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub col: Column,
    pub dir: OrderDir,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    pub limit: u32,
    pub offset: u32,
    pub limit_var: Option<String>,
    pub offset_var: Option<String>,
    /// Cursor pagination; requires a non-empty `order_by` and widens the row
    /// projection with one `__cur_<i>` column per ordering key.
    pub cursor: bool,
    pub no_limit: bool,
}

/// One output JSON field: the column it reads and the key it appears under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub col: Column,
    pub name: String,
}

/// A node in the selection tree: one GraphQL field returning a row or rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub id: usize,
    pub parent_id: Option<usize>,
    /// JSON key under which this selection's value appears in its parent.
    pub field_name: String,
    pub table: String,
    pub ti: TableInfo,
    pub sel_type: SelType,
    /// None for roots; every non-root selection has a relation.
    pub rel: Option<Relation>,
    pub children: Vec<usize>,
    /// At most one row; no array aggregation.
    pub singular: bool,
    pub fields: Vec<Field>,
    /// Columns the base select provides: the fields' columns plus whatever
    /// ordering and relations need.
    pub bcols: Vec<Column>,
    pub group_cols: bool,
    pub distinct_on: Vec<Column>,
    pub order_by: Vec<OrderBy>,
    pub paging: Paging,
    pub filter: Option<Exp>,
    /// Extra join links, e.g. the junction table of a many-to-many edge.
    pub joins: Vec<Relation>,
    /// Relation arguments: an entry keyed by the relation's right-hand
    /// column replaces the parent-column side of the join predicate.
    pub arg_map: BTreeMap<String, Exp>,
    pub skip_render: SkipType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QCode {
    pub qtype: QueryType,
    pub schema: DbSchema,
    /// Top-level fields of the result JSON, in source order.
    pub roots: Vec<usize>,
    /// Dense array indexed by selection id.
    pub selects: Vec<Selection>,
}
