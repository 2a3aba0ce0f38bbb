//! The boolean expression tree behind a selection's `where` argument.

use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::schema::{Column, Relation};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
pub enum ExpOp {
    #[default]
    Nop,
    And,
    Or,
    Not,
    False,
    Equals,
    NotEquals,
    NotDistinct,
    Distinct,
    GreaterOrEquals,
    LesserOrEquals,
    GreaterThan,
    LesserThan,
    In,
    NotIn,
    Like,
    NotLike,
    ILike,
    NotILike,
    Similar,
    NotSimilar,
    Regex,
    NotRegex,
    IRegex,
    NotIRegex,
    Contains,
    ContainedIn,
    HasKey,
    HasKeyAny,
    HasKeyAll,
    EqualsTrue,
    NotEqualsTrue,
    IsNull,
    TsQuery,
}

/// How list literals are spelled: numbers and booleans go in bare, strings
/// single-quoted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValType {
    #[default]
    Str,
    Num,
    Bool,
}

/// The right-hand side of a comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, EnumAsInner)]
#[serde(rename_all = "snake_case")]
pub enum ExpVal {
    #[default]
    None,
    /// A literal, rendered single-quoted.
    Lit(String),
    /// A typed list literal.
    List(ValType, Vec<String>),
    /// A named variable, bound as a positional parameter unless the compiler
    /// was configured with a static value for it.
    Var(String),
    /// Another column, qualified by the given table.
    Ref(String, Column),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exp {
    pub op: ExpOp,
    /// Left-hand column, qualified with the enclosing selection's table
    /// unless `table` overrides it.
    pub col: Option<Column>,
    /// Overrides the qualifying table of `col`; cursor predicates use this
    /// to reference the `__cur` CTE.
    pub table: Option<String>,
    pub val: ExpVal,
    /// Operands of the logical connectives.
    pub children: Vec<Exp>,
    /// Relation chain for predicates over related tables, compiled to a
    /// nested EXISTS. The first relation correlates to the outer scope.
    pub rels: Vec<Relation>,
}
