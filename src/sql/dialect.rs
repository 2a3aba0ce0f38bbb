//! The two SQL dialects the generator targets. The handler trait carries the
//! pure spellings — JSON builders, parameter placeholders, the plural
//! aggregation line — so a dialect quirk lives here and nowhere else;
//! emission sites that differ structurally (row-to-JSON shape, cursor CTE,
//! JSON table expansion, full text) match on the dialect directly.

use serde::{Deserialize, Serialize};

use super::writer::Writer;

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    MySql,
}

impl Dialect {
    pub(crate) fn handler(&self) -> &'static dyn DialectHandler {
        match self {
            Dialect::Postgres => &PostgresDialect,
            Dialect::MySql => &MySqlDialect,
        }
    }
}

pub(crate) trait DialectHandler: std::fmt::Debug {
    /// Builder for the top-level JSON object.
    fn json_build_object(&self) -> &'static str {
        "jsonb_build_object"
    }

    /// Positional parameter placeholder for the given 1-based slot.
    fn param(&self, w: &mut Writer, slot: usize) {
        w.push("$");
        w.int(slot);
    }

    /// The aggregation line that turns per-row JSON into an array, with an
    /// empty array rather than NULL when no rows match.
    fn plural_agg(&self, w: &mut Writer, id: usize) {
        w.push("SELECT COALESCE(jsonb_agg(__sj_");
        w.int(id);
        w.push(".json), '[]') AS json");
    }

    /// Clause excluding the anchor row when selecting from a recursive CTE.
    fn recursive_anchor_skip(&self) -> &'static str {
        " OFFSET 1) "
    }

    fn supports_distinct_on(&self) -> bool {
        true
    }
}

#[derive(Debug)]
pub(crate) struct PostgresDialect;

#[derive(Debug)]
pub(crate) struct MySqlDialect;

impl DialectHandler for PostgresDialect {}

impl DialectHandler for MySqlDialect {
    fn json_build_object(&self) -> &'static str {
        "json_object"
    }

    fn param(&self, w: &mut Writer, _slot: usize) {
        w.push("?");
    }

    fn plural_agg(&self, w: &mut Writer, id: usize) {
        w.push("SELECT CAST(COALESCE(json_arrayagg(__sj_");
        w.int(id);
        w.push(".json), '[]') AS JSON) AS json");
    }

    fn recursive_anchor_skip(&self) -> &'static str {
        // MySQL has no bare OFFSET; the huge limit is the documented idiom.
        " LIMIT 1, 18446744073709551610) "
    }

    fn supports_distinct_on(&self) -> bool {
        false
    }
}
