//! The SQL code generator: lowers a [QCode] into a single parameterized
//! statement whose one result row carries the whole response as a JSON
//! document shaped exactly like the query.

mod context;
mod dialect;
mod gen_expr;
mod gen_query;
mod gen_rel;
mod params;
mod writer;

use std::collections::HashMap;

use anyhow::Result;

use crate::error::Error;
use crate::qcode::{QCode, QueryType};

use context::Context;

pub use dialect::Dialect;
pub use params::{Metadata, Param};

#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Static variables substituted in place of bound parameters; a value
    /// prefixed with `sql:` is spliced in as a raw SQL fragment.
    pub vars: HashMap<String, String>,
    pub db_type: Dialect,
    pub db_version: u32,
}

/// The compiler itself: immutable after construction, shareable by any
/// number of concurrent callers. Each compile owns its own buffer and
/// parameter list.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    pub(crate) vars: HashMap<String, String>,
    pub(crate) dialect: Dialect,
    pub(crate) db_version: u32,
}

impl Compiler {
    pub fn new(config: Config) -> Self {
        Compiler {
            vars: config.vars,
            dialect: config.db_type,
            db_version: config.db_version,
        }
    }

    /// Compiles a query or subscription into `(metadata, sql)`. The
    /// transformation is pure: same input, byte-identical output.
    pub fn compile(&self, qc: &QCode) -> Result<(Metadata, String)> {
        match qc.qtype {
            QueryType::Query | QueryType::Subscription => {
                let mut ctx = Context::new(self, qc, qc.qtype == QueryType::Subscription);
                ctx.compile_query()?;
                Ok(ctx.finish())
            }
            QueryType::Mutation => Err(Error::UnknownOperation(qc.qtype.to_string()).into()),
        }
    }
}
