//! Per-compile state. A [Context] owns the output buffer and the parameter
//! recorder and borrows everything else; one is created per `compile` call,
//! so a [super::Compiler] can be shared freely across threads.

use std::collections::HashMap;

use crate::qcode::QCode;

use super::dialect::{Dialect, DialectHandler};
use super::params::{Metadata, Param};
use super::writer::Writer;
use super::Compiler;

pub(super) struct Context<'a> {
    pub(super) w: Writer,
    pub(super) md: Metadata,
    pub(super) qc: &'a QCode,
    pub(super) vars: &'a HashMap<String, String>,
    pub(super) dialect: Dialect,
    pub(super) handler: &'static dyn DialectHandler,
    pub(super) db_version: u32,
}

impl<'a> Context<'a> {
    pub(super) fn new(compiler: &'a Compiler, qc: &'a QCode, poll: bool) -> Self {
        Context {
            w: Writer::new(),
            md: Metadata::new(qc.schema.db_type, poll),
            qc,
            vars: &compiler.vars,
            dialect: compiler.dialect,
            handler: compiler.dialect.handler(),
            db_version: compiler.db_version,
        }
    }

    /// Records the parameter and writes its dialect placeholder.
    pub(super) fn render_param(&mut self, param: Param) {
        let slot = self.md.record(param);
        self.handler.param(&mut self.w, slot);
    }

    pub(super) fn finish(self) -> (Metadata, String) {
        (self.md, self.w.into_string())
    }
}
