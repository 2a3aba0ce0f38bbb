//! Positional parameter recording. Parameters are numbered in first
//! appearance order; repeated uses of the same name share a slot, and the
//! runtime binder relies on that ordering, so nothing here may reorder.

use std::collections::HashMap;

use serde::Serialize;

use super::Dialect;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub sql_type: String,
    pub is_array: bool,
}

/// Everything the runtime needs besides the SQL text: the dialect the
/// statement was generated for, whether it should be polled (subscriptions),
/// and the ordered parameter vector.
#[derive(Debug, Default)]
pub struct Metadata {
    db_type: Dialect,
    poll: bool,
    params: Vec<Param>,
    pindex: HashMap<String, usize>,
}

impl Metadata {
    pub(crate) fn new(db_type: Dialect, poll: bool) -> Self {
        Metadata {
            db_type,
            poll,
            ..Default::default()
        }
    }

    pub fn db_type_hint(&self) -> Dialect {
        self.db_type
    }

    pub fn is_poll(&self) -> bool {
        self.poll
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// 1-based slot of a named parameter — the number that appears in `$N`.
    pub fn param_slot(&self, name: &str) -> Option<usize> {
        self.pindex.get(name).copied()
    }

    /// Records a parameter occurrence and returns its slot. A name already
    /// seen keeps its original slot regardless of the new type.
    pub(crate) fn record(&mut self, param: Param) -> usize {
        if let Some(&slot) = self.pindex.get(&param.name) {
            return slot;
        }
        self.params.push(param);
        let slot = self.params.len();
        self.pindex
            .insert(self.params[slot - 1].name.clone(), slot);
        slot
    }
}
