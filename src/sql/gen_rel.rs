//! Join predicates linking a child selection to its parent, the extra joins
//! a selection carries (junction tables), and the recursive CTE emitted for
//! self-referential relations.

use anyhow::{anyhow, Result};

use crate::qcode::{Exp, ExpVal, Selection};
use crate::schema::{RelKind, Relation};

use super::context::Context;
use super::params::Param;

impl Context<'_> {
    /// The equality tying `rel.left` to `rel.right`, with the right side
    /// qualified by the parent's instance id. `pid = None` refers to the
    /// bare inner alias (a table joined in the same scope). When exactly one
    /// side is an array column the spelling becomes `= any`.
    pub(super) fn render_rel(
        &mut self,
        rel: &Relation,
        pid: Option<usize>,
        args: Option<&std::collections::BTreeMap<String, Exp>>,
    ) {
        self.w.push("((");
        match rel.kind {
            RelKind::OneToOne | RelKind::OneToMany | RelKind::ManyToMany => {
                if let Some(arg) = args.and_then(|a| a.get(&rel.right.col.name)) {
                    self.w.col(&rel.left.table, &rel.left.col.name);
                    self.w.push(") = (");
                    self.render_rel_arg(rel, arg);
                } else if rel.left.col.is_array && !rel.right.col.is_array {
                    self.w
                        .col_with_id(&rel.right.table, pid, &rel.right.col.name);
                    self.w.push(") = any (");
                    self.w.col(&rel.left.table, &rel.left.col.name);
                } else if !rel.left.col.is_array && rel.right.col.is_array {
                    self.w.col(&rel.left.table, &rel.left.col.name);
                    self.w.push(") = any (");
                    self.w
                        .col_with_id(&rel.right.table, pid, &rel.right.col.name);
                } else {
                    self.w.col(&rel.left.table, &rel.left.col.name);
                    self.w.push(") = (");
                    self.w
                        .col_with_id(&rel.right.table, pid, &rel.right.col.name);
                }
            }
            RelKind::Embedded => {
                // Re-select the parent row by comparing the JSON column with
                // the outer instance's copy of it.
                self.w.col(&rel.left.table, &rel.left.col.name);
                self.w.push(") = (");
                self.w
                    .col_with_id(&rel.left.table, pid, &rel.left.col.name);
            }
            RelKind::Recursive => {
                let rcte = format!("_rcte_{}", rel.right.table);
                self.w.col(&rel.left.table, &rel.left.col.name);
                self.w.push(") = (");
                self.w.col(&rcte, &rel.right.col.name);
            }
        }
        self.w.push("))");
    }

    fn render_rel_arg(&mut self, rel: &Relation, arg: &Exp) {
        match &arg.val {
            ExpVal::Var(name) => self.render_param(Param {
                name: name.clone(),
                sql_type: rel.right.col.sql_type.clone(),
                is_array: rel.right.col.is_array,
            }),
            ExpVal::Lit(v) => self.w.squoted(v),
            ExpVal::Ref(table, col) => self.w.col(table, &col.name),
            _ => self.w.push("NULL"),
        }
    }

    pub(super) fn render_join_tables(&mut self, sel: &Selection) {
        for (i, rel) in sel.joins.iter().enumerate() {
            let pid = if i == 0 { sel.parent_id } else { None };
            self.render_join(rel, pid);
        }
    }

    pub(super) fn render_join(&mut self, rel: &Relation, pid: Option<usize>) {
        self.w.push(" LEFT OUTER JOIN ");
        self.w.quoted(&rel.left.table);
        self.w.push(" ON (");
        self.render_rel(rel, pid, None);
        self.w.push(")");
    }

    pub(super) fn render_recursive_cte(&mut self, sel: &Selection) -> Result<()> {
        let rel = sel
            .rel
            .as_ref()
            .ok_or_else(|| anyhow!("recursive selection without a relation"))?;
        let rcte = format!("_rcte_{}", rel.right.table);
        self.w.push("WITH RECURSIVE ");
        self.w.quoted(&rcte);
        self.w.push(" AS (");
        self.render_recursive_base_select(sel, &rcte)?;
        self.w.push(") ");
        Ok(())
    }

    /// The anchor row (the parent itself, matched on its primary key) union
    /// the recursive step joining back onto the CTE.
    fn render_recursive_base_select(&mut self, sel: &Selection, rcte: &str) -> Result<()> {
        let qc = self.qc;
        let psel = sel
            .parent_id
            .map(|pid| &qc.selects[pid])
            .ok_or_else(|| anyhow!("recursive selection without a parent"))?;
        let pk = sel
            .ti
            .primary_col
            .as_ref()
            .ok_or_else(|| anyhow!("recursive relation on `{}` needs a primary key", sel.table))?;

        self.w.push("(SELECT ");
        self.render_base_columns(sel);
        self.render_from(psel);
        self.w.push(" WHERE (");
        self.w.col(&sel.table, &pk.name);
        self.w.push(") = (");
        self.w.col_with_id(&psel.table, Some(psel.id), &pk.name);
        self.w.push(") LIMIT 1) UNION ALL SELECT ");
        self.render_base_columns(sel);
        self.render_from(psel);
        self.w.push(", ");
        self.w.quoted(rcte);
        self.render_where(sel)?;
        Ok(())
    }
}
