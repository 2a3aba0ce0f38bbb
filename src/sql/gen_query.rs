//! The selection-tree walk and everything it emits: the top-level JSON
//! object, one lateral sub-select per selection (aggregation wrapper,
//! row-to-JSON wrapper, output projection, base select), cursor plumbing,
//! ordering, grouping and paging.
//!
//! The walk is iterative. Opening a selection emits everything up to and
//! including its base select and schedules its children; closing emits the
//! matching aliases in reverse. An explicit stack of [Frame]s keeps deep
//! query trees off the call stack and makes the open/close symmetry visible.

use anyhow::Result;
use itertools::Itertools;

use crate::qcode::{OrderDir, SelType, Selection, SkipType};
use crate::schema::{RelKind, Relation};

use super::context::Context;
use super::params::Param;
use super::Dialect;

/// One scheduled traversal event for a selection id.
enum Frame {
    Open(usize),
    Close(usize),
}

impl Context<'_> {
    pub(super) fn compile_query(&mut self) -> Result<()> {
        let qc = self.qc;
        log::debug!(
            "compiling {} selections across {} roots for {}",
            qc.selects.len(),
            qc.roots.len(),
            self.dialect
        );

        self.w.push("SELECT ");
        self.w.push(self.handler.json_build_object());
        self.w.push("(");

        let mut scheduled = Vec::with_capacity(qc.roots.len());
        let mut i = 0;
        for &id in &qc.roots {
            let sel = &qc.selects[id];
            if sel.skip_render == SkipType::Remove {
                continue;
            }
            if i != 0 {
                self.w.push(", ");
            }
            self.w.squoted(&sel.field_name);
            if sel.skip_render == SkipType::UserNeeded {
                self.w.push(", NULL");
                if sel.paging.cursor {
                    self.w.push(", ");
                    self.w.squoted(&format!("{}_cursor", sel.field_name));
                    self.w.push(", NULL");
                }
            } else {
                self.w.push(", __sj_");
                self.w.int(sel.id);
                self.w.push(".json");
                if sel.paging.cursor {
                    self.w.push(", ");
                    self.w.squoted(&format!("{}_cursor", sel.field_name));
                    self.w.push(", __sj_");
                    self.w.int(sel.id);
                    self.w.push(".__cursor");
                }
                scheduled.push(sel.id);
            }
            i += 1;
        }

        // The constant sub-query guarantees exactly one outer row, so an
        // empty result is still a JSON document with nulls, not zero rows.
        self.w.push(") AS __root FROM ((SELECT true)) AS __root_x");

        let mut stack = Vec::with_capacity(scheduled.len() * 2);
        for &id in scheduled.iter().rev() {
            stack.push(Frame::Close(id));
            stack.push(Frame::Open(id));
        }
        self.render_query(stack)
    }

    fn render_query(&mut self, mut stack: Vec<Frame>) -> Result<()> {
        let qc = self.qc;
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Open(id) => {
                    let sel = &qc.selects[id];
                    // Union selections emit no wrapper of their own; their
                    // members each produce a full sub-select.
                    if sel.sel_type != SelType::Union {
                        self.render_lateral_join();
                        if matches!(&sel.rel, Some(rel) if rel.kind == RelKind::Recursive) {
                            self.render_recursive_cte(sel)?;
                        }
                        self.render_plural_select(sel);
                        self.render_select(sel)?;
                    }
                    for &cid in sel.children.iter().rev() {
                        if qc.selects[cid].skip_render != SkipType::None {
                            continue;
                        }
                        stack.push(Frame::Close(cid));
                        stack.push(Frame::Open(cid));
                    }
                }
                Frame::Close(id) => {
                    let sel = &qc.selects[id];
                    if sel.sel_type != SelType::Union {
                        self.render_select_close(sel);
                        self.render_lateral_join_close(sel);
                    }
                }
            }
        }
        Ok(())
    }

    fn render_lateral_join(&mut self) {
        self.w.push(" LEFT OUTER JOIN LATERAL (");
    }

    fn render_lateral_join_close(&mut self, sel: &Selection) {
        self.w.push(")");
        self.w.alias_with_id("__sj", sel.id);
        self.w.push(" ON true");
    }

    /// The aggregation layer turning per-row JSON into an array, plus the
    /// concatenated cursor of the page's last row.
    fn render_plural_select(&mut self, sel: &Selection) {
        if sel.singular {
            return;
        }
        self.handler.plural_agg(&mut self.w, sel.id);

        if sel.paging.cursor {
            self.w.push(", CONCAT_WS(','");
            for i in 0..sel.order_by.len() {
                self.w.push(", max(__cur_");
                self.w.int(i);
                self.w.push(")");
            }
            self.w.push(") AS __cursor");
        }

        self.w.push(" FROM (");
    }

    fn render_select(&mut self, sel: &Selection) -> Result<()> {
        match self.dialect {
            Dialect::MySql => {
                self.w.push("SELECT json_object(");
                self.render_json_fields(sel);
                self.w.push(") AS json");
            }
            Dialect::Postgres => {
                self.w.push("SELECT to_jsonb(__sr_");
                self.w.int(sel.id);
                self.w.push(".*)");
                // The cursor scratch columns feed CONCAT_WS above and are
                // subtracted from the row's JSON.
                if sel.paging.cursor {
                    for i in 0..sel.order_by.len() {
                        self.w.push(" - '__cur_");
                        self.w.int(i);
                        self.w.push("'");
                    }
                }
                self.w.push(" AS json");
            }
        }
        if sel.paging.cursor {
            for i in 0..sel.order_by.len() {
                self.w.push(", __cur_");
                self.w.int(i);
            }
        }

        self.w.push(" FROM (SELECT ");
        self.render_columns(sel);
        if sel.paging.cursor {
            for (i, ob) in sel.order_by.iter().enumerate() {
                self.w.push(", LAST_VALUE(");
                self.w.col_with_id(&sel.table, Some(sel.id), &ob.col.name);
                self.w.push(") OVER() AS __cur_");
                self.w.int(i);
            }
        }
        self.w.push(" FROM (");
        self.render_base_select(sel)?;
        self.w.push(")");
        self.w.alias_with_id(&sel.table, sel.id);
        Ok(())
    }

    fn render_select_close(&mut self, sel: &Selection) {
        self.w.push(")");
        self.w.alias_with_id("__sr", sel.id);
        if !sel.singular {
            self.w.push(")");
            self.w.alias_with_id("__sj", sel.id);
        }
    }

    /// The output projection: selected columns under their field names plus
    /// one json column per rendered child.
    fn render_columns(&mut self, sel: &Selection) {
        let mut i = 0;
        for f in &sel.fields {
            if i != 0 {
                self.w.push(", ");
            }
            self.w.col_with_id(&sel.table, Some(sel.id), &f.col.name);
            self.w.alias(&f.name);
            i += 1;
        }
        self.render_join_columns(sel, i);
    }

    fn render_join_columns(&mut self, sel: &Selection, mut i: usize) {
        let qc = self.qc;
        for &cid in &sel.children {
            let child = &qc.selects[cid];
            match child.skip_render {
                SkipType::Remove => continue,
                SkipType::UserNeeded => {
                    if i != 0 {
                        self.w.push(", ");
                    }
                    self.w.push("NULL");
                    self.w.alias(&child.field_name);
                    if child.paging.cursor {
                        self.w.push(", NULL");
                        self.w.alias(&format!("{}_cursor", child.field_name));
                    }
                    i += 1;
                }
                SkipType::None => {
                    if i != 0 {
                        self.w.push(", ");
                    }
                    if child.sel_type == SelType::Union {
                        let mut j = 0;
                        for &mid in &child.children {
                            let member = &qc.selects[mid];
                            if member.skip_render != SkipType::None {
                                continue;
                            }
                            if j != 0 {
                                self.w.push(", ");
                            }
                            self.w.col(&format!("__sj_{mid}"), "json");
                            self.w.alias(&member.field_name);
                            j += 1;
                        }
                    } else {
                        let sj = format!("__sj_{cid}");
                        self.w.col(&sj, "json");
                        self.w.alias(&child.field_name);
                        if child.paging.cursor {
                            self.w.push(", ");
                            self.w.col(&sj, "__cursor");
                            self.w.alias(&format!("{}_cursor", child.field_name));
                        }
                    }
                    i += 1;
                }
            }
        }
    }

    /// MySQL's row wrapper names every field explicitly instead of packing
    /// the whole row with `to_jsonb`; each pair reads the output projection
    /// below it by field name.
    fn render_json_fields(&mut self, sel: &Selection) {
        let qc = self.qc;
        let sr = format!("__sr_{}", sel.id);
        let mut i = 0;
        let pair = |w: &mut super::writer::Writer, name: &str, first: bool| {
            if !first {
                w.push(", ");
            }
            w.squoted(name);
            w.push(", ");
            w.col(&sr, name);
        };
        for f in &sel.fields {
            pair(&mut self.w, &f.name, i == 0);
            i += 1;
        }
        for &cid in &sel.children {
            let child = &qc.selects[cid];
            if child.skip_render == SkipType::Remove {
                continue;
            }
            if child.sel_type == SelType::Union && child.skip_render == SkipType::None {
                for &mid in &child.children {
                    let member = &qc.selects[mid];
                    if member.skip_render != SkipType::None {
                        continue;
                    }
                    pair(&mut self.w, &member.field_name, i == 0);
                    i += 1;
                }
                continue;
            }
            pair(&mut self.w, &child.field_name, i == 0);
            i += 1;
            if child.paging.cursor {
                pair(&mut self.w, &format!("{}_cursor", child.field_name), false);
            }
        }
    }

    fn render_base_select(&mut self, sel: &Selection) -> Result<()> {
        self.render_cursor_cte(sel);
        self.w.push("SELECT ");
        self.render_distinct_on(sel);
        self.render_base_columns(sel);
        self.render_from(sel);
        self.render_join_tables(sel);
        // The recursive base draws from the CTE; its predicates already ran
        // inside it.
        if !matches!(&sel.rel, Some(rel) if rel.kind == RelKind::Recursive) {
            self.render_where(sel)?;
        }
        self.render_group_by(sel);
        self.render_order_by(sel);
        self.render_limit(sel);
        Ok(())
    }

    pub(super) fn render_base_columns(&mut self, sel: &Selection) {
        for (i, col) in sel.bcols.iter().enumerate() {
            if i != 0 {
                self.w.push(", ");
            }
            self.w.col(&sel.table, &col.name);
        }
    }

    pub(super) fn render_from(&mut self, sel: &Selection) {
        self.w.push(" FROM ");
        match &sel.rel {
            Some(rel) if rel.kind == RelKind::Embedded => {
                self.w.quoted(&rel.left.table);
                self.w.push(", ");
                match self.dialect {
                    Dialect::MySql => self.render_json_table(sel, rel),
                    Dialect::Postgres => self.render_record_set(sel, rel),
                }
            }
            Some(rel) if rel.kind == RelKind::Recursive => {
                self.w.push("(SELECT * FROM ");
                self.w.quoted(&format!("_rcte_{}", rel.right.table));
                self.w.push(self.handler.recursive_anchor_skip());
                self.w.quoted(&sel.table);
            }
            _ => self.w.quoted(&sel.table),
        }
        if sel.paging.cursor {
            self.w.push(", __cur");
        }
    }

    fn render_record_set(&mut self, sel: &Selection, rel: &Relation) {
        self.w.push(&sel.ti.typ);
        self.w.push("_to_recordset(");
        self.w.col(&rel.left.table, &rel.left.col.name);
        self.w.push(") AS ");
        self.w.quoted(&sel.table);
        self.w.push("(");
        let cols = sel
            .ti
            .columns
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, c.sql_type))
            .join(", ");
        self.w.push(&cols);
        self.w.push(")");
    }

    fn render_json_table(&mut self, sel: &Selection, rel: &Relation) {
        self.w.push("JSON_TABLE(");
        self.w.col(&rel.left.table, &rel.left.col.name);
        self.w.push(", \"$[*]\" COLUMNS(");
        let cols = sel
            .ti
            .columns
            .iter()
            .map(|c| format!("{} {} PATH \"$.{}\" ERROR ON ERROR", c.name, c.sql_type, c.name))
            .join(", ");
        self.w.push(&cols);
        self.w.push(")) AS ");
        self.w.quoted(&sel.table);
    }

    /// Splits the opaque cursor string back into one typed column per
    /// ordering key, named after the key so cursor predicates can reference
    /// `"__cur"."<col>"`.
    fn render_cursor_cte(&mut self, sel: &Selection) {
        if !sel.paging.cursor {
            return;
        }
        self.w.push("WITH __cur AS (SELECT ");
        match self.dialect {
            Dialect::MySql => {
                for (i, ob) in sel.order_by.iter().enumerate() {
                    if i != 0 {
                        self.w.push(", ");
                    }
                    self.w.push("SUBSTRING_INDEX(SUBSTRING_INDEX(a.i, ',', ");
                    self.w.int(i + 1);
                    self.w.push("), ',', -1) AS ");
                    self.w.quoted(&ob.col.name);
                }
                self.w.push(" FROM ((SELECT ");
                self.render_param(Param {
                    name: "cursor".to_string(),
                    sql_type: "text".to_string(),
                    is_array: false,
                });
                self.w.push(" AS i)) as a) ");
            }
            Dialect::Postgres => {
                for (i, ob) in sel.order_by.iter().enumerate() {
                    if i != 0 {
                        self.w.push(", ");
                    }
                    self.w.push("a[");
                    self.w.int(i + 1);
                    self.w.push("] :: ");
                    self.w.push(&ob.col.sql_type);
                    self.w.push(" as ");
                    self.w.quoted(&ob.col.name);
                }
                self.w.push(" FROM string_to_array(");
                self.render_param(Param {
                    name: "cursor".to_string(),
                    sql_type: "text".to_string(),
                    is_array: false,
                });
                self.w.push(", ',') as a) ");
            }
        }
    }

    pub(super) fn render_where(&mut self, sel: &Selection) -> Result<()> {
        if sel.rel.is_none() && sel.filter.is_none() {
            return Ok(());
        }
        let qc = self.qc;
        self.w.push(" WHERE (");

        // Union members correlate one level further up; selections with
        // their own joins refer to the bare inner aliases.
        let mut pid = if sel.sel_type == SelType::Member {
            sel.parent_id.and_then(|p| qc.selects[p].parent_id)
        } else {
            sel.parent_id
        };
        if !sel.joins.is_empty() {
            pid = None;
        }

        if let Some(rel) = &sel.rel {
            self.render_rel(rel, pid, Some(&sel.arg_map));
        }
        if let Some(exp) = &sel.filter {
            if sel.rel.is_some() {
                self.w.push(" AND ");
            }
            self.render_exp(&sel.ti, exp, false)?;
        }
        self.w.push(")");
        Ok(())
    }

    fn render_group_by(&mut self, sel: &Selection) {
        if !sel.group_cols || sel.bcols.is_empty() {
            return;
        }
        self.w.push(" GROUP BY ");
        for (i, col) in sel.bcols.iter().enumerate() {
            if i != 0 {
                self.w.push(", ");
            }
            self.w.col(&sel.table, &col.name);
        }
    }

    fn render_order_by(&mut self, sel: &Selection) {
        if sel.order_by.is_empty() {
            return;
        }
        self.w.push(" ORDER BY ");
        for (i, ob) in sel.order_by.iter().enumerate() {
            if i != 0 {
                self.w.push(", ");
            }
            self.w.col(&sel.table, &ob.col.name);
            self.w.push(match ob.dir {
                OrderDir::Asc => " ASC",
                OrderDir::Desc => " DESC",
                OrderDir::AscNullsFirst => " ASC NULLS FIRST",
                OrderDir::AscNullsLast => " ASC NULLS LAST",
                OrderDir::DescNullsFirst => " DESC NULLS FIRST",
                OrderDir::DescNullsLast => " DESC NULLS LAST",
            });
        }
    }

    fn render_distinct_on(&mut self, sel: &Selection) {
        if sel.distinct_on.is_empty() || !self.handler.supports_distinct_on() {
            return;
        }
        self.w.push("DISTINCT ON (");
        for (i, col) in sel.distinct_on.iter().enumerate() {
            if i != 0 {
                self.w.push(", ");
            }
            self.w.col(&sel.table, &col.name);
        }
        self.w.push(") ");
    }

    fn render_limit(&mut self, sel: &Selection) {
        if !sel.paging.no_limit {
            if sel.singular {
                self.w.push(" LIMIT 1");
            } else if let Some(var) = &sel.paging.limit_var {
                self.w.push(" LIMIT LEAST(");
                self.render_param(Param {
                    name: var.clone(),
                    sql_type: "integer".to_string(),
                    is_array: false,
                });
                self.w.push(", ");
                self.w.int(sel.paging.limit as usize);
                self.w.push(")");
            } else {
                self.w.push(" LIMIT ");
                self.w.int(sel.paging.limit as usize);
            }
        }

        if let Some(var) = &sel.paging.offset_var {
            self.w.push(" OFFSET ");
            self.render_param(Param {
                name: var.clone(),
                sql_type: "integer".to_string(),
                is_array: false,
            });
        } else if sel.paging.offset != 0 {
            self.w.push(" OFFSET ");
            self.w.int(sel.paging.offset as usize);
        }
    }
}
