//! Emission of WHERE-clause predicates. The tree is walked iteratively with
//! an explicit stack of typed frames, so arbitrarily deep filters cannot
//! overflow the call stack and the open/close parentheses of each connective
//! stay symmetric by construction.

use anyhow::Result;

use crate::error::Error;
use crate::qcode::{Exp, ExpOp, ExpVal, ValType};
use crate::schema::TableInfo;

use super::context::Context;
use super::params::Param;
use super::Dialect;

enum Frame<'a> {
    Open,
    Close,
    Logic(ExpOp),
    Node(&'a Exp),
}

impl Context<'_> {
    pub(super) fn render_exp(&mut self, ti: &TableInfo, exp: &Exp, skip_nested: bool) -> Result<()> {
        let mut stack = vec![Frame::Node(exp)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Open => self.w.push("("),
                Frame::Close => self.w.push(")"),
                Frame::Logic(op) => self.w.push(match op {
                    ExpOp::And => " AND ",
                    ExpOp::Or => " OR ",
                    ExpOp::Not => "NOT ",
                    _ => unreachable!("only connectives are pushed as tokens"),
                }),
                Frame::Node(e) => match e.op {
                    ExpOp::False => self.w.push("false"),
                    ExpOp::And | ExpOp::Or => {
                        if e.children.is_empty() {
                            return Err(Error::MalformedExp(format!(
                                "{} without operands",
                                e.op.as_ref()
                            ))
                            .into());
                        }
                        stack.push(Frame::Close);
                        for i in (0..e.children.len()).rev() {
                            stack.push(Frame::Node(&e.children[i]));
                            if i > 0 {
                                stack.push(Frame::Logic(e.op));
                            }
                        }
                        stack.push(Frame::Open);
                    }
                    ExpOp::Not => {
                        let child = e.children.first().ok_or_else(|| {
                            Error::MalformedExp("Not without an operand".to_string())
                        })?;
                        stack.push(Frame::Node(child));
                        stack.push(Frame::Logic(ExpOp::Not));
                    }
                    _ => {
                        if !skip_nested && !e.rels.is_empty() {
                            self.render_nested_exists(e)?;
                        } else {
                            self.render_op(ti, e)?;
                        }
                    }
                },
            }
        }
        Ok(())
    }

    /// A predicate reaching through related tables: `EXISTS (SELECT 1 FROM …)`
    /// with the first relation correlating back to the outer scope and the
    /// remaining relations joined so the final table is in scope for the
    /// comparison itself.
    fn render_nested_exists(&mut self, e: &Exp) -> Result<()> {
        let qc = self.qc;
        let first = &e.rels[0];

        self.w.push("EXISTS (SELECT 1 FROM ");
        self.w.quoted(&first.left.table);
        for rel in &e.rels[1..] {
            self.render_join(rel, None);
        }

        self.w.push(" WHERE ");
        let last = e.rels.last().unwrap();
        let inner_ti = qc.schema.table(&last.left.table).ok_or_else(|| {
            Error::MalformedExp(format!(
                "unknown table `{}` in relation chain",
                last.left.table
            ))
        })?;
        self.render_exp(inner_ti, e, true)?;

        self.w.push(" AND (");
        self.render_rel(first, None, None);
        self.w.push("))");
        Ok(())
    }

    fn render_op(&mut self, ti: &TableInfo, e: &Exp) -> Result<()> {
        match e.op {
            ExpOp::Nop => return Ok(()),
            ExpOp::EqualsTrue | ExpOp::NotEqualsTrue => return self.render_bool_param(e),
            ExpOp::TsQuery => return self.render_ts_query(ti, e),
            _ => {}
        }

        if self.render_val_prefix(ti, e)? {
            return Ok(());
        }

        let col = e.col.as_ref().ok_or_else(|| {
            Error::MalformedExp(format!("operator {} requires a column", e.op.as_ref()))
        })?;

        self.w.push("((");
        match &e.table {
            Some(table) => self.w.col(table, &col.name),
            None => self.w.col(&ti.name, &col.name),
        }
        self.w.push(") ");

        if e.op == ExpOp::IsNull {
            let is_null = matches!(&e.val, ExpVal::Lit(v) if v.eq_ignore_ascii_case("true"));
            self.w.push(if is_null { "IS NULL)" } else { "IS NOT NULL)" });
            return Ok(());
        }

        self.w.push(sql_op(e.op)?);
        self.w.push(" ");
        match &e.val {
            ExpVal::List(t, items) => self.render_list(*t, items),
            _ => self.render_val(e, col)?,
        }
        self.w.push(")");
        Ok(())
    }

    /// MySQL has no `= ANY` over a parameter; list membership against a
    /// bound variable becomes a `JSON_CONTAINS` call over the whole operand.
    fn render_val_prefix(&mut self, ti: &TableInfo, e: &Exp) -> Result<bool> {
        if self.dialect != Dialect::MySql || !matches!(e.op, ExpOp::In | ExpOp::NotIn) {
            return Ok(false);
        }
        let ExpVal::Var(name) = &e.val else {
            return Ok(false);
        };
        let col = e.col.as_ref().ok_or_else(|| {
            Error::MalformedExp("list membership requires a column".to_string())
        })?;

        if e.op == ExpOp::NotIn {
            self.w.push("NOT ");
        }
        self.w.push("JSON_CONTAINS(");
        self.render_param(Param {
            name: name.clone(),
            sql_type: col.sql_type.clone(),
            is_array: true,
        });
        self.w.push(", CAST(");
        self.w.col(&ti.name, &col.name);
        self.w.push(" AS JSON), '$')");
        Ok(true)
    }

    fn render_bool_param(&mut self, e: &Exp) -> Result<()> {
        let name = e
            .val
            .as_var()
            .ok_or_else(|| Error::MalformedExp("boolean test requires a variable".to_string()))?
            .clone();
        self.w.push("(");
        self.render_param(Param {
            name,
            sql_type: "boolean".to_string(),
            is_array: false,
        });
        self.w.push(if e.op == ExpOp::EqualsTrue {
            " IS TRUE)"
        } else {
            " IS NOT TRUE)"
        });
        Ok(())
    }

    /// Full-text match, OR'd across every full-text column of the table.
    fn render_ts_query(&mut self, ti: &TableInfo, e: &Exp) -> Result<()> {
        let term = e
            .val
            .as_var()
            .or_else(|| e.val.as_lit())
            .ok_or_else(|| Error::MalformedExp("full-text search requires a term".to_string()))?
            .clone();

        match self.dialect {
            Dialect::MySql => {
                self.w.push("(MATCH(");
                for (i, col) in ti.full_text.iter().enumerate() {
                    if i != 0 {
                        self.w.push(", ");
                    }
                    self.w.col(&ti.name, &col.name);
                }
                self.w.push(") AGAINST (");
                self.render_param(Param {
                    name: term,
                    sql_type: "text".to_string(),
                    is_array: false,
                });
                self.w.push(" IN NATURAL LANGUAGE MODE))");
            }
            Dialect::Postgres => {
                let ts_fn = if self.db_version >= 110000 {
                    ") @@ websearch_to_tsquery("
                } else {
                    ") @@ to_tsquery("
                };
                self.w.push("((");
                for (i, col) in ti.full_text.iter().enumerate() {
                    if i != 0 {
                        self.w.push(" OR (");
                    }
                    self.w.col(&ti.name, &col.name);
                    self.w.push(ts_fn);
                    self.render_param(Param {
                        name: term.clone(),
                        sql_type: "text".to_string(),
                        is_array: false,
                    });
                    self.w.push(")");
                }
                self.w.push(")");
            }
        }
        Ok(())
    }

    fn render_val(&mut self, e: &Exp, col: &crate::schema::Column) -> Result<()> {
        match &e.val {
            ExpVal::Var(name) => self.render_val_var(e, col, name),
            ExpVal::Ref(table, col) => {
                self.w.col(table, &col.name);
                Ok(())
            }
            ExpVal::Lit(v) => {
                self.w.squoted(v);
                Ok(())
            }
            ExpVal::List(t, items) => {
                self.render_list(*t, items);
                Ok(())
            }
            ExpVal::None => Err(Error::MalformedExp(format!(
                "operator {} requires a value",
                e.op.as_ref()
            ))
            .into()),
        }
    }

    fn render_val_var(&mut self, e: &Exp, col: &crate::schema::Column, name: &str) -> Result<()> {
        let vars = self.vars;
        if let Some(val) = vars.get(name) {
            if let Some(raw) = val.strip_prefix("sql:") {
                self.w.push("(");
                self.w.push(raw);
                self.w.push(")");
            } else {
                self.w.squoted(val);
            }
        } else if matches!(e.op, ExpOp::In | ExpOp::NotIn) {
            // MySQL took the JSON_CONTAINS path before reaching this point.
            self.w.push("(ARRAY(SELECT json_array_elements_text(");
            self.render_param(Param {
                name: name.to_string(),
                sql_type: col.sql_type.clone(),
                is_array: true,
            });
            self.w.push(")) :: ");
            let cast = format!("{}[])", col.sql_type);
            self.w.push(&cast);
        } else {
            self.render_param(Param {
                name: name.to_string(),
                sql_type: col.sql_type.clone(),
                is_array: false,
            });
        }
        Ok(())
    }

    fn render_list(&mut self, t: ValType, items: &[String]) {
        self.w.push("(ARRAY[");
        for (i, item) in items.iter().enumerate() {
            if i != 0 {
                self.w.push(", ");
            }
            match t {
                ValType::Str => self.w.squoted(item),
                ValType::Num | ValType::Bool => self.w.push(item),
            }
        }
        self.w.push("])");
    }
}

fn sql_op(op: ExpOp) -> Result<&'static str> {
    use ExpOp::*;
    Ok(match op {
        Equals => "=",
        NotEquals => "!=",
        NotDistinct => "IS NOT DISTINCT FROM",
        Distinct => "IS DISTINCT FROM",
        GreaterOrEquals => ">=",
        LesserOrEquals => "<=",
        GreaterThan => ">",
        LesserThan => "<",
        In => "= ANY",
        NotIn => "!= ALL",
        Like => "LIKE",
        NotLike => "NOT LIKE",
        ILike => "ILIKE",
        NotILike => "NOT ILIKE",
        Similar => "SIMILAR TO",
        NotSimilar => "NOT SIMILAR TO",
        Regex => "~",
        NotRegex => "!~",
        IRegex => "~*",
        NotIRegex => "!~*",
        Contains => "@>",
        ContainedIn => "<@",
        HasKey => "?",
        HasKeyAny => "?|",
        HasKeyAll => "?&",
        other => {
            return Err(Error::MalformedExp(format!(
                "operator {} cannot be spelled here",
                other.as_ref()
            ))
            .into())
        }
    })
}
