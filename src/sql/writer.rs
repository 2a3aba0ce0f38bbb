//! The output buffer and its identifier helpers. Everything the compiler
//! emits goes through here: plain fragments, double-quoted identifiers,
//! single-quoted literals and table-qualified column references, optionally
//! suffixed with a selection id so every table instance in the statement has
//! a unique alias.

use std::fmt::Write as _;

#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: String,
}

impl Writer {
    pub fn new() -> Self {
        Writer { buf: String::new() }
    }

    pub fn push(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    pub fn int(&mut self, n: usize) {
        let _ = write!(self.buf, "{n}");
    }

    /// `"ident"`
    pub fn quoted(&mut self, ident: &str) {
        self.buf.push('"');
        self.buf.push_str(ident);
        self.buf.push('"');
    }

    /// `'literal'`
    pub fn squoted(&mut self, lit: &str) {
        self.buf.push('\'');
        self.buf.push_str(lit);
        self.buf.push('\'');
    }

    /// `"table"."col"`
    pub fn col(&mut self, table: &str, col: &str) {
        self.quoted(table);
        self.buf.push('.');
        self.quoted(col);
    }

    /// `"table_3"."col"`, or `"table"."col"` when no instance id applies.
    pub fn col_with_id(&mut self, table: &str, id: Option<usize>, col: &str) {
        self.buf.push('"');
        self.buf.push_str(table);
        if let Some(id) = id {
            let _ = write!(self.buf, "_{id}");
        }
        self.buf.push_str("\".");
        self.quoted(col);
    }

    /// ` "name_3"` — the bare subquery alias form.
    pub fn alias_with_id(&mut self, name: &str, id: usize) {
        let _ = write!(self.buf, " \"{name}_{id}\"");
    }

    /// ` AS "name"` — the column alias form.
    pub fn alias(&mut self, name: &str) {
        self.buf.push_str(" AS ");
        self.quoted(name);
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_qualified_columns() {
        let mut w = Writer::new();
        w.col("users", "id");
        w.push(" ");
        w.col_with_id("users", Some(3), "id");
        w.push(" ");
        w.col_with_id("users", None, "id");
        assert_eq!(w.into_string(), r#""users"."id" "users_3"."id" "users"."id""#);
    }

    #[test]
    fn test_aliases() {
        let mut w = Writer::new();
        w.push(")");
        w.alias_with_id("__sj", 0);
        w.alias("json");
        assert_eq!(w.into_string(), r#") "__sj_0" AS "json""#);
    }
}
