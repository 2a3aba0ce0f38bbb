//! gqlsql compiles a typed, pre-resolved GraphQL query tree (a [qcode::QCode])
//! into a single parameterized SQL statement — PostgreSQL or MySQL — whose
//! one result row already carries the entire response as a JSON document
//! shaped exactly like the query.
//!
//! The compiler is a pure function of its input: no I/O, no shared state,
//! byte-identical output for identical input. Parsing GraphQL, resolving the
//! schema, authorizing the query and binding variables all happen upstream;
//! executing the statement and streaming the result happen downstream.
//!
//! ```
//! use gqlsql::{Compiler, Config};
//! use gqlsql::qcode::{Field, Paging, QCode, Selection};
//! use gqlsql::schema::{Column, DbSchema, TableInfo};
//!
//! let users = TableInfo {
//!     name: "users".into(),
//!     columns: vec![Column::new("id", "integer")],
//!     ..Default::default()
//! };
//! let qc = QCode {
//!     schema: DbSchema { tables: vec![users.clone()], ..Default::default() },
//!     roots: vec![0],
//!     selects: vec![Selection {
//!         field_name: "users".into(),
//!         table: "users".into(),
//!         ti: users,
//!         fields: vec![Field { col: Column::new("id", "integer"), name: "id".into() }],
//!         bcols: vec![Column::new("id", "integer")],
//!         paging: Paging { limit: 20, ..Default::default() },
//!         ..Default::default()
//!     }],
//!     ..Default::default()
//! };
//!
//! let (_, sql) = Compiler::new(Config::default()).compile(&qc).unwrap();
//! assert!(sql.starts_with("SELECT jsonb_build_object('users', __sj_0.json) AS __root"));
//! ```

mod error;
pub mod qcode;
pub mod schema;
mod sql;

pub use anyhow::Result;
pub use error::Error;
pub use sql::{Compiler, Config, Dialect, Metadata, Param};
