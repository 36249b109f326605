//! File backed SQLite store.
//!
//! Every operation opens its own connection and drops it before returning, so
//! no handle outlives a call and none is held across a model round-trip.

use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tabletalk_driver::{StatementPolicy, UntrustedStatement};

use crate::error::ExecutionError;

pub const DEFAULT_STORE: &str = "data.db";
pub const DEFAULT_TABLE: &str = "DATA";

/// A single cell as the store returned it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    /// Render as an element of a literal value list, e.g. `'A'`, `3`, `NULL`.
    pub fn literal(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Real(v) => format!("{v:?}"),
            Self::Text(v) => format!("'{}'", v.replace('\'', "''")),
            Self::Blob(v) => {
                let mut out = String::with_capacity(v.len() * 2 + 3);
                out.push_str("X'");
                for byte in v {
                    let _ = write!(out, "{byte:02X}");
                }
                out.push('\'');
                out
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v:?}"),
            Self::Text(v) => f.write_str(v),
            Self::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(v) => Self::Integer(v),
            ValueRef::Real(v) => Self::Real(v),
            ValueRef::Text(v) => Self::Text(String::from_utf8_lossy(v).into_owned()),
            ValueRef::Blob(v) => Self::Blob(v.to_vec()),
        }
    }
}

/// Rows of one execution plus the names of the result columns, in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A loaded dataset: table name plus its columns in declared order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableRef {
    pub name: String,
    pub columns: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn connect(&self) -> rusqlite::Result<Connection> {
        Connection::open(&self.path)
    }

    /// Open a store that must already exist; a missing file is an error.
    fn connect_existing(&self) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    fn connect_read_only(&self) -> rusqlite::Result<Connection> {
        Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
    }

    /// Run a generated statement verbatim and materialize every row.
    pub fn execute(
        &self,
        statement: &UntrustedStatement,
        policy: StatementPolicy,
    ) -> Result<QueryResult, ExecutionError> {
        let sql = statement.admit(policy)?;

        let conn = self.connect_existing()?;
        let mut stmt = conn.prepare(sql)?;

        let columns = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();
        let width = columns.len();

        let mut rows = stmt.query([])?;
        let mut out = Vec::new();

        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(Value::from(row.get_ref(i)?));
            }
            out.push(values);
        }

        tracing::debug!(rows = out.len(), columns = width, "statement executed");

        Ok(QueryResult { columns, rows: out })
    }

    /// Distinct values stored in `column`, in the order the store yields them.
    ///
    /// With `limit` set at most that many values are fetched.
    pub fn distinct_values(
        &self,
        table: &str,
        column: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Value>, ExecutionError> {
        let conn = self.connect_read_only()?;

        let known = table_columns(&conn, table)?;
        if !known.is_empty() && !known.iter().any(|c| c == column) {
            return Err(ExecutionError::NoSuchColumn {
                table: table.to_string(),
                column: column.to_string(),
            });
        }

        let mut sql = format!(
            "SELECT DISTINCT {} FROM {}",
            quote_ident(column),
            quote_ident(table)
        );
        if let Some(limit) = limit {
            let _ = write!(sql, " LIMIT {limit}");
        }

        let mut stmt = conn.prepare(&sql)?;
        let values = stmt
            .query_map([], |row| row.get_ref(0).map(Value::from))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(values)
    }

    /// Describe an existing table, failing when it does not exist.
    pub fn table(&self, table: &str) -> Result<TableRef, ExecutionError> {
        let conn = self.connect_read_only()?;
        let columns = table_columns(&conn, table)?;

        if columns.is_empty() {
            return Err(ExecutionError::NoSuchTable(table.to_string()));
        }

        Ok(TableRef {
            name: table.to_string(),
            columns,
        })
    }
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let columns = stmt
        .query_map([table], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

/// Quote an identifier taken from the table's own schema.
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
