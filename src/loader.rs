//! CSV ingestion. Replaces the session table with the contents of a local
//! file or a remote URL.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use rusqlite::types::Value as SqlValue;

use crate::error::LoadError;
use crate::store::{quote_ident, Store, TableRef};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Url(String),
}

impl DataSource {
    /// `http://` and `https://` inputs are urls, anything else is a path.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if input.starts_with("http://") || input.starts_with("https://") {
            Self::Url(input.to_string())
        } else {
            Self::File(PathBuf::from(input))
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Affinity {
    Integer,
    Real,
    Text,
}

impl Affinity {
    fn sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }

    fn convert(self, cell: &str) -> SqlValue {
        if cell.trim().is_empty() {
            return SqlValue::Null;
        }

        let trimmed = cell.trim();
        match self {
            Self::Integer => trimmed
                .parse()
                .map(SqlValue::Integer)
                .unwrap_or_else(|_| SqlValue::Text(cell.to_string())),
            Self::Real => trimmed
                .parse()
                .map(SqlValue::Real)
                .unwrap_or_else(|_| SqlValue::Text(cell.to_string())),
            Self::Text => SqlValue::Text(cell.to_string()),
        }
    }
}

pub fn load_csv(store: &Store, source: &DataSource, table: &str) -> Result<TableRef, LoadError> {
    tracing::info!(%source, table, "loading csv");

    match source {
        DataSource::File(path) => {
            let file = File::open(path).map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
            load_reader(store, file, table)
        }
        DataSource::Url(url) => {
            let response = ureq::get(url).call().map_err(|e| LoadError::Http {
                url: url.clone(),
                message: e.to_string(),
            })?;
            load_reader(store, response.into_reader(), table)
        }
    }
}

/// Parse CSV from `reader` and (re)create `table` from it in one transaction.
pub fn load_reader<R: Read>(store: &Store, reader: R, table: &str) -> Result<TableRef, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(LoadError::EmptyHeader);
    }

    let columns = normalize_headers(headers.iter());
    let records = reader
        .records()
        .collect::<Result<Vec<csv::StringRecord>, _>>()?;
    let affinities = infer_affinities(&records, columns.len());

    let definitions = columns
        .iter()
        .zip(&affinities)
        .map(|(column, affinity)| format!("{} {}", quote_ident(column), affinity.sql()))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");

    let mut conn = store.connect()?;
    let tx = conn.transaction()?;

    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({definitions});",
        table = quote_ident(table)
    ))?;

    {
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} VALUES ({placeholders})",
            quote_ident(table)
        ))?;

        for record in &records {
            let values = record
                .iter()
                .zip(&affinities)
                .map(|(cell, affinity)| affinity.convert(cell));
            insert.execute(rusqlite::params_from_iter(values))?;
        }
    }

    tx.commit()?;

    tracing::info!(table, rows = records.len(), columns = ?columns, "table replaced");

    Ok(TableRef {
        name: table.to_string(),
        columns,
    })
}

/// Blank headers become `Unnamed: <index>`; repeated names get `.1`, `.2`, ...
/// suffixes. SQLite compares column names case-insensitively, so do we.
fn normalize_headers<'h>(headers: impl Iterator<Item = &'h str>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();

    for (index, raw) in headers.enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {index}")
        } else {
            raw.to_string()
        };

        let taken = |name: &str, columns: &[String]| {
            columns.iter().any(|c| c.eq_ignore_ascii_case(name))
        };

        let mut name = base.clone();
        let mut suffix = 0;
        while taken(&name, &columns) {
            suffix += 1;
            name = format!("{base}.{suffix}");
        }

        columns.push(name);
    }

    columns
}

fn infer_affinities(records: &[csv::StringRecord], width: usize) -> Vec<Affinity> {
    (0..width)
        .map(|i| {
            let mut cells = records
                .iter()
                .filter_map(|r| r.get(i))
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .peekable();

            if cells.peek().is_none() {
                return Affinity::Text;
            }

            let cells = cells.collect::<Vec<_>>();
            if cells.iter().all(|c| c.parse::<i64>().is_ok()) {
                Affinity::Integer
            } else if cells.iter().all(|c| c.parse::<f64>().is_ok()) {
                Affinity::Real
            } else {
                Affinity::Text
            }
        })
        .collect()
}
