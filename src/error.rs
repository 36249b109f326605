use std::fmt;

use tabletalk_driver::{GenerationError, PolicyError};
use thiserror::Error;

/// Where a pipeline run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Generating,
    Executing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load => f.write_str("load"),
            Self::Generating => f.write_str("generating"),
            Self::Executing => f.write_str("executing"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },

    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv input has no header row")]
    EmptyHeader,

    #[error("failed to write table: {0}")]
    Store(#[from] rusqlite::Error),
}

/// The store refused or failed a statement. The store's own message is kept verbatim.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("{0}")]
    Store(#[from] rusqlite::Error),

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("no such column in {table}: {column}")]
    NoSuchColumn { table: String, column: String },

    #[error("statement refused: {0}")]
    Refused(#[from] PolicyError),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl Error {
    /// The stage a failure belongs to, for presentation.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Load(_) => Stage::Load,
            Self::Generation(_) => Stage::Generating,
            Self::Execution(_) => Stage::Executing,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
