//! Ask questions about a CSV dataset in plain English.
//!
//! A question is answered by sampling the loaded table for low-cardinality
//! values, composing a prompt, having a model write SQL and running that SQL
//! against the SQLite store.

pub mod config;
pub mod digest;
pub mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod store;

pub use error::{Error, ExecutionError, LoadError, Result, Stage};
pub use pipeline::{Answer, Pipeline, RunState, Session};
pub use store::{QueryResult, Store, TableRef, Value};
pub use tabletalk_driver as driver;
