//! Model side of tabletalk: text generation backends and the generated,
//! untrusted SQL they produce.

pub mod error;
pub mod generator;
#[cfg(feature = "llama")]
pub mod llama;
pub mod remote;
pub mod statement;

pub use error::{GenerationError, PolicyError};
pub use generator::{extract_sql, SqlGenerator, TextGenerator};
pub use remote::{ChatCompletions, ChatConfig};
pub use statement::{StatementPolicy, UntrustedStatement};
