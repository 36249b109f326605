use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueEnum};
use tabletalk_driver::remote::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use tabletalk_driver::{ChatCompletions, ChatConfig, SqlGenerator, StatementPolicy, TextGenerator};

use crate::store::{Store, DEFAULT_STORE, DEFAULT_TABLE};

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// SQLite file holding the dataset
    #[arg(long, env = "TABLETALK_DB", default_value = DEFAULT_STORE)]
    pub db: PathBuf,

    /// Table the dataset is loaded into
    #[arg(long, default_value = DEFAULT_TABLE)]
    pub table: String,
}

impl StoreArgs {
    pub fn store(&self) -> Store {
        Store::new(&self.db)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// OpenAI compatible chat-completions endpoint
    Remote,
    /// Local GGUF model (needs the `llama` feature)
    Llama,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    #[arg(long, value_enum, default_value_t = Backend::Remote)]
    pub backend: Backend,

    /// Model id for the remote backend, or a `.gguf` path / `<repo>:<file>` for llama
    #[arg(long, env = "TABLETALK_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, env = "TABLETALK_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Sampling temperature; 0 asks the model to be deterministic
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds for the remote backend
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Threads for the llama backend
    #[arg(long, default_value_t = 4)]
    pub threads: i32,

    /// Refuse generated statements that are not a single query
    #[arg(long)]
    pub read_only: bool,
}

impl ModelArgs {
    pub fn policy(&self) -> StatementPolicy {
        if self.read_only {
            StatementPolicy::ReadOnly
        } else {
            StatementPolicy::Unrestricted
        }
    }

    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
            timeout: self.timeout.map(Duration::from_secs),
        }
    }

    pub fn generator(&self) -> eyre::Result<SqlGenerator> {
        let backend: Box<dyn TextGenerator + Send> = match self.backend {
            Backend::Remote => Box::new(ChatCompletions::new(self.chat_config())),
            Backend::Llama => self.llama()?,
        };

        tracing::info!(backend = ?self.backend, model = %self.model, "generator ready");

        Ok(SqlGenerator::new(backend))
    }

    #[cfg(feature = "llama")]
    fn llama(&self) -> eyre::Result<Box<dyn TextGenerator + Send>> {
        let generator = tabletalk_driver::llama::LlamaGenerator::load(&self.model, self.threads)?;
        Ok(Box::new(generator))
    }

    #[cfg(not(feature = "llama"))]
    fn llama(&self) -> eyre::Result<Box<dyn TextGenerator + Send>> {
        eyre::bail!("the llama backend needs a build with the `llama` feature")
    }
}

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Filter directives, e.g. `info` or `tabletalk=debug`
    #[arg(long = "log", env = "RUST_LOG", default_value = "info")]
    pub filter: String,

    /// Write a chrome trace of the session to this file
    #[arg(long)]
    pub chrome_trace: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        model: ModelArgs,
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["tabletalk", "--api-key", "k"]).unwrap();

        assert_eq!(cli.store.table, "DATA");
        assert_eq!(cli.model.backend, Backend::Remote);
        assert_eq!(cli.model.policy(), StatementPolicy::Unrestricted);

        let config = cli.model.chat_config();
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn read_only_flag() {
        let cli = Cli::try_parse_from([
            "tabletalk",
            "--read-only",
            "--timeout",
            "30",
            "--table",
            "sales",
        ])
        .unwrap();

        assert_eq!(cli.store.table, "sales");
        assert_eq!(cli.model.policy(), StatementPolicy::ReadOnly);
        assert_eq!(cli.model.chat_config().timeout, Some(Duration::from_secs(30)));
    }
}
