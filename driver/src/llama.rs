use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;

use crate::error::GenerationError;
use crate::generator::TextGenerator;

const CONTEXT_SIZE: u32 = 4096;
const MAX_NEW_TOKENS: i32 = 512;

/// Local GGUF model run through llama.cpp.
pub struct LlamaGenerator {
    backend: LlamaBackend,
    model: LlamaModel,
    name: String,
    threads: i32,
}

impl LlamaGenerator {
    /// `source` is either a path to a `.gguf` file or `<hf repo>:<file>`, which
    /// is fetched through the hugging face hub cache.
    pub fn load(source: &str, threads: i32) -> Result<Self> {
        let path = resolve_model(source)?;

        let backend = LlamaBackend::init()?;
        let model_params = LlamaModelParams::default();

        let start = std::time::Instant::now();
        let model = LlamaModel::load_from_file(&backend, &path, &model_params)
            .wrap_err_with(|| format!("failed to load model from {}", path.display()))?;

        tracing::info!(model = %path.display(), elapsed = ?start.elapsed(), "loaded gguf model");

        Ok(Self {
            backend,
            model,
            name: source.to_string(),
            threads,
        })
    }

    fn run(&self, prompt: &str) -> Result<String> {
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(CONTEXT_SIZE))
            .with_n_threads(self.threads);
        let mut context = self.model.new_context(&self.backend, ctx_params)?;

        let tokens = self.model.str_to_token(prompt, AddBos::Always)?;
        eyre::ensure!(!tokens.is_empty(), "prompt tokenized to an empty sequence");

        let mut batch = LlamaBatch::new(tokens.len().max(512), 1);

        let last_index = (tokens.len() - 1) as i32;
        for (i, token) in (0_i32..).zip(tokens.into_iter()) {
            batch.add(token, i, &[0], i == last_index)?;
        }

        context.decode(&mut batch)?;

        let mut output = String::new();
        let mut decoder = encoding_rs::UTF_8.new_decoder();
        let mut sampler = LlamaSampler::greedy();

        let mut n_cur = batch.n_tokens();
        let n_len = n_cur + MAX_NEW_TOKENS;

        while n_cur <= n_len {
            let token = sampler.sample(&context, batch.n_tokens() - 1);
            sampler.accept(token);

            if self.model.is_eog_token(token) {
                break;
            }

            let bytes = self.model.token_to_bytes(token, Special::Tokenize)?;
            let mut decoded = String::with_capacity(32);
            let _ = decoder.decode_to_string(&bytes, &mut decoded, false);
            output.push_str(&decoded);

            batch.clear();
            batch.add(token, n_cur, &[0], true)?;

            n_cur += 1;

            context.decode(&mut batch).wrap_err("failed to eval")?;
        }

        Ok(output)
    }
}

impl TextGenerator for LlamaGenerator {
    fn complete(&mut self, prompt: &str) -> Result<String, GenerationError> {
        self.run(prompt)
            .map_err(|e| GenerationError::Backend(format!("{e:#}")))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn resolve_model(source: &str) -> Result<PathBuf> {
    let path = Path::new(source);

    if path.exists() {
        return Ok(path.to_path_buf());
    }

    let Some((repo, file)) = source.split_once(':') else {
        eyre::bail!("model {source:?} is neither a file nor a <repo>:<file> reference");
    };

    let api = hf_hub::api::sync::Api::new()?;

    api.model(repo.to_string())
        .get(file)
        .wrap_err_with(|| format!("failed to fetch {file} from {repo}"))
}
