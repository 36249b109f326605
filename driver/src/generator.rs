use crate::error::GenerationError;
use crate::statement::UntrustedStatement;

/// A model that turns one prompt into one completion.
///
/// Implementations make a single attempt per call and never retry.
pub trait TextGenerator {
    fn complete(&mut self, prompt: &str) -> Result<String, GenerationError>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}

/// Turns composed prompts into untrusted SQL statements.
pub struct SqlGenerator {
    backend: Box<dyn TextGenerator + Send>,
}

impl SqlGenerator {
    pub fn new(backend: Box<dyn TextGenerator + Send>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn generate(&mut self, prompt: &str) -> Result<UntrustedStatement, GenerationError> {
        let start = std::time::Instant::now();

        let output = self.backend.complete(prompt)?;

        tracing::debug!(
            backend = self.backend.name(),
            elapsed = ?start.elapsed(),
            raw = %output,
            "model completion received"
        );

        let sql = extract_sql(&output);

        if sql.is_empty() {
            return Err(GenerationError::EmptyCompletion);
        }

        Ok(UntrustedStatement::new(sql))
    }
}

/// Strip whitespace and markdown fences around a completion.
pub fn extract_sql(output: &str) -> String {
    let trimmed = output.trim();

    if !trimmed.contains('\n') {
        let inner = trimmed
            .strip_prefix("```sql")
            .or_else(|| trimmed.strip_prefix("```"))
            .unwrap_or(trimmed);

        return inner.strip_suffix("```").unwrap_or(inner).trim().to_string();
    }

    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with("```") && !line.trim().is_empty())
        .collect::<Vec<&str>>()
        .join("\n")
        .trim()
        .to_string()
}
