use anyhow::anyhow;

/// Text to fixed-dimension vectors. Implementations are remote or local
/// services and every call may fail.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `fake:d1024`).
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality.
    fn dim(&self) -> usize;
    /// Compute embeddings for a batch of input texts, one vector per text.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector"))
    }
}

/// Named JSON schema passed to providers that support constrained output.
#[derive(Debug, Clone)]
pub struct JsonSchemaSpec {
    pub name: String,
    pub schema: serde_json::Value,
}

/// Single-shot chat completion.
pub trait LanguageModel: Send + Sync {
    fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    /// Completion constrained to `schema`. Providers without structured
    /// output fall back to a plain completion; callers must still validate.
    fn complete_json(&self, prompt: &str, _schema: &JsonSchemaSpec) -> anyhow::Result<String> {
        self.complete(prompt)
    }
}
