//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `STUDYBUDDY_*` env vars (nested with `__`) + `OPENROUTER_API_KEY`.
//! Path settings expand `~` and `${VAR}`; relative paths stay relative to the
//! working directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::RagError;

pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
pub const FAKE_EMBEDDINGS_ENV: &str = "STUDYBUDDY_USE_FAKE_EMBEDDINGS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub persist_dir: String,
    pub docs_dir: String,
    pub downloads_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            persist_dir: "rag_db".to_string(),
            docs_dir: "test_docs".to_string(),
            downloads_dir: "downloads".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks handed to the LLM.
    pub k: usize,
    /// Candidate pool fetched by plain similarity before MMR selection.
    pub fetch_k: usize,
    /// 1.0 = pure relevance, 0.0 = pure diversity.
    pub lambda: f32,
    /// Cosine similarity floor below which a candidate is never used.
    pub min_relevance: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: 5, fetch_k: 20, lambda: 0.5, min_relevance: 0.25 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Remote,
    Local,
    Fake,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub api_base: String,
    pub dim: usize,
    pub batch_size: usize,
    pub model_dir: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Remote,
            model: "text-embedding-3-small".to_string(),
            api_base: "https://openrouter.ai/api/v1".to_string(),
            dim: 1536,
            batch_size: 64,
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    /// Overrides `model` for answer synthesis only.
    pub rag_model: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://openrouter.ai/api/v1".to_string(),
            model: "google/gemma-3-27b-it:free".to_string(),
            rag_model: None,
            temperature: 0.1,
            timeout_secs: 120,
            api_key: None,
        }
    }
}

impl LlmConfig {
    pub fn answer_model(&self) -> &str {
        self.rag_model.as_deref().filter(|m| !m.trim().is_empty()).unwrap_or(&self.model)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterStrategy {
    Keyword,
    Llm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub strategy: RouterStrategy,
    pub rewrite: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { strategy: RouterStrategy::Keyword, rewrite: false }
    }
}

/// Typed view over every setting the application reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub router: RouterConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), RagError> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(RagError::InvalidConfig("chunking.chunk_size must be > 0".into()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        let r = &self.retrieval;
        if r.k == 0 || r.k > r.fetch_k {
            return Err(RagError::InvalidConfig(format!(
                "retrieval.k ({}) must be in 1..=retrieval.fetch_k ({})",
                r.k, r.fetch_k
            )));
        }
        if !(0.0..=1.0).contains(&r.lambda) {
            return Err(RagError::InvalidConfig(format!("retrieval.lambda ({}) must be within [0, 1]", r.lambda)));
        }
        if self.embedding.dim == 0 {
            return Err(RagError::InvalidConfig("embedding.dim must be > 0".into()));
        }
        if self.embedding.batch_size == 0 {
            return Err(RagError::InvalidConfig("embedding.batch_size must be > 0".into()));
        }
        Ok(())
    }

    pub fn persist_dir(&self) -> PathBuf {
        expand_path(&self.paths.persist_dir)
    }

    pub fn docs_dir(&self) -> PathBuf {
        expand_path(&self.paths.docs_dir)
    }

    /// True when `STUDYBUDDY_USE_FAKE_EMBEDDINGS` is set to `1`/`true`.
    pub fn fake_embeddings_forced() -> bool {
        env::var(FAKE_EMBEDDINGS_ENV)
            .ok()
            .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    /// Load `file` plus its `<stem>.<env>.toml` sibling, then env overrides.
    pub fn load_from(file: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(file));
        let profile = match env_name.as_str() {
            "dev" | "development" => Some("dev"),
            "prod" | "production" => Some("prod"),
            "test" | "testing" => Some("test"),
            _ => None,
        };
        if let Some(profile) = profile {
            figment = figment.merge(Toml::file(file.with_extension(format!("{profile}.toml"))));
        }
        figment = figment
            .merge(Env::prefixed("STUDYBUDDY_").split("__"))
            .merge(Env::raw().only(&[API_KEY_ENV]).map(|_| "llm.api_key".into()));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
