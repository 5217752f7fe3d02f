use anyhow::{Result, anyhow};
use std::time::Duration;
use tracing::info;

use studybuddy_core::config::{EmbeddingProviderKind, Settings};
use studybuddy_core::traits::Embedder;

#[cfg(feature = "local")]
pub mod device;
pub mod fake;
#[cfg(feature = "local")]
pub mod local;
#[cfg(feature = "local")]
pub mod pool;
pub mod remote;
#[cfg(feature = "local")]
pub mod tokenize;

pub use fake::FakeEmbedder;
#[cfg(feature = "local")]
pub use local::BgeM3Embedder;
#[cfg(feature = "local")]
pub use pool::masked_mean_l2;
pub use remote::RemoteEmbedder;

/// Build the embedder selected by `embedding.provider`.
/// `STUDYBUDDY_USE_FAKE_EMBEDDINGS=1` overrides the configured provider.
pub fn get_default_embedder(settings: &Settings) -> Result<Box<dyn Embedder>> {
    let cfg = &settings.embedding;
    let provider = if Settings::fake_embeddings_forced() { EmbeddingProviderKind::Fake } else { cfg.provider };
    match provider {
        EmbeddingProviderKind::Fake => {
            info!(dim = cfg.dim, "using fake embedder");
            Ok(Box::new(FakeEmbedder::new(cfg.dim)))
        }
        #[cfg(feature = "local")]
        EmbeddingProviderKind::Local => Ok(Box::new(BgeM3Embedder::new(cfg.model_dir.as_deref())?)),
        #[cfg(not(feature = "local"))]
        EmbeddingProviderKind::Local => Err(anyhow!("embedding.provider = \"local\" needs the `local` feature")),
        EmbeddingProviderKind::Remote => {
            let api_key = settings
                .llm
                .api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| anyhow!("Remote embeddings need an API key (OPENROUTER_API_KEY)"))?;
            info!(model = %cfg.model, "using remote embedder");
            Ok(Box::new(RemoteEmbedder::new(
                &cfg.api_base,
                api_key,
                cfg.model.clone(),
                cfg.dim,
                cfg.batch_size,
                Duration::from_secs(settings.llm.timeout_secs),
            )?))
        }
    }
}
