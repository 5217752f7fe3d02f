//! OpenAI-compatible `/embeddings` endpoint (OpenRouter, OpenAI, local gateways).

use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use studybuddy_core::traits::Embedder;

pub struct RemoteEmbedder {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    dim: usize,
    batch_size: usize,
    id: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(api_base: &str, api_key: String, model: String, dim: usize, batch_size: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let id = format!("remote:{model}:d{dim}");
        Ok(Self {
            client,
            url: format!("{}/embeddings", api_base.trim_end_matches('/')),
            api_key,
            model,
            dim,
            batch_size: batch_size.max(1),
            id,
        })
    }

    fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "model": self.model, "input": texts }))
            .send()?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(anyhow!("Embedding request failed ({}): {}", status, body));
        }
        let mut parsed: EmbeddingResponse = resp.json()?;
        if parsed.data.len() != texts.len() {
            return Err(anyhow!("Mismatch embedding count: got {}, expected {}", parsed.data.len(), texts.len()));
        }
        parsed.data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(anyhow!("Embedding has dimension {}, configured embedding.dim is {}", bad.len(), self.dim));
        }
        Ok(vectors)
    }
}

impl Embedder for RemoteEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            debug!(batch = batch.len(), model = %self.model, "requesting embeddings");
            out.extend(self.request(batch)?);
        }
        Ok(out)
    }
}
