//! Similarity search followed by maximal-marginal-relevance selection.

use tracing::debug;

use studybuddy_core::config::RetrievalConfig;
use studybuddy_vector::{ScoredChunk, VectorStore};

#[derive(Debug, Clone)]
pub struct Retriever {
    k: usize,
    fetch_k: usize,
    lambda: f32,
    min_relevance: f32,
}

impl Retriever {
    pub fn new(cfg: &RetrievalConfig) -> Self {
        Self { k: cfg.k, fetch_k: cfg.fetch_k.max(cfg.k), lambda: cfg.lambda, min_relevance: cfg.min_relevance }
    }

    /// Up to `k` chunks, relevant to `query` and diverse among themselves.
    /// Candidates below the relevance floor are discarded before selection.
    pub fn retrieve(&self, store: &VectorStore, query: &[f32]) -> anyhow::Result<Vec<ScoredChunk>> {
        let candidates = store.similarity_search(query, self.fetch_k)?;
        for c in &candidates {
            debug!(source = %c.chunk.source_id, pos = c.chunk.sequence_position, score = c.score, "candidate");
        }
        let relevant: Vec<ScoredChunk> = candidates.into_iter().filter(|c| c.score >= self.min_relevance).collect();
        Ok(mmr_select(relevant, self.k, self.lambda))
    }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 0.0 } else { dot / (na * nb) }
}

/// Greedy MMR: repeatedly take the candidate maximising
/// `lambda * relevance - (1 - lambda) * max_similarity_to_selected`.
/// Ties go to the earlier (more relevant) candidate.
pub fn mmr_select(candidates: Vec<ScoredChunk>, k: usize, lambda: f32) -> Vec<ScoredChunk> {
    let mut remaining = candidates;
    let mut selected: Vec<ScoredChunk> = Vec::with_capacity(k.min(remaining.len()));
    while selected.len() < k && !remaining.is_empty() {
        let mut best = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for (i, c) in remaining.iter().enumerate() {
            let redundancy = selected.iter().map(|s| cosine(&c.vector, &s.vector)).fold(0.0f32, f32::max);
            let score = lambda * c.score - (1.0 - lambda) * redundancy;
            if score > best_score {
                best = i;
                best_score = score;
            }
        }
        selected.push(remaining.remove(best));
    }
    selected
}
