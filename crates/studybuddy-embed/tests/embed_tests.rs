use studybuddy_core::config::{EmbeddingProviderKind, Settings};
use studybuddy_core::traits::Embedder;
use studybuddy_embed::{get_default_embedder, FakeEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    let mut settings = Settings::default();
    settings.embedding.provider = EmbeddingProviderKind::Fake;
    settings.embedding.dim = 1024;

    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 1024, "embedding dim is 1024");
    assert_eq!(embedder.dim(), 1024);
    assert_eq!(embedder.embedder_id(), "fake:d1024");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn fake_embedder_ranks_shared_content_words() {
    let e = FakeEmbedder::new(1024);
    let q = e.embed("What is the capital of France?").unwrap();
    let a = e.embed("The capital of France is Paris.").unwrap();
    let b = e.embed("Python was created by Guido van Rossum.").unwrap();
    assert!(cosine(&q, &a) > 0.7);
    assert!(cosine(&q, &b) < 0.1);
}

#[test]
fn stopword_only_text_embeds_to_zero_vector() {
    let e = FakeEmbedder::new(64);
    let v = e.embed("what is the").unwrap();
    assert!(v.iter().all(|x| *x == 0.0));
}

#[test]
fn remote_provider_without_key_fails() {
    let mut settings = Settings::default();
    settings.embedding.provider = EmbeddingProviderKind::Remote;
    settings.llm.api_key = None;
    if Settings::fake_embeddings_forced() {
        return;
    }
    assert!(get_default_embedder(&settings).is_err());
}
