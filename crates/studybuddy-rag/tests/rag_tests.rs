use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use studybuddy_core::config::Settings;
use studybuddy_core::error::RagError;
use studybuddy_core::traits::{Embedder, LanguageModel};
use studybuddy_embed::FakeEmbedder;
use studybuddy_rag::{IndexManager, IndexOutcome, IndexStatus, KeywordClassifier, LlmClassifier, Router, DONT_KNOW};

/// Answers from the prompt text and records every call.
struct ScriptedLlm {
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
    respond: Box<dyn Fn(&str) -> anyhow::Result<String> + Send + Sync>,
}

impl ScriptedLlm {
    fn new(respond: impl Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static) -> Self {
        Self { calls: Arc::new(AtomicUsize::new(0)), prompts: Arc::new(Mutex::new(Vec::new())), respond: Box::new(respond) }
    }

    fn study_buddy() -> Self {
        Self::new(|prompt| {
            if prompt.contains("Paris") {
                Ok("According to a.txt, the capital of France is Paris.".to_string())
            } else {
                Ok("I don't know.".to_string())
            }
        })
    }
}

impl LanguageModel for ScriptedLlm {
    fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        (self.respond)(prompt)
    }
}

struct BrokenEmbedder;

impl Embedder for BrokenEmbedder {
    fn embedder_id(&self) -> &str { "broken" }
    fn dim(&self) -> usize { 8 }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("503 Service Unavailable")
    }
}

struct Workspace {
    _tmp: TempDir,
    docs: PathBuf,
    persist: PathBuf,
    settings: Settings,
}

fn workspace() -> Workspace {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    let persist = tmp.path().join("rag_db");
    fs::create_dir_all(&docs).unwrap();
    let mut settings = Settings::default();
    settings.paths.persist_dir = persist.to_string_lossy().into_owned();
    settings.paths.docs_dir = docs.to_string_lossy().into_owned();
    Workspace { _tmp: tmp, docs, persist, settings }
}

fn write_course(docs: &Path) {
    fs::write(docs.join("a.txt"), "The capital of France is Paris.").unwrap();
    fs::write(docs.join("b.txt"), "Python was created by Guido van Rossum.").unwrap();
}

fn manager(ws: &Workspace, llm: ScriptedLlm) -> IndexManager {
    IndexManager::new(&ws.settings, Box::new(FakeEmbedder::new(1024)), Box::new(llm)).expect("manager")
}

fn total_chunks(m: &IndexManager) -> usize {
    m.status().unwrap().stats.map(|s| s.total_chunks).unwrap_or(0)
}

#[test]
fn unsupported_files_only_is_neutral_and_creates_no_store() {
    let ws = workspace();
    fs::write(ws.docs.join("slides.pptx"), "binary").unwrap();
    fs::write(ws.docs.join("README.md"), "# notes").unwrap();
    let mut m = manager(&ws, ScriptedLlm::study_buddy());

    let report = m.build_or_update_index(&ws.docs, false).expect("index");
    assert_eq!(report.outcome, IndexOutcome::NothingToIndex);
    assert_eq!(report.to_string(), "No new documents found to index.");
    assert!(!ws.persist.exists());
    assert!(!m.is_ready());
}

#[test]
fn missing_source_directory_is_reported() {
    let ws = workspace();
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    let missing = ws.docs.join("week9");
    let err = m.build_or_update_index(&missing, false).unwrap_err();
    assert!(matches!(err, RagError::SourceNotFound(_)));
    assert_eq!(err.to_string(), format!("Error: Source directory '{}' not found.", missing.display()));
}

#[test]
fn force_recreate_on_a_file_keeps_the_existing_index() {
    let ws = workspace();
    write_course(&ws.docs);
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    m.build_or_update_index(&ws.docs, false).unwrap();

    let err = m.build_or_update_index(&ws.docs.join("a.txt"), true).unwrap_err();
    assert!(matches!(err, RagError::SourceNotFound(_)));
    assert!(m.is_ready());
    assert!(ws.persist.is_dir());
    assert_eq!(total_chunks(&m), 2);
}

#[test]
fn unreadable_files_are_counted_in_the_summary() {
    let ws = workspace();
    fs::write(ws.docs.join("a.txt"), "The capital of France is Paris.").unwrap();
    fs::write(ws.docs.join("scan.pdf"), b"not really a pdf").unwrap();
    let mut m = manager(&ws, ScriptedLlm::study_buddy());

    let report = m.build_or_update_index(&ws.docs, false).unwrap();
    assert_eq!(report.skipped_files, 1);
    assert_eq!(
        report.to_string(),
        "Successfully created new index with 1 chunks from 1 documents (1 .txt, 0 .pdf). Skipped 1 unreadable file(s)."
    );
}

#[test]
fn status_without_providers_matches_manager_view() {
    let ws = workspace();
    write_course(&ws.docs);
    assert!(!IndexStatus::load(&ws.persist, "fake:d1024").unwrap().is_ready());

    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    m.build_or_update_index(&ws.docs, false).unwrap();
    let standalone = IndexStatus::load(&ws.persist, "fake:d1024").unwrap();
    assert_eq!(standalone.to_string(), m.status().unwrap().to_string());
}

#[test]
fn first_index_creates_then_reindex_duplicates() {
    let ws = workspace();
    write_course(&ws.docs);
    let mut m = manager(&ws, ScriptedLlm::study_buddy());

    let first = m.build_or_update_index(&ws.docs, false).unwrap();
    assert_eq!(first.outcome, IndexOutcome::Created);
    assert_eq!(first.chunks, 2);
    assert_eq!(first.to_string(), "Successfully created new index with 2 chunks from 2 documents (2 .txt, 0 .pdf).");
    assert!(ws.persist.is_dir());
    assert_eq!(total_chunks(&m), 2);

    let second = m.build_or_update_index(&ws.docs, false).unwrap();
    assert_eq!(second.outcome, IndexOutcome::Updated);
    assert_eq!(second.to_string(), "Successfully added 2 new chunks from 2 documents to the index (2 .txt, 0 .pdf).");
    let stats = m.status().unwrap().stats.unwrap();
    assert_eq!(stats.total_chunks, 4, "re-indexing appends without deduplicating");
    assert_eq!(stats.duplicate_chunks, 2);
}

#[test]
fn force_recreate_replaces_previous_contents() {
    let ws = workspace();
    write_course(&ws.docs);
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    m.build_or_update_index(&ws.docs, false).unwrap();
    m.build_or_update_index(&ws.docs, false).unwrap();
    assert_eq!(total_chunks(&m), 4);

    let report = m.build_or_update_index(&ws.docs, true).unwrap();
    assert_eq!(report.outcome, IndexOutcome::Created);
    assert_eq!(total_chunks(&m), 2);
}

#[test]
fn query_before_indexing_never_calls_the_llm() {
    let ws = workspace();
    let llm = ScriptedLlm::study_buddy();
    let calls = llm.calls.clone();
    let m = manager(&ws, llm);

    let err = m.query("What is the capital of France?").unwrap_err();
    assert!(matches!(err, RagError::IndexNotReady));
    assert_eq!(
        err.to_string(),
        "Knowledge base not initialized. Please index a directory first using the 'index' command."
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn answers_cite_only_the_supporting_file() {
    let ws = workspace();
    write_course(&ws.docs);
    let llm = ScriptedLlm::study_buddy();
    let prompts = llm.prompts.clone();
    let mut m = manager(&ws, llm);
    m.build_or_update_index(&ws.docs, false).unwrap();

    let result = m.query("What is the capital of France?").unwrap();
    assert!(result.answer.contains("Paris"));
    assert_eq!(result.source_files.len(), 1);
    let source = result.source_files.iter().next().unwrap();
    assert!(source.ends_with("a.txt"));
    assert!(!result.to_string().contains("b.txt"));
    assert!(result.to_string().contains("\n\nSources Used: "));

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("The capital of France is Paris."));
    assert!(!prompts[0].contains("Guido"));
}

#[test]
fn absent_topic_gets_dont_know_without_sources() {
    let ws = workspace();
    write_course(&ws.docs);
    let llm = ScriptedLlm::study_buddy();
    let calls = llm.calls.clone();
    let mut m = manager(&ws, llm);
    m.build_or_update_index(&ws.docs, false).unwrap();

    let result = m.query("Who won the 1998 World Cup?").unwrap();
    assert_eq!(result.answer, DONT_KNOW);
    assert!(result.source_files.is_empty());
    assert!(!result.to_string().contains("Sources Used"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn existing_index_is_loaded_on_startup() {
    let ws = workspace();
    write_course(&ws.docs);
    {
        let mut m = manager(&ws, ScriptedLlm::study_buddy());
        m.build_or_update_index(&ws.docs, false).unwrap();
    }
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    assert!(m.is_ready());
    assert!(m.query("capital of France").unwrap().answer.contains("Paris"));
    let report = m.build_or_update_index(&ws.docs, false).unwrap();
    assert_eq!(report.outcome, IndexOutcome::Updated);
}

#[test]
fn embedding_failure_aborts_without_creating_a_store() {
    let ws = workspace();
    write_course(&ws.docs);
    let mut m = IndexManager::new(&ws.settings, Box::new(BrokenEmbedder), Box::new(ScriptedLlm::study_buddy())).unwrap();
    let err = m.build_or_update_index(&ws.docs, false).unwrap_err();
    assert!(matches!(err, RagError::Provider(ref msg) if msg.contains("503")));
    assert!(!ws.persist.exists());
}

#[test]
fn keyword_router_dispatches_index_then_query() {
    let ws = workspace();
    write_course(&ws.docs);
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    let router = Router::new(Box::new(KeywordClassifier::new(ws.settings.paths.docs_dir.clone())));

    let out = router.dispatch(&mut m, &format!("please rebuild my knowledge base at {}", ws.docs.display()));
    assert_eq!(out, "Successfully created new index with 2 chunks from 2 documents (2 .txt, 0 .pdf).");

    let out = router.dispatch(&mut m, "What is the capital of France?");
    assert!(out.contains("Paris"));
    assert!(out.contains("Sources Used: "));
    assert!(out.trim_end().ends_with("a.txt"));
}

#[test]
fn keyword_router_renders_errors_as_text() {
    let ws = workspace();
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    let router = Router::new(Box::new(KeywordClassifier::new("does/not/exist")));
    assert_eq!(router.dispatch(&mut m, "index my notes"), "Error: Source directory 'does/not/exist' not found.");
    assert!(router.dispatch(&mut m, "what is recursion?").starts_with("Knowledge base not initialized."));
}

#[test]
fn llm_router_fails_closed_on_unknown_label() {
    let ws = workspace();
    write_course(&ws.docs);
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    let classifier_llm = Arc::new(ScriptedLlm::new(|_| Ok(r#"{"intent":"SEARCH","payload":"x","force_recreate":false}"#.to_string())));
    let router = Router::new(Box::new(LlmClassifier::new(classifier_llm, "docs")));

    let out = router.dispatch(&mut m, "index ./docs");
    assert!(out.starts_with("Routing failed:"), "{out}");
    assert!(!ws.persist.exists());

    let garbage = Arc::new(ScriptedLlm::new(|_| Ok("sure, I'll index that".to_string())));
    let router = Router::new(Box::new(LlmClassifier::new(garbage, "docs")));
    assert!(router.dispatch(&mut m, "index ./docs").starts_with("Routing failed:"));
}

#[test]
fn llm_router_follows_structured_decision() {
    let ws = workspace();
    write_course(&ws.docs);
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    let docs = ws.docs.to_string_lossy().into_owned();
    let classifier_llm = Arc::new(ScriptedLlm::new(move |prompt| {
        if prompt.contains("France") {
            Ok(r#"{"intent":"QUERY","payload":"What is the capital of France?","force_recreate":false}"#.to_string())
        } else {
            Ok(format!("```json\n{{\"intent\":\"INDEX\",\"payload\":{:?},\"force_recreate\":false}}\n```", docs))
        }
    }));
    let router = Router::new(Box::new(LlmClassifier::new(classifier_llm, "unused")));

    let out = router.dispatch(&mut m, "load my course folder please");
    assert!(out.starts_with("Successfully created new index"), "{out}");
    let out = router.dispatch(&mut m, "Tell me about France's capital");
    assert!(out.contains("Paris"));
}

#[test]
fn rewriter_polishes_success_but_not_uncertainty() {
    let ws = workspace();
    write_course(&ws.docs);
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    let rewriter = Arc::new(ScriptedLlm::new(|_| Ok("All set! Your notes are ready.".to_string())));
    let rewrites = rewriter.calls.clone();
    let router = Router::new(Box::new(KeywordClassifier::new("unused"))).with_rewriter(rewriter);

    let out = router.dispatch(&mut m, &format!("index {}", ws.docs.display()));
    assert_eq!(out, "All set! Your notes are ready.");

    let out = router.dispatch(&mut m, "Who won the 1998 World Cup?");
    assert_eq!(out, DONT_KNOW);

    let out = router.dispatch(&mut m, "What is the capital of France?");
    assert!(out.starts_with("All set!"));
    assert!(out.contains("\n\nSources Used: "), "sources survive rewriting");
    assert_eq!(rewrites.load(Ordering::SeqCst), 2);
}

#[test]
fn failed_rewrite_falls_back_to_raw_output() {
    let ws = workspace();
    write_course(&ws.docs);
    let mut m = manager(&ws, ScriptedLlm::study_buddy());
    let rewriter = Arc::new(ScriptedLlm::new(|_| anyhow::bail!("timeout")));
    let router = Router::new(Box::new(KeywordClassifier::new("unused"))).with_rewriter(rewriter);
    let out = router.dispatch(&mut m, &format!("index {}", ws.docs.display()));
    assert_eq!(out, "Successfully created new index with 2 chunks from 2 documents (2 .txt, 0 .pdf).");
}
