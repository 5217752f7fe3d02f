//! Intent routing between indexing and question answering.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use studybuddy_core::config::{expand_path, RouterStrategy, Settings};
use studybuddy_core::error::{RagError, Result};
use studybuddy_core::traits::{JsonSchemaSpec, LanguageModel};
use studybuddy_core::types::{Intent, QueryResult, RouteDecision};

use crate::manager::{IndexManager, IndexOutcome};

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, input: &str) -> Result<RouteDecision>;
}

const INDEX_WORDS: &[&str] = &["index", "indexing", "reindex", "add", "adding", "rebuild", "rebuilding"];
const FORCE_WORDS: &[&str] = &["recreate", "force", "wipe"];

/// Deterministic whole-word rules. Anything that is not an indexing request
/// is a question.
pub struct KeywordClassifier {
    default_dir: String,
}

impl KeywordClassifier {
    pub fn new(default_dir: impl Into<String>) -> Self {
        Self { default_dir: default_dir.into() }
    }
}

fn words(input: &str) -> impl Iterator<Item = String> + '_ {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

fn path_token(input: &str) -> Option<String> {
    input
        .split_whitespace()
        .map(|t| t.trim_start_matches(['"', '\'', '(', '`']).trim_end_matches(['.', ',', ';', ':', '!', '?', '"', '\'', ')', '`']))
        .find(|t| !t.is_empty() && (t.contains('/') || t.contains('\\') || t.starts_with('.') || t.starts_with('~')))
        .map(str::to_string)
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, input: &str) -> Result<RouteDecision> {
        let question = input.trim();
        if !words(question).any(|w| INDEX_WORDS.contains(&w.as_str())) {
            return Ok(RouteDecision::query(question));
        }
        let lowered = question.to_lowercase();
        let force = words(question).any(|w| FORCE_WORDS.contains(&w.as_str())) || lowered.contains("from scratch");
        let path = path_token(question).unwrap_or_else(|| self.default_dir.clone());
        Ok(RouteDecision::index(path, force))
    }
}

const ROUTING_PROMPT: &str = "\
You route requests for StudyBuddy, an assistant over a personal knowledge base of course materials.
Choose exactly one intent:
- INDEX when the user asks to index, add documents, or rebuild the knowledge base. payload is the directory path they named, or an empty string if they named none. force_recreate is true only if they explicitly ask to delete or recreate the existing index.
- QUERY for everything else. payload is the user's question, unchanged. force_recreate is false.
Reply with JSON only.";

/// Structured-output classification. Anything other than a well-formed
/// decision with one of the two labels is a routing error.
pub struct LlmClassifier {
    llm: Arc<dyn LanguageModel>,
    default_dir: String,
}

impl LlmClassifier {
    pub fn new(llm: Arc<dyn LanguageModel>, default_dir: impl Into<String>) -> Self {
        Self { llm, default_dir: default_dir.into() }
    }

    pub fn schema() -> JsonSchemaSpec {
        JsonSchemaSpec {
            name: "route_decision".to_string(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "intent": { "type": "string", "enum": ["INDEX", "QUERY"] },
                    "payload": { "type": "string" },
                    "force_recreate": { "type": "boolean" }
                },
                "required": ["intent", "payload", "force_recreate"],
                "additionalProperties": false
            }),
        }
    }

    fn parse(&self, raw: &str) -> Result<RouteDecision> {
        let mut decision: RouteDecision = serde_json::from_str(strip_code_fence(raw))
            .map_err(|e| RagError::Routing(format!("unparseable decision {raw:?}: {e}")))?;
        decision.payload = decision.payload.trim().to_string();
        match decision.intent {
            Intent::Index if decision.payload.is_empty() => decision.payload = self.default_dir.clone(),
            Intent::Query if decision.payload.is_empty() => return Err(RagError::Routing("QUERY decision without a question".into())),
            Intent::Query => decision.force_recreate = false,
            Intent::Index => {}
        }
        Ok(decision)
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(inner) = t.strip_prefix("```") else { return t };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

impl IntentClassifier for LlmClassifier {
    fn classify(&self, input: &str) -> Result<RouteDecision> {
        let prompt = format!("{ROUTING_PROMPT}\n\nUser request: {}", input.trim());
        let raw = self.llm.complete_json(&prompt, &Self::schema()).map_err(RagError::provider)?;
        let decision = self.parse(&raw)?;
        debug!(intent = %decision.intent, payload = %decision.payload, force = decision.force_recreate, "llm routing decision");
        Ok(decision)
    }
}

const REWRITE_PROMPT: &str = "\
Rewrite the assistant output below as a short, friendly reply to the user's request.
Keep every number, file name and fact exactly as given. Do not add information, advice or detail that is not in the output.
Reply with the rewritten text only.";

pub struct Router {
    classifier: Box<dyn IntentClassifier>,
    rewriter: Option<Arc<dyn LanguageModel>>,
}

impl Router {
    pub fn new(classifier: Box<dyn IntentClassifier>) -> Self {
        Self { classifier, rewriter: None }
    }

    pub fn with_rewriter(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.rewriter = Some(llm);
        self
    }

    /// Strategy and rewrite pass as configured under `[router]`.
    pub fn from_settings(settings: &Settings, llm: Arc<dyn LanguageModel>) -> Self {
        let default_dir = settings.docs_dir().to_string_lossy().into_owned();
        let classifier: Box<dyn IntentClassifier> = match settings.router.strategy {
            RouterStrategy::Keyword => Box::new(KeywordClassifier::new(default_dir)),
            RouterStrategy::Llm => Box::new(LlmClassifier::new(llm.clone(), default_dir)),
        };
        let router = Self::new(classifier);
        if settings.router.rewrite { router.with_rewriter(llm) } else { router }
    }

    pub fn classify(&self, input: &str) -> Result<RouteDecision> {
        self.classifier.classify(input)
    }

    /// Classify `input`, run it, and render the outcome as text. Errors are
    /// rendered too; this never fails.
    pub fn dispatch(&self, manager: &mut IndexManager, input: &str) -> String {
        match self.classify(input) {
            Ok(decision) => self.execute(manager, input, &decision),
            Err(e) => e.to_string(),
        }
    }

    pub fn execute(&self, manager: &mut IndexManager, input: &str, decision: &RouteDecision) -> String {
        match decision.intent {
            Intent::Index => {
                let dir = expand_path(&decision.payload);
                match manager.build_or_update_index(Path::new(&dir), decision.force_recreate) {
                    Ok(report) if report.outcome == IndexOutcome::NothingToIndex => report.to_string(),
                    Ok(report) => self.polish(input, report.to_string()),
                    Err(e) => e.to_string(),
                }
            }
            Intent::Query => match manager.query(&decision.payload) {
                Ok(result) if result.source_files.is_empty() || is_uncertain(&result.answer) => result.to_string(),
                Ok(result) => {
                    let answer = self.polish(input, result.answer);
                    QueryResult { answer, source_files: result.source_files }.to_string()
                }
                Err(e) => e.to_string(),
            },
        }
    }

    fn polish(&self, input: &str, raw: String) -> String {
        let Some(llm) = &self.rewriter else { return raw };
        let prompt = format!("{REWRITE_PROMPT}\n\nUser request: {}\n\nAssistant output:\n{}", input.trim(), raw);
        match llm.complete(&prompt) {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => raw,
            Err(e) => {
                warn!(error = %e, "rewrite failed, returning raw output");
                raw
            }
        }
    }
}

fn is_uncertain(answer: &str) -> bool {
    let lowered = answer.to_lowercase().replace('\u{2019}', "'");
    lowered.contains("don't know") || lowered.contains("do not know")
}
