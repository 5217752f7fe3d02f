//! Grounded prompt construction and answer assembly.

use std::collections::BTreeSet;

use studybuddy_core::error::RagError;
use studybuddy_core::traits::LanguageModel;
use studybuddy_core::types::QueryResult;
use studybuddy_vector::ScoredChunk;

pub const DONT_KNOW: &str = "I don't know based on the indexed documents.";

const INSTRUCTIONS: &str = "\
Answer the question at the end using only the context below.
Every context block starts with the file it was taken from.
If the context does not contain the answer, say that you don't know. Never make up an answer.
Whenever you use a fact from the context, name its source file (for example: 'According to lecture_notes.pdf, ...').
Read every block before answering.";

pub fn build_prompt(question: &str, chunks: &[ScoredChunk]) -> String {
    let context: Vec<String> = chunks.iter().map(|c| format!("[Source: {}]\n{}", c.chunk.source_id, c.chunk.text.trim())).collect();
    format!("{INSTRUCTIONS}\n---\nContext:\n{}\n---\nQuestion: {}\nHelpful Answer:", context.join("\n\n"), question.trim())
}

/// Ask the model once and attach the sources of `chunks`. With no chunks the
/// model is not called at all.
pub fn synthesize(llm: &dyn LanguageModel, question: &str, chunks: &[ScoredChunk]) -> Result<QueryResult, RagError> {
    if chunks.is_empty() {
        return Ok(QueryResult { answer: DONT_KNOW.to_string(), source_files: BTreeSet::new() });
    }
    let answer = llm.complete(&build_prompt(question, chunks)).map_err(RagError::provider)?;
    let source_files = chunks.iter().map(|c| c.chunk.source_id.clone()).collect();
    Ok(QueryResult { answer: answer.trim().to_string(), source_files })
}
