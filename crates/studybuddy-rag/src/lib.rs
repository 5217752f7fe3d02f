//! Retrieval-augmented question answering over a folder of course documents.

pub mod manager;
pub mod retriever;
pub mod router;
pub mod synthesizer;

pub use manager::{IndexManager, IndexOutcome, IndexReport, IndexStatus};
pub use retriever::Retriever;
pub use router::{IntentClassifier, KeywordClassifier, LlmClassifier, Router};
pub use synthesizer::DONT_KNOW;
