//! Argument parsing and output helpers for the `studybuddy` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use studybuddy_core::config::{EmbeddingProviderKind, EmbeddingConfig};

pub const NO_RESPONSE: &str = "No response received from StudyBuddy.";

#[derive(Debug, Parser)]
#[command(name = "studybuddy")]
#[command(about = "Index your course materials and ask questions about them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ./config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log progress (info level) to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index documents from a directory into your knowledge base
    Index {
        /// Directory with your documents (defaults to paths.docs_dir)
        #[arg(long)]
        path: Option<String>,

        /// Delete the existing index and build a new one
        #[arg(long)]
        force: bool,
    },
    /// Ask a question to your indexed knowledge base
    Ask {
        /// The question you want to ask
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Read requests from stdin, one per line, until EOF or `exit`
    Chat,
    /// Show what is currently indexed
    Status,
}

/// Routed request for `studybuddy index`. Bare directory names get a `./`
/// prefix so keyword routing still recognises them as paths.
pub fn index_request(dir: &str) -> String {
    let path_like = dir.contains('/') || dir.contains('\\') || dir.starts_with('.') || dir.starts_with('~');
    if path_like {
        format!("Please index the documents in {dir}.")
    } else {
        format!("Please index the documents in ./{dir}.")
    }
}

pub fn render_response(response: &str) -> String {
    if response.trim().is_empty() {
        NO_RESPONSE.to_string()
    } else {
        format!("\nStudyBuddy's Response:\n{}", response.trim_end())
    }
}

/// Configured embedder description for `status`, without constructing it.
pub fn describe_embedder(cfg: &EmbeddingConfig, fake_forced: bool) -> String {
    match (fake_forced, cfg.provider) {
        (true, _) | (false, EmbeddingProviderKind::Fake) => format!("fake:d{}", cfg.dim),
        (false, EmbeddingProviderKind::Local) => "bge-m3:d1024".to_string(),
        (false, EmbeddingProviderKind::Remote) => format!("remote:{}:d{}", cfg.model, cfg.dim),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ask_joins_unquoted_words() {
        let cli = Cli::try_parse_from(["studybuddy", "ask", "what", "is", "recursion?"]).unwrap();
        match cli.command {
            Commands::Ask { query } => assert_eq!(query.join(" "), "what is recursion?"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn index_flags_and_global_options() {
        let cli = Cli::try_parse_from(["studybuddy", "index", "--path", "./notes", "--force", "-v", "--config", "alt.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        match cli.command {
            Commands::Index { path, force } => {
                assert_eq!(path.as_deref(), Some("./notes"));
                assert!(force);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ask_requires_a_question() {
        assert!(Cli::try_parse_from(["studybuddy", "ask"]).is_err());
    }

    #[test]
    fn index_request_keeps_directory_recognisable() {
        assert_eq!(index_request("./my_notes"), "Please index the documents in ./my_notes.");
        assert_eq!(index_request("test_docs"), "Please index the documents in ./test_docs.");
    }

    #[test]
    fn empty_response_is_reported() {
        assert_eq!(render_response("  \n"), NO_RESPONSE);
        assert_eq!(render_response("Paris\n"), "\nStudyBuddy's Response:\nParis");
    }
}
