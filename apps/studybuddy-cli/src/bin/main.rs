use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use studybuddy_cli::{describe_embedder, index_request, render_response, Cli, Commands};
use studybuddy_core::config::{Config, Settings};
use studybuddy_core::traits::LanguageModel;
use studybuddy_core::types::RouteDecision;
use studybuddy_embed::get_default_embedder;
use studybuddy_llm::ChatClient;
use studybuddy_rag::{IndexManager, IndexStatus, Router};

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.settings()
}

fn status(settings: &Settings) -> anyhow::Result<()> {
    let embedder_id = describe_embedder(&settings.embedding, Settings::fake_embeddings_forced());
    println!("{}", IndexStatus::load(&settings.persist_dir(), embedder_id)?);
    Ok(())
}

fn chat(router: &Router, manager: &mut IndexManager) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    write!(stdout, "> ")?;
    stdout.flush()?;
    for line in stdin.lock().lines() {
        let line = line?;
        let input = line.trim();
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }
        if !input.is_empty() {
            println!("{}\n", render_response(&router.dispatch(manager, input)));
        }
        write!(stdout, "> ")?;
        stdout.flush()?;
    }
    Ok(())
}

/// Builds the core for commands that call providers. `None` when credentials are missing.
fn open_session(settings: &Settings) -> anyhow::Result<Option<(IndexManager, Router)>> {
    if !settings.llm.has_api_key() {
        eprintln!("Error: OPENROUTER_API_KEY is not set in your environment or .env file.");
        eprintln!("Please set it up before running the CLI.");
        return Ok(None);
    }
    let embedder = get_default_embedder(settings)?;
    let answers = ChatClient::for_answers(&settings.llm)?;
    let routing: Arc<dyn LanguageModel> = Arc::new(ChatClient::from_config(&settings.llm)?);
    let manager = IndexManager::new(settings, embedder, Box::new(answers))?;
    info!(persist_dir = %manager.persist_dir().display(), ready = manager.is_ready(), strategy = ?settings.router.strategy, "session ready");
    Ok(Some((manager, Router::from_settings(settings, routing))))
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let settings = load_settings(&cli)?;
    let response = match cli.command {
        Commands::Status => {
            status(&settings)?;
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Index { path, force } => {
            let Some((mut manager, router)) = open_session(&settings)? else { return Ok(ExitCode::FAILURE) };
            let dir = path.unwrap_or_else(|| settings.docs_dir().to_string_lossy().into_owned());
            println!("Asking StudyBuddy to index directory: '{}'...", dir);
            let request = index_request(&dir);
            if force || dir.chars().any(char::is_whitespace) {
                router.execute(&mut manager, &request, &RouteDecision::index(dir, force))
            } else {
                router.dispatch(&mut manager, &request)
            }
        }
        Commands::Ask { query } => {
            let Some((mut manager, router)) = open_session(&settings)? else { return Ok(ExitCode::FAILURE) };
            let question = query.join(" ");
            println!("Asking StudyBuddy: {}", question);
            router.dispatch(&mut manager, &question)
        }
        Commands::Chat => {
            let Some((mut manager, router)) = open_session(&settings)? else { return Ok(ExitCode::FAILURE) };
            println!("StudyBuddy chat. Try 'index {}' or ask a question; 'exit' quits.", settings.docs_dir().display());
            chat(&router, &mut manager)?;
            return Ok(ExitCode::SUCCESS);
        }
    };
    println!("{}", render_response(&response));
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
