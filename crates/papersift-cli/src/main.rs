//! papersift - daily research-paper digests from RSS/Atom feeds
//!
//! Each library follows one or more feeds and carries a plain-language
//! requirement. `digest` checks new papers against it with an LLM and keeps
//! one-sentence summaries of the relevant ones.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;
mod output;

use config::{AppContext, Config, mask_key};

#[derive(Parser)]
#[command(name = "papersift")]
#[command(about = "Research-paper digests from feeds, judged by an LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./papersift.toml or ~/.config/papersift/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding libraries and the saved endpoint
    #[arg(long, global = true, env = "PAPERSIFT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Maximum retry attempts for transient HTTP failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Save the OpenAI-compatible endpoint URL and API key
    SetEndpoint(cmd::endpoint::SetEndpointArgs),
    /// Create a library from a feed URL and a requirement
    CreateFeed(cmd::feed::CreateFeedArgs),
    /// Add another feed to an existing library
    AddFeed(cmd::feed::AddFeedArgs),
    /// List libraries with their feeds and unchecked paper counts
    ShowLibraries,
    /// Delete a library and its stored papers
    RemoveLibrary(cmd::libraries::RemoveLibraryArgs),
    /// Check new papers and summarize the relevant ones
    Digest(cmd::digest::DigestArgs),
    /// Show papers judged relevant in earlier digests
    ShowPastPapers(cmd::past::ShowPastArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = Arc::new(papersift_core::ProgressContext::new());

    // TTY: quiet (warn) unless --debug, spinners show activity.
    // non-TTY: info unless --debug.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    papersift_core::init_logging(quiet, cli.debug, multi);

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config, cli.data_dir, cli.max_retries)?;
    log::debug!("Data directory: {}", ctx.data_dir.display());

    match cli.command {
        Command::SetEndpoint(args) => cmd::endpoint::run(args, &ctx),
        Command::CreateFeed(args) => cmd::feed::create(args, &ctx),
        Command::AddFeed(args) => cmd::feed::add(args, &ctx),
        Command::ShowLibraries => cmd::libraries::show(&ctx),
        Command::RemoveLibrary(args) => cmd::libraries::remove(args, &ctx),
        Command::Digest(args) => {
            cmd::digest::run(args, &ctx, &progress, &mut std::io::stdout().lock())
        }
        Command::ShowPastPapers(args) => cmd::past::run(args, &ctx),
        Command::Config => show_config(&ctx),
    }
}

fn show_config(ctx: &AppContext) -> Result<()> {
    let config = &ctx.config;
    let saved = ctx.saved_endpoint()?;

    let endpoint_url = config
        .llm
        .base_url
        .clone()
        .or_else(|| saved.as_ref().map(|e| e.url.clone()))
        .unwrap_or_else(|| "not set".to_string());
    let key = config
        .llm
        .api_key
        .clone()
        .or_else(|| saved.map(|e| e.key))
        .unwrap_or_default();

    let rows = [
        ("Data directory", ctx.data_dir.display().to_string()),
        ("Endpoint", endpoint_url),
        ("API key", mask_key(&key)),
        ("Model", config.llm.model.clone()),
        (
            "Rerank",
            if config.rerank.enabled {
                format!(
                    "{} (x{} candidates)",
                    config.rerank.model, config.rerank.candidate_factor
                )
            } else {
                "disabled".to_string()
            },
        ),
        ("Default count", config.digest.default_count.to_string()),
        ("Max retries", ctx.retry.max_retries().to_string()),
        (
            "Request timeout",
            ctx.timeout
                .map(|t| format!("{}s", t.as_secs()))
                .unwrap_or_else(|| "none".to_string()),
        ),
    ];

    eprintln!("\n{}", output::key_value_table(&rows));
    Ok(())
}
