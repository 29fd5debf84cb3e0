//! `papersift digest` - judge new papers for one or all libraries

use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Args;

use papersift_core::SharedProgress;
use papersift_library::{Judges, Library};
use papersift_llm::{EmbeddingReranker, LlmClassifier, LlmSummarizer, OpenAiClient, Reranker};

use crate::config::AppContext;
use crate::output::{self, Format, Item, Section};

#[derive(Args, Debug)]
pub struct DigestArgs {
    /// Papers to check per library (default: [digest] default_count)
    pub count: Option<usize>,

    /// Chat model used to judge and summarize
    #[arg(long)]
    pub model: Option<String>,

    /// Only this library (default: all)
    #[arg(short, long)]
    pub library: Option<String>,

    /// Print a markdown checklist
    #[arg(short = 'm', long = "in-markdown")]
    pub markdown: bool,

    /// Print JSON
    #[arg(long)]
    pub json: bool,

    /// Take candidates in feed order instead of reranking them
    #[arg(long)]
    pub no_sorting: bool,

    /// List candidates without asking the model (they are still marked read)
    #[arg(long)]
    pub skip_check: bool,
}

/// Digest each selected library in name order, writing its section to `out`
/// as soon as it is done.
pub fn run(
    args: DigestArgs,
    ctx: &AppContext,
    progress: &SharedProgress,
    out: &mut dyn Write,
) -> Result<()> {
    let registry = ctx.libraries()?;
    if registry.is_empty() {
        bail!("No libraries yet; create one with `papersift create-feed <LIBRARY> <URL> <REQUIREMENT>`");
    }
    let names: Vec<String> = match &args.library {
        Some(name) if registry.contains_key(name) => vec![name.clone()],
        Some(name) => bail!("Unknown library `{name}`; see `papersift show-libraries`"),
        None => registry.keys().cloned().collect(),
    };

    let count = args.count.unwrap_or(ctx.config.digest.default_count);
    let format = Format::from_flags(args.markdown, args.json);
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| ctx.config.llm.model.clone());

    let client = if args.skip_check {
        None
    } else {
        Some(
            OpenAiClient::new(ctx.endpoint(&model)?)
                .with_timeout(ctx.timeout)
                .with_retry(ctx.retry),
        )
    };
    let reranker = if client.is_some() && !args.no_sorting && ctx.config.rerank.enabled {
        Some(
            EmbeddingReranker::new(ctx.endpoint(&ctx.config.rerank.model)?)
                .with_timeout(ctx.timeout)
                .with_retry(ctx.retry),
        )
    } else {
        None
    };

    let classifier = client.as_ref().map(LlmClassifier::new);
    let summarizer = client.as_ref().map(LlmSummarizer::new);
    let judges = match (&classifier, &summarizer) {
        (Some(classifier), Some(summarizer)) => Some(Judges {
            classifier,
            summarizer,
        }),
        _ => None,
    };

    for name in &names {
        let pb = progress.stage_line(name);
        pb.set_message("syncing feeds");
        let result = ctx.open_library(name).and_then(|library| {
            ensure_feeds(&library, name)?;
            pb.set_message(format!("checking up to {count} papers"));
            library.get_papers(
                count,
                &registry[name],
                judges,
                reranker.as_ref().map(|r| r as &dyn Reranker),
            )
        });
        pb.finish_and_clear();
        let processed = result.with_context(|| format!("Digest of `{name}` failed"))?;

        log::info!("{name}: {} paper(s)", processed.len());
        let section = Section {
            library: name,
            papers: processed.iter().map(Item::from).collect(),
        };
        writeln!(out, "{}", output::render(&section, format)?)?;
        out.flush()?;
    }
    Ok(())
}

/// A library must follow at least one feed before it can be digested.
fn ensure_feeds(library: &Library, name: &str) -> Result<()> {
    if library.list_urls()?.is_empty() {
        bail!("Library `{name}` has no feeds; add one with `papersift add-feed {name} <URL>`");
    }
    Ok(())
}
