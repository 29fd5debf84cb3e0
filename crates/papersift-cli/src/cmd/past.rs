//! `papersift show-past-papers` - everything judged relevant so far

use anyhow::Result;
use clap::Args;

use crate::config::AppContext;
use crate::output::{self, Format, Item, Section};

#[derive(Args, Debug)]
pub struct ShowPastArgs {
    /// Library name
    pub library: String,

    /// Print a markdown checklist
    #[arg(short = 'm', long = "in-markdown")]
    pub markdown: bool,

    /// Print JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ShowPastArgs, ctx: &AppContext) -> Result<()> {
    ctx.requirement(&args.library)?;
    let library = ctx.open_library(&args.library)?;
    let papers = library.get_past_relevant_papers()?;

    let section = Section {
        library: &args.library,
        papers: papers.iter().map(Item::from).collect(),
    };
    println!(
        "{}",
        output::render(&section, Format::from_flags(args.markdown, args.json))?
    );
    Ok(())
}
