//! `papersift create-feed` / `add-feed`

use anyhow::{Context, Result, bail};
use clap::Args;

use crate::config::AppContext;

#[derive(Args, Debug)]
pub struct CreateFeedArgs {
    /// Library name
    pub library: String,
    /// Feed URL (RSS or Atom)
    pub url: String,
    /// What papers you are looking for, in plain words
    pub requirement: String,
    /// Replace an existing library of the same name
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Args, Debug)]
pub struct AddFeedArgs {
    /// Existing library name
    pub library: String,
    /// Feed URL (RSS or Atom)
    pub url: String,
}

pub fn create(args: CreateFeedArgs, ctx: &AppContext) -> Result<()> {
    let mut registry = ctx.libraries()?;
    if registry.contains_key(&args.library) && !args.overwrite {
        bail!(
            "Library `{}` already exists; pass --overwrite to replace it",
            args.library
        );
    }

    let library = ctx.create_library(&args.library)?;
    library
        .add_url(&args.url)
        .with_context(|| format!("Failed to add feed {}", args.url))?;

    registry.insert(args.library.clone(), args.requirement);
    ctx.save_libraries(&registry)?;

    let unread = library.store().get_entry_counts(false)?.total.unwrap_or(0);
    eprintln!(
        "Created library `{}` with {unread} paper(s) to check",
        args.library
    );
    Ok(())
}

pub fn add(args: AddFeedArgs, ctx: &AppContext) -> Result<()> {
    ctx.requirement(&args.library)?;
    let library = ctx.open_library(&args.library)?;
    library
        .add_url(&args.url)
        .with_context(|| format!("Failed to add feed {}", args.url))?;
    eprintln!(
        "Library `{}` now follows {} feed(s)",
        args.library,
        library.list_urls()?.len()
    );
    Ok(())
}
