//! `papersift show-libraries` / `remove-library`

use anyhow::{Result, bail};
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::AppContext;

#[derive(Args, Debug)]
pub struct RemoveLibraryArgs {
    /// Library name
    pub name: String,
}

pub fn show(ctx: &AppContext) -> Result<()> {
    let registry = ctx.libraries()?;
    if registry.is_empty() {
        eprintln!("No libraries. Create one with `papersift create-feed`.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Name").fg(Color::Cyan),
            Cell::new("URLs").fg(Color::Cyan),
            Cell::new("Requirement").fg(Color::Cyan),
            Cell::new("# unchecked papers").fg(Color::Cyan),
        ]);

    for (name, requirement) in &registry {
        let library = ctx.open_library(name)?;
        let urls = library.list_urls()?;
        // A feed that is down should not hide the other libraries
        let unchecked = match library.count_unchecked_papers() {
            Ok(n) => Cell::new(n),
            Err(e) => {
                log::warn!("{name}: {e:#}");
                Cell::new("?").fg(Color::Red)
            }
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(urls.join("\n")),
            Cell::new(requirement),
            unchecked,
        ]);
    }

    println!("{table}");
    Ok(())
}

pub fn remove(args: RemoveLibraryArgs, ctx: &AppContext) -> Result<()> {
    let mut registry = ctx.libraries()?;
    if registry.remove(&args.name).is_none() {
        bail!("Unknown library `{}`; see `papersift show-libraries`", args.name);
    }
    ctx.save_libraries(&registry)?;

    if !ctx.remove_library_files(&args.name)? {
        log::warn!("{}: no store file found", args.name);
    }
    eprintln!("Removed library `{}`", args.name);
    Ok(())
}
