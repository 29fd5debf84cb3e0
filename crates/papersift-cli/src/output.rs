//! Rendering digest results as tables, markdown or JSON

use anyhow::Result;
use comfy_table::{
    Cell, Color, ContentArrangement, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};
use serde::Serialize;

use papersift_core::PaperAndSummary;
use papersift_library::Processed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Table,
    Markdown,
    Json,
}

impl Format {
    pub fn from_flags(markdown: bool, json: bool) -> Self {
        if json {
            Format::Json
        } else if markdown {
            Format::Markdown
        } else {
            Format::Table
        }
    }
}

/// Papers from one library, ready to print.
#[derive(Debug, Serialize)]
pub struct Section<'a> {
    pub library: &'a str,
    pub papers: Vec<Item<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Item<'a> {
    Paper(&'a papersift_core::Paper),
    Summarized(&'a PaperAndSummary),
}

impl<'a> From<&'a Processed> for Item<'a> {
    fn from(p: &'a Processed) -> Self {
        match p {
            Processed::Listed(paper) => Item::Paper(paper),
            Processed::Judged(judged) => Item::Summarized(judged),
        }
    }
}

impl<'a> From<&'a PaperAndSummary> for Item<'a> {
    fn from(p: &'a PaperAndSummary) -> Self {
        Item::Summarized(p)
    }
}

impl Item<'_> {
    fn to_markdown(&self) -> String {
        match self {
            Item::Paper(paper) => paper.to_markdown(),
            Item::Summarized(judged) => judged.to_markdown(),
        }
    }
}

fn header(cells: &[&str]) -> Vec<Cell> {
    cells.iter().map(|c| Cell::new(c).fg(Color::Cyan)).collect()
}

/// Shorten to at most `max` characters.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn table(section: &Section<'_>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header(&["Title", "Summary", "Link"]));

    for item in &section.papers {
        let (paper, text) = match item {
            Item::Paper(paper) => (*paper, truncate(paper.display_abstract(), 300)),
            Item::Summarized(judged) => (&judged.paper, judged.summary.clone()),
        };
        table.add_row(vec![
            Cell::new(paper.title()),
            Cell::new(text),
            Cell::new(paper.link()).fg(Color::DarkGrey),
        ]);
    }
    table
}

/// Render one library's papers.
///
/// JSON is a single line per library, so a multi-library digest prints
/// JSON Lines.
pub fn render(section: &Section<'_>, format: Format) -> Result<String> {
    match format {
        Format::Json => Ok(serde_json::to_string(section)?),
        Format::Markdown => {
            let mut out = format!("## {}\n\n", section.library);
            if section.papers.is_empty() {
                out.push_str("_No new papers._\n");
            }
            for item in &section.papers {
                out.push_str(&item.to_markdown());
                out.push('\n');
            }
            Ok(out)
        }
        Format::Table if section.papers.is_empty() => {
            Ok(format!("{}: no new papers\n", section.library))
        }
        Format::Table => Ok(format!("{}\n{}\n", section.library, table(section))),
    }
}

/// Plain settings table with a cyan header row.
pub fn key_value_table(rows: &[(&str, String)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(header(&["Setting", "Value"]));
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use papersift_core::Paper;

    fn paper() -> Paper {
        Paper::new(
            "2401.00001".to_string(),
            "Speculative Decoding".to_string(),
            "https://arxiv.org/abs/2401.00001".to_string(),
            "arXiv:2401.00001 Announce Type: new Abstract: Faster decoding.".to_string(),
            Vec::new(),
            DateTime::UNIX_EPOCH,
            "A. Author".to_string(),
        )
    }

    #[test]
    fn format_flags() {
        assert_eq!(Format::from_flags(false, false), Format::Table);
        assert_eq!(Format::from_flags(true, false), Format::Markdown);
        assert_eq!(Format::from_flags(true, true), Format::Json);
    }

    #[test]
    fn markdown_has_heading_and_checklist() {
        let judged = PaperAndSummary::new(paper(), "Drafts tokens cheaply.".to_string());
        let section = Section {
            library: "ml",
            papers: vec![Item::from(&judged)],
        };
        let out = render(&section, Format::Markdown).unwrap();
        assert!(out.starts_with("## ml\n\n"));
        assert!(out.contains(
            "- [ ] [Speculative Decoding](https://arxiv.org/abs/2401.00001)\n    - Summary: Drafts tokens cheaply."
        ));
    }

    #[test]
    fn empty_section_says_so() {
        let section = Section {
            library: "bio",
            papers: Vec::new(),
        };
        assert!(render(&section, Format::Markdown).unwrap().contains("No new papers"));
        assert!(render(&section, Format::Table).unwrap().contains("bio: no new papers"));
    }

    #[test]
    fn json_lists_papers_per_library() {
        let listed = Processed::Listed(paper());
        let judged = PaperAndSummary::new(paper(), "S.".to_string());
        let section = Section {
            library: "ml",
            papers: vec![Item::from(&listed), Item::from(&judged)],
        };
        let out = render(&section, Format::Json).unwrap();
        assert!(!out.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();

        assert_eq!(value["library"], "ml");
        assert_eq!(value["papers"][0]["title"], "Speculative Decoding");
        assert_eq!(value["papers"][1]["summary"], "S.");
        assert_eq!(value["papers"][1]["paper"]["link"], "https://arxiv.org/abs/2401.00001");
    }

    #[test]
    fn table_shows_clean_abstract() {
        let listed = Processed::Listed(paper());
        let section = Section {
            library: "ml",
            papers: vec![Item::from(&listed)],
        };
        let out = render(&section, Format::Table).unwrap();
        assert!(out.contains("Faster"));
        assert!(!out.contains("Announce"));
    }

    #[test]
    fn truncate_long_text() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
