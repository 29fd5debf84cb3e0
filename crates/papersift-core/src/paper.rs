//! Paper data model shared by the feed store, the LLM judges and the CLI

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Label that arXiv listings put in front of the abstract body.
const ABSTRACT_LABEL: &str = "Abstract:";

/// One category record attached to a feed entry (`term`, `scheme`, `label`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryTag {
    pub term: String,
    pub scheme: Option<String>,
    pub label: Option<String>,
}

impl EntryTag {
    pub fn term(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            scheme: None,
            label: None,
        }
    }
}

/// Immutable snapshot of one feed entry.
///
/// Built by converting a parsed feed item or a stored entry; the feed crate
/// owns both conversions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paper {
    id: String,
    title: String,
    link: String,
    #[serde(rename = "abstract")]
    abstract_text: String,
    tags: Vec<EntryTag>,
    published: DateTime<Utc>,
    authors: String,
}

impl Paper {
    pub fn new(
        id: String,
        title: String,
        link: String,
        abstract_text: String,
        tags: Vec<EntryTag>,
        published: DateTime<Utc>,
        authors: String,
    ) -> Self {
        Self {
            id,
            title,
            link,
            abstract_text,
            tags,
            published,
            authors,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    /// Raw abstract as delivered by the feed.
    pub fn abstract_text(&self) -> &str {
        &self.abstract_text
    }

    pub fn tags(&self) -> &[EntryTag] {
        &self.tags
    }

    pub fn published(&self) -> DateTime<Utc> {
        self.published
    }

    pub fn authors(&self) -> &str {
        &self.authors
    }

    /// Abstract with any leading listing metadata up to `Abstract:` removed.
    pub fn display_abstract(&self) -> &str {
        match self.abstract_text.find(ABSTRACT_LABEL) {
            Some(pos) => self.abstract_text[pos + ABSTRACT_LABEL.len()..].trim(),
            None => self.abstract_text.trim(),
        }
    }

    /// Text handed to the reranker: title and abstract.
    pub fn document(&self) -> String {
        format!("{} {}", self.title, self.abstract_text)
    }

    /// Markdown checklist item with the abstract as a sub-bullet.
    pub fn to_markdown(&self) -> String {
        format!(
            "- [ ] [{}]({})\n    - Abstract: {}",
            self.title,
            self.link,
            self.display_abstract()
        )
    }
}

/// A paper together with the one-sentence summary generated for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaperAndSummary {
    pub paper: Paper,
    pub summary: String,
}

impl PaperAndSummary {
    pub fn new(paper: Paper, summary: String) -> Self {
        Self { paper, summary }
    }

    pub fn to_markdown(&self) -> String {
        format!(
            "- [ ] [{}]({})\n    - Summary: {}",
            self.paper.title, self.paper.link, self.summary
        )
    }
}
