//! RSS/Atom parser using quick-xml
//!
//! Event-driven parser covering the subset of RSS 2.0 and Atom that arXiv
//! listings and API results use. Elements are matched by local name, so
//! `dc:creator` and `creator` are the same thing.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use papersift_core::{EntryTag, Paper};

/// Parsed feed document
#[derive(Debug, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub link: Option<String>,
    pub items: Vec<FeedItem>,
}

/// One `<item>` (RSS) or `<entry>` (Atom)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub authors: Vec<String>,
    pub categories: Vec<EntryTag>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Authors as one comma-separated string.
    pub fn joined_authors(&self) -> String {
        self.authors.join(", ")
    }
}

impl From<&FeedItem> for Paper {
    fn from(item: &FeedItem) -> Self {
        Paper::new(
            item.id.clone(),
            item.title.clone(),
            item.link.clone(),
            item.summary.clone(),
            item.categories.clone(),
            item.published.or(item.updated).unwrap_or_else(Utc::now),
            item.joined_authors(),
        )
    }
}

/// Parse an RFC 2822 (RSS) or RFC 3339 (Atom) timestamp.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.context("malformed attribute")?;
        if a.key.local_name().as_ref() == key {
            let value = a.unescape_value().context("bad attribute value")?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Accumulates the fields of one item while its subtree is being read.
#[derive(Default)]
struct ItemBuilder {
    item: FeedItem,
    /// `domain` of an RSS `<category>` waiting for its text
    pending_scheme: Option<String>,
    summary_from_content: bool,
}

impl ItemBuilder {
    /// Attribute-carrying elements (Atom `link` and `category`).
    fn open(&mut self, name: &str, e: &BytesStart<'_>) -> Result<()> {
        match name {
            "link" => {
                let rel = attr(e, b"rel")?;
                if let Some(href) = attr(e, b"href")? {
                    if self.item.link.is_empty() && matches!(rel.as_deref(), None | Some("alternate"))
                    {
                        self.item.link = href;
                    }
                }
            }
            "category" => {
                if let Some(term) = attr(e, b"term")? {
                    self.item.categories.push(EntryTag {
                        term,
                        scheme: attr(e, b"scheme")?,
                        label: attr(e, b"label")?,
                    });
                } else {
                    self.pending_scheme = attr(e, b"domain")?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Text-carrying elements. `parent` is the enclosing element's name.
    fn close(&mut self, name: &str, parent: Option<&str>, text: &str) {
        let text = text.trim();
        match name {
            "title" => self.item.title = collapse_whitespace(text),
            "link" if !text.is_empty() && self.item.link.is_empty() => {
                self.item.link = text.to_string();
            }
            "guid" | "id" => self.item.id = text.to_string(),
            "description" | "summary" => {
                self.item.summary = text.to_string();
                self.summary_from_content = false;
            }
            "content" | "encoded" if self.item.summary.is_empty() || self.summary_from_content => {
                self.item.summary = text.to_string();
                self.summary_from_content = true;
            }
            "creator" if !text.is_empty() => self.item.authors.push(text.to_string()),
            "name" if parent == Some("author") && !text.is_empty() => {
                self.item.authors.push(text.to_string());
            }
            // RSS <author> carries text; Atom <author> wraps <name>
            "author" if !text.is_empty() => self.item.authors.push(text.to_string()),
            "category" => {
                let scheme = self.pending_scheme.take();
                if !text.is_empty() {
                    self.item.categories.push(EntryTag {
                        term: text.to_string(),
                        scheme,
                        label: None,
                    });
                }
            }
            "pubDate" | "published" | "date" | "issued" => {
                self.item.published = parse_timestamp(text).or(self.item.published);
            }
            "updated" | "modified" => self.item.updated = parse_timestamp(text),
            _ => {}
        }
    }

    /// Items without any identifier cannot be deduplicated and are dropped.
    fn finish(mut self) -> Option<FeedItem> {
        if self.item.id.is_empty() {
            if self.item.link.is_empty() {
                return None;
            }
            self.item.id = self.item.link.clone();
        }
        Some(self.item)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse an RSS 2.0 or Atom document.
pub fn parse_feed(xml: &str) -> Result<ParsedFeed> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed = ParsedFeed::default();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<ItemBuilder> = None;
    let mut text = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if !saw_root {
                    anyhow::ensure!(
                        matches!(name.as_str(), "rss" | "feed" | "RDF"),
                        "not a feed document (root element <{name}>)"
                    );
                    saw_root = true;
                }
                if current.is_none() && matches!(name.as_str(), "item" | "entry") {
                    current = Some(ItemBuilder::default());
                } else if let Some(builder) = current.as_mut() {
                    builder.open(&name, &e)?;
                } else if name == "link" && feed.link.is_none() {
                    feed.link = attr(&e, b"href")?;
                }
                stack.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                match &mut current {
                    Some(builder) => builder.open(&name, &e)?,
                    None if name == "link" && feed.link.is_none() => {
                        let rel = attr(&e, b"rel")?;
                        if matches!(rel.as_deref(), None | Some("alternate")) {
                            feed.link = attr(&e, b"href")?;
                        }
                    }
                    None => {}
                }
            }
            Ok(Event::Text(e)) => {
                let unescaped = e.unescape().context("bad text content")?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(Event::End(_)) => {
                let name = stack.pop().unwrap_or_default();
                let parent = stack.last().map(String::as_str);
                if matches!(name.as_str(), "item" | "entry") {
                    if let Some(item) = current.take().and_then(ItemBuilder::finish) {
                        feed.items.push(item);
                    }
                } else if let Some(builder) = current.as_mut() {
                    builder.close(&name, parent, &text);
                } else if matches!(parent, Some("channel" | "feed")) {
                    match name.as_str() {
                        "title" if feed.title.is_none() => {
                            feed.title = Some(collapse_whitespace(&text));
                        }
                        "link" if feed.link.is_none() && !text.trim().is_empty() => {
                            feed.link = Some(text.trim().to_string());
                        }
                        _ => {}
                    }
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("XML parse error at byte {}", reader.buffer_position())
                });
            }
            _ => {}
        }
    }

    anyhow::ensure!(saw_root, "empty feed document");
    log::debug!(
        "parsed feed {:?}: {} items",
        feed.title.as_deref().unwrap_or("<untitled>"),
        feed.items.len()
    );
    Ok(feed)
}
