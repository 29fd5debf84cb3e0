//! Persistent feed store for one library
//!
//! One DuckDB file per library:
//! ```text
//! {data_dir}/
//! ├── {library}.duckdb       # feeds, entries, entry_tags
//! └── {library}.duckdb.wal   # DuckDB write-ahead log (sidecar)
//! ```
//!
//! Entries are keyed by `(feed_url, id)`. Refreshing a feed inserts unseen
//! entries and refreshes the text of known ones; read flags and tags are
//! never touched by a refresh.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::{Connection, params, params_from_iter};
use serde_json::Value;

use papersift_core::{EntryTag, Paper};

use crate::fetch::FeedFetcher;
use crate::parser::{FeedItem, parse_feed, parse_timestamp};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS feeds (
    url         VARCHAR PRIMARY KEY,
    title       VARCHAR,
    link        VARCHAR,
    updated_at  VARCHAR,
    added_at    VARCHAR NOT NULL
);
CREATE TABLE IF NOT EXISTS entries (
    feed_url        VARCHAR NOT NULL,
    id              VARCHAR NOT NULL,
    title           VARCHAR NOT NULL,
    link            VARCHAR NOT NULL,
    summary         VARCHAR NOT NULL,
    authors         VARCHAR NOT NULL,
    categories_json VARCHAR NOT NULL,
    published       VARCHAR,
    added_at        VARCHAR NOT NULL,
    is_read         BOOLEAN NOT NULL DEFAULT false,
    PRIMARY KEY (feed_url, id)
);
CREATE TABLE IF NOT EXISTS entry_tags (
    feed_url    VARCHAR NOT NULL,
    entry_id    VARCHAR NOT NULL,
    tag_key     VARCHAR NOT NULL,
    value_json  VARCHAR NOT NULL,
    PRIMARY KEY (feed_url, entry_id, tag_key)
);
";

const ENTRY_COLUMNS: &str =
    "feed_url, id, title, link, summary, authors, categories_json, published, added_at, is_read";

/// Store errors callers may want to match on.
#[derive(Debug)]
pub enum StoreError {
    /// `add_feed` without `exist_ok` on an already registered URL
    FeedExists(String),
    /// Operation on an entry the store does not hold
    EntryNotFound { feed_url: String, id: String },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FeedExists(url) => write!(f, "feed already exists: {url}"),
            Self::EntryNotFound { feed_url, id } => {
                write!(f, "entry not found: {id} (feed {feed_url})")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// A subscribed feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feed {
    pub url: String,
    pub title: Option<String>,
    pub link: Option<String>,
}

/// An entry as held by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub feed_url: String,
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    pub authors: String,
    pub categories: Vec<EntryTag>,
    pub published: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
    pub read: bool,
}

impl From<&Entry> for Paper {
    fn from(entry: &Entry) -> Self {
        Paper::new(
            entry.id.clone(),
            entry.title.clone(),
            entry.link.clone(),
            entry.summary.clone(),
            entry.categories.clone(),
            entry.published.unwrap_or(entry.added_at),
            entry.authors.clone(),
        )
    }
}

/// Entry counts for a read-state filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryCounts {
    pub total: Option<u64>,
}

/// Selection for [`FeedStore::get_entries`]. Results are most recent first.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub limit: Option<usize>,
    pub read: Option<bool>,
    /// Every listed tag key must be present on the entry
    pub tags: Vec<String>,
}

impl EntryFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn unread() -> Self {
        Self {
            read: Some(false),
            ..Self::default()
        }
    }

    pub fn read(mut self, read: bool) -> Self {
        self.read = Some(read);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>) -> Self {
        self.tags.push(key.into());
        self
    }
}

/// Row as read from DuckDB, before timestamp/JSON decoding.
struct RawEntry {
    feed_url: String,
    id: String,
    title: String,
    link: String,
    summary: String,
    authors: String,
    categories_json: String,
    published: Option<String>,
    added_at: String,
    read: bool,
}

impl RawEntry {
    fn into_entry(self) -> Result<Entry> {
        let categories = serde_json::from_str(&self.categories_json)
            .with_context(|| format!("corrupt categories on entry {}", self.id))?;
        let added_at = parse_timestamp(&self.added_at)
            .with_context(|| format!("corrupt added_at on entry {}", self.id))?;
        Ok(Entry {
            categories,
            published: self.published.as_deref().and_then(parse_timestamp),
            added_at,
            feed_url: self.feed_url,
            id: self.id,
            title: self.title,
            link: self.link,
            summary: self.summary,
            authors: self.authors,
            read: self.read,
        })
    }
}

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Feed store backed by one DuckDB database.
pub struct FeedStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl FeedStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store dir: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open store: {}", path.display()))?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Volatile store, for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("failed to create store schema")?;
        Ok(Self { conn, path })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// DuckDB's write-ahead log next to the database file.
    pub fn sidecar_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".wal");
        PathBuf::from(name)
    }

    /// Delete a store file and its sidecar. Returns whether the store existed.
    pub fn remove_files(path: &Path) -> Result<bool> {
        let existed = path.is_file();
        for file in [path.to_path_buf(), Self::sidecar_path(path)] {
            if file.is_file() {
                std::fs::remove_file(&file)
                    .with_context(|| format!("failed to remove {}", file.display()))?;
                log::debug!("removed {}", file.display());
            }
        }
        Ok(existed)
    }

    /// Register a feed URL. With `exist_ok`, re-adding is a no-op.
    pub fn add_feed(&self, url: &str, exist_ok: bool) -> Result<()> {
        if self.has_feed(url)? {
            if exist_ok {
                return Ok(());
            }
            return Err(StoreError::FeedExists(url.to_string()).into());
        }
        self.conn
            .execute(
                "INSERT INTO feeds (url, added_at) VALUES (?, ?)",
                params![url, timestamp(Utc::now())],
            )
            .with_context(|| format!("failed to add feed {url}"))?;
        log::info!("added feed {url}");
        Ok(())
    }

    fn has_feed(&self, url: &str) -> Result<bool> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM feeds WHERE url = ?", params![url], |row| {
                row.get(0)
            })?;
        Ok(n > 0)
    }

    /// All registered feeds, oldest registration first.
    pub fn get_feeds(&self) -> Result<Vec<Feed>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url, title, link FROM feeds ORDER BY added_at, url")?;
        let feeds = stmt
            .query_map([], |row| {
                Ok(Feed {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    link: row.get(2)?,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()
            .context("failed to list feeds")?;
        Ok(feeds)
    }

    /// Fetch every feed and merge its items. Returns the number of new entries.
    ///
    /// The first fetch or parse failure aborts the update.
    pub fn update_feeds(&self, fetcher: &dyn FeedFetcher) -> Result<usize> {
        let mut total_new = 0;
        for feed in self.get_feeds()? {
            let body = fetcher.fetch(&feed.url)?;
            let parsed =
                parse_feed(&body).with_context(|| format!("invalid feed at {}", feed.url))?;
            let now = timestamp(Utc::now());

            self.conn
                .execute(
                    "UPDATE feeds SET title = ?, link = ?, updated_at = ? WHERE url = ?",
                    params![parsed.title, parsed.link, now, feed.url],
                )
                .with_context(|| format!("failed to update feed {}", feed.url))?;

            let mut new = 0;
            for item in &parsed.items {
                if self.merge_item(&feed.url, item, &now)? {
                    new += 1;
                }
            }
            log::info!(
                "{}: {} items, {new} new",
                feed.title.as_deref().unwrap_or(&feed.url),
                parsed.items.len()
            );
            total_new += new;
        }
        Ok(total_new)
    }

    /// Insert an unseen item or refresh a known one. Returns true if inserted.
    fn merge_item(&self, feed_url: &str, item: &FeedItem, now: &str) -> Result<bool> {
        let categories =
            serde_json::to_string(&item.categories).context("failed to encode categories")?;
        let published = item.published.or(item.updated).map(timestamp);
        let authors = item.joined_authors();

        let known: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE feed_url = ? AND id = ?",
            params![feed_url, item.id],
            |row| row.get(0),
        )?;

        if known > 0 {
            self.conn
                .execute(
                    "UPDATE entries SET title = ?, link = ?, summary = ?, authors = ?,
                         categories_json = ?, published = ?
                     WHERE feed_url = ? AND id = ?",
                    params![
                        item.title,
                        item.link,
                        item.summary,
                        authors,
                        categories,
                        published,
                        feed_url,
                        item.id
                    ],
                )
                .with_context(|| format!("failed to refresh entry {}", item.id))?;
            return Ok(false);
        }

        self.conn
            .execute(
                "INSERT INTO entries (feed_url, id, title, link, summary, authors,
                     categories_json, published, added_at, is_read)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, false)",
                params![
                    feed_url,
                    item.id,
                    item.title,
                    item.link,
                    item.summary,
                    authors,
                    categories,
                    published,
                    now
                ],
            )
            .with_context(|| format!("failed to insert entry {}", item.id))?;
        Ok(true)
    }

    /// Entries matching `filter`, most recent first.
    pub fn get_entries(&self, filter: &EntryFilter) -> Result<Vec<Entry>> {
        let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM entries e WHERE 1 = 1");
        if let Some(read) = filter.read {
            sql.push_str(if read {
                " AND is_read = true"
            } else {
                " AND is_read = false"
            });
        }
        for _ in &filter.tags {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM entry_tags t
                     WHERE t.feed_url = e.feed_url AND t.entry_id = e.id AND t.tag_key = ?)",
            );
        }
        sql.push_str(" ORDER BY COALESCE(published, added_at) DESC, feed_url, id");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(filter.tags.iter()), |row| {
            Ok(RawEntry {
                feed_url: row.get(0)?,
                id: row.get(1)?,
                title: row.get(2)?,
                link: row.get(3)?,
                summary: row.get(4)?,
                authors: row.get(5)?,
                categories_json: row.get(6)?,
                published: row.get(7)?,
                added_at: row.get(8)?,
                read: row.get(9)?,
            })
        })?;

        rows.map(|row| {
            row.context("failed to read entry row")
                .and_then(RawEntry::into_entry)
        })
        .collect()
    }

    pub fn mark_entry_as_read(&self, entry: &Entry) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE entries SET is_read = true WHERE feed_url = ? AND id = ?",
                params![entry.feed_url, entry.id],
            )
            .with_context(|| format!("failed to mark {} as read", entry.id))?;
        if changed == 0 {
            return Err(StoreError::EntryNotFound {
                feed_url: entry.feed_url.clone(),
                id: entry.id.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Set (or overwrite) one tag on an entry.
    pub fn set_tag(&self, entry: &Entry, key: &str, value: &Value) -> Result<()> {
        let value_json = serde_json::to_string(value).context("failed to encode tag value")?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO entry_tags (feed_url, entry_id, tag_key, value_json)
                 VALUES (?, ?, ?, ?)",
                params![entry.feed_url, entry.id, key, value_json],
            )
            .with_context(|| format!("failed to set tag {key} on {}", entry.id))?;
        Ok(())
    }

    pub fn get_tags(&self, entry: &Entry) -> Result<BTreeMap<String, Value>> {
        let mut stmt = self.conn.prepare(
            "SELECT tag_key, value_json FROM entry_tags WHERE feed_url = ? AND entry_id = ?",
        )?;
        let rows = stmt.query_map(params![entry.feed_url, entry.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tags = BTreeMap::new();
        for row in rows {
            let (key, value_json) = row.context("failed to read tag row")?;
            let value = serde_json::from_str(&value_json)
                .with_context(|| format!("corrupt tag {key} on {}", entry.id))?;
            tags.insert(key, value);
        }
        Ok(tags)
    }

    pub fn get_entry_counts(&self, read: bool) -> Result<EntryCounts> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE is_read = ?",
            params![read],
            |row| row.get(0),
        )?;
        Ok(EntryCounts {
            total: u64::try_from(n).ok(),
        })
    }
}
