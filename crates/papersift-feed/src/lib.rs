//! papersift-feed: feed subscriptions and entry state
//!
//! Parses RSS 2.0 and Atom feeds, fetches them over HTTP, and keeps a
//! per-library DuckDB store of feeds, entries, read flags and entry tags.

pub mod fetch;
pub mod parser;
pub mod store;

pub use fetch::{FeedFetcher, HttpFetcher, StaticFetcher};
pub use parser::{FeedItem, ParsedFeed, parse_feed};
pub use store::{Entry, EntryCounts, EntryFilter, Feed, FeedStore, StoreError};
