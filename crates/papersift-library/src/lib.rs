//! papersift-library: the digest pipeline over one feed store
//!
//! Sync feeds, pick unread candidates, optionally rerank them against the
//! requirement, then judge each one (or just list it) and record the verdict
//! as entry tags.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use papersift_core::{Paper, PaperAndSummary};
use papersift_feed::{Entry, EntryFilter, FeedFetcher, FeedStore};
use papersift_llm::{Classifier, Reranker, Summarizer};

/// Tag set to `true` on entries judged relevant.
pub const TAG_IS_RELEVANT: &str = "is_relevant";
/// Tag holding the summary of a relevant entry.
pub const TAG_GENERATED_SUMMARY: &str = "generated_summary";

/// Candidates fetched per requested paper when reranking.
pub const DEFAULT_CANDIDATE_FACTOR: usize = 2;

/// The two judges of judging mode.
#[derive(Clone, Copy)]
pub struct Judges<'a> {
    pub classifier: &'a dyn Classifier,
    pub summarizer: &'a dyn Summarizer,
}

/// One visited candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    /// Listing mode: the entry was only marked read.
    Listed(Paper),
    /// Judging mode: the entry was relevant and summarized.
    Judged(PaperAndSummary),
}

impl Processed {
    pub fn paper(&self) -> &Paper {
        match self {
            Processed::Listed(paper) => paper,
            Processed::Judged(judged) => &judged.paper,
        }
    }
}

pub struct Library {
    store: FeedStore,
    fetcher: Box<dyn FeedFetcher>,
    candidate_factor: usize,
}

impl Library {
    pub fn new(store: FeedStore, fetcher: Box<dyn FeedFetcher>) -> Self {
        Self {
            store,
            fetcher,
            candidate_factor: DEFAULT_CANDIDATE_FACTOR,
        }
    }

    /// Open an existing store file (created if missing).
    pub fn open(path: &Path, fetcher: Box<dyn FeedFetcher>) -> Result<Self> {
        Ok(Self::new(FeedStore::open(path)?, fetcher))
    }

    /// Start over: delete any store at `path` (and its sidecar), then open it.
    pub fn create(path: &Path, fetcher: Box<dyn FeedFetcher>) -> Result<Self> {
        if FeedStore::remove_files(path)? {
            log::info!("Removed existing store {}", path.display());
        }
        Self::open(path, fetcher)
    }

    pub fn with_candidate_factor(mut self, factor: usize) -> Self {
        self.candidate_factor = factor.max(1);
        self
    }

    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    pub fn list_urls(&self) -> Result<Vec<String>> {
        Ok(self.store.get_feeds()?.into_iter().map(|f| f.url).collect())
    }

    /// Register a feed (no-op if already present) and sync.
    pub fn add_url(&self, url: &str) -> Result<()> {
        self.store.add_feed(url, true)?;
        self.sync()?;
        Ok(())
    }

    /// Sync, then count entries nobody has looked at yet.
    pub fn count_unchecked_papers(&self) -> Result<u64> {
        self.sync()?;
        Ok(self.store.get_entry_counts(false)?.total.unwrap_or(0))
    }

    /// Every entry ever judged relevant, with its stored summary.
    pub fn get_past_relevant_papers(&self) -> Result<Vec<PaperAndSummary>> {
        let entries = self
            .store
            .get_entries(&EntryFilter::all().with_tag(TAG_IS_RELEVANT))?;

        entries
            .iter()
            .map(|entry| {
                let tags = self.store.get_tags(entry)?;
                let summary = match tags.get(TAG_GENERATED_SUMMARY) {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => anyhow::bail!(
                        "entry {} is tagged {TAG_IS_RELEVANT} but has no {TAG_GENERATED_SUMMARY}",
                        entry.id
                    ),
                };
                Ok(PaperAndSummary::new(Paper::from(entry), summary))
            })
            .collect()
    }

    /// Run one digest pass.
    ///
    /// Every visited candidate is marked read before it is judged, so a
    /// failure part-way leaves earlier verdicts in place and the failing entry
    /// is not retried on the next pass. Returns at most `limit` items.
    pub fn get_papers(
        &self,
        limit: usize,
        requirement: &str,
        judges: Option<Judges<'_>>,
        reranker: Option<&dyn Reranker>,
    ) -> Result<Vec<Processed>> {
        self.sync()?;

        let fetch = match reranker {
            Some(_) => limit.saturating_mul(self.candidate_factor),
            None => limit,
        };
        let candidates = self.store.get_entries(&EntryFilter::unread().limit(fetch))?;
        log::debug!("{} unread candidate(s)", candidates.len());

        let candidates = match reranker {
            Some(reranker) => rerank(candidates, requirement, reranker),
            None => candidates,
        };

        let mut out = Vec::new();
        for entry in candidates.iter().take(limit) {
            self.store.mark_entry_as_read(entry)?;
            let paper = Paper::from(entry);

            match judges {
                Some(judges) => {
                    if let Some(judged) = self.judge(entry, paper, requirement, judges)? {
                        out.push(Processed::Judged(judged));
                    }
                }
                None => out.push(Processed::Listed(paper)),
            }
        }
        Ok(out)
    }

    fn judge(
        &self,
        entry: &Entry,
        paper: Paper,
        requirement: &str,
        judges: Judges<'_>,
    ) -> Result<Option<PaperAndSummary>> {
        if !judges.classifier.is_relevant(requirement, &paper) {
            log::debug!("{}: not relevant", entry.id);
            return Ok(None);
        }
        let judged = judges
            .summarizer
            .summarize(requirement, &paper)
            .with_context(|| format!("failed to summarize {}", entry.id))?;

        self.store.set_tag(entry, TAG_IS_RELEVANT, &json!(true))?;
        self.store
            .set_tag(entry, TAG_GENERATED_SUMMARY, &json!(judged.summary))?;
        log::info!("{}: relevant", entry.id);
        Ok(Some(judged))
    }

    fn sync(&self) -> Result<usize> {
        let added = self
            .store
            .update_feeds(self.fetcher.as_ref())
            .context("failed to sync feeds")?;
        if added > 0 {
            log::info!("{added} new entries");
        }
        Ok(added)
    }
}

/// Reorder candidates by the reranker's indices, dropping bad and repeated
/// ones. On failure the store order is kept.
fn rerank(candidates: Vec<Entry>, requirement: &str, reranker: &dyn Reranker) -> Vec<Entry> {
    if candidates.is_empty() {
        return candidates;
    }
    let documents: Vec<String> = candidates
        .iter()
        .map(|e| Paper::from(e).document())
        .collect();

    let order = match reranker.rank(&documents, requirement) {
        Ok(order) => order,
        Err(e) => {
            log::warn!("Reranking failed, keeping feed order: {e:#}");
            return candidates;
        }
    };

    let mut slots: Vec<Option<Entry>> = candidates.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots.get_mut(i).and_then(Option::take))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(id: &str) -> Entry {
        Entry {
            feed_url: "https://example.org/feed".to_string(),
            id: id.to_string(),
            title: format!("Title {id}"),
            link: format!("https://example.org/{id}"),
            summary: format!("Abstract {id}"),
            authors: String::new(),
            categories: Vec::new(),
            published: None,
            added_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            read: false,
        }
    }

    struct Fixed(Vec<usize>);

    impl Reranker for Fixed {
        fn rank(&self, _: &[String], _: &str) -> Result<Vec<usize>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl Reranker for Broken {
        fn rank(&self, _: &[String], _: &str) -> Result<Vec<usize>> {
            anyhow::bail!("embeddings endpoint down")
        }
    }

    fn ids(entries: &[Entry]) -> Vec<&str> {
        entries.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn rerank_follows_indices() {
        let out = rerank(
            vec![entry("a"), entry("b"), entry("c")],
            "q",
            &Fixed(vec![2, 0, 1]),
        );
        assert_eq!(ids(&out), vec!["c", "a", "b"]);
    }

    #[test]
    fn rerank_skips_bad_and_repeated_indices() {
        let out = rerank(
            vec![entry("a"), entry("b"), entry("c")],
            "q",
            &Fixed(vec![1, 7, 1, 0]),
        );
        assert_eq!(ids(&out), vec!["b", "a"]);
    }

    #[test]
    fn rerank_failure_keeps_order() {
        let out = rerank(vec![entry("a"), entry("b")], "q", &Broken);
        assert_eq!(ids(&out), vec!["a", "b"]);
    }

    #[test]
    fn processed_exposes_paper() {
        let paper = Paper::from(&entry("a"));
        let judged = Processed::Judged(PaperAndSummary::new(paper.clone(), "s".to_string()));
        assert_eq!(judged.paper(), &paper);
        assert_eq!(Processed::Listed(paper.clone()).paper(), &paper);
    }
}
