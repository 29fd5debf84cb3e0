//! End-to-end digest passes against canned feeds and scripted judges

use std::cell::RefCell;
use std::collections::VecDeque;

use papersift_core::{HttpError, Paper, PaperAndSummary};
use papersift_feed::{EntryFilter, FeedStore, StaticFetcher};
use papersift_library::{Judges, Library, Processed, TAG_GENERATED_SUMMARY, TAG_IS_RELEVANT};
use papersift_llm::{
    Classifier, Completion, CompletionEndpoint, CompletionError, CompletionRequest, LlmClassifier,
    LlmSummarizer, Reranker, Summarizer,
};
use serde_json::json;
use tempfile::TempDir;

const FEED_URL: &str = "https://rss.example.org/cs.LG";
const REQUIREMENT: &str = "Papers about LLM inference";

/// RSS with `titles[0]` as the most recent item.
fn rss(titles: &[&str]) -> String {
    let items: String = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let day = 28 - i;
            format!(
                "<item><title>{title}</title><link>https://arxiv.org/abs/2402.{i:05}</link>\
                 <description>Abstract: A study of {title}.</description>\
                 <guid>oai:arXiv.org:2402.{i:05}</guid>\
                 <pubDate>2024-02-{day}T00:00:00Z</pubDate></item>"
            )
        })
        .collect();
    format!("<rss version=\"2.0\"><channel><title>cs.LG</title>{items}</channel></rss>")
}

const FIVE: [&str; 5] = [
    "LLM serving at scale",
    "Protein folding",
    "LLM quantization",
    "LLM speculative decoding",
    "Graph coloring",
];

fn library(titles: &[&str]) -> Library {
    let store = FeedStore::open_in_memory().unwrap();
    store.add_feed(FEED_URL, true).unwrap();
    Library::new(store, Box::new(StaticFetcher::new().with(FEED_URL, rss(titles))))
}

/// Relevant when the title mentions LLMs; remembers what it saw.
#[derive(Default)]
struct KeywordClassifier {
    seen: RefCell<Vec<String>>,
}

impl Classifier for KeywordClassifier {
    fn is_relevant(&self, _requirement: &str, paper: &Paper) -> bool {
        self.seen.borrow_mut().push(paper.title().to_string());
        paper.title().contains("LLM")
    }
}

struct EchoSummarizer;

impl Summarizer for EchoSummarizer {
    fn summarize(&self, _: &str, paper: &Paper) -> Result<PaperAndSummary, CompletionError> {
        Ok(PaperAndSummary::new(
            paper.clone(),
            format!("About {}.", paper.title()),
        ))
    }
}

struct DownSummarizer;

impl Summarizer for DownSummarizer {
    fn summarize(&self, _: &str, _: &Paper) -> Result<PaperAndSummary, CompletionError> {
        Err(CompletionError::Http(HttpError::Http {
            status: Some(500),
            message: "internal error".to_string(),
        }))
    }
}

/// Completion endpoint replaying one reply per call.
struct Scripted(RefCell<VecDeque<Result<Completion, CompletionError>>>);

impl Scripted {
    fn new(replies: Vec<Result<Completion, CompletionError>>) -> Self {
        Self(RefCell::new(replies.into()))
    }
}

impl CompletionEndpoint for Scripted {
    fn complete(&self, _: &CompletionRequest) -> Result<Completion, CompletionError> {
        self.0
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(CompletionError::Malformed("script exhausted".to_string())))
    }
}

fn verdict(matches: bool) -> Result<Completion, CompletionError> {
    Ok(Completion {
        content: Some(json!({ "does_match": matches }).to_string()),
        finish_reason: Some("stop".to_string()),
    })
}

struct Fixed(Vec<usize>);

impl Reranker for Fixed {
    fn rank(&self, documents: &[String], query: &str) -> anyhow::Result<Vec<usize>> {
        assert_eq!(query, REQUIREMENT);
        assert!(documents[0].starts_with("LLM serving at scale Abstract:"));
        Ok(self.0.clone())
    }
}

fn titles(out: &[Processed]) -> Vec<&str> {
    out.iter().map(|p| p.paper().title()).collect()
}

fn judges<'a>(classifier: &'a dyn Classifier, summarizer: &'a dyn Summarizer) -> Judges<'a> {
    Judges {
        classifier,
        summarizer,
    }
}

#[test]
fn judged_pass_tags_relevant_papers() {
    let lib = library(&FIVE);
    let classifier = KeywordClassifier::default();

    let out = lib
        .get_papers(5, REQUIREMENT, Some(judges(&classifier, &EchoSummarizer)), None)
        .unwrap();

    assert_eq!(
        titles(&out),
        vec!["LLM serving at scale", "LLM quantization", "LLM speculative decoding"]
    );
    match &out[0] {
        Processed::Judged(judged) => assert_eq!(judged.summary, "About LLM serving at scale."),
        other => panic!("expected a judged paper, got {other:?}"),
    }

    let past = lib.get_past_relevant_papers().unwrap();
    assert_eq!(past.len(), 3);
    assert!(past.iter().all(|p| p.summary.starts_with("About LLM")));
}

#[test]
fn read_marking_is_idempotent_across_passes() {
    let lib = library(&FIVE);
    let classifier = KeywordClassifier::default();

    let first = lib
        .get_papers(2, REQUIREMENT, Some(judges(&classifier, &EchoSummarizer)), None)
        .unwrap();
    assert_eq!(titles(&first), vec!["LLM serving at scale"]);
    assert_eq!(lib.count_unchecked_papers().unwrap(), 3);

    lib.get_papers(10, REQUIREMENT, Some(judges(&classifier, &EchoSummarizer)), None)
        .unwrap();
    assert_eq!(lib.count_unchecked_papers().unwrap(), 0);

    // Each paper was judged exactly once
    let mut seen = classifier.seen.borrow().clone();
    seen.sort();
    let mut expected: Vec<String> = FIVE.iter().map(|s| s.to_string()).collect();
    expected.sort();
    assert_eq!(seen, expected);

    let third = lib
        .get_papers(10, REQUIREMENT, Some(judges(&classifier, &EchoSummarizer)), None)
        .unwrap();
    assert!(third.is_empty());
    assert_eq!(classifier.seen.borrow().len(), 5);
}

#[test]
fn classifier_failure_on_third_entry_is_absorbed() {
    let lib = library(&FIVE);
    let endpoint = Scripted::new(vec![
        verdict(true),
        verdict(false),
        Err(CompletionError::Http(HttpError::Http {
            status: None,
            message: "timed out".to_string(),
        })),
        verdict(true),
        verdict(false),
    ]);
    let classifier = LlmClassifier::new(&endpoint);

    let out = lib
        .get_papers(5, REQUIREMENT, Some(judges(&classifier, &EchoSummarizer)), None)
        .unwrap();

    assert_eq!(
        titles(&out),
        vec!["LLM serving at scale", "LLM speculative decoding"]
    );
    assert_eq!(lib.store().get_entry_counts(true).unwrap().total, Some(5));

    let entries = lib.store().get_entries(&EntryFilter::all()).unwrap();
    let third = entries.iter().find(|e| e.title == "LLM quantization").unwrap();
    assert!(lib.store().get_tags(third).unwrap().is_empty());
}

#[test]
fn rerank_order_drives_processing() {
    let lib = library(&FIVE[..4]);
    let classifier = KeywordClassifier::default();
    let reranker = Fixed(vec![2, 0, 3, 1]);

    lib.get_papers(
        2,
        REQUIREMENT,
        Some(judges(&classifier, &EchoSummarizer)),
        Some(&reranker),
    )
    .unwrap();

    // Capped at the requested count; the rest stay unread
    assert_eq!(
        *classifier.seen.borrow(),
        vec!["LLM quantization", "LLM serving at scale"]
    );
    assert_eq!(lib.count_unchecked_papers().unwrap(), 2);
}

#[test]
fn rerank_visits_full_order_within_limit() {
    let lib = library(&FIVE[..4]);
    let classifier = KeywordClassifier::default();

    lib.get_papers(
        4,
        REQUIREMENT,
        Some(judges(&classifier, &EchoSummarizer)),
        Some(&Fixed(vec![2, 0, 3, 1])),
    )
    .unwrap();

    assert_eq!(
        *classifier.seen.borrow(),
        vec![
            "LLM quantization",
            "LLM serving at scale",
            "LLM speculative decoding",
            "Protein folding"
        ]
    );
}

#[test]
fn listing_mode_marks_read_without_tags() {
    let lib = library(&FIVE);

    let out = lib.get_papers(3, REQUIREMENT, None, None).unwrap();

    assert_eq!(
        titles(&out),
        vec!["LLM serving at scale", "Protein folding", "LLM quantization"]
    );
    assert!(out.iter().all(|p| matches!(p, Processed::Listed(_))));
    assert_eq!(lib.count_unchecked_papers().unwrap(), 2);
    assert!(lib.get_past_relevant_papers().unwrap().is_empty());
}

#[test]
fn summarizer_failure_propagates_after_marking_read() {
    let lib = library(&FIVE);
    let classifier = KeywordClassifier::default();

    let err = lib
        .get_papers(5, REQUIREMENT, Some(judges(&classifier, &DownSummarizer)), None)
        .unwrap_err();
    assert!(format!("{err:#}").contains("internal error"));

    // Only the first candidate was visited
    assert_eq!(lib.store().get_entry_counts(true).unwrap().total, Some(1));
    assert!(lib.get_past_relevant_papers().unwrap().is_empty());
}

#[test]
fn summarizer_refusal_keeps_the_pass_going() {
    let lib = library(&FIVE);
    let classifier = KeywordClassifier::default();
    let endpoint = Scripted::new(vec![
        Err(CompletionError::Refusal("I can't summarize that.".to_string())),
        Ok(Completion {
            content: Some("Quantizes weights to four bits.".to_string()),
            finish_reason: Some("stop".to_string()),
        }),
        Ok(Completion {
            content: Some("Drafts tokens with a small model.".to_string()),
            finish_reason: Some("stop".to_string()),
        }),
    ]);
    let summarizer = LlmSummarizer::new(&endpoint);

    let out = lib
        .get_papers(5, REQUIREMENT, Some(judges(&classifier, &summarizer)), None)
        .unwrap();

    assert_eq!(out.len(), 3);
    let past = lib.get_past_relevant_papers().unwrap();
    let refused = past
        .iter()
        .find(|p| p.paper.title() == "LLM serving at scale")
        .unwrap();
    assert_eq!(refused.summary, "");
    assert_eq!(lib.count_unchecked_papers().unwrap(), 0);
}

#[test]
fn relevant_without_summary_is_an_error() {
    let lib = library(&FIVE);
    lib.get_papers(1, REQUIREMENT, None, None).unwrap();
    let entry = lib
        .store()
        .get_entries(&EntryFilter::all().read(true))
        .unwrap()
        .remove(0);
    lib.store()
        .set_tag(&entry, TAG_IS_RELEVANT, &json!(true))
        .unwrap();

    let err = lib.get_past_relevant_papers().unwrap_err();
    assert!(err.to_string().contains(&entry.id));
    assert!(err.to_string().contains(TAG_GENERATED_SUMMARY));
}

#[test]
fn list_and_add_urls() {
    let second = "https://rss.example.org/cs.CL";
    let store = FeedStore::open_in_memory().unwrap();
    store.add_feed(FEED_URL, true).unwrap();
    let fetcher = StaticFetcher::new()
        .with(FEED_URL, rss(&FIVE[..2]))
        .with(second, rss(&["Tokenizer-free LLM"]));
    let lib = Library::new(store, Box::new(fetcher));

    lib.add_url(second).unwrap();
    lib.add_url(second).unwrap();

    assert_eq!(lib.list_urls().unwrap().len(), 2);
    assert_eq!(lib.count_unchecked_papers().unwrap(), 3);
}

#[test]
fn no_feeds_yields_nothing() {
    let lib = Library::new(
        FeedStore::open_in_memory().unwrap(),
        Box::new(StaticFetcher::new()),
    );
    assert!(lib.list_urls().unwrap().is_empty());
    assert!(lib.get_papers(5, REQUIREMENT, None, None).unwrap().is_empty());
}

#[test]
fn libraries_are_isolated() {
    let dir = TempDir::new().unwrap();
    let ml = Library::create(
        &dir.path().join("ml.duckdb"),
        Box::new(StaticFetcher::new().with(FEED_URL, rss(&FIVE))),
    )
    .unwrap();
    ml.add_url(FEED_URL).unwrap();

    let bio_url = "https://rss.example.org/q-bio";
    let bio = Library::create(
        &dir.path().join("bio.duckdb"),
        Box::new(StaticFetcher::new().with(bio_url, rss(&["Cell atlas"]))),
    )
    .unwrap();
    bio.add_url(bio_url).unwrap();

    let classifier = KeywordClassifier::default();
    ml.get_papers(5, REQUIREMENT, Some(judges(&classifier, &EchoSummarizer)), None)
        .unwrap();

    assert_eq!(bio.list_urls().unwrap(), vec![bio_url.to_string()]);
    assert_eq!(bio.count_unchecked_papers().unwrap(), 1);
    assert!(bio.get_past_relevant_papers().unwrap().is_empty());
    assert_eq!(ml.get_past_relevant_papers().unwrap().len(), 3);
}

#[test]
fn create_starts_from_an_empty_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ml.duckdb");
    let fetcher = || Box::new(StaticFetcher::new().with(FEED_URL, rss(&FIVE)));

    {
        let lib = Library::create(&path, fetcher()).unwrap();
        lib.add_url(FEED_URL).unwrap();
        assert_eq!(lib.count_unchecked_papers().unwrap(), 5);
    }
    {
        let lib = Library::open(&path, fetcher()).unwrap();
        assert_eq!(lib.list_urls().unwrap(), vec![FEED_URL.to_string()]);
    }

    let lib = Library::create(&path, fetcher()).unwrap();
    assert!(lib.list_urls().unwrap().is_empty());
    assert_eq!(lib.count_unchecked_papers().unwrap(), 0);
}
