//! Feed download

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use papersift_core::RetryPolicy;

/// Source of raw feed documents, keyed by feed URL.
pub trait FeedFetcher {
    fn fetch(&self, url: &str) -> Result<String>;
}

/// Fetches feeds over HTTP with the shared client.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(timeout: Option<Duration>, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }
}

impl FeedFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        log::debug!("GET {url}");
        let body = self
            .retry
            .run(url, || papersift_core::get_text(url, self.timeout))
            .map_err(|e| anyhow::anyhow!("failed to fetch {url}: {e}"))?;
        Ok(body)
    }
}

/// Serves fixed documents from memory. Used for tests and offline replays.
#[derive(Debug, Clone, Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(url, body);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<String>) {
        self.bodies.insert(url.into(), body.into());
    }
}

impl FeedFetcher for StaticFetcher {
    fn fetch(&self, url: &str) -> Result<String> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("failed to fetch {url}: no such document"))
    }
}

impl<F: FeedFetcher + ?Sized> FeedFetcher for Box<F> {
    fn fetch(&self, url: &str) -> Result<String> {
        (**self).fetch(url)
    }
}
