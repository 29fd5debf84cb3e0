//! Candidate reranking by embedding similarity to the requirement

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde_json::{Value, json};

use papersift_core::RetryPolicy;

use crate::client::EndpointConfig;

/// Orders documents by relevance to a query.
///
/// Returns indices into `documents`, best first. Callers must tolerate
/// indices that are out of range or repeated.
pub trait Reranker {
    fn rank(&self, documents: &[String], query: &str) -> Result<Vec<usize>>;
}

impl<R: Reranker + ?Sized> Reranker for &R {
    fn rank(&self, documents: &[String], query: &str) -> Result<Vec<usize>> {
        (**self).rank(documents, query)
    }
}

/// Reranker using an OpenAI-compatible `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct EmbeddingReranker {
    config: EndpointConfig,
    timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl EmbeddingReranker {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            timeout: None,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        let url = self.config.url("embeddings");
        let payload = json!({ "model": self.config.model, "input": inputs });
        let body = self
            .retry
            .run("embeddings", || {
                papersift_core::post_json(&url, self.config.bearer(), &payload, self.timeout)
            })
            .with_context(|| format!("embedding request to {url}"))?;
        parse_embeddings(&body, inputs.len())
    }
}

impl Reranker for EmbeddingReranker {
    fn rank(&self, documents: &[String], query: &str) -> Result<Vec<usize>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let mut inputs = Vec::with_capacity(documents.len() + 1);
        inputs.push(query);
        inputs.extend(documents.iter().map(String::as_str));

        let mut vectors = self.embed(&inputs)?;
        let docs = vectors.split_off(1);
        Ok(rank_by_similarity(&vectors[0], &docs))
    }
}

/// Parse an embeddings response, restoring input order from each item's `index`.
fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let value: Value = serde_json::from_str(body).context("embeddings response is not JSON")?;
    let Some(data) = value["data"].as_array() else {
        bail!("embeddings response has no data array");
    };

    let mut items: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map_or(position, |i| i as usize);
        let vector = item["embedding"]
            .as_array()
            .with_context(|| format!("embedding {index} is missing"))?
            .iter()
            .map(|x| x.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .with_context(|| format!("embedding {index} has non-numeric values"))?;
        items.push((index, vector));
    }
    items.sort_by_key(|(index, _)| *index);

    if items.len() != expected {
        bail!("expected {expected} embeddings, got {}", items.len());
    }
    Ok(items.into_iter().map(|(_, v)| v).collect())
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

/// Indices of `docs` by descending cosine similarity to `query`.
///
/// Ties keep their original order.
pub fn rank_by_similarity(query: &[f32], docs: &[Vec<f32>]) -> Vec<usize> {
    let scores: Vec<f32> = docs.iter().map(|d| cosine(query, d)).collect();
    let mut order: Vec<usize> = (0..docs.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}
