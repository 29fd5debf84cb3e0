//! papersift-llm: language-model judges for the digest pipeline
//!
//! An OpenAI-compatible completion client, the relevance classifier and
//! summarizer built on it, and an embedding-based reranker.

pub mod classifier;
pub mod client;
pub mod rerank;
pub mod summarizer;

pub use classifier::{Classifier, LlmClassifier};
pub use client::{
    Completion, CompletionEndpoint, CompletionError, CompletionRequest, EndpointConfig,
    OpenAiClient, ResponseFormat,
};
pub use rerank::{EmbeddingReranker, Reranker, rank_by_similarity};
pub use summarizer::{LlmSummarizer, Summarizer};

#[cfg(test)]
mod testing;
