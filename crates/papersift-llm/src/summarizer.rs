//! One-sentence summaries focused on a library's requirement

use papersift_core::{Paper, PaperAndSummary, clean_completion};

use crate::client::{CompletionEndpoint, CompletionError, CompletionRequest};

/// Produces a summary for a paper already judged relevant.
pub trait Summarizer {
    fn summarize(&self, requirement: &str, paper: &Paper)
    -> Result<PaperAndSummary, CompletionError>;
}

fn prompt(requirement: &str, paper: &Paper) -> String {
    format!(
        "Below are my requirements and a research paper that meets them. \
         Summarize the paper in exactly one sentence, focusing on what is relevant \
         to the requirements. Do not state that the paper matches the requirements; \
         only describe the paper.\n\n\
         Requirements: {requirement}\n\n\
         Paper:\n  Title: {}\n  Abstract: {}\n",
        paper.title(),
        paper.abstract_text()
    )
}

/// Summarizer backed by a free-text completion.
pub struct LlmSummarizer<E> {
    endpoint: E,
}

impl<E: CompletionEndpoint> LlmSummarizer<E> {
    pub fn new(endpoint: E) -> Self {
        Self { endpoint }
    }
}

impl<E: CompletionEndpoint> Summarizer for LlmSummarizer<E> {
    /// Endpoint failures are returned as-is; a refusal or a reply without
    /// text yields an empty summary.
    fn summarize(
        &self,
        requirement: &str,
        paper: &Paper,
    ) -> Result<PaperAndSummary, CompletionError> {
        let request = CompletionRequest::text(prompt(requirement, paper));
        let content = match self.endpoint.complete(&request) {
            Ok(completion) => completion.content,
            Err(CompletionError::Refusal(text)) => {
                log::warn!("{}: model refused to summarize: {text}", paper.id());
                None
            }
            Err(e) => return Err(e),
        };
        let summary = clean_completion(content.as_deref().unwrap_or_default());
        if summary.is_empty() {
            log::warn!("{}: model returned an empty summary", paper.id());
        }
        Ok(PaperAndSummary::new(paper.clone(), summary))
    }
}
