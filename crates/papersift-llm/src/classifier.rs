//! Relevance classifier: does a paper match the library's requirement?

use serde::Deserialize;

use papersift_core::Paper;

use crate::client::{CompletionEndpoint, CompletionError, CompletionRequest, ResponseFormat};

/// Decides whether a paper matches a requirement.
///
/// Implementations never fail: anything that prevents an answer counts as
/// "not relevant" so one bad call cannot stop a digest run.
pub trait Classifier {
    fn is_relevant(&self, requirement: &str, paper: &Paper) -> bool;
}

/// Structured reply of the relevance check.
#[derive(Debug, Deserialize)]
struct IsRelevant {
    does_match: bool,
}

fn prompt(requirement: &str, paper: &Paper) -> String {
    format!(
        "Decide whether the following paper matches the requirements.\n\n\
         Requirements: {requirement}\n\n\
         Paper:\n  Title: {}\n  Abstract: {}\n",
        paper.title(),
        paper.abstract_text()
    )
}

/// Classifier backed by a completion endpoint with a boolean reply schema.
pub struct LlmClassifier<E> {
    endpoint: E,
}

impl<E: CompletionEndpoint> LlmClassifier<E> {
    pub fn new(endpoint: E) -> Self {
        Self { endpoint }
    }

    fn ask(&self, requirement: &str, paper: &Paper) -> Result<bool, CompletionError> {
        let request = CompletionRequest::structured(
            prompt(requirement, paper),
            ResponseFormat::boolean_field("IsRelevant", "does_match"),
        )
        .temperature(0.0);

        let completion = self.endpoint.complete(&request)?;
        let content = completion
            .content
            .ok_or_else(|| CompletionError::Malformed("empty reply".to_string()))?;
        let reply: IsRelevant = serde_json::from_str(content.trim())
            .map_err(|e| CompletionError::Malformed(format!("unexpected reply {content:?}: {e}")))?;
        Ok(reply.does_match)
    }
}

impl<E: CompletionEndpoint> Classifier for LlmClassifier<E> {
    fn is_relevant(&self, requirement: &str, paper: &Paper) -> bool {
        match self.ask(requirement, paper) {
            Ok(matches) => {
                log::debug!("{}: relevant = {matches}", paper.id());
                matches
            }
            Err(CompletionError::Refusal(text)) => {
                log::warn!("{}: model refused to classify: {text}", paper.id());
                false
            }
            Err(CompletionError::LengthExceeded) => {
                log::warn!("{}: too many tokens, reply was cut off", paper.id());
                false
            }
            Err(e) => {
                log::warn!("{}: relevance check failed: {e}", paper.id());
                false
            }
        }
    }
}
