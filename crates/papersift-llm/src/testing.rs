//! Test doubles shared by the judge tests

use std::cell::RefCell;
use std::collections::VecDeque;

use chrono::DateTime;
use papersift_core::{EntryTag, Paper};

use crate::client::{Completion, CompletionEndpoint, CompletionError, CompletionRequest};

/// Endpoint that replays queued replies and records every request.
#[derive(Default)]
pub struct ScriptedEndpoint {
    replies: RefCell<VecDeque<Result<Completion, CompletionError>>>,
    pub requests: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedEndpoint {
    pub fn replying(replies: Vec<Result<Completion, CompletionError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::default(),
        }
    }
}

impl CompletionEndpoint for ScriptedEndpoint {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(CompletionError::Malformed("no scripted reply".to_string())))
    }
}

pub fn content(text: &str) -> Result<Completion, CompletionError> {
    Ok(Completion {
        content: Some(text.to_string()),
        finish_reason: Some("stop".to_string()),
    })
}

pub fn paper() -> Paper {
    Paper::new(
        "oai:arXiv.org:2401.00001v1".to_string(),
        "Speculative Decoding for Small Models".to_string(),
        "https://arxiv.org/abs/2401.00001".to_string(),
        "Abstract: We speed up inference with a draft model.".to_string(),
        vec![EntryTag::term("cs.CL")],
        DateTime::UNIX_EPOCH,
        "A. Author".to_string(),
    )
}
