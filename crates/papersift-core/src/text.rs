//! Cleanup of raw model output

use std::sync::LazyLock;

use regex::Regex;

/// One reasoning block, from the first `<think>` to the last `</think>`.
static REASONING_TRACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.+</think>").expect("invalid reasoning regex"));

/// Remove the reasoning trace some models prepend to their answer.
///
/// The match is greedy: with several `<think>` blocks everything between the
/// first opening tag and the last closing tag goes, including any answer text
/// in between.
pub fn remove_reasoning_trace(text: &str) -> String {
    REASONING_TRACE.replace(text, "").into_owned()
}

/// Strip the reasoning trace and surrounding whitespace.
pub fn clean_completion(text: &str) -> String {
    remove_reasoning_trace(text).trim().to_string()
}
