//! Papersift Core - shared infrastructure for the paper digest pipeline
//!
//! Holds the paper data model, text cleanup for model output, the shared
//! HTTP client, retry policy, and logging/progress helpers used by the
//! feed, LLM, and CLI crates.

pub mod http;
pub mod logging;
pub mod paper;
pub mod progress;
pub mod retry;
pub mod text;

// Re-exports for convenience
pub use http::{HttpError, SHARED_RUNTIME, get_text, http_client, post_json};
pub use logging::{IndicatifLogger, init_logging};
pub use paper::{EntryTag, Paper, PaperAndSummary};
pub use progress::{ProgressContext, SharedProgress};
pub use retry::{RetryPolicy, Retryable};
pub use text::{clean_completion, remove_reasoning_trace};
