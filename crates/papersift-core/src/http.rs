//! Blocking HTTP helpers over a shared async client.
//!
//! Requests run on a shared tokio runtime through `block_on`, so callers
//! stay synchronous. Every call is a single round-trip; retries belong to
//! [`RetryPolicy`](crate::RetryPolicy).

use std::sync::LazyLock;
use std::time::Duration;

use crate::retry::Retryable;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Error types for HTTP calls
#[derive(Debug)]
pub enum HttpError {
    /// HTTP error with optional status code (None = transport failure)
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Request body could not be encoded
    Encode(String),
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Encode(message) => write!(f, "encode error: {message}"),
        }
    }
}

impl std::error::Error for HttpError {}

impl HttpError {
    /// Create HTTP error from reqwest error, dropping the URL so endpoint
    /// addresses stay out of logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            Self::Encode(_) => None,
        }
    }
}

impl Retryable for HttpError {
    fn is_retryable(&self) -> bool {
        match self {
            // 429 = rate limited, 5xx = server trouble, None = network
            Self::Http { status, .. } => matches!(status, None | Some(429) | Some(500..=599)),
            Self::Encode(_) => false,
        }
    }
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("papersift/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// HTTP GET returning the response body as text.
pub fn get_text(url: &str, timeout: Option<Duration>) -> Result<String, HttpError> {
    SHARED_RUNTIME.handle().block_on(async {
        let mut request = SHARED_CLIENT.get(url);
        if let Some(t) = timeout {
            request = request.timeout(t);
        }
        let response = request
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(HttpError::from_reqwest)?;
        response
            .text()
            .await
            .map_err(HttpError::from_reqwest)
    })
}

/// HTTP POST of a JSON body with optional bearer auth, returning the body text.
///
/// Non-2xx responses become [`HttpError::Http`] carrying the API's own
/// `error.message` when the body has one.
pub fn post_json(
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    timeout: Option<Duration>,
) -> Result<String, HttpError> {
    let payload = serde_json::to_vec(body).map_err(|e| HttpError::Encode(e.to_string()))?;

    SHARED_RUNTIME.handle().block_on(async {
        let mut request = SHARED_CLIENT
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }
        if let Some(t) = timeout {
            request = request.timeout(t);
        }

        let response = request
            .send()
            .await
            .map_err(HttpError::from_reqwest)?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(HttpError::from_reqwest)?;

        if !status.is_success() {
            return Err(HttpError::Http {
                status: Some(status.as_u16()),
                message: api_error_message(&text),
            });
        }
        Ok(text)
    })
}

/// Pull `error.message` out of an OpenAI-style error body, else the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
