//! OpenAI-compatible chat completions client
//!
//! Any server exposing `POST {base_url}/chat/completions` works (OpenAI,
//! vLLM, llama.cpp, Ollama's `/v1`). Structured replies use the
//! `json_schema` response format.

use std::time::Duration;

use serde_json::{Value, json};

use papersift_core::{HttpError, RetryPolicy, Retryable};

/// Connection settings for one endpoint.
#[derive(Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl std::fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl EndpointConfig {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub(crate) fn bearer(&self) -> Option<&str> {
        (!self.api_key.is_empty()).then_some(self.api_key.as_str())
    }
}

/// JSON schema the reply must follow.
#[derive(Debug, Clone)]
pub struct ResponseFormat {
    pub name: String,
    pub schema: Value,
}

impl ResponseFormat {
    /// Schema for an object with a single required boolean field.
    pub fn boolean_field(name: &str, field: &str) -> Self {
        Self {
            name: name.to_string(),
            schema: json!({
                "type": "object",
                "properties": { field: { "type": "boolean" } },
                "required": [field],
                "additionalProperties": false,
            }),
        }
    }
}

/// A single-turn user prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
    pub response_format: Option<ResponseFormat>,
}

impl CompletionRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            response_format: None,
        }
    }

    pub fn structured(prompt: impl Into<String>, format: ResponseFormat) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            response_format: Some(format),
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// The first choice of a completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub content: Option<String>,
    pub finish_reason: Option<String>,
}

/// Failure of one completion call
#[derive(Debug)]
pub enum CompletionError {
    /// The model declined to answer; carries its refusal text
    Refusal(String),
    /// Structured reply cut off by the token limit
    LengthExceeded,
    /// Transport or API error
    Http(HttpError),
    /// Response body not shaped like a chat completion
    Malformed(String),
}

impl std::fmt::Display for CompletionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Refusal(text) => write!(f, "model refused: {text}"),
            Self::LengthExceeded => write!(f, "response truncated at the token limit"),
            Self::Http(e) => write!(f, "{e}"),
            Self::Malformed(msg) => write!(f, "malformed completion: {msg}"),
        }
    }
}

impl std::error::Error for CompletionError {}

impl Retryable for CompletionError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_retryable(),
            Self::Refusal(_) | Self::LengthExceeded | Self::Malformed(_) => false,
        }
    }
}

impl From<HttpError> for CompletionError {
    fn from(e: HttpError) -> Self {
        Self::Http(e)
    }
}

/// Remote function from prompt to completion.
pub trait CompletionEndpoint {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError>;
}

impl<E: CompletionEndpoint + ?Sized> CompletionEndpoint for &E {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        (**self).complete(request)
    }
}

/// Build the `/chat/completions` request body.
pub fn build_payload(model: &str, request: &CompletionRequest) -> Value {
    let mut payload = json!({
        "model": model,
        "messages": [{ "role": "user", "content": request.prompt }],
        "stream": false,
    });
    if let Some(t) = request.temperature {
        payload["temperature"] = json!(t);
    }
    if let Some(format) = &request.response_format {
        payload["response_format"] = json!({
            "type": "json_schema",
            "json_schema": {
                "name": format.name,
                "strict": true,
                "schema": format.schema,
            },
        });
    }
    payload
}

/// Interpret a `/chat/completions` response body.
///
/// `structured` turns a `length` finish into [`CompletionError::LengthExceeded`],
/// since a cut-off JSON reply cannot be parsed.
pub fn parse_completion(body: &str, structured: bool) -> Result<Completion, CompletionError> {
    let v: Value = serde_json::from_str(body)
        .map_err(|e| CompletionError::Malformed(format!("invalid JSON: {e}")))?;

    if let Some(err) = v.get("error").filter(|e| !e.is_null()) {
        let message = err["message"].as_str().unwrap_or("unknown error");
        return Err(CompletionError::Http(HttpError::Http {
            status: None,
            message: message.to_string(),
        }));
    }

    let choice = v["choices"]
        .get(0)
        .ok_or_else(|| CompletionError::Malformed("no choices in response".to_string()))?;
    let message = &choice["message"];

    if let Some(refusal) = message["refusal"].as_str().filter(|r| !r.is_empty()) {
        return Err(CompletionError::Refusal(refusal.to_string()));
    }

    let finish_reason = choice["finish_reason"].as_str().map(str::to_string);
    if structured && finish_reason.as_deref() == Some("length") {
        return Err(CompletionError::LengthExceeded);
    }

    Ok(Completion {
        content: message["content"].as_str().map(str::to_string),
        finish_reason,
    })
}

/// Blocking client for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: EndpointConfig,
    timeout: Option<Duration>,
    retry: RetryPolicy,
}

impl OpenAiClient {
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

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }
}

impl CompletionEndpoint for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let url = self.config.url("chat/completions");
        let payload = build_payload(&self.config.model, request);
        let structured = request.response_format.is_some();

        self.retry.run("chat completion", || {
            let body = papersift_core::post_json(&url, self.config.bearer(), &payload, self.timeout)?;
            parse_completion(&body, structured)
        })
    }
}
