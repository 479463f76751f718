use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use relay_core::config::{
    CompletionConfig, DEFAULT_BASE_URL, DEFAULT_COMPLETION_TIMEOUT_SECS, DEFAULT_MAX_TOKENS,
    DEFAULT_MODELS_TIMEOUT_SECS,
};
use relay_core::Turn;

use crate::provider::{
    CompletionBackend, CompletionError, CompletionResult, ModelInfo, ModelListResult,
};

/// Client for OpenRouter's OpenAI-compatible API.
///
/// One attempt per call, no retries. Every request carries its own timeout
/// and the response body is always consumed or dropped before returning, so
/// a failed call never holds a connection.
pub struct OpenRouterClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_tokens: u32,
    timeout: Duration,
    models_timeout: Duration,
}

impl OpenRouterClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: Duration::from_secs(DEFAULT_COMPLETION_TIMEOUT_SECS),
            models_timeout: Duration::from_secs(DEFAULT_MODELS_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &CompletionConfig) -> Self {
        Self::new(config.api_key.clone(), Some(config.base_url.clone()))
            .with_max_tokens(config.max_tokens)
            .with_timeouts(
                Duration::from_secs(config.timeout_secs),
                Duration::from_secs(config.models_timeout_secs),
            )
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_timeouts(mut self, completion: Duration, models: Duration) -> Self {
        self.timeout = completion;
        self.models_timeout = models;
        self
    }

    async fn try_complete(
        &self,
        history: &[Turn],
        pending: &str,
        model: &str,
    ) -> Result<String, CompletionError> {
        let body = build_request_body(history, pending, model, self.max_tokens);
        let url = format!("{}/chat/completions", self.base_url);

        info!(%url, model, turns = history.len(), "sending completion request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        debug!(status, snippet = %snippet(&text), "completion response received");

        parse_completion(status, &text)
    }

    async fn try_list_models(&self) -> Result<Vec<ModelInfo>, CompletionError> {
        let url = format!("{}/models", self.base_url);

        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.models_timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message: format!("Model fetch failed: HTTP {}", status.as_u16()),
            });
        }

        let text = resp.text().await?;
        let listing: ModelListing = serde_json::from_str(&text)
            .map_err(|e| CompletionError::Protocol(format!("invalid model listing: {e}")))?;
        Ok(listing.data)
    }
}

#[async_trait]
impl CompletionBackend for OpenRouterClient {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, history: &[Turn], pending: &str, model: &str) -> CompletionResult {
        match self.try_complete(history, pending, model).await {
            Ok(reply) => CompletionResult::Success { reply },
            Err(e) => {
                warn!(model, code = e.code(), error = %e, "completion failed");
                CompletionResult::Failure(e.into())
            }
        }
    }

    async fn list_models(&self) -> ModelListResult {
        match self.try_list_models().await {
            Ok(models) => {
                debug!(count = models.len(), "model listing fetched");
                ModelListResult::Success { models }
            }
            Err(e) => {
                warn!(code = e.code(), error = %e, "model listing failed");
                ModelListResult::Failure(e.into())
            }
        }
    }
}

fn build_request_body(
    history: &[Turn],
    pending: &str,
    model: &str,
    max_tokens: u32,
) -> serde_json::Value {
    let mut messages: Vec<serde_json::Value> = history
        .iter()
        .map(|t| {
            serde_json::json!({
                "role": t.role,
                "content": t.content,
            })
        })
        .collect();
    messages.push(serde_json::json!({
        "role": "user",
        "content": pending,
    }));

    serde_json::json!({
        "model": model,
        "messages": messages,
        "max_tokens": max_tokens,
    })
}

/// Interpret a completion response body.
///
/// An error envelope wins over everything; otherwise the first choice's
/// content is the reply. Any other shape is a protocol error.
fn parse_completion(status: u16, body: &str) -> Result<String, CompletionError> {
    let success = (200..300).contains(&status);

    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(env) => env,
        Err(e) if success => {
            return Err(CompletionError::Protocol(format!("invalid JSON body: {e}")));
        }
        Err(_) => {
            return Err(CompletionError::Api {
                status,
                message: format!("HTTP {status}: {}", snippet(body)),
            });
        }
    };

    if let Some(err) = envelope.error {
        let code = err
            .code
            .as_ref()
            .and_then(code_as_u16)
            .unwrap_or(if success { 500 } else { status });
        return Err(CompletionError::Api {
            status: code,
            message: err.message.unwrap_or_else(|| "Unknown error".to_string()),
        });
    }

    let content = envelope
        .choices
        .into_iter()
        .flatten()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);

    match content {
        Some(reply) => Ok(reply),
        None if success => Err(CompletionError::Protocol(
            "response has no choices[0].message.content".to_string(),
        )),
        None => Err(CompletionError::Api {
            status,
            message: format!("HTTP {status}"),
        }),
    }
}

fn code_as_u16(v: &serde_json::Value) -> Option<u16> {
    match v {
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// First 200 characters of a body, for logs.
fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

// Response envelopes (private, deserialization only)

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    choices: Option<Vec<Choice>>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ModelListing {
    data: Vec<ModelInfo>,
}
