/// Generation client is the single point of entry for all text-generation calls.
///
/// ARCHITECTURAL RULE: pipeline stages never talk HTTP. They depend on the
/// `GenerationClient` trait; `HttpGenerationClient` is the production backend
/// and tests substitute scripted stubs.
///
/// Transport-level retries (429, 5xx, connection errors) live here. Stage-level
/// retries (malformed output, schema violations) live in `generation::runner`.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, PipelineSettings};

pub mod prompts;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Call failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("Model returned empty content")]
    EmptyContent,
}

/// Sends a prompt to a text-generation service and returns the raw text.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        parameters: &Map<String, Value>,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessagesResponse {
    fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Messages-API backend with retry/backoff and optional reasoning-trace removal.
#[derive(Clone)]
pub struct HttpGenerationClient {
    client: Client,
    api_url: String,
    api_key: String,
    max_attempts: u32,
    strip_traces: bool,
}

impl HttpGenerationClient {
    pub fn new(config: &Config, settings: &PipelineSettings) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.generation_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_url: config.generation_api_url.clone(),
            api_key: config.generation_api_key.clone(),
            max_attempts: settings.transport_attempts,
            strip_traces: !settings.reasoning_trace,
        })
    }

    /// One HTTP round trip. The outer `Err` is retryable (transport, 429, 5xx);
    /// `Ok(Err(_))` is a failure that retrying will not fix.
    async fn call_once(&self, body: &Value) -> Result<Result<String, GenerationError>, GenerationError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            warn!("Generation API returned {}: {}", status, message);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            // Client errors are not worth retrying.
            return Ok(Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            }));
        }

        let parsed: MessagesResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                "Generation call succeeded: input_tokens={}, output_tokens={}",
                usage.input_tokens, usage.output_tokens
            );
        }
        Ok(parsed
            .text()
            .map(str::to_string)
            .ok_or(GenerationError::EmptyContent))
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        parameters: &Map<String, Value>,
    ) -> Result<String, GenerationError> {
        let body = build_request_body(prompt, model, parameters);
        let mut last_error: Option<GenerationError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "Generation call attempt {} to {} failed, retrying after {}ms...",
                    attempt,
                    model,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.call_once(&body).await {
                Ok(Ok(text)) => {
                    if self.strip_traces {
                        let cleaned = strip_reasoning_traces(&text);
                        if cleaned.len() != text.len() {
                            debug!(
                                "Reasoning traces removed ({} characters)",
                                text.len().saturating_sub(cleaned.len())
                            );
                        }
                        return Ok(cleaned);
                    }
                    return Ok(text);
                }
                Ok(Err(fatal)) => return Err(fatal),
                Err(retryable) => last_error = Some(retryable),
            }
        }

        Err(GenerationError::Exhausted {
            attempts: self.max_attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".to_string()),
        })
    }
}

/// Request body: model, token budget, single user message; stage parameters
/// are merged last so they can override the defaults.
fn build_request_body(prompt: &str, model: &str, parameters: &Map<String, Value>) -> Value {
    let mut body = json!({
        "model": model,
        "max_tokens": DEFAULT_MAX_TOKENS,
        "messages": [{ "role": "user", "content": prompt }],
    });
    if let Some(obj) = body.as_object_mut() {
        for (key, value) in parameters {
            obj.insert(key.clone(), value.clone());
        }
    }
    body
}

/// Extracts the structured payload from a model response.
///
/// Tries a ```` ```json ```` fence first, then a bare ```` ``` ```` fence, then
/// the whole trimmed response.
pub fn extract_structured_payload(response: &str) -> Result<Value, serde_json::Error> {
    let body = fenced_block(response, "```json")
        .or_else(|| fenced_block(response, "```"))
        .unwrap_or_else(|| response.trim());
    serde_json::from_str(body)
}

fn fenced_block<'a>(text: &'a str, open: &str) -> Option<&'a str> {
    let start = text.find(open)? + open.len();
    let rest = &text[start..];
    let end = rest.find("```").unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Removes reasoning traces some models emit ahead of the answer:
/// `>`-quoted lines, `<thinking>` blocks and `[REASONING]` blocks.
pub fn strip_reasoning_traces(text: &str) -> String {
    let unquoted = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('>'))
        .collect::<Vec<_>>()
        .join("\n");
    let without_thinking = remove_delimited(&unquoted, "<thinking>", "</thinking>");
    let without_reasoning = remove_delimited(&without_thinking, "[reasoning]", "[/reasoning]");

    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    for line in without_reasoning.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                out.push("");
            }
        } else {
            blank_run = 0;
            out.push(line);
        }
    }
    out.join("\n").trim().to_string()
}

/// Case-insensitive removal of `open ... close` spans. An unterminated span is kept.
fn remove_delimited(text: &str, open: &str, close: &str) -> String {
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(rel_start) = lower[cursor..].find(open) {
        let start = cursor + rel_start;
        let Some(rel_end) = lower[start + open.len()..].find(close) else {
            break;
        };
        let end = start + open.len() + rel_end + close.len();
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}
