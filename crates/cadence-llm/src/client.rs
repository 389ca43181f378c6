//! HTTP client for an OpenAI-compatible chat-completions endpoint.
//!
//! Supports streaming SSE and non-streaming modes.  Responses are classified
//! into the [`LlmError`] taxonomy so the coaching loop can decide between
//! graceful degradation and propagation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use crate::error::{LlmError, Result};
use crate::provider::ChatProvider;
use crate::streaming::StreamAccumulator;
use crate::types::{ChatRequest, ChatTurn, Message, Role, ToolCall, Usage};

/// Default API base URL.
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default request timeout.  Streaming responses can be long-lived, so this
/// is generous; callers cancel by dropping their output channel.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for connecting to a chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key used as a bearer token.
    pub api_key: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Default model identifier when a request leaves it empty.
    pub default_model: String,
}

impl OpenAiConfig {
    /// Create a configuration for the hosted OpenAI API.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_owned(),
            default_model: model.into(),
        }
    }

    /// Override the base URL (self-hosted gateways, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// A chat-completions client speaking the OpenAI wire format.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    config: Arc<OpenAiConfig>,
    http: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            config: Arc::new(config),
            http,
        })
    }

    // -----------------------------------------------------------------------
    // Internal: request building
    // -----------------------------------------------------------------------

    /// Build the JSON body for the chat-completions endpoint.
    fn build_request_body(&self, request: &ChatRequest, stream: bool) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(wire_message).collect();

        let mut body = json!({
            "model": if request.model.is_empty() {
                &self.config.default_model
            } else {
                &request.model
            },
            "messages": messages,
        });

        if let Some(temp) = request.temperature {
            body["temperature"] = json!(temp);
        }
        if let Some(max) = request.max_tokens {
            body["max_completion_tokens"] = json!(max);
        }
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }
        if stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({"include_usage": true});
        }

        body
    }

    /// POST the body to `/chat/completions` and classify failures.
    async fn send_request(&self, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)).map_err(|e| {
                LlmError::RequestFailed {
                    reason: format!("invalid API key header: {e}"),
                }
            })?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        tracing::debug!(url = %url, model = %body["model"], "sending chat-completion request");

        let resp = self.http.post(&url).headers(headers).json(body).send().await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let text = resp.text().await.unwrap_or_default();
        Err(classify_api_error(status.as_u16(), &text))
    }

    // -----------------------------------------------------------------------
    // Internal: response parsing
    // -----------------------------------------------------------------------

    /// Parse a non-streaming chat-completions response.
    fn parse_response(&self, v: &Value) -> Result<ChatTurn> {
        let message = &v["choices"][0]["message"];
        if message.is_null() {
            return Err(LlmError::ParseFailed {
                reason: "missing `choices[0].message` in response".into(),
            });
        }

        let content = message["content"].as_str().unwrap_or_default().to_owned();

        let tool_calls = message["tool_calls"]
            .as_array()
            .map(|calls| {
                calls
                    .iter()
                    .map(|tc| ToolCall {
                        id: tc["id"].as_str().unwrap_or_default().to_owned(),
                        name: tc["function"]["name"].as_str().unwrap_or_default().to_owned(),
                        arguments: tc["function"]["arguments"]
                            .as_str()
                            .unwrap_or_default()
                            .to_owned(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage = v
            .get("usage")
            .and_then(|u| serde_json::from_value::<Usage>(u.clone()).ok())
            .unwrap_or_default();

        Ok(ChatTurn {
            content,
            tool_calls,
            usage,
            model: v["model"].as_str().unwrap_or_default().to_owned(),
        })
    }

    /// Consume an SSE byte stream into a [`ChatTurn`], forwarding every
    /// content fragment into `output`.
    async fn consume_stream(
        &self,
        resp: reqwest::Response,
        output: &mpsc::Sender<String>,
    ) -> Result<ChatTurn> {
        let mut accumulator = StreamAccumulator::new();
        let mut byte_stream = resp.bytes_stream();

        // Buffer for partial lines that span chunk boundaries.
        let mut line_buffer = String::new();

        while let Some(chunk_result) = byte_stream.next().await {
            let chunk = chunk_result.map_err(|e| LlmError::StreamInterrupted {
                reason: format!("stream read error: {e}"),
            })?;

            let text = std::str::from_utf8(&chunk).map_err(|e| LlmError::StreamInterrupted {
                reason: format!("invalid UTF-8 in stream: {e}"),
            })?;
            line_buffer.push_str(text);

            // Process complete lines; SSE lines are delimited by `\n`.
            while let Some(newline_pos) = line_buffer.find('\n') {
                let line = line_buffer[..newline_pos].to_owned();
                line_buffer.drain(..=newline_pos);

                if let Some(delta) = accumulator.feed_line(&line)? {
                    // A closed channel means the caller is gone; abort the
                    // in-flight request by unwinding.
                    if output.send(delta).await.is_err() {
                        return Err(LlmError::Cancelled);
                    }
                }
                if accumulator.is_done() {
                    return Ok(accumulator.finish());
                }
            }
        }

        // Stream ended without the `[DONE]` sentinel; return what we have.
        tracing::warn!("SSE stream ended without terminator");
        Ok(accumulator.finish())
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatTurn> {
        let body = self.build_request_body(request, false);
        let resp = self.send_request(&body).await?;
        let text = resp.text().await.map_err(|e| LlmError::RequestFailed {
            reason: format!("failed to read response body: {e}"),
        })?;
        let v: Value = serde_json::from_str(&text).map_err(|e| LlmError::ParseFailed {
            reason: format!("invalid JSON response: {e}"),
        })?;
        self.parse_response(&v)
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        output: &mpsc::Sender<String>,
    ) -> Result<ChatTurn> {
        let body = self.build_request_body(request, true);
        let resp = self.send_request(&body).await?;
        self.consume_stream(resp, output).await
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Convert one conversation message into the provider's wire format.
fn wire_message(msg: &Message) -> Value {
    match msg.role {
        Role::System => json!({"role": "system", "content": msg.content}),
        Role::User => json!({"role": "user", "content": msg.content}),
        Role::Assistant => {
            if msg.tool_calls.is_empty() {
                json!({"role": "assistant", "content": msg.content})
            } else {
                let calls: Vec<Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {"name": tc.name, "arguments": tc.arguments},
                        })
                    })
                    .collect();
                let content: Value = if msg.content.is_empty() {
                    Value::Null
                } else {
                    json!(msg.content)
                };
                json!({"role": "assistant", "content": content, "tool_calls": calls})
            }
        }
        Role::Tool => json!({
            "role": "tool",
            "tool_call_id": msg.tool_call_id,
            "content": msg.content,
        }),
    }
}

/// Map an API error status + body into the [`LlmError`] taxonomy.
fn classify_api_error(status: u16, body: &str) -> LlmError {
    let code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["code"].as_str().map(String::from))
        .unwrap_or_default();

    match status {
        429 if code == "insufficient_quota" => LlmError::QuotaExceeded,
        429 => LlmError::RateLimited,
        400 if code == "context_length_exceeded" => LlmError::ContextExceeded,
        s if s >= 500 => LlmError::Unavailable {
            reason: format!("API returned {s}"),
        },
        s => LlmError::RequestFailed {
            reason: format!("API returned {s}: {body}"),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
