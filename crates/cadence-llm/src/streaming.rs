//! SSE stream parser for the chat-completions API.
//!
//! The provider streams `data:` lines in standard SSE format with JSON
//! payloads containing `choices[].delta` objects, terminated by a
//! `data: [DONE]` sentinel.  Text arrives as content fragments; tool calls
//! arrive as deltas ordered by an `index` field, with the arguments string
//! split across many chunks.  This module assembles those fragments into a
//! complete [`ChatTurn`].

use serde_json::Value;

use crate::error::{LlmError, Result};
use crate::types::{ChatTurn, ToolCall, Usage};

// ---------------------------------------------------------------------------
// Stream accumulator
// ---------------------------------------------------------------------------

/// Accumulates fragments from a chat-completions SSE stream.
///
/// Tool-call deltas are kept in a sparse list keyed by the delta's ordinal
/// `index`: the list grows with empty slots as needed, scalar fields
/// (id, name) are set when present, and argument fragments are concatenated
/// in arrival order.  A tool call is considered complete at stream end.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    /// Accumulated text content from `choices[].delta.content`.
    content: String,

    /// In-progress tool calls indexed by their `index` field.
    builders: Vec<ToolCallBuilder>,

    /// Whether the `[DONE]` sentinel has been received.
    done: bool,

    /// Usage from chunks that include a `usage` object (sent near the end
    /// when `stream_options.include_usage` is set).
    usage: Usage,

    /// Model id echoed by the provider.
    model: String,
}

/// In-progress tool call being assembled from streaming deltas.
#[derive(Debug, Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    /// Accumulated raw arguments JSON string.
    arguments: String,
}

impl StreamAccumulator {
    /// Create a new empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the `[DONE]` sentinel has been received.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a single SSE line from the stream.
    ///
    /// Returns `Ok(Some(text_delta))` when a text content fragment is present
    /// (for incremental rendering), `Ok(None)` for non-text events, or an
    /// error if the payload is not valid JSON.
    pub fn feed_line(&mut self, line: &str) -> Result<Option<String>> {
        let line = line.trim_end();

        // Skip blank lines and SSE comments.
        if line.is_empty() || line.starts_with(':') {
            return Ok(None);
        }

        let data = match line.strip_prefix("data: ") {
            Some(d) => d.trim(),
            // `event:` lines and other SSE fields are not used by this API.
            None => return Ok(None),
        };

        if data == "[DONE]" {
            self.done = true;
            return Ok(None);
        }

        let v: Value = serde_json::from_str(data).map_err(|e| LlmError::ParseFailed {
            reason: format!("invalid JSON in SSE data: {e}"),
        })?;

        if let Some(model) = v["model"].as_str() {
            self.model = model.to_owned();
        }

        let delta = &v["choices"][0]["delta"];
        let mut text_delta: Option<String> = None;

        if !delta.is_null() {
            if let Some(content) = delta["content"].as_str() {
                self.content.push_str(content);
                text_delta = Some(content.to_owned());
            }

            if let Some(tool_calls) = delta["tool_calls"].as_array() {
                for tc in tool_calls {
                    self.apply_tool_call_delta(tc);
                }
            }
        }

        if let Some(usage) = v.get("usage").filter(|u| !u.is_null()) {
            if let Some(n) = usage["prompt_tokens"].as_u64() {
                self.usage.prompt_tokens = n as u32;
            }
            if let Some(n) = usage["completion_tokens"].as_u64() {
                self.usage.completion_tokens = n as u32;
            }
            if let Some(n) = usage["total_tokens"].as_u64() {
                self.usage.total_tokens = n as u32;
            }
        }

        Ok(text_delta)
    }

    /// Apply one `tool_calls[]` delta: extend the sparse list, set scalar
    /// fields when present (last write wins), append the arguments fragment.
    fn apply_tool_call_delta(&mut self, tc: &Value) {
        let index = tc["index"].as_u64().unwrap_or(0) as usize;

        while self.builders.len() <= index {
            self.builders.push(ToolCallBuilder::default());
        }
        let builder = &mut self.builders[index];

        if let Some(id) = tc["id"].as_str() {
            builder.id = id.to_owned();
        }
        let func = &tc["function"];
        if let Some(name) = func["name"].as_str() {
            builder.name = name.to_owned();
        }
        if let Some(args) = func["arguments"].as_str() {
            builder.arguments.push_str(args);
        }
    }

    /// Consume the accumulator and produce the final [`ChatTurn`].
    ///
    /// Argument strings are handed over verbatim: whether they parse as JSON
    /// is decided (and reported per tool) by the executor.
    pub fn finish(self) -> ChatTurn {
        let tool_calls = self
            .builders
            .into_iter()
            .map(|b| ToolCall {
                id: b.id,
                name: b.name,
                arguments: b.arguments,
            })
            .collect();

        ChatTurn {
            content: self.content,
            tool_calls,
            usage: self.usage,
            model: self.model,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
