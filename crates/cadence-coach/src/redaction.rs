//! Context redaction.
//!
//! Before each model call, earlier bulky tool outputs are replaced with a
//! short placeholder so the conversation keeps fitting in the context
//! window.  The analysis is a pure function over the message list: the
//! persistent history is never mutated, and the most recent tool output
//! (or any tool chain not yet followed by a non-tool message) survives
//! intact so the model can still read it.

use std::collections::HashSet;

use tracing::debug;

use cadence_llm::Message;

/// Fixed prefix identifying a redacted tool output.
const REDACTION_TAG: &str = "[Previous Stream Analysis - Redacted]";

/// Rewrites eligible tool messages into redaction placeholders.
#[derive(Debug, Clone)]
pub struct ContextManager {
    enabled: bool,
    /// Tool names whose outputs may be redacted.
    redactable: HashSet<String>,
}

impl ContextManager {
    /// Create a manager with the default redactable set (activity streams
    /// only).
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            redactable: ["get-activity-streams".to_owned()].into_iter().collect(),
        }
    }

    /// Extend the redactable tool set.
    pub fn with_redactable(mut self, tool_name: impl Into<String>) -> Self {
        self.redactable.insert(tool_name.into());
        self
    }

    /// Produce a view of `messages` with eligible tool outputs redacted.
    ///
    /// The input is not mutated; the output has the same length, and every
    /// message keeps its role and tool-call id.  Applying the function to
    /// its own output is a no-op.
    pub fn apply(&self, messages: &[Message]) -> Vec<Message> {
        if !self.enabled {
            return messages.to_vec();
        }

        let mut redacted_count = 0usize;
        let out: Vec<Message> = messages
            .iter()
            .enumerate()
            .map(|(i, msg)| {
                if self.should_redact(messages, i) {
                    redacted_count += 1;
                    let tool_name = tool_name_for(messages, i).unwrap_or_default();
                    let mut replacement = msg.clone();
                    replacement.content = placeholder(msg, &tool_name);
                    replacement
                } else {
                    msg.clone()
                }
            })
            .collect();

        if redacted_count > 0 {
            debug!(redacted = redacted_count, total = messages.len(), "tool outputs redacted");
        }
        out
    }

    /// Whether the message at `index` is an eligible redaction target.
    fn should_redact(&self, messages: &[Message], index: usize) -> bool {
        let msg = &messages[index];
        if msg.tool_call_id.is_none() {
            return false;
        }
        // Already a placeholder: redacting again would only churn.
        if msg.content.starts_with(REDACTION_TAG) {
            return false;
        }
        let Some(tool_name) = tool_name_for(messages, index) else {
            return false;
        };
        if !self.redactable.contains(&tool_name) {
            return false;
        }
        has_subsequent_non_tool_call_messages(messages, index)
    }
}

/// Whether some message after `index` breaks the tool-call chain: a user or
/// system message, an unknown role, or an assistant message without tool
/// calls.  Tool messages and assistants that carry tool calls do not count.
pub fn has_subsequent_non_tool_call_messages(messages: &[Message], index: usize) -> bool {
    messages[index + 1..].iter().any(Message::is_non_tool_call)
}

/// The tool name behind a tool message: found on the nearest preceding
/// assistant message carrying a tool call with the same id.
fn tool_name_for(messages: &[Message], index: usize) -> Option<String> {
    let id = messages[index].tool_call_id.as_deref()?;
    messages[..index].iter().rev().find_map(|m| {
        m.tool_calls
            .iter()
            .find(|tc| tc.id == id)
            .map(|tc| tc.name.clone())
    })
}

/// Build the placeholder text for a redacted tool message.
fn placeholder(msg: &Message, tool_name: &str) -> String {
    let line_count = msg.content.lines().filter(|l| !l.trim().is_empty()).count();
    format!(
        "{REDACTION_TAG}\n\
         Content type: {}\n\
         Original size: {line_count} lines\n\
         Tool call id: {}\n\
         This earlier output was removed to save context space. Call the {tool_name} tool \
         again to retrieve fresh data.",
        infer_content_type(&msg.content),
        msg.tool_call_id.as_deref().unwrap_or("unknown"),
    )
}

/// Fingerprint the original content so the model knows what kind of data
/// was removed.
fn infer_content_type(content: &str) -> &'static str {
    if content.contains("AI Summary") || content.contains("AI-generated") {
        "AI-generated summary"
    } else if content.contains("Derived Features") {
        "derived features and statistics"
    } else if content.contains("Page ") && content.contains(" of ") {
        "paginated stream data"
    } else if content.contains("Stream Data") || content.contains("📊") {
        "raw stream data"
    } else if content.contains("Processing Options") || content.contains("processing mode") {
        "processing mode options"
    } else {
        "stream analysis"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
