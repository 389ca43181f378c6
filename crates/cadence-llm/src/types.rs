//! Core types for chat-completion interaction.
//!
//! These types model the data flowing between the coaching loop and the
//! chat-completion provider.  They mirror the OpenAI wire format closely
//! because that is the format the provider speaks; the [`super::client`]
//! module handles the HTTP details.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// The role of a participant in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions that shape model behavior.
    System,
    /// Input from the athlete.
    User,
    /// Output from the LLM.
    Assistant,
    /// Result of a tool invocation, fed back to the model.
    Tool,
}

/// A single message in a conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Who produced this message.
    pub role: Role,

    /// The textual content of the message.
    ///
    /// For [`Role::Tool`] messages this contains the tool's rendered result.
    /// For [`Role::Assistant`] messages that only carry tool calls, this may
    /// be empty.
    #[serde(default)]
    pub content: String,

    /// Tool calls requested by the assistant (only present when
    /// `role == Role::Assistant`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Identifies which tool call this message is a response to
    /// (only present when `role == Role::Tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create an assistant message carrying this round's text and tool calls.
    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    /// Create a tool result message.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Whether this message breaks a tool-call chain: anything except a tool
    /// message or an assistant message that still carries tool calls.
    pub fn is_non_tool_call(&self) -> bool {
        match self.role {
            Role::Tool => false,
            Role::Assistant => self.tool_calls.is_empty(),
            Role::User | Role::System => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tool calls
// ---------------------------------------------------------------------------

/// A tool invocation requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque identifier assigned by the LLM for correlating results.
    pub id: String,

    /// The name of the tool to invoke (must match a registered tool).
    pub name: String,

    /// Raw JSON arguments string exactly as streamed by the model.
    ///
    /// Kept unparsed here: malformed argument JSON is a per-tool execution
    /// error, not a stream error.
    pub arguments: String,
}

/// The result of executing a tool, ready to feed back to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The [`ToolCall::id`] this result corresponds to.
    pub tool_call_id: String,

    /// Rendered result content (or a mirrored error text on failure).
    pub content: String,

    /// Optional structured payload for callers that want typed data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Error description; `None` means the tool succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// A successful result.
    pub fn ok(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            payload: None,
            error: None,
        }
    }

    /// A failed result; the error text is mirrored into content so the model
    /// can react to it.
    pub fn err(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            tool_call_id: tool_call_id.into(),
            content: format!("Error: {error}"),
            payload: None,
            error: Some(error),
        }
    }

    /// Whether the tool succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// A tool definition exposed to the LLM so it knows what tools are available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,

    /// Human-readable description of what the tool does.
    pub description: String,

    /// JSON Schema describing the tool's parameters.
    pub parameters: Value,
}

// ---------------------------------------------------------------------------
// Chat request / turn
// ---------------------------------------------------------------------------

/// A full request to send to the chat-completion provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// The model identifier.
    pub model: String,

    /// The conversation history.
    pub messages: Vec<Message>,

    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,

    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Maximum tokens the model may generate in this turn.
    pub max_tokens: Option<u32>,
}

/// The aggregated outcome of one model turn.
///
/// Unlike a plain text-or-tools split, a turn can carry **both** streamed
/// text content and tool calls; the coaching loop needs both to build the
/// assistant message it appends to history.
#[derive(Debug, Clone, Default)]
pub struct ChatTurn {
    /// Accumulated assistant text (may be empty on pure tool-call turns).
    pub content: String,

    /// Tool calls requested this turn, in the model's emission order.
    pub tool_calls: Vec<ToolCall>,

    /// Token usage, when the provider reports it.
    pub usage: Usage,

    /// The model that produced this turn, as echoed by the provider.
    pub model: String,
}

impl ChatTurn {
    /// Whether the model asked for any tools this turn.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Usage tracking
// ---------------------------------------------------------------------------

/// Token usage information returned by the provider.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Number of tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u32,
    /// Number of tokens generated by the model.
    #[serde(default)]
    pub completion_tokens: u32,
    /// Total tokens billed for the call.
    #[serde(default)]
    pub total_tokens: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
