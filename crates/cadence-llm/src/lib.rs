//! Chat-completion client for the Cadence coaching orchestrator.
//!
//! ## Modules
//!
//! - [`types`] -- conversation messages, tool calls, requests, and turns.
//! - [`streaming`] -- SSE line parsing and tool-call delta accumulation.
//! - [`client`] -- the OpenAI-compatible HTTP client.
//! - [`provider`] -- the [`ChatProvider`] seam the rest of the system
//!   depends on.
//! - [`error`] -- the classified error taxonomy.

pub mod client;
pub mod error;
pub mod provider;
pub mod streaming;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use client::{OpenAiClient, OpenAiConfig};
pub use error::{LlmError, Result};
pub use provider::ChatProvider;
pub use streaming::StreamAccumulator;
pub use types::{
    ChatRequest, ChatTurn, Message, Role, ToolCall, ToolDefinition, ToolResult, Usage,
};
