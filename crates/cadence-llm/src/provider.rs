//! The chat-provider seam.
//!
//! The coaching loop and the summary processor depend on this trait rather
//! than a concrete HTTP client, so tests can script model behavior without a
//! network.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::types::{ChatRequest, ChatTurn};

/// A chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Issue a non-streaming request and return the aggregated turn.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatTurn>;

    /// Issue a streaming request, forwarding every content fragment into
    /// `output` in emission order, and return the aggregated turn at stream
    /// end.
    ///
    /// `output` is typically a bounded channel: a full channel exerts
    /// backpressure on the stream, and a closed channel (receiver dropped)
    /// cancels the request with [`crate::LlmError::Cancelled`].
    async fn stream_chat(
        &self,
        request: &ChatRequest,
        output: &mpsc::Sender<String>,
    ) -> Result<ChatTurn>;
}
