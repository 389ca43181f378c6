//! The iterative tool-calling loop.
//!
//! One request owns one logical task: build the conversation, then loop
//! (redact, stream a model turn into the caller's channel, dispatch any tool
//! calls, fold the results back in) until the model answers without tools
//! or the round budget runs out.  The caller consumes a bounded channel of
//! text chunks; dropping the receiver cancels the request at the next
//! suspension point.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use cadence_llm::{ChatProvider, ChatRequest, LlmError, Message, ToolResult};

use crate::context::MessageContext;
use crate::error::{CoachError, Result};
use crate::progress::progress_phrase;
use crate::redaction::ContextManager;
use crate::tools::{ToolExecutor, tool_definitions};

/// Capacity of the caller-facing chunk channel; a full channel blocks the
/// model stream until the caller catches up.
const CHANNEL_CAPACITY: usize = 100;

/// Fixed coaching directives for every conversation.
const COACH_SYSTEM_PROMPT: &str = "You are an endurance coach working with this athlete's real training data. \
     Ground every observation in data fetched through your tools; never invent numbers. \
     Fetch the athlete profile or recent activities before drilling into streams. \
     When the athlete shares durable facts (goals, injuries, constraints, preferences), \
     record them with the logbook tool. \
     Be encouraging, concrete, and honest about what the data shows.";

/// Emitted when the final round produced tool calls but no text.
const CLOSING_PHRASE: &str = "I've gathered quite a bit of data. Ask me about any part of it and I'll break it down.";

/// Emitted when later rounds failed but earlier rounds produced data.
const DEGRADED_PHRASE: &str = "\n\nI couldn't pull in the rest of your data just now, but the above covers what I found.";

/// Emitted when the request fails before any data was gathered.
const APOLOGY_PHRASE: &str = "I'm having trouble reaching your training data right now. Please try again in a moment.";

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Knobs for the iterative loop.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Model used for the coaching conversation.
    pub model: String,
    /// Maximum rounds (one model call plus tool dispatch each).
    pub max_rounds: u32,
    /// Master switch for tool-output redaction.
    pub redaction_enabled: bool,
    /// Converts message characters into context-token estimates.
    pub token_per_char_ratio: f64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o".into(),
            max_rounds: 10,
            redaction_enabled: true,
            token_per_char_ratio: 0.25,
        }
    }
}

impl From<&cadence_core::CoachConfig> for ProcessorConfig {
    fn from(config: &cadence_core::CoachConfig) -> Self {
        Self {
            model: config.openai_model.clone(),
            max_rounds: config.max_rounds,
            redaction_enabled: config.redaction_enabled,
            token_per_char_ratio: config.token_per_char_ratio,
        }
    }
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Drives one coaching conversation round by round.
pub struct IterativeProcessor {
    provider: Arc<dyn ChatProvider>,
    executor: Arc<ToolExecutor>,
    redaction: ContextManager,
    config: ProcessorConfig,
}

impl IterativeProcessor {
    /// Create a processor for one request.
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        executor: Arc<ToolExecutor>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            provider,
            executor,
            redaction: ContextManager::new(config.redaction_enabled),
            config,
        }
    }

    /// Start processing and return the caller's chunk stream.
    ///
    /// The request runs on its own task; dropping the receiver cancels it.
    pub fn stream(self: Arc<Self>, ctx: MessageContext) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let request_id = Uuid::now_v7();
            if let Err(e) = self.run(request_id, ctx, &tx).await {
                error!(request_id = %request_id, error = %e, "coaching request failed");
                // Short, friendly, nothing internal.
                let _ = tx.send(APOLOGY_PHRASE.to_owned()).await;
            }
        });

        rx
    }

    /// The round loop.
    async fn run(
        &self,
        request_id: Uuid,
        ctx: MessageContext,
        tx: &mpsc::Sender<String>,
    ) -> Result<()> {
        ctx.validate()?;

        let tools = tool_definitions();
        let mut messages = build_initial_messages(&ctx);
        let mut round_results: Vec<Vec<ToolResult>> = Vec::new();

        info!(
            request_id = %request_id,
            user_id = %ctx.user_id,
            session_id = %ctx.session_id,
            max_rounds = self.config.max_rounds,
            "coaching request started"
        );

        for round in 0..self.config.max_rounds {
            // Redaction produces a per-call view; history stays intact.
            let view = self.redaction.apply(&messages);
            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: view,
                tools: tools.clone(),
                temperature: None,
                max_tokens: None,
            };

            debug!(request_id = %request_id, round, "model round start");

            let gathered_any = round_results.iter().any(|r| r.iter().any(ToolResult::is_success));
            let turn = match self.provider.stream_chat(&request, tx).await {
                Ok(turn) => turn,
                Err(LlmError::Cancelled) => {
                    debug!(request_id = %request_id, round, "caller went away, stopping");
                    return Ok(());
                }
                Err(e) if e.is_unavailable() && gathered_any => {
                    warn!(request_id = %request_id, round, error = %e, "model unavailable, degrading");
                    let _ = tx.send(DEGRADED_PHRASE.to_owned()).await;
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            if !turn.has_tool_calls() {
                messages.push(Message::assistant(&turn.content));
                info!(request_id = %request_id, rounds = round + 1, "conversation complete");
                return Ok(());
            }

            // Round budget check happens before dispatch: the final round's
            // tool calls are not executed.
            if round + 1 >= self.config.max_rounds {
                info!(request_id = %request_id, rounds = round + 1, "round budget exhausted");
                if turn.content.trim().is_empty() {
                    let _ = tx.send(CLOSING_PHRASE.to_owned()).await;
                }
                return Ok(());
            }

            // Progress marker between rounds, italicized for the caller.
            let names: Vec<&str> = turn.tool_calls.iter().map(|c| c.name.as_str()).collect();
            let phrase = progress_phrase(&names, round as usize);
            if tx.send(format!("\n\n*{phrase}*\n\n")).await.is_err() {
                return Ok(());
            }

            let context_tokens = self.estimate_context_tokens(&messages);
            let results = Arc::clone(&self.executor)
                .execute_all(&turn.tool_calls, context_tokens)
                .await;

            let succeeded: HashSet<&str> = results
                .iter()
                .filter(|r| r.is_success())
                .map(|r| r.tool_call_id.as_str())
                .collect();

            if succeeded.is_empty() {
                let reason = results
                    .iter()
                    .find_map(|r| r.error.clone())
                    .unwrap_or_else(|| "every tool in the round failed".into());
                if gathered_any {
                    warn!(request_id = %request_id, round, reason = %reason, "tool round failed, degrading");
                    let _ = tx.send(DEGRADED_PHRASE.to_owned()).await;
                    return Ok(());
                }
                return Err(CoachError::ToolRoundFailed { reason });
            }

            // Failed tools are logged and dropped; the appended sequence
            // keeps assistant tool calls paired one-to-one with results.
            let kept_calls: Vec<_> = turn
                .tool_calls
                .iter()
                .filter(|c| succeeded.contains(c.id.as_str()))
                .cloned()
                .collect();

            messages.push(Message::assistant_with_tool_calls(&turn.content, kept_calls));
            for result in &results {
                if result.is_success() {
                    messages.push(Message::tool_result(&result.tool_call_id, &result.content));
                }
            }
            round_results.push(results);

            debug!(
                request_id = %request_id,
                round,
                messages = messages.len(),
                "round complete"
            );
        }

        Ok(())
    }

    /// Rough context-token estimate for the stream processor's budget.
    fn estimate_context_tokens(&self, messages: &[Message]) -> usize {
        let chars: usize = messages
            .iter()
            .map(|m| {
                m.content.len()
                    + m.tool_calls
                        .iter()
                        .map(|c| c.arguments.len() + c.name.len())
                        .sum::<usize>()
            })
            .sum();
        (chars as f64 * self.config.token_per_char_ratio).ceil() as usize
    }
}

// ---------------------------------------------------------------------------
// Message assembly
// ---------------------------------------------------------------------------

/// Build the initial conversation: one system message, prior history, then
/// the athlete's message.
fn build_initial_messages(ctx: &MessageContext) -> Vec<Message> {
    let system = match &ctx.logbook {
        Some(logbook) if !logbook.trim().is_empty() => {
            format!("{COACH_SYSTEM_PROMPT}\n\n## Athlete Logbook\n\n{logbook}")
        }
        _ => COACH_SYSTEM_PROMPT.to_owned(),
    };

    let mut messages = Vec::with_capacity(ctx.history.len() + 2);
    messages.push(Message::system(system));
    messages.extend(ctx.history_for_model());
    messages.push(Message::user(&ctx.message));
    messages
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{StravaCredentials, User, shared_user};
    use cadence_llm::Role;
    use chrono::Utc;

    fn context_with(logbook: Option<&str>, history: Vec<Message>) -> MessageContext {
        MessageContext {
            user_id: "u1".into(),
            session_id: "s1".into(),
            message: "How is my training going?".into(),
            history,
            logbook: logbook.map(String::from),
            user: shared_user(User {
                id: "u1".into(),
                credentials: StravaCredentials {
                    access_token: "a".into(),
                    refresh_token: "r".into(),
                    expires_at: Utc::now(),
                },
            }),
        }
    }

    #[test]
    fn initial_messages_start_with_one_system_message() {
        let ctx = context_with(None, vec![Message::user("hi"), Message::assistant("hello")]);
        let messages = build_initial_messages(&ctx);

        assert_eq!(messages[0].role, Role::System);
        assert_eq!(
            messages.iter().filter(|m| m.role == Role::System).count(),
            1
        );
        assert_eq!(messages.last().unwrap().content, "How is my training going?");
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn logbook_lands_in_system_prompt() {
        let ctx = context_with(Some("Goal: ride a 200k brevet in October."), vec![]);
        let messages = build_initial_messages(&ctx);
        assert!(messages[0].content.contains("## Athlete Logbook"));
        assert!(messages[0].content.contains("200k brevet"));

        let bare = build_initial_messages(&context_with(None, vec![]));
        assert!(!bare[0].content.contains("## Athlete Logbook"));
    }

    #[test]
    fn tool_history_entries_dropped_from_model_view() {
        let ctx = context_with(
            None,
            vec![
                Message::user("old question"),
                Message::tool_result("call_x", "old tool noise"),
                Message::assistant("old answer"),
            ],
        );
        let messages = build_initial_messages(&ctx);
        assert_eq!(messages.len(), 4);
        assert!(messages.iter().all(|m| m.tool_call_id.is_none()));
    }
}
