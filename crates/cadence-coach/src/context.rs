//! Per-request inputs to the coaching loop.

use cadence_core::SharedUser;
use cadence_llm::{Message, Role};

use crate::error::{CoachError, Result};

/// Maximum accepted user-message length, characters.
const MAX_MESSAGE_CHARS: usize = 8_192;

/// Maximum accepted prior-history length, messages.
const MAX_HISTORY_MESSAGES: usize = 200;

/// Immutable inputs for one coaching request.
#[derive(Clone)]
pub struct MessageContext {
    /// Application-level user id.
    pub user_id: String,
    /// Conversation session id.
    pub session_id: String,
    /// The athlete's current message.
    pub message: String,
    /// Prior conversation history; only user and assistant entries are
    /// forwarded to the model.
    pub history: Vec<Message>,
    /// Free-form athlete logbook, when one exists.
    pub logbook: Option<String>,
    /// Credentials handle for the athlete's provider account.
    pub user: SharedUser,
}

impl MessageContext {
    /// Validate the request inputs.
    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(CoachError::InvalidRequest {
                reason: "message must not be empty".into(),
            });
        }
        if self.message.chars().count() > MAX_MESSAGE_CHARS {
            return Err(CoachError::InvalidRequest {
                reason: format!("message exceeds {MAX_MESSAGE_CHARS} characters"),
            });
        }
        if self.history.len() > MAX_HISTORY_MESSAGES {
            return Err(CoachError::InvalidRequest {
                reason: format!("history exceeds {MAX_HISTORY_MESSAGES} messages"),
            });
        }
        Ok(())
    }

    /// History entries suitable for the model: user and assistant roles
    /// only, tool plumbing dropped.
    pub fn history_for_model(&self) -> impl Iterator<Item = Message> + '_ {
        self.history
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .map(|m| match m.role {
                Role::User => Message::user(&m.content),
                _ => Message::assistant(&m.content),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
