//! Integration tests for the iterative coaching loop.
//!
//! A scripted chat provider stands in for the model so the loop's round
//! accounting, message-list invariants, and degradation behavior can be
//! exercised without a network.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, mpsc};

use cadence_coach::{IterativeProcessor, MessageContext, ProcessorConfig, ToolExecutor};
use cadence_core::{
    LogbookService, RepoError, StravaCredentials, User, UserRepository, shared_user,
};
use cadence_llm::{
    ChatProvider, ChatRequest, ChatTurn, LlmError, Message, Role, ToolCall, Usage,
};
use cadence_strava::{StravaClient, StravaConfig};
use cadence_streams::PaginationConfig;

// ═══════════════════════════════════════════════════════════════════════
//  Fixtures
// ═══════════════════════════════════════════════════════════════════════

/// One scripted model round.
enum Scripted {
    /// Stream the content, then report these tool calls.
    Turn { content: String, tool_calls: Vec<ToolCall> },
    /// Fail the call as a provider outage.
    Unavailable,
}

/// Pops scripted turns and records every request it sees.
struct ScriptedProvider {
    turns: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    async fn seen_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn chat(&self, _request: &ChatRequest) -> cadence_llm::Result<ChatTurn> {
        unreachable!("the coach loop always streams")
    }

    async fn stream_chat(
        &self,
        request: &ChatRequest,
        output: &mpsc::Sender<String>,
    ) -> cadence_llm::Result<ChatTurn> {
        self.requests.lock().await.push(request.clone());

        let scripted = self
            .turns
            .lock()
            .await
            .pop_front()
            .expect("script exhausted: loop ran more rounds than scripted");

        match scripted {
            Scripted::Turn { content, tool_calls } => {
                // Stream the content in two fragments like a real provider.
                if !content.is_empty() {
                    let mid = content.len() / 2;
                    for chunk in [&content[..mid], &content[mid..]] {
                        if !chunk.is_empty()
                            && output.send(chunk.to_owned()).await.is_err()
                        {
                            return Err(LlmError::Cancelled);
                        }
                    }
                }
                Ok(ChatTurn {
                    content,
                    tool_calls,
                    usage: Usage::default(),
                    model: "scripted".into(),
                })
            }
            Scripted::Unavailable => Err(LlmError::Unavailable {
                reason: "scripted outage".into(),
            }),
        }
    }
}

struct NullUserRepo;

#[async_trait]
impl UserRepository for NullUserRepo {
    async fn update(&self, _user: &User) -> Result<(), RepoError> {
        Ok(())
    }
}

#[derive(Default)]
struct FakeLogbook {
    stored: Mutex<Option<String>>,
    writes: Mutex<u32>,
}

#[async_trait]
impl LogbookService for FakeLogbook {
    async fn get(&self, _user_id: &str) -> Result<Option<String>, RepoError> {
        Ok(self.stored.lock().await.clone())
    }

    async fn update(&self, _user_id: &str, content: &str) -> Result<(), RepoError> {
        *self.writes.lock().await += 1;
        *self.stored.lock().await = Some(content.to_owned());
        Ok(())
    }

    async fn upsert(&self, _user_id: &str, content: &str) -> Result<(), RepoError> {
        *self.writes.lock().await += 1;
        *self.stored.lock().await = Some(content.to_owned());
        Ok(())
    }
}

fn logbook_call(id: &str) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: "update-athlete-logbook".into(),
        arguments: r#"{"content":"Notes from this round."}"#.into(),
    }
}

fn build_processor(
    provider: Arc<ScriptedProvider>,
    logbook: Arc<FakeLogbook>,
    max_rounds: u32,
) -> Arc<IterativeProcessor> {
    // `RUST_LOG=debug cargo test` shows the round-by-round trace.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let user = shared_user(User {
        id: "athlete-1".into(),
        credentials: StravaCredentials {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        },
    });

    let strava = Arc::new(
        StravaClient::new(StravaConfig::new("id", "secret"), Arc::new(NullUserRepo)).unwrap(),
    );

    let executor = Arc::new(ToolExecutor::new(
        strava,
        logbook,
        provider.clone(),
        "gpt-4o-mini",
        PaginationConfig::default(),
        user,
        "athlete-1",
    ));

    Arc::new(IterativeProcessor::new(
        provider,
        executor,
        ProcessorConfig {
            max_rounds,
            ..Default::default()
        },
    ))
}

fn request_context() -> MessageContext {
    MessageContext {
        user_id: "athlete-1".into(),
        session_id: "session-1".into(),
        message: "How is my training going?".into(),
        history: vec![
            Message::user("earlier question"),
            Message::assistant("earlier answer"),
        ],
        logbook: Some("Goal: finish a gravel century.".into()),
        user: shared_user(User {
            id: "athlete-1".into(),
            credentials: StravaCredentials {
                access_token: "a".into(),
                refresh_token: "r".into(),
                expires_at: Utc::now() + chrono::Duration::hours(1),
            },
        }),
    }
}

async fn drain(mut rx: mpsc::Receiver<String>) -> String {
    let mut out = String::new();
    while let Some(chunk) = rx.recv().await {
        out.push_str(&chunk);
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════
//  Happy path & invariants
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn plain_answer_finishes_in_one_round() {
    let provider = ScriptedProvider::new(vec![Scripted::Turn {
        content: "Your training looks consistent. Keep the easy days easy.".into(),
        tool_calls: vec![],
    }]);
    let processor = build_processor(provider.clone(), Arc::new(FakeLogbook::default()), 10);

    let output = drain(processor.stream(request_context())).await;

    assert_eq!(output, "Your training looks consistent. Keep the easy days easy.");
    assert_eq!(provider.seen_requests().await.len(), 1);
}

#[tokio::test]
async fn every_request_starts_with_exactly_one_system_message() {
    let provider = ScriptedProvider::new(vec![
        Scripted::Turn {
            content: String::new(),
            tool_calls: vec![logbook_call("call_1")],
        },
        Scripted::Turn {
            content: "All noted.".into(),
            tool_calls: vec![],
        },
    ]);
    let processor = build_processor(provider.clone(), Arc::new(FakeLogbook::default()), 10);

    drain(processor.stream(request_context())).await;

    let requests = provider.seen_requests().await;
    assert_eq!(requests.len(), 2);
    for request in &requests {
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(
            request
                .messages
                .iter()
                .filter(|m| m.role == Role::System)
                .count(),
            1
        );
        // Tool descriptors always travel with the request.
        assert_eq!(request.tools.len(), 5);
    }
    // The logbook reached the system prompt.
    assert!(requests[0].messages[0].content.contains("gravel century"));
}

#[tokio::test]
async fn tool_messages_pair_with_emitted_calls_in_order() {
    let provider = ScriptedProvider::new(vec![
        Scripted::Turn {
            content: "Checking a couple of things.".into(),
            tool_calls: vec![logbook_call("call_a"), logbook_call("call_b")],
        },
        Scripted::Turn {
            content: "Done.".into(),
            tool_calls: vec![],
        },
    ]);
    let processor = build_processor(provider.clone(), Arc::new(FakeLogbook::default()), 10);

    drain(processor.stream(request_context())).await;

    let requests = provider.seen_requests().await;
    let second = &requests[1].messages;

    // ... history, user, assistant(tool_calls), tool, tool
    let assistant = &second[second.len() - 3];
    assert_eq!(assistant.role, Role::Assistant);
    assert_eq!(assistant.content, "Checking a couple of things.");
    assert_eq!(assistant.tool_calls.len(), 2);

    let tool_a = &second[second.len() - 2];
    let tool_b = &second[second.len() - 1];
    assert_eq!(tool_a.role, Role::Tool);
    assert_eq!(tool_a.tool_call_id.as_deref(), Some("call_a"));
    assert_eq!(tool_b.tool_call_id.as_deref(), Some("call_b"));
}

#[tokio::test]
async fn progress_marker_emitted_between_rounds() {
    let provider = ScriptedProvider::new(vec![
        Scripted::Turn {
            content: String::new(),
            tool_calls: vec![logbook_call("call_1")],
        },
        Scripted::Turn {
            content: "Logged it.".into(),
            tool_calls: vec![],
        },
    ]);
    let processor = build_processor(provider.clone(), Arc::new(FakeLogbook::default()), 10);

    let output = drain(processor.stream(request_context())).await;

    assert!(output.contains("*Updating your training logbook...*"));
    assert!(output.ends_with("Logged it."));
}

// ═══════════════════════════════════════════════════════════════════════
//  Termination & failure handling
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn terminates_at_max_rounds_with_closing_phrase() {
    // The model asks for tools every round and never produces text.
    let provider = ScriptedProvider::new(vec![
        Scripted::Turn {
            content: String::new(),
            tool_calls: vec![logbook_call("call_1")],
        },
        Scripted::Turn {
            content: String::new(),
            tool_calls: vec![logbook_call("call_2")],
        },
        Scripted::Turn {
            content: String::new(),
            tool_calls: vec![logbook_call("call_3")],
        },
    ]);
    let logbook = Arc::new(FakeLogbook::default());
    let processor = build_processor(provider.clone(), logbook.clone(), 3);

    let output = drain(processor.stream(request_context())).await;

    // Exactly three model rounds ran.
    assert_eq!(provider.seen_requests().await.len(), 3);
    // The last round produced no text, so the closing phrase was emitted.
    assert!(output.contains("ask me about any part of it"));
    // Only the first two rounds' tools were dispatched.
    assert_eq!(*logbook.writes.lock().await, 2);
}

#[tokio::test]
async fn no_closing_phrase_when_final_round_has_content() {
    let provider = ScriptedProvider::new(vec![
        Scripted::Turn {
            content: String::new(),
            tool_calls: vec![logbook_call("call_1")],
        },
        Scripted::Turn {
            content: "Here's a partial picture already.".into(),
            tool_calls: vec![logbook_call("call_2")],
        },
    ]);
    let processor = build_processor(provider.clone(), Arc::new(FakeLogbook::default()), 2);

    let output = drain(processor.stream(request_context())).await;

    assert!(output.contains("partial picture"));
    assert!(!output.contains("ask me about any part of it"));
}

#[tokio::test]
async fn outage_after_gathered_data_degrades_gracefully() {
    let provider = ScriptedProvider::new(vec![
        Scripted::Turn {
            content: "Let me check your logbook.".into(),
            tool_calls: vec![logbook_call("call_1")],
        },
        Scripted::Unavailable,
    ]);
    let processor = build_processor(provider.clone(), Arc::new(FakeLogbook::default()), 10);

    let output = drain(processor.stream(request_context())).await;

    // The earlier content survived and a friendly notice was appended.
    assert!(output.contains("Let me check your logbook."));
    assert!(output.contains("couldn't pull in the rest of your data"));
    // No internal terminology leaked.
    assert!(!output.contains("Unavailable"));
    assert!(!output.contains("scripted outage"));
}

#[tokio::test]
async fn outage_with_no_data_apologizes() {
    let provider = ScriptedProvider::new(vec![Scripted::Unavailable]);
    let processor = build_processor(provider.clone(), Arc::new(FakeLogbook::default()), 10);

    let output = drain(processor.stream(request_context())).await;
    assert!(output.contains("trouble reaching your training data"));
}

#[tokio::test]
async fn unknown_tool_failure_keeps_round_advancing() {
    let provider = ScriptedProvider::new(vec![
        Scripted::Turn {
            content: String::new(),
            tool_calls: vec![
                ToolCall {
                    id: "call_bad".into(),
                    name: "no-such-tool".into(),
                    arguments: "{}".into(),
                },
                logbook_call("call_good"),
            ],
        },
        Scripted::Turn {
            content: "Noted despite the hiccup.".into(),
            tool_calls: vec![],
        },
    ]);
    let processor = build_processor(provider.clone(), Arc::new(FakeLogbook::default()), 10);

    let output = drain(processor.stream(request_context())).await;
    assert!(output.ends_with("Noted despite the hiccup."));

    // The failed call was excluded from the appended sequence; the success
    // was kept, still paired.
    let requests = provider.seen_requests().await;
    let second = &requests[1].messages;
    let assistant = &second[second.len() - 2];
    assert_eq!(assistant.tool_calls.len(), 1);
    assert_eq!(assistant.tool_calls[0].id, "call_good");
    assert_eq!(
        second[second.len() - 1].tool_call_id.as_deref(),
        Some("call_good")
    );
}

#[tokio::test]
async fn empty_message_fails_validation() {
    let provider = ScriptedProvider::new(vec![]);
    let processor = build_processor(provider.clone(), Arc::new(FakeLogbook::default()), 10);

    let mut ctx = request_context();
    ctx.message = "   ".into();

    let output = drain(processor.stream(ctx)).await;
    // The loop never reached the model.
    assert!(provider.seen_requests().await.is_empty());
    assert!(output.contains("trouble reaching your training data"));
}

#[tokio::test]
async fn dropped_receiver_cancels_before_any_tool_runs() {
    let provider = ScriptedProvider::new(vec![
        Scripted::Turn {
            content: "streamed text".into(),
            tool_calls: vec![logbook_call("call_1")],
        },
        Scripted::Turn {
            content: "never consumed".into(),
            tool_calls: vec![],
        },
    ]);
    let logbook = Arc::new(FakeLogbook::default());
    let processor = build_processor(provider.clone(), logbook.clone(), 10);

    // Close the channel before the request task gets to run: the first
    // content send observes the closed channel and cancels the request.
    let rx = processor.stream(request_context());
    drop(rx);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(*logbook.writes.lock().await, 0);
    assert_eq!(provider.turns.lock().await.len(), 1);
}
