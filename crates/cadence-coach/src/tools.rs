//! Tool registry and executor.
//!
//! The registry publishes the closed tool set with its JSON-schema parameter
//! descriptors; the executor parses arguments, applies defaults, runs the
//! concrete invocation, and reports per-tool success or failure.  Tool calls
//! within a round are dispatched concurrently with their emission order
//! preserved in the collected results.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use cadence_core::{Lap, LogbookService, Resolution, SharedUser, StreamSet, StreamType};
use cadence_llm::{ChatProvider, ToolCall, ToolDefinition, ToolResult};
use cadence_strava::{ActivityQuery, StravaClient};
use cadence_streams::{
    PaginatedStreamRequest, PaginationConfig, ProcessingMode, StreamError, StreamSource,
    SummaryProcessor, UnifiedStreamProcessor, render_activities, render_activity_details,
    render_profile,
};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// The tool descriptors published to the model.
///
/// These schemas are part of the public contract; downstream prompts and
/// evaluations depend on their exact shape.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "get-athlete-profile".into(),
            description: "Fetch the athlete's profile and configured training zones.".into(),
            parameters: json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        },
        ToolDefinition {
            name: "get-recent-activities".into(),
            description: "List the athlete's most recent activities.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "per_page": {
                        "type": "integer",
                        "description": "Number of activities to return (1-200).",
                        "minimum": 1,
                        "maximum": 200,
                        "default": 30
                    }
                },
                "required": []
            }),
        },
        ToolDefinition {
            name: "get-activity-details".into(),
            description: "Fetch full details for one activity, including laps.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "activity_id": {
                        "type": "integer",
                        "description": "The activity id from get-recent-activities."
                    }
                },
                "required": ["activity_id"]
            }),
        },
        ToolDefinition {
            name: "get-activity-streams".into(),
            description: "Fetch and process an activity's time-series streams. Large datasets \
                          are paginated; use processing_mode to control how much detail is \
                          returned."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "activity_id": {
                        "type": "integer",
                        "description": "The activity id to fetch streams for."
                    },
                    "stream_types": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "enum": ["time", "distance", "latlng", "altitude", "velocity_smooth",
                                     "heartrate", "cadence", "watts", "temp", "moving",
                                     "grade_smooth"]
                        },
                        "description": "Stream types to fetch. Defaults to time, distance, heartrate, watts."
                    },
                    "resolution": {
                        "type": "string",
                        "enum": ["low", "medium", "high"],
                        "description": "Sampling resolution. Defaults to medium."
                    },
                    "processing_mode": {
                        "type": "string",
                        "enum": ["raw", "derived", "ai-summary"],
                        "description": "How to render the data. Defaults to ai-summary."
                    },
                    "page_number": {
                        "type": "integer",
                        "description": "1-based page number. Defaults to 1."
                    },
                    "page_size": {
                        "type": "integer",
                        "description": "Samples per page. Use -1 to process the full dataset. Defaults to 1000."
                    },
                    "summary_prompt": {
                        "type": "string",
                        "description": "Required with ai-summary mode: what the summary should focus on."
                    }
                },
                "required": ["activity_id"]
            }),
        },
        ToolDefinition {
            name: "update-athlete-logbook".into(),
            description: "Replace the athlete's logbook with updated free-form notes about \
                          goals, constraints, and observations worth remembering."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "content": {
                        "type": "string",
                        "description": "The full new logbook content."
                    }
                },
                "required": ["content"]
            }),
        },
    ]
}

// ---------------------------------------------------------------------------
// Argument types
// ---------------------------------------------------------------------------

fn default_per_page() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
struct RecentActivitiesArgs {
    #[serde(default = "default_per_page")]
    per_page: u32,
}

#[derive(Debug, Deserialize)]
struct ActivityDetailsArgs {
    activity_id: i64,
}

#[derive(Debug, Deserialize)]
struct ActivityStreamsArgs {
    activity_id: i64,
    #[serde(default)]
    stream_types: Option<Vec<String>>,
    #[serde(default)]
    resolution: Option<String>,
    #[serde(default)]
    processing_mode: Option<String>,
    #[serde(default)]
    page_number: Option<i64>,
    #[serde(default)]
    page_size: Option<i64>,
    #[serde(default)]
    summary_prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogbookArgs {
    content: String,
}

/// Stream types fetched when the model leaves `stream_types` unset.
const DEFAULT_STREAM_TYPES: [StreamType; 4] = [
    StreamType::Time,
    StreamType::Distance,
    StreamType::Heartrate,
    StreamType::Watts,
];

/// Page size applied when the model leaves `page_size` unset.
const DEFAULT_PAGE_SIZE: i64 = 1_000;

// ---------------------------------------------------------------------------
// Stream source adapter
// ---------------------------------------------------------------------------

/// Adapts the provider client (bound to one athlete) onto the stream
/// processor's data seam.
pub struct StravaStreamSource {
    client: Arc<StravaClient>,
    user: SharedUser,
}

impl StravaStreamSource {
    /// Create a source for one athlete.
    pub fn new(client: Arc<StravaClient>, user: SharedUser) -> Self {
        Self { client, user }
    }
}

#[async_trait]
impl StreamSource for StravaStreamSource {
    async fn streams(
        &self,
        activity_id: i64,
        types: &[StreamType],
        resolution: Resolution,
    ) -> Result<StreamSet, StreamError> {
        self.client
            .get_activity_streams(&self.user, activity_id, types, resolution)
            .await
            .map_err(|e| StreamError::StravaApiFailure {
                reason: e.to_string(),
            })
    }

    async fn laps(&self, activity_id: i64) -> Result<Vec<Lap>, StreamError> {
        self.client
            .get_activity(&self.user, activity_id)
            .await
            .map(|detail| detail.laps)
            .map_err(|e| StreamError::StravaApiFailure {
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Executes tool calls for one coaching request.
pub struct ToolExecutor {
    strava: Arc<StravaClient>,
    logbook: Arc<dyn LogbookService>,
    streams: UnifiedStreamProcessor,
    user: SharedUser,
    user_id: String,
}

impl ToolExecutor {
    /// Create an executor bound to one athlete's request.
    pub fn new(
        strava: Arc<StravaClient>,
        logbook: Arc<dyn LogbookService>,
        summary_provider: Arc<dyn ChatProvider>,
        summary_model: impl Into<String>,
        pagination: PaginationConfig,
        user: SharedUser,
        user_id: impl Into<String>,
    ) -> Self {
        let source = Arc::new(StravaStreamSource::new(Arc::clone(&strava), user.clone()));
        let streams = UnifiedStreamProcessor::new(
            source,
            SummaryProcessor::new(summary_provider, summary_model),
            pagination,
        );

        Self {
            strava,
            logbook,
            streams,
            user,
            user_id: user_id.into(),
        }
    }

    /// Dispatch a round of tool calls concurrently.
    ///
    /// Results come back in the calls' emission order regardless of which
    /// finishes first.
    pub async fn execute_all(
        self: Arc<Self>,
        calls: &[ToolCall],
        current_context_tokens: usize,
    ) -> Vec<ToolResult> {
        let mut handles = Vec::with_capacity(calls.len());
        for call in calls {
            let executor = Arc::clone(&self);
            let call = call.clone();
            handles.push(tokio::spawn(async move {
                executor.execute(&call, current_context_tokens).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (handle, call) in handles.into_iter().zip(calls) {
            let result = handle.await.unwrap_or_else(|e| {
                warn!(tool = %call.name, error = %e, "tool task panicked");
                ToolResult::err(&call.id, format!("tool `{}` crashed", call.name))
            });
            results.push(result);
        }
        results
    }

    /// Execute one tool call; failures are reported in the result, never
    /// raised.
    pub async fn execute(&self, call: &ToolCall, current_context_tokens: usize) -> ToolResult {
        debug!(tool = %call.name, id = %call.id, user_id = %self.user_id, "executing tool");

        let args = if call.arguments.trim().is_empty() {
            "{}"
        } else {
            call.arguments.as_str()
        };

        let outcome = match call.name.as_str() {
            "get-athlete-profile" => self.athlete_profile().await,
            "get-recent-activities" => match serde_json::from_str::<RecentActivitiesArgs>(args) {
                Ok(parsed) => self.recent_activities(parsed).await,
                Err(e) => Err(format!("invalid arguments: {e}")),
            },
            "get-activity-details" => match serde_json::from_str::<ActivityDetailsArgs>(args) {
                Ok(parsed) => self.activity_details(parsed).await,
                Err(e) => Err(format!("invalid arguments: {e}")),
            },
            "get-activity-streams" => match serde_json::from_str::<ActivityStreamsArgs>(args) {
                Ok(parsed) => self.activity_streams(parsed, current_context_tokens).await,
                Err(e) => Err(format!("invalid arguments: {e}")),
            },
            "update-athlete-logbook" => match serde_json::from_str::<LogbookArgs>(args) {
                Ok(parsed) => self.update_logbook(parsed).await,
                Err(e) => Err(format!("invalid arguments: {e}")),
            },
            other => Err(format!("unknown tool: {other}")),
        };

        match outcome {
            Ok((content, payload)) => {
                let mut result = ToolResult::ok(&call.id, content);
                result.payload = payload;
                result
            }
            Err(reason) => {
                warn!(tool = %call.name, reason = %reason, "tool execution failed");
                ToolResult::err(&call.id, reason)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Concrete tools
    // -----------------------------------------------------------------------

    async fn athlete_profile(&self) -> ToolOutcome {
        let profile = self
            .strava
            .get_athlete(&self.user)
            .await
            .map_err(|e| e.to_string())?;
        // Zones are best-effort: a profile without zones is still useful.
        let zones = self.strava.get_athlete_zones(&self.user).await.ok();
        Ok((render_profile(&profile, zones.as_ref()), None))
    }

    async fn recent_activities(&self, args: RecentActivitiesArgs) -> ToolOutcome {
        let query = ActivityQuery {
            per_page: Some(args.per_page.clamp(1, 200) as usize),
            ..Default::default()
        };
        let activities = self
            .strava
            .get_activities(&self.user, &query)
            .await
            .map_err(|e| e.to_string())?;
        Ok((render_activities(&activities), None))
    }

    async fn activity_details(&self, args: ActivityDetailsArgs) -> ToolOutcome {
        let detail = self
            .strava
            .get_activity(&self.user, args.activity_id)
            .await
            .map_err(|e| e.to_string())?;
        let zones = self.strava.get_athlete_zones(&self.user).await.ok();
        Ok((render_activity_details(&detail, zones.as_ref()), None))
    }

    async fn activity_streams(
        &self,
        args: ActivityStreamsArgs,
        current_context_tokens: usize,
    ) -> ToolOutcome {
        let stream_types = match args.stream_types {
            None => DEFAULT_STREAM_TYPES.to_vec(),
            Some(names) => {
                let mut types = Vec::with_capacity(names.len());
                for name in &names {
                    match StreamType::from_key(name) {
                        Some(t) => types.push(t),
                        None => return Err(format!("unknown stream type: {name}")),
                    }
                }
                types
            }
        };

        let resolution = match args.resolution.as_deref() {
            None => Resolution::Medium,
            Some("low") => Resolution::Low,
            Some("medium") => Resolution::Medium,
            Some("high") => Resolution::High,
            Some(other) => return Err(format!("unknown resolution: {other}")),
        };

        let mode = match args.processing_mode.as_deref() {
            None => ProcessingMode::AiSummary,
            Some(label) => {
                ProcessingMode::parse(label).ok_or_else(|| format!("unknown processing mode: {label}"))?
            }
        };

        let request = PaginatedStreamRequest {
            activity_id: args.activity_id,
            stream_types,
            resolution,
            mode,
            page_number: args.page_number.unwrap_or(1),
            page_size: args.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            summary_prompt: args.summary_prompt,
        };

        let page = self
            .streams
            .process(&request, current_context_tokens)
            .await
            .map_err(|e| e.to_string())?;

        let payload = serde_json::to_value(&page).ok();
        let content = format!("{}\n\n{}", page.content, page.instructions);
        Ok((content, payload))
    }

    async fn update_logbook(&self, args: LogbookArgs) -> ToolOutcome {
        if args.content.trim().is_empty() {
            return Err("logbook content must not be empty".into());
        }

        match self.logbook.update(&self.user_id, &args.content).await {
            Ok(()) => {}
            // First write for this athlete: fall through to create.
            Err(e) if e.is_not_found() => self
                .logbook
                .upsert(&self.user_id, &args.content)
                .await
                .map_err(|e| e.to_string())?,
            Err(e) => return Err(e.to_string()),
        }

        Ok(("📓 Logbook updated.".to_owned(), None))
    }
}

/// Content plus optional structured payload, or a failure reason.
type ToolOutcome = Result<(String, Option<serde_json::Value>), String>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{RepoError, StravaCredentials, User, UserRepository, shared_user};
    use cadence_llm::{ChatRequest, ChatTurn};
    use cadence_strava::StravaConfig;
    use tokio::sync::{Mutex, mpsc};

    struct NullUserRepo;

    #[async_trait]
    impl UserRepository for NullUserRepo {
        async fn update(&self, _user: &User) -> Result<(), RepoError> {
            Ok(())
        }
    }

    /// Logbook fake that reports "not found" until the first upsert.
    #[derive(Default)]
    struct FakeLogbook {
        stored: Mutex<Option<String>>,
    }

    #[async_trait]
    impl LogbookService for FakeLogbook {
        async fn get(&self, _user_id: &str) -> Result<Option<String>, RepoError> {
            Ok(self.stored.lock().await.clone())
        }

        async fn update(&self, user_id: &str, content: &str) -> Result<(), RepoError> {
            let mut stored = self.stored.lock().await;
            if stored.is_none() {
                return Err(RepoError::NotFound {
                    entity: "logbook".into(),
                    id: user_id.into(),
                });
            }
            *stored = Some(content.to_owned());
            Ok(())
        }

        async fn upsert(&self, _user_id: &str, content: &str) -> Result<(), RepoError> {
            *self.stored.lock().await = Some(content.to_owned());
            Ok(())
        }
    }

    struct NullProvider;

    #[async_trait]
    impl ChatProvider for NullProvider {
        async fn chat(&self, _request: &ChatRequest) -> cadence_llm::Result<ChatTurn> {
            Ok(ChatTurn::default())
        }

        async fn stream_chat(
            &self,
            _request: &ChatRequest,
            _output: &mpsc::Sender<String>,
        ) -> cadence_llm::Result<ChatTurn> {
            Ok(ChatTurn::default())
        }
    }

    fn executor_with(logbook: Arc<FakeLogbook>) -> Arc<ToolExecutor> {
        let user = shared_user(User {
            id: "athlete-1".into(),
            credentials: StravaCredentials {
                access_token: "a".into(),
                refresh_token: "r".into(),
                expires_at: chrono::Utc::now(),
            },
        });
        let strava = Arc::new(
            StravaClient::new(StravaConfig::new("id", "secret"), Arc::new(NullUserRepo)).unwrap(),
        );
        Arc::new(ToolExecutor::new(
            strava,
            logbook,
            Arc::new(NullProvider),
            "gpt-4o-mini",
            PaginationConfig::default(),
            user,
            "athlete-1",
        ))
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: "call_test".into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    #[test]
    fn registry_publishes_all_five_tools() {
        let defs = tool_definitions();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "get-athlete-profile",
                "get-recent-activities",
                "get-activity-details",
                "get-activity-streams",
                "update-athlete-logbook",
            ]
        );
    }

    #[test]
    fn stream_tool_schema_enumerates_modes_and_types() {
        let defs = tool_definitions();
        let streams = defs.iter().find(|d| d.name == "get-activity-streams").unwrap();
        let props = &streams.parameters["properties"];

        assert_eq!(
            props["processing_mode"]["enum"],
            json!(["raw", "derived", "ai-summary"])
        );
        assert_eq!(props["resolution"]["enum"], json!(["low", "medium", "high"]));
        assert_eq!(streams.parameters["required"], json!(["activity_id"]));

        let types = props["stream_types"]["items"]["enum"].as_array().unwrap();
        assert_eq!(types.len(), 11);
    }

    #[test]
    fn per_page_schema_bounds() {
        let defs = tool_definitions();
        let recent = defs.iter().find(|d| d.name == "get-recent-activities").unwrap();
        let per_page = &recent.parameters["properties"]["per_page"];
        assert_eq!(per_page["minimum"], 1);
        assert_eq!(per_page["maximum"], 200);
        assert_eq!(per_page["default"], 30);
    }

    #[tokio::test]
    async fn unknown_tool_reports_error_result() {
        let executor = executor_with(Arc::new(FakeLogbook::default()));
        let result = executor.execute(&call("time-travel", "{}"), 0).await;

        assert!(!result.is_success());
        assert_eq!(result.tool_call_id, "call_test");
        assert!(result.error.as_deref().unwrap().contains("unknown tool"));
        assert!(result.content.contains("unknown tool"));
    }

    #[tokio::test]
    async fn malformed_arguments_reported_per_tool() {
        let executor = executor_with(Arc::new(FakeLogbook::default()));
        let result = executor
            .execute(&call("get-activity-details", "{broken"), 0)
            .await;
        assert!(!result.is_success());
        assert!(result.error.as_deref().unwrap().contains("invalid arguments"));
    }

    #[tokio::test]
    async fn logbook_update_retries_with_upsert() {
        let logbook = Arc::new(FakeLogbook::default());
        let executor = executor_with(Arc::clone(&logbook));

        let result = executor
            .execute(
                &call("update-athlete-logbook", r#"{"content":"Goal: sub-3 marathon"}"#),
                0,
            )
            .await;

        assert!(result.is_success(), "error: {:?}", result.error);
        assert_eq!(
            logbook.stored.lock().await.as_deref(),
            Some("Goal: sub-3 marathon")
        );
    }

    #[tokio::test]
    async fn empty_logbook_content_rejected() {
        let executor = executor_with(Arc::new(FakeLogbook::default()));
        let result = executor
            .execute(&call("update-athlete-logbook", r#"{"content":"  "}"#), 0)
            .await;
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn parallel_dispatch_preserves_call_order() {
        let executor = executor_with(Arc::new(FakeLogbook::default()));
        let calls = vec![
            ToolCall {
                id: "call_a".into(),
                name: "update-athlete-logbook".into(),
                arguments: r#"{"content":"first"}"#.into(),
            },
            ToolCall {
                id: "call_b".into(),
                name: "no-such-tool".into(),
                arguments: "{}".into(),
            },
        ];

        let results = executor.clone().execute_all(&calls, 0).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].tool_call_id, "call_a");
        assert_eq!(results[1].tool_call_id, "call_b");
        assert!(results[0].is_success());
        assert!(!results[1].is_success());
    }
}
