//! AI summary processing.
//!
//! Renders a stream slice into a tab-separated table, submits it to the
//! secondary model together with the athlete's prompt, and returns the text
//! summary with token accounting.

use std::sync::Arc;

use tracing::debug;

use cadence_core::{StreamSet, StreamType};
use cadence_llm::{ChatProvider, ChatRequest, Message};

use crate::error::{Result, StreamError};

/// Fixed analytical role for the secondary model.
const SUMMARY_SYSTEM_PROMPT: &str = "You are a sports scientist analyzing raw activity telemetry. \
     Answer strictly from the data table provided, quantifying your observations. \
     Keep the analysis concise and directly useful for coaching decisions.";

/// Low, fixed temperature: summaries must stay close to the data.
const SUMMARY_TEMPERATURE: f32 = 0.3;

/// Column order of the rendered table.
const TABLE_COLUMNS: [StreamType; 10] = [
    StreamType::Time,
    StreamType::Distance,
    StreamType::Heartrate,
    StreamType::Watts,
    StreamType::VelocitySmooth,
    StreamType::Cadence,
    StreamType::Altitude,
    StreamType::Temp,
    StreamType::GradeSmooth,
    StreamType::Moving,
];

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Result of one summary call.
#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    /// The model's text summary.
    pub text: String,
    /// Total tokens billed for the call.
    pub tokens_used: u32,
    /// The model that produced the summary.
    pub model: String,
}

/// Submits prepared stream text to the secondary model.
pub struct SummaryProcessor {
    provider: Arc<dyn ChatProvider>,
    model: String,
}

impl SummaryProcessor {
    /// Create a processor bound to a provider and model id.
    pub fn new(provider: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Summarize a stream slice with the athlete's prompt.
    pub async fn summarize(
        &self,
        set: &StreamSet,
        activity_id: i64,
        prompt: &str,
    ) -> Result<SummaryOutcome> {
        if set.is_empty() {
            return Err(StreamError::InvalidRequest {
                reason: "cannot summarize an empty stream payload".into(),
            });
        }
        if prompt.trim().is_empty() {
            return Err(StreamError::InvalidRequest {
                reason: "summary prompt must not be empty".into(),
            });
        }

        let table = render_table(set);
        let user_message = format!(
            "Telemetry for activity {activity_id} ({} samples), one row per sample:\n\n\
             {table}\n---\n{prompt}",
            set.len(),
        );

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system(SUMMARY_SYSTEM_PROMPT),
                Message::user(user_message),
            ],
            tools: vec![],
            temperature: Some(SUMMARY_TEMPERATURE),
            max_tokens: None,
        };

        debug!(activity_id, samples = set.len(), model = %self.model, "requesting stream summary");

        let turn = self
            .provider
            .chat(&request)
            .await
            .map_err(StreamError::ProcessorUnavailable)?;

        Ok(SummaryOutcome {
            text: turn.content,
            tokens_used: turn.usage.total_tokens,
            model: if turn.model.is_empty() {
                self.model.clone()
            } else {
                turn.model
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

/// Render the payload as a tab-separated table with a header row.
///
/// Columns follow [`TABLE_COLUMNS`] order, restricted to the types present.
pub fn render_table(set: &StreamSet) -> String {
    let columns: Vec<StreamType> = TABLE_COLUMNS
        .iter()
        .copied()
        .filter(|t| set.present_types().contains(t))
        .collect();

    let mut out = String::with_capacity(set.len() * columns.len() * 8);

    let header: Vec<&str> = columns.iter().map(|t| t.key()).collect();
    out.push_str(&header.join("\t"));
    out.push('\n');

    for i in 0..set.len() {
        let row: Vec<String> = columns.iter().map(|t| cell(set, *t, i)).collect();
        out.push_str(&row.join("\t"));
        out.push('\n');
    }

    out
}

fn cell(set: &StreamSet, column: StreamType, i: usize) -> String {
    match column {
        StreamType::Time => int_cell(&set.time, i),
        StreamType::Heartrate => int_cell(&set.heartrate, i),
        StreamType::Watts => int_cell(&set.watts, i),
        StreamType::Cadence => int_cell(&set.cadence, i),
        StreamType::Temp => int_cell(&set.temp, i),
        StreamType::Distance => float_cell(&set.distance, i, 1),
        StreamType::Altitude => float_cell(&set.altitude, i, 1),
        StreamType::VelocitySmooth => float_cell(&set.velocity_smooth, i, 2),
        StreamType::GradeSmooth => float_cell(&set.grade_smooth, i, 3),
        StreamType::Moving => set
            .moving
            .as_ref()
            .and_then(|v| v.get(i))
            .map(|m| if *m { "1" } else { "0" }.to_owned())
            .unwrap_or_default(),
        StreamType::Latlng => String::new(),
    }
}

fn int_cell(series: &Option<Vec<i64>>, i: usize) -> String {
    series
        .as_ref()
        .and_then(|v| v.get(i))
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn float_cell(series: &Option<Vec<f64>>, i: usize, decimals: usize) -> String {
    series
        .as_ref()
        .and_then(|v| v.get(i))
        .map(|v| format!("{v:.decimals$}"))
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cadence_llm::{ChatTurn, LlmError, Usage};
    use tokio::sync::mpsc;

    struct CannedProvider {
        reply: String,
    }

    #[async_trait]
    impl ChatProvider for CannedProvider {
        async fn chat(&self, request: &ChatRequest) -> cadence_llm::Result<ChatTurn> {
            // The summary request must carry the fixed system prompt and a
            // low temperature.
            assert_eq!(request.messages[0].content, SUMMARY_SYSTEM_PROMPT);
            assert_eq!(request.temperature, Some(0.3));
            Ok(ChatTurn {
                content: self.reply.clone(),
                tool_calls: vec![],
                usage: Usage {
                    prompt_tokens: 900,
                    completion_tokens: 100,
                    total_tokens: 1_000,
                },
                model: "gpt-4o-mini".into(),
            })
        }

        async fn stream_chat(
            &self,
            _request: &ChatRequest,
            _output: &mpsc::Sender<String>,
        ) -> cadence_llm::Result<ChatTurn> {
            Err(LlmError::RequestFailed {
                reason: "streaming not used by the summary processor".into(),
            })
        }
    }

    fn sample_set() -> StreamSet {
        StreamSet {
            time: Some(vec![0, 1, 2]),
            heartrate: Some(vec![140, 145, 150]),
            velocity_smooth: Some(vec![8.0, 8.25, 8.5]),
            moving: Some(vec![true, true, false]),
            ..Default::default()
        }
    }

    #[test]
    fn table_has_header_and_ordered_columns() {
        let table = render_table(&sample_set());
        let mut lines = table.lines();

        assert_eq!(lines.next(), Some("time\theartrate\tvelocity_smooth\tmoving"));
        assert_eq!(lines.next(), Some("0\t140\t8.00\t1"));
        assert_eq!(lines.next(), Some("2\t150\t8.50\t0"));
        assert_eq!(lines.next(), None);
    }

    #[tokio::test]
    async fn summarize_returns_text_and_usage() {
        let processor = SummaryProcessor::new(
            Arc::new(CannedProvider {
                reply: "Steady aerobic effort.".into(),
            }),
            "gpt-4o-mini",
        );

        let outcome = processor
            .summarize(&sample_set(), 42, "How was the pacing?")
            .await
            .unwrap();

        assert_eq!(outcome.text, "Steady aerobic effort.");
        assert_eq!(outcome.tokens_used, 1_000);
        assert_eq!(outcome.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn empty_payload_rejected() {
        let processor = SummaryProcessor::new(
            Arc::new(CannedProvider { reply: String::new() }),
            "gpt-4o-mini",
        );
        let err = processor
            .summarize(&StreamSet::default(), 42, "prompt")
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn blank_prompt_rejected() {
        let processor = SummaryProcessor::new(
            Arc::new(CannedProvider { reply: String::new() }),
            "gpt-4o-mini",
        );
        let err = processor
            .summarize(&sample_set(), 42, "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, StreamError::InvalidRequest { .. }));
    }
}
