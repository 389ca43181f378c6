//! Unified stream processing.
//!
//! Routes a paginated stream request through the raw, derived, or AI-summary
//! mode under the context-token budget, falling back across modes when the
//! requested one fails.  The output is always a [`StreamPage`]; a request
//! only errors out on validation, fetch, or pagination failures.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cadence_core::{Resolution, StreamSet, StreamType};

use crate::error::{Result, StreamError};
use crate::features::extract_features;
use crate::pagination::{PaginationCalculator, PaginationConfig};
use crate::render::{navigation_instructions, render_derived_features, render_stream_data};
use crate::source::StreamSource;
use crate::summary::SummaryProcessor;

// ---------------------------------------------------------------------------
// Request & result types
// ---------------------------------------------------------------------------

/// How a stream slice is turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessingMode {
    /// Human-readable block of counts, ranges, and averages.
    Raw,
    /// Feature extraction: statistics, trends, spikes, laps.
    Derived,
    /// Secondary-model summary driven by the athlete's prompt.
    AiSummary,
}

impl ProcessingMode {
    /// Stable label used in results and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::Derived => "derived",
            Self::AiSummary => "ai-summary",
        }
    }

    /// Fallback order tried when this mode fails.
    fn fallbacks(&self) -> &'static [ProcessingMode] {
        match self {
            Self::AiSummary => &[Self::Derived, Self::Raw],
            Self::Derived => &[Self::Raw],
            Self::Raw => &[Self::Derived],
        }
    }

    /// Parse a mode label.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "raw" => Some(Self::Raw),
            "derived" => Some(Self::Derived),
            "ai-summary" => Some(Self::AiSummary),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A request for one page of processed stream data.
#[derive(Debug, Clone)]
pub struct PaginatedStreamRequest {
    pub activity_id: i64,
    pub stream_types: Vec<StreamType>,
    pub resolution: Resolution,
    pub mode: ProcessingMode,
    /// 1-based page number; ignored when `page_size` is negative.
    pub page_number: i64,
    /// Positive page size, `0` for "let the calculator decide", or negative
    /// for full-dataset processing.
    pub page_size: i64,
    /// Required when `mode` is [`ProcessingMode::AiSummary`].
    pub summary_prompt: Option<String>,
}

/// One processed page of stream data.
#[derive(Debug, Clone, Serialize)]
pub struct StreamPage {
    pub activity_id: i64,
    pub page_number: i64,
    pub total_pages: i64,
    /// Effective mode label; `"fallback"` when the requested mode failed.
    pub mode: String,
    /// Rendered content for the model.
    pub content: String,
    /// First and last time samples of the slice, seconds.
    pub time_range: Option<(i64, i64)>,
    pub has_next_page: bool,
    pub estimated_tokens: usize,
    /// Navigation help for requesting neighboring pages.
    pub instructions: String,
}

/// Label reported when a fallback mode produced the content.
const FALLBACK_MODE: &str = "fallback";

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

/// Routes stream requests through modes under a token budget.
pub struct UnifiedStreamProcessor {
    source: Arc<dyn StreamSource>,
    summary: SummaryProcessor,
    calculator: PaginationCalculator,
}

impl UnifiedStreamProcessor {
    /// Create a processor over a data source and summary backend.
    pub fn new(
        source: Arc<dyn StreamSource>,
        summary: SummaryProcessor,
        config: PaginationConfig,
    ) -> Self {
        Self {
            source,
            summary,
            calculator: PaginationCalculator::new(config),
        }
    }

    /// Process one paginated stream request.
    ///
    /// `current_context_tokens` is the caller's estimate of tokens already
    /// spent in the conversation; the remaining budget drives page sizing
    /// and the full-dataset guard.
    pub async fn process(
        &self,
        request: &PaginatedStreamRequest,
        current_context_tokens: usize,
    ) -> Result<StreamPage> {
        self.validate(request)?;

        let available = self.calculator.available_tokens(current_context_tokens);
        let wrap = |e: StreamError| {
            e.in_context(request.activity_id, request.mode.label(), 0, available)
        };

        if request.page_size < 0 {
            return self.process_full_dataset(request, available).await;
        }

        // ── page sizing ────────────────────────────────────────────────────
        let type_count = request.stream_types.len();
        let mut page_size = request.page_size as usize;
        let declared_estimate = self.calculator.estimate_tokens(page_size, type_count);
        if page_size == 0 || declared_estimate as f64 > available as f64 * 0.8 {
            let optimal = self.calculator.optimal_page_size(available);
            debug!(
                declared = page_size,
                optimal,
                available,
                "replacing declared page size with calculator optimum"
            );
            page_size = optimal;
        }

        // ── fetch & slice ──────────────────────────────────────────────────
        let payload = self
            .source
            .streams(request.activity_id, &request.stream_types, request.resolution)
            .await
            .map_err(wrap)?;

        let total = payload.len();
        if total == 0 {
            return Err(StreamError::ProcessingFailure {
                reason: "activity has no stream samples".into(),
            }
            .in_context(request.activity_id, request.mode.label(), 0, available));
        }

        let total_pages = self.calculator.total_pages(total, page_size);
        let (start, end) = self
            .calculator
            .page_bounds(request.page_number as usize, page_size, total)
            .map_err(|e| e.in_context(request.activity_id, request.mode.label(), total, available))?;
        let slice = payload.slice(start, end);

        let estimated_tokens = self.calculator.estimate_tokens(slice.len(), type_count);
        let has_next_page = (request.page_number as usize) < total_pages;

        // ── mode application ───────────────────────────────────────────────
        let (content, mode) = self.apply_with_fallback(request, &slice, available).await;

        Ok(StreamPage {
            activity_id: request.activity_id,
            page_number: request.page_number,
            total_pages: total_pages as i64,
            mode,
            content,
            time_range: slice.time_range(),
            has_next_page,
            estimated_tokens,
            instructions: navigation_instructions(
                request.page_number,
                total_pages as i64,
                has_next_page,
            ),
        })
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn validate(&self, request: &PaginatedStreamRequest) -> Result<()> {
        if request.activity_id <= 0 {
            return Err(StreamError::InvalidRequest {
                reason: format!("activity id must be positive, got {}", request.activity_id),
            });
        }
        if request.stream_types.is_empty() {
            return Err(StreamError::InvalidRequest {
                reason: "at least one stream type is required".into(),
            });
        }
        let max = self.calculator.config().max_page_size;
        if request.page_size > max as i64 {
            return Err(StreamError::InvalidRequest {
                reason: format!("page size {} exceeds maximum {max}", request.page_size),
            });
        }
        if request.page_size >= 0 && request.page_number < 1 {
            return Err(StreamError::InvalidRequest {
                reason: format!("page number must be >= 1, got {}", request.page_number),
            });
        }
        if request.mode == ProcessingMode::AiSummary
            && request
                .summary_prompt
                .as_deref()
                .is_none_or(|p| p.trim().is_empty())
        {
            return Err(StreamError::InvalidRequest {
                reason: "ai-summary mode requires a summary prompt".into(),
            });
        }
        Ok(())
    }

    /// Full-dataset path for negative page sizes.
    async fn process_full_dataset(
        &self,
        request: &PaginatedStreamRequest,
        available: usize,
    ) -> Result<StreamPage> {
        let payload = self
            .source
            .streams(request.activity_id, &request.stream_types, request.resolution)
            .await
            .map_err(|e| e.in_context(request.activity_id, request.mode.label(), 0, available))?;

        let total = payload.len();
        let estimated_tokens = self
            .calculator
            .estimate_tokens(total, request.stream_types.len());

        // Raw dumps of an oversized dataset cannot be salvaged by slicing;
        // tell the caller which modes would fit.
        if request.mode == ProcessingMode::Raw && estimated_tokens > available {
            return Err(StreamError::ContextExceeded {
                estimated_tokens,
                available_tokens: available,
                suggested_modes: vec!["derived".into(), "ai-summary".into()],
            }
            .in_context(request.activity_id, request.mode.label(), total, available));
        }

        let (content, mode) = self.apply_with_fallback(request, &payload, available).await;

        Ok(StreamPage {
            activity_id: request.activity_id,
            page_number: 1,
            total_pages: 1,
            mode,
            content,
            time_range: payload.time_range(),
            has_next_page: false,
            estimated_tokens,
            instructions: navigation_instructions(1, 1, false),
        })
    }

    /// Apply the requested mode, then its fallback chain, then the basic
    /// description.  Never fails: the final fallback always renders.
    async fn apply_with_fallback(
        &self,
        request: &PaginatedStreamRequest,
        slice: &StreamSet,
        available: usize,
    ) -> (String, String) {
        let original_error = match self.apply_mode(request.mode, request, slice).await {
            Ok(content) => return (content, request.mode.label().to_owned()),
            Err(e) => {
                warn!(
                    activity_id = request.activity_id,
                    mode = request.mode.label(),
                    error = %e,
                    "processing mode failed, trying fallbacks"
                );
                e
            }
        };

        for fallback in request.mode.fallbacks() {
            match self.apply_mode(*fallback, request, slice).await {
                Ok(content) => {
                    let notice = format!(
                        "⚠️ Fallback Mode Applied: {} processing failed, showing {} output \
                         instead.\n\n",
                        request.mode.label(),
                        fallback.label(),
                    );
                    return (format!("{notice}{content}"), FALLBACK_MODE.to_owned());
                }
                Err(e) => {
                    warn!(
                        activity_id = request.activity_id,
                        mode = fallback.label(),
                        error = %e,
                        "fallback mode failed"
                    );
                }
            }
        }

        // Every mode failed: describe the payload and surface the original
        // error so the model can decide what to ask for next.
        let wrapped = original_error.in_context(
            request.activity_id,
            request.mode.label(),
            slice.len(),
            available,
        );
        let basic = format!(
            "Stream data for activity {} is available ({} samples, types: {}), but none of the \
             processing modes could render it.\nError: {wrapped}",
            request.activity_id,
            slice.len(),
            slice
                .present_types()
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", "),
        );
        (basic, FALLBACK_MODE.to_owned())
    }

    /// Apply one concrete mode to a slice.
    async fn apply_mode(
        &self,
        mode: ProcessingMode,
        request: &PaginatedStreamRequest,
        slice: &StreamSet,
    ) -> Result<String> {
        match mode {
            ProcessingMode::Raw => Ok(render_stream_data(slice)),
            ProcessingMode::Derived => {
                let laps = match self.source.laps(request.activity_id).await {
                    Ok(laps) => laps,
                    Err(e) => {
                        debug!(activity_id = request.activity_id, error = %e, "lap fetch failed");
                        Vec::new()
                    }
                };
                let features = extract_features(slice, (!laps.is_empty()).then_some(&laps[..]));
                if features.metrics.is_empty() {
                    return Err(StreamError::ProcessingFailure {
                        reason: "no numeric streams available for feature extraction".into(),
                    });
                }
                Ok(render_derived_features(&features))
            }
            ProcessingMode::AiSummary => {
                let prompt = request.summary_prompt.as_deref().unwrap_or_default();
                let outcome = self
                    .summary
                    .summarize(slice, request.activity_id, prompt)
                    .await?;
                Ok(format!(
                    "🤖 AI Summary ({}, {} tokens)\n\n{}",
                    outcome.model, outcome.tokens_used, outcome.text
                ))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
