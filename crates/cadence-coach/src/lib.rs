//! The coaching loop for Cadence.
//!
//! This crate ties the system together: the iterative tool-calling loop that
//! streams model output to the caller, the context manager that redacts
//! bulky tool history, the progress messaging between rounds, and the tool
//! registry with its executor.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────┐    ┌───────────────┐    ┌──────────────────┐
//! │ Iterative      │───>│ Tool Executor │───>│ Strava client /  │
//! │ Processor      │    │ (5 tools)     │    │ Stream processor │
//! └───────┬────────┘    └───────────────┘    └──────────────────┘
//!         │
//!  ┌──────┴────────┐    ┌───────────────┐
//!  │ Context       │    │ Chat provider │
//!  │ Manager       │    │ (streaming)   │
//!  └───────────────┘    └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`processor`] -- the round loop and chunk streaming.
//! - [`redaction`] -- the context manager.
//! - [`tools`] -- registry, executor, and the stream-source adapter.
//! - [`progress`] -- inter-round progress phrases.
//! - [`context`] -- per-request inputs.
//! - [`error`] -- the coach error taxonomy.

pub mod context;
pub mod error;
pub mod processor;
pub mod progress;
pub mod redaction;
pub mod tools;

// Re-export the most commonly used types at the crate root.
pub use context::MessageContext;
pub use error::{CoachError, Result};
pub use processor::{IterativeProcessor, ProcessorConfig};
pub use progress::progress_phrase;
pub use redaction::{ContextManager, has_subsequent_non_tool_call_messages};
pub use tools::{StravaStreamSource, ToolExecutor, tool_definitions};
