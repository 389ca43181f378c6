//! Shared domain model for the Cadence coaching orchestrator.
//!
//! This crate holds what every other Cadence crate agrees on:
//!
//! - [`types`] -- athletes, activities, credentials, and stream payloads.
//! - [`config`] -- runtime configuration with file + environment loading.
//! - [`collab`] -- contracts for the embedding application's persistence.
//! - [`error`] -- configuration and collaborator error types.
//!
//! It deliberately contains no I/O beyond config loading; transport and
//! orchestration live in the downstream crates.

pub mod collab;
pub mod config;
pub mod error;
pub mod types;

// Re-export the most commonly used types at the crate root.
pub use collab::{LogbookService, UserRepository};
pub use config::CoachConfig;
pub use error::{ConfigError, RepoError};
pub use types::{
    ActivityDetail, ActivitySummary, AthleteProfile, Lap, Resolution, SharedUser, StravaCredentials,
    StreamSet, StreamType, TrainingZones, User, ZoneRange, ZoneSet, shared_user,
};
