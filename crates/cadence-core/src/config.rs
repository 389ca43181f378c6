//! Runtime configuration for the coaching orchestrator.
//!
//! Configuration is loaded from an optional TOML file and overlaid with
//! `CADENCE_*` environment variables, so deployments can ship a base file and
//! tweak individual knobs per environment.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

// ---------------------------------------------------------------------------
// Config struct
// ---------------------------------------------------------------------------

/// All recognized configuration keys with their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Context-token ceiling used by the pagination calculator.
    pub max_context_tokens: usize,
    /// Converts character counts into token estimates.
    pub token_per_char_ratio: f64,
    /// Page size used when the caller does not specify one.
    pub default_page_size: usize,
    /// Upper bound on any requested page size.
    pub max_page_size: usize,
    /// Master switch for tool-output redaction.
    pub redaction_enabled: bool,
    /// Stream resolutions accepted from the provider.
    pub resolutions: Vec<String>,
    /// Maximum tool-calling rounds per request.
    pub max_rounds: u32,

    /// API key for the chat-completion provider.
    pub openai_api_key: String,
    /// Model used for the coaching conversation.
    pub openai_model: String,
    /// Model used by the stream summary processor.
    pub summary_model: String,

    /// OAuth client id for the activity provider.
    pub strava_client_id: String,
    /// OAuth client secret for the activity provider.
    pub strava_client_secret: String,

    /// Sliding-window rate limit: maximum requests per window.
    pub rate_limit_max_requests: usize,
    /// Sliding-window rate limit: window length in seconds.
    pub rate_limit_window_secs: u64,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 15_000,
            token_per_char_ratio: 0.25,
            default_page_size: 1_000,
            max_page_size: 5_000,
            redaction_enabled: true,
            resolutions: vec!["low".into(), "medium".into(), "high".into()],
            max_rounds: 10,
            openai_api_key: String::new(),
            openai_model: "gpt-4o".into(),
            summary_model: "gpt-4o-mini".into(),
            strava_client_id: String::new(),
            strava_client_secret: String::new(),
            rate_limit_max_requests: 100,
            rate_limit_window_secs: 900,
        }
    }
}

impl CoachConfig {
    /// Load configuration: file (if present) overlaid by environment.
    ///
    /// A `.env` file in the working directory is honored first, so local
    /// runs pick up API keys without exporting them.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            _ => Self::default(),
        };
        config.overlay_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "configuration file loaded");
        Ok(config)
    }

    /// Overlay `CADENCE_*` environment variables onto the current values.
    pub fn overlay_env(&mut self) {
        fn env(key: &str) -> Option<String> {
            std::env::var(key).ok().filter(|v| !v.is_empty())
        }

        if let Some(v) = env("CADENCE_MAX_CONTEXT_TOKENS").and_then(|v| v.parse().ok()) {
            self.max_context_tokens = v;
        }
        if let Some(v) = env("CADENCE_TOKEN_PER_CHAR_RATIO").and_then(|v| v.parse().ok()) {
            self.token_per_char_ratio = v;
        }
        if let Some(v) = env("CADENCE_DEFAULT_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.default_page_size = v;
        }
        if let Some(v) = env("CADENCE_MAX_PAGE_SIZE").and_then(|v| v.parse().ok()) {
            self.max_page_size = v;
        }
        if let Some(v) = env("CADENCE_REDACTION_ENABLED").and_then(|v| v.parse().ok()) {
            self.redaction_enabled = v;
        }
        if let Some(v) = env("CADENCE_MAX_ROUNDS").and_then(|v| v.parse().ok()) {
            self.max_rounds = v;
        }
        if let Some(v) = env("OPENAI_API_KEY") {
            self.openai_api_key = v;
        }
        if let Some(v) = env("CADENCE_OPENAI_MODEL") {
            self.openai_model = v;
        }
        if let Some(v) = env("CADENCE_SUMMARY_MODEL") {
            self.summary_model = v;
        }
        if let Some(v) = env("STRAVA_CLIENT_ID") {
            self.strava_client_id = v;
        }
        if let Some(v) = env("STRAVA_CLIENT_SECRET") {
            self.strava_client_secret = v;
        }
        if let Some(v) = env("CADENCE_RATE_LIMIT_MAX_REQUESTS").and_then(|v| v.parse().ok()) {
            self.rate_limit_max_requests = v;
        }
        if let Some(v) = env("CADENCE_RATE_LIMIT_WINDOW_SECS").and_then(|v| v.parse().ok()) {
            self.rate_limit_window_secs = v;
        }
    }

    /// Reject configurations that cannot produce a working pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.max_context_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "max_context_tokens".into(),
                reason: "must be positive".into(),
            });
        }
        if self.token_per_char_ratio <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "token_per_char_ratio".into(),
                reason: "must be positive".into(),
            });
        }
        if self.max_page_size == 0 || self.default_page_size == 0 {
            return Err(ConfigError::Invalid {
                key: "page_size".into(),
                reason: "page sizes must be positive".into(),
            });
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid {
                key: "default_page_size".into(),
                reason: format!(
                    "default ({}) exceeds max ({})",
                    self.default_page_size, self.max_page_size
                ),
            });
        }
        if self.max_rounds == 0 {
            return Err(ConfigError::Invalid {
                key: "max_rounds".into(),
                reason: "must allow at least one round".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = CoachConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_context_tokens, 15_000);
        assert_eq!(config.default_page_size, 1_000);
        assert_eq!(config.max_page_size, 5_000);
        assert_eq!(config.max_rounds, 10);
        assert!(config.redaction_enabled);
    }

    #[test]
    fn zero_context_tokens_rejected() {
        let config = CoachConfig {
            max_context_tokens: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_page_size_above_max_rejected() {
        let config = CoachConfig {
            default_page_size: 9_000,
            max_page_size: 5_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip() {
        let config = CoachConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: CoachConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.max_context_tokens, config.max_context_tokens);
        assert_eq!(parsed.resolutions, config.resolutions);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let parsed: CoachConfig = toml::from_str("max_context_tokens = 8000").unwrap();
        assert_eq!(parsed.max_context_tokens, 8_000);
        assert_eq!(parsed.default_page_size, 1_000);
    }
}
