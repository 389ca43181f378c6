//! Authenticated REST client for the activity provider.
//!
//! Every call flows through the same path: acquire a rate-limiter slot,
//! issue the request with the user's current access token, map the status
//! code, and on an auth failure refresh the OAuth credentials once and
//! retry the original call.  Refreshes are serialized per user so concurrent
//! requests for the same athlete do not race the token exchange.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use cadence_core::{
    ActivityDetail, ActivitySummary, AthleteProfile, Resolution, SharedUser, StreamSet, StreamType,
    TrainingZones, UserRepository,
};

use crate::error::{Result, StravaError};
use crate::rate_limit::RateLimiter;
use crate::types::{ApiErrorBody, RawStreamMap, TokenResponse, decode_streams};

/// Default API base URL.
const STRAVA_BASE_URL: &str = "https://www.strava.com/api/v3";

/// Default OAuth token-exchange URL.
const STRAVA_TOKEN_URL: &str = "https://www.strava.com/oauth/token";

/// Default HTTP timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the provider client.
#[derive(Debug, Clone)]
pub struct StravaConfig {
    /// REST API base URL.
    pub base_url: String,
    /// OAuth token endpoint.
    pub token_url: String,
    /// OAuth application client id.
    pub client_id: String,
    /// OAuth application client secret.
    pub client_secret: String,
    /// Sliding-window budget: maximum requests per window.
    pub rate_limit_max: usize,
    /// Sliding-window length.
    pub rate_limit_window: Duration,
}

impl StravaConfig {
    /// Create a configuration for the hosted provider API.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            base_url: STRAVA_BASE_URL.to_owned(),
            token_url: STRAVA_TOKEN_URL.to_owned(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(900),
        }
    }

    /// Override the API base URL (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the OAuth token endpoint (tests, proxies).
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }
}

impl From<&cadence_core::CoachConfig> for StravaConfig {
    fn from(config: &cadence_core::CoachConfig) -> Self {
        Self {
            rate_limit_max: config.rate_limit_max_requests,
            rate_limit_window: Duration::from_secs(config.rate_limit_window_secs),
            ..Self::new(&config.strava_client_id, &config.strava_client_secret)
        }
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Filters for the activity listing endpoint.
#[derive(Debug, Clone, Default)]
pub struct ActivityQuery {
    /// Unix timestamp upper bound (exclusive).
    pub before: Option<i64>,
    /// Unix timestamp lower bound (exclusive).
    pub after: Option<i64>,
    /// 1-based page number.
    pub page: Option<usize>,
    /// Page size (provider caps at 200).
    pub per_page: Option<usize>,
}

impl ActivityQuery {
    fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(v) = self.before {
            pairs.push(("before", v.to_string()));
        }
        if let Some(v) = self.after {
            pairs.push(("after", v.to_string()));
        }
        if let Some(v) = self.page {
            pairs.push(("page", v.to_string()));
        }
        if let Some(v) = self.per_page {
            pairs.push(("per_page", v.to_string()));
        }
        pairs
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Process-wide provider client.
///
/// Cheap to clone via `Arc`; the rate limiter and refresh locks are shared
/// by every in-flight request.
pub struct StravaClient {
    config: Arc<StravaConfig>,
    http: reqwest::Client,
    limiter: RateLimiter,
    /// Per-user refresh serialization: one mutex per user id.
    refresh_locks: DashMap<String, Arc<Mutex<()>>>,
    users: Arc<dyn UserRepository>,
}

impl StravaClient {
    /// Create a new client.
    pub fn new(config: StravaConfig, users: Arc<dyn UserRepository>) -> Result<Self> {
        for (label, value) in [("base_url", &config.base_url), ("token_url", &config.token_url)] {
            url::Url::parse(value).map_err(|e| StravaError::RequestFailed {
                reason: format!("invalid {label} `{value}`: {e}"),
            })?;
        }

        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| StravaError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);

        Ok(Self {
            config: Arc::new(config),
            http,
            limiter,
            refresh_locks: DashMap::new(),
            users,
        })
    }

    // -----------------------------------------------------------------------
    // Endpoints
    // -----------------------------------------------------------------------

    /// Fetch the athlete profile (`/athlete`).
    pub async fn get_athlete(&self, user: &SharedUser) -> Result<AthleteProfile> {
        self.get_json(user, "/athlete", &[]).await
    }

    /// Fetch the athlete's training zones (`/athlete/zones`).
    pub async fn get_athlete_zones(&self, user: &SharedUser) -> Result<TrainingZones> {
        self.get_json(user, "/athlete/zones", &[]).await
    }

    /// List activities (`/athlete/activities`).
    pub async fn get_activities(
        &self,
        user: &SharedUser,
        query: &ActivityQuery,
    ) -> Result<Vec<ActivitySummary>> {
        self.get_json(user, "/athlete/activities", &query.to_pairs()).await
    }

    /// Fetch full activity detail including laps (`/activities/{id}`).
    pub async fn get_activity(&self, user: &SharedUser, activity_id: i64) -> Result<ActivityDetail> {
        self.get_json(user, &format!("/activities/{activity_id}"), &[]).await
    }

    /// Fetch activity streams keyed by type (`/activities/{id}/streams`).
    pub async fn get_activity_streams(
        &self,
        user: &SharedUser,
        activity_id: i64,
        types: &[StreamType],
        resolution: Resolution,
    ) -> Result<StreamSet> {
        let keys: Vec<&str> = types.iter().map(|t| t.key()).collect();
        let query = [
            ("keys", keys.join(",")),
            ("resolution", resolution.to_string()),
            ("key_by_type", "true".to_owned()),
        ];

        let raw: RawStreamMap = self
            .get_json(user, &format!("/activities/{activity_id}/streams"), &query)
            .await?;
        decode_streams(raw)
    }

    // -----------------------------------------------------------------------
    // Internal: request path with refresh-and-retry
    // -----------------------------------------------------------------------

    /// GET a JSON endpoint with the user's credentials; on an auth error,
    /// refresh the tokens once and retry the original request.
    async fn get_json<T: DeserializeOwned>(
        &self,
        user: &SharedUser,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let stale_token = {
            let guard = user.read().await;
            guard.credentials.access_token.clone()
        };

        match self.attempt(user, path, query).await {
            Err(e) if e.is_auth_error() => {
                debug!(path, error = %e, "auth error, refreshing credentials");
                self.refresh_credentials(user, &stale_token).await?;
                self.attempt(user, path, query).await
            }
            other => other,
        }
    }

    /// Issue one rate-limited GET and map the response status.
    async fn attempt<T: DeserializeOwned>(
        &self,
        user: &SharedUser,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.limiter.acquire()?;

        let token = {
            let guard = user.read().await;
            guard.credentials.access_token.clone()
        };
        let url = format!("{}{}", self.config.base_url, path);

        debug!(path, "provider request");

        let resp = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;

        match status {
            200 => serde_json::from_str(&body).map_err(|e| StravaError::Decode {
                reason: format!("{path}: {e}"),
            }),
            401 => Err(StravaError::TokenExpired),
            403 => Err(StravaError::InvalidToken),
            404 => Err(StravaError::NotFound {
                endpoint: path.to_owned(),
            }),
            429 => Err(StravaError::Throttled),
            s if s >= 500 => Err(StravaError::ServiceUnavailable { status: s }),
            s => {
                let message = serde_json::from_str::<ApiErrorBody>(&body)
                    .map(|e| e.message)
                    .ok()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(body);
                Err(StravaError::Api { status: s, message })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal: token refresh
    // -----------------------------------------------------------------------

    /// Exchange the refresh token and persist the new credentials.
    ///
    /// Serialized per user: if another request already refreshed while this
    /// one waited on the lock (the access token no longer matches
    /// `stale_token`), the exchange is skipped.
    async fn refresh_credentials(&self, user: &SharedUser, stale_token: &str) -> Result<()> {
        let user_id = {
            let guard = user.read().await;
            guard.id.clone()
        };

        let lock = self
            .refresh_locks
            .entry(user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        {
            let guard = user.read().await;
            if guard.credentials.access_token != stale_token {
                debug!(user_id = %user_id, "credentials already refreshed by a concurrent request");
                return Ok(());
            }
        }

        let refresh_token = {
            let guard = user.read().await;
            guard.credentials.refresh_token.clone()
        };

        info!(user_id = %user_id, "refreshing provider access token");

        let form = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
        ];

        let resp = self.http.post(&self.config.token_url).form(&form).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            warn!(user_id = %user_id, status = %status, "token refresh rejected");
            return Err(StravaError::RefreshFailed {
                reason: format!("token endpoint returned {status}: {body}"),
            });
        }

        let tokens: TokenResponse =
            serde_json::from_str(&body).map_err(|e| StravaError::RefreshFailed {
                reason: format!("invalid token response: {e}"),
            })?;

        let snapshot = {
            let mut guard = user.write().await;
            guard.credentials.access_token = tokens.access_token;
            guard.credentials.refresh_token = tokens.refresh_token;
            guard.credentials.expires_at = Utc
                .timestamp_opt(tokens.expires_at, 0)
                .single()
                .unwrap_or_else(Utc::now);
            guard.clone()
        };

        self.users.update(&snapshot).await?;
        info!(user_id = %user_id, "provider credentials refreshed and persisted");

        Ok(())
    }

    /// Number of provider requests in the current rate-limit window.
    pub fn requests_in_window(&self) -> usize {
        self.limiter.in_window()
    }
}
