//! Process-wide sliding-window rate limiter.
//!
//! The provider enforces a per-application request budget; this limiter
//! refuses calls locally before any HTTP is issued, so a misbehaving
//! conversation cannot burn the budget for every other in-flight request.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Result, StravaError};

/// Sliding-window counter: at most `max` acquisitions per `window`.
///
/// State is a queue of acquisition timestamps behind a mutex; every
/// acquisition prunes entries older than the window before counting.
#[derive(Debug)]
pub struct RateLimiter {
    max: usize,
    window: Duration,
    hits: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `max` requests per `window`.
    pub fn new(max: usize, window: Duration) -> Self {
        Self {
            max,
            window,
            hits: Mutex::new(VecDeque::new()),
        }
    }

    /// Try to acquire one slot, failing with
    /// [`StravaError::RateLimitExceeded`] when the window is full.
    pub fn acquire(&self) -> Result<()> {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());

        while let Some(front) = hits.front() {
            if now.duration_since(*front) >= self.window {
                hits.pop_front();
            } else {
                break;
            }
        }

        if hits.len() >= self.max {
            tracing::warn!(
                in_window = hits.len(),
                max = self.max,
                "provider rate limit window exhausted"
            );
            return Err(StravaError::RateLimitExceeded {
                max: self.max,
                window_secs: self.window.as_secs(),
            });
        }

        hits.push_back(now);
        Ok(())
    }

    /// Number of acquisitions currently inside the window.
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        let hits = self.hits.lock().unwrap_or_else(|e| e.into_inner());
        hits.iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
