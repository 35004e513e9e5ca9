//! Sliding-window rate limiting as an injected capability.
//!
//! Two backends: [`InMemoryRateLimiter`] for a long-lived process and
//! [`SqliteRateLimiter`] for short-lived ones such as the CLI, where each
//! invocation starts with empty memory.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::storage::{Database, RateLimitConfig};

/// Outcome of one check-and-increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateDecision {
    pub allowed: bool,
    /// Hits left in the current window after this one
    pub remaining: u32,
    /// Time until the oldest hit leaves the window, when denied
    pub retry_after: Option<Duration>,
}

impl RateDecision {
    /// Decide from the hits already inside the window (oldest first).
    pub(crate) fn from_window(
        hits_in_window: usize,
        oldest: Option<DateTime<Utc>>,
        max_requests: u32,
        window: chrono::Duration,
        now: DateTime<Utc>,
    ) -> Self {
        let used = hits_in_window as u32;
        if used < max_requests {
            Self {
                allowed: true,
                remaining: max_requests - used - 1,
                retry_after: None,
            }
        } else {
            let retry_after = oldest
                .map(|t| (t + window - now).to_std().unwrap_or(Duration::ZERO))
                .unwrap_or(Duration::ZERO);
            Self {
                allowed: false,
                remaining: 0,
                retry_after: Some(retry_after),
            }
        }
    }
}

/// Windows too large for chrono are capped at a century.
pub(crate) fn window_delta(window: Duration) -> chrono::Duration {
    chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100))
}

/// Check-and-increment under a sliding window. A denied check records no hit.
pub trait RateLimiter {
    fn check_and_increment(&self, key: &str) -> Result<RateDecision>;
}

/// Process-local limiter guarding a map of hit queues with a mutex.
pub struct InMemoryRateLimiter {
    max_requests: u32,
    window: chrono::Duration,
    hits: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl InMemoryRateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window: window_delta(window),
            hits: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Self {
        Self::new(cfg.max_requests, Duration::from_secs(cfg.window_secs))
    }

    pub fn check_and_increment_at(&self, key: &str, now: DateTime<Utc>) -> Result<RateDecision> {
        let mut hits = self
            .hits
            .lock()
            .map_err(|_| CoreError::Custom("rate limiter lock poisoned".into()))?;
        let cutoff = now - self.window;
        // Keys whose newest hit has expired hold nothing worth keeping.
        hits.retain(|_, queue| queue.back().is_some_and(|t| *t > cutoff));

        let queue = hits.entry(key.to_string()).or_default();
        while queue.front().is_some_and(|t| *t <= cutoff) {
            queue.pop_front();
        }

        let decision = RateDecision::from_window(
            queue.len(),
            queue.front().copied(),
            self.max_requests,
            self.window,
            now,
        );
        if decision.allowed {
            queue.push_back(now);
        } else if queue.is_empty() {
            hits.remove(key);
        }
        Ok(decision)
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.hits.lock().map(|hits| hits.len()).unwrap_or(0)
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check_and_increment(&self, key: &str) -> Result<RateDecision> {
        self.check_and_increment_at(key, Utc::now())
    }
}

/// Limiter persisted in the `rate_limit_hits` table.
pub struct SqliteRateLimiter {
    db: Database,
    max_requests: u32,
    window: chrono::Duration,
}

impl SqliteRateLimiter {
    pub fn new(db: Database, max_requests: u32, window: Duration) -> Self {
        Self {
            db,
            max_requests,
            window: window_delta(window),
        }
    }

    /// Open a dedicated connection to the database at `path`.
    pub fn open(path: &Path, cfg: &RateLimitConfig) -> Result<Self> {
        Ok(Self::new(
            Database::open_at(path)?,
            cfg.max_requests,
            Duration::from_secs(cfg.window_secs),
        ))
    }

    pub fn check_and_increment_at(&self, key: &str, now: DateTime<Utc>) -> Result<RateDecision> {
        self.db
            .rate_limit_hit(key, self.max_requests, self.window, now)
    }
}

impl RateLimiter for SqliteRateLimiter {
    fn check_and_increment(&self, key: &str) -> Result<RateDecision> {
        self.check_and_increment_at(key, Utc::now())
    }
}
