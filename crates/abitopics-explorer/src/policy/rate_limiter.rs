//! Minimum-interval rate limiter.
//!
//! Block explorers allow a handful of requests per second per key. Each
//! limiter hands out send slots at least `interval` apart; callers that arrive
//! early sleep until their slot. Waiters are served one at a time, so the
//! bound holds with any number of concurrent callers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

/// Default spacing between two requests to one explorer (5 req/s).
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(200);

/// Spaces consecutive acquisitions at least `interval` apart.
pub struct MinIntervalLimiter {
    interval: Duration,
    next_slot: tokio::sync::Mutex<Option<Instant>>,
}

impl MinIntervalLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: tokio::sync::Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for the next free slot. Returns how long the caller slept.
    pub async fn acquire(&self) -> Duration {
        let mut next_slot = self.next_slot.lock().await;
        let now = Instant::now();
        let waited = match *next_slot {
            Some(at) if at > now => {
                tokio::time::sleep_until(at).await;
                at - now
            }
            _ => Duration::ZERO,
        };
        *next_slot = Some(Instant::now() + self.interval);
        waited
    }
}

/// One limiter per explorer base URL, shared by every client holding the registry.
pub struct LimiterRegistry {
    interval: Duration,
    limiters: Mutex<HashMap<String, Arc<MinIntervalLimiter>>>,
}

impl LimiterRegistry {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// The limiter for `base_url`, created on first use.
    pub fn for_base_url(&self, base_url: &str) -> Arc<MinIntervalLimiter> {
        let key = base_url.trim_end_matches('/').to_ascii_lowercase();
        self.limiters
            .lock()
            .unwrap()
            .entry(key)
            .or_insert_with(|| Arc::new(MinIntervalLimiter::new(self.interval)))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.limiters.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LimiterRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}
