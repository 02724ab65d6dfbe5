// fathom-server/src/rate_limit.rs
// ============================================================================
// Module: Fathom Server Rate Limiter
// Description: Fixed-window per-IP request limiter.
// Purpose: `spec.md` §6.1 "optional per-IP rate limiting... with
//          `Retry-After` on 429".
// Dependencies: std::sync, std::time
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// How long an idle bucket is kept before eviction.
const BUCKET_TTL_FACTOR: u32 = 4;
/// Hard cap on tracked keys, to bound memory under a key-flooding client.
const MAX_TRACKED_KEYS: usize = 50_000;

/// Decision returned by [`RateLimiter::check`].
pub enum RateLimitDecision {
    /// The request may proceed.
    Allow,
    /// The request is over budget; retry after the given delay.
    Limited {
        /// Milliseconds the caller should wait before retrying.
        retry_after_ms: u64,
    },
}

/// Rolling state for one rate-limited key (typically a peer IP).
struct Bucket {
    /// Start of the current fixed window.
    window_start: Instant,
    /// Requests observed in the current window.
    count: u32,
    /// Last time this bucket was touched, for eviction.
    last_seen: Instant,
}

/// Fixed-window limiter, keyed by an arbitrary string (peer IP in
/// practice).
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    /// Builds a limiter allowing `max_requests` per `window`.
    #[must_use]
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Checks and updates the bucket for `key`.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let ttl = self.window.saturating_mul(BUCKET_TTL_FACTOR);
        let now = Instant::now();
        let mut buckets = self
            .buckets
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if buckets.len() > MAX_TRACKED_KEYS {
            buckets.retain(|_, bucket| now.duration_since(bucket.last_seen) <= ttl);
        }

        let bucket = buckets.entry(key.to_owned()).or_insert(Bucket {
            window_start: now,
            count: 0,
            last_seen: now,
        });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }
        bucket.last_seen = now;

        if bucket.count >= self.max_requests {
            let elapsed = now.duration_since(bucket.window_start);
            let retry_after_ms =
                u64::try_from(self.window.saturating_sub(elapsed).as_millis()).unwrap_or(u64::MAX);
            RateLimitDecision::Limited { retry_after_ms }
        } else {
            bucket.count = bucket.count.saturating_add(1);
            RateLimitDecision::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::RateLimitDecision;
    use super::RateLimiter;

    #[test]
    fn allows_up_to_the_configured_budget() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(matches!(limiter.check("a"), RateLimitDecision::Allow));
        assert!(matches!(limiter.check("a"), RateLimitDecision::Allow));
        assert!(matches!(
            limiter.check("a"),
            RateLimitDecision::Limited { .. }
        ));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(matches!(limiter.check("a"), RateLimitDecision::Allow));
        assert!(matches!(limiter.check("b"), RateLimitDecision::Allow));
    }
}
