//! Per-client rate limiting middleware.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::RateLimitConfig;
use crate::http::request::ClientAddr;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_per_sec: f64, now: Instant) -> bool {
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Buckets keyed by client IP.
pub struct RateLimiterState {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    refill_per_sec: f64,
    burst: f64,
}

impl RateLimiterState {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            refill_per_sec: f64::from(config.requests_per_minute) / 60.0,
            burst: f64::from(config.burst.max(1)),
        }
    }

    /// Take one token for `key`. False when the bucket is empty.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst, now));

        bucket.try_acquire(self.burst, self.refill_per_sec, now)
    }

    /// Forget clients idle for longer than `idle`.
    pub fn prune(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().expect("rate limiter mutex poisoned");
        let before = buckets.len();
        buckets.retain(|_, bucket| now.duration_since(bucket.last_update) < idle);
        before - buckets.len()
    }
}

/// Reject with 429 once a client's bucket is exhausted.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    ClientAddr(addr): ClientAddr,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = addr
        .map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if state.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited("requests_per_minute");
        (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(requests_per_minute: u32, burst: u32) -> RateLimiterState {
        RateLimiterState::new(&RateLimitConfig {
            enabled: true,
            requests_per_minute,
            burst,
        })
    }

    #[test]
    fn burst_then_reject() {
        let state = limiter(60, 3);
        let now = Instant::now();
        assert!(state.check_at("10.0.0.1", now));
        assert!(state.check_at("10.0.0.1", now));
        assert!(state.check_at("10.0.0.1", now));
        assert!(!state.check_at("10.0.0.1", now));

        // Separate clients have separate buckets.
        assert!(state.check_at("10.0.0.2", now));
    }

    #[test]
    fn refills_over_time() {
        let state = limiter(60, 1);
        let now = Instant::now();
        assert!(state.check_at("c", now));
        assert!(!state.check_at("c", now + Duration::from_millis(500)));
        assert!(state.check_at("c", now + Duration::from_millis(1600)));
    }

    #[test]
    fn prune_drops_idle_clients() {
        let state = limiter(60, 1);
        state.check("c");
        assert_eq!(state.prune(Duration::ZERO), 1);
    }
}
