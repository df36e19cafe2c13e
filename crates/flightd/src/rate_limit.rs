//! Per-client request throttling
//!
//! Token bucket per client identifier, refilled continuously. The client is
//! the first `X-Forwarded-For` entry when present, otherwise the peer IP.

use crate::error::ApiError;
use crate::server::AppStateArc;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::warn;

/// Token bucket rate limiter keyed by client
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    tokens_per_period: u32,
    period: Duration,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    max_tokens: u32,
    /// Tokens per second
    refill_rate: f64,
}

impl TokenBucket {
    fn new(max_tokens: u32, period: Duration, now: Instant) -> Self {
        Self {
            tokens: max_tokens as f64,
            last_refill: now,
            max_tokens,
            refill_rate: max_tokens as f64 / period.as_secs_f64(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 || self.refill_rate <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
        }
    }
}

/// Result of a rate limit check
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitResult {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitResult::Limited { .. })
    }
}

impl RateLimiter {
    pub fn new(tokens_per_period: u32, period: Duration) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            tokens_per_period: tokens_per_period.max(1),
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub fn try_acquire(&self, client_id: &str) -> RateLimitResult {
        self.try_acquire_at(client_id, Instant::now())
    }

    /// Same as [`try_acquire`](Self::try_acquire) with an explicit clock
    pub fn try_acquire_at(&self, client_id: &str, now: Instant) -> RateLimitResult {
        let mut buckets = self.lock();
        let bucket = buckets
            .entry(client_id.to_string())
            .or_insert_with(|| TokenBucket::new(self.tokens_per_period, self.period, now));

        if bucket.try_consume(now) {
            RateLimitResult::Allowed {
                remaining: bucket.tokens as u32,
            }
        } else {
            RateLimitResult::Limited {
                retry_after: bucket.time_until_available(),
            }
        }
    }

    /// Drop buckets idle for longer than `max_age`
    pub fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        self.lock()
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < max_age);
    }

    /// Time for an empty bucket to refill completely
    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn bucket_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        // A panic mid-update leaves at worst one stale bucket
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Client identifier for throttling
pub fn client_id(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

/// Middleware applied to every `/api` route
pub async fn throttle(State(state): State<AppStateArc>, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_id(request.headers(), peer);

    match state.rate_limiter.try_acquire(&client) {
        RateLimitResult::Allowed { .. } => next.run(request).await,
        RateLimitResult::Limited { retry_after } => {
            warn!("Rate limit exceeded for client {}", client);
            ApiError::RateLimited { retry_after }
                .at(request.uri().path())
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_allow_within_limit() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(limiter.try_acquire("client1").is_allowed());
        }
        assert_eq!(limiter.bucket_count(), 1);
    }

    #[test]
    fn test_limit_exceeded() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.try_acquire_at("client1", now).is_allowed());
        assert!(limiter.try_acquire_at("client1", now).is_allowed());

        match limiter.try_acquire_at("client1", now) {
            RateLimitResult::Limited { retry_after } => {
                // 2 tokens per minute: one token every 30s
                assert!(retry_after > Duration::from_secs(29));
                assert!(retry_after <= Duration::from_secs(30));
            }
            other => panic!("expected limit, got {:?}", other),
        }
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(limiter.try_acquire_at("a", now).is_allowed());
        assert!(limiter.try_acquire_at("a", now).is_limited());
        assert!(limiter.try_acquire_at("b", now).is_allowed());
    }

    #[test]
    fn test_tokens_refill_over_time() {
        let limiter = RateLimiter::new(60, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..60 {
            assert!(limiter.try_acquire_at("c", start).is_allowed());
        }
        assert!(limiter.try_acquire_at("c", start).is_limited());
        assert!(limiter
            .try_acquire_at("c", start + Duration::from_millis(1100))
            .is_allowed());
    }

    #[test]
    fn test_client_id_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();
        assert_eq!(client_id(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_id(&headers, None), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        assert_eq!(client_id(&headers, Some(peer)), "203.0.113.7");
    }
}
