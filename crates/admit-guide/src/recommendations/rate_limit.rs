use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;

use crate::config::RateLimitConfig;

const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Outcome of a single rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

struct Window {
    started: Instant,
    count: u64,
}

/// Fixed-window request counter keyed by client identifier.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn check(&self, identifier: &str, now: Instant) -> RateLimitDecision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let window_len = self.config.window;
        if windows.len() >= MAX_TRACKED_CLIENTS {
            windows.retain(|_, window| now.saturating_duration_since(window.started) < window_len);
        }

        let window = windows
            .entry(identifier.to_string())
            .or_insert(Window {
                started: now,
                count: 0,
            });
        if now.saturating_duration_since(window.started) >= window_len {
            window.started = now;
            window.count = 0;
        }

        let reset_after = window_len.saturating_sub(now.saturating_duration_since(window.started));
        let limit = self.config.max_requests;
        if window.count >= limit {
            return RateLimitDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_after,
            };
        }

        window.count += 1;
        RateLimitDecision {
            allowed: true,
            limit,
            remaining: limit - window.count,
            reset_after,
        }
    }
}

/// Client identifier from proxy headers: first `x-forwarded-for` hop, then
/// `x-real-ip`, else `"unknown"`.
pub fn client_identifier(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn limiter(max_requests: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            max_requests,
            window: Duration::from_secs(60),
        })
    }

    #[test]
    fn blocks_after_budget_is_spent() {
        let limiter = limiter(3);
        let now = Instant::now();

        let remaining: Vec<u64> = (0..3)
            .map(|_| limiter.check("10.0.0.1", now).remaining)
            .collect();
        assert_eq!(remaining, vec![2, 1, 0]);

        let blocked = limiter.check("10.0.0.1", now + Duration::from_secs(15));
        assert!(!blocked.allowed);
        assert_eq!(blocked.reset_after, Duration::from_secs(45));
    }

    #[test]
    fn window_resets_after_it_elapses() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(limiter.check("client", now).allowed);
        assert!(!limiter.check("client", now + Duration::from_secs(59)).allowed);
        assert!(limiter.check("client", now + Duration::from_secs(60)).allowed);
    }

    #[test]
    fn clients_are_counted_separately() {
        let limiter = limiter(1);
        let now = Instant::now();

        assert!(limiter.check("a", now).allowed);
        assert!(limiter.check("b", now).allowed);
        assert!(!limiter.check("a", now).allowed);
    }

    #[test]
    fn identifier_prefers_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.2"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        assert_eq!(client_identifier(&headers), "203.0.113.7");

        headers.remove("x-forwarded-for");
        assert_eq!(client_identifier(&headers), "10.0.0.9");

        headers.remove("x-real-ip");
        assert_eq!(client_identifier(&headers), "unknown");
    }
}
