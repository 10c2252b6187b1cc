//! Per-IP and per-token request budgets.
//!
//! Fixed 60-second windows over a keyed counter map. Each request charges
//! both its IP counter and, when a bearer token is present, its token
//! counter; the response headers reflect the more restrictive of the two,
//! and either counter denying denies the request. Expired entries are
//! reaped lazily during checks.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use clawdhub_registry::sha256_hex;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::middleware::{bearer_token, client_ip};
use crate::server::AppState;
use crate::types::ApiError;

/// Budget window length.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Sweep the counter table once per this many checks.
const REAP_INTERVAL: u64 = 1024;

/// Request class for budgeting purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    Read,
    Write,
}

impl RequestClass {
    fn ip_budget(self) -> u32 {
        match self {
            RequestClass::Read => 120,
            RequestClass::Write => 30,
        }
    }

    fn token_budget(self) -> u32 {
        match self {
            RequestClass::Read => 600,
            RequestClass::Write => 120,
        }
    }

    fn label(self) -> &'static str {
        match self {
            RequestClass::Read => "read",
            RequestClass::Write => "write",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: Instant,
    count: u32,
}

/// Outcome of a limiter check, carrying everything the facade needs for
/// the `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the restrictive window resets.
    pub reset_secs: u64,
    /// Set when denied.
    pub retry_after_secs: Option<u64>,
}

/// Keyed fixed-window counter table.
pub struct RateLimiter {
    windows: DashMap<String, Window>,
    checks: AtomicU64,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Charge one request against the per-IP and (when present) per-token
    /// counters.
    pub fn check(&self, class: RequestClass, ip: &str, token: Option<&str>) -> RateDecision {
        let now = Instant::now();

        if self.checks.fetch_add(1, Ordering::Relaxed) % REAP_INTERVAL == REAP_INTERVAL - 1 {
            self.reap(now);
        }

        let ip_key = format!("ip:{}:{}", class.label(), ip);
        let ip_state = self.charge(&ip_key, now);
        let mut decision = Self::decide(class.ip_budget(), ip_state, now);

        if let Some(token) = token {
            let token_key = format!("tok:{}:{}", class.label(), token);
            let token_state = self.charge(&token_key, now);
            let token_decision = Self::decide(class.token_budget(), token_state, now);
            // headers show the more restrictive counter; either denial wins
            if token_decision.remaining < decision.remaining || !token_decision.allowed {
                if !decision.allowed {
                    // already denied by IP; keep the earlier retry hint
                    decision.remaining = decision.remaining.min(token_decision.remaining);
                } else {
                    decision = token_decision;
                }
            }
        }

        decision
    }

    fn charge(&self, key: &str, now: Instant) -> Window {
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            start: now,
            count: 0,
        });
        if now.duration_since(entry.start) >= WINDOW {
            entry.start = now;
            entry.count = 0;
        }
        entry.count += 1;
        *entry
    }

    fn decide(limit: u32, window: Window, now: Instant) -> RateDecision {
        let elapsed = now.duration_since(window.start);
        let reset_secs = WINDOW.saturating_sub(elapsed).as_secs().max(1);
        if window.count > limit {
            RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_secs,
                retry_after_secs: Some(reset_secs),
            }
        } else {
            RateDecision {
                allowed: true,
                limit,
                remaining: limit - window.count,
                reset_secs,
                retry_after_secs: None,
            }
        }
    }

    fn reap(&self, now: Instant) {
        self.windows
            .retain(|_, w| now.duration_since(w.start) < WINDOW * 2);
    }

    /// Current table size (test helper).
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

/// Axum middleware enforcing the budgets and attaching the
/// `X-RateLimit-*` headers to every response.
pub async fn enforce(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let class = if matches!(*request.method(), Method::GET | Method::HEAD) {
        RequestClass::Read
    } else {
        RequestClass::Write
    };
    let ip = client_ip(request.headers()).unwrap_or_else(|| "unknown".to_string());
    // the counter keys carry a token digest prefix, never the raw token
    let token_key =
        bearer_token(request.headers()).map(|t| sha256_hex(t.as_bytes())[..16].to_string());

    let decision = state.limiter.check(class, &ip, token_key.as_deref());

    if !decision.allowed {
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiError::new("RATE_LIMITED", "Rate limit exceeded")),
        )
            .into_response();
        apply_headers(&mut response, &decision);
        if let Some(secs) = decision.retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(&mut response, &decision);
    response
}

fn apply_headers(response: &mut Response, decision: &RateDecision) {
    let headers = response.headers_mut();
    let pairs = [
        ("X-RateLimit-Limit", decision.limit as u64),
        ("X-RateLimit-Remaining", decision.remaining as u64),
        ("X-RateLimit-Reset", decision.reset_secs),
    ];
    for (name, value) in pairs {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            headers.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_budget_counts_down() {
        let limiter = RateLimiter::new();
        for n in 1..=120u32 {
            let d = limiter.check(RequestClass::Read, "1.2.3.4", None);
            assert!(d.allowed, "request {n} should be allowed");
            assert_eq!(d.limit, 120);
            assert_eq!(d.remaining, 120 - n);
        }
        let denied = limiter.check(RequestClass::Read, "1.2.3.4", None);
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
        let retry = denied.retry_after_secs.unwrap();
        assert!(retry >= 1 && retry <= WINDOW.as_secs());
    }

    #[test]
    fn test_write_budget_is_tighter() {
        let limiter = RateLimiter::new();
        for _ in 0..30 {
            assert!(limiter.check(RequestClass::Write, "1.2.3.4", None).allowed);
        }
        assert!(!limiter.check(RequestClass::Write, "1.2.3.4", None).allowed);
        // reads are unaffected
        assert!(limiter.check(RequestClass::Read, "1.2.3.4", None).allowed);
        // other IPs are unaffected
        assert!(limiter.check(RequestClass::Write, "5.6.7.8", None).allowed);
    }

    #[test]
    fn test_either_counter_denying_denies() {
        let limiter = RateLimiter::new();
        // exhaust the IP write budget
        for _ in 0..30 {
            assert!(limiter.check(RequestClass::Write, "1.2.3.4", Some("tok")).allowed);
        }
        let d = limiter.check(RequestClass::Write, "1.2.3.4", Some("tok"));
        // IP denies even though the token still has budget
        assert!(!d.allowed);
        assert!(d.retry_after_secs.is_some());
    }

    #[test]
    fn test_headers_reflect_more_restrictive_counter() {
        let limiter = RateLimiter::new();
        let d = limiter.check(RequestClass::Read, "1.2.3.4", Some("tok"));
        // after one request: ip 119/120 remaining, token 599/600; ip is tighter
        assert_eq!(d.limit, 120);
        assert_eq!(d.remaining, 119);
    }
}
