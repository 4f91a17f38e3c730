//! Per-IP token buckets guarding the HTTP surface, including the WebSocket
//! upgrade. Once upgraded, frames on an open socket are not counted.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use tracing::warn;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self, rate: f64, capacity: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;

        self.tokens = (self.tokens + elapsed * rate).min(capacity);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<IpAddr, TokenBucket>>,
    rate: f64,
    burst: f64,
}

impl RateLimiter {
    /// `rate` tokens per second, at most `burst` banked.
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            rate,
            burst,
        }
    }

    pub fn check(&self, ip: IpAddr) -> bool {
        let mut bucket = self
            .buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(self.burst));
        bucket.try_consume(self.rate, self.burst)
    }

    /// Forget clients that have not been seen for `max_idle`.
    pub fn purge_stale(&self, max_idle: Duration) {
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < max_idle);
    }

    pub fn tracked(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10.0, 30.0)
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(ip) = extract_client_ip(&req) {
        if !limiter.check(ip) {
            warn!(ip = %ip, path = %req.uri().path(), "Rate limit exceeded");
            let body = serde_json::json!({ "error": "Too many requests" });
            return (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        }
    }

    next.run(req).await
}

/// Try ConnectInfo first, then X-Forwarded-For, then X-Real-IP.
fn extract_client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<std::net::SocketAddr>>() {
        return Some(connect_info.0.ip());
    }

    if let Some(first) = header(req, "x-forwarded-for").and_then(|v| v.split(',').next()) {
        if let Ok(ip) = first.trim().parse::<IpAddr>() {
            return Some(ip);
        }
    }

    header(req, "x-real-ip").and_then(|v| v.trim().parse::<IpAddr>().ok())
}

fn header<'a, B>(req: &'a Request<B>, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}
