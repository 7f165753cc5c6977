use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hirehub_cache::{rate_limit_key, Cache, CacheError};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct RateLimitError {
    error: String,
    message: String,
    retry_after: u64,
}

/// Fixed-window limit per client IP
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub scope: &'static str,
    pub max_requests: i64,
    pub window_seconds: u64,
    pub label: &'static str,
}

pub const LOGIN: RateLimit = RateLimit {
    scope: "login",
    max_requests: 5,
    window_seconds: 60,
    label: "login attempts",
};

pub const REGISTRATION: RateLimit = RateLimit {
    scope: "register",
    max_requests: 3,
    window_seconds: 300,
    label: "registration attempts",
};

pub const TWO_FACTOR: RateLimit = RateLimit {
    scope: "two_factor",
    max_requests: 5,
    window_seconds: 300,
    label: "verification attempts",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited { retry_after: u64 },
}

/// `count` is the value after incrementing, `ttl` the key's remaining
/// lifetime as reported by Redis (negative when unknown).
pub fn decide(limit: &RateLimit, count: i64, ttl: i64) -> Decision {
    if count <= limit.max_requests {
        return Decision::Allowed;
    }

    let retry_after = if ttl > 0 { ttl as u64 } else { limit.window_seconds };
    Decision::Limited { retry_after }
}

pub struct RateLimiter {
    cache: Arc<Cache>,
}

impl RateLimiter {
    pub fn new(cache: Arc<Cache>) -> Self {
        Self { cache }
    }

    pub async fn check(&self, limit: &RateLimit, client: &str) -> Result<Decision, CacheError> {
        let key = rate_limit_key(limit.scope, client);
        let count = self.cache.incr_by_with_ttl(&key, 1, limit.window_seconds).await?;

        if count <= limit.max_requests {
            return Ok(Decision::Allowed);
        }

        let ttl = self.cache.ttl(&key).await?;
        Ok(decide(limit, count, ttl))
    }
}

/// Client IP from proxy headers, falling back to the socket address
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|h| h.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn too_many_requests(limit: &RateLimit, retry_after: u64) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(RateLimitError {
            error: "rate_limit_exceeded".to_string(),
            message: format!(
                "Too many {}. Please try again in {} seconds.",
                limit.label, retry_after
            ),
            retry_after,
        }),
    )
        .into_response();

    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

async fn enforce(cache: Arc<Cache>, limit: &RateLimit, request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);

    match RateLimiter::new(cache).check(limit, &ip).await {
        Ok(Decision::Allowed) => next.run(request).await,
        Ok(Decision::Limited { retry_after }) => {
            tracing::warn!(scope = limit.scope, %ip, retry_after, "Rate limit exceeded");
            too_many_requests(limit, retry_after)
        }
        Err(e) => {
            // Fail open
            tracing::error!(scope = limit.scope, error = %e, "Rate limit check failed");
            next.run(request).await
        }
    }
}

/// 5 requests per 60 seconds per IP
pub async fn rate_limit_login(State(cache): State<Arc<Cache>>, request: Request, next: Next) -> Response {
    enforce(cache, &LOGIN, request, next).await
}

/// 3 requests per 300 seconds per IP
pub async fn rate_limit_registration(State(cache): State<Arc<Cache>>, request: Request, next: Next) -> Response {
    enforce(cache, &REGISTRATION, request, next).await
}

/// 5 requests per 300 seconds per IP
pub async fn rate_limit_two_factor(State(cache): State<Arc<Cache>>, request: Request, next: Next) -> Response {
    enforce(cache, &TWO_FACTOR, request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide() {
        assert_eq!(decide(&LOGIN, 1, 60), Decision::Allowed);
        assert_eq!(decide(&LOGIN, 5, 12), Decision::Allowed);
        assert_eq!(decide(&LOGIN, 6, 42), Decision::Limited { retry_after: 42 });
        // Key without expiry: assume a full window
        assert_eq!(
            decide(&REGISTRATION, 4, -1),
            Decision::Limited { retry_after: 300 }
        );
    }

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "10.0.0.9:5555".parse().unwrap();

        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.7"));
        assert_eq!(client_ip(&headers, Some(peer)), "192.0.2.7");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.5, 10.0.0.1"));
        assert_eq!(client_ip(&headers, Some(peer)), "203.0.113.5");
    }

    #[test]
    fn test_too_many_requests_sets_retry_after() {
        let response = too_many_requests(&TWO_FACTOR, 120);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "120");
    }
}
