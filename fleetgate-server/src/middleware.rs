//! Rate limiting middleware for axum routers
//!
//! Every response that passes through the middleware carries
//! `X-RateLimit-Limit`, `X-RateLimit-Remaining` and `X-RateLimit-Reset`
//! (ISO-8601). Rejected requests get a 429 with a JSON body and a
//! `Retry-After` header in whole seconds.
//!
//! ```ignore
//! let layer = RateLimitLayer::new(&service, PolicyKind::Strict);
//! let router = Router::new()
//!     .route("/auth/login", post(login))
//!     .route_layer(axum::middleware::from_fn_with_state(layer, rate_limit));
//! ```

use crate::metrics::{Metrics, PolicyKind};
use crate::service::GateService;
use axum::Json;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SecondsFormat, Utc};
use fleetgate::{Decision, RateLimitResult, RateLimiter};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::SystemTime;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Derives the rate limit key for an inbound request
///
/// Returning `None` sends the request to the fallback bucket.
pub trait KeyGenerator: Send + Sync {
    fn generate(&self, request: &Request) -> Option<String>;
}

/// Keys callers by IP address
///
/// With `trust_forwarded_for`, the first valid address in
/// `X-Forwarded-For` wins over the socket peer address.
#[derive(Debug, Clone, Copy)]
pub struct ClientAddress {
    pub trust_forwarded_for: bool,
}

impl ClientAddress {
    fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
        let raw = headers.get(X_FORWARDED_FOR)?.to_str().ok()?;
        raw.split(',').next()?.trim().parse().ok()
    }
}

impl KeyGenerator for ClientAddress {
    fn generate(&self, request: &Request) -> Option<String> {
        if self.trust_forwarded_for {
            if let Some(ip) = Self::forwarded_for(request.headers()) {
                return Some(ip.to_string());
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
    }
}

/// State for one rate-limited group of routes
#[derive(Clone)]
pub struct RateLimitLayer {
    kind: PolicyKind,
    limiter: Arc<RateLimiter>,
    key_generator: Arc<dyn KeyGenerator>,
    fallback_key: Arc<str>,
    metrics: Arc<Metrics>,
}

impl RateLimitLayer {
    /// Limit with one of the service's policies, keyed by client address
    pub fn new(service: &GateService, kind: PolicyKind) -> Self {
        let keys = service.keys();
        Self::with_key_generator(
            service,
            kind,
            Arc::new(ClientAddress {
                trust_forwarded_for: keys.trust_forwarded_for,
            }),
        )
    }

    pub fn with_key_generator(
        service: &GateService,
        kind: PolicyKind,
        key_generator: Arc<dyn KeyGenerator>,
    ) -> Self {
        RateLimitLayer {
            kind,
            limiter: service.limiter(kind).clone(),
            key_generator,
            fallback_key: Arc::from(service.keys().fallback_key.as_str()),
            metrics: service.metrics().clone(),
        }
    }

    fn key_for(&self, request: &Request) -> String {
        match self.key_generator.generate(request) {
            Some(key) => key,
            None => {
                tracing::debug!(
                    policy = self.kind.as_str(),
                    fallback = %self.fallback_key,
                    "no caller address, using fallback key"
                );
                self.metrics.record_fallback_key();
                self.fallback_key.to_string()
            }
        }
    }
}

/// JSON body of a 429 response
#[derive(Debug, Serialize, Deserialize)]
pub struct RateLimitErrorBody {
    pub error: String,
    pub retry_after: u64,
}

/// A request rejected by the rate limiter
#[derive(Debug)]
pub struct RateLimitExceeded {
    pub message: String,
    pub retry_after_secs: u64,
    pub result: RateLimitResult,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        let body = RateLimitErrorBody {
            error: self.message,
            retry_after: self.retry_after_secs,
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();

        let headers = response.headers_mut();
        apply_headers(headers, &self.result);
        headers.insert(RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        response
    }
}

/// Middleware entry point, see [`axum::middleware::from_fn_with_state`]
pub async fn rate_limit(
    State(layer): State<RateLimitLayer>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitExceeded> {
    let key = layer.key_for(&request);

    match layer.limiter.check(&key, SystemTime::now()) {
        Decision::Allowed(result) => {
            layer.metrics.record_decision(layer.kind, true);
            let mut response = next.run(request).await;
            apply_headers(response.headers_mut(), &result);
            Ok(response)
        }
        Decision::Denied {
            retry_after_secs,
            result,
        } => {
            layer.metrics.record_decision(layer.kind, false);
            Err(RateLimitExceeded {
                message: layer.limiter.policy().message().to_string(),
                retry_after_secs,
                result,
            })
        }
    }
}

fn apply_headers(headers: &mut HeaderMap, result: &RateLimitResult) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(result.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(result.remaining));
    if let Ok(reset) = HeaderValue::from_str(&iso8601(result.reset_at)) {
        headers.insert(X_RATELIMIT_RESET, reset);
    }
}

fn iso8601(at: SystemTime) -> String {
    DateTime::<Utc>::from(at).to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::time::{Duration, UNIX_EPOCH};

    fn request_with(forwarded: Option<&str>, peer: Option<SocketAddr>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = forwarded {
            builder = builder.header(X_FORWARDED_FOR, value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        if let Some(addr) = peer {
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request
    }

    #[test]
    fn test_forwarded_for_wins_when_trusted() {
        let keygen = ClientAddress {
            trust_forwarded_for: true,
        };
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let request = request_with(Some("203.0.113.7, 10.0.0.2"), Some(peer));
        assert_eq!(keygen.generate(&request).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_peer_used_when_forwarded_untrusted() {
        let keygen = ClientAddress {
            trust_forwarded_for: false,
        };
        let peer: SocketAddr = "10.0.0.1:4000".parse().unwrap();
        let request = request_with(Some("203.0.113.7"), Some(peer));
        assert_eq!(keygen.generate(&request).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_garbage_forwarded_falls_back_to_peer() {
        let keygen = ClientAddress {
            trust_forwarded_for: true,
        };
        let peer: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        let request = request_with(Some("not-an-ip"), Some(peer));
        assert_eq!(keygen.generate(&request).as_deref(), Some("2001:db8::1"));
    }

    #[test]
    fn test_no_address_yields_none() {
        let keygen = ClientAddress {
            trust_forwarded_for: true,
        };
        assert_eq!(keygen.generate(&request_with(None, None)), None);
    }

    #[test]
    fn test_iso8601_format() {
        let at = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(iso8601(at), "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_rejection_response() {
        let rejection = RateLimitExceeded {
            message: "Too many requests".into(),
            retry_after_secs: 42,
            result: RateLimitResult {
                limit: 5,
                remaining: 0,
                count: 6,
                reset_at: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
            },
        };
        let response = rejection.into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers[RETRY_AFTER], "42");
        assert_eq!(headers[X_RATELIMIT_LIMIT], "5");
        assert_eq!(headers[X_RATELIMIT_REMAINING], "0");
        assert_eq!(headers[X_RATELIMIT_RESET], "2023-11-14T22:13:20.000Z");
    }
}
