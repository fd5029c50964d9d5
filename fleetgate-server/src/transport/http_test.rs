#[cfg(test)]
mod tests {
    use super::super::http::router;
    use crate::config::Policies;
    use crate::metrics::PolicyKind;
    use crate::middleware::{
        RateLimitErrorBody, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING, X_RATELIMIT_RESET,
    };
    use crate::service::{GateService, KeyPolicy};
    use crate::types::HealthResponse;
    use axum::Extension;
    use axum::Router;
    use axum::body::Body;
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode, header};
    use axum::response::Response;
    use fleetgate::Policy;
    use serde_json::{Value, json};
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tower::ServiceExt;

    fn service(strict_max: u64) -> Arc<GateService> {
        let service = GateService::new(
            Policies {
                strict: Policy::new("strict", strict_max, Duration::from_secs(900))
                    .unwrap()
                    .with_message("Too many authentication attempts"),
                standard: Policy::standard(),
                lenient: Policy::lenient(),
            },
            KeyPolicy {
                fallback_key: "unknown".into(),
                trust_forwarded_for: true,
            },
            64,
            64,
            Duration::from_secs(60),
        );
        service.cache().init();
        Arc::new(service)
    }

    fn request(method: &str, uri: &str, ip: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(ip) = ip {
            builder = builder.header("x-forwarded-for", ip);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        builder.body(body).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: Response) -> T {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_unlimited() {
        let app = router(service(1));

        for _ in 0..5 {
            let response = send(&app, request("GET", "/health", None, None)).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert!(response.headers().get(X_RATELIMIT_LIMIT).is_none());

            let health: HealthResponse = json_body(response).await;
            assert_eq!(health.status, "ok");
            assert!(health.cache_ready);
            assert!(!health.sweeping);
        }
    }

    #[tokio::test]
    async fn test_driver_location_round_trip() {
        let app = router(service(5));
        let ip = Some("198.51.100.4");

        let put = send(
            &app,
            request(
                "PUT",
                "/api/drivers/d42/location",
                ip,
                Some(json!({"latitude": 40.7128, "longitude": -74.006})),
            ),
        )
        .await;
        assert_eq!(put.status(), StatusCode::NO_CONTENT);
        assert_eq!(put.headers()[X_RATELIMIT_LIMIT], "100");
        assert_eq!(put.headers()[X_RATELIMIT_REMAINING], "99");
        assert!(put.headers()[X_RATELIMIT_RESET].to_str().unwrap().ends_with('Z'));

        let get = send(&app, request("GET", "/api/drivers/d42/location", ip, None)).await;
        assert_eq!(get.status(), StatusCode::OK);
        let location: Value = json_body(get).await;
        assert_eq!(location, json!({"latitude": 40.7128, "longitude": -74.006}));

        // Public read of the same entry goes through the lenient policy
        let public = send(&app, request("GET", "/public/drivers/d42/location", ip, None)).await;
        assert_eq!(public.status(), StatusCode::OK);
        assert_eq!(public.headers()[X_RATELIMIT_LIMIT], "200");

        let del = send(&app, request("DELETE", "/api/drivers/d42/location", ip, None)).await;
        assert_eq!(del.status(), StatusCode::NO_CONTENT);

        let miss = send(&app, request("GET", "/api/drivers/d42/location", ip, None)).await;
        assert_eq!(miss.status(), StatusCode::NOT_FOUND);
        let err: Value = json_body(miss).await;
        assert_eq!(err["error"], "driver location not cached");
    }

    #[tokio::test]
    async fn test_invalid_location_rejected() {
        let app = router(service(5));
        let response = send(
            &app,
            request(
                "PUT",
                "/api/drivers/d1/location",
                Some("198.51.100.4"),
                Some(json!({"latitude": 120.0, "longitude": 0.0})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_strict_policy_rejects_after_max() {
        let svc = service(2);
        let app = router(svc.clone());
        let ip = Some("203.0.113.9");

        for remaining in ["1", "0"] {
            let response = send(&app, request("GET", "/auth/sessions/u1", ip, None)).await;
            // Misses still count against the budget
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(response.headers()[X_RATELIMIT_REMAINING], remaining);
        }

        let response = send(&app, request("GET", "/auth/sessions/u1", ip, None)).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[X_RATELIMIT_LIMIT], "2");
        assert_eq!(response.headers()[X_RATELIMIT_REMAINING], "0");

        let retry_after: u64 = response.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry_after > 890 && retry_after <= 900);

        let body: RateLimitErrorBody = json_body(response).await;
        assert_eq!(body.error, "Too many authentication attempts");
        assert_eq!(body.retry_after, retry_after);

        assert_eq!(svc.metrics().allowed(PolicyKind::Strict), 2);
        assert_eq!(svc.metrics().denied(PolicyKind::Strict), 1);

        // Other policies keep their own budget
        let response = send(&app, request("GET", "/api/stats/daily", ip, None)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_callers_keyed_by_forwarded_address() {
        let app = router(service(1));

        let first = send(&app, request("GET", "/auth/sessions/a", Some("192.0.2.1"), None)).await;
        assert_eq!(first.status(), StatusCode::NOT_FOUND);

        let second = send(
            &app,
            request("GET", "/auth/sessions/a", Some("192.0.2.2, 10.0.0.1"), None),
        )
        .await;
        assert_eq!(second.status(), StatusCode::NOT_FOUND);

        let again = send(&app, request("GET", "/auth/sessions/a", Some("192.0.2.1"), None)).await;
        assert_eq!(again.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_unidentified_callers_share_fallback_bucket() {
        let svc = service(1);
        let app = router(svc.clone());

        let first = send(&app, request("GET", "/auth/sessions/a", None, None)).await;
        assert_eq!(first.status(), StatusCode::NOT_FOUND);

        let second = send(&app, request("GET", "/auth/sessions/b", None, None)).await;
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);

        assert_eq!(svc.metrics().fallback_keys.load(Ordering::Relaxed), 2);
        assert!(
            svc.limiter(PolicyKind::Strict)
                .peek("unknown", std::time::SystemTime::now())
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_peer_address_used_without_forwarded_header() {
        let svc = service(1);
        let peer: SocketAddr = "192.0.2.77:51000".parse().unwrap();
        let app = router(svc.clone()).layer(Extension(ConnectInfo(peer)));

        let first = send(&app, request("GET", "/auth/sessions/a", None, None)).await;
        assert_eq!(first.status(), StatusCode::NOT_FOUND);
        assert_eq!(svc.metrics().fallback_keys.load(Ordering::Relaxed), 0);

        let now = std::time::SystemTime::now();
        let peeked = svc
            .limiter(PolicyKind::Strict)
            .peek("192.0.2.77", now)
            .unwrap();
        assert_eq!(peeked.count, 1);
    }

    #[tokio::test]
    async fn test_session_and_stats_endpoints() {
        let app = router(service(5));
        let ip = Some("198.51.100.8");

        let session = json!({"role": "driver", "token": "abc"});
        let put = send(
            &app,
            request("PUT", "/auth/sessions/u7", ip, Some(session)),
        )
        .await;
        assert_eq!(put.status(), StatusCode::NO_CONTENT);

        let fetched = send(&app, request("GET", "/auth/sessions/u7", ip, None)).await;
        let session: Value = json_body(fetched).await;
        assert_eq!(session["role"], "driver");

        send(&app, request("DELETE", "/auth/sessions/u7", ip, None)).await;
        let gone = send(&app, request("GET", "/auth/sessions/u7", ip, None)).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);

        let write = json!({"value": {"active": 12}, "ttl_secs": 30});
        let put = send(&app, request("PUT", "/api/stats/fleet", ip, Some(write))).await;
        assert_eq!(put.status(), StatusCode::NO_CONTENT);
        let fetched = send(&app, request("GET", "/api/stats/fleet", ip, None)).await;
        let stats: Value = json_body(fetched).await;
        assert_eq!(stats, json!({"active": 12}));

        let candidates = json!(["d1", "d2"]);
        let put = send(
            &app,
            request("PUT", "/api/nearby/grid-1", ip, Some(candidates)),
        )
        .await;
        assert_eq!(put.status(), StatusCode::NO_CONTENT);
        let fetched = send(&app, request("GET", "/api/nearby/grid-1", ip, None)).await;
        let nearby: Value = json_body(fetched).await;
        assert_eq!(nearby, json!(["d1", "d2"]));
    }

    #[tokio::test]
    async fn test_public_routes_are_read_only() {
        let app = router(service(5));
        let response = send(
            &app,
            request(
                "PUT",
                "/public/drivers/d1/location",
                Some("198.51.100.4"),
                Some(json!({"latitude": 1.0, "longitude": 2.0})),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let app = router(service(0));

        let denied = send(&app, request("GET", "/auth/sessions/x", Some("192.0.2.5"), None)).await;
        assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
        send(&app, request("GET", "/api/stats/none", Some("192.0.2.5"), None)).await;

        let response = send(&app, request("GET", "/metrics", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(text.contains("fleetgate_requests_denied{policy=\"strict\"} 1"));
        assert!(text.contains("fleetgate_requests_allowed{policy=\"standard\"} 1"));
        assert!(text.contains("fleetgate_cache_reads{outcome=\"miss\"} 1"));
    }
}
