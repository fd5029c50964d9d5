//! HTTP/JSON transport
//!
//! Routes are grouped by the rate limit policy that guards them. Every
//! limited response carries the `X-RateLimit-*` headers; see
//! [`middleware`](crate::middleware).
//!
//! # API Endpoints
//!
//! ## Unlimited
//!
//! - `GET /health`: liveness plus cache and sweeper state
//! - `GET /metrics`: Prometheus text format
//!
//! ## Strict (authentication)
//!
//! - `GET | PUT | DELETE /auth/sessions/{user_id}`: session blob, 1 hour TTL
//!
//! ## Standard (general API)
//!
//! - `GET | PUT | DELETE /api/drivers/{driver_id}/location`: 60 second TTL
//! - `GET | PUT /api/nearby/{fingerprint}`: nearby driver results, 30 second TTL
//! - `GET | PUT /api/stats/{key}`: aggregated statistics, 5 minute TTL unless
//!   the body carries `ttl_secs`
//!
//! ## Lenient (public)
//!
//! - `GET /public/drivers/{driver_id}/location`: read-only driver location
//!
//! Reads return 404 with `{"error": ...}` on a miss. Writes return 204.
//!
//! ### Location update body
//!
//! ```json
//! { "latitude": 40.7128, "longitude": -74.006 }
//! ```

use super::Transport;
use crate::metrics::PolicyKind;
use crate::middleware::{RateLimitLayer, rate_limit};
use crate::service::GateService;
use crate::types::{HealthResponse, HttpErrorResponse, LocationUpdate, StatsWrite};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use fleetgate::DriverLocation;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

type ApiError = (StatusCode, Json<HttpErrorResponse>);

/// HTTP transport implementation
pub struct HttpTransport {
    host: String,
    port: u16,
}

impl HttpTransport {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn start(self, service: Arc<GateService>, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind((self.host.as_str(), self.port))
            .await
            .with_context(|| {
                format!("Failed to bind HTTP listener on {}:{}", self.host, self.port)
            })?;

        serve(listener, service, shutdown).await
    }
}

/// Serve the API on an already bound listener until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    service: Arc<GateService>,
    shutdown: CancellationToken,
) -> Result<()> {
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    let app = router(service).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the API router with each route group behind its policy
pub fn router(service: Arc<GateService>) -> Router {
    let auth = Router::new()
        .route(
            "/auth/sessions/{user_id}",
            get(get_session).put(put_session).delete(delete_session),
        )
        .route_layer(from_fn_with_state(
            RateLimitLayer::new(&service, PolicyKind::Strict),
            rate_limit,
        ));

    let api = Router::new()
        .route(
            "/api/drivers/{driver_id}/location",
            get(get_location).put(put_location).delete(delete_location),
        )
        .route("/api/nearby/{fingerprint}", get(get_nearby).put(put_nearby))
        .route("/api/stats/{key}", get(get_stats).put(put_stats))
        .route_layer(from_fn_with_state(
            RateLimitLayer::new(&service, PolicyKind::Standard),
            rate_limit,
        ));

    let public = Router::new()
        .route("/public/drivers/{driver_id}/location", get(get_location))
        .route_layer(from_fn_with_state(
            RateLimitLayer::new(&service, PolicyKind::Lenient),
            rate_limit,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(export_metrics))
        .merge(auth)
        .merge(api)
        .merge(public)
        .with_state(service)
}

async fn health(State(service): State<Arc<GateService>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        cache_ready: service.cache().is_ready(),
        sweeping: service.is_sweeping(),
        uptime_seconds: service.metrics().uptime_seconds(),
    })
}

async fn export_metrics(State(service): State<Arc<GateService>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        service.metrics().export_prometheus(),
    )
}

async fn get_session(
    State(service): State<Arc<GateService>>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let session = service.cache().get_session(&user_id, SystemTime::now());
    lookup(&service, session, "session")
}

async fn put_session(
    State(service): State<Arc<GateService>>,
    Path(user_id): Path<String>,
    Json(session): Json<Value>,
) -> StatusCode {
    service.cache().cache_session(&user_id, &session, SystemTime::now());
    StatusCode::NO_CONTENT
}

async fn delete_session(
    State(service): State<Arc<GateService>>,
    Path(user_id): Path<String>,
) -> StatusCode {
    service.cache().invalidate_session(&user_id);
    StatusCode::NO_CONTENT
}

async fn get_location(
    State(service): State<Arc<GateService>>,
    Path(driver_id): Path<String>,
) -> Result<Json<DriverLocation>, ApiError> {
    let location = service.cache().get_driver_location(&driver_id, SystemTime::now());
    lookup(&service, location, "driver location")
}

async fn put_location(
    State(service): State<Arc<GateService>>,
    Path(driver_id): Path<String>,
    Json(update): Json<LocationUpdate>,
) -> Result<StatusCode, ApiError> {
    update
        .validate()
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(HttpErrorResponse::new(e))))?;

    service.cache().cache_driver_location(
        &driver_id,
        update.latitude,
        update.longitude,
        SystemTime::now(),
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_location(
    State(service): State<Arc<GateService>>,
    Path(driver_id): Path<String>,
) -> StatusCode {
    service.cache().invalidate_driver_location(&driver_id);
    StatusCode::NO_CONTENT
}

async fn get_nearby(
    State(service): State<Arc<GateService>>,
    Path(fingerprint): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let nearby = service.cache().get_nearby_drivers(&fingerprint, SystemTime::now());
    lookup(&service, nearby, "nearby drivers")
}

async fn put_nearby(
    State(service): State<Arc<GateService>>,
    Path(fingerprint): Path<String>,
    Json(candidates): Json<Value>,
) -> StatusCode {
    service
        .cache()
        .cache_nearby_drivers(&fingerprint, &candidates, SystemTime::now());
    StatusCode::NO_CONTENT
}

async fn get_stats(
    State(service): State<Arc<GateService>>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let stats = service.cache().get_stats(&key, SystemTime::now());
    lookup(&service, stats, "stats")
}

async fn put_stats(
    State(service): State<Arc<GateService>>,
    Path(key): Path<String>,
    Json(write): Json<StatsWrite>,
) -> StatusCode {
    service
        .cache()
        .cache_stats(&key, &write.value, write.ttl(), SystemTime::now());
    StatusCode::NO_CONTENT
}

fn lookup<T>(service: &GateService, value: Option<T>, what: &str) -> Result<Json<T>, ApiError> {
    service.metrics().record_cache_read(value.is_some());
    value.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(HttpErrorResponse::new(format!("{what} not cached"))),
        )
    })
}
