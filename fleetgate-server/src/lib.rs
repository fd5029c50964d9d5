//! # Fleetgate Server
//!
//! HTTP front end for the [`fleetgate`] library: per-route-group rate
//! limiting, the real-time cache exposed as JSON endpoints, and a background
//! sweeper that evicts expired counters and cache entries.
//!
//! ## Quick Start
//!
//! ```bash
//! # Show all available options
//! fleetgate-server --help
//!
//! # Listen on all interfaces, port 9090
//! fleetgate-server --http-host 0.0.0.0 --http-port 9090
//!
//! # List all available environment variables
//! fleetgate-server --list-env-vars
//! ```
//!
//! ## Policies
//!
//! | Route group | Policy | Default budget |
//! |-------------|--------|----------------|
//! | `/auth/*`   | strict   | 5 per 15 minutes |
//! | `/api/*`    | standard | 100 per 15 minutes |
//! | `/public/*` | lenient  | 200 per 15 minutes |
//!
//! `/health` and `/metrics` are never limited.
//!
//! Callers are keyed by the first `X-Forwarded-For` address (unless
//! `--trust-forwarded-for false`), then by the socket peer address. When
//! neither is available every such request shares the fallback bucket
//! (`--fallback-key`, default `unknown`); watch `fleetgate_fallback_keys`
//! in `/metrics` if that bucket starts rejecting legitimate traffic.
//!
//! ## Rejections
//!
//! ```http
//! HTTP/1.1 429 Too Many Requests
//! Retry-After: 812
//! X-RateLimit-Limit: 5
//! X-RateLimit-Remaining: 0
//! X-RateLimit-Reset: 2025-01-01T12:15:00.000Z
//!
//! {"error":"Too many authentication attempts, please try again later.","retry_after":812}
//! ```
//!
//! ## Embedding
//!
//! The router can be mounted without the binary:
//!
//! ```no_run
//! use fleetgate_server::config::Policies;
//! use fleetgate_server::service::{GateService, KeyPolicy};
//! use fleetgate_server::transport::http::router;
//! use fleetgate::Policy;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn run() {
//! let service = Arc::new(GateService::new(
//!     Policies {
//!         strict: Policy::strict(),
//!         standard: Policy::standard(),
//!         lenient: Policy::lenient(),
//!     },
//!     KeyPolicy { fallback_key: "unknown".into(), trust_forwarded_for: true },
//!     10_000,
//!     10_000,
//!     Duration::from_secs(60),
//! ));
//! service.start();
//! let app = router(service.clone());
//! # let _ = app;
//! # }
//! ```

pub mod config;
pub mod metrics;
pub mod middleware;
pub mod service;
pub mod sweeper;
pub mod transport;
pub mod types;
