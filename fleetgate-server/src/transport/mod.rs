//! Transport layer for the gate service
//!
//! A transport exposes the shared [`GateService`] over the network and runs
//! until its shutdown token is cancelled.
//!
//! # Available Transports
//!
//! - [`http`]: REST API with JSON, rate limited per route group

pub mod http;

#[cfg(test)]
mod http_test;

use crate::service::GateService;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Common interface for transport implementations
///
/// Each transport is responsible for:
/// - Accepting client connections
/// - Applying the service's rate limit policies
/// - Stopping cleanly once `shutdown` is cancelled
#[async_trait]
pub trait Transport {
    /// Bind and serve until `shutdown` is cancelled or an error occurs
    async fn start(self, service: Arc<GateService>, shutdown: CancellationToken) -> Result<()>;
}
