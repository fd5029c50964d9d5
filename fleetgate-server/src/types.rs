//! Request and response bodies for the HTTP API
//!
//! Cached payloads other than driver locations are opaque JSON: the server
//! stores whatever the caller sends and hands it back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Body of `PUT /api/drivers/{id}/location`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationUpdate {
    /// Reject coordinates outside the WGS84 ranges
    pub fn validate(&self) -> Result<(), String> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude out of range: {}", self.latitude));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(format!("longitude out of range: {}", self.longitude));
        }
        Ok(())
    }
}

/// Body of `PUT /api/stats/{key}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsWrite {
    /// Value to cache
    pub value: Value,
    /// Overrides the default stats TTL; 0 keeps the value until replaced
    pub ttl_secs: Option<u64>,
}

impl StatsWrite {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error message
    pub error: String,
}

impl HttpErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        HttpErrorResponse {
            error: error.into(),
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub cache_ready: bool,
    pub sweeping: bool,
    pub uptime_seconds: u64,
}
