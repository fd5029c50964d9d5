//! Rate limit policies
//!
//! A [`Policy`] fixes how many requests a caller may make inside one
//! window and what message a rejected caller sees. Three presets cover
//! the platform's endpoint classes.

use super::GateError;
use std::time::Duration;

const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

const STRICT_MAX: u64 = 5;
const STANDARD_MAX: u64 = 100;
const LENIENT_MAX: u64 = 200;

const DEFAULT_MESSAGE: &str = "Too many requests, please try again later.";
const STRICT_MESSAGE: &str = "Too many authentication attempts, please try again later.";

/// Window length, request budget and rejection message for one limiter
///
/// # Example
///
/// ```
/// use fleetgate::Policy;
/// use std::time::Duration;
///
/// let policy = Policy::new("uploads", 10, Duration::from_secs(60))
///     .unwrap()
///     .with_message("Upload quota reached");
/// assert_eq!(policy.window_ms(), 60_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    name: String,
    max: u64,
    window: Duration,
    message: String,
}

impl Policy {
    /// Create a policy allowing `max` requests per `window`
    ///
    /// A `max` of zero is accepted and denies every call.
    ///
    /// # Errors
    ///
    /// - [`GateError::InvalidWindow`]: `window` is zero
    /// - [`GateError::InvalidPolicy`]: `name` is empty
    pub fn new(name: impl Into<String>, max: u64, window: Duration) -> Result<Self, GateError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(GateError::InvalidPolicy("name must not be empty".into()));
        }
        if window.is_zero() {
            return Err(GateError::InvalidWindow);
        }

        Ok(Policy {
            name,
            max,
            window,
            message: DEFAULT_MESSAGE.to_string(),
        })
    }

    /// Create a policy from a window expressed in milliseconds
    pub fn from_millis(
        name: impl Into<String>,
        max: u64,
        window_ms: u64,
    ) -> Result<Self, GateError> {
        Self::new(name, max, Duration::from_millis(window_ms))
    }

    /// Authentication endpoints: 5 requests per 15 minutes
    pub fn strict() -> Self {
        Policy {
            name: "strict".to_string(),
            max: STRICT_MAX,
            window: FIFTEEN_MINUTES,
            message: STRICT_MESSAGE.to_string(),
        }
    }

    /// General API traffic: 100 requests per 15 minutes
    pub fn standard() -> Self {
        Policy {
            name: "standard".to_string(),
            max: STANDARD_MAX,
            window: FIFTEEN_MINUTES,
            message: DEFAULT_MESSAGE.to_string(),
        }
    }

    /// Public, unauthenticated endpoints: 200 requests per 15 minutes
    pub fn lenient() -> Self {
        Policy {
            name: "lenient".to_string(),
            max: LENIENT_MAX,
            window: FIFTEEN_MINUTES,
            message: DEFAULT_MESSAGE.to_string(),
        }
    }

    /// Replace the message shown to rejected callers
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
