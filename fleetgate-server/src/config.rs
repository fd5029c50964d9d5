//! Server configuration and CLI argument parsing
//!
//! Every option can be given on the command line or through an environment
//! variable with the `FLEETGATE_` prefix.
//!
//! # Configuration Priority
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables
//! 3. Default values (lowest priority)
//!
//! # Example Usage
//!
//! ```bash
//! # Tighter login throttling, sweep every 30 seconds
//! fleetgate-server --strict-max 3 --sweep-interval 30
//!
//! # Same through the environment
//! export FLEETGATE_STRICT_MAX=3
//! export FLEETGATE_SWEEP_INTERVAL=30
//! fleetgate-server
//! ```
//!
//! Invalid settings (a zero-length window, a zero sweep interval) are
//! rejected here, before the server binds a socket.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use fleetgate::Policy;
use std::time::Duration;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Longest accepted sweep interval, in seconds (one day)
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 86_400;
/// Longest accepted rate limit window, in milliseconds (one year)
pub const MAX_WINDOW_MS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Main configuration structure for the server
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP listener
    pub http: HttpConfig,
    /// Rate limit policies
    pub limits: LimitsConfig,
    /// Caller identification
    pub keys: KeyConfig,
    /// Store sizing and sweeping
    pub store: StoreConfig,
    /// Logging level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Host address to bind to (e.g., "0.0.0.0")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

/// Request budget for one policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    pub max: u64,
    pub window_ms: u64,
}

/// Rate limit policy configuration
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Authentication endpoints
    pub strict: PolicyConfig,
    /// General API traffic
    pub standard: PolicyConfig,
    /// Public, unauthenticated endpoints
    pub lenient: PolicyConfig,
    /// Overrides the rejection message of every policy
    pub message: Option<String>,
}

/// How callers are identified
#[derive(Debug, Clone)]
pub struct KeyConfig {
    /// Bucket used when no caller address can be derived
    pub fallback_key: String,
    /// Prefer the first `X-Forwarded-For` address over the peer address
    pub trust_forwarded_for: bool,
}

/// Store sizing and sweeping
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Expected number of distinct callers per policy
    pub counter_capacity: usize,
    /// Expected number of cached entries
    pub cache_capacity: usize,
    /// Seconds between sweeps
    pub sweep_interval: u64,
}

/// The three policies the server enforces
#[derive(Debug, Clone)]
pub struct Policies {
    pub strict: Policy,
    pub standard: Policy,
    pub lenient: Policy,
}

/// Command-line arguments for the server
#[derive(Parser, Debug)]
#[command(
    name = "fleetgate-server",
    about = "Rate limiting and real-time cache service",
    long_about = "Rate limiting middleware and real-time cache service for fleet operations.\n\nEnvironment variables with FLEETGATE_ prefix are supported. CLI arguments take precedence over environment variables."
)]
pub struct Args {
    // HTTP Transport
    #[arg(
        long,
        value_name = "HOST",
        help = "HTTP host",
        default_value = "127.0.0.1",
        env = "FLEETGATE_HTTP_HOST"
    )]
    pub http_host: String,
    #[arg(
        long,
        value_name = "PORT",
        help = "HTTP port",
        default_value_t = 8080,
        env = "FLEETGATE_HTTP_PORT"
    )]
    pub http_port: u16,

    // Policies
    #[arg(
        long,
        value_name = "N",
        help = "Requests per window for authentication endpoints",
        default_value_t = 5,
        env = "FLEETGATE_STRICT_MAX"
    )]
    pub strict_max: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Window length for authentication endpoints (milliseconds)",
        default_value_t = 900_000,
        env = "FLEETGATE_STRICT_WINDOW_MS"
    )]
    pub strict_window_ms: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Requests per window for general API traffic",
        default_value_t = 100,
        env = "FLEETGATE_STANDARD_MAX"
    )]
    pub standard_max: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Window length for general API traffic (milliseconds)",
        default_value_t = 900_000,
        env = "FLEETGATE_STANDARD_WINDOW_MS"
    )]
    pub standard_window_ms: u64,
    #[arg(
        long,
        value_name = "N",
        help = "Requests per window for public endpoints",
        default_value_t = 200,
        env = "FLEETGATE_LENIENT_MAX"
    )]
    pub lenient_max: u64,
    #[arg(
        long,
        value_name = "MS",
        help = "Window length for public endpoints (milliseconds)",
        default_value_t = 900_000,
        env = "FLEETGATE_LENIENT_WINDOW_MS"
    )]
    pub lenient_window_ms: u64,
    #[arg(
        long,
        value_name = "TEXT",
        help = "Message returned with every 429 response",
        env = "FLEETGATE_RATE_LIMIT_MESSAGE"
    )]
    pub rate_limit_message: Option<String>,

    // Caller identification
    #[arg(
        long,
        value_name = "KEY",
        help = "Rate limit bucket for callers without a usable address",
        default_value = "unknown",
        env = "FLEETGATE_FALLBACK_KEY"
    )]
    pub fallback_key: String,
    #[arg(
        long,
        value_name = "BOOL",
        help = "Identify callers by the first X-Forwarded-For address",
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "FLEETGATE_TRUST_FORWARDED_FOR"
    )]
    pub trust_forwarded_for: bool,

    // Stores
    #[arg(
        long,
        value_name = "SIZE",
        help = "Initial counter store capacity per policy",
        default_value_t = 10_000,
        env = "FLEETGATE_COUNTER_CAPACITY"
    )]
    pub counter_capacity: usize,
    #[arg(
        long,
        value_name = "SIZE",
        help = "Initial cache capacity",
        default_value_t = 10_000,
        env = "FLEETGATE_CACHE_CAPACITY"
    )]
    pub cache_capacity: usize,
    #[arg(
        long,
        value_name = "SECS",
        help = "Interval between sweeps of expired entries (seconds)",
        default_value_t = 60,
        env = "FLEETGATE_SWEEP_INTERVAL"
    )]
    pub sweep_interval: u64,

    // General options
    #[arg(
        long,
        value_name = "LEVEL",
        help = "Log level: error, warn, info, debug, trace",
        default_value = "info",
        env = "FLEETGATE_LOG_LEVEL"
    )]
    pub log_level: String,

    // Utility options
    #[arg(
        long,
        help = "List all environment variables and exit",
        action = clap::ArgAction::SetTrue
    )]
    pub list_env_vars: bool,
}

impl Config {
    /// Build configuration from environment variables and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if any value fails [`validate`](Config::validate).
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        if args.list_env_vars {
            Self::print_env_vars();
            std::process::exit(0);
        }

        Self::from_args(args)
    }

    /// Build and validate configuration from already-parsed arguments
    pub fn from_args(args: Args) -> Result<Self> {
        let config = Config {
            http: HttpConfig {
                host: args.http_host,
                port: args.http_port,
            },
            limits: LimitsConfig {
                strict: PolicyConfig {
                    max: args.strict_max,
                    window_ms: args.strict_window_ms,
                },
                standard: PolicyConfig {
                    max: args.standard_max,
                    window_ms: args.standard_window_ms,
                },
                lenient: PolicyConfig {
                    max: args.lenient_max,
                    window_ms: args.lenient_window_ms,
                },
                message: args.rate_limit_message,
            },
            keys: KeyConfig {
                fallback_key: args.fallback_key,
                trust_forwarded_for: args.trust_forwarded_for,
            },
            store: StoreConfig {
                counter_capacity: args.counter_capacity,
                cache_capacity: args.cache_capacity,
                sweep_interval: args.sweep_interval,
            },
            log_level: args.log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check every setting that would otherwise fail at request time
    pub fn validate(&self) -> Result<()> {
        self.policies()?;

        if self.store.sweep_interval == 0 || self.store.sweep_interval > MAX_SWEEP_INTERVAL_SECS {
            return Err(anyhow!(
                "Sweep interval must be between 1 and {} seconds, got {}",
                MAX_SWEEP_INTERVAL_SECS,
                self.store.sweep_interval
            ));
        }

        if self.keys.fallback_key.trim().is_empty() {
            return Err(anyhow!("Fallback key must not be empty"));
        }

        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(anyhow!(
                "Invalid log level: {}. Valid options are: {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        Ok(())
    }

    /// Build the core policies, applying the shared message override
    pub fn policies(&self) -> Result<Policies> {
        let build = |name: &str, preset: Policy, cfg: PolicyConfig| -> Result<Policy> {
            if cfg.window_ms > MAX_WINDOW_MS {
                return Err(anyhow!(
                    "Invalid {name} policy: window of {}ms exceeds the {}ms maximum",
                    cfg.window_ms,
                    MAX_WINDOW_MS
                ));
            }
            let policy = Policy::from_millis(name, cfg.max, cfg.window_ms)
                .with_context(|| format!("Invalid {name} policy"))?
                .with_message(preset.message());
            Ok(match &self.limits.message {
                Some(message) => policy.with_message(message.as_str()),
                None => policy,
            })
        };

        Ok(Policies {
            strict: build("strict", Policy::strict(), self.limits.strict)?,
            standard: build("standard", Policy::standard(), self.limits.standard)?,
            lenient: build("lenient", Policy::lenient(), self.limits.lenient)?,
        })
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.store.sweep_interval)
    }

    fn print_env_vars() {
        println!("Fleetgate Environment Variables");
        println!("===============================");
        println!();
        println!("All environment variables use the FLEETGATE_ prefix.");
        println!("CLI arguments take precedence over environment variables.");
        println!();

        println!("Transport Configuration:");
        println!("  FLEETGATE_HTTP_HOST=<host>              HTTP host [default: 127.0.0.1]");
        println!("  FLEETGATE_HTTP_PORT=<port>              HTTP port [default: 8080]");
        println!();

        println!("Policy Configuration:");
        println!("  FLEETGATE_STRICT_MAX=<n>                Auth requests per window [default: 5]");
        println!("  FLEETGATE_STRICT_WINDOW_MS=<ms>         Auth window [default: 900000]");
        println!(
            "  FLEETGATE_STANDARD_MAX=<n>              API requests per window [default: 100]"
        );
        println!("  FLEETGATE_STANDARD_WINDOW_MS=<ms>       API window [default: 900000]");
        println!(
            "  FLEETGATE_LENIENT_MAX=<n>               Public requests per window [default: 200]"
        );
        println!("  FLEETGATE_LENIENT_WINDOW_MS=<ms>        Public window [default: 900000]");
        println!("  FLEETGATE_RATE_LIMIT_MESSAGE=<text>     Message returned with 429 responses");
        println!();

        println!("Caller Identification:");
        println!(
            "  FLEETGATE_FALLBACK_KEY=<key>            Bucket for unidentified callers [default: unknown]"
        );
        println!("  FLEETGATE_TRUST_FORWARDED_FOR=<bool>    Use X-Forwarded-For [default: true]");
        println!();

        println!("Store Configuration:");
        println!(
            "  FLEETGATE_COUNTER_CAPACITY=<size>       Counter store capacity [default: 10000]"
        );
        println!("  FLEETGATE_CACHE_CAPACITY=<size>         Cache capacity [default: 10000]");
        println!("  FLEETGATE_SWEEP_INTERVAL=<secs>         Sweep interval [default: 60]");
        println!();

        println!("General Configuration:");
        println!(
            "  FLEETGATE_LOG_LEVEL=<level>             Log level: error, warn, info, debug, trace [default: info]"
        );
    }
}
