//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables, falling back to
//! defaults and warning when a value cannot be parsed.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;
use url::Url;

use crate::mail::DEFAULT_MAX_FIELD_LENGTH;
use crate::queue::{QueueNames, DONE_QUEUE, IN_FLIGHT_QUEUE, PENDING_QUEUE, RECORDS_KEY};
use crate::worker::Intervals;

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
const DEFAULT_DATABASE_URL: &str = "sqlite://data/messages.db";
const DEFAULT_MAIL_API_BASE: &str = "https://gmail.googleapis.com/";
const DEFAULT_MAIL_API_USER: &str = "me";
const DEFAULT_IDLE_MS: u64 = 3000;
const DEFAULT_ACTIVE_MS: u64 = 1000;
const DEFAULT_SEND_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PORT: u16 = 8080;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL for the queue backend
    pub redis_url: String,

    /// Names of the three lists and the record hash
    pub queues: QueueNames,

    /// Sender reschedule delays
    pub send_intervals: Intervals,

    /// Finalizer reschedule delays
    pub finalize_intervals: Intervals,

    /// Requeue in-flight entries when the sender starts
    pub recover_in_flight: bool,

    /// Maximum characters per submitted field
    pub max_field_length: usize,

    /// Durable record store URL (sqlx SQLite)
    pub database_url: String,

    // =========================================================================
    // Mail API
    // =========================================================================

    /// Base URL of the mail API, checked to parse
    pub mail_api_base: String,

    /// Mail API user id
    pub mail_api_user: String,

    /// Bearer token for the mail API
    pub mail_api_token: Option<String>,

    /// Outbound send timeout in milliseconds
    pub send_timeout_ms: u64,

    // =========================================================================
    // Web Server
    // =========================================================================

    /// Port for the intake server to listen on
    pub port: u16,
}

impl Default for Config {
    /// Built-in defaults, independent of the environment.
    fn default() -> Self {
        let intervals = Intervals::new(
            Duration::from_millis(DEFAULT_IDLE_MS),
            Duration::from_millis(DEFAULT_ACTIVE_MS),
        );
        Config {
            redis_url: DEFAULT_REDIS_URL.to_string(),
            queues: QueueNames::default(),
            send_intervals: intervals,
            finalize_intervals: intervals,
            recover_in_flight: true,
            max_field_length: DEFAULT_MAX_FIELD_LENGTH,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            mail_api_base: DEFAULT_MAIL_API_BASE.to_string(),
            mail_api_user: DEFAULT_MAIL_API_USER.to_string(),
            mail_api_token: None,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),

            queues: QueueNames {
                pending: env::var("QUEUE_PENDING").unwrap_or_else(|_| PENDING_QUEUE.to_string()),
                in_flight: env::var("QUEUE_IN_FLIGHT")
                    .unwrap_or_else(|_| IN_FLIGHT_QUEUE.to_string()),
                done: env::var("QUEUE_DONE").unwrap_or_else(|_| DONE_QUEUE.to_string()),
                records: env::var("QUEUE_RECORDS").unwrap_or_else(|_| RECORDS_KEY.to_string()),
            },

            send_intervals: Intervals::new(
                parse_millis("QUEUE_IDLE_INTERVAL_MS", DEFAULT_IDLE_MS),
                parse_millis("QUEUE_ACTIVE_INTERVAL_MS", DEFAULT_ACTIVE_MS),
            ),

            finalize_intervals: Intervals::new(
                parse_millis("FINALIZE_IDLE_INTERVAL_MS", DEFAULT_IDLE_MS),
                parse_millis("FINALIZE_ACTIVE_INTERVAL_MS", DEFAULT_ACTIVE_MS),
            ),

            recover_in_flight: parse_bool("RECOVER_IN_FLIGHT", true),

            max_field_length: parse_or("MAX_FIELD_LENGTH", DEFAULT_MAX_FIELD_LENGTH),

            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),

            mail_api_base: parse_url("MAIL_API_BASE_URL", DEFAULT_MAIL_API_BASE),

            mail_api_user: env::var("MAIL_API_USER")
                .unwrap_or_else(|_| DEFAULT_MAIL_API_USER.to_string()),

            mail_api_token: env::var("MAIL_API_TOKEN").ok().filter(|t| !t.is_empty()),

            send_timeout_ms: parse_or("SEND_TIMEOUT_MS", DEFAULT_SEND_TIMEOUT_MS),

            port: parse_or("PORT", DEFAULT_PORT),
        }
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Parse a variable, warning and falling back to `default` when malformed.
fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(env_var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

/// Parse a millisecond interval; zero is rejected.
fn parse_millis(name: &str, default_ms: u64) -> Duration {
    let ms = parse_or(name, default_ms);
    if ms == 0 {
        warn!(env_var = name, "Interval must be positive, using default");
        return Duration::from_millis(default_ms);
    }
    Duration::from_millis(ms)
}

fn parse_bool(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(env_var = name, value = %raw, "Invalid boolean, using default");
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_url(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(raw) => match Url::parse(raw.trim()) {
            Ok(url) => url.to_string(),
            Err(e) => {
                warn!(env_var = name, value = %raw, error = %e, "Invalid URL, using default");
                default.to_string()
            }
        },
        Err(_) => default.to_string(),
    }
}
