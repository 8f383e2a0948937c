//! Service configuration derived from environment variables.
//!
//! Configuration is loaded once at startup and validated before the service starts.
//!
//! ## Environment Variables
//!
//! ### Server
//! - `CONSTELLATION_HOST`: Bind address (default: :: for dual-stack IPv4/IPv6)
//! - `CONSTELLATION_PORT`: HTTP port (default: 4711)
//! - `CONSTELLATION_DB_PATH`: Path to ReDB database file
//! - `CONSTELLATION_REQUEST_TIMEOUT_MS`: Ledger request timeout
//! - `CONSTELLATION_BODY_LIMIT_MB`: Maximum JSON body size
//! - `INTERNAL_SERVICE_TOKEN`: Shared secret for API authentication
//! - `RUST_LOG`: Log level filter
//!
//! ### Ledger
//! - `CONSTELLATION_LEDGER_URL`: Base URL of the ledger gateway
//! - `CONSTELLATION_NETWORK_PASSPHRASE`: Network the transactions are bound to
//!
//! ### Coordination
//! - `CONSTELLATION_PENDING_TTL_SECS`: Lifetime of a pending transaction
//! - `CONSTELLATION_SWEEP_INTERVAL_SECS`: How often expired records are removed
//! - `CONSTELLATION_EVENT_BUFFER`: Per-address event buffer
//! - `CONSTELLATION_KEEPALIVE_SECS`: Event stream keep-alive interval

use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::coordination::DEFAULT_PENDING_TTL_SECS;
use crate::pubsub::DEFAULT_TOPIC_CAPACITY;

const DEFAULT_PORT: u16 = 4711;
const DEFAULT_LEDGER_URL: &str = "http://localhost:8000";
/// Passphrase of the public test network.
pub const DEFAULT_NETWORK_PASSPHRASE: &str = "Test SDF Network ; September 2015";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;
const DEFAULT_KEEPALIVE_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_BODY_LIMIT_MB: usize = 4;

/// Helper to get trimmed env var or empty string.
fn env_trim(name: &str) -> String {
    env::var(name).unwrap_or_default().trim().to_string()
}

/// Helper to get lowercase env var.
fn env_lower(name: &str) -> String {
    env_trim(name).to_lowercase()
}

/// Helper to get a non-empty env var.
fn env_opt(name: &str) -> Option<String> {
    let value = env_trim(name);
    if value.is_empty() { None } else { Some(value) }
}

/// Check if a string value is truthy.
fn is_truthy(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "yes")
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    port: u16,
    host: IpAddr,
    db_path: PathBuf,
    internal_token: Option<String>,
    internal_token_required: bool,
    request_timeout_ms: u64,
    body_limit_bytes: usize,

    ledger_url: String,
    network_passphrase: String,

    pending_ttl_secs: u64,
    sweep_interval_secs: u64,
    event_buffer: usize,
    keepalive_secs: u64,
}

impl Settings {
    /// Load settings from environment variables.
    pub fn from_env() -> Self {
        let port = env_trim("CONSTELLATION_PORT")
            .parse::<u16>()
            .unwrap_or(DEFAULT_PORT);

        // Default to IPv6 unspecified (::) for dual-stack support.
        let host = env_trim("CONSTELLATION_HOST")
            .parse::<IpAddr>()
            .unwrap_or(IpAddr::V6(Ipv6Addr::UNSPECIFIED));

        let db_path = env_opt("CONSTELLATION_DB_PATH")
            .map_or_else(|| PathBuf::from("./.data/constellation.redb"), PathBuf::from);

        let internal_token = env_opt("INTERNAL_SERVICE_TOKEN");

        // Determine if token is required based on environment
        let node_env = env_lower("NODE_ENV");
        let app_env = env_lower("APP_ENV");
        let rust_env = env_lower("RUST_ENV");
        let is_production = matches!(node_env.as_str(), "production")
            || matches!(app_env.as_str(), "production")
            || matches!(rust_env.as_str(), "production");
        let internal_token_required =
            is_production || is_truthy(&env_lower("INTERNAL_SERVICE_TOKEN_REQUIRED"));

        let request_timeout_ms = env_trim("CONSTELLATION_REQUEST_TIMEOUT_MS")
            .parse::<u64>()
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);

        let body_limit_mb = env_trim("CONSTELLATION_BODY_LIMIT_MB")
            .parse::<usize>()
            .unwrap_or(DEFAULT_BODY_LIMIT_MB);
        let body_limit_bytes = body_limit_mb.saturating_mul(1024 * 1024);

        let ledger_url =
            env_opt("CONSTELLATION_LEDGER_URL").unwrap_or_else(|| DEFAULT_LEDGER_URL.to_string());
        let network_passphrase = env_opt("CONSTELLATION_NETWORK_PASSPHRASE")
            .unwrap_or_else(|| DEFAULT_NETWORK_PASSPHRASE.to_string());

        let pending_ttl_secs = env_trim("CONSTELLATION_PENDING_TTL_SECS")
            .parse::<u64>()
            .unwrap_or(DEFAULT_PENDING_TTL_SECS);
        let sweep_interval_secs = env_trim("CONSTELLATION_SWEEP_INTERVAL_SECS")
            .parse::<u64>()
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
        let event_buffer = env_trim("CONSTELLATION_EVENT_BUFFER")
            .parse::<usize>()
            .unwrap_or(DEFAULT_TOPIC_CAPACITY);
        let keepalive_secs = env_trim("CONSTELLATION_KEEPALIVE_SECS")
            .parse::<u64>()
            .unwrap_or(DEFAULT_KEEPALIVE_SECS);

        Self {
            port,
            host,
            db_path,
            internal_token,
            internal_token_required,
            request_timeout_ms,
            body_limit_bytes,
            ledger_url,
            network_passphrase,
            pending_ttl_secs,
            sweep_interval_secs,
            event_buffer,
            keepalive_secs,
        }
    }

    /// Create settings for tests.
    pub fn for_tests() -> Self {
        Self {
            port: DEFAULT_PORT,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            db_path: PathBuf::from("./.data/test-constellation.redb"),
            internal_token: None,
            internal_token_required: false,
            request_timeout_ms: 60_000,
            body_limit_bytes: DEFAULT_BODY_LIMIT_MB * 1024 * 1024,
            ledger_url: DEFAULT_LEDGER_URL.to_string(),
            network_passphrase: DEFAULT_NETWORK_PASSPHRASE.to_string(),
            pending_ttl_secs: DEFAULT_PENDING_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            event_buffer: 16,
            keepalive_secs: 1,
        }
    }

    /// Require an internal token on every protected route.
    #[must_use]
    pub fn with_internal_token(mut self, token: &str) -> Self {
        self.internal_token = Some(token.to_string());
        self.internal_token_required = true;
        self
    }

    /// Validate settings.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.internal_token_required && self.internal_token.is_none() {
            return Err("INTERNAL_SERVICE_TOKEN is required in production. \
                 Set INTERNAL_SERVICE_TOKEN or INTERNAL_SERVICE_TOKEN_REQUIRED=0."
                .to_string());
        }

        if !(self.ledger_url.starts_with("http://") || self.ledger_url.starts_with("https://")) {
            return Err(format!(
                "CONSTELLATION_LEDGER_URL must be an http(s) URL, got '{}'",
                self.ledger_url
            ));
        }

        if self.network_passphrase.is_empty() {
            return Err("CONSTELLATION_NETWORK_PASSPHRASE must not be empty".to_string());
        }

        if self.pending_ttl_secs == 0 || self.sweep_interval_secs == 0 {
            return Err(
                "CONSTELLATION_PENDING_TTL_SECS and CONSTELLATION_SWEEP_INTERVAL_SECS must be positive"
                    .to_string(),
            );
        }

        if self.event_buffer == 0 {
            return Err("CONSTELLATION_EVENT_BUFFER must be positive".to_string());
        }

        if self.keepalive_secs == 0 {
            return Err("CONSTELLATION_KEEPALIVE_SECS must be positive".to_string());
        }

        Ok(())
    }

    // Getters

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn internal_token(&self) -> Option<&str> {
        self.internal_token.as_deref()
    }

    pub fn internal_token_required(&self) -> bool {
        self.internal_token_required
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_bytes
    }

    pub fn ledger_url(&self) -> &str {
        &self.ledger_url
    }

    pub fn network_passphrase(&self) -> &str {
        &self.network_passphrase
    }

    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn event_buffer(&self) -> usize {
        self.event_buffer
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_validation() {
        let settings = Settings::for_tests();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.port(), 4711);
        assert_eq!(settings.pending_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_required_token_must_be_present() {
        let mut settings = Settings::for_tests();
        settings.internal_token_required = true;
        assert!(settings.validate().is_err());

        let settings = Settings::for_tests().with_internal_token("secret");
        assert!(settings.validate().is_ok());
        assert_eq!(settings.internal_token(), Some("secret"));
    }

    #[test]
    fn test_ledger_url_must_be_http() {
        let mut settings = Settings::for_tests();
        settings.ledger_url = "localhost:8000".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_intervals_are_rejected() {
        let mut settings = Settings::for_tests();
        settings.keepalive_secs = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.contains("CONSTELLATION_KEEPALIVE_SECS"));

        let mut settings = Settings::for_tests();
        settings.sweep_interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::for_tests();
        settings.pending_ttl_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" yes "));
        assert!(!is_truthy("0"));
    }
}
