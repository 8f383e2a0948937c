//! Rate limiting middleware for the coordination API.
//!
//! - General limiter: a per-IP baseline applied to every route
//! - Proposal limiter: a tighter per-IP budget for `POST /transaction`, which
//!   fans out ledger lookups for every required account
//!
//! Uses actix-governor with the built-in PeerIpKeyExtractor.

use actix_governor::{GovernorConfig, GovernorConfigBuilder, PeerIpKeyExtractor};

use crate::error::{ConstellationError, ConstellationResult};

/// Configuration for rate limiting.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Sustained requests per second per IP across all routes.
    pub per_second: u64,
    /// Burst size for the general limiter.
    pub burst: u32,
    /// Sustained transaction proposals per minute per IP.
    pub proposals_per_minute: u64,
    /// Burst size for proposals.
    pub proposal_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_second: 1,
            burst: 50,
            proposals_per_minute: 30,
            proposal_burst: 10,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl RateLimitConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            per_second: env_or("RATE_LIMIT_PER_SECOND", defaults.per_second),
            burst: env_or("RATE_LIMIT_BURST", defaults.burst),
            proposals_per_minute: env_or(
                "RATE_LIMIT_PROPOSALS_PER_MINUTE",
                defaults.proposals_per_minute,
            ),
            proposal_burst: env_or("RATE_LIMIT_PROPOSAL_BURST", defaults.proposal_burst),
        }
    }
}

/// Limiter state shared by every worker.
///
/// Wrap with `actix_governor::Governor::new(&config)`; clones of one config
/// count against the same per-IP buckets.
pub type RateLimiter = GovernorConfig<PeerIpKeyExtractor, governor::middleware::NoOpMiddleware>;

/// Create the general API rate limiter.
///
/// Replenishes `per_second` requests every second (at least one), with bursts
/// up to `burst`.
pub fn general_limiter(config: &RateLimitConfig) -> ConstellationResult<RateLimiter> {
    let millis_per_request = 1000 / config.per_second.clamp(1, 1000);

    GovernorConfigBuilder::default()
        .milliseconds_per_request(millis_per_request)
        .burst_size(config.burst.max(1))
        .finish()
        .ok_or_else(|| {
            ConstellationError::Internal("Failed to build general rate limiter".to_string())
        })
}

/// Create the rate limiter for transaction proposals.
pub fn proposal_limiter(config: &RateLimitConfig) -> ConstellationResult<RateLimiter> {
    let seconds_per_request = if config.proposals_per_minute > 0 {
        (60 / config.proposals_per_minute).max(1)
    } else {
        60
    };

    GovernorConfigBuilder::default()
        .seconds_per_request(seconds_per_request)
        .burst_size(config.proposal_burst.max(1))
        .finish()
        .ok_or_else(|| {
            ConstellationError::Internal("Failed to build proposal rate limiter".to_string())
        })
}
