//! Middleware for the coordination service.
//!
//! Provides cross-cutting concerns like authentication and rate limiting
//! that apply across multiple routes.

pub mod auth;
pub mod rate_limit;

pub use auth::InternalAuth;
pub use rate_limit::{RateLimitConfig, RateLimiter, general_limiter, proposal_limiter};
