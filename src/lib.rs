// Crate-level lint configuration
// Allow noisy pedantic/cargo lints that aren't worth fixing individually
#![allow(clippy::multiple_crate_versions)] // Transitive deps, can't easily fix
#![allow(clippy::missing_errors_doc)] // Would require extensive doc changes
#![allow(clippy::missing_panics_doc)] // Would require extensive doc changes
#![allow(clippy::must_use_candidate)] // Too many false positives for internal APIs
#![allow(clippy::module_name_repetitions)] // Acceptable for clarity (e.g., ConstellationError in error mod)
#![allow(clippy::doc_markdown)] // Too strict about backticks in docs
#![allow(clippy::missing_const_for_fn)] // Often debatable, runtime doesn't benefit

//! Constellation
//!
//! A coordination service that collects signatures for transactions on
//! weighted-threshold multi-signature ledger accounts.
//!
//! ## Architecture
//!
//! - **Ledger** (`ledger`): transaction model, hashing, decorated signatures
//!   and the `Ledger` trait for account lookups and submission.
//! - **Coordination** (`coordination`): derives the required weight per
//!   account, verifies signature batches and tracks progress per hash.
//! - **Pub/sub** (`pubsub`): per-address topics carrying `request` and
//!   `progress` events, exposed over Server-Sent Events.
//! - **Storage** (`storage`): pending transactions persisted in redb so a
//!   restart does not lose collected signatures.
//!
//! ## Trust Model
//!
//! The service never holds keys. Every signature is checked against the
//! transaction hash and the signer set read from the ledger; a batch with a
//! single bad signature is rejected as a whole. Submission carries exactly the
//! signatures that were accepted.

pub mod client;
pub mod config;
pub mod coordination;
pub mod error;
pub mod ledger;
pub mod middleware;
pub mod pubsub;
pub mod routes;
pub mod storage;

/// Log filter used when `RUST_LOG` is unset.
pub(crate) const DEFAULT_LOG_FILTER: &str = "constellation=info,actix_web=info";

/// Whether console logs should be JSON lines (`LOG_FORMAT=json`).
pub(crate) fn json_logs() -> bool {
    std::env::var("LOG_FORMAT").is_ok_and(|v| v.trim().eq_ignore_ascii_case("json"))
}

#[cfg(feature = "otel")]
pub mod telemetry;

#[cfg(not(feature = "otel"))]
pub mod telemetry {
    //! Stub telemetry module when OpenTelemetry is disabled.

    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    /// Initialize tracing with console output only.
    pub fn init_tracing() -> Result<(), String> {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| super::DEFAULT_LOG_FILTER.into());
        let json = super::json_logs();

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json.then(|| tracing_subscriber::fmt::layer().json()))
            .with((!json).then(tracing_subscriber::fmt::layer))
            .try_init()
            .map_err(|e| format!("Failed to install tracing subscriber: {e}"))
    }

    /// No-op shutdown when OpenTelemetry is disabled.
    pub fn shutdown_tracing() {}
}

// Re-export commonly used types
pub use client::ConstellationClient;
pub use config::Settings;
pub use coordination::Coordinator;
pub use error::{ConstellationError, ConstellationResult};
pub use ledger::{HorizonLedger, Ledger, MemoryLedger, NetworkId};
pub use pubsub::{Broadcaster, EventBus, SigningEvent};
pub use storage::Storage;
