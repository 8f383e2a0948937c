//! Constellation coordination server.
//!
//! Accepts transaction proposals and signatures over HTTP, pushes signing
//! requests and progress to participants over Server-Sent Events, and submits
//! transactions to the ledger once every required account is satisfied.
//!
//! ## Security
//!
//! - Authenticates callers via `INTERNAL_SERVICE_TOKEN` when configured
//! - Verifies every signature against the ledger's signer configuration
//! - Rate limits all endpoints, with a tighter budget for proposals

use std::sync::Arc;

use actix_governor::Governor;
use actix_web::{App, HttpServer, middleware, web};
use constellation::{
    config::Settings,
    coordination::{Coordinator, spawn_expiry_sweeper},
    ledger::{HorizonLedger, NetworkId},
    middleware::{InternalAuth, RateLimitConfig, general_limiter, proposal_limiter},
    pubsub::{Broadcaster, EventBus},
    routes,
    storage::Storage,
    telemetry,
};
use tracing_actix_web::TracingLogger;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Initialize tracing first
    if let Err(message) = telemetry::init_tracing() {
        eprintln!("{message}");
        std::process::exit(1);
    }

    // Load and validate settings
    let settings = Settings::from_env();
    if let Err(message) = settings.validate() {
        tracing::error!("{message}");
        std::process::exit(1);
    }

    // Initialize storage
    let storage = match Storage::open(settings.db_path()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Failed to open storage database");
            std::process::exit(1);
        }
    };

    let ledger = match HorizonLedger::new(settings.ledger_url(), settings.request_timeout()) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create ledger client");
            std::process::exit(1);
        }
    };

    let broadcaster = Broadcaster::new(EventBus::new(settings.event_buffer()));
    let coordinator = Arc::new(Coordinator::new(
        storage,
        Arc::new(ledger),
        broadcaster,
        NetworkId::new(settings.network_passphrase()),
        settings.pending_ttl(),
    ));
    let sweeper = spawn_expiry_sweeper(Arc::clone(&coordinator), settings.sweep_interval());

    // Load rate limit configuration from environment
    let rate_config = RateLimitConfig::from_env();
    let (general, proposals) = match (
        general_limiter(&rate_config),
        proposal_limiter(&rate_config),
    ) {
        (Ok(general), Ok(proposals)) => (general, proposals),
        (Err(e), _) | (_, Err(e)) => {
            tracing::error!(error = %e, "Failed to configure rate limiting");
            std::process::exit(1);
        }
    };
    tracing::info!(
        per_second = rate_config.per_second,
        burst = rate_config.burst,
        proposals_per_minute = rate_config.proposals_per_minute,
        "Rate limiting enabled"
    );

    let addr = settings.socket_addr();
    tracing::info!(
        addr = %addr,
        ledger_url = settings.ledger_url(),
        network = settings.network_passphrase(),
        auth_required = settings.internal_token().is_some(),
        "Starting Constellation"
    );

    let body_limit = settings.body_limit_bytes();
    let settings_data = web::Data::new(settings);
    let coordinator_data = web::Data::from(coordinator);

    HttpServer::new(move || {
        App::new()
            // Rate limiting (applied first)
            .wrap(Governor::new(&general))
            // Authentication
            .wrap(InternalAuth::new(&settings_data))
            // Request tracing
            .wrap(TracingLogger::default())
            // Default headers
            .wrap(middleware::DefaultHeaders::new().add(("X-Service", "constellation")))
            // Shared state
            .app_data(settings_data.clone())
            .app_data(coordinator_data.clone())
            .app_data(routes::json_config(body_limit))
            // Routes
            .configure(routes::health::configure)
            .configure(routes::transactions::configure_limited(proposals.clone()))
            .configure(routes::events::configure)
    })
    .bind(addr)?
    .run()
    .await?;

    sweeper.abort();

    // Shutdown tracing
    telemetry::shutdown_tracing();

    Ok(())
}
