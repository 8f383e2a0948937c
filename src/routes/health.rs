//! Health check and build info endpoints.
//!
//! These endpoints are public (no authentication required).

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// Health check response.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub network: String,
}

/// Build information response.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfoResponse {
    pub service: String,
    pub version: String,
    pub git_sha: String,
    pub build_time: String,
    pub ledger_url: String,
}

/// GET /health
///
/// Returns service health status. Used by load balancers and monitoring.
#[tracing::instrument(skip(settings))]
pub async fn health(settings: web::Data<Settings>) -> HttpResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        network: settings.network_passphrase().to_string(),
    };

    HttpResponse::Ok().json(response)
}

/// GET /build-info
///
/// Returns build metadata for deployment verification.
#[tracing::instrument(skip(settings))]
pub async fn build_info(settings: web::Data<Settings>) -> HttpResponse {
    let response = BuildInfoResponse {
        service: "constellation".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_sha: env!("GIT_SHA").to_string(),
        build_time: env!("BUILD_TIME").to_string(),
        ledger_url: settings.ledger_url().to_string(),
    };

    HttpResponse::Ok().json(response)
}

/// Configure health routes on the given scope.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/build-info", web::get().to(build_info));
}
