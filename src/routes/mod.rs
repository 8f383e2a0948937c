//! HTTP routes for the coordination service.
//!
//! Routes are organized by functionality:
//! - `health`: Health check and build info
//! - `transactions`: Proposing, signing, inspecting and cancelling transactions
//! - `events`: Per-address Server-Sent Events stream

pub mod events;
pub mod health;
pub mod transactions;

use actix_web::{HttpResponse, ResponseError, error, web};

use crate::error::ConstellationError;

pub use health::{build_info, health};

/// JSON extractor configuration: body size limit and structured 400 errors.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let message = err.to_string();
            let response = ConstellationError::InvalidInput(message).error_response();
            error::InternalError::from_response(err, response).into()
        })
}

/// Log a failed request and turn the error into its HTTP response.
pub(crate) fn failure(err: &ConstellationError, action: &str) -> HttpResponse {
    if err.status_code().is_server_error() {
        tracing::error!(error = %err, "{action} failed");
    } else {
        tracing::warn!(error = %err, "{action} rejected");
    }
    err.error_response()
}
