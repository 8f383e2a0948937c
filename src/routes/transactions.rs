//! Transaction coordination endpoints.

use actix_governor::Governor;
use actix_web::{HttpResponse, web};

use crate::coordination::{Coordinator, SubmitSignatureRequest, SubmitTransactionRequest};
use crate::error::ConstellationResult;
use crate::ledger::TxHash;
use crate::middleware::RateLimiter;
use crate::routes::failure;

fn parse_hash(raw: &str) -> ConstellationResult<TxHash> {
    raw.parse()
}

/// POST /transaction
///
/// Propose a transaction for signature collection.
#[tracing::instrument(skip(coordinator, request), fields(has_msg = request.msg.is_some()))]
pub async fn submit_transaction(
    coordinator: web::Data<Coordinator>,
    request: web::Json<SubmitTransactionRequest>,
) -> HttpResponse {
    match coordinator.submit(request.into_inner()).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(&e, "Transaction proposal"),
    }
}

/// PUT /transaction/{hash}
///
/// Offer one or more signatures for a pending transaction.
#[tracing::instrument(skip(coordinator, request))]
pub async fn submit_signature(
    coordinator: web::Data<Coordinator>,
    hash: web::Path<String>,
    request: web::Json<SubmitSignatureRequest>,
) -> HttpResponse {
    let result = match parse_hash(&hash) {
        Ok(hash) => coordinator.sign(hash, request.into_inner()).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(&e, "Signature submission"),
    }
}

/// GET /transaction/{hash}
///
/// Get the pending record of a transaction.
#[tracing::instrument(skip(coordinator))]
pub async fn get_transaction(
    coordinator: web::Data<Coordinator>,
    hash: web::Path<String>,
) -> HttpResponse {
    let result = match parse_hash(&hash) {
        Ok(hash) => coordinator.status(hash).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(pending) => HttpResponse::Ok().json(pending),
        Err(e) => failure(&e, "Transaction lookup"),
    }
}

/// POST /transaction/{hash}/submit
///
/// Retry ledger submission of an authorized transaction.
#[tracing::instrument(skip(coordinator))]
pub async fn resubmit_transaction(
    coordinator: web::Data<Coordinator>,
    hash: web::Path<String>,
) -> HttpResponse {
    let result = match parse_hash(&hash) {
        Ok(hash) => coordinator.resubmit(hash).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => failure(&e, "Transaction resubmission"),
    }
}

/// DELETE /transaction/{hash}
///
/// Cancel a pending transaction.
#[tracing::instrument(skip(coordinator))]
pub async fn cancel_transaction(
    coordinator: web::Data<Coordinator>,
    hash: web::Path<String>,
) -> HttpResponse {
    let result = match parse_hash(&hash) {
        Ok(hash) => coordinator.cancel(hash).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => failure(&e, "Transaction cancellation"),
    }
}

/// Configure transaction routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    register(cfg, None);
}

/// Configure transaction routes with a dedicated limiter on proposals.
pub fn configure_limited(limiter: RateLimiter) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg| register(cfg, Some(limiter))
}

fn register(cfg: &mut web::ServiceConfig, proposal_limiter: Option<RateLimiter>) {
    let propose = web::resource("").route(web::post().to(submit_transaction));
    let scope = web::scope("/transaction");
    let scope = match proposal_limiter {
        Some(limiter) => scope.service(propose.wrap(Governor::new(&limiter))),
        None => scope.service(propose),
    };

    cfg.service(
        scope
            .route("/{hash}", web::put().to(submit_signature))
            .route("/{hash}", web::get().to(get_transaction))
            .route("/{hash}", web::delete().to(cancel_transaction))
            .route("/{hash}/submit", web::post().to(resubmit_transaction)),
    );
}
