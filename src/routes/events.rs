//! Server-Sent Events stream of signing events for one address.
//!
//! Frames follow the `text/event-stream` format:
//!
//! ```text
//! event: progress
//! data: {"command":"progress","hash":"…","progress":{…}}
//!
//! ```
//!
//! A comment line is sent every keep-alive interval so proxies keep the
//! connection open. The subscription ends when the client disconnects.

use std::convert::Infallible;

use actix_web::{HttpResponse, web, web::Bytes};
use futures_util::stream;
use tokio::time::{Interval, MissedTickBehavior};

use crate::config::Settings;
use crate::coordination::Coordinator;
use crate::ledger::AccountId;
use crate::pubsub::{SigningEvent, Subscription};
use crate::routes::failure;

const KEEPALIVE_FRAME: &[u8] = b": keepalive\n\n";

/// Encode one event as an SSE frame.
pub fn encode_event(event: &SigningEvent) -> Bytes {
    match serde_json::to_string(event) {
        Ok(json) => Bytes::from(format!("event: {}\ndata: {json}\n\n", event.name())),
        Err(e) => {
            tracing::error!(error = %e, hash = %event.hash(), "Failed to encode signing event");
            Bytes::from_static(KEEPALIVE_FRAME)
        }
    }
}

async fn next_frame(
    (mut subscription, mut keepalive): (Subscription<SigningEvent>, Interval),
) -> Option<(Result<Bytes, Infallible>, (Subscription<SigningEvent>, Interval))> {
    let frame = tokio::select! {
        event = subscription.recv() => encode_event(&event?),
        _ = keepalive.tick() => Bytes::from_static(KEEPALIVE_FRAME),
    };
    Some((Ok(frame), (subscription, keepalive)))
}

/// GET /events/{address}
///
/// Stream `request` and `progress` events addressed to `address`.
#[tracing::instrument(skip(coordinator, settings))]
pub async fn subscribe(
    coordinator: web::Data<Coordinator>,
    settings: web::Data<Settings>,
    address: web::Path<String>,
) -> HttpResponse {
    let address: AccountId = match address.parse() {
        Ok(address) => address,
        Err(e) => return failure(&e, "Event subscription"),
    };

    let subscription = coordinator
        .broadcaster()
        .bus()
        .subscribe(&address.to_string());
    tracing::info!(%address, "Event stream opened");

    // The first tick fires immediately, flushing headers to the client.
    let mut keepalive = tokio::time::interval(settings.keepalive_interval());
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(stream::unfold((subscription, keepalive), next_frame))
}

/// Configure event routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/events/{address}", web::get().to(subscribe));
}
