//! Signing request and progress notifications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coordination::state::{PendingTransaction, Progress};
use crate::ledger::{AccountId, TxHash};
use crate::pubsub::bus::EventBus;

/// Event delivered to the addresses involved in a pending transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SigningEvent {
    /// A new transaction needs signatures.
    Request {
        hash: TxHash,
        txenv: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        msg: Option<String>,
        progress: BTreeMap<AccountId, Progress>,
    },
    /// Collected weight changed.
    Progress {
        hash: TxHash,
        progress: BTreeMap<AccountId, Progress>,
    },
}

impl SigningEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Request { .. } => "request",
            Self::Progress { .. } => "progress",
        }
    }

    pub fn hash(&self) -> &TxHash {
        match self {
            Self::Request { hash, .. } | Self::Progress { hash, .. } => hash,
        }
    }
}

/// Publishes signing events on one topic per interested address.
#[derive(Clone)]
pub struct Broadcaster {
    bus: EventBus<SigningEvent>,
}

impl Broadcaster {
    pub fn new(bus: EventBus<SigningEvent>) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &EventBus<SigningEvent> {
        &self.bus
    }

    /// Announce a new pending transaction.
    pub fn request(&self, pending: &PendingTransaction) {
        self.publish(
            pending,
            SigningEvent::Request {
                hash: pending.hash,
                txenv: pending.txenv.clone(),
                msg: pending.message.clone(),
                progress: pending.progress.clone(),
            },
        );
    }

    /// Announce the current progress of a pending transaction.
    pub fn progress(&self, pending: &PendingTransaction) {
        self.publish(
            pending,
            SigningEvent::Progress {
                hash: pending.hash,
                progress: pending.progress.clone(),
            },
        );
    }

    fn publish(&self, pending: &PendingTransaction, event: SigningEvent) {
        let mut delivered = 0;
        for address in pending.interested_addresses() {
            delivered += self.bus.publish(&address.to_string(), event.clone());
        }
        tracing::debug!(
            hash = %pending.hash,
            event = event.name(),
            delivered,
            "Published signing event"
        );
    }
}
