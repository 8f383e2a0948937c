//! Hands authorized transactions to the ledger.

use std::sync::Arc;

use crate::coordination::state::PendingTransaction;
use crate::error::ConstellationResult;
use crate::ledger::{Ledger, SubmitOutcome};

/// Submission gateway. Attempts each submission exactly once.
#[derive(Clone)]
pub struct SubmissionGateway {
    ledger: Arc<dyn Ledger>,
}

impl SubmissionGateway {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Submit the proposed envelope with exactly the collected signatures.
    #[tracing::instrument(skip_all, fields(hash = %pending.hash, signatures = pending.signatures.len()))]
    pub async fn submit(&self, pending: &PendingTransaction) -> ConstellationResult<SubmitOutcome> {
        let envelope = pending.signed_envelope()?;
        match self.ledger.submit_transaction(&envelope).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                tracing::warn!(error = %err, "Ledger submission failed");
                Err(err)
            }
        }
    }
}
