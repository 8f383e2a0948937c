//! Coordinator logic for signature collection and submission.
//!
//! The coordinator never holds keys. It:
//! - Derives the required accounts and thresholds of a proposed transaction
//! - Verifies offered signatures and accumulates their weight
//! - Notifies signers and required accounts of requests and progress
//! - Submits the transaction once every required account is satisfied
//!
//! Every read-modify-write of a pending record runs under that record's hash
//! lock. Ledger submission happens after the lock is released.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use tokio::task::JoinHandle;

use crate::coordination::locks::HashLocks;
use crate::coordination::policy::source_categories;
use crate::coordination::state::{ApplyOutcome, CoordinationStatus, PendingTransaction};
use crate::coordination::submission::SubmissionGateway;
use crate::coordination::types::{
    SubmitSignatureRequest, SubmitTransactionRequest, TransactionResponse, TransactionStatus,
};
use crate::error::{ConstellationError, ConstellationResult};
use crate::ledger::{DecoratedSignature, Ledger, NetworkId, TransactionEnvelope, TxHash};
use crate::pubsub::Broadcaster;
use crate::storage::Storage;

/// Default lifetime of a pending transaction.
pub const DEFAULT_PENDING_TTL_SECS: u64 = 24 * 60 * 60;

/// Coordinator service for multi-signature collection.
pub struct Coordinator {
    storage: Storage,
    ledger: Arc<dyn Ledger>,
    gateway: SubmissionGateway,
    broadcaster: Broadcaster,
    network: NetworkId,
    locks: HashLocks,
    pending_ttl: chrono::Duration,
}

impl Coordinator {
    pub fn new(
        storage: Storage,
        ledger: Arc<dyn Ledger>,
        broadcaster: Broadcaster,
        network: NetworkId,
        pending_ttl: Duration,
    ) -> Self {
        let pending_ttl = chrono::Duration::from_std(pending_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(DEFAULT_PENDING_TTL_SECS as i64));

        Self {
            storage,
            gateway: SubmissionGateway::new(Arc::clone(&ledger)),
            ledger,
            broadcaster,
            network,
            locks: HashLocks::new(),
            pending_ttl,
        }
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn network(&self) -> &NetworkId {
        &self.network
    }

    /// Propose a transaction.
    ///
    /// Signatures already attached to the envelope are applied right away. If
    /// they satisfy every required account the transaction is submitted
    /// immediately; otherwise a signing request goes out to everyone involved.
    /// Proposing a transaction that is already pending merges its signatures
    /// into the existing record.
    #[tracing::instrument(skip_all)]
    pub async fn submit(
        &self,
        request: SubmitTransactionRequest,
    ) -> ConstellationResult<TransactionResponse> {
        let envelope = TransactionEnvelope::from_base64(&request.txenv)?;
        if envelope.tx.operations.is_empty() {
            return Err(ConstellationError::InvalidInput(
                "Transaction has no operations".to_string(),
            ));
        }
        let hash = envelope.tx.hash(&self.network)?;

        let guard = self.locks.acquire(hash).await;

        if let Some(mut pending) = self.storage.get_pending(&hash)? {
            if !pending.is_expired() {
                Self::ensure_collecting(&pending)?;
                let outcome = self.apply_and_publish(&mut pending, &envelope.signatures)?;
                tracing::info!(
                    %hash,
                    accepted = outcome.accepted.len(),
                    "Merged signatures into pending transaction"
                );
                drop(guard);
                return self.respond(pending, outcome).await;
            }
            tracing::info!(%hash, "Replacing expired pending transaction");
        }

        let categories = source_categories(&envelope.tx);
        let snapshots = try_join_all(
            categories
                .keys()
                .map(|account| self.ledger.get_account(account)),
        )
        .await?;

        let mut pending = PendingTransaction::initialize(
            hash,
            request.txenv,
            request.msg,
            &categories,
            &snapshots,
            self.pending_ttl,
        )?;

        let outcome = if envelope.signatures.is_empty() {
            ApplyOutcome::default()
        } else {
            pending.apply(&envelope.signatures)?
        };
        self.storage.put_pending(&pending)?;

        tracing::info!(
            %hash,
            required_accounts = pending.progress.len(),
            signers = pending.sources.len(),
            authorized = outcome.authorized,
            "Transaction proposed"
        );

        if !outcome.authorized {
            self.broadcaster.request(&pending);
        }
        drop(guard);

        self.respond(pending, outcome).await
    }

    /// Offer signatures for a pending transaction.
    #[tracing::instrument(skip_all, fields(%hash))]
    pub async fn sign(
        &self,
        hash: TxHash,
        request: SubmitSignatureRequest,
    ) -> ConstellationResult<TransactionResponse> {
        let signatures = request
            .sig
            .into_vec()
            .into_iter()
            .map(|sig| DecoratedSignature::from_base64(&sig))
            .collect::<ConstellationResult<Vec<_>>>()?;
        if signatures.is_empty() {
            return Err(ConstellationError::InvalidInput(
                "At least one signature is required".to_string(),
            ));
        }

        let guard = self.locks.acquire(hash).await;

        let mut pending = self.load(&hash)?;
        if pending.is_expired() {
            return Err(ConstellationError::TransactionExpired(hash.to_string()));
        }
        Self::ensure_collecting(&pending)?;

        let outcome = self.apply_and_publish(&mut pending, &signatures)?;
        tracing::info!(
            accepted = outcome.accepted.len(),
            duplicates = outcome.duplicates.len(),
            authorized = outcome.authorized,
            "Signatures applied"
        );
        drop(guard);

        self.respond(pending, outcome).await
    }

    /// Current record of a pending transaction.
    #[allow(clippy::unused_async)]
    pub async fn status(&self, hash: TxHash) -> ConstellationResult<PendingTransaction> {
        self.load(&hash)
    }

    /// Retry submission of an authorized transaction.
    #[tracing::instrument(skip_all, fields(%hash))]
    pub async fn resubmit(&self, hash: TxHash) -> ConstellationResult<TransactionResponse> {
        let guard = self.locks.acquire(hash).await;
        let pending = self.load(&hash)?;
        if pending.status != CoordinationStatus::Authorized {
            return Err(ConstellationError::InvalidTransactionState {
                expected: CoordinationStatus::Authorized.to_string(),
                actual: pending.status.to_string(),
            });
        }
        drop(guard);

        self.respond(pending, ApplyOutcome::default()).await
    }

    /// Drop a pending transaction.
    #[tracing::instrument(skip_all, fields(%hash))]
    pub async fn cancel(&self, hash: TxHash) -> ConstellationResult<()> {
        let _guard = self.locks.acquire(hash).await;
        if !self.storage.delete_pending(&hash)? {
            return Err(ConstellationError::TransactionNotFound(hash.to_string()));
        }
        tracing::info!("Pending transaction cancelled");
        Ok(())
    }

    /// Delete every expired pending transaction. Returns how many were removed.
    pub async fn purge_expired(&self) -> ConstellationResult<usize> {
        let mut purged = 0;
        for candidate in self.storage.list_pending()? {
            if !candidate.is_expired() {
                continue;
            }

            let _guard = self.locks.acquire(candidate.hash).await;
            // Re-check under the lock: the record may have been replaced meanwhile.
            let still_expired = self
                .storage
                .get_pending(&candidate.hash)?
                .is_some_and(|pending| pending.is_expired());
            if still_expired && self.storage.delete_pending(&candidate.hash)? {
                tracing::info!(hash = %candidate.hash, "Expired pending transaction removed");
                purged += 1;
            }
        }
        Ok(purged)
    }

    fn load(&self, hash: &TxHash) -> ConstellationResult<PendingTransaction> {
        self.storage
            .get_pending(hash)?
            .ok_or_else(|| ConstellationError::TransactionNotFound(hash.to_string()))
    }

    fn ensure_collecting(pending: &PendingTransaction) -> ConstellationResult<()> {
        if pending.status != CoordinationStatus::Collecting {
            return Err(ConstellationError::InvalidTransactionState {
                expected: CoordinationStatus::Collecting.to_string(),
                actual: pending.status.to_string(),
            });
        }
        Ok(())
    }

    /// Apply, persist and announce. Must run under the hash lock.
    fn apply_and_publish(
        &self,
        pending: &mut PendingTransaction,
        signatures: &[DecoratedSignature],
    ) -> ConstellationResult<ApplyOutcome> {
        let outcome = pending.apply(signatures)?;
        self.storage.put_pending(pending)?;
        self.broadcaster.progress(pending);
        Ok(outcome)
    }

    /// Build the response, submitting first if the transaction is authorized.
    async fn respond(
        &self,
        pending: PendingTransaction,
        outcome: ApplyOutcome,
    ) -> ConstellationResult<TransactionResponse> {
        let mut response = TransactionResponse {
            hash: pending.hash,
            status: TransactionStatus::Pending,
            progress: pending.progress.clone(),
            accepted: outcome.accepted,
            duplicates: outcome.duplicates,
            outcome: None,
        };

        if pending.status == CoordinationStatus::Authorized {
            let submitted = self.gateway.submit(&pending).await?;
            {
                let _guard = self.locks.acquire(pending.hash).await;
                self.storage.delete_pending(&pending.hash)?;
            }
            tracing::info!(hash = %pending.hash, ledger_hash = %submitted.hash, "Transaction submitted");
            response.status = TransactionStatus::Submitted;
            response.outcome = Some(submitted);
        }

        Ok(response)
    }
}

/// Periodically remove expired pending transactions.
pub fn spawn_expiry_sweeper(coordinator: Arc<Coordinator>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            match coordinator.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "Expiry sweep finished"),
                Err(err) => tracing::error!(error = %err, "Expiry sweep failed"),
            }
        }
    })
}
