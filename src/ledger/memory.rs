//! In-memory ledger for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{ConstellationError, ConstellationResult};
use crate::ledger::{
    AccountId, AccountSnapshot, Ledger, NetworkId, SubmitOutcome, TransactionEnvelope,
};

#[derive(Default)]
struct Inner {
    accounts: HashMap<AccountId, AccountSnapshot>,
    submitted: Vec<TransactionEnvelope>,
    reject_reason: Option<String>,
}

/// A ledger that keeps accounts in a map and records submissions.
///
/// Submitted envelopes are checked for a well-formed hash only; signature
/// checks are left to the coordination engine under test.
#[derive(Clone)]
pub struct MemoryLedger {
    network: NetworkId,
    inner: Arc<Mutex<Inner>>,
}

impl MemoryLedger {
    pub fn new(network: NetworkId) -> Self {
        Self {
            network,
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoned map is still consistent: every mutation is a single insert or push.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register or replace an account.
    pub fn insert_account(&self, snapshot: AccountSnapshot) {
        self.lock().accounts.insert(snapshot.account, snapshot);
    }

    /// Envelopes accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<TransactionEnvelope> {
        self.lock().submitted.clone()
    }

    /// Make every following submission fail with `reason` (or succeed again with `None`).
    pub fn set_reject_submissions(&self, reason: Option<&str>) {
        self.lock().reject_reason = reason.map(str::to_string);
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_account(&self, account: &AccountId) -> ConstellationResult<AccountSnapshot> {
        self.lock()
            .accounts
            .get(account)
            .cloned()
            .ok_or_else(|| ConstellationError::AccountNotFound(account.to_string()))
    }

    async fn submit_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> ConstellationResult<SubmitOutcome> {
        let hash = envelope.tx.hash(&self.network)?;
        let mut inner = self.lock();
        if let Some(reason) = &inner.reject_reason {
            return Err(ConstellationError::SubmissionFailed(reason.clone()));
        }
        inner.submitted.push(envelope.clone());
        Ok(SubmitOutcome {
            hash: hash.to_string(),
            ledger: Some(inner.submitted.len() as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Keypair, Thresholds, Transaction};

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let ledger = MemoryLedger::new(NetworkId::new("test"));
        let account = Keypair::from_seed([1; 32]).account_id();
        assert!(matches!(
            ledger.get_account(&account).await,
            Err(ConstellationError::AccountNotFound(_))
        ));

        ledger.insert_account(AccountSnapshot {
            account,
            thresholds: Thresholds::default(),
            signers: vec![],
        });
        assert_eq!(ledger.get_account(&account).await.unwrap().account, account);
    }

    #[tokio::test]
    async fn test_rejected_submissions_are_not_recorded() {
        let ledger = MemoryLedger::new(NetworkId::new("test"));
        let envelope = TransactionEnvelope::new(Transaction {
            source_account: Keypair::from_seed([1; 32]).account_id(),
            fee: 100,
            sequence: 1,
            memo: None,
            operations: vec![],
        });

        ledger.set_reject_submissions(Some("tx_bad_seq"));
        assert!(matches!(
            ledger.submit_transaction(&envelope).await,
            Err(ConstellationError::SubmissionFailed(_))
        ));
        assert!(ledger.submitted().is_empty());

        ledger.set_reject_submissions(None);
        let outcome = ledger.submit_transaction(&envelope).await.unwrap();
        assert_eq!(outcome.ledger, Some(1));
        assert_eq!(ledger.submitted(), vec![envelope]);
    }
}
