//! Pending transaction state: signer directory, progress and collected signatures.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::coordination::policy::{CategorySet, required_threshold};
use crate::coordination::verifier::verify_batch;
use crate::error::{ConstellationError, ConstellationResult};
use crate::ledger::{
    AccountId, AccountSnapshot, DecoratedSignature, SignatureHint, TransactionEnvelope, TxHash,
};

/// Coordination status of a pending transaction.
///
/// A submitted transaction has no status: its record is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinationStatus {
    /// Waiting for more signature weight.
    Collecting,
    /// Every required account is satisfied; awaiting (re)submission.
    Authorized,
}

impl std::fmt::Display for CoordinationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Collecting => write!(f, "collecting"),
            Self::Authorized => write!(f, "authorized"),
        }
    }
}

/// Weight collected for one required account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub threshold: u32,
    pub weight: u32,
}

impl Progress {
    pub fn is_satisfied(&self) -> bool {
        self.weight >= self.threshold
    }
}

/// Weight one signer brings to one required account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub account: AccountId,
    pub weight: u32,
}

/// Result of applying a signature batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Signers whose weight was counted by this batch.
    pub accepted: Vec<AccountId>,
    /// Signers that had already been counted.
    pub duplicates: Vec<AccountId>,
    pub authorized: bool,
}

/// A transaction collecting signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub hash: TxHash,
    /// The proposed envelope in wire form.
    pub txenv: String,
    #[serde(default)]
    pub message: Option<String>,
    pub status: CoordinationStatus,
    /// Candidate signers per hint, in registration order.
    pub address_by_hint: BTreeMap<SignatureHint, Vec<AccountId>>,
    pub sources: BTreeMap<AccountId, Vec<Contribution>>,
    pub progress: BTreeMap<AccountId, Progress>,
    pub signatures: Vec<DecoratedSignature>,
    pub accepted_signers: BTreeSet<AccountId>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingTransaction {
    /// Build the initial state from the required accounts and their snapshots.
    ///
    /// Every account in `categories` must have a snapshot.
    pub fn initialize(
        hash: TxHash,
        txenv: String,
        message: Option<String>,
        categories: &BTreeMap<AccountId, CategorySet>,
        snapshots: &[AccountSnapshot],
        ttl: Duration,
    ) -> ConstellationResult<Self> {
        let mut address_by_hint: BTreeMap<SignatureHint, Vec<AccountId>> = BTreeMap::new();
        let mut sources: BTreeMap<AccountId, Vec<Contribution>> = BTreeMap::new();
        let mut progress = BTreeMap::new();

        for (account, set) in categories {
            let snapshot = snapshots
                .iter()
                .find(|s| s.account == *account)
                .ok_or_else(|| ConstellationError::AccountNotFound(account.to_string()))?;

            progress.insert(
                *account,
                Progress {
                    threshold: required_threshold(*set, &snapshot.thresholds),
                    weight: 0,
                },
            );

            for signer in &snapshot.signers {
                sources.entry(signer.account).or_default().push(Contribution {
                    account: *account,
                    weight: signer.weight,
                });

                let candidates = address_by_hint.entry(signer.account.hint()).or_default();
                if !candidates.contains(&signer.account) {
                    candidates.push(signer.account);
                }
            }
        }

        let now = Utc::now();
        Ok(Self {
            hash,
            txenv,
            message,
            status: CoordinationStatus::Collecting,
            address_by_hint,
            sources,
            progress,
            signatures: Vec::new(),
            accepted_signers: BTreeSet::new(),
            created_at: now,
            expires_at: now + ttl,
        })
    }

    /// Verify and apply a batch of signatures.
    ///
    /// The batch is verified as a whole first; if any signature fails, the
    /// state is left untouched. Signers already counted are reported as
    /// duplicates and change nothing.
    pub fn apply(&mut self, signatures: &[DecoratedSignature]) -> ConstellationResult<ApplyOutcome> {
        let signers = verify_batch(&self.address_by_hint, &self.hash, signatures)?;

        let mut outcome = ApplyOutcome::default();
        for (signer, signature) in signers.into_iter().zip(signatures) {
            if !self.accepted_signers.insert(signer) {
                outcome.duplicates.push(signer);
                continue;
            }

            for contribution in self.sources.get(&signer).into_iter().flatten() {
                if let Some(entry) = self.progress.get_mut(&contribution.account) {
                    entry.weight = entry.weight.saturating_add(contribution.weight);
                }
            }
            self.signatures.push(signature.clone());
            outcome.accepted.push(signer);
        }

        if self.is_authorized() {
            self.status = CoordinationStatus::Authorized;
        }
        outcome.authorized = self.status == CoordinationStatus::Authorized;
        Ok(outcome)
    }

    /// Whether every required account has reached its threshold.
    pub fn is_authorized(&self) -> bool {
        self.progress.values().all(Progress::is_satisfied)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Addresses that hear about this transaction: every signer and every required account.
    pub fn interested_addresses(&self) -> BTreeSet<AccountId> {
        self.sources
            .keys()
            .chain(self.progress.keys())
            .copied()
            .collect()
    }

    /// The proposed envelope carrying exactly the collected signatures.
    pub fn signed_envelope(&self) -> ConstellationResult<TransactionEnvelope> {
        Ok(TransactionEnvelope::from_base64(&self.txenv)?.with_signatures(self.signatures.clone()))
    }
}
