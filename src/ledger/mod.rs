//! Ledger model and the interface to the ledger network.
//!
//! The coordination engine only needs two things from the ledger: the signer
//! configuration of an account, and a way to hand over a signed envelope.

pub mod horizon;
pub mod memory;
pub mod transaction;
pub mod types;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ConstellationResult;

pub use horizon::HorizonLedger;
pub use memory::MemoryLedger;
pub use transaction::{
    Asset, NetworkId, Operation, OperationBody, SetOptions, SignerSpec, Transaction,
    TransactionEnvelope,
};
pub use types::{AccountId, DecoratedSignature, Keypair, SignatureHint, TxHash};

/// Account thresholds. Zero means the level is not enforced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: u32,
    pub medium: u32,
    pub high: u32,
}

/// One signer configured on an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSigner {
    pub account: AccountId,
    pub weight: u32,
}

/// Signer configuration of an account, as read at the start of a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account: AccountId,
    pub thresholds: Thresholds,
    pub signers: Vec<AccountSigner>,
}

/// Result of a successful ledger submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger: Option<u64>,
}

/// Access to the ledger network.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Load the thresholds and signers of `account`.
    ///
    /// Unknown accounts yield `AccountNotFound`.
    async fn get_account(&self, account: &AccountId) -> ConstellationResult<AccountSnapshot>;

    /// Submit a fully signed envelope. No retries are attempted.
    async fn submit_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> ConstellationResult<SubmitOutcome>;
}
