//! Request and response bodies of the coordination API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coordination::state::Progress;
use crate::ledger::{AccountId, SubmitOutcome, TxHash};

/// Propose a transaction for signature collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTransactionRequest {
    /// Base64 transaction envelope, possibly already carrying signatures.
    pub txenv: String,
    /// Free-form note shown to counter-signers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// A single value or a list of values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

/// Offer one or more decorated signatures (base64) for a pending transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitSignatureRequest {
    pub sig: OneOrMany<String>,
}

/// Where a transaction stands after a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Still collecting signatures (or authorized and awaiting resubmission).
    Pending,
    /// Accepted by the ledger; the pending record is gone.
    Submitted,
}

/// Response to submit, sign and resubmit requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub hash: TxHash,
    pub status: TransactionStatus,
    pub progress: BTreeMap<AccountId, Progress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accepted: Vec<AccountId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplicates: Vec<AccountId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SubmitOutcome>,
}
