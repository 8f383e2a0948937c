//! Transaction model, envelope encoding and network hashing.
//!
//! The wire form of an envelope (`txenv`) is base64 of its JSON encoding.
//! The signed payload is `sha256(network_id || "tx" || json(tx))`, where the
//! network id is the sha256 of the network passphrase.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ConstellationError, ConstellationResult};
use crate::ledger::types::{AccountId, DecoratedSignature, TxHash};

/// Domain tag mixed into every transaction hash.
const TX_HASH_TAG: &[u8] = b"tx";

/// Network the transactions are bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkId {
    passphrase: String,
    id: [u8; 32],
}

impl NetworkId {
    pub fn new(passphrase: &str) -> Self {
        Self {
            passphrase: passphrase.to_string(),
            id: Sha256::digest(passphrase.as_bytes()).into(),
        }
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    pub fn id(&self) -> &[u8; 32] {
        &self.id
    }
}

/// An asset held or transferred on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Asset {
    Native,
    Credit { code: String, issuer: AccountId },
}

/// A signer entry as carried by a `set_options` operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerSpec {
    pub key: AccountId,
    pub weight: u32,
}

/// Account option changes. Only the fields that are `Some` are modified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetOptions {
    #[serde(default)]
    pub master_weight: Option<u32>,
    #[serde(default)]
    pub low_threshold: Option<u32>,
    #[serde(default)]
    pub med_threshold: Option<u32>,
    #[serde(default)]
    pub high_threshold: Option<u32>,
    #[serde(default)]
    pub signer: Option<SignerSpec>,
    #[serde(default)]
    pub set_flags: Option<u32>,
    #[serde(default)]
    pub clear_flags: Option<u32>,
    #[serde(default)]
    pub home_domain: Option<String>,
}

impl SetOptions {
    /// Whether this change touches signer weights or threshold settings.
    pub fn changes_authorization(&self) -> bool {
        self.master_weight.is_some()
            || self.low_threshold.is_some()
            || self.med_threshold.is_some()
            || self.high_threshold.is_some()
            || self.signer.is_some()
    }
}

/// Operation payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationBody {
    CreateAccount {
        destination: AccountId,
        starting_balance: i64,
    },
    Payment {
        destination: AccountId,
        asset: Asset,
        amount: i64,
    },
    ChangeTrust {
        asset: Asset,
        #[serde(default)]
        limit: Option<i64>,
    },
    /// The issuer authorizing (or revoking) a holder's trustline.
    AllowTrust {
        trustor: AccountId,
        asset_code: String,
        authorize: bool,
    },
    SetOptions(SetOptions),
    ManageData {
        name: String,
        #[serde(default)]
        value: Option<String>,
    },
    AccountMerge {
        destination: AccountId,
    },
}

/// A single operation, optionally performed on behalf of another account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default)]
    pub source_account: Option<AccountId>,
    pub body: OperationBody,
}

impl Operation {
    pub fn new(body: OperationBody) -> Self {
        Self {
            source_account: None,
            body,
        }
    }

    /// Perform this operation on behalf of `source`.
    #[must_use]
    pub fn with_source(mut self, source: AccountId) -> Self {
        self.source_account = Some(source);
        self
    }
}

/// A ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub source_account: AccountId,
    pub fee: u32,
    pub sequence: u64,
    #[serde(default)]
    pub memo: Option<String>,
    pub operations: Vec<Operation>,
}

impl Transaction {
    /// Account responsible for `op`: its explicit source, else the transaction source.
    pub fn responsible_account(&self, op: &Operation) -> AccountId {
        op.source_account.unwrap_or(self.source_account)
    }

    /// Hash of this transaction under `network`.
    pub fn hash(&self, network: &NetworkId) -> ConstellationResult<TxHash> {
        let body = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(network.id());
        hasher.update(TX_HASH_TAG);
        hasher.update(&body);
        Ok(TxHash::from_bytes(hasher.finalize().into()))
    }
}

/// A transaction with the signatures attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEnvelope {
    pub tx: Transaction,
    #[serde(default)]
    pub signatures: Vec<DecoratedSignature>,
}

impl TransactionEnvelope {
    pub fn new(tx: Transaction) -> Self {
        Self {
            tx,
            signatures: Vec::new(),
        }
    }

    /// Decode an envelope from its base64 wire form.
    pub fn from_base64(txenv: &str) -> ConstellationResult<Self> {
        let raw = BASE64.decode(txenv.trim())?;
        serde_json::from_slice(&raw).map_err(|e| {
            ConstellationError::InvalidInput(format!("Malformed transaction envelope: {e}"))
        })
    }

    /// Encode this envelope to its base64 wire form.
    pub fn to_base64(&self) -> ConstellationResult<String> {
        Ok(BASE64.encode(serde_json::to_vec(self)?))
    }

    /// Replace the attached signatures.
    #[must_use]
    pub fn with_signatures(mut self, signatures: Vec<DecoratedSignature>) -> Self {
        self.signatures = signatures;
        self
    }
}
