//! Signature coordination engine.
//!
//! ## Flow
//!
//! 1. A proposer submits an envelope. The policy derives which accounts must
//!    sign and how much weight each needs.
//! 2. Signers (and required accounts) receive a `request` event.
//! 3. Signers offer decorated signatures. Each batch is verified as a whole;
//!    accepted signers add their weight to every account they sign for.
//! 4. Once every account reaches its threshold the envelope is submitted with
//!    exactly the collected signatures and the pending record is deleted.

pub mod coordinator;
pub mod locks;
pub mod policy;
pub mod state;
pub mod submission;
pub mod types;
pub mod verifier;

pub use coordinator::{Coordinator, DEFAULT_PENDING_TTL_SECS, spawn_expiry_sweeper};
pub use locks::HashLocks;
pub use policy::{CategorySet, OperationCategory, categorize, required_threshold, source_categories};
pub use state::{ApplyOutcome, Contribution, CoordinationStatus, PendingTransaction, Progress};
pub use submission::SubmissionGateway;
pub use types::{
    OneOrMany, SubmitSignatureRequest, SubmitTransactionRequest, TransactionResponse,
    TransactionStatus,
};
pub use verifier::verify_batch;
