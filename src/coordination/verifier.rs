//! Batch signature verification against hinted signer candidates.

use std::collections::BTreeMap;

use crate::error::{ConstellationError, ConstellationResult};
use crate::ledger::{AccountId, DecoratedSignature, SignatureHint, TxHash};

/// Resolve and verify every signature in `signatures`.
///
/// Each signature is checked against the candidates registered for its hint,
/// in registration order; the first key that verifies is its signer. The batch
/// is all-or-nothing: on success the signer of every position is returned, on
/// failure nothing is.
///
/// Unknown hints are reported as `UnresolvableSigner`. Otherwise signatures
/// that no candidate verifies are reported as `InvalidSignature` with their
/// batch positions.
pub fn verify_batch(
    address_by_hint: &BTreeMap<SignatureHint, Vec<AccountId>>,
    hash: &TxHash,
    signatures: &[DecoratedSignature],
) -> ConstellationResult<Vec<AccountId>> {
    let mut signers = Vec::with_capacity(signatures.len());
    let mut unresolvable = Vec::new();
    let mut invalid = Vec::new();

    for (position, signature) in signatures.iter().enumerate() {
        let Some(candidates) = address_by_hint.get(&signature.hint) else {
            unresolvable.push(format!("{} at position {position}", signature.hint));
            continue;
        };

        match candidates
            .iter()
            .find(|candidate| candidate.verify(hash.as_bytes(), &signature.signature))
        {
            Some(signer) => signers.push(*signer),
            None => invalid.push(position),
        }
    }

    if !unresolvable.is_empty() {
        return Err(ConstellationError::UnresolvableSigner(unresolvable.join(", ")));
    }
    if !invalid.is_empty() {
        tracing::debug!(%hash, positions = ?invalid, "Rejected signature batch");
        return Err(ConstellationError::InvalidSignature { positions: invalid });
    }

    Ok(signers)
}
