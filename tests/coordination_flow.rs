//! Integration tests for the signature coordination flow.
//!
//! These tests drive the `Coordinator` end to end against an in-memory ledger
//! and a temporary file-based database.
//!
//! Run with: cargo test --test `coordination_flow`

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use constellation::coordination::{
    CoordinationStatus, Coordinator, OneOrMany, SubmitSignatureRequest, SubmitTransactionRequest,
    TransactionResponse, TransactionStatus,
};
use constellation::error::{ConstellationError, ConstellationResult};
use constellation::ledger::{
    AccountId, AccountSigner, AccountSnapshot, Asset, Keypair, MemoryLedger, NetworkId, Operation,
    OperationBody, Thresholds, Transaction, TransactionEnvelope, TxHash,
};
use constellation::pubsub::{Broadcaster, EventBus, SigningEvent};
use constellation::storage::Storage;

struct Harness {
    _temp_dir: TempDir,
    ledger: MemoryLedger,
    bus: EventBus<SigningEvent>,
    network: NetworkId,
    coordinator: Arc<Coordinator>,
}

/// Create a coordinator with temporary storage and an empty ledger.
fn harness(ttl: Duration) -> Harness {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let storage =
        Storage::open(&temp_dir.path().join("pending.redb")).expect("Failed to create storage");
    let network = NetworkId::new("Integration Test Network");
    let ledger = MemoryLedger::new(network.clone());
    let bus = EventBus::new(64);
    let coordinator = Coordinator::new(
        storage,
        Arc::new(ledger.clone()),
        Broadcaster::new(bus.clone()),
        network.clone(),
        ttl,
    );

    Harness {
        _temp_dir: temp_dir,
        ledger,
        bus,
        network,
        coordinator: Arc::new(coordinator),
    }
}

fn register(ledger: &MemoryLedger, account: AccountId, medium: u32, signers: &[(&Keypair, u32)]) {
    ledger.insert_account(AccountSnapshot {
        account,
        thresholds: Thresholds {
            low: 1,
            medium,
            high: medium,
        },
        signers: signers
            .iter()
            .map(|(keypair, weight)| AccountSigner {
                account: keypair.account_id(),
                weight: *weight,
            })
            .collect(),
    });
}

fn envelope(source: AccountId, operations: Vec<Operation>) -> TransactionEnvelope {
    TransactionEnvelope::new(Transaction {
        source_account: source,
        fee: 100,
        sequence: 7,
        memo: Some("integration".to_string()),
        operations,
    })
}

fn manage_data() -> Operation {
    Operation::new(OperationBody::ManageData {
        name: "config".to_string(),
        value: Some("1".to_string()),
    })
}

async fn propose(
    h: &Harness,
    envelope: &TransactionEnvelope,
) -> ConstellationResult<(TxHash, TransactionResponse)> {
    let hash = envelope.tx.hash(&h.network)?;
    let response = h
        .coordinator
        .submit(SubmitTransactionRequest {
            txenv: envelope.to_base64()?,
            msg: Some("please sign".to_string()),
        })
        .await?;
    Ok((hash, response))
}

async fn sign(
    h: &Harness,
    hash: TxHash,
    signers: &[&Keypair],
) -> ConstellationResult<TransactionResponse> {
    let sig = signers
        .iter()
        .map(|keypair| keypair.sign_decorated(&hash).to_base64())
        .collect();
    h.coordinator
        .sign(hash, SubmitSignatureRequest {
            sig: OneOrMany::Many(sig),
        })
        .await
}

#[tokio::test]
async fn test_weighted_threshold_round_trip() {
    let h = harness(Duration::from_secs(3600));
    let owner = Keypair::from_seed([1; 32]);
    let cosigner = Keypair::from_seed([2; 32]);
    register(&h.ledger, owner.account_id(), 10, &[(&owner, 6), (&cosigner, 5)]);

    let proposed = envelope(owner.account_id(), vec![manage_data()]);
    let (hash, response) = propose(&h, &proposed).await.unwrap();
    assert_eq!(response.hash, hash);
    assert_eq!(response.status, TransactionStatus::Pending);
    assert_eq!(response.progress[&owner.account_id()].threshold, 10);
    assert_eq!(response.progress[&owner.account_id()].weight, 0);

    let response = sign(&h, hash, &[&owner]).await.unwrap();
    assert_eq!(response.status, TransactionStatus::Pending);
    assert_eq!(response.accepted, vec![owner.account_id()]);
    assert_eq!(response.progress[&owner.account_id()].weight, 6);
    assert!(h.ledger.submitted().is_empty());

    let response = sign(&h, hash, &[&cosigner]).await.unwrap();
    assert_eq!(response.status, TransactionStatus::Submitted);
    assert_eq!(response.progress[&owner.account_id()].weight, 11);
    assert!(response.outcome.is_some());

    // The ledger receives the proposed transaction with exactly the collected signatures.
    let submitted = h.ledger.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].tx, proposed.tx);
    assert_eq!(
        submitted[0].signatures,
        vec![owner.sign_decorated(&hash), cosigner.sign_decorated(&hash)]
    );

    assert!(matches!(
        h.coordinator.status(hash).await,
        Err(ConstellationError::TransactionNotFound(_))
    ));
}

#[tokio::test]
async fn test_allow_trust_only_needs_weight_one() {
    let h = harness(Duration::from_secs(3600));
    let issuer = Keypair::from_seed([3; 32]);
    let holder = Keypair::from_seed([4; 32]);
    h.ledger.insert_account(AccountSnapshot {
        account: issuer.account_id(),
        thresholds: Thresholds {
            low: 5,
            medium: 10,
            high: 20,
        },
        signers: vec![AccountSigner {
            account: issuer.account_id(),
            weight: 1,
        }],
    });

    let allow = Operation::new(OperationBody::AllowTrust {
        trustor: holder.account_id(),
        asset_code: "USD".to_string(),
        authorize: true,
    });
    let unsigned = envelope(issuer.account_id(), vec![allow]);
    let hash = unsigned.tx.hash(&h.network).unwrap();

    // Signatures attached at proposal time are applied right away.
    let signed = unsigned.with_signatures(vec![issuer.sign_decorated(&hash)]);
    let (_, response) = propose(&h, &signed).await.unwrap();
    assert_eq!(response.status, TransactionStatus::Submitted);
    assert_eq!(response.progress[&issuer.account_id()].threshold, 1);
    assert_eq!(h.ledger.submitted().len(), 1);
}

#[tokio::test]
async fn test_progress_reaches_every_interested_address() {
    let h = harness(Duration::from_secs(3600));
    let alice = Keypair::from_seed([5; 32]);
    let bob = Keypair::from_seed([6; 32]);
    let carol = Keypair::from_seed([7; 32]);
    register(&h.ledger, alice.account_id(), 3, &[(&alice, 3)]);
    register(&h.ledger, bob.account_id(), 5, &[(&bob, 2), (&carol, 3)]);

    // Carol only signs for Bob, she is not a required account herself.
    let mut carol_events = h.bus.subscribe(&carol.account_id().to_string());

    let payment = Operation::new(OperationBody::Payment {
        destination: alice.account_id(),
        asset: Asset::Native,
        amount: 10,
    })
    .with_source(bob.account_id());
    let proposed = envelope(alice.account_id(), vec![manage_data(), payment]);
    let (hash, response) = propose(&h, &proposed).await.unwrap();
    assert_eq!(response.progress.len(), 2);

    match carol_events.recv().await.unwrap() {
        SigningEvent::Request { hash: got, msg, .. } => {
            assert_eq!(got, hash);
            assert_eq!(msg.as_deref(), Some("please sign"));
        }
        other => panic!("expected request event, got {other:?}"),
    }

    sign(&h, hash, &[&alice]).await.unwrap();
    carol_events.recv().await.unwrap();

    let response = sign(&h, hash, &[&bob]).await.unwrap();
    assert_eq!(response.status, TransactionStatus::Pending);
    match carol_events.recv().await.unwrap() {
        SigningEvent::Progress { hash: got, progress } => {
            assert_eq!(got, hash);
            assert_eq!(progress[&alice.account_id()].weight, 3);
            assert!(progress[&alice.account_id()].is_satisfied());
            assert_eq!(progress[&bob.account_id()].weight, 2);
            assert_eq!(progress[&bob.account_id()].threshold, 5);
        }
        other => panic!("expected progress event, got {other:?}"),
    }

    let response = sign(&h, hash, &[&carol]).await.unwrap();
    assert_eq!(response.status, TransactionStatus::Submitted);

    // The authorizing batch is announced too.
    match carol_events.recv().await.unwrap() {
        SigningEvent::Progress { progress, .. } => {
            assert!(progress.values().all(|p| p.is_satisfied()));
        }
        other => panic!("expected progress event, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_submission_keeps_authorized_record() {
    let h = harness(Duration::from_secs(3600));
    let owner = Keypair::from_seed([8; 32]);
    register(&h.ledger, owner.account_id(), 1, &[(&owner, 1)]);

    let (hash, _) = propose(&h, &envelope(owner.account_id(), vec![manage_data()]))
        .await
        .unwrap();

    h.ledger.set_reject_submissions(Some("tx_bad_seq"));
    assert!(matches!(
        sign(&h, hash, &[&owner]).await,
        Err(ConstellationError::SubmissionFailed(_))
    ));

    let pending = h.coordinator.status(hash).await.unwrap();
    assert_eq!(pending.status, CoordinationStatus::Authorized);
    assert_eq!(pending.signatures.len(), 1);

    // No more signatures are taken once authorized.
    assert!(matches!(
        sign(&h, hash, &[&owner]).await,
        Err(ConstellationError::InvalidTransactionState { .. })
    ));

    h.ledger.set_reject_submissions(None);
    let response = h.coordinator.resubmit(hash).await.unwrap();
    assert_eq!(response.status, TransactionStatus::Submitted);
    assert_eq!(h.ledger.submitted().len(), 1);
    assert!(h.coordinator.status(hash).await.is_err());
}

#[tokio::test]
async fn test_rejected_batches_change_nothing() {
    let h = harness(Duration::from_secs(3600));
    let owner = Keypair::from_seed([9; 32]);
    let cosigner = Keypair::from_seed([10; 32]);
    let stranger = Keypair::from_seed([11; 32]);
    register(&h.ledger, owner.account_id(), 10, &[(&owner, 6), (&cosigner, 5)]);

    let (hash, _) = propose(&h, &envelope(owner.account_id(), vec![manage_data()]))
        .await
        .unwrap();

    assert!(matches!(
        sign(&h, hash, &[&owner, &stranger]).await,
        Err(ConstellationError::UnresolvableSigner(_))
    ));

    let forged = cosigner.sign_decorated(&TxHash::from_bytes([0; 32])).to_base64();
    let result = h
        .coordinator
        .sign(hash, SubmitSignatureRequest {
            sig: OneOrMany::Many(vec![owner.sign_decorated(&hash).to_base64(), forged]),
        })
        .await;
    match result {
        Err(ConstellationError::InvalidSignature { positions }) => assert_eq!(positions, vec![1]),
        other => panic!("expected invalid signature, got {other:?}"),
    }

    let pending = h.coordinator.status(hash).await.unwrap();
    assert_eq!(pending.progress[&owner.account_id()].weight, 0);
    assert!(pending.signatures.is_empty());

    // The same signer offered twice counts once.
    sign(&h, hash, &[&owner]).await.unwrap();
    let response = sign(&h, hash, &[&owner]).await.unwrap();
    assert_eq!(response.duplicates, vec![owner.account_id()]);
    assert_eq!(response.progress[&owner.account_id()].weight, 6);
}

#[tokio::test]
async fn test_reproposal_merges_signatures() {
    let h = harness(Duration::from_secs(3600));
    let owner = Keypair::from_seed([12; 32]);
    let cosigner = Keypair::from_seed([13; 32]);
    register(&h.ledger, owner.account_id(), 10, &[(&owner, 6), (&cosigner, 5)]);

    let unsigned = envelope(owner.account_id(), vec![manage_data()]);
    let (hash, _) = propose(&h, &unsigned).await.unwrap();

    let signed = unsigned.with_signatures(vec![owner.sign_decorated(&hash)]);
    let (again, response) = propose(&h, &signed).await.unwrap();
    assert_eq!(again, hash);
    assert_eq!(response.accepted, vec![owner.account_id()]);
    assert_eq!(response.progress[&owner.account_id()].weight, 6);

    let pending = h.coordinator.status(hash).await.unwrap();
    assert_eq!(pending.signatures, vec![owner.sign_decorated(&hash)]);
}

#[tokio::test]
async fn test_expired_transactions_are_rejected_and_purged() {
    let h = harness(Duration::from_millis(50));
    let owner = Keypair::from_seed([14; 32]);
    register(&h.ledger, owner.account_id(), 1, &[(&owner, 1)]);

    let (hash, _) = propose(&h, &envelope(owner.account_id(), vec![manage_data()]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert!(matches!(
        sign(&h, hash, &[&owner]).await,
        Err(ConstellationError::TransactionExpired(_))
    ));
    assert_eq!(h.coordinator.purge_expired().await.unwrap(), 1);
    assert!(matches!(
        h.coordinator.status(hash).await,
        Err(ConstellationError::TransactionNotFound(_))
    ));
    assert!(h.ledger.submitted().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_signatures_are_all_counted() {
    let h = harness(Duration::from_secs(3600));
    let owner = Keypair::from_seed([15; 32]);
    let signers: Vec<Keypair> = (0..8u8).map(|i| Keypair::from_seed([100 + i; 32])).collect();
    let weights: Vec<(&Keypair, u32)> = signers.iter().map(|k| (k, 1)).collect();
    register(&h.ledger, owner.account_id(), 100, &weights);

    let (hash, _) = propose(&h, &envelope(owner.account_id(), vec![manage_data()]))
        .await
        .unwrap();

    let tasks: Vec<_> = signers
        .iter()
        .map(|keypair| {
            let coordinator = Arc::clone(&h.coordinator);
            let sig = keypair.sign_decorated(&hash).to_base64();
            tokio::spawn(async move {
                coordinator
                    .sign(hash, SubmitSignatureRequest {
                        sig: OneOrMany::One(sig),
                    })
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let pending = h.coordinator.status(hash).await.unwrap();
    assert_eq!(pending.progress[&owner.account_id()].weight, 8);
    assert_eq!(pending.signatures.len(), 8);
    assert_eq!(pending.accepted_signers.len(), 8);
}

#[tokio::test]
async fn test_unknown_source_account_fails_proposal() {
    let h = harness(Duration::from_secs(3600));
    let nobody = Keypair::from_seed([16; 32]);

    let result = propose(&h, &envelope(nobody.account_id(), vec![manage_data()])).await;
    assert!(matches!(result, Err(ConstellationError::AccountNotFound(_))));
}
