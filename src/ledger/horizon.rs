//! HTTP ledger client.
//!
//! Talks to a Horizon-style REST gateway:
//! - `GET {base}/accounts/{id}` for thresholds and signers
//! - `POST {base}/transactions` with `{"tx": <txenv>}` for submission

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{ConstellationError, ConstellationResult};
use crate::ledger::{
    AccountId, AccountSigner, AccountSnapshot, Ledger, SubmitOutcome, Thresholds,
    TransactionEnvelope,
};

#[derive(Debug, Deserialize)]
struct AccountRecord {
    id: AccountId,
    #[serde(default)]
    thresholds: ThresholdsRecord,
    #[serde(default)]
    signers: Vec<SignerRecord>,
}

#[derive(Debug, Default, Deserialize)]
struct ThresholdsRecord {
    #[serde(default)]
    low_threshold: u32,
    #[serde(default)]
    med_threshold: u32,
    #[serde(default)]
    high_threshold: u32,
}

#[derive(Debug, Deserialize)]
struct SignerRecord {
    key: AccountId,
    weight: u32,
}

impl From<AccountRecord> for AccountSnapshot {
    fn from(record: AccountRecord) -> Self {
        Self {
            account: record.id,
            thresholds: Thresholds {
                low: record.thresholds.low_threshold,
                medium: record.thresholds.med_threshold,
                high: record.thresholds.high_threshold,
            },
            // Zero-weight signers are removed signers.
            signers: record
                .signers
                .into_iter()
                .filter(|s| s.weight > 0)
                .map(|s| AccountSigner {
                    account: s.key,
                    weight: s.weight,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct SubmitRequest {
    tx: String,
}

/// Ledger accessed over HTTP.
#[derive(Clone)]
pub struct HorizonLedger {
    http_client: Client,
    base_url: String,
}

impl HorizonLedger {
    pub fn new(base_url: &str, timeout: Duration) -> ConstellationResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConstellationError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Ledger for HorizonLedger {
    #[tracing::instrument(skip(self), fields(account = %account))]
    async fn get_account(&self, account: &AccountId) -> ConstellationResult<AccountSnapshot> {
        let response = self
            .http_client
            .get(format!("{}/accounts/{account}", self.base_url))
            .send()
            .await
            .map_err(|e| ConstellationError::LedgerUnavailable(format!("Failed to reach ledger: {e}")))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ConstellationError::AccountNotFound(account.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConstellationError::LedgerUnavailable(format!(
                "Account lookup failed with {status}: {error_text}"
            )));
        }

        let record: AccountRecord = response.json().await.map_err(|e| {
            ConstellationError::Deserialization(format!("Failed to parse account record: {e}"))
        })?;
        Ok(record.into())
    }

    #[tracing::instrument(skip_all)]
    async fn submit_transaction(
        &self,
        envelope: &TransactionEnvelope,
    ) -> ConstellationResult<SubmitOutcome> {
        let request = SubmitRequest {
            tx: envelope.to_base64()?,
        };

        let response = self
            .http_client
            .post(format!("{}/transactions", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ConstellationError::LedgerUnavailable(format!("Failed to reach ledger: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ConstellationError::SubmissionFailed(format!(
                "Ledger rejected transaction ({status}): {error_text}"
            )));
        }

        let outcome: SubmitOutcome = response.json().await.map_err(|e| {
            ConstellationError::Deserialization(format!("Failed to parse submission result: {e}"))
        })?;
        tracing::info!(hash = %outcome.hash, ledger = ?outcome.ledger, "Transaction accepted by ledger");
        Ok(outcome)
    }
}
