//! HTTP client for a coordination service.
//!
//! Covers the three things a participant does: propose a transaction, offer
//! signatures, and listen for requests and progress on its own address.

use std::fmt::Display;
use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt, future};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::coordination::{
    OneOrMany, PendingTransaction, SubmitSignatureRequest, SubmitTransactionRequest,
    TransactionResponse,
};
use crate::error::{ConstellationError, ConstellationResult};
use crate::ledger::{AccountId, DecoratedSignature, TransactionEnvelope, TxHash};
use crate::pubsub::SigningEvent;

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

fn transport_error(err: &reqwest::Error) -> ConstellationError {
    ConstellationError::Remote {
        status: err.status().map(|s| s.as_u16()),
        code: None,
        message: err.to_string(),
    }
}

/// Client for the coordination API.
#[derive(Clone)]
pub struct ConstellationClient {
    http_client: Client,
    base_url: String,
    token: Option<String>,
}

impl ConstellationClient {
    /// Create a client for the service at `base_url`.
    ///
    /// `timeout` bounds connection setup only, so event streams can stay open.
    pub fn new(base_url: &str, timeout: Duration) -> ConstellationResult<Self> {
        let http_client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ConstellationError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Authenticate every request with the internal service token.
    #[must_use]
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .http_client
            .request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(builder: RequestBuilder) -> ConstellationResult<Response> {
        let response = builder.send().await.map_err(|e| transport_error(&e))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => (body.code, body.error),
            Err(_) => (None, text),
        };
        Err(ConstellationError::Remote {
            status: Some(status),
            code,
            message,
        })
    }

    async fn json<T: DeserializeOwned>(builder: RequestBuilder) -> ConstellationResult<T> {
        Self::send(builder)
            .await?
            .json()
            .await
            .map_err(|e| ConstellationError::Deserialization(format!("Invalid response body: {e}")))
    }

    /// Propose a transaction, optionally with a note for the co-signers.
    pub async fn submit_transaction(
        &self,
        envelope: &TransactionEnvelope,
        msg: Option<&str>,
    ) -> ConstellationResult<TransactionResponse> {
        let body = SubmitTransactionRequest {
            txenv: envelope.to_base64()?,
            msg: msg.map(str::to_string),
        };
        Self::json(self.request(Method::POST, "/transaction").json(&body)).await
    }

    /// Offer signatures for a pending transaction.
    pub async fn submit_signature(
        &self,
        hash: &TxHash,
        signatures: &[DecoratedSignature],
    ) -> ConstellationResult<TransactionResponse> {
        let body = SubmitSignatureRequest {
            sig: OneOrMany::Many(signatures.iter().map(DecoratedSignature::to_base64).collect()),
        };
        Self::json(
            self.request(Method::PUT, &format!("/transaction/{hash}"))
                .json(&body),
        )
        .await
    }

    /// Fetch the pending record of a transaction.
    pub async fn status(&self, hash: &TxHash) -> ConstellationResult<PendingTransaction> {
        Self::json(self.request(Method::GET, &format!("/transaction/{hash}"))).await
    }

    /// Retry submission of an authorized transaction.
    pub async fn resubmit(&self, hash: &TxHash) -> ConstellationResult<TransactionResponse> {
        Self::json(self.request(Method::POST, &format!("/transaction/{hash}/submit"))).await
    }

    /// Cancel a pending transaction.
    pub async fn cancel(&self, hash: &TxHash) -> ConstellationResult<()> {
        Self::send(self.request(Method::DELETE, &format!("/transaction/{hash}"))).await?;
        Ok(())
    }

    /// Listen for events addressed to `address`.
    ///
    /// The stream ends when the server closes the connection.
    pub async fn subscribe(
        &self,
        address: &AccountId,
    ) -> ConstellationResult<BoxStream<'static, ConstellationResult<SigningEvent>>> {
        let response = Self::send(
            self.request(Method::GET, &format!("/events/{address}"))
                .header("accept", "text/event-stream"),
        )
        .await?;

        Ok(signing_events(response.bytes_stream()).boxed())
    }
}

/// Decode a `text/event-stream` body into signing events.
///
/// Comments and frames without data are skipped.
fn signing_events<S, B, E>(bytes: S) -> impl Stream<Item = ConstellationResult<SigningEvent>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    bytes.eventsource().filter_map(|frame| {
        future::ready(match frame {
            Ok(frame) if frame.data.is_empty() => None,
            Ok(frame) => Some(
                serde_json::from_str::<SigningEvent>(&frame.data).map_err(ConstellationError::from),
            ),
            Err(e) => Some(Err(ConstellationError::Remote {
                status: None,
                code: None,
                message: e.to_string(),
            })),
        })
    })
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use futures_util::stream;

    use super::*;

    fn progress_frame(seed: u8) -> String {
        let event = SigningEvent::Progress {
            hash: TxHash::from_bytes([seed; 32]),
            progress: std::collections::BTreeMap::new(),
        };
        format!("event: progress\ndata: {}\n\n", serde_json::to_string(&event).unwrap())
    }

    async fn decode(chunks: Vec<String>) -> Vec<ConstellationResult<SigningEvent>> {
        let bytes = stream::iter(chunks.into_iter().map(Ok::<_, Infallible>));
        signing_events(bytes).collect().await
    }

    #[tokio::test]
    async fn test_keepalive_comments_are_skipped() {
        let events = decode(vec![format!(": keepalive\n\n{}", progress_frame(3))]).await;
        assert_eq!(events.len(), 1);
        match events[0].as_ref().unwrap() {
            SigningEvent::Progress { hash, .. } => assert_eq!(*hash, TxHash::from_bytes([3; 32])),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let wire = format!("{}{}", progress_frame(1), progress_frame(2));
        let (head, tail) = wire.split_at(17);
        let (middle, tail) = tail.split_at(tail.len() - 40);
        let events = decode(vec![head.to_string(), middle.to_string(), tail.to_string()]).await;

        let hashes: Vec<TxHash> = events
            .into_iter()
            .map(|event| match event.unwrap() {
                SigningEvent::Progress { hash, .. } => hash,
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(hashes, vec![TxHash::from_bytes([1; 32]), TxHash::from_bytes([2; 32])]);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_an_error() {
        let events = decode(vec!["event: progress\ndata: not-json\n\n".to_string()]).await;
        assert_eq!(events.len(), 1);
        assert!(events[0].is_err());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = ConstellationClient::new("http://localhost:4711/", Duration::from_secs(1))
            .unwrap()
            .with_token("secret");
        assert_eq!(client.base_url, "http://localhost:4711");
        assert_eq!(client.token.as_deref(), Some("secret"));
    }
}
