//! Error types for the coordination service.
//!
//! All errors implement `ResponseError` for Actix-web integration,
//! converting domain errors into appropriate HTTP status codes.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use thiserror::Error;

/// Service error type with structured error responses.
#[derive(Error, Debug)]
pub enum ConstellationError {
    // Pending transaction errors
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Transaction expired: {0}")]
    TransactionExpired(String),

    #[error("Invalid transaction state: expected {expected}, got {actual}")]
    InvalidTransactionState { expected: String, actual: String },

    // Signature errors
    #[error("Invalid signature batch, rejected positions: {positions:?}")]
    InvalidSignature { positions: Vec<usize> },

    #[error("No known signer for signature hint {0}")]
    UnresolvableSigner(String),

    // Ledger errors
    #[error("Account not found on ledger: {0}")]
    AccountNotFound(String),

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),

    // Client-side view of a failed call to a coordination service
    #[error("Coordination service error: {message}")]
    Remote {
        status: Option<u16>,
        code: Option<String>,
        message: String,
    },

    // Authentication
    #[error("Unauthorized")]
    Unauthorized,

    // Input validation errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl ConstellationError {
    /// Get the error code for structured error responses.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::TransactionNotFound(_) => Some("TRANSACTION_NOT_FOUND"),
            Self::TransactionExpired(_) => Some("TRANSACTION_EXPIRED"),
            Self::InvalidTransactionState { .. } => Some("INVALID_TRANSACTION_STATE"),
            Self::InvalidSignature { .. } => Some("INVALID_SIGNATURE"),
            Self::UnresolvableSigner(_) => Some("UNRESOLVABLE_SIGNER"),
            Self::AccountNotFound(_) => Some("ACCOUNT_NOT_FOUND"),
            Self::LedgerUnavailable(_) => Some("LEDGER_UNAVAILABLE"),
            Self::SubmissionFailed(_) => Some("SUBMISSION_FAILED"),
            Self::Remote { .. } => Some("REMOTE_ERROR"),
            Self::Unauthorized => Some("UNAUTHORIZED"),
            Self::InvalidInput(_) => Some("INVALID_INPUT"),
            Self::Serialization(_) => Some("SERIALIZATION_ERROR"),
            Self::Deserialization(_) => Some("DESERIALIZATION_ERROR"),
            Self::Storage(_) => Some("STORAGE_ERROR"),
            Self::Internal(_) => None, // Don't expose internal error codes
        }
    }
}

impl ResponseError for ConstellationError {
    fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request - Client errors
            Self::InvalidInput(_) | Self::Deserialization(_) => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            Self::Unauthorized => StatusCode::UNAUTHORIZED,

            // 404 Not Found
            Self::TransactionNotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict - State conflicts
            Self::InvalidTransactionState { .. } | Self::TransactionExpired(_) => {
                StatusCode::CONFLICT
            }

            // 422 Unprocessable Entity - Business logic errors
            Self::InvalidSignature { .. }
            | Self::UnresolvableSigner(_)
            | Self::AccountNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 502 Bad Gateway - Downstream errors
            Self::LedgerUnavailable(_) | Self::SubmissionFailed(_) | Self::Remote { .. } => {
                StatusCode::BAD_GATEWAY
            }

            // 500 Internal Server Error - Everything else
            Self::Serialization(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = ErrorResponse {
            error: self.to_string(),
            code: self.error_code().map(String::from),
        };

        HttpResponse::build(self.status_code()).json(body)
    }
}

// Conversion from common error types

impl From<std::io::Error> for ConstellationError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ConstellationError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_syntax() || err.is_eof() {
            Self::Deserialization(err.to_string())
        } else {
            Self::Serialization(err.to_string())
        }
    }
}

impl From<base64::DecodeError> for ConstellationError {
    fn from(err: base64::DecodeError) -> Self {
        Self::InvalidInput(format!("Invalid base64: {err}"))
    }
}

impl From<hex::FromHexError> for ConstellationError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidInput(format!("Invalid hex: {err}"))
    }
}

impl From<redb::Error> for ConstellationError {
    fn from(err: redb::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::DatabaseError> for ConstellationError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::TableError> for ConstellationError {
    fn from(err: redb::TableError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::TransactionError> for ConstellationError {
    fn from(err: redb::TransactionError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::CommitError> for ConstellationError {
    fn from(err: redb::CommitError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<redb::StorageError> for ConstellationError {
    fn from(err: redb::StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<reqwest::Error> for ConstellationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::LedgerUnavailable(format!("Request timed out: {err}"))
        } else if err.is_connect() {
            Self::LedgerUnavailable(format!("Connection failed: {err}"))
        } else if err.is_decode() {
            Self::Deserialization(err.to_string())
        } else {
            Self::LedgerUnavailable(err.to_string())
        }
    }
}

/// Result type alias for coordination operations.
pub type ConstellationResult<T> = Result<T, ConstellationError>;
