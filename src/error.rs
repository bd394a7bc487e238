//! Service error types with HTTP status code mapping.
//!
//! [`PaymentError`] is the central error type of the service. Each variant
//! maps to a numeric code, an HTTP status and an [`ErrorCategory`], and is
//! rendered as a structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::chain::ChainError;
use crate::domain::{EventId, MicroAlgos};
use crate::persistence::RepositoryError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4004,
///     "message": "insufficient amount: expected 5000000 µALGO, received 4999999 µALGO",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`PaymentError`] code ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error taxonomy used in logs and for grouping variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or malformed input, or missing authentication.
    Validation,
    /// Event or transaction absent.
    NotFound,
    /// Duplicate transaction ID or existing membership.
    Conflict,
    /// Chain node unreachable or transaction not yet visible.
    ChainLookup,
    /// Transaction does not satisfy the event's payment policy.
    Verification,
    /// Database write or read failure.
    Persistence,
    /// Payment verified but membership not granted.
    PartialFailure,
}

/// Service error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category                       | HTTP Status                  |
/// |-----------|--------------------------------|------------------------------|
/// | 1000–1999 | Validation / authentication    | 400 Bad Request / 401        |
/// | 2000–2999 | Not Found / Conflict           | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server / chain node            | 500 / 502 Bad Gateway        |
/// | 4000–4999 | Payment verification           | 422 Unprocessable Entity     |
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No valid session accompanied the request.
    #[error("authentication required")]
    Unauthorized,

    /// The event is paid, so the free join path does not apply.
    #[error("event {0} requires a ticket payment")]
    NotFree(EventId),

    /// Event with the given ID was not found.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// The chain node does not report the transaction as confirmed.
    #[error("transaction {0} not found or not yet confirmed")]
    TransactionNotFound(String),

    /// The transaction ID was already submitted.
    #[error("transaction {0} has already been submitted")]
    DuplicateTransaction(String),

    /// The user is already a member of the event.
    #[error("already a member of event {0}")]
    AlreadyMember(EventId),

    /// The event has no positive price or no receiving wallet.
    #[error("event {0} is not configured for payments: {1}")]
    InvalidEventConfiguration(EventId, String),

    /// The transaction is not a payment.
    #[error("wrong transaction type: {0}")]
    WrongTransactionType(String),

    /// The payment fields could not be read from the transaction.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// The transaction pays someone other than the event wallet.
    #[error("payment receiver does not match the event wallet")]
    ReceiverMismatch {
        /// Wallet configured on the event.
        expected: String,
        /// Receiver found in the transaction.
        actual: String,
    },

    /// The transaction pays less than the ticket price.
    #[error("insufficient amount: expected {expected}, received {actual}")]
    InsufficientAmount {
        /// Ticket price in micro-ALGO.
        expected: MicroAlgos,
        /// Transferred amount in micro-ALGO.
        actual: MicroAlgos,
    },

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// The chain node could not be queried.
    #[error("chain node unavailable: {0}")]
    ChainUnavailable(String),

    /// The payment is recorded as verified but the membership was not
    /// created.
    #[error("payment {transaction_id} verified but membership grant failed: {reason}")]
    PartialFailure {
        /// Transaction ID of the verified payment.
        transaction_id: String,
        /// Underlying failure.
        reason: String,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Unauthorized => 1002,
            Self::NotFree(_) => 1003,
            Self::EventNotFound(_) => 2001,
            Self::TransactionNotFound(_) => 2002,
            Self::DuplicateTransaction(_) => 2101,
            Self::AlreadyMember(_) => 2102,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::ChainUnavailable(_) => 3002,
            Self::PartialFailure { .. } => 3003,
            Self::WrongTransactionType(_) => 4001,
            Self::MalformedTransaction(_) => 4002,
            Self::ReceiverMismatch { .. } => 4003,
            Self::InsufficientAmount { .. } => 4004,
            Self::InvalidEventConfiguration(..) => 4005,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::NotFree(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::EventNotFound(_) | Self::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            Self::DuplicateTransaction(_) | Self::AlreadyMember(_) => StatusCode::CONFLICT,
            Self::WrongTransactionType(_)
            | Self::MalformedTransaction(_)
            | Self::ReceiverMismatch { .. }
            | Self::InsufficientAmount { .. }
            | Self::InvalidEventConfiguration(..) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ChainUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::PersistenceError(_) | Self::PartialFailure { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the taxonomy bucket of this variant.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest(_) | Self::Unauthorized | Self::NotFree(_) => {
                ErrorCategory::Validation
            }
            Self::EventNotFound(_) => ErrorCategory::NotFound,
            Self::TransactionNotFound(_) | Self::ChainUnavailable(_) => ErrorCategory::ChainLookup,
            Self::DuplicateTransaction(_) | Self::AlreadyMember(_) => ErrorCategory::Conflict,
            Self::WrongTransactionType(_)
            | Self::MalformedTransaction(_)
            | Self::ReceiverMismatch { .. }
            | Self::InsufficientAmount { .. }
            | Self::InvalidEventConfiguration(..) => ErrorCategory::Verification,
            Self::PersistenceError(_) | Self::Internal(_) => ErrorCategory::Persistence,
            Self::PartialFailure { .. } => ErrorCategory::PartialFailure,
        }
    }

    /// Message safe to return to callers.
    ///
    /// Server-side failures carry database or transport messages, which are
    /// logged but replaced here with a fixed text.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::PersistenceError(_) | Self::Internal(_) => "internal server error".to_string(),
            Self::ChainUnavailable(_) => "blockchain node unavailable, try again later".to_string(),
            Self::PartialFailure { transaction_id, .. } => format!(
                "payment {transaction_id} was verified but event access could not be granted; \
                 contact the event organiser"
            ),
            other => other.to_string(),
        }
    }
}

impl From<RepositoryError> for PaymentError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::DuplicateTransaction(tx) => Self::DuplicateTransaction(tx),
            other => Self::PersistenceError(other.to_string()),
        }
    }
}

impl From<ChainError> for PaymentError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::TransactionNotFound(tx)
            | ChainError::NotConfirmed { tx_id: tx, .. }
            | ChainError::Rejected { tx_id: tx, .. } => Self::TransactionNotFound(tx),
            other => Self::ChainUnavailable(other.to_string()),
        }
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.error_code(), error = %self, "request rejected");
        }

        let details = match &self {
            Self::ReceiverMismatch { expected, actual } => {
                Some(format!("expected {expected}, found {actual}"))
            }
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.public_message(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_are_unprocessable() {
        let err = PaymentError::InsufficientAmount {
            expected: MicroAlgos::new(5_000_000),
            actual: MicroAlgos::new(4_999_999),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), 4004);
        assert_eq!(err.category(), ErrorCategory::Verification);
    }

    #[test]
    fn partial_failure_is_distinct_from_generic_500() {
        let partial = PaymentError::PartialFailure {
            transaction_id: "TX".to_string(),
            reason: "connection reset".to_string(),
        };
        let generic = PaymentError::PersistenceError("connection reset".to_string());
        assert_eq!(partial.status_code(), generic.status_code());
        assert_ne!(partial.error_code(), generic.error_code());
        assert_eq!(partial.category(), ErrorCategory::PartialFailure);
        assert!(partial.public_message().contains("TX"));
        assert!(!partial.public_message().contains("connection reset"));
    }

    #[test]
    fn server_errors_are_sanitized() {
        let err = PaymentError::PersistenceError("password authentication failed".to_string());
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn chain_lookup_failures_map_to_not_found() {
        let err = PaymentError::from(ChainError::NotConfirmed {
            tx_id: "TX".to_string(),
            attempts: 3,
        });
        assert!(matches!(err, PaymentError::TransactionNotFound(ref id) if id == "TX"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = PaymentError::from(ChainError::Unavailable("timeout".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn duplicate_claims_map_to_conflict() {
        let err = PaymentError::from(RepositoryError::DuplicateTransaction("TX".to_string()));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn response_has_error_status() {
        let response = PaymentError::AlreadyMember(EventId::new()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
