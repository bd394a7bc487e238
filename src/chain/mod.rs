//! Algorand chain access: address codec, response normalization, and the
//! node client port used by the verifier.
//!
//! The server never signs or submits transactions. It only reads them back
//! from a node to check what the browser wallet claims to have paid.

pub mod address;
pub mod algod;
pub mod normalize;

use async_trait::async_trait;
use serde_json::Value;

pub use address::{Address, AddressError};
pub use algod::{AlgodClient, AlgodConfig};
pub use normalize::{NormalizeError, NormalizedPaymentTxn, TxnKind, normalize_payment_txn};

use crate::domain::MicroAlgos;

/// Failures talking to the chain node.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The node does not know the transaction.
    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    /// The transaction is still in the pool after polling.
    #[error("transaction {tx_id} not confirmed after {attempts} attempt(s)")]
    NotConfirmed {
        /// Transaction ID that was polled.
        tx_id: String,
        /// Number of lookups performed.
        attempts: u32,
    },

    /// The node dropped the transaction from its pool.
    #[error("transaction {tx_id} rejected by the node: {reason}")]
    Rejected {
        /// Transaction ID.
        tx_id: String,
        /// `pool-error` reported by the node.
        reason: String,
    },

    /// The node could not be reached or answered with a server error.
    #[error("chain node unavailable: {0}")]
    Unavailable(String),

    /// The node answered with a body that is not the expected JSON.
    #[error("invalid chain node response: {0}")]
    InvalidResponse(String),
}

impl ChainError {
    /// Returns `true` when the failure says nothing about the transaction
    /// itself, only about the node.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::InvalidResponse(_))
    }
}

/// Read access to a chain node.
#[async_trait]
pub trait ChainClient: Send + Sync + std::fmt::Debug {
    /// Returns the raw node response for a transaction once it is confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError`] when the transaction is unknown, unconfirmed,
    /// rejected, or the node cannot be queried.
    async fn pending_transaction(&self, tx_id: &str) -> Result<Value, ChainError>;

    /// Returns the current balance of an account.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError`] when the node cannot be queried.
    async fn account_balance(&self, address: &Address) -> Result<MicroAlgos, ChainError>;
}
