//! Persistence layer: the repository port and its implementations.
//!
//! [`PaymentRepository`] exposes the handful of typed row operations the
//! payment flow needs. [`PostgresRepository`] is the production store and
//! relies on unique constraints on `event_payments.transaction_id` and
//! `event_memberships (event_id, user_id)`. [`InMemoryRepository`] applies
//! the same rules behind a single lock and backs tests and local runs with
//! persistence disabled.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Event, EventId, EventMembership, EventPayment, PaymentId, PaymentRecord, UserId,
};

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// Failures of a single repository operation.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A payment row with this transaction ID already exists.
    #[error("transaction {0} has already been submitted")]
    DuplicateTransaction(String),

    /// The user already holds a membership for the event.
    #[error("membership already exists")]
    MembershipExists,

    /// No pending payment row with this ID exists.
    #[error("pending payment {0} not found")]
    PaymentNotFound(PaymentId),

    /// The backing store failed.
    #[error("database error: {0}")]
    Database(String),
}

/// Failures of [`PaymentRepository::grant_paid_access`], split by whether
/// the payment row was already committed as verified.
#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    /// Nothing was committed.
    #[error("recording verified payment failed: {0}")]
    Payment(RepositoryError),

    /// The payment is verified but the membership row could not be written.
    #[error("membership grant failed after payment was verified: {0}")]
    Membership(RepositoryError),
}

/// Typed row operations used by the payment flow.
#[async_trait]
pub trait PaymentRepository: Send + Sync + std::fmt::Debug {
    /// Resolves a session token to its user, ignoring expired sessions.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure.
    async fn session_user(&self, token: &str) -> Result<Option<UserId>, RepositoryError>;

    /// Loads an event.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure.
    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>, RepositoryError>;

    /// Finds a `verified` payment by this user for this event.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure.
    async fn find_verified_payment(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<EventPayment>, RepositoryError>;

    /// Finds the user's membership of an event.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure.
    async fn find_membership(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<EventMembership>, RepositoryError>;

    /// Inserts a membership row.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::MembershipExists`] if the (event, user)
    /// pair is already present.
    async fn insert_membership(&self, membership: &EventMembership)
    -> Result<(), RepositoryError>;

    /// Inserts a `pending` payment row, reserving its transaction ID.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::DuplicateTransaction`] if any row already
    /// carries the same transaction ID.
    async fn claim_transaction(&self, payment: &EventPayment) -> Result<(), RepositoryError>;

    /// Moves a pending payment to `failed`, recording the observed amount.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::PaymentNotFound`] if no pending row has
    /// this ID.
    async fn mark_payment_failed(
        &self,
        payment_id: PaymentId,
        amount: Option<Decimal>,
    ) -> Result<(), RepositoryError>;

    /// Moves a pending payment to `verified`.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::PaymentNotFound`] if no pending row has
    /// this ID.
    async fn mark_payment_verified(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
        verified_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Deletes a pending claim so the transaction ID can be submitted again.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure.
    async fn release_claim(&self, payment_id: PaymentId) -> Result<(), RepositoryError>;

    /// Lists a user's payment attempts, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] on store failure.
    async fn payments_for_user(&self, user_id: UserId)
    -> Result<Vec<PaymentRecord>, RepositoryError>;

    /// Marks a payment verified and grants the membership.
    ///
    /// The default runs the two writes one after the other; a membership
    /// that already exists counts as granted. Stores with transactions
    /// should override this to commit both writes together.
    ///
    /// # Errors
    ///
    /// Returns [`GrantError::Payment`] if the payment could not be marked
    /// verified, or [`GrantError::Membership`] if it was but the membership
    /// insert then failed.
    async fn grant_paid_access(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
        verified_at: DateTime<Utc>,
        membership: &EventMembership,
    ) -> Result<(), GrantError> {
        self.mark_payment_verified(payment_id, amount, verified_at)
            .await
            .map_err(GrantError::Payment)?;
        match self.insert_membership(membership).await {
            Ok(()) | Err(RepositoryError::MembershipExists) => Ok(()),
            Err(e) => Err(GrantError::Membership(e)),
        }
    }
}
