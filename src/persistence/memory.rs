//! In-memory repository.
//!
//! Holds every table in one [`tokio::sync::RwLock`], so each trait method
//! is atomic and the uniqueness rules of the SQL schema hold without a
//! database. Used by tests and when `PERSISTENCE_ENABLED=false`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::{GrantError, PaymentRepository, RepositoryError};
use crate::domain::{
    Event, EventId, EventMembership, EventPayment, PaymentId, PaymentRecord, PaymentStatus,
    UserId,
};

#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: UserId,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Tables {
    sessions: HashMap<String, Session>,
    events: HashMap<EventId, Event>,
    payments: Vec<EventPayment>,
    memberships: HashMap<(EventId, UserId), EventMembership>,
}

impl Tables {
    fn pending_payment_mut(
        &mut self,
        payment_id: PaymentId,
    ) -> Result<&mut EventPayment, RepositoryError> {
        self.payments
            .iter_mut()
            .find(|p| p.id == payment_id && p.status == PaymentStatus::Pending)
            .ok_or(RepositoryError::PaymentNotFound(payment_id))
    }
}

/// Repository keeping all rows in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session token for a user that never expires.
    pub async fn insert_session(&self, token: impl Into<String>, user_id: UserId) {
        self.insert_session_until(token, user_id, None).await;
    }

    /// Registers a session token valid until `expires_at`.
    pub async fn insert_session_until(
        &self,
        token: impl Into<String>,
        user_id: UserId,
        expires_at: Option<DateTime<Utc>>,
    ) {
        self.tables.write().await.sessions.insert(
            token.into(),
            Session {
                user_id,
                expires_at,
            },
        );
    }

    /// Inserts or replaces an event.
    pub async fn insert_event(&self, event: Event) {
        self.tables.write().await.events.insert(event.id, event);
    }

    /// Returns a snapshot of all payment rows in insertion order.
    pub async fn payments(&self) -> Vec<EventPayment> {
        self.tables.read().await.payments.clone()
    }

    /// Returns a snapshot of all membership rows.
    pub async fn memberships(&self) -> Vec<EventMembership> {
        self.tables.read().await.memberships.values().cloned().collect()
    }
}

#[async_trait]
impl PaymentRepository for InMemoryRepository {
    async fn session_user(&self, token: &str) -> Result<Option<UserId>, RepositoryError> {
        let now = Utc::now();
        Ok(self
            .tables
            .read()
            .await
            .sessions
            .get(token)
            .filter(|s| s.expires_at.is_none_or(|at| at > now))
            .map(|s| s.user_id))
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>, RepositoryError> {
        Ok(self.tables.read().await.events.get(&event_id).cloned())
    }

    async fn find_verified_payment(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<EventPayment>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .payments
            .iter()
            .filter(|p| {
                p.event_id == event_id
                    && p.user_id == user_id
                    && p.status == PaymentStatus::Verified
            })
            .max_by_key(|p| p.verified_at)
            .cloned())
    }

    async fn find_membership(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<EventMembership>, RepositoryError> {
        Ok(self
            .tables
            .read()
            .await
            .memberships
            .get(&(event_id, user_id))
            .cloned())
    }

    async fn insert_membership(
        &self,
        membership: &EventMembership,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let key = (membership.event_id, membership.user_id);
        if tables.memberships.contains_key(&key) {
            return Err(RepositoryError::MembershipExists);
        }
        tables.memberships.insert(key, membership.clone());
        Ok(())
    }

    async fn claim_transaction(&self, payment: &EventPayment) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables
            .payments
            .iter()
            .any(|p| p.transaction_id == payment.transaction_id)
        {
            return Err(RepositoryError::DuplicateTransaction(
                payment.transaction_id.clone(),
            ));
        }
        tables.payments.push(payment.clone());
        Ok(())
    }

    async fn mark_payment_failed(
        &self,
        payment_id: PaymentId,
        amount: Option<Decimal>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let payment = tables.pending_payment_mut(payment_id)?;
        payment.status = PaymentStatus::Failed;
        payment.amount = amount;
        Ok(())
    }

    async fn mark_payment_verified(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
        verified_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        let payment = tables.pending_payment_mut(payment_id)?;
        payment.status = PaymentStatus::Verified;
        payment.amount = Some(amount);
        payment.verified_at = Some(verified_at);
        Ok(())
    }

    async fn release_claim(&self, payment_id: PaymentId) -> Result<(), RepositoryError> {
        self.tables
            .write()
            .await
            .payments
            .retain(|p| !(p.id == payment_id && p.status == PaymentStatus::Pending));
        Ok(())
    }

    async fn payments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PaymentRecord>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut records: Vec<PaymentRecord> = tables
            .payments
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| PaymentRecord {
                payment: p.clone(),
                event_title: tables.events.get(&p.event_id).map(|e| e.title.clone()),
            })
            .collect();
        records.sort_by(|a, b| b.payment.created_at.cmp(&a.payment.created_at));
        Ok(records)
    }

    async fn grant_paid_access(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
        verified_at: DateTime<Utc>,
        membership: &EventMembership,
    ) -> Result<(), GrantError> {
        let mut tables = self.tables.write().await;
        let payment = tables
            .pending_payment_mut(payment_id)
            .map_err(GrantError::Payment)?;
        payment.status = PaymentStatus::Verified;
        payment.amount = Some(amount);
        payment.verified_at = Some(verified_at);
        tables
            .memberships
            .entry((membership.event_id, membership.user_id))
            .or_insert_with(|| membership.clone());
        Ok(())
    }
}
