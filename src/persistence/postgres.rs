//! PostgreSQL implementation of the payment repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{EventRow, MembershipRow, PaymentRow};
use super::{GrantError, PaymentRepository, RepositoryError};
use crate::domain::{
    Event, EventId, EventMembership, EventPayment, PaymentId, PaymentRecord, PaymentStatus,
    UserId,
};

const PAYMENT_COLUMNS: &str = "p.id, p.event_id, p.user_id, p.transaction_id, p.wallet_address, \
     p.amount, p.status, p.verified_at, p.created_at";

/// PostgreSQL-backed repository using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))
    }
}

fn db_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Database(e.to_string())
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn expect_one_row(rows_affected: u64, payment_id: PaymentId) -> Result<(), RepositoryError> {
    if rows_affected == 0 {
        Err(RepositoryError::PaymentNotFound(payment_id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for PostgresRepository {
    async fn session_user(&self, token: &str) -> Result<Option<UserId>, RepositoryError> {
        let user = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM sessions \
             WHERE token = $1 AND (expires_at IS NULL OR expires_at > now())",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(user.map(UserId::from))
    }

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>, RepositoryError> {
        let row = sqlx::query_as::<_, EventRow>(
            "SELECT id, title, ticket_price, wallet_address, owner_id FROM events WHERE id = $1",
        )
        .bind(event_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(row.map(Event::from))
    }

    async fn find_verified_payment(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<EventPayment>, RepositoryError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM event_payments p \
             WHERE p.event_id = $1 AND p.user_id = $2 AND p.status = $3 \
             ORDER BY p.verified_at DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(event_id.as_uuid())
            .bind(user_id.as_uuid())
            .bind(PaymentStatus::Verified.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.map(EventPayment::try_from).transpose()
    }

    async fn find_membership(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<EventMembership>, RepositoryError> {
        let row = sqlx::query_as::<_, MembershipRow>(
            "SELECT event_id, user_id, role, joined_at FROM event_memberships \
             WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(EventMembership::try_from).transpose()
    }

    async fn insert_membership(
        &self,
        membership: &EventMembership,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO event_memberships (event_id, user_id, role, joined_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(membership.event_id.as_uuid())
        .bind(membership.user_id.as_uuid())
        .bind(membership.role.as_str())
        .bind(membership.joined_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::MembershipExists
            } else {
                db_error(e)
            }
        })?;

        Ok(())
    }

    async fn claim_transaction(&self, payment: &EventPayment) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO event_payments \
             (id, event_id, user_id, transaction_id, wallet_address, amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(payment.id.as_uuid())
        .bind(payment.event_id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(&payment.transaction_id)
        .bind(&payment.wallet_address)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(payment.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::DuplicateTransaction(payment.transaction_id.clone())
            } else {
                db_error(e)
            }
        })?;

        Ok(())
    }

    async fn mark_payment_failed(
        &self,
        payment_id: PaymentId,
        amount: Option<Decimal>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE event_payments SET status = $2, amount = $3 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(payment_id.as_uuid())
        .bind(PaymentStatus::Failed.as_str())
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        expect_one_row(result.rows_affected(), payment_id)
    }

    async fn mark_payment_verified(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
        verified_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE event_payments SET status = $2, amount = $3, verified_at = $4 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(payment_id.as_uuid())
        .bind(PaymentStatus::Verified.as_str())
        .bind(amount)
        .bind(verified_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        expect_one_row(result.rows_affected(), payment_id)
    }

    async fn release_claim(&self, payment_id: PaymentId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM event_payments WHERE id = $1 AND status = 'pending'")
            .bind(payment_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(())
    }

    async fn payments_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<PaymentRecord>, RepositoryError> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS}, e.title AS event_title FROM event_payments p \
             LEFT JOIN events e ON e.id = p.event_id \
             WHERE p.user_id = $1 ORDER BY p.created_at DESC"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.into_iter().map(PaymentRecord::try_from).collect()
    }

    /// Commits the verified payment and the membership in one transaction,
    /// so a failure leaves the claim `pending` and nothing half-granted.
    async fn grant_paid_access(
        &self,
        payment_id: PaymentId,
        amount: Decimal,
        verified_at: DateTime<Utc>,
        membership: &EventMembership,
    ) -> Result<(), GrantError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| GrantError::Payment(db_error(e)))?;

        let result = sqlx::query(
            "UPDATE event_payments SET status = $2, amount = $3, verified_at = $4 \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(payment_id.as_uuid())
        .bind(PaymentStatus::Verified.as_str())
        .bind(amount)
        .bind(verified_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| GrantError::Payment(db_error(e)))?;
        expect_one_row(result.rows_affected(), payment_id).map_err(GrantError::Payment)?;

        sqlx::query(
            "INSERT INTO event_memberships (event_id, user_id, role, joined_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (event_id, user_id) DO NOTHING",
        )
        .bind(membership.event_id.as_uuid())
        .bind(membership.user_id.as_uuid())
        .bind(membership.role.as_str())
        .bind(membership.joined_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| GrantError::Payment(db_error(e)))?;

        tx.commit()
            .await
            .map_err(|e| GrantError::Payment(db_error(e)))
    }
}
