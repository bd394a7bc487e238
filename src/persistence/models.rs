//! Database row shapes and their conversion into domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use super::RepositoryError;
use crate::domain::{
    Event, EventMembership, EventPayment, MembershipRole, PaymentRecord, PaymentStatus,
};

/// A row of the `events` table.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    /// Event ID.
    pub id: Uuid,
    /// Display title.
    pub title: String,
    /// Ticket price in ALGO.
    pub ticket_price: Option<Decimal>,
    /// Receiving wallet.
    pub wallet_address: Option<String>,
    /// Owning user.
    pub owner_id: Uuid,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id.into(),
            title: row.title,
            ticket_price: row.ticket_price,
            wallet_address: row.wallet_address,
            owner_id: row.owner_id.into(),
        }
    }
}

/// A row of the `event_payments` table, optionally joined with the event
/// title.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    /// Payment ID.
    pub id: Uuid,
    /// Event paid for.
    pub event_id: Uuid,
    /// Paying user.
    pub user_id: Uuid,
    /// On-chain transaction ID.
    pub transaction_id: String,
    /// Wallet the payer claims to have paid from.
    pub wallet_address: String,
    /// Amount in ALGO.
    pub amount: Option<Decimal>,
    /// `pending`, `verified` or `failed`.
    pub status: String,
    /// Verification timestamp.
    pub verified_at: Option<DateTime<Utc>>,
    /// Insert timestamp.
    pub created_at: DateTime<Utc>,
    /// Joined `events.title`, when selected.
    #[sqlx(default)]
    pub event_title: Option<String>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status: PaymentStatus = row.status.parse().map_err(RepositoryError::Database)?;
        Ok(Self {
            payment: EventPayment {
                id: row.id.into(),
                event_id: row.event_id.into(),
                user_id: row.user_id.into(),
                transaction_id: row.transaction_id,
                wallet_address: row.wallet_address,
                amount: row.amount,
                status,
                verified_at: row.verified_at,
                created_at: row.created_at,
            },
            event_title: row.event_title,
        })
    }
}

impl TryFrom<PaymentRow> for EventPayment {
    type Error = RepositoryError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        PaymentRecord::try_from(row).map(|record| record.payment)
    }
}

/// A row of the `event_memberships` table.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipRow {
    /// Event ID.
    pub event_id: Uuid,
    /// Member user.
    pub user_id: Uuid,
    /// `owner`, `volunteer` or `member`.
    pub role: String,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
}

impl TryFrom<MembershipRow> for EventMembership {
    type Error = RepositoryError;

    fn try_from(row: MembershipRow) -> Result<Self, Self::Error> {
        let role: MembershipRole = row.role.parse().map_err(RepositoryError::Database)?;
        Ok(Self {
            event_id: row.event_id.into(),
            user_id: row.user_id.into(),
            role,
            joined_at: row.joined_at,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn payment_row(status: &str) -> PaymentRow {
        PaymentRow {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            transaction_id: "TX".to_string(),
            wallet_address: "W".to_string(),
            amount: Some(Decimal::from(5)),
            status: status.to_string(),
            verified_at: None,
            created_at: Utc::now(),
            event_title: Some("Gala".to_string()),
        }
    }

    #[test]
    fn payment_row_converts_status() {
        let Ok(record) = PaymentRecord::try_from(payment_row("verified")) else {
            panic!("conversion failed");
        };
        assert_eq!(record.payment.status, PaymentStatus::Verified);
        assert_eq!(record.event_title.as_deref(), Some("Gala"));
    }

    #[test]
    fn unknown_status_is_a_database_error() {
        let result = EventPayment::try_from(payment_row("refunded"));
        assert!(matches!(result, Err(RepositoryError::Database(_))));
    }

    #[test]
    fn membership_row_converts_role() {
        let row = MembershipRow {
            event_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: "owner".to_string(),
            joined_at: Utc::now(),
        };
        let Ok(m) = EventMembership::try_from(row) else {
            panic!("conversion failed");
        };
        assert_eq!(m.role, MembershipRole::Owner);
    }
}
