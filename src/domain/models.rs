//! Rows of the payment and membership tables.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{EventId, MicroAlgos, PaymentId, UserId};

/// An event that may require a ticket payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier.
    pub id: EventId,
    /// Display title.
    pub title: String,
    /// Ticket price in ALGO. `None` or zero means the event is free.
    pub ticket_price: Option<Decimal>,
    /// Algorand address that receives ticket payments.
    pub wallet_address: Option<String>,
    /// User who created the event.
    pub owner_id: UserId,
}

impl Event {
    /// Returns `true` when joining does not require a payment.
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.ticket_price.is_none_or(|price| price <= Decimal::ZERO)
    }

    /// Returns the configured receiving wallet, trimmed, if non-empty.
    #[must_use]
    pub fn payment_wallet(&self) -> Option<&str> {
        self.wallet_address
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty())
    }

    /// Ticket price converted to micro-ALGO, if the event is paid.
    #[must_use]
    pub fn expected_amount(&self) -> Option<MicroAlgos> {
        self.ticket_price
            .filter(|price| *price > Decimal::ZERO)
            .and_then(MicroAlgos::from_algos)
    }
}

/// Lifecycle state of a payment verification attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Transaction ID claimed, chain verification in progress.
    Pending,
    /// Transaction confirmed to pay the event wallet at least the price.
    Verified,
    /// Verification attempt rejected; kept for audit.
    Failed,
}

impl PaymentStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// One payment verification attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayment {
    /// Row identifier.
    pub id: PaymentId,
    /// Event being paid for.
    pub event_id: EventId,
    /// Paying user.
    pub user_id: UserId,
    /// On-chain transaction ID. Unique across all rows.
    pub transaction_id: String,
    /// Wallet address the payer claims to have paid from.
    pub wallet_address: String,
    /// Amount actually transferred, in ALGO. `None` until known.
    pub amount: Option<Decimal>,
    /// Verification state.
    pub status: PaymentStatus,
    /// When the payment reached [`PaymentStatus::Verified`].
    pub verified_at: Option<DateTime<Utc>>,
    /// When the attempt was recorded.
    pub created_at: DateTime<Utc>,
}

impl EventPayment {
    /// Builds a fresh `pending` row claiming `transaction_id`.
    #[must_use]
    pub fn claim(
        event_id: EventId,
        user_id: UserId,
        transaction_id: &str,
        wallet_address: &str,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            event_id,
            user_id,
            transaction_id: transaction_id.to_string(),
            wallet_address: wallet_address.to_string(),
            amount: None,
            status: PaymentStatus::Pending,
            verified_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Role a user holds within an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MembershipRole {
    /// Event creator.
    Owner,
    /// Helper with moderation rights.
    Volunteer,
    /// Regular attendee.
    Member,
}

impl MembershipRole {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Volunteer => "volunteer",
            Self::Member => "member",
        }
    }
}

impl fmt::Display for MembershipRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MembershipRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "volunteer" => Ok(Self::Volunteer),
            "member" => Ok(Self::Member),
            other => Err(format!("unknown membership role: {other}")),
        }
    }
}

/// Grants a user access to an event's private content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMembership {
    /// Event the membership belongs to.
    pub event_id: EventId,
    /// Member user.
    pub user_id: UserId,
    /// Role within the event.
    pub role: MembershipRole,
    /// When the membership was created.
    pub joined_at: DateTime<Utc>,
}

impl EventMembership {
    /// A regular `member` row created now.
    #[must_use]
    pub fn member(event_id: EventId, user_id: UserId) -> Self {
        Self {
            event_id,
            user_id,
            role: MembershipRole::Member,
            joined_at: Utc::now(),
        }
    }
}

/// A payment row joined with its event title, for payment history.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecord {
    /// The payment row.
    pub payment: EventPayment,
    /// Title of the event, if it still exists.
    pub event_title: Option<String>,
}
