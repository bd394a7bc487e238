//! DTOs for payment, membership and wallet endpoints.
//!
//! ALGO amounts are serialized as decimal strings; micro-ALGO amounts as
//! integers.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    EventId, EventMembership, MembershipRole, PaymentId, PaymentRecord, PaymentStatus,
};
use crate::service::{PaymentIntent, VerifiedPayment, WalletBalance};

/// Request body for `POST /api/v1/payments/event/{event_id}/verify`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    /// ID of the payment transaction submitted by the wallet.
    #[serde(alias = "transactionId")]
    pub transaction_id: String,
    /// Address the payer paid from.
    #[serde(alias = "walletAddress")]
    pub wallet_address: String,
}

/// Response body for `GET /api/v1/payments/event/{event_id}/details`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PaymentIntentResponse {
    /// The user already paid for this event.
    AlreadyPaid {
        /// Verified transaction.
        transaction_id: String,
        /// Verification time.
        verified_at: Option<DateTime<Utc>>,
    },
    /// The user is already a member.
    AlreadyMember {
        /// Role within the event.
        role: MembershipRole,
    },
    /// The user has not joined; joining costs `ticket_price`.
    PaymentRequired {
        /// Event identifier.
        event_id: EventId,
        /// Event title.
        title: String,
        /// Ticket price in ALGO.
        ticket_price: Option<Decimal>,
        /// Wallet that receives the payment.
        wallet_address: Option<String>,
        /// Exact amount to transfer, in micro-ALGO.
        amount_micro_algos: Option<u64>,
        /// `true` when the event can be joined without paying.
        is_free: bool,
    },
}

impl From<PaymentIntent> for PaymentIntentResponse {
    fn from(intent: PaymentIntent) -> Self {
        match intent {
            PaymentIntent::AlreadyPaid {
                transaction_id,
                verified_at,
            } => Self::AlreadyPaid {
                transaction_id,
                verified_at,
            },
            PaymentIntent::AlreadyMember { role } => Self::AlreadyMember { role },
            PaymentIntent::Required(details) => Self::PaymentRequired {
                event_id: details.event_id,
                title: details.title,
                ticket_price: details.ticket_price,
                wallet_address: details.wallet_address,
                amount_micro_algos: details.amount.map(|a| a.get()),
                is_free: details.is_free,
            },
        }
    }
}

/// Response body for a successful verification.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    /// Always `true`; failures are returned as errors.
    pub verified: bool,
    /// Payment row identifier.
    pub payment_id: PaymentId,
    /// Verified transaction.
    pub transaction_id: String,
    /// Amount paid in ALGO.
    pub amount: Decimal,
    /// Amount paid in micro-ALGO.
    pub amount_micro_algos: u64,
    /// Round the transaction was confirmed in.
    pub confirmed_round: Option<u64>,
    /// Verification time.
    pub verified_at: DateTime<Utc>,
}

impl From<VerifiedPayment> for VerifyPaymentResponse {
    fn from(v: VerifiedPayment) -> Self {
        Self {
            verified: true,
            payment_id: v.payment_id,
            transaction_id: v.transaction_id,
            amount: v.amount.to_algos(),
            amount_micro_algos: v.amount.get(),
            confirmed_round: v.confirmed_round,
            verified_at: v.verified_at,
        }
    }
}

/// Response body for `POST /api/v1/payments/event/{event_id}/join-free`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JoinEventResponse {
    /// Event joined.
    pub event_id: EventId,
    /// Role granted.
    pub role: MembershipRole,
    /// Join time.
    pub joined_at: DateTime<Utc>,
}

impl From<EventMembership> for JoinEventResponse {
    fn from(m: EventMembership) -> Self {
        Self {
            event_id: m.event_id,
            role: m.role,
            joined_at: m.joined_at,
        }
    }
}

/// One entry of the payment history.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentHistoryItem {
    /// Payment row identifier.
    pub id: PaymentId,
    /// Event paid for.
    pub event_id: EventId,
    /// Event title, if the event still exists.
    pub event_title: Option<String>,
    /// Submitted transaction.
    pub transaction_id: String,
    /// Wallet the payer claimed to pay from.
    pub wallet_address: String,
    /// Amount observed on chain, in ALGO.
    pub amount: Option<Decimal>,
    /// Verification state.
    pub status: PaymentStatus,
    /// Verification time.
    pub verified_at: Option<DateTime<Utc>>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
}

impl From<PaymentRecord> for PaymentHistoryItem {
    fn from(record: PaymentRecord) -> Self {
        let p = record.payment;
        Self {
            id: p.id,
            event_id: p.event_id,
            event_title: record.event_title,
            transaction_id: p.transaction_id,
            wallet_address: p.wallet_address,
            amount: p.amount,
            status: p.status,
            verified_at: p.verified_at,
            created_at: p.created_at,
        }
    }
}

/// Response body for `GET /api/v1/payments/my-payments`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentHistoryResponse {
    /// Payments, newest first.
    pub data: Vec<PaymentHistoryItem>,
    /// Number of entries.
    pub total: usize,
}

impl From<Vec<PaymentRecord>> for PaymentHistoryResponse {
    fn from(records: Vec<PaymentRecord>) -> Self {
        let data: Vec<PaymentHistoryItem> = records.into_iter().map(Into::into).collect();
        Self {
            total: data.len(),
            data,
        }
    }
}

/// Response body for `GET /api/v1/payments/wallet/{address}/balance`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletBalanceResponse {
    /// Canonical address.
    pub address: String,
    /// Balance in micro-ALGO.
    pub amount_micro_algos: u64,
    /// Balance in ALGO.
    pub amount_algos: Decimal,
}

impl From<WalletBalance> for WalletBalanceResponse {
    fn from(b: WalletBalance) -> Self {
        Self {
            address: b.address.encode(),
            amount_micro_algos: b.amount.get(),
            amount_algos: b.amount.to_algos(),
        }
    }
}
