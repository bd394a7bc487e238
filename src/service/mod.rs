//! Service layer: payment resolution, verification and access grants.

pub mod payment_service;

pub use payment_service::{
    EventPaymentDetails, PaymentIntent, PaymentService, VerifiedPayment, WalletBalance,
};
