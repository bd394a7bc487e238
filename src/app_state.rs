//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::PaymentService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Payment service for all business logic.
    pub payment_service: Arc<PaymentService>,
}

impl AppState {
    /// Wraps a service for sharing across handlers.
    #[must_use]
    pub fn new(payment_service: PaymentService) -> Self {
        Self {
            payment_service: Arc::new(payment_service),
        }
    }
}
