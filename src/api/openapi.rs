//! OpenAPI document for the REST surface.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::dto::{
    JoinEventResponse, PaymentHistoryItem, PaymentHistoryResponse, PaymentIntentResponse,
    VerifyPaymentRequest, VerifyPaymentResponse, WalletBalanceResponse,
};
use crate::api::handlers::{payments, system};
use crate::error::{ErrorBody, ErrorResponse};

/// OpenAPI description of every endpoint, served at
/// `/api-docs/openapi.json` when the `swagger-ui` feature is enabled.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "UniLedger Payments API",
        description = "Algorand ticket payment verification and event access for UniLedger."
    ),
    paths(
        payments::payment_details,
        payments::verify_payment,
        payments::join_free_event,
        payments::my_payments,
        payments::wallet_balance,
        system::health_handler,
    ),
    components(schemas(
        VerifyPaymentRequest,
        VerifyPaymentResponse,
        PaymentIntentResponse,
        JoinEventResponse,
        PaymentHistoryItem,
        PaymentHistoryResponse,
        WalletBalanceResponse,
        ErrorResponse,
        ErrorBody,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "Payments", description = "Ticket payments and event access"),
        (name = "System", description = "Service status"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` security scheme referenced by handlers.
#[derive(Debug)]
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_payment_routes() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/payments/event/{event_id}/details",
            "/api/v1/payments/event/{event_id}/verify",
            "/api/v1/payments/event/{event_id}/join-free",
            "/api/v1/payments/my-payments",
            "/api/v1/payments/wallet/{address}/balance",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
        let has_scheme = doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth"));
        assert!(has_scheme);
    }
}
