//! Payment handlers: event payment details, verification, free join,
//! payment history and wallet balance.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::auth::AuthUser;
use crate::api::extract::{ApiJson, ApiPath};
use crate::api::dto::{
    JoinEventResponse, PaymentHistoryResponse, PaymentIntentResponse, VerifyPaymentRequest,
    VerifyPaymentResponse, WalletBalanceResponse,
};
use crate::app_state::AppState;
use crate::domain::EventId;
use crate::error::{ErrorResponse, PaymentError};

/// `GET /payments/event/{event_id}/details`: What joining an event costs.
///
/// # Errors
///
/// Returns [`PaymentError::EventNotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/payments/event/{event_id}/details",
    tag = "Payments",
    summary = "Get event payment details",
    description = "Reports whether the caller already paid for or belongs to the event, otherwise the ticket price, receiving wallet and exact micro-ALGO amount to transfer.",
    params(
        ("event_id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Payment status for the caller", body = PaymentIntentResponse),
        (status = 400, description = "Malformed event ID", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn payment_details(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(event_id): ApiPath<EventId>,
) -> Result<impl IntoResponse, PaymentError> {
    let intent = state
        .payment_service
        .resolve_payment_intent(event_id, user_id)
        .await?;

    Ok(Json(PaymentIntentResponse::from(intent)))
}

/// `POST /payments/event/{event_id}/verify`: Verify a ticket payment.
///
/// # Errors
///
/// Returns a [`PaymentError`] describing why the transaction was not
/// accepted.
#[utoipa::path(
    post,
    path = "/api/v1/payments/event/{event_id}/verify",
    tag = "Payments",
    summary = "Verify a ticket payment",
    description = "Looks the transaction up on the Algorand node, checks it pays the event wallet at least the ticket price, records it and grants membership. Each transaction ID is accepted once.",
    params(
        ("event_id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment verified and access granted", body = VerifyPaymentResponse),
        (status = 400, description = "Malformed body, missing transaction ID or wallet", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 404, description = "Event or transaction not found", body = ErrorResponse),
        (status = 409, description = "Transaction already submitted", body = ErrorResponse),
        (status = 422, description = "Transaction does not pay for the event", body = ErrorResponse),
        (status = 500, description = "Payment recorded but access not granted", body = ErrorResponse),
        (status = 502, description = "Algorand node unavailable", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(event_id): ApiPath<EventId>,
    ApiJson(req): ApiJson<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let verified = state
        .payment_service
        .verify_payment(event_id, user_id, &req.transaction_id, &req.wallet_address)
        .await?;

    Ok(Json(VerifyPaymentResponse::from(verified)))
}

/// `POST /payments/event/{event_id}/join-free`: Join a free event.
///
/// # Errors
///
/// Returns [`PaymentError::NotFree`] for paid events and
/// [`PaymentError::AlreadyMember`] on repeat joins.
#[utoipa::path(
    post,
    path = "/api/v1/payments/event/{event_id}/join-free",
    tag = "Payments",
    summary = "Join a free event",
    description = "Adds the caller as a member of an event whose ticket price is empty or zero.",
    params(
        ("event_id" = uuid::Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 201, description = "Membership created", body = JoinEventResponse),
        (status = 400, description = "Event requires payment", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Already a member", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn join_free_event(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiPath(event_id): ApiPath<EventId>,
) -> Result<impl IntoResponse, PaymentError> {
    let membership = state
        .payment_service
        .join_free_event(event_id, user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(JoinEventResponse::from(membership))))
}

/// `GET /payments/my-payments`: The caller's payment history.
///
/// # Errors
///
/// Returns [`PaymentError::PersistenceError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/payments/my-payments",
    tag = "Payments",
    summary = "List my payments",
    description = "Returns every payment the caller submitted, verified or not, newest first.",
    responses(
        (status = 200, description = "Payment history", body = PaymentHistoryResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn my_payments(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, PaymentError> {
    let records = state.payment_service.list_my_payments(user_id).await?;

    Ok(Json(PaymentHistoryResponse::from(records)))
}

/// `GET /payments/wallet/{address}/balance`: Balance of a wallet.
///
/// # Errors
///
/// Returns [`PaymentError::InvalidRequest`] for malformed addresses and
/// [`PaymentError::ChainUnavailable`] when the node cannot be reached.
#[utoipa::path(
    get,
    path = "/api/v1/payments/wallet/{address}/balance",
    tag = "Payments",
    summary = "Get wallet balance",
    description = "Returns the current balance of an Algorand account so clients can warn before submitting a payment.",
    params(
        ("address" = String, Path, description = "58-character Algorand address"),
    ),
    responses(
        (status = 200, description = "Account balance", body = WalletBalanceResponse),
        (status = 400, description = "Malformed address", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session", body = ErrorResponse),
        (status = 502, description = "Algorand node unavailable", body = ErrorResponse),
    ),
    security(("bearer_auth" = []))
)]
pub async fn wallet_balance(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ApiPath(address): ApiPath<String>,
) -> Result<impl IntoResponse, PaymentError> {
    let balance = state.payment_service.wallet_balance(&address).await?;

    Ok(Json(WalletBalanceResponse::from(balance)))
}

/// Payment routes, mounted under `/api/v1/payments`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/event/{event_id}/details", get(payment_details))
        .route("/event/{event_id}/verify", post(verify_payment))
        .route("/event/{event_id}/join-free", post(join_free_event))
        .route("/my-payments", get(my_payments))
        .route("/wallet/{address}/balance", get(wallet_balance))
}
