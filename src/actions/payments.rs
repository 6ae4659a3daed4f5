use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::EngineError;
use crate::web::AppState;

use super::DataResponse;

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";
pub const EVENT_ID_HEADER: &str = "X-Razorpay-Event-Id";

#[derive(Debug, Deserialize)]
pub struct CreatePaymentOrderRequest {
    pub amount: i64,
}

/// Ids and signature handed to the client by the provider checkout
#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub provider_order_id: String,
    pub provider_payment_id: String,
    pub signature: String,
}

/// POST /bookings/{id}/payment-order
pub async fn create_payment_order(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<CreatePaymentOrderRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let order = state
        .engine
        .payments
        .create_payment_order(&caller, booking_id, request.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: order })))
}

/// POST /bookings/{id}/payment-confirmation
pub async fn confirm_payment(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let outcome = state
        .engine
        .payments
        .confirm_payment(
            &caller,
            booking_id,
            &request.provider_order_id,
            &request.provider_payment_id,
            &request.signature,
        )
        .await?;
    Ok(Json(DataResponse { data: outcome }))
}

/// POST /payments/webhook
/// Provider webhook. Any non-2xx response makes the provider redeliver.
pub async fn handle_payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, EngineError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook received without a readable signature header");
            EngineError::InvalidSignature
        })?;
    let event_id = headers
        .get(EVENT_ID_HEADER)
        .and_then(|value| value.to_str().ok());

    let ack = state
        .engine
        .payments
        .handle_webhook(&body, signature, event_id)
        .await?;
    Ok(Json(json!({ "status": ack })))
}
