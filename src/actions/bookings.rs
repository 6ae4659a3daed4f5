use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::booking_machine::BookingRequest;
use crate::errors::EngineError;
use crate::web::AppState;

use super::DataResponse;

#[derive(Debug, Deserialize)]
pub struct AssignOfficiantRequest {
    pub officiant_id: Uuid,
}

/// POST /bookings
pub async fn create_booking(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Json(request): Json<BookingRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state.engine.bookings.create_booking(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: booking })))
}

/// GET /bookings/{id}
pub async fn get_booking(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state.engine.bookings.get_booking(&caller, booking_id).await?;
    Ok(Json(DataResponse { data: booking }))
}

/// POST /bookings/{id}/assignment
pub async fn assign_officiant(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<AssignOfficiantRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state
        .engine
        .bookings
        .assign_officiant(&caller, booking_id, request.officiant_id)
        .await?;
    Ok(Json(DataResponse { data: booking }))
}

/// POST /bookings/{id}/start
pub async fn start_service(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state.engine.bookings.start_service(&caller, booking_id).await?;
    Ok(Json(DataResponse { data: booking }))
}

/// POST /bookings/{id}/completion
pub async fn complete_booking(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state
        .engine
        .bookings
        .complete_booking(&caller, booking_id)
        .await?;
    Ok(Json(DataResponse { data: booking }))
}

/// POST /bookings/{id}/cancellation
pub async fn cancel_booking(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state.engine.bookings.cancel_booking(&caller, booking_id).await?;
    Ok(Json(DataResponse { data: booking }))
}

/// POST /bookings/{id}/refund
pub async fn refund_booking(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let booking = state.engine.bookings.refund_booking(&caller, booking_id).await?;
    Ok(Json(DataResponse { data: booking }))
}
