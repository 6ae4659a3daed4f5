use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::EngineError;
use crate::proofs::{MediaKind, ProofDecision};
use crate::web::AppState;

use super::{DataListResponse, DataResponse};

/// Locator returned by blob storage after the client uploaded the media
#[derive(Debug, Deserialize)]
pub struct RecordProofRequest {
    pub media_kind: MediaKind,
    pub storage_locator: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewProofRequest {
    pub decision: ProofDecision,
}

/// POST /bookings/{id}/proofs
pub async fn record_proof(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<RecordProofRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let proof = state
        .engine
        .proofs
        .record_proof(
            &caller,
            booking_id,
            request.media_kind,
            &request.storage_locator,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: proof })))
}

/// GET /bookings/{id}/proofs
pub async fn list_proofs(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let proofs = state.engine.proofs.list(&caller, booking_id).await?;
    Ok(Json(DataListResponse { data: proofs }))
}

/// POST /proofs/{id}/review
pub async fn review_proof(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
    Path(proof_id): Path<Uuid>,
    Json(request): Json<ReviewProofRequest>,
) -> Result<impl IntoResponse, EngineError> {
    let proof = state
        .engine
        .proofs
        .review_proof(&caller, proof_id, request.decision)
        .await?;
    Ok(Json(DataResponse { data: proof }))
}
