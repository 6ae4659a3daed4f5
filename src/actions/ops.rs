use axum::{
    extract::State,
    response::{IntoResponse, Json},
};

use crate::auth::AuthUser;
use crate::errors::EngineError;
use crate::web::AppState;

use super::DataResponse;

/// POST /ops/sla-scan
/// Run one SLA sweep now and return its summary
pub async fn run_sla_scan(
    AuthUser(caller): AuthUser,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, EngineError> {
    let report = state.engine.scan_for_sla_breaches(&caller).await?;
    Ok(Json(DataResponse { data: report }))
}
