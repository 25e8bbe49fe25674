//! Gate scanning endpoint.
//!
//! - POST /api/admission/verify - Verify a scanned token (employee or admin)
//!
//! A denied token is a normal outcome and answers 200 with `granted: false`.

use super::caller::Caller;
use super::error::AppError;
use crate::projections::AdmissionVerdict;
use crate::server::state::AppState;
use axum::{Json, extract::State};
use serde::Deserialize;

/// Scanned QR payload.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// The token exactly as scanned
    pub token: String,
}

/// Verify a scanned admission token.
///
/// # Errors
///
/// 400 for an empty token, 403 for vendors.
pub async fn verify_admission(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<AdmissionVerdict>, AppError> {
    caller.staff()?;
    if request.token.trim().is_empty() {
        return Err(AppError::bad_request("Token must not be empty"));
    }
    Ok(Json(state.engine.verify_admission(&request.token).await))
}
