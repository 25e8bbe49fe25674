//! Vendor reservation endpoints.
//!
//! - POST /api/reservations - Reserve stalls (vendor)
//! - GET /api/reservations/mine - The caller's reservations (vendor)
//! - GET /api/reservations/mine/active - Active reservation count against the quota (vendor)
//! - POST /api/reservations/reconcile - Compare a client cache with the server (vendor)
//! - GET /api/reservations/:id - Get a reservation (owner or staff)
//! - POST /api/reservations/:id/confirm - Confirm and receive the admission token (owner or admin)
//! - POST /api/reservations/:id/cancel - Cancel (owner or staff)
//! - DELETE /api/reservations/:id/stalls/:stall_id - Give back one stall (owner or staff)
//!
//! # Lifecycle
//!
//! ```text
//! PENDING → CONFIRMED
//!    ↓          ↓
//!    └──→ CANCELLED ←┘
//! ```

use super::caller::Caller;
use super::error::AppError;
use crate::projections::{ReconcileReport, ReservationView};
use crate::server::state::AppState;
use crate::types::{ReservationId, StallId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

/// Request to reserve stalls.
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    /// Stalls to reserve, in order; all are reserved or none
    pub stall_ids: Vec<StallId>,
}

/// Reservation IDs a client holds in local storage.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    /// Cached reservation IDs
    #[serde(default)]
    pub cached: Vec<ReservationId>,
}

/// The caller's standing against the reservation quota.
#[derive(Debug, Serialize)]
pub struct ActiveCountResponse {
    /// PENDING or CONFIRMED reservations the caller owns
    pub active_reservations: usize,
    /// Maximum active reservations per vendor
    pub limit: usize,
    /// Stalls the caller may still request
    pub remaining: usize,
}

/// Reserve stalls.
///
/// ```bash
/// curl -X POST http://localhost:8080/api/reservations \
///   -H "x-bookfair-actor: vendor:550e8400-e29b-41d4-a716-446655440000" \
///   -H "Content-Type: application/json" \
///   -d '{"stall_ids": ["660e8400-e29b-41d4-a716-446655440001"]}'
/// ```
///
/// # Errors
///
/// - 400 for an empty, duplicated or unknown stall list
/// - 409 `STALL_DISABLED` / `STALL_ALREADY_RESERVED` with the offending stall codes
/// - 422 `QUOTA_EXCEEDED` with `current_count` and `limit`
pub async fn create_reservation(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<ReservationView>), AppError> {
    let vendor_id = caller.vendor()?;
    let reservation = state
        .engine
        .create_reservation(vendor_id, request.stall_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// The caller's reservations, oldest first.
///
/// # Errors
///
/// 403 for staff callers.
pub async fn list_my_reservations(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<ReservationView>>, AppError> {
    let vendor_id = caller.vendor()?;
    Ok(Json(state.engine.list_reservations_for_vendor(vendor_id).await))
}

/// How many active reservations the caller holds, before they submit more.
///
/// ```bash
/// curl http://localhost:8080/api/reservations/mine/active \
///   -H "x-bookfair-actor: vendor:550e8400-e29b-41d4-a716-446655440000"
/// ```
///
/// # Errors
///
/// 403 for staff callers.
pub async fn my_active_count(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<ActiveCountResponse>, AppError> {
    let vendor_id = caller.vendor()?;
    let active_reservations = state.engine.active_reservation_count(vendor_id).await;
    let limit = state.engine.quota();
    Ok(Json(ActiveCountResponse {
        active_reservations,
        limit,
        remaining: limit.saturating_sub(active_reservations),
    }))
}

/// Compare the client's cached reservations with the server.
///
/// # Errors
///
/// 403 for staff callers.
pub async fn reconcile(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<ReconcileReport>, AppError> {
    let vendor_id = caller.vendor()?;
    Ok(Json(state.engine.reconcile(vendor_id, &request.cached).await))
}

/// Get one reservation.
///
/// # Errors
///
/// 404 for an unknown reservation or another vendor's.
pub async fn get_reservation(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<ReservationView>, AppError> {
    Ok(Json(
        state.engine.get_reservation(reservation_id, actor).await?,
    ))
}

/// Confirm a pending reservation.
///
/// The response to the owning vendor carries the admission token.
///
/// # Errors
///
/// 403 for employees, 404 for unknown or foreign reservations, 409 unless PENDING.
pub async fn confirm_reservation(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<ReservationView>, AppError> {
    Ok(Json(
        state
            .engine
            .confirm_reservation(reservation_id, actor)
            .await?,
    ))
}

/// Cancel a reservation. Cancelling twice is not an error.
///
/// # Errors
///
/// 404 for unknown or foreign reservations.
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<ReservationView>, AppError> {
    Ok(Json(
        state.engine.cancel_reservation(reservation_id, actor).await?,
    ))
}

/// Give back one stall of a reservation.
///
/// # Errors
///
/// 404 for unknown or foreign reservations and stalls the reservation does not hold,
/// 409 once the fee was collected.
pub async fn release_stall(
    State(state): State<AppState>,
    Caller(actor): Caller,
    Path((reservation_id, stall_id)): Path<(ReservationId, StallId)>,
) -> Result<Json<ReservationView>, AppError> {
    Ok(Json(
        state
            .engine
            .release_stall(reservation_id, stall_id, actor)
            .await?,
    ))
}
