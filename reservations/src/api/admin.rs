//! Staff and administrator endpoints.
//!
//! - POST /api/admin/stalls - Add a stall (admin)
//! - PUT /api/admin/stalls/:id/price - Change a stall price (admin)
//! - PUT /api/admin/stalls/:id/disabled - Disable or re-enable a stall (admin)
//! - GET /api/admin/reservations - All reservations, filterable (staff)
//! - POST /api/admin/reservations/:id/payment - Record payment at the venue (staff)
//! - POST /api/admin/vendors - Register or update a vendor profile (admin)
//! - GET /api/admin/vendors/:id/active - Whether a vendor holds active reservations (admin)
//! - DELETE /api/admin/vendors/:id - Remove a vendor without active reservations (admin)
//! - GET /api/admin/audit - Audit trail since a sequence number (admin)

use super::caller::Caller;
use super::error::AppError;
use crate::events::RecordedEvent;
use crate::projections::{ReservationFilter, ReservationView, StallView};
use crate::server::state::AppState;
use crate::types::{Money, ReservationId, StallId, StallSize, VendorId, VendorProfile};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

/// Request to add a stall.
#[derive(Debug, Deserialize)]
pub struct AddStallRequest {
    /// Unique code, e.g. `H-01`
    pub code: String,
    /// Hall name
    pub hall: String,
    /// Size class
    pub size: StallSize,
    /// Price in cents
    pub price: Money,
}

/// Request to change a stall price.
#[derive(Debug, Deserialize)]
pub struct UpdatePriceRequest {
    /// New price in cents
    pub price: Money,
}

/// Request to toggle the disabled flag.
#[derive(Debug, Deserialize)]
pub struct SetDisabledRequest {
    /// Requested flag
    pub disabled: bool,
}

/// Audit trail query.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    /// Return events with a greater sequence number
    #[serde(default)]
    pub since: u64,
}

/// Active reservation check for the user-deletion guard.
#[derive(Debug, Serialize)]
pub struct VendorActivityResponse {
    /// Vendor ID
    pub vendor_id: VendorId,
    /// Whether any reservation is PENDING or CONFIRMED
    pub has_active_reservations: bool,
    /// How many
    pub active_reservations: usize,
}

/// Add a stall.
///
/// # Errors
///
/// 403 unless admin, 400 for an empty or duplicate code or a zero price.
pub async fn add_stall(
    State(state): State<AppState>,
    caller: Caller,
    Json(request): Json<AddStallRequest>,
) -> Result<(StatusCode, Json<StallView>), AppError> {
    caller.admin()?;
    let stall = state
        .engine
        .add_stall(&request.code, &request.hall, request.size, request.price)
        .await?;
    Ok((StatusCode::CREATED, Json(stall)))
}

/// Change the price future reservations pay.
///
/// # Errors
///
/// 403 unless admin, 404 for an unknown stall, 400 for a zero price.
pub async fn update_stall_price(
    State(state): State<AppState>,
    caller: Caller,
    Path(stall_id): Path<StallId>,
    Json(request): Json<UpdatePriceRequest>,
) -> Result<Json<StallView>, AppError> {
    caller.admin()?;
    Ok(Json(
        state
            .engine
            .update_stall_price(stall_id, request.price)
            .await?,
    ))
}

/// Disable or re-enable a stall.
///
/// # Errors
///
/// 403 unless admin, 404 for an unknown stall, 409 when disabling a held stall.
pub async fn set_stall_disabled(
    State(state): State<AppState>,
    caller: Caller,
    Path(stall_id): Path<StallId>,
    Json(request): Json<SetDisabledRequest>,
) -> Result<Json<StallView>, AppError> {
    caller.admin()?;
    Ok(Json(
        state
            .engine
            .set_disabled(stall_id, request.disabled)
            .await?,
    ))
}

/// Every reservation, newest first.
///
/// ```bash
/// curl 'http://localhost:8080/api/admin/reservations?status=CONFIRMED' \
///   -H "x-bookfair-actor: employee:550e8400-e29b-41d4-a716-446655440000"
/// ```
///
/// # Errors
///
/// 403 for vendors.
pub async fn list_reservations(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<ReservationFilter>,
) -> Result<Json<Vec<ReservationView>>, AppError> {
    caller.staff()?;
    Ok(Json(state.engine.list_all_reservations(&filter).await))
}

/// Record that the stall fee was paid at the venue.
///
/// # Errors
///
/// 403 for vendors, 404 for an unknown reservation, 409 unless CONFIRMED.
pub async fn collect_payment(
    State(state): State<AppState>,
    caller: Caller,
    Path(reservation_id): Path<ReservationId>,
) -> Result<Json<ReservationView>, AppError> {
    let staff_id = caller.staff()?;
    Ok(Json(
        state
            .engine
            .collect_payment(reservation_id, staff_id)
            .await?,
    ))
}

/// Register or update a vendor profile.
///
/// # Errors
///
/// 403 unless admin, 400 for an empty name or malformed email.
pub async fn register_vendor(
    State(state): State<AppState>,
    caller: Caller,
    Json(profile): Json<VendorProfile>,
) -> Result<(StatusCode, Json<VendorProfile>), AppError> {
    caller.admin()?;
    let profile = state.engine.register_vendor(profile).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Whether a vendor holds active reservations.
///
/// # Errors
///
/// 403 unless admin.
pub async fn vendor_activity(
    State(state): State<AppState>,
    caller: Caller,
    Path(vendor_id): Path<VendorId>,
) -> Result<Json<VendorActivityResponse>, AppError> {
    caller.admin()?;
    let active_reservations = state.engine.active_reservation_count(vendor_id).await;
    Ok(Json(VendorActivityResponse {
        vendor_id,
        has_active_reservations: active_reservations > 0,
        active_reservations,
    }))
}

/// Remove a vendor profile.
///
/// # Errors
///
/// 403 unless admin, 404 for an unknown vendor, 409 while reservations are active.
pub async fn remove_vendor(
    State(state): State<AppState>,
    caller: Caller,
    Path(vendor_id): Path<VendorId>,
) -> Result<StatusCode, AppError> {
    caller.admin()?;
    state.engine.remove_vendor(vendor_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Audit trail, oldest first.
///
/// # Errors
///
/// 403 unless admin.
pub async fn audit_log(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<RecordedEvent>>, AppError> {
    caller.admin()?;
    Ok(Json(state.audit.events_since(query.since).await))
}
