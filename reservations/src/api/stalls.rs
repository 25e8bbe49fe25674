//! Stall and availability endpoints.
//!
//! - GET /api/stalls - List stalls, filterable by hall, status and size
//! - GET /api/stalls/:id - Get one stall
//! - GET /api/availability - Versioned snapshot of the stall map
//! - GET /api/availability/halls - Per-hall counts for the hall map
//!
//! All of these accept anonymous callers. Vendors additionally see which
//! stalls they hold; staff see who holds each reserved stall.

use super::caller::MaybeCaller;
use super::error::AppError;
use crate::projections::{AvailabilitySnapshot, HallSummary, StallFilter, StallView};
use crate::server::state::AppState;
use crate::types::StallId;
use axum::{
    Json,
    extract::{Path, Query, State},
};

/// List stalls.
///
/// ```bash
/// curl 'http://localhost:8080/api/stalls?hall=Hall%20B&status=AVAILABLE'
/// ```
pub async fn list_stalls(
    State(state): State<AppState>,
    MaybeCaller(viewer): MaybeCaller,
    Query(filter): Query<StallFilter>,
) -> Json<Vec<StallView>> {
    Json(state.engine.list_stalls(viewer, &filter).await)
}

/// Get one stall.
///
/// # Errors
///
/// 404 for an unknown stall.
pub async fn get_stall(
    State(state): State<AppState>,
    MaybeCaller(viewer): MaybeCaller,
    Path(stall_id): Path<StallId>,
) -> Result<Json<StallView>, AppError> {
    Ok(Json(state.engine.get_stall(stall_id, viewer).await?))
}

/// Snapshot of the whole stall map.
///
/// Clients poll this and can skip re-rendering while `version` is unchanged.
pub async fn get_availability(
    State(state): State<AppState>,
    MaybeCaller(viewer): MaybeCaller,
    Query(filter): Query<StallFilter>,
) -> Json<AvailabilitySnapshot> {
    Json(state.engine.snapshot(viewer, &filter).await)
}

/// Per-hall counts.
pub async fn get_hall_summaries(State(state): State<AppState>) -> Json<Vec<HallSummary>> {
    Json(state.engine.hall_summaries().await)
}
