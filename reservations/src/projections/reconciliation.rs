//! Client cache reconciliation.
//!
//! Clients keep the reservations they made in local storage, which drifts
//! from the server when reservations are cancelled by staff, made on another
//! device, or the storage is edited. The server is authoritative: the report
//! tells the client which cached entries to drop and which to adopt.

use crate::aggregates::FairState;
use crate::projections::reservations::ReservationView;
use crate::types::{ReservationId, VendorId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Difference between a client cache and the ledger
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// State version the report was built from
    pub version: u64,
    /// The vendor's PENDING and CONFIRMED reservations, oldest first
    pub active: Vec<ReservationView>,
    /// Cached IDs the server does not corroborate; discard them
    pub stale: Vec<ReservationId>,
    /// Active reservations absent from the cache; adopt them
    pub missing: Vec<ReservationId>,
}

/// Compares a vendor's cached reservation IDs with the ledger
///
/// A cached ID is stale when it is unknown, cancelled, or owned by another
/// vendor. Duplicates in the cache are reported once.
#[must_use]
pub fn reconcile(
    state: &FairState,
    vendor_id: VendorId,
    cached: &[ReservationId],
) -> ReconcileReport {
    let active: Vec<ReservationView> = state
        .ledger
        .for_vendor(vendor_id)
        .filter(|reservation| reservation.status.is_active())
        .map(ReservationView::for_owner)
        .collect();
    let active_ids: HashSet<ReservationId> = active.iter().map(|view| view.id).collect();

    let mut seen = HashSet::with_capacity(cached.len());
    let stale = cached
        .iter()
        .filter(|id| seen.insert(**id))
        .filter(|id| !active_ids.contains(*id))
        .copied()
        .collect();
    let missing = active
        .iter()
        .map(|view| view.id)
        .filter(|id| !seen.contains(id))
        .collect();

    tracing::debug!(
        %vendor_id,
        cached = cached.len(),
        active = active.len(),
        "Reconciled client cache"
    );

    ReconcileReport {
        version: state.version,
        active,
        stale,
        missing,
    }
}
