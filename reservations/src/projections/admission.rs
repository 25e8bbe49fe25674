//! Gate verification result.

use crate::aggregates::{DenialReason, FairState};
use crate::types::{
    LineItem, Money, PaymentStatus, Reservation, ReservationId, ReservationStatus, VendorId,
    VendorProfile,
};
use serde::{Deserialize, Serialize};

/// What staff see after scanning a valid token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionSummary {
    /// Reservation ID
    pub reservation_id: ReservationId,
    /// Reservation code
    pub reservation_code: String,
    /// Reservation status
    pub status: ReservationStatus,
    /// Owning vendor
    pub vendor_id: VendorId,
    /// Vendor contact details, when registered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<VendorProfile>,
    /// Reserved stalls with frozen prices
    pub stalls: Vec<LineItem>,
    /// Amount due or collected
    pub total_amount: Money,
    /// Whether the fee was collected
    pub payment_status: PaymentStatus,
}

impl AdmissionSummary {
    fn new(reservation: &Reservation, vendor: Option<&VendorProfile>) -> Self {
        Self {
            reservation_id: reservation.id,
            reservation_code: reservation.code.clone(),
            status: reservation.status,
            vendor_id: reservation.vendor_id,
            vendor: vendor.cloned(),
            stalls: reservation.line_items.clone(),
            total_amount: reservation.total_amount(),
            payment_status: reservation.payment.status,
        }
    }
}

/// Outcome of scanning a token at the gate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionVerdict {
    /// Whether the holder may enter
    pub granted: bool,
    /// Why entry was refused
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    /// Reservation details for a granted entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<AdmissionSummary>,
}

impl AdmissionVerdict {
    /// Entry refused
    #[must_use]
    pub const fn denied(reason: DenialReason) -> Self {
        Self {
            granted: false,
            reason: Some(reason),
            summary: None,
        }
    }
}

/// Verifies a scanned token against the current state
///
/// Read-only, so rescanning the same token gives the same verdict until the
/// reservation changes.
#[must_use]
pub fn verify(state: &FairState, token: &str) -> AdmissionVerdict {
    match state.admissions.verify(token, &state.ledger) {
        Ok(reservation) => AdmissionVerdict {
            granted: true,
            reason: None,
            summary: Some(AdmissionSummary::new(
                reservation,
                state.vendor(&reservation.vendor_id),
            )),
        },
        Err(reason) => AdmissionVerdict::denied(reason),
    }
}
