//! Reservation listings for vendors and staff.

use crate::aggregates::FairState;
use crate::types::{
    Actor, AdmissionToken, LineItem, Money, Payment, Reservation, ReservationId,
    ReservationStatus, VendorId, VendorProfile,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reservation as returned to callers
///
/// Owners get the admission token so they can render their QR code; staff
/// listings never carry it and are enriched with the vendor profile instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationView {
    /// Reservation ID
    pub id: ReservationId,
    /// Human-facing code
    pub code: String,
    /// Owning vendor
    pub vendor_id: VendorId,
    /// Status
    pub status: ReservationStatus,
    /// Reserved stalls with frozen prices
    pub line_items: Vec<LineItem>,
    /// Sum of the frozen prices
    pub total_amount: Money,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Confirmation time
    pub confirmed_at: Option<DateTime<Utc>>,
    /// Cancellation time
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Who cancelled
    pub cancelled_by: Option<Actor>,
    /// Payment record
    pub payment: Payment,
    /// Admission token, owner views only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admission_token: Option<AdmissionToken>,
    /// Vendor profile, staff views only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<VendorProfile>,
}

impl ReservationView {
    fn base(reservation: &Reservation) -> Self {
        Self {
            id: reservation.id,
            code: reservation.code.clone(),
            vendor_id: reservation.vendor_id,
            status: reservation.status,
            line_items: reservation.line_items.clone(),
            total_amount: reservation.total_amount(),
            created_at: reservation.created_at,
            confirmed_at: reservation.confirmed_at,
            cancelled_at: reservation.cancelled_at,
            cancelled_by: reservation.cancelled_by,
            payment: reservation.payment.clone(),
            admission_token: None,
            vendor: None,
        }
    }

    /// View for the owning vendor, with the token of an active reservation
    #[must_use]
    pub fn for_owner(reservation: &Reservation) -> Self {
        Self {
            admission_token: reservation
                .admission_token
                .clone()
                .filter(|_| reservation.status == ReservationStatus::Confirmed),
            ..Self::base(reservation)
        }
    }

    /// View for staff, enriched with the vendor profile
    #[must_use]
    pub fn for_staff(reservation: &Reservation, vendor: Option<&VendorProfile>) -> Self {
        Self {
            vendor: vendor.cloned(),
            ..Self::base(reservation)
        }
    }

    /// View appropriate for `actor`
    #[must_use]
    pub fn for_actor(state: &FairState, reservation: &Reservation, actor: &Actor) -> Self {
        if actor.is_staff() {
            Self::for_staff(reservation, state.vendor(&reservation.vendor_id))
        } else {
            Self::for_owner(reservation)
        }
    }
}

/// Admin reservation list filter
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationFilter {
    /// Only reservations in this status
    pub status: Option<ReservationStatus>,
    /// Only reservations of this vendor
    pub vendor: Option<VendorId>,
}

impl ReservationFilter {
    fn matches(&self, reservation: &Reservation) -> bool {
        self.status.is_none_or(|status| status == reservation.status)
            && self.vendor.is_none_or(|vendor| vendor == reservation.vendor_id)
    }
}

/// The vendor's reservations, oldest first
#[must_use]
pub fn for_vendor(state: &FairState, vendor_id: VendorId) -> Vec<ReservationView> {
    state
        .ledger
        .for_vendor(vendor_id)
        .map(ReservationView::for_owner)
        .collect()
}

/// Every reservation matching `filter`, newest first
#[must_use]
pub fn list_all(state: &FairState, filter: &ReservationFilter) -> Vec<ReservationView> {
    let mut rows: Vec<ReservationView> = state
        .ledger
        .iter()
        .filter(|reservation| filter.matches(reservation))
        .map(|reservation| {
            ReservationView::for_staff(reservation, state.vendor(&reservation.vendor_id))
        })
        .collect();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.code.cmp(&b.code)));
    rows
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::{FairAction, FairEnvironment, FairReducer, SequentialTokenGenerator};
    use crate::events::InMemoryEventLog;
    use crate::types::{StaffId, StallId, StallSize};
    use bookfair_core::reducer::Reducer;
    use bookfair_testing::test_clock;
    use std::sync::Arc;

    fn fair_with_reservations() -> (FairState, VendorId, ReservationId, ReservationId) {
        let reducer = FairReducer::new();
        let env = FairEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(SequentialTokenGenerator::new()),
            Arc::new(InMemoryEventLog::new()),
        );
        let mut state = FairState::new();
        let stalls: Vec<StallId> = (1..=3).map(|_| StallId::new()).collect();
        for (n, stall_id) in stalls.iter().enumerate() {
            reducer.reduce(
                &mut state,
                FairAction::AddStall {
                    stall_id: *stall_id,
                    code: format!("C-{:02}", n + 1),
                    hall: "Hall C".to_string(),
                    size: StallSize::Large,
                    price: Money::from_cents(60_000),
                },
                &env,
            );
        }

        let vendor_id = VendorId::new();
        let confirmed = ReservationId::new();
        let cancelled = ReservationId::new();
        for (reservation_id, stall_id) in [(confirmed, stalls[0]), (cancelled, stalls[1])] {
            reducer.reduce(
                &mut state,
                FairAction::CreateReservation {
                    reservation_id,
                    vendor_id,
                    stall_ids: vec![stall_id],
                },
                &env,
            );
        }
        reducer.reduce(
            &mut state,
            FairAction::ConfirmReservation {
                reservation_id: confirmed,
                actor: Actor::Vendor(vendor_id),
            },
            &env,
        );
        reducer.reduce(
            &mut state,
            FairAction::CancelReservation {
                reservation_id: cancelled,
                actor: Actor::Vendor(vendor_id),
            },
            &env,
        );
        reducer.reduce(
            &mut state,
            FairAction::CreateReservation {
                reservation_id: ReservationId::new(),
                vendor_id: VendorId::new(),
                stall_ids: vec![stalls[2]],
            },
            &env,
        );
        (state, vendor_id, confirmed, cancelled)
    }

    #[test]
    fn owner_view_carries_token_staff_view_does_not() {
        let (state, vendor_id, confirmed, _) = fair_with_reservations();
        let reservation = state.ledger.get(&confirmed).unwrap();

        let owner = ReservationView::for_actor(&state, reservation, &Actor::Vendor(vendor_id));
        assert!(owner.admission_token.is_some());

        let staff = ReservationView::for_actor(&state, reservation, &Actor::Admin(StaffId::new()));
        assert!(staff.admission_token.is_none());
        let json = serde_json::to_value(&staff).unwrap();
        assert!(json.get("admission_token").is_none());
    }

    #[test]
    fn vendor_listing_is_limited_to_the_vendor() {
        let (state, vendor_id, confirmed, cancelled) = fair_with_reservations();
        let ids: Vec<ReservationId> = for_vendor(&state, vendor_id).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![confirmed, cancelled]);
    }

    #[test]
    fn admin_listing_filters() {
        let (state, vendor_id, confirmed, _) = fair_with_reservations();
        assert_eq!(list_all(&state, &ReservationFilter::default()).len(), 3);

        let filter = ReservationFilter {
            status: Some(ReservationStatus::Confirmed),
            vendor: Some(vendor_id),
        };
        let rows = list_all(&state, &filter);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, confirmed);

        let pending = ReservationFilter {
            status: Some(ReservationStatus::Pending),
            vendor: None,
        };
        assert!(list_all(&state, &pending).iter().all(|r| r.vendor_id != vendor_id));
    }
}
