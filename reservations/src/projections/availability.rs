//! Availability view of the stall map.
//!
//! Built on demand from [`FairState`] under the store's read lock, so a
//! snapshot is always consistent with one state version. Status is derived
//! from the ledger's hold index at build time and never cached.
//!
//! What a viewer sees depends on who they are: anyone gets the status of
//! every stall; a vendor additionally sees which stalls are theirs; staff
//! see who occupies each reserved stall.

use crate::aggregates::FairState;
use crate::types::{
    Actor, Money, PaymentStatus, ReservationId, ReservationStatus, Stall, StallId, StallSize,
    StallStatus, VendorId, VendorProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who occupies a reserved stall, shown to staff only
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    /// Owning vendor
    pub vendor_id: VendorId,
    /// Vendor contact details, when the vendor registered a profile
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<VendorProfile>,
    /// Holding reservation
    pub reservation_id: ReservationId,
    /// Holding reservation code
    pub reservation_code: String,
    /// Holding reservation status
    pub reservation_status: ReservationStatus,
    /// Whether the stall fee was collected
    pub payment_status: PaymentStatus,
}

/// One stall as seen by a viewer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallView {
    /// Stall ID
    pub stall_id: StallId,
    /// Stall code
    pub code: String,
    /// Hall
    pub hall: String,
    /// Size class
    pub size: StallSize,
    /// Current price
    pub price: Money,
    /// Derived status
    pub status: StallStatus,
    /// Held by the viewing vendor
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub mine: bool,
    /// Occupant detail for staff viewers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupant: Option<Occupant>,
}

/// Consistent view of every stall at one state version
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySnapshot {
    /// State version the snapshot was built from
    pub version: u64,
    /// Stalls ordered by code
    pub stalls: Vec<StallView>,
}

/// Stall list filter; every field is optional and they combine with AND
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StallFilter {
    /// Hall name, case-insensitive
    pub hall: Option<String>,
    /// Derived status
    pub status: Option<StallStatus>,
    /// Size class
    pub size: Option<StallSize>,
}

impl StallFilter {
    fn matches(&self, stall: &Stall, status: StallStatus) -> bool {
        self.hall
            .as_deref()
            .is_none_or(|hall| stall.hall.eq_ignore_ascii_case(hall.trim()))
            && self.status.is_none_or(|wanted| wanted == status)
            && self.size.is_none_or(|wanted| wanted == stall.size)
    }
}

/// Overall state of a hall on the map
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HallStatus {
    /// Nothing reserved yet
    Available,
    /// Some stalls reserved, some still free
    Partial,
    /// No stall left to reserve
    Full,
    /// Every stall disabled
    Closed,
}

/// Per-hall counts for the hall map
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallSummary {
    /// Hall name
    pub hall: String,
    /// Number of stalls
    pub total: usize,
    /// Available stalls
    pub available: usize,
    /// Reserved stalls
    pub reserved: usize,
    /// Disabled stalls
    pub disabled: usize,
    /// Overall status
    pub status: HallStatus,
}

impl HallSummary {
    fn new(hall: &str) -> Self {
        Self {
            hall: hall.to_string(),
            total: 0,
            available: 0,
            reserved: 0,
            disabled: 0,
            status: HallStatus::Available,
        }
    }

    fn count(&mut self, status: StallStatus) {
        self.total += 1;
        match status {
            StallStatus::Available => self.available += 1,
            StallStatus::Reserved => self.reserved += 1,
            StallStatus::Disabled => self.disabled += 1,
        }
    }

    const fn derive_status(&self) -> HallStatus {
        if self.disabled == self.total {
            HallStatus::Closed
        } else if self.available == 0 {
            HallStatus::Full
        } else if self.reserved == 0 {
            HallStatus::Available
        } else {
            HallStatus::Partial
        }
    }
}

/// Builds the view of one stall for a viewer
///
/// `viewer` is `None` for anonymous callers.
#[must_use]
pub fn stall_view(state: &FairState, stall: &Stall, viewer: Option<&Actor>) -> StallView {
    let holder = state.ledger.holder(&stall.id);
    let status = StallStatus::derive(stall.disabled, holder.is_some());

    let mine = match (viewer.and_then(Actor::vendor_id), holder) {
        (Some(vendor_id), Some(reservation)) => reservation.vendor_id == vendor_id,
        _ => false,
    };

    let occupant = holder
        .filter(|_| viewer.is_some_and(Actor::is_staff))
        .map(|reservation| Occupant {
            vendor_id: reservation.vendor_id,
            vendor: state.vendor(&reservation.vendor_id).cloned(),
            reservation_id: reservation.id,
            reservation_code: reservation.code.clone(),
            reservation_status: reservation.status,
            payment_status: reservation.payment.status,
        });

    StallView {
        stall_id: stall.id,
        code: stall.code.clone(),
        hall: stall.hall.clone(),
        size: stall.size,
        price: stall.price,
        status,
        mine,
        occupant,
    }
}

/// Builds a snapshot of the stalls matching `filter`
#[must_use]
pub fn snapshot(
    state: &FairState,
    viewer: Option<&Actor>,
    filter: &StallFilter,
) -> AvailabilitySnapshot {
    let stalls = state
        .inventory
        .iter()
        .filter_map(|stall| {
            let view = stall_view(state, stall, viewer);
            filter.matches(stall, view.status).then_some(view)
        })
        .collect();

    AvailabilitySnapshot {
        version: state.version,
        stalls,
    }
}

/// Counts per hall, ordered by hall name
#[must_use]
pub fn hall_summaries(state: &FairState) -> Vec<HallSummary> {
    let mut halls: BTreeMap<&str, HallSummary> = BTreeMap::new();
    for stall in state.inventory.iter() {
        let status = StallStatus::derive(stall.disabled, state.ledger.is_held(&stall.id));
        halls
            .entry(stall.hall.as_str())
            .or_insert_with(|| HallSummary::new(&stall.hall))
            .count(status);
    }

    halls
        .into_values()
        .map(|mut summary| {
            summary.status = summary.derive_status();
            summary
        })
        .collect()
}
