//! Read models.
//!
//! Views are computed from [`crate::aggregates::FairState`] while the
//! store's shared read lock is held, so they are never stale with respect
//! to the version they report and never contend with each other.

pub mod admission;
pub mod availability;
pub mod reconciliation;
pub mod reservations;

pub use admission::{AdmissionSummary, AdmissionVerdict};
pub use availability::{
    AvailabilitySnapshot, HallStatus, HallSummary, Occupant, StallFilter, StallView,
};
pub use reconciliation::ReconcileReport;
pub use reservations::{ReservationFilter, ReservationView};
