//! Reservation ledger.
//!
//! The authoritative record of which vendor holds which stalls. The hold
//! index maps every stall referenced by a PENDING or CONFIRMED reservation
//! to that reservation; a stall appears in it at most once.
//!
//! All mutation goes through `pub(crate)` methods invoked by the fair
//! reducer while the store's write lock is held, so a validation followed
//! by the matching mutation is atomic with respect to every other command.

use crate::aggregates::inventory::Inventory;
use crate::error::{BookingError, Resource};
use crate::types::{
    Actor, AdmissionToken, LineItem, PaymentStatus, Reservation, ReservationId, ReservationStatus,
    StaffId, StallId, VendorId,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// Prefix of human-facing reservation codes
pub const CODE_PREFIX: &str = "RES-";

/// Number of hex characters in a reservation code, unless extended on collision
pub const CODE_HEX_LEN: usize = 8;

/// All reservations plus the stall hold index
#[derive(Clone, Debug, Default)]
pub struct Ledger {
    reservations: HashMap<ReservationId, Reservation>,
    holds: HashMap<StallId, ReservationId>,
    codes: HashMap<String, ReservationId>,
    by_vendor: HashMap<VendorId, Vec<ReservationId>>,
}

impl Ledger {
    /// Creates an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a reservation by ID
    #[must_use]
    pub fn get(&self, id: &ReservationId) -> Option<&Reservation> {
        self.reservations.get(id)
    }

    /// Gets a reservation by its human-facing code
    #[must_use]
    pub fn by_code(&self, code: &str) -> Option<&Reservation> {
        self.codes
            .get(&code.trim().to_ascii_uppercase())
            .and_then(|id| self.reservations.get(id))
    }

    /// Looks up a reservation the actor is allowed to see
    ///
    /// A vendor asking for another vendor's reservation gets the same answer
    /// as for a reservation that does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] when the reservation is unknown or
    /// not visible to the actor.
    pub fn require_visible(
        &self,
        id: &ReservationId,
        actor: &Actor,
    ) -> Result<&Reservation, BookingError> {
        self.get(id)
            .filter(|reservation| reservation.is_visible_to(actor))
            .ok_or_else(|| BookingError::not_found(Resource::Reservation, id))
    }

    /// The active reservation holding a stall, if any
    #[must_use]
    pub fn holder(&self, stall_id: &StallId) -> Option<&Reservation> {
        self.holds
            .get(stall_id)
            .and_then(|id| self.reservations.get(id))
    }

    /// Whether an active reservation holds the stall
    #[must_use]
    pub fn is_held(&self, stall_id: &StallId) -> bool {
        self.holds.contains_key(stall_id)
    }

    /// Number of stalls currently held
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.holds.len()
    }

    /// Number of PENDING or CONFIRMED reservations owned by the vendor
    #[must_use]
    pub fn active_count(&self, vendor_id: VendorId) -> usize {
        self.for_vendor(vendor_id)
            .filter(|reservation| reservation.status.is_active())
            .count()
    }

    /// The vendor's reservations in creation order
    pub fn for_vendor(&self, vendor_id: VendorId) -> impl Iterator<Item = &Reservation> + '_ {
        self.by_vendor
            .get(&vendor_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.reservations.get(id))
    }

    /// All reservations, unordered
    pub fn iter(&self) -> impl Iterator<Item = &Reservation> + '_ {
        self.reservations.values()
    }

    /// Number of reservations ever created
    #[must_use]
    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    /// Whether no reservation was ever created
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    /// Allocates a unique human-facing code for a new reservation
    ///
    /// The code is `RES-` plus the first eight hex digits of the ID. On a
    /// collision the code grows one digit at a time.
    #[must_use]
    pub fn next_code(&self, id: &ReservationId) -> String {
        let hex = id.as_uuid().simple().to_string().to_ascii_uppercase();
        (CODE_HEX_LEN..=hex.len())
            .map(|len| format!("{CODE_PREFIX}{}", &hex[..len]))
            .find(|code| !self.codes.contains_key(code))
            .unwrap_or_else(|| format!("{CODE_PREFIX}{hex}"))
    }

    /// Validates a reservation request and freezes its line items
    ///
    /// Checks run in order: request shape, disabled stalls, stalls held by
    /// other reservations, and finally the vendor quota. The first failing
    /// check decides the error.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidRequest`]: empty list, duplicates, unknown stalls or reused ID
    /// - [`BookingError::StallDisabled`]: a requested stall is disabled
    /// - [`BookingError::StallAlreadyReserved`]: a requested stall is held
    /// - [`BookingError::QuotaExceeded`]: active count plus requested stalls exceeds `quota`
    pub fn validate_create(
        &self,
        inventory: &Inventory,
        reservation_id: &ReservationId,
        vendor_id: &VendorId,
        stall_ids: &[StallId],
        quota: usize,
    ) -> Result<Vec<LineItem>, BookingError> {
        if self.reservations.contains_key(reservation_id) {
            return Err(BookingError::invalid(format!(
                "Reservation {reservation_id} already exists"
            )));
        }
        if stall_ids.is_empty() {
            return Err(BookingError::invalid("At least one stall must be selected"));
        }

        let mut seen = HashSet::with_capacity(stall_ids.len());
        let mut stalls = Vec::with_capacity(stall_ids.len());
        for stall_id in stall_ids {
            let Some(stall) = inventory.get(stall_id) else {
                return Err(BookingError::invalid(format!("Unknown stall {stall_id}")));
            };
            if !seen.insert(*stall_id) {
                return Err(BookingError::invalid(format!(
                    "Stall {} is selected more than once",
                    stall.code
                )));
            }
            stalls.push(stall);
        }

        let disabled: Vec<String> = stalls
            .iter()
            .filter(|stall| stall.disabled)
            .map(|stall| stall.code.clone())
            .collect();
        if !disabled.is_empty() {
            return Err(BookingError::StallDisabled {
                stall_codes: disabled,
            });
        }

        let taken: Vec<String> = stalls
            .iter()
            .filter(|stall| self.is_held(&stall.id))
            .map(|stall| stall.code.clone())
            .collect();
        if !taken.is_empty() {
            return Err(BookingError::StallAlreadyReserved { stall_codes: taken });
        }

        let current_count = self.active_count(*vendor_id);
        if current_count + stall_ids.len() > quota {
            return Err(BookingError::QuotaExceeded {
                current_count,
                requested: stall_ids.len(),
                limit: quota,
            });
        }

        Ok(stalls
            .into_iter()
            .map(|stall| LineItem {
                stall_id: stall.id,
                stall_code: stall.code.clone(),
                hall: stall.hall.clone(),
                size: stall.size,
                price: stall.price,
            })
            .collect())
    }

    /// Validates a status transition that requires `expected`
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidState`] when the reservation is in another status.
    pub fn expect_status(
        reservation: &Reservation,
        expected: ReservationStatus,
    ) -> Result<(), BookingError> {
        if reservation.status == expected {
            Ok(())
        } else {
            Err(BookingError::InvalidState {
                current: reservation.status,
                expected,
            })
        }
    }

    pub(crate) fn insert(&mut self, reservation: Reservation) {
        if reservation.status.is_active() {
            for stall_id in reservation.stall_ids() {
                self.holds.insert(stall_id, reservation.id);
            }
        }
        self.codes.insert(reservation.code.clone(), reservation.id);
        self.by_vendor
            .entry(reservation.vendor_id)
            .or_default()
            .push(reservation.id);
        self.reservations.insert(reservation.id, reservation);
    }

    pub(crate) fn confirm(
        &mut self,
        id: &ReservationId,
        token: AdmissionToken,
        confirmed_at: DateTime<Utc>,
    ) {
        if let Some(reservation) = self.reservations.get_mut(id) {
            reservation.status = ReservationStatus::Confirmed;
            reservation.confirmed_at = Some(confirmed_at);
            reservation.admission_token = Some(token);
        }
    }

    /// Cancels the reservation and returns the stalls whose holds were released
    ///
    /// Only holds still owned by this reservation are dropped, so a stall that
    /// was meanwhile re-reserved by someone else is never released.
    pub(crate) fn cancel(
        &mut self,
        id: &ReservationId,
        cancelled_by: Actor,
        cancelled_at: DateTime<Utc>,
    ) -> Vec<StallId> {
        let Some(reservation) = self.reservations.get_mut(id) else {
            return Vec::new();
        };
        if reservation.status == ReservationStatus::Cancelled {
            return Vec::new();
        }
        reservation.status = ReservationStatus::Cancelled;
        reservation.cancelled_at = Some(cancelled_at);
        reservation.cancelled_by = Some(cancelled_by);

        let mut released = Vec::new();
        for stall_id in reservation.line_items.iter().map(|item| item.stall_id) {
            if self.holds.get(&stall_id) == Some(id) {
                self.holds.remove(&stall_id);
                released.push(stall_id);
            }
        }
        released
    }

    /// Drops one stall from an active reservation, keeping the others
    pub(crate) fn release_stall(&mut self, id: &ReservationId, stall_id: &StallId) {
        if let Some(reservation) = self.reservations.get_mut(id) {
            reservation.line_items.retain(|item| item.stall_id != *stall_id);
        }
        if self.holds.get(stall_id) == Some(id) {
            self.holds.remove(stall_id);
        }
    }

    pub(crate) fn collect_payment(
        &mut self,
        id: &ReservationId,
        collected_by: StaffId,
        collected_at: DateTime<Utc>,
    ) {
        if let Some(reservation) = self.reservations.get_mut(id) {
            reservation.payment.status = PaymentStatus::Collected;
            reservation.payment.collected_at = Some(collected_at);
            reservation.payment.collected_by = Some(collected_by);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::inventory::new_stall;
    use crate::types::{Money, Payment, StallSize};
    use bookfair_core::environment::Clock;
    use bookfair_testing::test_clock;

    fn inventory(count: usize) -> (Inventory, Vec<StallId>) {
        let mut inventory = Inventory::new();
        let mut ids = Vec::new();
        for n in 1..=count {
            let id = StallId::new();
            inventory.insert(new_stall(
                id,
                format!("A-{n:02}"),
                "Hall A",
                StallSize::Medium,
                Money::from_cents(25_000),
            ));
            ids.push(id);
        }
        (inventory, ids)
    }

    fn reservation(ledger: &Ledger, vendor_id: VendorId, items: Vec<LineItem>) -> Reservation {
        let id = ReservationId::new();
        Reservation {
            id,
            code: ledger.next_code(&id),
            vendor_id,
            line_items: items,
            status: ReservationStatus::Pending,
            created_at: test_clock().now(),
            confirmed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            payment: Payment::due_at_venue(),
            admission_token: None,
        }
    }

    #[test]
    fn validation_order_prefers_disabled_over_taken() {
        let (mut inventory, ids) = inventory(2);
        let mut ledger = Ledger::new();
        let vendor = VendorId::new();

        let items = ledger
            .validate_create(&inventory, &ReservationId::new(), &vendor, &ids[..1], 3)
            .unwrap();
        ledger.insert(reservation(&ledger, vendor, items));
        inventory.set_disabled(&ids[0], true);

        let error = ledger
            .validate_create(&inventory, &ReservationId::new(), &VendorId::new(), &ids, 3)
            .unwrap_err();
        assert_eq!(
            error,
            BookingError::StallDisabled {
                stall_codes: vec!["A-01".to_string()]
            }
        );
    }

    #[test]
    fn rejects_empty_duplicate_and_unknown_stalls() {
        let (inventory, ids) = inventory(1);
        let ledger = Ledger::new();
        let vendor = VendorId::new();
        let rid = ReservationId::new();

        for request in [vec![], vec![ids[0], ids[0]], vec![StallId::new()]] {
            let error = ledger
                .validate_create(&inventory, &rid, &vendor, &request, 3)
                .unwrap_err();
            assert_eq!(error.code(), "INVALID_REQUEST");
        }
    }

    #[test]
    fn quota_counts_active_reservations_plus_requested_stalls() {
        let (inventory, ids) = inventory(4);
        let mut ledger = Ledger::new();
        let vendor = VendorId::new();
        for stall_id in &ids[..2] {
            let items = ledger
                .validate_create(&inventory, &ReservationId::new(), &vendor, &[*stall_id], 3)
                .unwrap();
            ledger.insert(reservation(&ledger, vendor, items));
        }

        let error = ledger
            .validate_create(&inventory, &ReservationId::new(), &vendor, &ids[2..], 3)
            .unwrap_err();
        assert_eq!(
            error,
            BookingError::QuotaExceeded {
                current_count: 2,
                requested: 2,
                limit: 3
            }
        );
    }

    #[test]
    fn cancel_releases_only_own_holds() {
        let (inventory, ids) = inventory(1);
        let mut ledger = Ledger::new();
        let first_vendor = VendorId::new();
        let items = ledger
            .validate_create(&inventory, &ReservationId::new(), &first_vendor, &ids, 3)
            .unwrap();
        let first = reservation(&ledger, first_vendor, items);
        let first_id = first.id;
        ledger.insert(first);

        let released = ledger.cancel(&first_id, Actor::Vendor(first_vendor), test_clock().now());
        assert_eq!(released, ids);
        assert!(!ledger.is_held(&ids[0]));

        let second_vendor = VendorId::new();
        let items = ledger
            .validate_create(&inventory, &ReservationId::new(), &second_vendor, &ids, 3)
            .unwrap();
        let second = reservation(&ledger, second_vendor, items);
        let second_id = second.id;
        ledger.insert(second);

        // Cancelling the first reservation again must not touch the new hold.
        let released = ledger.cancel(&first_id, Actor::Vendor(first_vendor), test_clock().now());
        assert!(released.is_empty());
        assert_eq!(ledger.holder(&ids[0]).unwrap().id, second_id);
    }

    #[test]
    fn codes_extend_on_collision() {
        let mut ledger = Ledger::new();
        let id = ReservationId::new();
        let code = ledger.next_code(&id);
        assert_eq!(code.len(), CODE_PREFIX.len() + CODE_HEX_LEN);
        assert!(code.starts_with("RES-"));
        assert!(code[4..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));

        ledger.codes.insert(code.clone(), ReservationId::new());
        let extended = ledger.next_code(&id);
        assert_eq!(extended.len(), code.len() + 1);
        assert!(extended.starts_with(&code));
    }

    #[test]
    fn vendors_cannot_see_each_others_reservations() {
        let (inventory, ids) = inventory(1);
        let mut ledger = Ledger::new();
        let owner = VendorId::new();
        let items = ledger
            .validate_create(&inventory, &ReservationId::new(), &owner, &ids, 3)
            .unwrap();
        let reservation = reservation(&ledger, owner, items);
        let id = reservation.id;
        ledger.insert(reservation);

        assert!(ledger.require_visible(&id, &Actor::Vendor(owner)).is_ok());
        assert!(ledger.require_visible(&id, &Actor::Admin(StaffId::new())).is_ok());
        assert_eq!(
            ledger
                .require_visible(&id, &Actor::Vendor(VendorId::new()))
                .unwrap_err()
                .code(),
            "NOT_FOUND"
        );
    }
}
