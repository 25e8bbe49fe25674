//! Engine facade over the fair store.
//!
//! Every write is a [`FairAction`] sent through the store and answered with
//! [`Store::send_and_read`], which reads the outcome under the same write
//! lock the reducer ran under. A caller therefore always gets the result of
//! its own command, never that of a command reduced after it.

use crate::aggregates::{
    FairAction, FairEnvironment, FairReducer, FairState, RandomTokenGenerator,
};
use crate::config::{Config, InventoryConfig};
use crate::error::{BookingError, BookingResult, Resource};
use crate::events::EventSink;
use crate::projections::{
    AdmissionVerdict, AvailabilitySnapshot, HallSummary, ReconcileReport, ReservationFilter,
    ReservationView, StallFilter, StallView, admission, availability, reconciliation,
    reservations,
};
use crate::types::{
    Actor, Money, ReservationId, StaffId, StallId, StallSize, VendorId, VendorProfile,
};
use bookfair_core::environment::SystemClock;
use bookfair_runtime::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;

/// The store type driving the fair
pub type FairStore = Store<FairState, FairAction, FairEnvironment, FairReducer>;

/// Stall reservation and admission engine
#[derive(Clone)]
pub struct Engine {
    store: FairStore,
    quota: usize,
}

impl Engine {
    /// Creates an engine with an empty fair
    #[must_use]
    pub fn new(environment: FairEnvironment) -> Self {
        let quota = environment.quota;
        Self {
            store: Store::new(FairState::new(), FairReducer::new(), environment),
            quota,
        }
    }

    /// Creates a production engine: system clock, random tokens, configured quota
    #[must_use]
    pub fn from_config(config: &Config, events: Arc<dyn EventSink>) -> Self {
        let environment = FairEnvironment::new(
            Arc::new(SystemClock),
            Arc::new(RandomTokenGenerator),
            events,
        )
        .with_quota(config.booking.vendor_quota);

        Self {
            store: Store::with_broadcast_capacity(
                FairState::new(),
                FairReducer::new(),
                environment,
                config.server.broadcast_capacity,
            ),
            quota: config.booking.vendor_quota,
        }
    }

    /// The underlying store
    #[must_use]
    pub const fn store(&self) -> &FairStore {
        &self.store
    }

    /// Sends a command and maps the outcome
    ///
    /// `read` only runs when the command was accepted.
    async fn execute<F, T>(&self, action: FairAction, read: F) -> BookingResult<T>
    where
        F: FnOnce(&FairState) -> BookingResult<T>,
    {
        let (result, _handle) = self
            .store
            .send_and_read(action, |state| match &state.last_error {
                Some(error) => Err(error.clone()),
                None => read(state),
            })
            .await?;
        result
    }

    // ========== Stall inventory ==========

    /// Seeds the configured stalls, returning how many were added
    ///
    /// # Errors
    ///
    /// Fails on the first stall the inventory rejects, e.g. a code that
    /// already exists.
    pub async fn seed(&self, inventory: &InventoryConfig) -> BookingResult<usize> {
        let seeds = inventory.seed_stalls();
        for seed in &seeds {
            self.add_stall(&seed.code, &seed.hall, seed.size, seed.price)
                .await?;
        }
        tracing::info!(
            stalls = seeds.len(),
            halls = inventory.halls.len(),
            "Seeded stall inventory"
        );
        Ok(seeds.len())
    }

    /// Lists stalls matching `filter` as seen by `viewer`
    pub async fn list_stalls(&self, viewer: Option<Actor>, filter: &StallFilter) -> Vec<StallView> {
        self.snapshot(viewer, filter).await.stalls
    }

    /// Gets one stall
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown ID.
    pub async fn get_stall(
        &self,
        stall_id: StallId,
        viewer: Option<Actor>,
    ) -> BookingResult<StallView> {
        self.store
            .state(|state| {
                state
                    .inventory
                    .require(&stall_id)
                    .map(|stall| availability::stall_view(state, stall, viewer.as_ref()))
            })
            .await
    }

    /// Gets one stall by its code
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown code.
    pub async fn stall_by_code(
        &self,
        code: &str,
        viewer: Option<Actor>,
    ) -> BookingResult<StallView> {
        self.store
            .state(|state| {
                state
                    .inventory
                    .by_code(code)
                    .map(|stall| availability::stall_view(state, stall, viewer.as_ref()))
                    .ok_or_else(|| BookingError::not_found(Resource::Stall, code))
            })
            .await
    }

    /// Adds a stall to the inventory
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidRequest`] for an empty or duplicate code, an
    /// empty hall, or a zero price.
    pub async fn add_stall(
        &self,
        code: &str,
        hall: &str,
        size: StallSize,
        price: Money,
    ) -> BookingResult<StallView> {
        let stall_id = StallId::new();
        let action = FairAction::AddStall {
            stall_id,
            code: code.to_string(),
            hall: hall.to_string(),
            size,
            price,
        };
        self.execute(action, move |state| stall_in(state, stall_id)).await
    }

    /// Changes the price future reservations pay for a stall
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown stall,
    /// [`BookingError::InvalidRequest`] for a zero price.
    pub async fn update_stall_price(
        &self,
        stall_id: StallId,
        price: Money,
    ) -> BookingResult<StallView> {
        let action = FairAction::ChangeStallPrice { stall_id, price };
        self.execute(action, move |state| stall_in(state, stall_id)).await
    }

    /// Disables or re-enables a stall
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown stall,
    /// [`BookingError::Conflict`] when disabling a stall held by an active reservation.
    pub async fn set_disabled(
        &self,
        stall_id: StallId,
        disabled: bool,
    ) -> BookingResult<StallView> {
        let action = FairAction::SetStallDisabled { stall_id, disabled };
        self.execute(action, move |state| stall_in(state, stall_id)).await
    }

    // ========== Reservations ==========

    /// Reserves stalls for a vendor, all or nothing
    ///
    /// # Errors
    ///
    /// See [`crate::aggregates::ledger::Ledger::validate_create`] for the
    /// checks and their order.
    pub async fn create_reservation(
        &self,
        vendor_id: VendorId,
        stall_ids: Vec<StallId>,
    ) -> BookingResult<ReservationView> {
        let reservation_id = ReservationId::new();
        let action = FairAction::CreateReservation {
            reservation_id,
            vendor_id,
            stall_ids,
        };
        let view = self
            .execute(action, move |state| {
                reservation_in(state, reservation_id, &Actor::Vendor(vendor_id))
            })
            .await?;
        metrics::counter!("bookfair_reservations_created_total").increment(1);
        Ok(view)
    }

    /// Confirms a pending reservation and issues its admission token
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`], [`BookingError::Forbidden`] for employees,
    /// [`BookingError::InvalidState`] unless PENDING.
    pub async fn confirm_reservation(
        &self,
        reservation_id: ReservationId,
        actor: Actor,
    ) -> BookingResult<ReservationView> {
        let action = FairAction::ConfirmReservation {
            reservation_id,
            actor,
        };
        self.execute(action, move |state| reservation_in(state, reservation_id, &actor))
            .await
    }

    /// Cancels a reservation; cancelling twice succeeds without side effects
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown reservation or another vendor's.
    pub async fn cancel_reservation(
        &self,
        reservation_id: ReservationId,
        actor: Actor,
    ) -> BookingResult<ReservationView> {
        let action = FairAction::CancelReservation {
            reservation_id,
            actor,
        };
        self.execute(action, move |state| reservation_in(state, reservation_id, &actor))
            .await
    }

    /// Gives back one stall; giving back the last one cancels the reservation
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown reservation, another
    /// vendor's, or a stall the reservation does not hold.
    /// [`BookingError::Conflict`] once the fee was collected.
    pub async fn release_stall(
        &self,
        reservation_id: ReservationId,
        stall_id: StallId,
        actor: Actor,
    ) -> BookingResult<ReservationView> {
        let action = FairAction::ReleaseStall {
            reservation_id,
            stall_id,
            actor,
        };
        self.execute(action, move |state| reservation_in(state, reservation_id, &actor))
            .await
    }

    /// Records that staff collected the stall fee
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`], [`BookingError::InvalidState`] unless CONFIRMED.
    pub async fn collect_payment(
        &self,
        reservation_id: ReservationId,
        staff_id: StaffId,
    ) -> BookingResult<ReservationView> {
        let action = FairAction::CollectPayment {
            reservation_id,
            staff_id,
        };
        self.execute(action, move |state| {
            reservation_in(state, reservation_id, &Actor::Employee(staff_id))
        })
        .await
    }

    /// Gets a reservation the actor may see
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown reservation or another vendor's.
    pub async fn get_reservation(
        &self,
        reservation_id: ReservationId,
        actor: Actor,
    ) -> BookingResult<ReservationView> {
        self.store
            .state(|state| reservation_in(state, reservation_id, &actor))
            .await
    }

    /// The vendor's reservations, oldest first
    pub async fn list_reservations_for_vendor(&self, vendor_id: VendorId) -> Vec<ReservationView> {
        self.store
            .state(|state| reservations::for_vendor(state, vendor_id))
            .await
    }

    /// Every reservation matching `filter`, newest first
    pub async fn list_all_reservations(&self, filter: &ReservationFilter) -> Vec<ReservationView> {
        self.store
            .state(|state| reservations::list_all(state, filter))
            .await
    }

    /// Whether the vendor owns a PENDING or CONFIRMED reservation
    pub async fn has_active_reservations(&self, vendor_id: VendorId) -> bool {
        self.active_reservation_count(vendor_id).await > 0
    }

    /// Maximum active reservations per vendor
    #[must_use]
    pub const fn quota(&self) -> usize {
        self.quota
    }

    /// Number of PENDING or CONFIRMED reservations the vendor owns
    pub async fn active_reservation_count(&self, vendor_id: VendorId) -> usize {
        self.store
            .state(|state| state.ledger.active_count(vendor_id))
            .await
    }

    /// Compares a client's cached reservation IDs with the ledger
    pub async fn reconcile(
        &self,
        vendor_id: VendorId,
        cached: &[ReservationId],
    ) -> ReconcileReport {
        self.store
            .state(|state| reconciliation::reconcile(state, vendor_id, cached))
            .await
    }

    // ========== Vendors ==========

    /// Registers or updates a vendor profile
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidRequest`] for an empty name or malformed email.
    pub async fn register_vendor(&self, profile: VendorProfile) -> BookingResult<VendorProfile> {
        let vendor_id = profile.id;
        self.execute(FairAction::RegisterVendor { profile }, move |state| {
            state
                .vendor(&vendor_id)
                .cloned()
                .ok_or_else(|| BookingError::not_found(Resource::Vendor, vendor_id))
        })
        .await
    }

    /// Removes a vendor profile
    ///
    /// # Errors
    ///
    /// [`BookingError::VendorHasActiveReservations`] while the vendor holds
    /// active reservations, [`BookingError::NotFound`] for an unknown vendor.
    pub async fn remove_vendor(&self, vendor_id: VendorId) -> BookingResult<()> {
        self.execute(FairAction::RemoveVendor { vendor_id }, |_| Ok(()))
            .await
    }

    /// Gets a vendor profile
    pub async fn vendor(&self, vendor_id: VendorId) -> Option<VendorProfile> {
        self.store
            .state(|state| state.vendor(&vendor_id).cloned())
            .await
    }

    // ========== Admission ==========

    /// Verifies a token scanned at the gate
    pub async fn verify_admission(&self, token: &str) -> AdmissionVerdict {
        let verdict = self.store.state(|state| admission::verify(state, token)).await;

        let outcome = verdict.reason.map_or("granted", |reason| match reason {
            crate::aggregates::DenialReason::TokenNotFound => "token_not_found",
            crate::aggregates::DenialReason::ReservationCancelled => "reservation_cancelled",
        });
        metrics::counter!("bookfair_admission_verified_total", "outcome" => outcome).increment(1);
        match &verdict.summary {
            Some(summary) => tracing::info!(
                reservation_code = %summary.reservation_code,
                "Admission granted"
            ),
            None => tracing::info!(outcome, "Admission denied"),
        }
        verdict
    }

    // ========== Views ==========

    /// Availability snapshot for `viewer`
    pub async fn snapshot(
        &self,
        viewer: Option<Actor>,
        filter: &StallFilter,
    ) -> AvailabilitySnapshot {
        self.store
            .state(|state| availability::snapshot(state, viewer.as_ref(), filter))
            .await
    }

    /// Per-hall counts for the hall map
    pub async fn hall_summaries(&self) -> Vec<HallSummary> {
        self.store.state(availability::hall_summaries).await
    }

    /// Current state version
    pub async fn version(&self) -> u64 {
        self.store.state(|state| state.version).await
    }

    // ========== Lifecycle ==========

    /// Waits until every in-flight effect finished, up to `timeout`
    ///
    /// Returns whether the store settled in time.
    pub async fn settle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.store.pending_effects() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        true
    }

    /// Rejects new commands and drains in-flight effects
    ///
    /// # Errors
    ///
    /// [`StoreError::ShutdownTimeout`] when effects are still running after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        self.store.shutdown(timeout).await
    }
}

fn stall_in(state: &FairState, stall_id: StallId) -> BookingResult<StallView> {
    state
        .inventory
        .require(&stall_id)
        .map(|stall| availability::stall_view(state, stall, None))
}

fn reservation_in(
    state: &FairState,
    reservation_id: ReservationId,
    actor: &Actor,
) -> BookingResult<ReservationView> {
    state
        .ledger
        .require_visible(&reservation_id, actor)
        .map(|reservation| ReservationView::for_actor(state, reservation, actor))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::aggregates::SequentialTokenGenerator;
    use crate::events::InMemoryEventLog;
    use crate::types::{ReservationStatus, StallStatus};
    use bookfair_testing::test_clock;

    fn engine() -> (Engine, Arc<InMemoryEventLog>) {
        let log = Arc::new(InMemoryEventLog::new());
        let environment = FairEnvironment::new(
            Arc::new(test_clock()),
            Arc::new(SequentialTokenGenerator::new()),
            Arc::clone(&log) as Arc<dyn EventSink>,
        );
        (Engine::new(environment), log)
    }

    fn small_fair() -> InventoryConfig {
        InventoryConfig {
            halls: vec!["Hall A".to_string(), "Hall B".to_string()],
            stalls_per_hall: 3,
            price_small: 25_000,
            price_medium: 40_000,
            price_large: 60_000,
        }
    }

    #[tokio::test]
    async fn seed_creates_configured_stalls() {
        let (engine, _) = engine();
        assert_eq!(engine.seed(&small_fair()).await.unwrap(), 6);

        let stall = engine.stall_by_code("b-02", None).await.unwrap();
        assert_eq!(stall.hall, "Hall B");
        assert_eq!(stall.size, StallSize::Medium);
        assert_eq!(stall.status, StallStatus::Available);

        // Seeding twice collides on codes.
        assert_eq!(
            engine.seed(&small_fair()).await.unwrap_err().code(),
            "INVALID_REQUEST"
        );
    }

    #[tokio::test]
    async fn reservation_round_trip_through_the_store() {
        let (engine, log) = engine();
        engine.seed(&small_fair()).await.unwrap();
        let stall = engine.stall_by_code("A-01", None).await.unwrap();
        let vendor_id = VendorId::new();

        let created = engine
            .create_reservation(vendor_id, vec![stall.stall_id])
            .await
            .unwrap();
        assert_eq!(created.status, ReservationStatus::Pending);
        assert!(engine.has_active_reservations(vendor_id).await);

        let confirmed = engine
            .confirm_reservation(created.id, Actor::Vendor(vendor_id))
            .await
            .unwrap();
        let token = confirmed.admission_token.unwrap();
        assert!(engine.verify_admission(token.as_str()).await.granted);

        engine
            .cancel_reservation(created.id, Actor::Vendor(vendor_id))
            .await
            .unwrap();
        assert!(!engine.verify_admission(token.as_str()).await.granted);
        assert_eq!(engine.active_reservation_count(vendor_id).await, 0);

        assert!(engine.settle(Duration::from_secs(1)).await);
        // 6 stalls + created + confirmed + cancelled
        assert_eq!(log.len().await, 9);
    }

    #[tokio::test]
    async fn rejected_command_reports_its_own_error() {
        let (engine, _) = engine();
        let error = engine
            .set_disabled(StallId::new(), true)
            .await
            .unwrap_err();
        assert_eq!(error.code(), "NOT_FOUND");

        // The next accepted command is not affected by the previous rejection.
        engine.add_stall("Z-01", "Hall Z", StallSize::Large, Money::from_cents(1)).await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_rejects_writes() {
        let (engine, _) = engine();
        engine.shutdown(Duration::from_secs(1)).await.unwrap();
        let error = engine
            .add_stall("A-01", "Hall A", StallSize::Small, Money::from_cents(1))
            .await
            .unwrap_err();
        assert_eq!(error.code(), "UNAVAILABLE");
    }
}
