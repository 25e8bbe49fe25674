//! The fair reducer.
//!
//! Inventory, ledger and admission registry are reduced by one reducer over
//! one state value. The store serializes reductions behind its write lock,
//! so every command validates and commits against the same snapshot: two
//! vendors racing for a stall are ordered, the first commits, and the second
//! sees the stall as held. Disabling a stall goes through the same path and
//! therefore cannot interleave with a reservation being created.
//!
//! Commands that fail validation leave the state untouched apart from
//! `last_error`. Committed commands produce a single effect publishing the
//! matching [`FairEvent`] to the audit sink.

use crate::aggregates::admission::{AdmissionRegistry, TokenDigest, TokenGenerator};
use crate::aggregates::inventory::{Inventory, new_stall};
use crate::aggregates::ledger::Ledger;
use crate::error::{BookingError, Resource};
use crate::events::{EventSink, FairEvent};
use crate::types::{
    Actor, AdmissionToken, Money, Payment, PaymentStatus, Reservation, ReservationId,
    ReservationStatus, StaffId, Stall, StallId, StallSize, StallStatus, VendorId, VendorProfile,
};
use bookfair_core::{SmallVec, effect::Effect, environment::Clock, reducer::Reducer, smallvec};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

/// Default number of active reservations a vendor may hold
pub const DEFAULT_VENDOR_QUOTA: usize = 3;

// ============================================================================
// State
// ============================================================================

/// Complete state of the fair
#[derive(Clone, Debug, Default)]
pub struct FairState {
    /// Stall records
    pub inventory: Inventory,
    /// Reservations and stall holds
    pub ledger: Ledger,
    /// Issued admission token digests
    pub admissions: AdmissionRegistry,
    /// Vendor contact details, used to enrich staff views
    pub vendors: HashMap<VendorId, VendorProfile>,
    /// Incremented by every committed change
    pub version: u64,
    /// Error of the last rejected command; cleared when a command starts
    pub last_error: Option<BookingError>,
    /// Audit events the sink failed to accept
    pub publish_failures: u64,
}

impl FairState {
    /// Creates an empty state
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Derived status of a stall
    #[must_use]
    pub fn stall_status(&self, stall_id: &StallId) -> Option<StallStatus> {
        self.inventory
            .get(stall_id)
            .map(|stall| StallStatus::derive(stall.disabled, self.ledger.is_held(stall_id)))
    }

    /// Vendor profile, when registered
    #[must_use]
    pub fn vendor(&self, vendor_id: &VendorId) -> Option<&VendorProfile> {
        self.vendors.get(vendor_id)
    }

    fn bump(&mut self) {
        self.version += 1;
    }
}

// ============================================================================
// Actions (Commands + Events)
// ============================================================================

/// Actions of the fair reducer
///
/// Commands carry identifiers generated by the caller so that the reducer
/// stays deterministic; events describe committed changes and are what
/// [`FairReducer::apply_event`] applies.
#[derive(Clone, Debug)]
pub enum FairAction {
    // Commands
    /// Add a stall to the inventory
    AddStall {
        /// New stall ID
        stall_id: StallId,
        /// Unique code, normalized to upper case
        code: String,
        /// Hall name
        hall: String,
        /// Size class
        size: StallSize,
        /// Price
        price: Money,
    },

    /// Change the price of a stall for future reservations
    ChangeStallPrice {
        /// Stall ID
        stall_id: StallId,
        /// New price
        price: Money,
    },

    /// Disable or re-enable a stall
    SetStallDisabled {
        /// Stall ID
        stall_id: StallId,
        /// Requested flag
        disabled: bool,
    },

    /// Reserve one or more stalls for a vendor
    CreateReservation {
        /// New reservation ID
        reservation_id: ReservationId,
        /// Requesting vendor
        vendor_id: VendorId,
        /// Requested stalls, in order
        stall_ids: Vec<StallId>,
    },

    /// Confirm a pending reservation and issue its admission token
    ConfirmReservation {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Caller
        actor: Actor,
    },

    /// Cancel a reservation, releasing its stalls
    CancelReservation {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Caller
        actor: Actor,
    },

    /// Give back a single stall of an active reservation
    ReleaseStall {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Stall to release
        stall_id: StallId,
        /// Caller
        actor: Actor,
    },

    /// Record that the stall fee was collected at the venue
    CollectPayment {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Collecting staff member
        staff_id: StaffId,
    },

    /// Register or update a vendor profile
    RegisterVendor {
        /// Profile
        profile: VendorProfile,
    },

    /// Remove a vendor profile
    RemoveVendor {
        /// Vendor ID
        vendor_id: VendorId,
    },

    // Events
    /// A stall was added
    StallAdded {
        /// The new stall
        stall: Stall,
        /// When
        at: DateTime<Utc>,
    },

    /// A stall price changed
    StallPriceChanged {
        /// Stall ID
        stall_id: StallId,
        /// New price
        price: Money,
        /// When
        at: DateTime<Utc>,
    },

    /// A stall was disabled or re-enabled
    StallDisabledChanged {
        /// Stall ID
        stall_id: StallId,
        /// New flag
        disabled: bool,
        /// When
        at: DateTime<Utc>,
    },

    /// A reservation was created
    ReservationCreated {
        /// The reservation, PENDING, with frozen line items
        reservation: Reservation,
    },

    /// A reservation was confirmed
    ReservationConfirmed {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Issued token
        token: AdmissionToken,
        /// Digest of the issued token
        digest: TokenDigest,
        /// When
        at: DateTime<Utc>,
    },

    /// A reservation was cancelled
    ReservationCancelled {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Who cancelled
        cancelled_by: Actor,
        /// When
        at: DateTime<Utc>,
    },

    /// A stall was released from a reservation that stays active
    StallReleased {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Released stall
        stall_id: StallId,
        /// Who released it
        released_by: Actor,
        /// When
        at: DateTime<Utc>,
    },

    /// The stall fee was collected
    PaymentCollected {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Collecting staff member
        collected_by: StaffId,
        /// When
        at: DateTime<Utc>,
    },

    /// A vendor profile was registered or updated
    VendorRegistered {
        /// Profile
        profile: VendorProfile,
    },

    /// A vendor profile was removed
    VendorRemoved {
        /// Vendor ID
        vendor_id: VendorId,
    },

    /// A command was rejected
    ValidationFailed {
        /// Why
        error: BookingError,
    },

    /// The audit sink refused an event
    EventPublishFailed {
        /// Type of the event that was lost
        event_type: String,
        /// Sink error
        error: String,
    },
}

impl FairAction {
    /// Whether this action is a command (as opposed to an event)
    #[must_use]
    pub const fn is_command(&self) -> bool {
        matches!(
            self,
            Self::AddStall { .. }
                | Self::ChangeStallPrice { .. }
                | Self::SetStallDisabled { .. }
                | Self::CreateReservation { .. }
                | Self::ConfirmReservation { .. }
                | Self::CancelReservation { .. }
                | Self::ReleaseStall { .. }
                | Self::CollectPayment { .. }
                | Self::RegisterVendor { .. }
                | Self::RemoveVendor { .. }
        )
    }

    /// Whether this action is an event
    #[must_use]
    pub const fn is_event(&self) -> bool {
        !self.is_command()
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the fair reducer
#[derive(Clone)]
pub struct FairEnvironment {
    /// Clock for timestamps
    pub clock: Arc<dyn Clock>,
    /// Admission token source
    pub tokens: Arc<dyn TokenGenerator>,
    /// Audit event sink
    pub events: Arc<dyn EventSink>,
    /// Maximum active reservations per vendor
    pub quota: usize,
}

impl FairEnvironment {
    /// Creates a new `FairEnvironment` with the default quota
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenGenerator>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            clock,
            tokens,
            events,
            quota: DEFAULT_VENDOR_QUOTA,
        }
    }

    /// Override the vendor quota
    #[must_use]
    pub const fn with_quota(mut self, quota: usize) -> Self {
        self.quota = quota;
        self
    }
}

// ============================================================================
// Reducer
// ============================================================================

type Effects = SmallVec<[Effect<FairAction>; 4]>;

/// Reducer for the whole fair
#[derive(Clone, Debug, Default)]
pub struct FairReducer;

impl FairReducer {
    /// Creates a new `FairReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Applies a committed event, then publishes its audit record
    fn commit(
        state: &mut FairState,
        event: &FairAction,
        audit: FairEvent,
        env: &FairEnvironment,
    ) -> Effects {
        Self::apply_event(state, event);
        tracing::info!(
            event_type = audit.event_type(),
            version = state.version,
            "Committed change"
        );
        metrics::counter!("bookfair_events_committed_total", "type" => audit.event_type())
            .increment(1);

        let sink = Arc::clone(&env.events);
        smallvec![Effect::future(async move {
            let event_type = audit.event_type();
            match sink.publish(audit).await {
                Ok(_) => None,
                Err(error) => Some(FairAction::EventPublishFailed {
                    event_type: event_type.to_string(),
                    error: error.to_string(),
                }),
            }
        })]
    }

    /// Records a rejected command
    fn reject(state: &mut FairState, error: BookingError) -> Effects {
        tracing::warn!(code = error.code(), %error, "Command rejected");
        metrics::counter!("bookfair_commands_rejected_total", "code" => error.code())
            .increment(1);
        Self::apply_event(state, &FairAction::ValidationFailed { error });
        SmallVec::new()
    }

    fn add_stall(
        state: &mut FairState,
        stall_id: StallId,
        code: &str,
        hall: &str,
        size: StallSize,
        price: Money,
        env: &FairEnvironment,
    ) -> Effects {
        if state.inventory.get(&stall_id).is_some() {
            return Self::reject(
                state,
                BookingError::invalid(format!("Stall {stall_id} already exists")),
            );
        }
        let code = match state.inventory.validate_new_stall(code, hall, price) {
            Ok(code) => code,
            Err(error) => return Self::reject(state, error),
        };

        let stall = new_stall(stall_id, code, hall, size, price);
        let at = env.clock.now();
        let audit = FairEvent::StallAdded {
            stall_id,
            code: stall.code.clone(),
            hall: stall.hall.clone(),
            size,
            price,
            at,
        };
        Self::commit(state, &FairAction::StallAdded { stall, at }, audit, env)
    }

    fn change_stall_price(
        state: &mut FairState,
        stall_id: StallId,
        price: Money,
        env: &FairEnvironment,
    ) -> Effects {
        let code = match state.inventory.require(&stall_id) {
            Ok(stall) if stall.price == price => return SmallVec::new(),
            Ok(stall) => stall.code.clone(),
            Err(error) => return Self::reject(state, error),
        };
        if price.is_zero() {
            return Self::reject(
                state,
                BookingError::invalid("Stall price must be greater than zero"),
            );
        }

        let at = env.clock.now();
        let audit = FairEvent::StallPriceChanged {
            stall_id,
            code,
            price,
            at,
        };
        Self::commit(
            state,
            &FairAction::StallPriceChanged { stall_id, price, at },
            audit,
            env,
        )
    }

    fn set_stall_disabled(
        state: &mut FairState,
        stall_id: StallId,
        disabled: bool,
        env: &FairEnvironment,
    ) -> Effects {
        let code = match state.inventory.require(&stall_id) {
            Ok(stall) if stall.disabled == disabled => return SmallVec::new(),
            Ok(stall) => stall.code.clone(),
            Err(error) => return Self::reject(state, error),
        };
        if disabled {
            if let Some(holder) = state.ledger.holder(&stall_id) {
                let error = BookingError::conflict(format!(
                    "Stall {code} is held by reservation {}",
                    holder.code
                ));
                return Self::reject(state, error);
            }
        }

        let at = env.clock.now();
        let audit = FairEvent::StallDisabledChanged {
            stall_id,
            code,
            disabled,
            at,
        };
        Self::commit(
            state,
            &FairAction::StallDisabledChanged {
                stall_id,
                disabled,
                at,
            },
            audit,
            env,
        )
    }

    fn create_reservation(
        state: &mut FairState,
        reservation_id: ReservationId,
        vendor_id: VendorId,
        stall_ids: &[StallId],
        env: &FairEnvironment,
    ) -> Effects {
        let line_items = match state.ledger.validate_create(
            &state.inventory,
            &reservation_id,
            &vendor_id,
            stall_ids,
            env.quota,
        ) {
            Ok(items) => items,
            Err(error) => return Self::reject(state, error),
        };

        let at = env.clock.now();
        let reservation = Reservation {
            id: reservation_id,
            code: state.ledger.next_code(&reservation_id),
            vendor_id,
            line_items,
            status: ReservationStatus::Pending,
            created_at: at,
            confirmed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            payment: Payment::due_at_venue(),
            admission_token: None,
        };
        let audit = FairEvent::ReservationCreated {
            reservation_id,
            code: reservation.code.clone(),
            vendor_id,
            stall_codes: reservation
                .line_items
                .iter()
                .map(|item| item.stall_code.clone())
                .collect(),
            total: reservation.total_amount(),
            at,
        };
        Self::commit(
            state,
            &FairAction::ReservationCreated { reservation },
            audit,
            env,
        )
    }

    fn confirm_reservation(
        state: &mut FairState,
        reservation_id: ReservationId,
        actor: Actor,
        env: &FairEnvironment,
    ) -> Effects {
        if matches!(actor, Actor::Employee(_)) {
            return Self::reject(
                state,
                BookingError::forbidden("Only the owning vendor or an admin can confirm"),
            );
        }
        let code = match state.ledger.require_visible(&reservation_id, &actor) {
            Ok(reservation) => match Ledger::expect_status(reservation, ReservationStatus::Pending)
            {
                Ok(()) => reservation.code.clone(),
                Err(error) => return Self::reject(state, error),
            },
            Err(error) => return Self::reject(state, error),
        };

        let Some((token, digest)) = state.admissions.draw(env.tokens.as_ref()) else {
            tracing::error!(%reservation_id, "Token generator kept producing issued tokens");
            return Self::reject(
                state,
                BookingError::Unavailable {
                    reason: "Could not issue a unique admission token".to_string(),
                },
            );
        };

        let at = env.clock.now();
        let audit = FairEvent::ReservationConfirmed {
            reservation_id,
            code,
            at,
        };
        Self::commit(
            state,
            &FairAction::ReservationConfirmed {
                reservation_id,
                token,
                digest,
                at,
            },
            audit,
            env,
        )
    }

    fn cancel_reservation(
        state: &mut FairState,
        reservation_id: ReservationId,
        actor: Actor,
        env: &FairEnvironment,
    ) -> Effects {
        let (code, released) = match state.ledger.require_visible(&reservation_id, &actor) {
            // Already cancelled: the caller's desired end state holds, nothing to release.
            Ok(reservation) if reservation.status == ReservationStatus::Cancelled => {
                tracing::debug!(%reservation_id, "Reservation already cancelled");
                return SmallVec::new();
            },
            Ok(reservation) => (
                reservation.code.clone(),
                reservation
                    .stall_ids()
                    .filter(|stall_id| {
                        state.ledger.holder(stall_id).map(|r| r.id) == Some(reservation_id)
                    })
                    .collect(),
            ),
            Err(error) => return Self::reject(state, error),
        };

        let at = env.clock.now();
        let audit = FairEvent::ReservationCancelled {
            reservation_id,
            code,
            cancelled_by: actor,
            released,
            at,
        };
        Self::commit(
            state,
            &FairAction::ReservationCancelled {
                reservation_id,
                cancelled_by: actor,
                at,
            },
            audit,
            env,
        )
    }

    fn release_stall(
        state: &mut FairState,
        reservation_id: ReservationId,
        stall_id: StallId,
        actor: Actor,
        env: &FairEnvironment,
    ) -> Effects {
        let remaining = match state.ledger.require_visible(&reservation_id, &actor) {
            Ok(reservation) if reservation.status == ReservationStatus::Cancelled => {
                return SmallVec::new();
            },
            Ok(reservation) if !reservation.holds(stall_id) => {
                let error = BookingError::not_found(Resource::Stall, stall_id);
                return Self::reject(state, error);
            },
            // The collected fee covers every line item; the total is frozen from here on.
            Ok(reservation) if reservation.payment.status == PaymentStatus::Collected => {
                let error = BookingError::conflict(format!(
                    "Fee for reservation {} was already collected",
                    reservation.code
                ));
                return Self::reject(state, error);
            },
            Ok(reservation) => reservation.line_items.len() - 1,
            Err(error) => return Self::reject(state, error),
        };

        // Giving back the last stall ends the reservation.
        if remaining == 0 {
            return Self::cancel_reservation(state, reservation_id, actor, env);
        }

        let at = env.clock.now();
        let audit = FairEvent::StallReleased {
            reservation_id,
            stall_id,
            released_by: actor,
            at,
        };
        Self::commit(
            state,
            &FairAction::StallReleased {
                reservation_id,
                stall_id,
                released_by: actor,
                at,
            },
            audit,
            env,
        )
    }

    fn collect_payment(
        state: &mut FairState,
        reservation_id: ReservationId,
        staff_id: StaffId,
        env: &FairEnvironment,
    ) -> Effects {
        let amount = match state
            .ledger
            .require_visible(&reservation_id, &Actor::Employee(staff_id))
        {
            Ok(reservation) if reservation.payment.status == PaymentStatus::Collected => {
                return SmallVec::new();
            },
            Ok(reservation) => {
                match Ledger::expect_status(reservation, ReservationStatus::Confirmed) {
                    Ok(()) => reservation.total_amount(),
                    Err(error) => return Self::reject(state, error),
                }
            },
            Err(error) => return Self::reject(state, error),
        };

        let at = env.clock.now();
        let audit = FairEvent::PaymentCollected {
            reservation_id,
            collected_by: staff_id,
            amount,
            at,
        };
        Self::commit(
            state,
            &FairAction::PaymentCollected {
                reservation_id,
                collected_by: staff_id,
                at,
            },
            audit,
            env,
        )
    }

    fn register_vendor(
        state: &mut FairState,
        profile: VendorProfile,
        env: &FairEnvironment,
    ) -> Effects {
        if profile.name.trim().is_empty() {
            return Self::reject(state, BookingError::invalid("Vendor name must not be empty"));
        }
        if !profile.email.contains('@') {
            return Self::reject(
                state,
                BookingError::invalid(format!("Invalid vendor email '{}'", profile.email)),
            );
        }

        let audit = FairEvent::VendorRegistered {
            vendor_id: profile.id,
            at: env.clock.now(),
        };
        Self::commit(state, &FairAction::VendorRegistered { profile }, audit, env)
    }

    fn remove_vendor(state: &mut FairState, vendor_id: VendorId, env: &FairEnvironment) -> Effects {
        let count = state.ledger.active_count(vendor_id);
        if count > 0 {
            return Self::reject(state, BookingError::VendorHasActiveReservations { count });
        }
        if !state.vendors.contains_key(&vendor_id) {
            return Self::reject(state, BookingError::not_found(Resource::Vendor, vendor_id));
        }

        let audit = FairEvent::VendorRemoved {
            vendor_id,
            at: env.clock.now(),
        };
        Self::commit(state, &FairAction::VendorRemoved { vendor_id }, audit, env)
    }

    /// Applies an event to state
    ///
    /// Commands are ignored here; they only reach state through the events
    /// they produce.
    pub fn apply_event(state: &mut FairState, action: &FairAction) {
        match action {
            FairAction::StallAdded { stall, .. } => {
                state.inventory.insert(stall.clone());
                state.bump();
            },
            FairAction::StallPriceChanged {
                stall_id, price, ..
            } => {
                state.inventory.set_price(stall_id, *price);
                state.bump();
            },
            FairAction::StallDisabledChanged {
                stall_id, disabled, ..
            } => {
                state.inventory.set_disabled(stall_id, *disabled);
                state.bump();
            },
            FairAction::ReservationCreated { reservation } => {
                state.ledger.insert(reservation.clone());
                state.bump();
            },
            FairAction::ReservationConfirmed {
                reservation_id,
                token,
                digest,
                at,
            } => {
                state.admissions.record(digest.clone(), *reservation_id);
                state.ledger.confirm(reservation_id, token.clone(), *at);
                state.bump();
            },
            FairAction::ReservationCancelled {
                reservation_id,
                cancelled_by,
                at,
            } => {
                state.ledger.cancel(reservation_id, *cancelled_by, *at);
                state.bump();
            },
            FairAction::StallReleased {
                reservation_id,
                stall_id,
                ..
            } => {
                state.ledger.release_stall(reservation_id, stall_id);
                state.bump();
            },
            FairAction::PaymentCollected {
                reservation_id,
                collected_by,
                at,
            } => {
                state.ledger.collect_payment(reservation_id, *collected_by, *at);
                state.bump();
            },
            FairAction::VendorRegistered { profile } => {
                state.vendors.insert(profile.id, profile.clone());
                state.bump();
            },
            FairAction::VendorRemoved { vendor_id } => {
                state.vendors.remove(vendor_id);
                state.bump();
            },
            FairAction::ValidationFailed { error } => {
                state.last_error = Some(error.clone());
            },
            FairAction::EventPublishFailed { event_type, error } => {
                // Don't touch last_error: this is not the outcome of a command
                tracing::error!(
                    event_type = %event_type,
                    error = %error,
                    "Audit event was not recorded"
                );
                state.publish_failures += 1;
            },
            FairAction::AddStall { .. }
            | FairAction::ChangeStallPrice { .. }
            | FairAction::SetStallDisabled { .. }
            | FairAction::CreateReservation { .. }
            | FairAction::ConfirmReservation { .. }
            | FairAction::CancelReservation { .. }
            | FairAction::ReleaseStall { .. }
            | FairAction::CollectPayment { .. }
            | FairAction::RegisterVendor { .. }
            | FairAction::RemoveVendor { .. } => {},
        }
    }
}

impl Reducer for FairReducer {
    type State = FairState;
    type Action = FairAction;
    type Environment = FairEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if action.is_command() {
            state.last_error = None;
        }

        match action {
            // ========== Commands ==========
            FairAction::AddStall {
                stall_id,
                code,
                hall,
                size,
                price,
            } => Self::add_stall(state, stall_id, &code, &hall, size, price, env),
            FairAction::ChangeStallPrice { stall_id, price } => {
                Self::change_stall_price(state, stall_id, price, env)
            },
            FairAction::SetStallDisabled { stall_id, disabled } => {
                Self::set_stall_disabled(state, stall_id, disabled, env)
            },
            FairAction::CreateReservation {
                reservation_id,
                vendor_id,
                stall_ids,
            } => Self::create_reservation(state, reservation_id, vendor_id, &stall_ids, env),
            FairAction::ConfirmReservation {
                reservation_id,
                actor,
            } => Self::confirm_reservation(state, reservation_id, actor, env),
            FairAction::CancelReservation {
                reservation_id,
                actor,
            } => Self::cancel_reservation(state, reservation_id, actor, env),
            FairAction::ReleaseStall {
                reservation_id,
                stall_id,
                actor,
            } => Self::release_stall(state, reservation_id, stall_id, actor, env),
            FairAction::CollectPayment {
                reservation_id,
                staff_id,
            } => Self::collect_payment(state, reservation_id, staff_id, env),
            FairAction::RegisterVendor { profile } => Self::register_vendor(state, profile, env),
            FairAction::RemoveVendor { vendor_id } => Self::remove_vendor(state, vendor_id, env),

            // ========== Events (replay and effect feedback) ==========
            event => {
                Self::apply_event(state, &event);
                SmallVec::new()
            },
        }
    }
}
