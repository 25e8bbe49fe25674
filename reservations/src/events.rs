//! Audit trail of committed changes.
//!
//! Every command the fair reducer commits produces one [`FairEvent`], which
//! is handed to the injected [`EventSink`] from an effect, outside the write
//! lock. Audit records never contain admission tokens.

use crate::types::{Actor, Money, ReservationId, StaffId, StallId, StallSize, VendorId};
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// A committed change, as recorded in the audit trail
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FairEvent {
    /// A stall was added to the inventory
    StallAdded {
        /// Stall ID
        stall_id: StallId,
        /// Stall code
        code: String,
        /// Hall
        hall: String,
        /// Size
        size: StallSize,
        /// Initial price
        price: Money,
        /// When
        at: DateTime<Utc>,
    },
    /// A stall's price changed; existing reservations keep their frozen price
    StallPriceChanged {
        /// Stall ID
        stall_id: StallId,
        /// Stall code
        code: String,
        /// New price
        price: Money,
        /// When
        at: DateTime<Utc>,
    },
    /// A stall was disabled or re-enabled
    StallDisabledChanged {
        /// Stall ID
        stall_id: StallId,
        /// Stall code
        code: String,
        /// New flag
        disabled: bool,
        /// When
        at: DateTime<Utc>,
    },
    /// A reservation was created PENDING
    ReservationCreated {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Reservation code
        code: String,
        /// Owning vendor
        vendor_id: VendorId,
        /// Codes of the reserved stalls
        stall_codes: Vec<String>,
        /// Frozen total
        total: Money,
        /// When
        at: DateTime<Utc>,
    },
    /// A reservation was confirmed and an admission token issued
    ReservationConfirmed {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Reservation code
        code: String,
        /// When
        at: DateTime<Utc>,
    },
    /// A reservation was cancelled
    ReservationCancelled {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Reservation code
        code: String,
        /// Who cancelled
        cancelled_by: Actor,
        /// Stalls whose holds were released
        released: Vec<StallId>,
        /// When
        at: DateTime<Utc>,
    },
    /// One stall was given back from a reservation that stays active
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
    /// Staff collected the stall fee at the venue
    PaymentCollected {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Collecting staff member
        collected_by: StaffId,
        /// Amount collected
        amount: Money,
        /// When
        at: DateTime<Utc>,
    },
    /// A vendor profile was registered or updated
    VendorRegistered {
        /// Vendor ID
        vendor_id: VendorId,
        /// When
        at: DateTime<Utc>,
    },
    /// A vendor profile was removed
    VendorRemoved {
        /// Vendor ID
        vendor_id: VendorId,
        /// When
        at: DateTime<Utc>,
    },
}

impl FairEvent {
    /// Stable event type name, used in logs and metrics
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::StallAdded { .. } => "stall_added",
            Self::StallPriceChanged { .. } => "stall_price_changed",
            Self::StallDisabledChanged { .. } => "stall_disabled_changed",
            Self::ReservationCreated { .. } => "reservation_created",
            Self::ReservationConfirmed { .. } => "reservation_confirmed",
            Self::ReservationCancelled { .. } => "reservation_cancelled",
            Self::StallReleased { .. } => "stall_released",
            Self::PaymentCollected { .. } => "payment_collected",
            Self::VendorRegistered { .. } => "vendor_registered",
            Self::VendorRemoved { .. } => "vendor_removed",
        }
    }
}

/// Errors from publishing audit events
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventSinkError {
    /// The sink no longer accepts events
    #[error("Event sink is closed")]
    Closed,
    /// The backing store failed
    #[error("Event sink failure: {0}")]
    Backend(String),
}

/// Destination for audit events
///
/// Returns `BoxFuture` rather than an async fn so the trait stays object safe.
pub trait EventSink: Send + Sync {
    /// Publish one event, returning its sequence number
    fn publish(&self, event: FairEvent) -> BoxFuture<'_, Result<u64, EventSinkError>>;
}

/// An event with its position in the log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// 1-based position, gap-free
    pub sequence: u64,
    /// The event
    pub event: FairEvent,
}

/// Append-only in-memory audit log
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<RecordedEvent>>,
}

impl InMemoryEventLog {
    /// Creates an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events with a sequence number greater than `after`, oldest first
    pub async fn events_since(&self, after: u64) -> Vec<RecordedEvent> {
        let events = self.events.read().await;
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(events.len());
        events[start..].to_vec()
    }

    /// Number of recorded events
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Whether nothing was recorded yet
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl EventSink for InMemoryEventLog {
    fn publish(&self, event: FairEvent) -> BoxFuture<'_, Result<u64, EventSinkError>> {
        Box::pin(async move {
            let mut events = self.events.write().await;
            let sequence = events.len() as u64 + 1;
            tracing::debug!(sequence, event_type = event.event_type(), "Recorded audit event");
            events.push(RecordedEvent { sequence, event });
            Ok(sequence)
        })
    }
}
