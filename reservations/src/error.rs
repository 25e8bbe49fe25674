//! Error taxonomy of the reservation engine.
//!
//! Every rejected command leaves state untouched and yields exactly one
//! [`BookingError`]. Admission denials are not errors; see
//! [`crate::aggregates::admission::DenialReason`].

use crate::types::ReservationStatus;
use bookfair_runtime::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of entity an error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// A stall
    Stall,
    /// A reservation
    Reservation,
    /// A vendor profile
    Vendor,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stall => write!(f, "Stall"),
            Self::Reservation => write!(f, "Reservation"),
            Self::Vendor => write!(f, "Vendor"),
        }
    }
}

/// Errors returned by engine operations
///
/// Quota and race-loss are separate variants so clients can tell
/// "you're at your limit" apart from "someone else got there first".
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingError {
    /// Malformed input, e.g. an empty or duplicated stall list
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// What is wrong with the request
        reason: String,
    },

    /// Unknown stall, reservation or vendor
    #[error("{resource} with id {id} not found")]
    NotFound {
        /// Kind of entity
        resource: Resource,
        /// The identifier that was looked up
        id: String,
    },

    /// At least one requested stall is disabled
    #[error("Stalls are disabled: {}", .stall_codes.join(", "))]
    StallDisabled {
        /// Codes of the disabled stalls
        stall_codes: Vec<String>,
    },

    /// At least one requested stall is held by another active reservation
    #[error("Stalls are already reserved: {}", .stall_codes.join(", "))]
    StallAlreadyReserved {
        /// Codes of the stalls that are taken
        stall_codes: Vec<String>,
    },

    /// The vendor would exceed the active reservation quota
    #[error(
        "Quota exceeded: you already have {current_count} active reservations, \
         requesting {requested} more stalls would exceed the limit of {limit}"
    )]
    QuotaExceeded {
        /// Active (pending or confirmed) reservations the vendor owns now
        current_count: usize,
        /// Number of stalls in the rejected request
        requested: usize,
        /// Configured quota
        limit: usize,
    },

    /// The reservation is not in a status that allows the transition
    #[error("Reservation is {current}, expected {expected}")]
    InvalidState {
        /// Status the reservation is in
        current: ReservationStatus,
        /// Status the operation requires
        expected: ReservationStatus,
    },

    /// The change conflicts with current state, e.g. disabling a reserved stall
    #[error("Conflict: {reason}")]
    Conflict {
        /// Description of the conflict
        reason: String,
    },

    /// A vendor cannot be removed while holding active reservations
    #[error("Vendor still has {count} active reservations")]
    VendorHasActiveReservations {
        /// Number of active reservations
        count: usize,
    },

    /// The caller's role does not permit the operation
    #[error("Forbidden: {reason}")]
    Forbidden {
        /// Why access was refused
        reason: String,
    },

    /// The engine cannot process commands (shutting down or internal failure)
    #[error("Engine unavailable: {reason}")]
    Unavailable {
        /// Cause
        reason: String,
    },
}

impl BookingError {
    /// Shorthand for [`BookingError::InvalidRequest`]
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`BookingError::NotFound`]
    #[must_use]
    pub fn not_found(resource: Resource, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`BookingError::Conflict`]
    #[must_use]
    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`BookingError::Forbidden`]
    #[must_use]
    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::StallDisabled { .. } => "STALL_DISABLED",
            Self::StallAlreadyReserved { .. } => "STALL_ALREADY_RESERVED",
            Self::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Conflict { .. } => "CONFLICT",
            Self::VendorHasActiveReservations { .. } => "VENDOR_HAS_ACTIVE_RESERVATIONS",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::Unavailable { .. } => "UNAVAILABLE",
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(error: StoreError) -> Self {
        Self::Unavailable {
            reason: error.to_string(),
        }
    }
}

/// Result alias for engine operations
pub type BookingResult<T> = Result<T, BookingError>;
