//! Book fair stall reservation and admission engine.
//!
//! Vendors reserve up to a quota of stalls across the fair's halls, confirm
//! their reservations to receive an admission token, and present that token
//! as a QR code at the gate where staff verify it.
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum)          api::*  ──►  app::Engine
//!                                        │ send_and_read
//!                                        ▼
//!   Write side           Store<FairState, FairAction, FairEnvironment, FairReducer>
//!                          inventory · ledger · admissions · vendors
//!                                        │ Effect::future
//!                                        ▼
//!   Audit                EventSink (InMemoryEventLog)
//!
//!   Read side            projections::{availability, reservations,
//!                                      reconciliation, admission}
//! ```
//!
//! # Guarantees
//!
//! Every command is reduced under the store's write lock, so two vendors
//! racing for the same stall are serialised: one reservation commits and the
//! other is rejected with `STALL_ALREADY_RESERVED`. A stall is held by at most
//! one PENDING or CONFIRMED reservation, and a reservation either takes all
//! of its requested stalls or none.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod projections;
pub mod server;
pub mod types;

pub use aggregates::{FairAction, FairEnvironment, FairReducer, FairState};
pub use app::Engine;
pub use config::Config;
pub use error::{BookingError, BookingResult};
pub use types::*;
