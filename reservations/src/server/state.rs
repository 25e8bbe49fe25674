//! Application state shared by the HTTP handlers.

use crate::app::Engine;
use crate::events::InMemoryEventLog;
use std::sync::Arc;

/// Application state shared across all HTTP handlers.
///
/// Cloned per request; both fields are behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Reservation and admission engine (write side and views)
    pub engine: Arc<Engine>,

    /// Audit trail the engine publishes committed events to
    pub audit: Arc<InMemoryEventLog>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(engine: Arc<Engine>, audit: Arc<InMemoryEventLog>) -> Self {
        Self { engine, audit }
    }
}
