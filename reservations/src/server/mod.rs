//! HTTP server for the fair.
//!
//! Application state, health endpoints and the router.

pub mod health;
pub mod routes;
pub mod state;

pub use health::health_check;
pub use routes::build_router;
pub use state::AppState;
