//! HTTP API handlers.

pub mod admin;
pub mod admission;
pub mod caller;
pub mod error;
pub mod reservations;
pub mod stalls;

pub use caller::{ACTOR_HEADER, Caller, MaybeCaller};
pub use error::AppError;
