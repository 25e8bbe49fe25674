//! Application layer.

pub mod engine;

pub use engine::{Engine, FairStore};
