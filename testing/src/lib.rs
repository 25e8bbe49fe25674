//! # Bookfair Testing
//!
//! Testing utilities for reducers and stores of the book fair engine.
//!
//! This crate provides:
//! - Deterministic implementations of Environment traits
//! - The [`ReducerTest`] Given-When-Then builder
//! - Assertion helpers for effects
//!
//! ## Example
//!
//! ```ignore
//! use bookfair_testing::{test_clock, ReducerTest};
//!
//! ReducerTest::new(FairReducer::new())
//!     .with_env(test_environment())
//!     .given_state(FairState::default())
//!     .when_action(FairAction::AddStall { .. })
//!     .then_state(|state| assert_eq!(state.inventory.len(), 1))
//!     .run();
//! ```

use bookfair_core::environment::Clock;
use chrono::{DateTime, Utc};


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use bookfair_testing::mocks::FixedClock;
    /// use bookfair_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (opening morning of the fair, 2025-01-01 09:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which never happens.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T09:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
