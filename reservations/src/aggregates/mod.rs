//! Write side of the fair.
//!
//! [`fair::FairReducer`] is the only writer. The other modules hold the
//! pieces of state it reduces over and the validation rules for them.

pub mod admission;
pub mod fair;
pub mod inventory;
pub mod ledger;

pub use admission::{
    AdmissionRegistry, DenialReason, RandomTokenGenerator, SequentialTokenGenerator, TokenDigest,
    TokenGenerator,
};
pub use fair::{FairAction, FairEnvironment, FairReducer, FairState};
pub use inventory::Inventory;
pub use ledger::Ledger;
