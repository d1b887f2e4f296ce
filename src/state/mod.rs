//! Pending-approval state.

pub mod pending;

pub use pending::{PendingAction, PendingActionStore};
