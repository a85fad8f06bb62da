//! Shared collaborators
//!
//! The wall clock used for daily-claim gating and the balance events the
//! ledger publishes to its observers.

pub mod clock;
pub mod events;

pub use clock::{Clock, ManualClock, SystemClock};
pub use events::{BalanceChange, BalanceEvent};
