//! Common building blocks for the cooperative treasury
//!
//! Identifiers, amounts and the injectable clock used by the ledger,
//! governance and engine crates.

pub mod clock;
pub mod types;

pub use clock::{days, timestamp_secs, Clock, ManualClock, SystemClock, SECS_PER_DAY};
pub use types::{Amount, ParticipantId, ProposalId, Timestamp};
