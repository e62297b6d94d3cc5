//! Cooperative Treasury
//!
//! A share-weighted treasury with built-in governance. Participants deposit
//! value and receive shares one-to-one, withdraw by burning shares, open
//! proposals once they hold enough shares, and vote with their full share
//! balance. A proposal resolves the moment every outstanding share has voted.

pub mod engine;
pub mod error;
pub mod events;
pub mod scenario;
pub mod shared;
pub mod snapshot;
pub mod store;

pub use engine::TreasuryEngine;
pub use error::{TreasuryError, TreasuryResult};
pub use events::{EventJournal, JournalEntry, TreasuryEvent};
pub use scenario::{Scenario, ScenarioReport, Step, StepOutcome};
pub use shared::{SharedTreasury, Treasury};
pub use snapshot::{TreasurySnapshot, SNAPSHOT_VERSION};
pub use store::{FileSnapshotStore, MemorySnapshotStore, SnapshotStore, StorageError, StorageResult};

pub use treasury_common::{days, Amount, Clock, ManualClock, ParticipantId, ProposalId, SystemClock, Timestamp};
pub use treasury_config::TreasuryConfig;
pub use treasury_governance::{GovernanceParams, Proposal, ProposalStatus, VoteChoice, VoteReceipt};
pub use treasury_ledger::{InMemoryValueLedger, TransferError, ValueLedger};

/// Module version information
pub mod version {
    /// The current version of the treasury library
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    #[test]
    fn version_is_available() {
        assert!(!super::version::VERSION.is_empty());
    }
}
