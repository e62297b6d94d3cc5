//! Error taxonomy seen by treasury callers
//!
//! The ledger and governance crates report their own errors; the engine
//! flattens them into [`TreasuryError`] so a caller matches on one enum.

use thiserror::Error;

use treasury_common::{Amount, ParticipantId, ProposalId};
use treasury_governance::GovernanceError;
use treasury_ledger::{LedgerError, TransferError};

use crate::store::StorageError;

/// Error types for treasury operations
#[derive(Error, Debug)]
pub enum TreasuryError {
    /// Deposit of zero
    #[error("amount must be greater than 0")]
    InvalidAmount,

    /// The custody ledger refused to move value
    #[error("transfer rejected: {0}")]
    TransferRejected(#[from] TransferError),

    /// Withdrawal larger than the caller's share balance
    #[error("not enough shares: requested {requested}, available {available}")]
    InsufficientShares {
        requested: Amount,
        available: Amount,
    },

    /// Author below the proposal creation threshold
    #[error("not enough shares to create proposal: required {required}, held {held}")]
    InsufficientSharesToPropose {
        required: Amount,
        held: Amount,
    },

    /// Voter holds no shares
    #[error("not enough shares to vote")]
    InsufficientSharesToVote,

    /// Unknown proposal id
    #[error("proposal does not exist: {0}")]
    ProposalNotFound(ProposalId),

    /// Proposal already approved or rejected
    #[error("proposal is closed: {0}")]
    ProposalClosed(ProposalId),

    /// Vote after the voting period
    #[error("voting period has ended for proposal {0}")]
    VotingPeriodEnded(ProposalId),

    /// Finalize before the voting period is over
    #[error("voting period is still running for proposal {0}")]
    VotingPeriodActive(ProposalId),

    /// Second vote by the same participant
    #[error("already voted: {voter} on proposal {proposal}")]
    AlreadyVoted {
        proposal: ProposalId,
        voter: ParticipantId,
    },

    /// A balance, the supply or a tally would overflow
    #[error("arithmetic overflow")]
    Overflow,

    /// A snapshot breaks the treasury invariants
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// Snapshot storage failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for treasury operations
pub type TreasuryResult<T> = Result<T, TreasuryError>;

impl From<LedgerError> for TreasuryError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount => TreasuryError::InvalidAmount,
            LedgerError::InsufficientShares { requested, available } => {
                TreasuryError::InsufficientShares { requested, available }
            }
            LedgerError::Overflow => TreasuryError::Overflow,
            LedgerError::SupplyMismatch { .. } => TreasuryError::InvalidSnapshot(err.to_string()),
        }
    }
}

impl From<GovernanceError> for TreasuryError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::ProposalNotFound(id) => TreasuryError::ProposalNotFound(id),
            GovernanceError::ProposalClosed(id) => TreasuryError::ProposalClosed(id),
            GovernanceError::VotingPeriodEnded(id) => TreasuryError::VotingPeriodEnded(id),
            GovernanceError::VotingPeriodActive(id) => TreasuryError::VotingPeriodActive(id),
            GovernanceError::InsufficientSharesToPropose { required, held } => {
                TreasuryError::InsufficientSharesToPropose { required, held }
            }
            GovernanceError::InsufficientSharesToVote => TreasuryError::InsufficientSharesToVote,
            GovernanceError::AlreadyVoted { proposal, voter } => {
                TreasuryError::AlreadyVoted { proposal, voter }
            }
            GovernanceError::Overflow => TreasuryError::Overflow,
            GovernanceError::InvalidRecord(msg) => TreasuryError::InvalidSnapshot(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_flatten() {
        let err: TreasuryError = LedgerError::InsufficientShares { requested: 5, available: 2 }.into();
        assert!(matches!(err, TreasuryError::InsufficientShares { requested: 5, available: 2 }));

        let err: TreasuryError = LedgerError::SupplyMismatch { sum: 3, total: 4 }.into();
        assert!(matches!(err, TreasuryError::InvalidSnapshot(_)));
    }

    #[test]
    fn test_governance_errors_flatten() {
        let err: TreasuryError = GovernanceError::VotingPeriodEnded(ProposalId(3)).into();
        assert!(matches!(err, TreasuryError::VotingPeriodEnded(ProposalId(3))));
        assert_eq!(err.to_string(), "voting period has ended for proposal #3");
    }

    #[test]
    fn test_transfer_error_keeps_reason() {
        let err: TreasuryError = TransferError::Refused("frozen".to_string()).into();
        assert_eq!(err.to_string(), "transfer rejected: transfer refused: frozen");
    }
}
