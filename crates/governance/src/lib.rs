//! Governance for the cooperative treasury
//!
//! Share-weighted proposals: shareholders above a threshold open proposals,
//! every shareholder votes once with their full current balance, and a
//! proposal resolves as soon as every outstanding share has been cast.
//! Votes are refused once the voting period has passed.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use treasury_common::{Amount, ParticipantId, ProposalId, SECS_PER_DAY};

pub mod book;
pub mod proposal;
pub mod voting;

pub use book::ProposalBook;
pub use proposal::{Proposal, ProposalStatus};
pub use voting::{VoteChoice, VoteReceipt, TIE_OUTCOME};

/// Default voting period: 7 days
pub const DEFAULT_VOTING_PERIOD_SECS: u64 = 7 * SECS_PER_DAY;

/// Error types for governance operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// No proposal with this id was ever created
    #[error("proposal does not exist: {0}")]
    ProposalNotFound(ProposalId),

    /// The proposal has already been approved or rejected
    #[error("proposal is closed: {0}")]
    ProposalClosed(ProposalId),

    /// The voting period of the proposal is over
    #[error("voting period has ended for proposal {0}")]
    VotingPeriodEnded(ProposalId),

    /// The voting period of the proposal is still running
    #[error("voting period is still running for proposal {0}")]
    VotingPeriodActive(ProposalId),

    /// The author holds fewer shares than the creation threshold
    #[error("not enough shares to create proposal: required {required}, held {held}")]
    InsufficientSharesToPropose {
        required: Amount,
        held: Amount,
    },

    /// The voter holds no shares
    #[error("not enough shares to vote")]
    InsufficientSharesToVote,

    /// The voter has already voted on this proposal
    #[error("already voted: {voter} on proposal {proposal}")]
    AlreadyVoted {
        proposal: ProposalId,
        voter: ParticipantId,
    },

    /// A tally would overflow
    #[error("vote tally overflow")]
    Overflow,

    /// A stored proposal record is inconsistent
    #[error("invalid proposal record: {0}")]
    InvalidRecord(String),
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Rules a proposal book runs under
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceParams {
    /// Minimum share balance needed to open a proposal
    pub min_shares_to_propose: Amount,
    /// How long after creation votes are accepted, in seconds
    pub voting_period_secs: u64,
}

impl GovernanceParams {
    /// Create a parameter set
    pub fn new(min_shares_to_propose: Amount, voting_period_secs: u64) -> Self {
        Self {
            min_shares_to_propose,
            voting_period_secs,
        }
    }
}
