//! Voting rules
//!
//! The rules are pure functions of a proposal record, the share supply and
//! the current time. Nothing here runs on a timer: the deadline is checked at
//! the moment somebody tries to vote or finalize.

use std::fmt;

use serde::{Serialize, Deserialize};

use treasury_common::{Amount, ParticipantId, ProposalId, Timestamp};

use crate::proposal::{Proposal, ProposalStatus};

/// A ballot choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Yes,
    No,
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteChoice::Yes => f.write_str("yes"),
            VoteChoice::No => f.write_str("no"),
        }
    }
}

/// Outcome of a tie under full participation.
///
/// Approval needs `votes_yes` strictly greater than `votes_no`.
pub const TIE_OUTCOME: ProposalStatus = ProposalStatus::Rejected;

/// What a recorded vote did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    /// Proposal voted on
    pub proposal_id: ProposalId,
    /// Who voted
    pub voter: ParticipantId,
    /// How they voted
    pub choice: VoteChoice,
    /// Shares counted for the vote
    pub weight: Amount,
    /// Status of the proposal after the vote was counted
    pub status: ProposalStatus,
}

impl VoteReceipt {
    /// Whether this vote closed the proposal
    pub fn resolved(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Whether `now` is still inside the proposal's voting period (inclusive)
pub fn within_voting_period(proposal: &Proposal, now: Timestamp, voting_period_secs: u64) -> bool {
    now.saturating_sub(proposal.created_at) <= voting_period_secs
}

/// Whether every outstanding share has been cast on the proposal
pub fn full_participation(proposal: &Proposal, total_shares: Amount) -> bool {
    proposal.votes_cast() == total_shares as u128
}

/// Decide a proposal from its tally; ties resolve to [`TIE_OUTCOME`]
pub fn decide(votes_yes: Amount, votes_no: Amount) -> ProposalStatus {
    if votes_yes > votes_no {
        ProposalStatus::Approved
    } else {
        TIE_OUTCOME
    }
}

/// The status an open proposal should move to after a vote, if any
pub fn resolution(proposal: &Proposal, total_shares: Amount) -> Option<ProposalStatus> {
    if proposal.is_open() && full_participation(proposal, total_shares) {
        Some(decide(proposal.votes_yes, proposal.votes_no))
    } else {
        None
    }
}
