//! Proposal records

use std::collections::BTreeSet;
use std::fmt;

use serde::{Serialize, Deserialize};

use treasury_common::{Amount, ParticipantId, ProposalId, Timestamp};

/// Status of a proposal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    /// Accepting votes
    Open,
    /// Resolved in favour
    Approved,
    /// Resolved against, tied, or lapsed
    Rejected,
}

impl ProposalStatus {
    /// Whether the status can no longer change
    pub fn is_terminal(self) -> bool {
        !matches!(self, ProposalStatus::Open)
    }
}

impl Default for ProposalStatus {
    fn default() -> Self {
        Self::Open
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProposalStatus::Open => "open",
            ProposalStatus::Approved => "approved",
            ProposalStatus::Rejected => "rejected",
        };
        f.pad(label)
    }
}

/// A governance proposal and its running tally
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Sequential identifier, never reused
    pub id: ProposalId,
    /// Free-form title
    pub title: String,
    /// Participant that created the proposal
    pub author: ParticipantId,
    /// When the proposal was created
    pub created_at: Timestamp,
    /// Shares cast in favour
    pub votes_yes: Amount,
    /// Shares cast against
    pub votes_no: Amount,
    /// Current status
    pub status: ProposalStatus,
    /// Participants that have voted
    pub voters: BTreeSet<ParticipantId>,
    /// When the proposal left `Open`, if it has
    #[serde(default)]
    pub resolved_at: Option<Timestamp>,
}

impl Proposal {
    /// Create an open proposal with an empty tally
    pub fn new(id: ProposalId, author: ParticipantId, title: String, created_at: Timestamp) -> Self {
        Self {
            id,
            title,
            author,
            created_at,
            votes_yes: 0,
            votes_no: 0,
            status: ProposalStatus::Open,
            voters: BTreeSet::new(),
            resolved_at: None,
        }
    }

    /// Whether the proposal still accepts votes (ignoring the deadline)
    pub fn is_open(&self) -> bool {
        self.status == ProposalStatus::Open
    }

    /// Whether `participant` has already voted
    pub fn has_voted(&self, participant: &ParticipantId) -> bool {
        self.voters.contains(participant)
    }

    /// Total shares cast so far
    pub fn votes_cast(&self) -> u128 {
        self.votes_yes as u128 + self.votes_no as u128
    }

    /// Last second at which a vote is still accepted
    pub fn voting_deadline(&self, voting_period_secs: u64) -> Timestamp {
        self.created_at.saturating_add(voting_period_secs)
    }
}

impl fmt::Debug for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Proposal {{ id: {}, title: {}, status: {:?}, yes: {}, no: {}, author: {} }}",
            self.id, self.title, self.status, self.votes_yes, self.votes_no, self.author)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_proposal_is_open_and_empty() {
        let proposal = Proposal::new(ProposalId(0), "bob".into(), "Add AAVE".to_string(), 1_000);
        assert!(proposal.is_open());
        assert_eq!(proposal.votes_cast(), 0);
        assert!(proposal.voters.is_empty());
        assert_eq!(proposal.resolved_at, None);
        assert_eq!(proposal.voting_deadline(60), 1_060);
    }

    #[test]
    fn test_status_terminality() {
        assert!(!ProposalStatus::Open.is_terminal());
        assert!(ProposalStatus::Approved.is_terminal());
        assert!(ProposalStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_deadline_saturates() {
        let proposal = Proposal::new(ProposalId(0), "bob".into(), "t".to_string(), u64::MAX - 1);
        assert_eq!(proposal.voting_deadline(10), u64::MAX);
    }
}
