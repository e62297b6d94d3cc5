//! Proposal book
//!
//! Owns every proposal record. Ids are dense and zero-based, so the book is a
//! plain vector indexed by id. Records are never removed.

use tracing::{debug, info, warn};

use treasury_common::{Amount, ParticipantId, ProposalId, Timestamp};

use crate::proposal::{Proposal, ProposalStatus};
use crate::voting::{self, VoteChoice, VoteReceipt};
use crate::{GovernanceError, GovernanceParams, GovernanceResult};

/// Registry of all proposals and the rules they are run under
#[derive(Debug, Clone)]
pub struct ProposalBook {
    params: GovernanceParams,
    proposals: Vec<Proposal>,
}

impl ProposalBook {
    /// Create an empty book
    pub fn new(params: GovernanceParams) -> Self {
        Self {
            params,
            proposals: Vec::new(),
        }
    }

    /// Rebuild a book from stored records, checking that they are consistent
    pub fn from_records(params: GovernanceParams, proposals: Vec<Proposal>) -> GovernanceResult<Self> {
        for (index, proposal) in proposals.iter().enumerate() {
            validate_record(index, proposal)?;
        }
        Ok(Self { params, proposals })
    }

    /// The rules this book applies
    pub fn params(&self) -> &GovernanceParams {
        &self.params
    }

    /// Id the next proposal will receive
    pub fn next_id(&self) -> ProposalId {
        ProposalId(self.proposals.len() as u64)
    }

    /// Number of proposals ever created
    pub fn len(&self) -> usize {
        self.proposals.len()
    }

    /// Whether no proposal was ever created
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// Look up a proposal
    pub fn get(&self, id: ProposalId) -> Option<&Proposal> {
        id.index().and_then(|i| self.proposals.get(i))
    }

    /// All proposals in id order
    pub fn iter(&self) -> impl Iterator<Item = &Proposal> + '_ {
        self.proposals.iter()
    }

    /// Last second at which votes are accepted on `id`
    pub fn voting_deadline(&self, id: ProposalId) -> GovernanceResult<Timestamp> {
        let proposal = self.get(id).ok_or(GovernanceError::ProposalNotFound(id))?;
        Ok(proposal.voting_deadline(self.params.voting_period_secs))
    }

    /// Check whether `author` may create a proposal
    pub fn check_create(&self, author_shares: Amount) -> GovernanceResult<()> {
        let required = self.params.min_shares_to_propose;
        if author_shares < required {
            return Err(GovernanceError::InsufficientSharesToPropose {
                required,
                held: author_shares,
            });
        }
        Ok(())
    }

    /// Open a new proposal
    pub fn create(
        &mut self,
        author: &ParticipantId,
        title: impl Into<String>,
        author_shares: Amount,
        now: Timestamp,
    ) -> GovernanceResult<ProposalId> {
        if let Err(e) = self.check_create(author_shares) {
            warn!("{} cannot propose: {}", author, e);
            return Err(e);
        }

        let id = self.next_id();
        let proposal = Proposal::new(id, author.clone(), title.into(), now);
        info!("Proposal {} '{}' opened by {}", id, proposal.title, author);
        self.proposals.push(proposal);

        Ok(id)
    }

    /// Record a weighted vote and resolve the proposal on full participation.
    ///
    /// Checks run in a fixed order: existence, status, deadline, voter
    /// shares, double vote. A failed check changes nothing.
    pub fn cast_vote(
        &mut self,
        id: ProposalId,
        voter: &ParticipantId,
        choice: VoteChoice,
        voter_shares: Amount,
        total_shares: Amount,
        now: Timestamp,
    ) -> GovernanceResult<VoteReceipt> {
        let period = self.params.voting_period_secs;
        let proposal = id
            .index()
            .and_then(|i| self.proposals.get_mut(i))
            .ok_or(GovernanceError::ProposalNotFound(id))?;

        if !proposal.is_open() {
            return Err(GovernanceError::ProposalClosed(id));
        }
        if !voting::within_voting_period(proposal, now, period) {
            return Err(GovernanceError::VotingPeriodEnded(id));
        }
        if voter_shares == 0 {
            return Err(GovernanceError::InsufficientSharesToVote);
        }
        if proposal.has_voted(voter) {
            return Err(GovernanceError::AlreadyVoted {
                proposal: id,
                voter: voter.clone(),
            });
        }

        match choice {
            VoteChoice::Yes => {
                proposal.votes_yes = proposal
                    .votes_yes
                    .checked_add(voter_shares)
                    .ok_or(GovernanceError::Overflow)?;
            }
            VoteChoice::No => {
                proposal.votes_no = proposal
                    .votes_no
                    .checked_add(voter_shares)
                    .ok_or(GovernanceError::Overflow)?;
            }
        }
        proposal.voters.insert(voter.clone());
        debug!("{} voted {} on {} with {} shares (yes {}, no {}, supply {})",
            voter, choice, id, voter_shares, proposal.votes_yes, proposal.votes_no, total_shares);

        if let Some(status) = voting::resolution(proposal, total_shares) {
            proposal.status = status;
            proposal.resolved_at = Some(now);
            info!("Proposal {} {} on full participation", id, status);
        }

        Ok(VoteReceipt {
            proposal_id: id,
            voter: voter.clone(),
            choice,
            weight: voter_shares,
            status: proposal.status,
        })
    }

    /// Close an open proposal whose voting period has run out.
    ///
    /// A proposal that expires without full participation lapses and is
    /// rejected.
    pub fn finalize(&mut self, id: ProposalId, now: Timestamp) -> GovernanceResult<ProposalStatus> {
        let period = self.params.voting_period_secs;
        let proposal = id
            .index()
            .and_then(|i| self.proposals.get_mut(i))
            .ok_or(GovernanceError::ProposalNotFound(id))?;

        if !proposal.is_open() {
            return Err(GovernanceError::ProposalClosed(id));
        }
        if voting::within_voting_period(proposal, now, period) {
            return Err(GovernanceError::VotingPeriodActive(id));
        }

        proposal.status = ProposalStatus::Rejected;
        proposal.resolved_at = Some(now);
        info!("Proposal {} lapsed (yes {}, no {})", id, proposal.votes_yes, proposal.votes_no);

        Ok(proposal.status)
    }
}

fn validate_record(index: usize, proposal: &Proposal) -> GovernanceResult<()> {
    if proposal.id.index() != Some(index) {
        return Err(GovernanceError::InvalidRecord(format!(
            "proposal at position {} carries id {}", index, proposal.id
        )));
    }
    if proposal.voters.is_empty() && proposal.votes_cast() > 0 {
        return Err(GovernanceError::InvalidRecord(format!(
            "proposal {} has votes but no voters", proposal.id
        )));
    }
    if proposal.status.is_terminal() != proposal.resolved_at.is_some() {
        return Err(GovernanceError::InvalidRecord(format!(
            "proposal {} is {} but resolved_at is {:?}", proposal.id, proposal.status, proposal.resolved_at
        )));
    }
    Ok(())
}
