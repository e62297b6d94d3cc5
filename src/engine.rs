//! Treasury engine
//!
//! [`TreasuryEngine`] is the single owner of the share ledger and the proposal
//! book. It also holds the collaborators: the custody ledger that moves the
//! underlying value, and the clock. Every operation either fully applies or
//! returns an error with nothing changed.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use treasury_common::{Amount, Clock, ParticipantId, ProposalId, Timestamp};
use treasury_config::TreasuryConfig;
use treasury_governance::{GovernanceParams, Proposal, ProposalBook, ProposalStatus, VoteChoice, VoteReceipt};
use treasury_ledger::{ShareLedger, ValueLedger};

use crate::error::{TreasuryError, TreasuryResult};
use crate::events::{EventJournal, JournalEntry, TreasuryEvent};
use crate::snapshot::{TreasurySnapshot, SNAPSHOT_VERSION};

/// Share-weighted treasury and its governance
pub struct TreasuryEngine {
    shares: ShareLedger,
    proposals: ProposalBook,
    custody: Arc<dyn ValueLedger>,
    custody_account: ParticipantId,
    clock: Arc<dyn Clock>,
    journal: EventJournal,
    /// Committed entries not yet handed to a publisher; `None` when nobody
    /// publishes
    outbox: Option<Vec<JournalEntry>>,
}

impl TreasuryEngine {
    /// Create an empty treasury
    pub fn new(config: &TreasuryConfig, custody: Arc<dyn ValueLedger>, clock: Arc<dyn Clock>) -> Self {
        let params = GovernanceParams::new(config.min_shares_to_propose, config.voting_period_secs);
        info!("Treasury created (propose threshold {}, voting period {}s, custody {})",
            params.min_shares_to_propose, params.voting_period_secs, config.custody_account);

        Self {
            shares: ShareLedger::new(),
            proposals: ProposalBook::new(params),
            custody,
            custody_account: ParticipantId::new(config.custody_account.clone()),
            clock,
            journal: EventJournal::new(config.event_retention),
            outbox: None,
        }
    }

    /// Rebuild a treasury from a snapshot.
    ///
    /// Governance parameters come from the snapshot, so proposals keep the
    /// rules they were opened under. The custody account and journal
    /// retention come from `config`.
    pub fn restore(
        snapshot: TreasurySnapshot,
        config: &TreasuryConfig,
        custody: Arc<dyn ValueLedger>,
        clock: Arc<dyn Clock>,
    ) -> TreasuryResult<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TreasuryError::InvalidSnapshot(format!(
                "unsupported snapshot version {}", snapshot.version
            )));
        }

        let shares = ShareLedger::from_parts(snapshot.balances, snapshot.total_shares)?;
        let proposals = ProposalBook::from_records(snapshot.params, snapshot.proposals)?;
        check_voters_known(&shares, &proposals)?;

        info!("Treasury restored: {} participants, {} shares, {} proposals",
            shares.participant_count(), shares.total_shares(), proposals.len());

        Ok(Self {
            shares,
            proposals,
            custody,
            custody_account: ParticipantId::new(config.custody_account.clone()),
            clock,
            journal: EventJournal::new(config.event_retention),
            outbox: None,
        })
    }

    /// Deposit `amount` of value and receive the same number of shares.
    ///
    /// Returns the participant's new share balance.
    pub fn deposit(&mut self, participant: &ParticipantId, amount: Amount) -> TreasuryResult<Amount> {
        if let Err(e) = self.shares.check_credit(participant, amount) {
            warn!("Deposit of {} by {} refused: {}", amount, participant, e);
            return Err(e.into());
        }
        if let Err(e) = self.custody.transfer_in(participant, amount) {
            warn!("Deposit of {} by {} refused by custody: {}", amount, participant, e);
            return Err(e.into());
        }

        let balance = self.shares.credit(participant, amount)?;
        let total_shares = self.shares.total_shares();
        info!("{} deposited {} (balance {}, supply {})", participant, amount, balance, total_shares);

        self.record(TreasuryEvent::Deposited {
            participant: participant.clone(),
            amount,
            balance,
            total_shares,
        });
        Ok(balance)
    }

    /// Burn `amount` shares and receive the same amount of value.
    ///
    /// Returns the participant's remaining share balance.
    pub fn withdraw(&mut self, participant: &ParticipantId, amount: Amount) -> TreasuryResult<Amount> {
        if let Err(e) = self.shares.check_debit(participant, amount) {
            warn!("Withdrawal of {} by {} refused: {}", amount, participant, e);
            return Err(e.into());
        }
        if let Err(e) = self.custody.transfer_out(participant, amount) {
            warn!("Withdrawal of {} by {} refused by custody: {}", amount, participant, e);
            return Err(e.into());
        }

        let balance = self.shares.debit(participant, amount)?;
        let total_shares = self.shares.total_shares();
        info!("{} withdrew {} (balance {}, supply {})", participant, amount, balance, total_shares);

        self.record(TreasuryEvent::Withdrawn {
            participant: participant.clone(),
            amount,
            balance,
            total_shares,
        });
        Ok(balance)
    }

    /// Open a proposal authored by `author`
    pub fn create_proposal(&mut self, author: &ParticipantId, title: impl Into<String>) -> TreasuryResult<ProposalId> {
        let title = title.into();
        let held = self.shares.balance_of(author);
        let now = self.clock.now();

        let id = self.proposals.create(author, title.clone(), held, now)?;
        self.record(TreasuryEvent::ProposalCreated {
            proposal_id: id,
            author: author.clone(),
            title,
        });
        Ok(id)
    }

    /// Cast `voter`'s full current share balance on a proposal
    pub fn vote(&mut self, id: ProposalId, voter: &ParticipantId, choice: VoteChoice) -> TreasuryResult<VoteReceipt> {
        let weight = self.shares.balance_of(voter);
        let total_shares = self.shares.total_shares();
        let now = self.clock.now();

        let receipt = match self.proposals.cast_vote(id, voter, choice, weight, total_shares, now) {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("Vote by {} on {} refused: {}", voter, id, e);
                return Err(e.into());
            }
        };

        self.record(TreasuryEvent::VoteCast {
            proposal_id: id,
            voter: voter.clone(),
            choice,
            weight,
        });
        if receipt.resolved() {
            self.record(TreasuryEvent::ProposalResolved {
                proposal_id: id,
                status: receipt.status,
            });
        }
        Ok(receipt)
    }

    /// Close a proposal whose voting period ran out without full participation
    pub fn finalize(&mut self, id: ProposalId) -> TreasuryResult<ProposalStatus> {
        let now = self.clock.now();
        let status = self.proposals.finalize(id, now)?;
        self.record(TreasuryEvent::ProposalResolved { proposal_id: id, status });
        Ok(status)
    }

    /// Share balance of `participant`, zero if unknown
    pub fn share_balance_of(&self, participant: &ParticipantId) -> Amount {
        self.shares.balance_of(participant)
    }

    /// Outstanding share supply
    pub fn total_shares(&self) -> Amount {
        self.shares.total_shares()
    }

    /// Look up a proposal
    pub fn get_proposal(&self, id: ProposalId) -> TreasuryResult<&Proposal> {
        self.proposals.get(id).ok_or(TreasuryError::ProposalNotFound(id))
    }

    /// Id the next proposal will receive
    pub fn next_proposal_id(&self) -> ProposalId {
        self.proposals.next_id()
    }

    /// All proposals in id order
    pub fn proposals(&self) -> impl Iterator<Item = &Proposal> + '_ {
        self.proposals.iter()
    }

    /// Whether `participant` has voted on proposal `id`
    pub fn has_voted(&self, id: ProposalId, participant: &ParticipantId) -> TreasuryResult<bool> {
        Ok(self.get_proposal(id)?.has_voted(participant))
    }

    /// Last second at which votes are accepted on proposal `id`
    pub fn voting_deadline(&self, id: ProposalId) -> TreasuryResult<Timestamp> {
        Ok(self.proposals.voting_deadline(id)?)
    }

    /// Every participant that ever held shares, with their balance
    pub fn participants(&self) -> impl Iterator<Item = (&ParticipantId, Amount)> + '_ {
        self.shares.participants()
    }

    /// Value held by the custody account on the value ledger
    pub fn custody_balance(&self) -> Amount {
        let balance = self.custody.balance_of(&self.custody_account);
        debug!("Custody {} holds {}", self.custody_account, balance);
        balance
    }

    /// Account that holds deposited value
    pub fn custody_account(&self) -> &ParticipantId {
        &self.custody_account
    }

    /// Governance rules in force
    pub fn params(&self) -> &GovernanceParams {
        self.proposals.params()
    }

    /// The event journal
    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    /// Retained events, oldest first
    pub fn events(&self) -> impl Iterator<Item = &JournalEntry> + '_ {
        self.journal.entries()
    }

    /// Check that balances add up to the supply and that every recorded voter
    /// is a known participant.
    pub fn verify_invariants(&self) -> TreasuryResult<()> {
        self.shares.verify_supply()?;
        check_voters_known(&self.shares, &self.proposals)
    }

    /// Capture the books for persistence
    pub fn snapshot(&self) -> TreasurySnapshot {
        TreasurySnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: self.clock.now(),
            params: self.proposals.params().clone(),
            balances: self.shares.balances().clone(),
            total_shares: self.shares.total_shares(),
            proposals: self.proposals.iter().cloned().collect(),
        }
    }

    /// Start keeping committed entries for [`take_outbox`](Self::take_outbox),
    /// independently of journal retention
    pub fn enable_outbox(&mut self) {
        self.outbox.get_or_insert_with(Vec::new);
    }

    /// Entries committed since the last call, oldest first
    pub fn take_outbox(&mut self) -> Vec<JournalEntry> {
        self.outbox.as_mut().map(std::mem::take).unwrap_or_default()
    }

    fn record(&mut self, event: TreasuryEvent) {
        let now = self.clock.now();
        let entry = self.journal.record(now, event);
        debug!("Journal #{}: {:?}", entry.sequence, entry.event);
        if let Some(outbox) = self.outbox.as_mut() {
            outbox.push(entry.clone());
        }
    }
}

fn check_voters_known(shares: &ShareLedger, proposals: &ProposalBook) -> TreasuryResult<()> {
    for proposal in proposals.iter() {
        if let Some(stranger) = proposal.voters.iter().find(|v| !shares.balances().contains_key(*v)) {
            return Err(TreasuryError::InvalidSnapshot(format!(
                "proposal {} lists voter {} who never held shares", proposal.id, stranger
            )));
        }
    }
    Ok(())
}

impl fmt::Debug for TreasuryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreasuryEngine")
            .field("total_shares", &self.shares.total_shares())
            .field("participants", &self.shares.participant_count())
            .field("proposals", &self.proposals.len())
            .field("custody_account", &self.custody_account)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use treasury_common::{days, ManualClock};
    use treasury_ledger::InMemoryValueLedger;

    struct Fixture {
        engine: TreasuryEngine,
        token: Arc<InMemoryValueLedger>,
        clock: ManualClock,
    }

    fn p(name: &str) -> ParticipantId {
        ParticipantId::from(name)
    }

    fn fixture() -> Fixture {
        let config = TreasuryConfig::default();
        let token = Arc::new(InMemoryValueLedger::new(config.custody_account.clone()));
        let clock = ManualClock::new(1_000);
        let engine = TreasuryEngine::new(&config, token.clone(), Arc::new(clock.clone()));
        for name in ["alice", "bob"] {
            token.mint(&p(name), 1_000).unwrap();
            token.approve(&p(name), 1_000);
        }
        Fixture { engine, token, clock }
    }

    #[test_log::test]
    fn test_deposit_mints_shares_one_to_one() {
        let mut f = fixture();
        assert_eq!(f.engine.deposit(&p("alice"), 200).unwrap(), 200);
        assert_eq!(f.engine.deposit(&p("alice"), 100).unwrap(), 300);
        assert_eq!(f.engine.total_shares(), 300);
        assert_eq!(f.engine.custody_balance(), 300);
        assert_eq!(f.token.balance_of(&p("alice")), 700);
    }

    #[test]
    fn test_zero_deposit_changes_nothing() {
        let mut f = fixture();
        assert!(matches!(f.engine.deposit(&p("alice"), 0), Err(TreasuryError::InvalidAmount)));
        assert_eq!(f.engine.total_shares(), 0);
        assert_eq!(f.engine.journal().len(), 0);
    }

    #[test]
    fn test_deposit_beyond_allowance_changes_nothing() {
        let mut f = fixture();
        f.token.approve(&p("alice"), 50);
        let err = f.engine.deposit(&p("alice"), 51).unwrap_err();
        assert!(matches!(err, TreasuryError::TransferRejected(_)));
        assert_eq!(f.engine.share_balance_of(&p("alice")), 0);
        assert_eq!(f.engine.custody_balance(), 0);
    }

    #[test]
    fn test_withdraw_boundaries() {
        let mut f = fixture();
        f.engine.deposit(&p("alice"), 200).unwrap();

        assert!(matches!(
            f.engine.withdraw(&p("alice"), 201),
            Err(TreasuryError::InsufficientShares { requested: 201, available: 200 })
        ));
        assert_eq!(f.engine.withdraw(&p("alice"), 200).unwrap(), 0);
        assert_eq!(f.engine.total_shares(), 0);
        assert_eq!(f.token.balance_of(&p("alice")), 1_000);
    }

    #[test]
    fn test_vote_resolves_and_journals() {
        let mut f = fixture();
        f.engine.deposit(&p("bob"), 200).unwrap();
        let id = f.engine.create_proposal(&p("bob"), "Add AAVE").unwrap();
        let receipt = f.engine.vote(id, &p("bob"), VoteChoice::Yes).unwrap();

        assert_eq!(receipt.status, ProposalStatus::Approved);
        let kinds: Vec<&TreasuryEvent> = f.engine.events().map(|e| &e.event).collect();
        assert!(matches!(kinds.last(), Some(TreasuryEvent::ProposalResolved { status: ProposalStatus::Approved, .. })));
        assert_eq!(f.engine.journal().len(), 4);
    }

    #[test]
    fn test_outbox_outlives_journal_retention() {
        let config = TreasuryConfig { event_retention: 1, ..Default::default() };
        let token = Arc::new(InMemoryValueLedger::new(config.custody_account.clone()));
        token.mint(&p("bob"), 1_000).unwrap();
        token.approve(&p("bob"), 1_000);
        let mut engine = TreasuryEngine::new(&config, token, Arc::new(ManualClock::new(1_000)));

        engine.deposit(&p("bob"), 200).unwrap();
        assert!(engine.take_outbox().is_empty());

        engine.enable_outbox();
        let id = engine.create_proposal(&p("bob"), "Add AAVE").unwrap();
        engine.vote(id, &p("bob"), VoteChoice::Yes).unwrap();

        let sequences: Vec<u64> = engine.take_outbox().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(engine.journal().len(), 1);
        assert!(engine.take_outbox().is_empty());
    }

    #[test]
    fn test_finalize_after_deadline() {
        let mut f = fixture();
        f.engine.deposit(&p("bob"), 200).unwrap();
        f.engine.deposit(&p("alice"), 300).unwrap();
        let id = f.engine.create_proposal(&p("bob"), "Add AAVE").unwrap();
        f.engine.vote(id, &p("bob"), VoteChoice::Yes).unwrap();

        assert!(matches!(f.engine.finalize(id), Err(TreasuryError::VotingPeriodActive(_))));
        f.clock.advance(days(8));
        assert_eq!(f.engine.finalize(id).unwrap(), ProposalStatus::Rejected);
        assert_eq!(f.engine.get_proposal(id).unwrap().resolved_at, Some(1_000 + 8 * 86_400));
    }

    #[test]
    fn test_snapshot_restores_books() {
        let mut f = fixture();
        f.engine.deposit(&p("bob"), 200).unwrap();
        f.engine.deposit(&p("alice"), 300).unwrap();
        let id = f.engine.create_proposal(&p("bob"), "Add AAVE").unwrap();
        f.engine.vote(id, &p("alice"), VoteChoice::No).unwrap();

        let restored = TreasuryEngine::restore(
            f.engine.snapshot(),
            &TreasuryConfig::default(),
            f.token.clone(),
            Arc::new(f.clock.clone()),
        )
        .unwrap();

        assert_eq!(restored.total_shares(), 500);
        assert_eq!(restored.next_proposal_id(), ProposalId(1));
        assert!(restored.has_voted(id, &p("alice")).unwrap());
        assert!(restored.journal().is_empty());
    }

    #[test]
    fn test_restore_rejects_unknown_voter() {
        let mut f = fixture();
        f.engine.deposit(&p("bob"), 200).unwrap();
        let id = f.engine.create_proposal(&p("bob"), "Add AAVE").unwrap();
        let mut snapshot = f.engine.snapshot();
        snapshot.proposals[id.index().unwrap()].voters.insert(p("mallory"));

        let result = TreasuryEngine::restore(
            snapshot,
            &TreasuryConfig::default(),
            f.token.clone(),
            Arc::new(f.clock.clone()),
        );
        assert!(matches!(result, Err(TreasuryError::InvalidSnapshot(_))));
    }
}
