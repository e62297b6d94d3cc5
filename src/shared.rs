//! Shared, async access to a treasury
//!
//! [`SharedTreasury`] puts the engine behind a tokio `RwLock`. Each mutation
//! holds the write lock for its whole run, so concurrent callers are
//! serialized and never see a half-applied operation. Committed events are
//! published to subscribers after the operation succeeds.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use treasury_common::{Amount, Clock, ParticipantId, ProposalId};
use treasury_config::TreasuryConfig;
use treasury_governance::{Proposal, ProposalStatus, VoteChoice, VoteReceipt};
use treasury_ledger::ValueLedger;

use crate::engine::TreasuryEngine;
use crate::error::TreasuryResult;
use crate::events::JournalEntry;
use crate::snapshot::TreasurySnapshot;
use crate::store::SnapshotStore;

/// Async treasury operations
#[async_trait]
pub trait Treasury: Send + Sync {
    /// Deposit value for shares, returning the new balance
    async fn deposit(&self, participant: &ParticipantId, amount: Amount) -> TreasuryResult<Amount>;

    /// Burn shares for value, returning the remaining balance
    async fn withdraw(&self, participant: &ParticipantId, amount: Amount) -> TreasuryResult<Amount>;

    /// Open a proposal
    async fn create_proposal(&self, author: &ParticipantId, title: &str) -> TreasuryResult<ProposalId>;

    /// Vote with the full current share balance
    async fn vote(&self, id: ProposalId, voter: &ParticipantId, choice: VoteChoice) -> TreasuryResult<VoteReceipt>;

    /// Close an expired proposal
    async fn finalize(&self, id: ProposalId) -> TreasuryResult<ProposalStatus>;

    /// Share balance of a participant
    async fn share_balance_of(&self, participant: &ParticipantId) -> Amount;

    /// Outstanding share supply
    async fn total_shares(&self) -> Amount;

    /// Copy of a proposal record
    async fn get_proposal(&self, id: ProposalId) -> TreasuryResult<Proposal>;

    /// Id the next proposal will receive
    async fn next_proposal_id(&self) -> ProposalId;
}

/// A treasury engine shared between tasks
#[derive(Clone)]
pub struct SharedTreasury {
    engine: Arc<RwLock<TreasuryEngine>>,
    events: broadcast::Sender<JournalEntry>,
}

impl SharedTreasury {
    /// Wrap an engine; `capacity` bounds how far a subscriber may lag
    pub fn new(mut engine: TreasuryEngine, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        engine.enable_outbox();
        Self {
            engine: Arc::new(RwLock::new(engine)),
            events,
        }
    }

    /// Restore the engine from `store`
    pub async fn restore_from(
        store: &dyn SnapshotStore,
        config: &TreasuryConfig,
        custody: Arc<dyn ValueLedger>,
        clock: Arc<dyn Clock>,
    ) -> TreasuryResult<Self> {
        let snapshot = store.load_required().await?;
        let engine = TreasuryEngine::restore(snapshot, config, custody, clock)?;
        Ok(Self::new(engine, config.event_retention))
    }

    /// Receive every event committed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<JournalEntry> {
        self.events.subscribe()
    }

    /// Capture the current state
    pub async fn snapshot(&self) -> TreasurySnapshot {
        self.engine.read().await.snapshot()
    }

    /// Save the current state to `store`
    pub async fn persist(&self, store: &dyn SnapshotStore) -> TreasuryResult<()> {
        let snapshot = self.snapshot().await;
        store.save(&snapshot).await?;
        Ok(())
    }

    /// Value held in custody
    pub async fn custody_balance(&self) -> Amount {
        self.engine.read().await.custody_balance()
    }

    /// Check the engine invariants
    pub async fn verify_invariants(&self) -> TreasuryResult<()> {
        self.engine.read().await.verify_invariants()
    }

    /// Run a mutation under the write lock and publish what it journaled
    async fn mutate<T, F>(&self, op: F) -> TreasuryResult<T>
    where
        F: FnOnce(&mut TreasuryEngine) -> TreasuryResult<T> + Send,
        T: Send,
    {
        let mut engine = self.engine.write().await;
        let result = op(&mut *engine);

        for entry in engine.take_outbox() {
            let sequence = entry.sequence;
            // No subscribers is not an error
            if self.events.send(entry).is_err() {
                debug!("No subscribers for event #{}", sequence);
            }
        }
        result
    }
}

#[async_trait]
impl Treasury for SharedTreasury {
    async fn deposit(&self, participant: &ParticipantId, amount: Amount) -> TreasuryResult<Amount> {
        self.mutate(|engine| engine.deposit(participant, amount)).await
    }

    async fn withdraw(&self, participant: &ParticipantId, amount: Amount) -> TreasuryResult<Amount> {
        self.mutate(|engine| engine.withdraw(participant, amount)).await
    }

    async fn create_proposal(&self, author: &ParticipantId, title: &str) -> TreasuryResult<ProposalId> {
        self.mutate(|engine| engine.create_proposal(author, title)).await
    }

    async fn vote(&self, id: ProposalId, voter: &ParticipantId, choice: VoteChoice) -> TreasuryResult<VoteReceipt> {
        self.mutate(|engine| engine.vote(id, voter, choice)).await
    }

    async fn finalize(&self, id: ProposalId) -> TreasuryResult<ProposalStatus> {
        self.mutate(|engine| engine.finalize(id)).await
    }

    async fn share_balance_of(&self, participant: &ParticipantId) -> Amount {
        self.engine.read().await.share_balance_of(participant)
    }

    async fn total_shares(&self) -> Amount {
        self.engine.read().await.total_shares()
    }

    async fn get_proposal(&self, id: ProposalId) -> TreasuryResult<Proposal> {
        self.engine.read().await.get_proposal(id).cloned()
    }

    async fn next_proposal_id(&self) -> ProposalId {
        self.engine.read().await.next_proposal_id()
    }
}

impl std::fmt::Debug for SharedTreasury {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTreasury")
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}
