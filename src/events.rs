//! Event journal
//!
//! Every committed state change is appended to a bounded journal with a
//! sequence number. Failed operations record nothing.

use std::collections::VecDeque;

use serde::{Serialize, Deserialize};

use treasury_common::{Amount, ParticipantId, ProposalId, Timestamp};
use treasury_governance::{ProposalStatus, VoteChoice};

/// Events emitted by the treasury
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreasuryEvent {
    Deposited {
        participant: ParticipantId,
        amount: Amount,
        balance: Amount,
        total_shares: Amount,
    },
    Withdrawn {
        participant: ParticipantId,
        amount: Amount,
        balance: Amount,
        total_shares: Amount,
    },
    ProposalCreated {
        proposal_id: ProposalId,
        author: ParticipantId,
        title: String,
    },
    VoteCast {
        proposal_id: ProposalId,
        voter: ParticipantId,
        choice: VoteChoice,
        weight: Amount,
    },
    ProposalResolved {
        proposal_id: ProposalId,
        status: ProposalStatus,
    },
}

/// A journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Position in the journal, starting at 0, never reused
    pub sequence: u64,
    /// When the event was committed
    pub timestamp: Timestamp,
    /// What happened
    pub event: TreasuryEvent,
}

/// Bounded, append-only journal; the oldest entries are dropped first
#[derive(Debug, Clone)]
pub struct EventJournal {
    entries: VecDeque<JournalEntry>,
    next_sequence: u64,
    retention: usize,
}

impl EventJournal {
    /// Create a journal keeping at most `retention` entries
    pub fn new(retention: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            next_sequence: 0,
            retention: retention.max(1),
        }
    }

    /// Append an event
    pub fn record(&mut self, timestamp: Timestamp, event: TreasuryEvent) -> &JournalEntry {
        if self.entries.len() == self.retention {
            self.entries.pop_front();
        }
        self.entries.push_back(JournalEntry {
            sequence: self.next_sequence,
            timestamp,
            event,
        });
        self.next_sequence += 1;
        // Just pushed, so the deque is non-empty
        &self.entries[self.entries.len() - 1]
    }

    /// Sequence number the next entry will get
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Retained entries with `sequence >= from`
    pub fn since(&self, from: u64) -> impl Iterator<Item = &JournalEntry> + '_ {
        self.entries.iter().filter(move |entry| entry.sequence >= from)
    }

    /// All retained entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &JournalEntry> + '_ {
        self.entries.iter()
    }

    /// Number of retained entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is retained
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
