//! Share ledger
//!
//! Tracks how many shares each participant holds and the global supply.
//! Shares are minted 1:1 on deposit and burned 1:1 on withdrawal; the ledger
//! itself never moves value, it only keeps the books.
//!
//! Every mutation comes in two halves: a `check_*` method that validates the
//! change without touching state, and the mutation itself. Callers that have
//! to talk to an external custody ledger in between run the check first, so a
//! refused transfer never leaves the books half-updated.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tracing::debug;

use treasury_common::{Amount, ParticipantId};

use crate::{LedgerError, LedgerResult};

/// Per-participant share balances plus the global share supply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLedger {
    /// Share balance of every participant that ever held shares
    balances: BTreeMap<ParticipantId, Amount>,
    /// Sum of all balances
    total_shares: Amount,
}

impl ShareLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from recorded balances, refusing books that don't add up
    pub fn from_parts(
        balances: BTreeMap<ParticipantId, Amount>,
        total_shares: Amount,
    ) -> LedgerResult<Self> {
        let ledger = Self { balances, total_shares };
        ledger.verify_supply()?;
        Ok(ledger)
    }

    /// Share balance of a participant; unknown participants hold zero
    pub fn balance_of(&self, participant: &ParticipantId) -> Amount {
        self.balances.get(participant).copied().unwrap_or(0)
    }

    /// Total outstanding shares
    pub fn total_shares(&self) -> Amount {
        self.total_shares
    }

    /// All participants with their balances, including zeroed ones
    pub fn participants(&self) -> impl Iterator<Item = (&ParticipantId, Amount)> + '_ {
        self.balances.iter().map(|(id, balance)| (id, *balance))
    }

    /// Number of participants that ever held shares
    pub fn participant_count(&self) -> usize {
        self.balances.len()
    }

    /// Validate minting `amount` shares to `participant`
    pub fn check_credit(&self, participant: &ParticipantId, amount: Amount) -> LedgerResult<()> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        self.balance_of(participant)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.total_shares
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Mint `amount` shares to `participant`, returning the new balance
    pub fn credit(&mut self, participant: &ParticipantId, amount: Amount) -> LedgerResult<Amount> {
        self.check_credit(participant, amount)?;

        let balance = self.balances.entry(participant.clone()).or_insert(0);
        *balance += amount;
        self.total_shares += amount;

        debug!("Credited {} shares to {} (balance {}, supply {})",
            amount, participant, *balance, self.total_shares);
        Ok(*balance)
    }

    /// Validate burning `amount` shares from `participant`
    pub fn check_debit(&self, participant: &ParticipantId, amount: Amount) -> LedgerResult<()> {
        let available = self.balance_of(participant);
        if amount > available {
            return Err(LedgerError::InsufficientShares {
                requested: amount,
                available,
            });
        }
        Ok(())
    }

    /// Burn `amount` shares from `participant`, returning the new balance.
    ///
    /// The entry stays in the ledger at zero rather than being removed.
    pub fn debit(&mut self, participant: &ParticipantId, amount: Amount) -> LedgerResult<Amount> {
        self.check_debit(participant, amount)?;

        let remaining = match self.balances.get_mut(participant) {
            Some(balance) => {
                *balance -= amount;
                *balance
            }
            // Only reachable with amount == 0 for a participant never seen before
            None => 0,
        };
        self.total_shares -= amount;

        debug!("Debited {} shares from {} (balance {}, supply {})",
            amount, participant, remaining, self.total_shares);
        Ok(remaining)
    }

    /// Check that the balances add up to the recorded supply
    pub fn verify_supply(&self) -> LedgerResult<()> {
        let sum: u128 = self.balances.values().map(|b| *b as u128).sum();
        if sum != self.total_shares as u128 {
            return Err(LedgerError::SupplyMismatch {
                sum,
                total: self.total_shares,
            });
        }
        Ok(())
    }

    /// Snapshot of the balances, in participant order
    pub fn balances(&self) -> &BTreeMap<ParticipantId, Amount> {
        &self.balances
    }
}
