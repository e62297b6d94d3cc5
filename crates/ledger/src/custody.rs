//! Value custody
//!
//! The treasury does not implement token transfer itself. It holds a
//! [`ValueLedger`] capability that pulls value from a payer into the
//! treasury's custody account and pushes it back out again.
//!
//! [`InMemoryValueLedger`] is a small fungible-token ledger with allowances,
//! used by tests and by the scenario runner. A payer has to `approve` the
//! custody account before a deposit can pull funds, just like an ERC-20 style
//! token would require.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, warn};

use treasury_common::{Amount, ParticipantId};

/// Reasons a custody ledger refuses to move value
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The payer has not approved enough for the custody account to pull
    #[error("transfer amount exceeds allowance: {owner} approved {approved}, requested {requested}")]
    InsufficientAllowance {
        owner: ParticipantId,
        approved: Amount,
        requested: Amount,
    },

    /// The source account cannot cover the transfer
    #[error("transfer amount exceeds balance: {account} holds {available}, requested {requested}")]
    InsufficientBalance {
        account: ParticipantId,
        available: Amount,
        requested: Amount,
    },

    /// The receiving balance would overflow
    #[error("transfer would overflow the balance of {0}")]
    Overflow(ParticipantId),

    /// Any other refusal reported by the collaborator
    #[error("transfer refused: {0}")]
    Refused(String),
}

/// Capability to move value in and out of the treasury's custody
pub trait ValueLedger: Send + Sync + Debug {
    /// Pull `amount` from `payer` into custody
    fn transfer_in(&self, payer: &ParticipantId, amount: Amount) -> Result<(), TransferError>;

    /// Push `amount` from custody to `payee`
    fn transfer_out(&self, payee: &ParticipantId, amount: Amount) -> Result<(), TransferError>;

    /// Balance held by `account`. Used for verification, not by control logic.
    fn balance_of(&self, account: &ParticipantId) -> Amount;
}

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<ParticipantId, Amount>,
    /// Amount each owner has approved the custody account to pull
    allowances: HashMap<ParticipantId, Amount>,
}

impl TokenState {
    fn balance(&self, account: &ParticipantId) -> Amount {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn move_value(
        &mut self,
        from: &ParticipantId,
        to: &ParticipantId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let available = self.balance(from);
        if amount > available {
            return Err(TransferError::InsufficientBalance {
                account: from.clone(),
                available,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow(to.clone()))?;

        self.balances.insert(from.clone(), available - amount);
        self.balances.insert(to.clone(), credited);
        Ok(())
    }
}

/// In-memory fungible ledger with a single custody account
#[derive(Debug)]
pub struct InMemoryValueLedger {
    custody: ParticipantId,
    state: RwLock<TokenState>,
}

impl InMemoryValueLedger {
    /// Create a ledger whose custody account is `custody`
    pub fn new(custody: impl Into<ParticipantId>) -> Self {
        Self {
            custody: custody.into(),
            state: RwLock::new(TokenState::default()),
        }
    }

    /// The account deposits are pulled into
    pub fn custody_account(&self) -> &ParticipantId {
        &self.custody
    }

    /// Create `amount` new units in `account`
    pub fn mint(&self, account: &ParticipantId, amount: Amount) -> Result<(), TransferError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let credited = state
            .balance(account)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow(account.clone()))?;
        state.balances.insert(account.clone(), credited);
        debug!("Minted {} to {}", amount, account);
        Ok(())
    }

    /// Set how much the custody account may pull from `owner`
    pub fn approve(&self, owner: &ParticipantId, amount: Amount) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.allowances.insert(owner.clone(), amount);
        debug!("{} approved custody to pull {}", owner, amount);
    }

    /// Remaining allowance of `owner` towards the custody account
    pub fn allowance(&self, owner: &ParticipantId) -> Amount {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.allowances.get(owner).copied().unwrap_or(0)
    }
}

impl ValueLedger for InMemoryValueLedger {
    fn transfer_in(&self, payer: &ParticipantId, amount: Amount) -> Result<(), TransferError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let approved = state.allowances.get(payer).copied().unwrap_or(0);
        if amount > approved {
            warn!("Refused pull of {} from {}: allowance is {}", amount, payer, approved);
            return Err(TransferError::InsufficientAllowance {
                owner: payer.clone(),
                approved,
                requested: amount,
            });
        }

        state.move_value(payer, &self.custody, amount)?;
        state.allowances.insert(payer.clone(), approved - amount);
        Ok(())
    }

    fn transfer_out(&self, payee: &ParticipantId, amount: Amount) -> Result<(), TransferError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.move_value(&self.custody, payee, amount)
    }

    fn balance_of(&self, account: &ParticipantId) -> Amount {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.balance(account)
    }
}
