//! Share ledger for the cooperative treasury
//!
//! This crate keeps the share books (who holds how many shares, and the total
//! supply) and defines the custody capability the treasury uses to move the
//! underlying value.

use thiserror::Error;

use treasury_common::Amount;

pub mod custody;
pub mod shares;

pub use custody::{InMemoryValueLedger, TransferError, ValueLedger};
pub use shares::ShareLedger;

/// Error types for share ledger operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Zero amounts cannot be deposited
    #[error("amount must be greater than 0")]
    InvalidAmount,

    /// Not enough shares to burn
    #[error("not enough shares: requested {requested}, available {available}")]
    InsufficientShares {
        requested: Amount,
        available: Amount,
    },

    /// A balance or the supply would overflow
    #[error("share arithmetic overflow")]
    Overflow,

    /// Balances do not add up to the recorded supply
    #[error("share supply mismatch: balances sum to {sum}, recorded supply is {total}")]
    SupplyMismatch {
        sum: u128,
        total: Amount,
    },
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
