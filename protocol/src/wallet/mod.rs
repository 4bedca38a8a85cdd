//! # Wallet Module — The Balance Capability
//!
//! The handoff engine never owns money. It is handed a [`Wallet`] that can
//! report the current balance, and the dispatcher applies the debit or
//! credit the engine asks for. In the phone app the wallet is the remote
//! ledger client; here it is a trait so tests and the terminal device can
//! plug in [`MemoryWallet`].
//!
//! ```text
//! mod.rs     — Wallet trait and errors
//! memory.rs  — In-process wallet with a mutation ledger
//! ```

pub mod memory;

use thiserror::Error;

use crate::types::Money;

pub use memory::{LedgerEntry, LedgerKind, MemoryWallet};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors a wallet can report when asked to move funds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// Attempted to debit more than the available balance.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// The current balance.
        available: Money,
        /// The amount that was requested.
        requested: Money,
    },

    /// A credit would overflow the balance counter.
    #[error("balance overflow: current {current}, credit {credit}")]
    Overflow {
        /// The balance before the failed credit.
        current: Money,
        /// The amount that caused the overflow.
        credit: Money,
    },
}

// ---------------------------------------------------------------------------
// Wallet
// ---------------------------------------------------------------------------

/// Read-and-mutate access to the local wallet balance.
///
/// `balance` is only consulted for the sender's sufficiency check. `debit`
/// and `credit` are called at most once per completed handoff; the caller
/// does not retry on error.
pub trait Wallet: Send + Sync {
    /// Current spendable balance.
    fn balance(&self) -> Money;

    /// Removes `amount` and returns the new balance.
    fn debit(&self, amount: Money) -> Result<Money, WalletError>;

    /// Adds `amount` and returns the new balance.
    fn credit(&self, amount: Money) -> Result<Money, WalletError>;
}
