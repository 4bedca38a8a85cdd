//! # In-Memory Wallet
//!
//! A [`MemoryWallet`] holds one balance behind a `parking_lot::RwLock` and
//! records every mutation in a ledger. The terminal device seeds it from the
//! command line; tests use the ledger to prove a handoff moved money exactly
//! once.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{Wallet, WalletError};
use crate::types::{Identity, Money};

/// Direction of a recorded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerKind {
    /// Funds left the wallet.
    Debit,
    /// Funds arrived.
    Credit,
}

/// One applied balance mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Debit or credit.
    pub kind: LedgerKind,
    /// Amount moved.
    pub amount: Money,
    /// Balance right after the mutation.
    pub balance_after: Money,
    /// When the mutation was applied.
    pub at: DateTime<Utc>,
}

#[derive(Debug)]
struct Inner {
    balance: Money,
    ledger: Vec<LedgerEntry>,
}

/// Single-owner wallet kept in process memory.
///
/// `Sync` through its internal lock, so one instance can be shared between
/// the dispatcher and whatever renders the balance.
#[derive(Debug)]
pub struct MemoryWallet {
    owner: Identity,
    inner: RwLock<Inner>,
}

impl MemoryWallet {
    /// Creates a wallet for `owner` holding `opening_balance`.
    pub fn new(owner: Identity, opening_balance: Money) -> Self {
        Self {
            owner,
            inner: RwLock::new(Inner {
                balance: opening_balance,
                ledger: Vec::new(),
            }),
        }
    }

    /// The identity this wallet belongs to.
    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    /// Every mutation applied so far, oldest first.
    pub fn ledger(&self) -> Vec<LedgerEntry> {
        self.inner.read().ledger.clone()
    }

    /// Number of mutations of the given kind.
    pub fn count(&self, kind: LedgerKind) -> usize {
        self.inner
            .read()
            .ledger
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl Wallet for MemoryWallet {
    fn balance(&self) -> Money {
        self.inner.read().balance
    }

    fn debit(&self, amount: Money) -> Result<Money, WalletError> {
        let mut inner = self.inner.write();
        let new_balance =
            inner
                .balance
                .checked_sub(amount)
                .ok_or(WalletError::InsufficientBalance {
                    available: inner.balance,
                    requested: amount,
                })?;

        inner.balance = new_balance;
        inner.ledger.push(LedgerEntry {
            kind: LedgerKind::Debit,
            amount,
            balance_after: new_balance,
            at: Utc::now(),
        });
        Ok(new_balance)
    }

    fn credit(&self, amount: Money) -> Result<Money, WalletError> {
        let mut inner = self.inner.write();
        let new_balance = inner
            .balance
            .checked_add(amount)
            .ok_or(WalletError::Overflow {
                current: inner.balance,
                credit: amount,
            })?;

        inner.balance = new_balance;
        inner.ledger.push(LedgerEntry {
            kind: LedgerKind::Credit,
            amount,
            balance_after: new_balance,
            at: Utc::now(),
        });
        Ok(new_balance)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(balance: u64) -> MemoryWallet {
        MemoryWallet::new(Identity::new("alice"), Money::from_minor(balance))
    }

    #[test]
    fn debit_reduces_balance() {
        let w = wallet(10_000);
        let remaining = w.debit(Money::from_minor(4_000)).unwrap();

        assert_eq!(remaining, Money::from_minor(6_000));
        assert_eq!(w.balance(), Money::from_minor(6_000));
        assert_eq!(w.count(LedgerKind::Debit), 1);
    }

    #[test]
    fn debit_to_zero() {
        let w = wallet(500);
        assert_eq!(w.debit(Money::from_minor(500)).unwrap(), Money::ZERO);
    }

    #[test]
    fn debit_insufficient_balance_rejected() {
        let w = wallet(100);
        let result = w.debit(Money::from_minor(200));

        assert!(matches!(
            result,
            Err(WalletError::InsufficientBalance { .. })
        ));
        assert_eq!(w.balance(), Money::from_minor(100));
        assert!(w.ledger().is_empty());
    }

    #[test]
    fn credit_accumulates() {
        let w = wallet(0);
        w.credit(Money::from_minor(500)).unwrap();
        w.credit(Money::from_minor(300)).unwrap();

        assert_eq!(w.balance(), Money::from_minor(800));
        assert_eq!(w.count(LedgerKind::Credit), 2);
    }

    #[test]
    fn credit_overflow_rejected() {
        let w = wallet(u64::MAX);
        let result = w.credit(Money::from_minor(1));
        assert!(matches!(result, Err(WalletError::Overflow { .. })));
    }

    #[test]
    fn ledger_records_balance_after() {
        let w = wallet(1_000);
        w.debit(Money::from_minor(250)).unwrap();
        w.credit(Money::from_minor(50)).unwrap();

        let ledger = w.ledger();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[0].balance_after, Money::from_minor(750));
        assert_eq!(ledger[1].kind, LedgerKind::Credit);
        assert_eq!(ledger[1].balance_after, Money::from_minor(800));
    }
}
