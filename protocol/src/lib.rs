// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # OFFPAY Protocol — Core Library
//!
//! OFFPAY moves value between two phones that have no network at all. The
//! devices take turns showing and scanning QR codes; every code carries one
//! message of a five-step handoff, and every accepted scan produces the next
//! code to show.
//!
//! The camera, the QR renderer, the screen and the remote ledger all live
//! outside this crate. What lives here is the part that has to be right:
//! which message each side accepts at each step, how the transaction id is
//! bound across five round trips, and the guarantee that a debit or credit
//! is applied exactly once even when the same code sits in front of the
//! camera for a hundred frames.
//!
//! ## Architecture
//!
//! - **handoff** — Wire codec, session state, transition engine, scan dispatcher.
//! - **wallet** — The balance capability the engine reads and the dispatcher mutates.
//! - **types** — Money, identities and transaction ids.
//! - **config** — Protocol constants and wire literals.
//!
//! ## Design Philosophy
//!
//! 1. The engine is a pure function. If it touches money, it returns an
//!    instruction instead of doing it.
//! 2. Rejections are silent on screen and loud in the logs.
//! 3. If it touches money, it has tests. Plural.

pub mod config;
pub mod handoff;
pub mod types;
pub mod wallet;

pub use handoff::{
    BalanceAction, DecodeError, ProtocolEngine, ProtocolMessage, RejectReason, Role, RunExit,
    ScanDispatcher, ScanOutcome, Session, SessionError, SessionSnapshot, Step, Transition,
};
pub use types::{Identity, Money, MoneyError, TransactionId};
pub use wallet::{MemoryWallet, Wallet, WalletError};
