//! # QR Handoff Protocol
//!
//! The handoff module implements the five-step exchange two offline devices
//! use to move value by showing and scanning QR codes. Each code is one
//! message; scanning it is the only delivery signal the protocol ever gets.
//!
//! ## The Five Steps
//!
//! ```text
//!   ┌──────────┐                              ┌──────────┐
//!   │  Sender  │                              │ Receiver │
//!   └────┬─────┘                              └────┬─────┘
//!        │                                         │
//!        │  1. REQUEST {to}              (shows)   │
//!        │◄────────────────────────────────────────┤
//!        │  balance >= amount? mint tx_id          │
//!        │                                         │
//!        │  2. INIT {tx_id, from, to, amount}      │
//!        ├────────────────────────────────────────►│
//!        │                          to == me? bind │
//!        │                                         │
//!        │  3. ACK {tx_id, "OK"}                   │
//!        │◄────────────────────────────────────────┤
//!        │  debit                                  │
//!        │                                         │
//!        │  4. COMMIT {tx_id, "DONE"}              │
//!        ├────────────────────────────────────────►│
//!        │                                  credit │
//!        │                                         │
//!        │  5. SUCCESS {tx_id, "SUCCESS"}          │
//!        │◄────────────────────────────────────────┤
//!        │                                         │
//! ```
//!
//! ### Codec (`message.rs`)
//! Two-phase decode: sniff the `type` tag, then decode the variant. Bad
//! frames become a [`DecodeError`], never a panic.
//!
//! ### Session (`session.rs`)
//! Role, step, bound transaction id, counterpart, amount, the code being
//! shown, and the single-flight scan lock.
//!
//! ### Engine (`engine.rs`)
//! A pure transition function over role-indexed accept-lists. It returns a
//! new session, the message to show, and at most one balance instruction.
//!
//! ### Dispatcher (`dispatcher.rs`)
//! Admits one scan at a time, applies the balance instruction exactly once,
//! and discards results computed against a session that was reset.
//!
//! ## Trust Model
//!
//! There is none beyond physical presence. No signatures, no channel
//! binding: the accept-lists plus transaction id equality are the only thing
//! standing between a stale code left in frame and a second debit.

pub mod dispatcher;
pub mod engine;
pub mod message;
pub mod session;

mod error;

pub use dispatcher::{RunExit, ScanDispatcher, ScanOutcome};
pub use engine::{BalanceAction, ProtocolEngine, Transition};
pub use error::{DecodeError, RejectReason, SessionError};
pub use message::{decode, encode, sniff, ProtocolMessage, Step};
pub use session::{Role, Session, SessionSnapshot};
