//! # Transition Engine
//!
//! The engine is a pure function of (session, message, balance) to either a
//! new session or a rejection reason. It never blocks, never does I/O and
//! never touches the wallet beyond reading the balance: debits and credits
//! come back as a [`BalanceAction`] for the dispatcher to apply.
//!
//! ## Accept-lists
//!
//! ```text
//!   Sender    REQUEST ─REQUEST─► INIT ─ACK─► COMMIT ─SUCCESS─► SUCCESS
//!   Receiver  REQUEST ─INIT────► ACK  ─COMMIT──────────────► SUCCESS
//! ```
//!
//! A message is only looked at if `(role, step, tag)` is on the list. Tags a
//! role never accepts are [`RejectReason::WrongRole`]; tags it accepts at
//! some other step are [`RejectReason::WrongStep`]. Then the guards run:
//! balance for the sender's REQUEST, addressee for the receiver's INIT, and
//! transaction id equality for everything after.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::RejectReason;
use super::message::{decode, ProtocolMessage, Step};
use super::session::{Role, Session};
use crate::config;
use crate::types::{Identity, Money, TransactionId};
use crate::wallet::Wallet;

/// `(current step, accepted tag)` pairs for the sender.
const SENDER_ACCEPTS: &[(Step, Step)] = &[
    (Step::Request, Step::Request),
    (Step::Init, Step::Ack),
    (Step::Commit, Step::Success),
];

/// `(current step, accepted tag)` pairs for the receiver.
const RECEIVER_ACCEPTS: &[(Step, Step)] = &[(Step::Request, Step::Init), (Step::Ack, Step::Commit)];

// ---------------------------------------------------------------------------
// Transition Output
// ---------------------------------------------------------------------------

/// Wallet mutation an accepted transition asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceAction {
    /// Sender, on ACK.
    Debit(Money),
    /// Receiver, on COMMIT.
    Credit(Money),
}

impl BalanceAction {
    /// Applies the mutation to `wallet`.
    pub fn apply(&self, wallet: &dyn Wallet) -> Result<Money, crate::wallet::WalletError> {
        match *self {
            Self::Debit(amount) => wallet.debit(amount),
            Self::Credit(amount) => wallet.credit(amount),
        }
    }
}

impl fmt::Display for BalanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debit(amount) => write!(f, "debit {}", amount),
            Self::Credit(amount) => write!(f, "credit {}", amount),
        }
    }
}

/// Result of feeding one message to the engine.
#[derive(Debug, Clone)]
pub enum Transition {
    /// The message was accepted.
    Accepted {
        /// Session to install in place of the old one.
        session: Session,
        /// Message to show next, if any. Its encoding is already in
        /// `session.outgoing()`.
        emit: Option<ProtocolMessage>,
        /// Wallet mutation to apply exactly once, if any.
        action: Option<BalanceAction>,
    },
    /// Nothing happens.
    Rejected(RejectReason),
}

impl Transition {
    /// `true` for [`Transition::Accepted`].
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// The rejection reason, if any.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected(reason) => Some(*reason),
            Self::Accepted { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

type TxIdSource = Box<dyn Fn() -> TransactionId + Send + Sync>;

/// Transition function for one device.
///
/// Holds the device's own identity (written into INIT as `from`, compared
/// against INIT's `to`) and the source of fresh transaction ids.
pub struct ProtocolEngine {
    identity: Identity,
    mint_tx_id: TxIdSource,
}

impl fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl ProtocolEngine {
    /// Engine for `identity`, minting UUIDv4 transaction ids.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            mint_tx_id: Box::new(TransactionId::generate),
        }
    }

    /// Replaces the transaction id source. Tests use this to get
    /// predictable ids.
    pub fn with_tx_id_source<F>(mut self, source: F) -> Self
    where
        F: Fn() -> TransactionId + Send + Sync + 'static,
    {
        self.mint_tx_id = Box::new(source);
        self
    }

    /// This device's identity.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The accept-list for `role`.
    pub fn accept_list(role: Role) -> &'static [(Step, Step)] {
        match role {
            Role::Sender => SENDER_ACCEPTS,
            Role::Receiver => RECEIVER_ACCEPTS,
        }
    }

    /// Checks `tag` against the accept-list of `role` at `step`.
    ///
    /// # Errors
    ///
    /// [`RejectReason::WrongRole`] if the role never accepts `tag`,
    /// [`RejectReason::WrongStep`] if it does but not at `step`.
    pub fn admit(role: Role, step: Step, tag: Step) -> Result<(), RejectReason> {
        let table = Self::accept_list(role);
        if !table.iter().any(|(_, accepted)| *accepted == tag) {
            return Err(RejectReason::WrongRole);
        }
        if !table.contains(&(step, tag)) {
            return Err(RejectReason::WrongStep);
        }
        Ok(())
    }

    /// Decodes `text` and feeds it to [`Self::transition`]. A frame that
    /// does not decode is [`RejectReason::DecodeFailed`].
    pub fn apply_text(&self, session: &Session, text: &str, wallet: &dyn Wallet) -> Transition {
        match decode(text) {
            Ok(message) => self.transition(session, &message, wallet),
            Err(e) => {
                debug!(error = %e, "ignoring undecodable frame");
                Transition::Rejected(RejectReason::DecodeFailed)
            }
        }
    }

    /// Computes the effect of `message` on `session`.
    ///
    /// `wallet` is only read, and only for the sender's sufficiency check.
    pub fn transition(
        &self,
        session: &Session,
        message: &ProtocolMessage,
        wallet: &dyn Wallet,
    ) -> Transition {
        let outcome = self.evaluate(session, message, wallet);
        match &outcome {
            Transition::Accepted {
                session: next,
                action,
                ..
            } => {
                info!(
                    role = ?next.role(),
                    from = %session.step(),
                    to = %next.step(),
                    tx_id = next.tx_id().map(|t| t.as_str()).unwrap_or("-"),
                    action = action.map(|a| a.to_string()).unwrap_or_default(),
                    "handoff transition"
                );
            }
            Transition::Rejected(reason) => {
                debug!(
                    role = ?session.role(),
                    step = %session.step(),
                    tag = %message.step(),
                    %reason,
                    "scan rejected"
                );
            }
        }
        outcome
    }

    fn evaluate(
        &self,
        session: &Session,
        message: &ProtocolMessage,
        wallet: &dyn Wallet,
    ) -> Transition {
        let Some(role) = session.role() else {
            return Transition::Rejected(RejectReason::WrongRole);
        };
        if let Err(reason) = Self::admit(role, session.step(), message.step()) {
            return Transition::Rejected(reason);
        }

        let result = match (role, message) {
            (Role::Sender, ProtocolMessage::Request { to }) => {
                self.sender_on_request(session, to, wallet)
            }
            (Role::Sender, ProtocolMessage::Ack { tx_id, .. }) => sender_on_ack(session, tx_id),
            (Role::Sender, ProtocolMessage::Success { tx_id, .. }) => {
                sender_on_success(session, tx_id)
            }
            (
                Role::Receiver,
                ProtocolMessage::Init {
                    tx_id,
                    from,
                    to,
                    amount,
                },
            ) => self.receiver_on_init(session, tx_id, from, to, *amount),
            (Role::Receiver, ProtocolMessage::Commit { tx_id, .. }) => {
                receiver_on_commit(session, tx_id)
            }
            // `admit` already filtered everything else.
            _ => Err(RejectReason::WrongStep),
        };

        match result {
            Ok(transition) => transition,
            Err(reason) => Transition::Rejected(reason),
        }
    }

    /// Sender REQUEST → INIT. The balance check happens here, before any
    /// transaction id exists.
    fn sender_on_request(
        &self,
        session: &Session,
        to: &Identity,
        wallet: &dyn Wallet,
    ) -> Result<Transition, RejectReason> {
        let amount = session.amount();
        if wallet.balance() < amount {
            return Err(RejectReason::InsufficientBalance);
        }

        let tx_id = (self.mint_tx_id)();
        let init = ProtocolMessage::init(tx_id.clone(), self.identity.clone(), to.clone(), amount);

        let mut next = session.clone();
        next.bind(tx_id, to.clone());
        next.advance(Step::Init, config::STATUS_INITIALIZING, Some(init.encode()));

        Ok(Transition::Accepted {
            session: next,
            emit: Some(init),
            action: None,
        })
    }

    /// Receiver REQUEST → ACK, only for INITs addressed to us.
    fn receiver_on_init(
        &self,
        session: &Session,
        tx_id: &TransactionId,
        from: &Identity,
        to: &Identity,
        amount: Money,
    ) -> Result<Transition, RejectReason> {
        if to != &self.identity {
            return Err(RejectReason::IdentityMismatch);
        }

        let ack = ProtocolMessage::ack(tx_id.clone());

        let mut next = session.clone();
        next.bind(tx_id.clone(), from.clone());
        next.learn_amount(amount);
        next.advance(Step::Ack, config::STATUS_CONFIRMING, Some(ack.encode()));

        Ok(Transition::Accepted {
            session: next,
            emit: Some(ack),
            action: None,
        })
    }
}

fn check_tx(session: &Session, tx_id: &TransactionId) -> Result<(), RejectReason> {
    match session.tx_id() {
        Some(bound) if bound == tx_id => Ok(()),
        _ => Err(RejectReason::TxMismatch),
    }
}

/// Sender INIT → COMMIT, debiting.
fn sender_on_ack(session: &Session, tx_id: &TransactionId) -> Result<Transition, RejectReason> {
    check_tx(session, tx_id)?;

    let commit = ProtocolMessage::commit(tx_id.clone());
    let mut next = session.clone();
    next.advance(Step::Commit, config::STATUS_FINALIZING, Some(commit.encode()));

    Ok(Transition::Accepted {
        action: Some(BalanceAction::Debit(next.amount())),
        session: next,
        emit: Some(commit),
    })
}

/// Sender COMMIT → SUCCESS. Nothing left to show.
fn sender_on_success(session: &Session, tx_id: &TransactionId) -> Result<Transition, RejectReason> {
    check_tx(session, tx_id)?;

    let mut next = session.clone();
    next.advance(Step::Success, config::STATUS_SENDER_DONE, None);

    Ok(Transition::Accepted {
        session: next,
        emit: None,
        action: None,
    })
}

/// Receiver ACK → SUCCESS, crediting. SUCCESS stays on screen for the sender.
fn receiver_on_commit(session: &Session, tx_id: &TransactionId) -> Result<Transition, RejectReason> {
    check_tx(session, tx_id)?;

    let success = ProtocolMessage::success(tx_id.clone());
    let mut next = session.clone();
    next.advance(Step::Success, config::STATUS_RECEIVER_DONE, Some(success.encode()));

    Ok(Transition::Accepted {
        action: Some(BalanceAction::Credit(next.amount())),
        session: next,
        emit: Some(success),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
