//! # Handoff Session
//!
//! One [`Session`] per transfer attempt on one device. It records which role
//! the user picked, which step the exchange is at, the transaction the
//! session is bound to, and the code currently on screen.
//!
//! Fields are private. The only writers are the engine (through the
//! `pub(super)` transition helpers below) and the dispatcher (lock
//! acquisition and release). Everything else reads accessors or a
//! [`SessionSnapshot`].
//!
//! ## Epochs
//!
//! Every session created by a `begin_*` or [`Session::reset`] gets a fresh
//! epoch from a process-wide counter; transitions keep it. A transition
//! computed against epoch `n` is discarded if the installed session has
//! moved on, which is how a cancel beats an in-flight scan.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SessionError;
use super::message::{ProtocolMessage, Step};
use crate::config;
use crate::types::{Identity, Money, TransactionId};

static NEXT_EPOCH: AtomicU64 = AtomicU64::new(1);

fn next_epoch() -> u64 {
    NEXT_EPOCH.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which side of the transfer this device is on. Chosen once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Pays. Scans REQUEST, ACK, SUCCESS.
    Sender,
    /// Gets paid. Scans INIT, COMMIT.
    Receiver,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "Sender"),
            Self::Receiver => write!(f, "Receiver"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Per-device state of one handoff.
///
/// A session with no role is the "select role" screen: it accepts nothing.
#[derive(Debug, Clone)]
pub struct Session {
    role: Option<Role>,
    step: Step,
    tx_id: Option<TransactionId>,
    counterpart: Option<Identity>,
    amount: Money,
    outgoing: Option<String>,
    scan_lock: bool,
    status: &'static str,
    epoch: u64,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Idle session: no role, nothing shown.
    pub fn reset() -> Self {
        Self {
            role: None,
            step: Step::Request,
            tx_id: None,
            counterpart: None,
            amount: Money::ZERO,
            outgoing: None,
            scan_lock: false,
            status: config::STATUS_SELECT_ROLE,
            epoch: next_epoch(),
            started_at: Utc::now(),
        }
    }

    /// Starts a session for `role`.
    ///
    /// `identity` is this device's own identity; a receiver puts it in the
    /// REQUEST it shows straight away.
    ///
    /// # Errors
    ///
    /// A sender needs a non-zero `amount`; a receiver must not be given one.
    pub fn begin(
        role: Role,
        identity: &Identity,
        amount: Option<Money>,
    ) -> Result<Self, SessionError> {
        match (role, amount) {
            (Role::Sender, Some(amount)) => Self::begin_sender(amount),
            (Role::Sender, None) => Err(SessionError::MissingAmount),
            (Role::Receiver, None) => Ok(Self::begin_receiver(identity)),
            (Role::Receiver, Some(_)) => Err(SessionError::UnexpectedAmount),
        }
    }

    /// Sender waiting to scan the receiver's REQUEST.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidAmount`] for zero or anything above
    /// [`Money::MAX`].
    pub fn begin_sender(amount: Money) -> Result<Self, SessionError> {
        if amount.is_zero() || amount.checked().is_err() {
            return Err(SessionError::InvalidAmount(amount));
        }
        Ok(Self {
            role: Some(Role::Sender),
            amount,
            status: config::STATUS_SENDER_SCANNING,
            ..Self::reset()
        })
    }

    /// Receiver showing its REQUEST.
    pub fn begin_receiver(identity: &Identity) -> Self {
        let request = ProtocolMessage::request(identity.clone());
        Self {
            role: Some(Role::Receiver),
            outgoing: Some(request.encode()),
            status: config::STATUS_RECEIVER_SHOWING,
            ..Self::reset()
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// The role, or `None` while the user has not picked one.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    /// The step tag.
    pub fn step(&self) -> Step {
        self.step
    }

    /// The bound transaction, once INIT has happened.
    pub fn tx_id(&self) -> Option<&TransactionId> {
        self.tx_id.as_ref()
    }

    /// The other device's identity, once known.
    pub fn counterpart(&self) -> Option<&Identity> {
        self.counterpart.as_ref()
    }

    /// Transfer amount. Zero for a receiver that has not seen INIT.
    pub fn amount(&self) -> Money {
        self.amount
    }

    /// Payload currently on screen.
    pub fn outgoing(&self) -> Option<&str> {
        self.outgoing.as_deref()
    }

    /// `true` while a scan is being processed.
    pub fn is_scan_locked(&self) -> bool {
        self.scan_lock
    }

    /// One-line status for the screen.
    pub fn status(&self) -> &'static str {
        self.status
    }

    /// Identity of this session instance; see the module docs.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// When the session was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// `true` once the terminal step is reached.
    pub fn is_terminal(&self) -> bool {
        self.role.is_some() && self.step == Step::Success
    }

    /// What the camera overlay asks the user to scan.
    pub fn scan_prompt(&self) -> &'static str {
        match (self.role, self.step) {
            (Some(Role::Sender), Step::Request) => "Receiver's Request",
            (Some(Role::Sender), Step::Init) => "Scan ACK",
            (Some(Role::Sender), Step::Commit) => "Scan Final Confirmation",
            (Some(Role::Receiver), Step::Request) => "Sender's Init",
            (Some(Role::Receiver), Step::Ack) => "Sender's Commit",
            _ => "Complete",
        }
    }

    /// Closing line for the success screen, or `None` before SUCCESS.
    pub fn completion_summary(&self) -> Option<String> {
        if !self.is_terminal() {
            return None;
        }
        match self.role? {
            Role::Sender => Some(format!("Sent ${} successfully.", self.amount)),
            Role::Receiver => Some(format!("Received ${} successfully.", self.amount)),
        }
    }

    /// Read-only copy for the UI.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            role: self.role,
            step: self.step,
            tx_id: self.tx_id.clone(),
            counterpart: self.counterpart.clone(),
            amount: self.amount,
            outgoing: self.outgoing.clone(),
            status: self.status.to_string(),
            scan_prompt: self.scan_prompt().to_string(),
            completion: self.completion_summary(),
            scan_locked: self.scan_lock,
            started_at: self.started_at,
        }
    }

    // -----------------------------------------------------------------------
    // Writers (engine and dispatcher only)
    // -----------------------------------------------------------------------

    /// Binds the transaction. The id and counterpart are only ever set once;
    /// a second call leaves the first binding in place.
    pub(super) fn bind(&mut self, tx_id: TransactionId, counterpart: Identity) {
        if self.tx_id.is_none() {
            self.tx_id = Some(tx_id);
            self.counterpart = Some(counterpart);
        }
    }

    /// Records the amount a receiver learned from INIT.
    pub(super) fn learn_amount(&mut self, amount: Money) {
        if self.role == Some(Role::Receiver) && self.amount.is_zero() {
            self.amount = amount;
        }
    }

    /// Moves to `step`, replacing what is shown.
    pub(super) fn advance(&mut self, step: Step, status: &'static str, outgoing: Option<String>) {
        self.step = step;
        self.status = status;
        self.outgoing = outgoing;
    }

    /// Takes the scan lock. Returns `false` if it was already held.
    pub(super) fn try_lock_scan(&mut self) -> bool {
        if self.scan_lock {
            return false;
        }
        self.scan_lock = true;
        true
    }

    pub(super) fn unlock_scan(&mut self) {
        self.scan_lock = false;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::reset()
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Immutable view of a session, published after every accepted transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Picked role, if any.
    pub role: Option<Role>,
    /// Current step tag.
    pub step: Step,
    /// Bound transaction.
    pub tx_id: Option<TransactionId>,
    /// Other device.
    pub counterpart: Option<Identity>,
    /// Transfer amount.
    pub amount: Money,
    /// Payload to render as a QR code.
    pub outgoing: Option<String>,
    /// Status line.
    pub status: String,
    /// Camera overlay hint.
    pub scan_prompt: String,
    /// Success-screen line, once the handoff is complete.
    pub completion: Option<String>,
    /// Whether a scan was in flight when the snapshot was taken.
    pub scan_locked: bool,
    /// Session creation time.
    pub started_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
