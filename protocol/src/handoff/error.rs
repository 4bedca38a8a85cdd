//! Error and rejection types for the handoff protocol.
//!
//! [`DecodeError`] and [`SessionError`] are ordinary errors. [`RejectReason`]
//! is not: a rejected scan is the normal case when a camera sees the same
//! code forty times, so it is a diagnostic code, not a failure.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::message::Step;
use crate::types::Money;

/// Why a captured payload could not be turned into a protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// No `type` tag, a non-string tag, a tag we do not know, or a payload
    /// that is not a JSON object at all.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The tag was recognized but the variant's fields are missing or
    /// mistyped.
    #[error("malformed {step} message: {reason}")]
    Malformed {
        /// The variant the tag announced.
        step: Step,
        /// What the field decoder complained about.
        reason: String,
    },
}

/// Diagnostic code for a scan that produced no transition.
///
/// Every variant means the same thing to the protocol: stay put, show the
/// same code, mutate nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// The frame was not a protocol message.
    DecodeFailed,
    /// This role never accepts that message type, or no role is active.
    WrongRole,
    /// The role accepts that type, just not at the current step.
    WrongStep,
    /// An INIT addressed to someone else.
    IdentityMismatch,
    /// ACK, COMMIT or SUCCESS carrying a different transaction id.
    TxMismatch,
    /// The sender cannot cover the amount.
    InsufficientBalance,
}

impl RejectReason {
    /// Every reason, for pre-registering metric labels.
    pub const ALL: [RejectReason; 6] = [
        RejectReason::DecodeFailed,
        RejectReason::WrongRole,
        RejectReason::WrongStep,
        RejectReason::IdentityMismatch,
        RejectReason::TxMismatch,
        RejectReason::InsufficientBalance,
    ];

    /// Stable snake_case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecodeFailed => "decode_failed",
            Self::WrongRole => "wrong_role",
            Self::WrongStep => "wrong_step",
            Self::IdentityMismatch => "identity_mismatch",
            Self::TxMismatch => "tx_mismatch",
            Self::InsufficientBalance => "insufficient_balance",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised when starting a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A sender must know how much it is sending.
    #[error("a sender session needs an amount")]
    MissingAmount,

    /// Zero is not a transfer, and amounts above [`Money::MAX`] cannot be
    /// sent.
    #[error("invalid amount {0}: must be greater than zero and at most {max}", max = Money::MAX)]
    InvalidAmount(Money),

    /// Receivers learn the amount from INIT.
    #[error("a receiver session does not take an amount")]
    UnexpectedAmount,
}
