//! # Wire Codec
//!
//! Every QR code carries a single JSON object whose `type` field names one of
//! the five steps:
//!
//! ```text
//! {"type":"REQUEST","to":"<identity>"}
//! {"type":"INIT","tx_id":"<uuid>","from":"<identity>","to":"<identity>","amount":<number>}
//! {"type":"ACK","tx_id":"<uuid>","status":"OK"}
//! {"type":"COMMIT","tx_id":"<uuid>","status":"DONE"}
//! {"type":"SUCCESS","tx_id":"<uuid>","message":"SUCCESS"}
//! ```
//!
//! Decoding is two-phase. [`sniff`] reads only the tag; [`decode`] trusts
//! the remaining fields only after the tag is known. A camera pointed at a
//! restaurant menu produces [`DecodeError::UnknownType`], not a panic.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::DecodeError;
use crate::config::{ACK_STATUS, COMMIT_STATUS, SUCCESS_MESSAGE, TYPE_FIELD};
use crate::types::{Identity, Money, TransactionId};

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// Protocol phase tag, identical to the wire discriminant.
///
/// In a session it means "the message type currently shown or expected
/// next"; sender and receiver read the same tag differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Step {
    /// Receiver announces who it is.
    Request,
    /// Sender proposes a transaction.
    Init,
    /// Receiver accepts it.
    Ack,
    /// Sender has debited.
    Commit,
    /// Receiver has credited. Terminal.
    Success,
}

impl Step {
    /// All steps in protocol order.
    pub const ALL: [Step; 5] = [
        Step::Request,
        Step::Init,
        Step::Ack,
        Step::Commit,
        Step::Success,
    ];

    /// The wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Init => "INIT",
            Self::Ack => "ACK",
            Self::Commit => "COMMIT",
            Self::Success => "SUCCESS",
        }
    }

    /// Looks up a wire tag. Case-sensitive.
    pub fn from_tag(tag: &str) -> Option<Step> {
        Self::ALL.into_iter().find(|s| s.as_str() == tag)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ProtocolMessage
// ---------------------------------------------------------------------------

fn default_ack_status() -> String {
    ACK_STATUS.to_string()
}

fn default_commit_status() -> String {
    COMMIT_STATUS.to_string()
}

fn default_success_message() -> String {
    SUCCESS_MESSAGE.to_string()
}

/// One message of the handoff, as carried by a single QR code.
///
/// The fixed literals (`status`, `message`) are kept so a decoded message
/// re-encodes to what was scanned. Peers that omit them get the default;
/// peers that send a non-string get [`DecodeError::Malformed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum ProtocolMessage {
    /// Shown by the receiver when it picks its role.
    Request {
        /// The receiver's own identity.
        to: Identity,
    },
    /// Shown by the sender once it has checked its balance.
    Init {
        /// Freshly minted by the sender.
        tx_id: TransactionId,
        /// The sender.
        from: Identity,
        /// The receiver, copied from its REQUEST.
        to: Identity,
        /// How much is moving.
        amount: Money,
    },
    /// Shown by the receiver after binding to `tx_id`.
    Ack {
        /// The bound transaction.
        tx_id: TransactionId,
        /// Always `"OK"` when we produce it.
        #[serde(default = "default_ack_status")]
        status: String,
    },
    /// Shown by the sender after debiting.
    Commit {
        /// The bound transaction.
        tx_id: TransactionId,
        /// Always `"DONE"` when we produce it.
        #[serde(default = "default_commit_status")]
        status: String,
    },
    /// Shown by the receiver after crediting.
    Success {
        /// The bound transaction.
        tx_id: TransactionId,
        /// Always `"SUCCESS"` when we produce it.
        #[serde(default = "default_success_message")]
        message: String,
    },
}

impl ProtocolMessage {
    /// `REQUEST` addressed from `to`.
    pub fn request(to: Identity) -> Self {
        Self::Request { to }
    }

    /// `INIT` for a freshly minted transaction.
    pub fn init(tx_id: TransactionId, from: Identity, to: Identity, amount: Money) -> Self {
        Self::Init {
            tx_id,
            from,
            to,
            amount,
        }
    }

    /// `ACK` with the fixed `"OK"` status.
    pub fn ack(tx_id: TransactionId) -> Self {
        Self::Ack {
            tx_id,
            status: default_ack_status(),
        }
    }

    /// `COMMIT` with the fixed `"DONE"` status.
    pub fn commit(tx_id: TransactionId) -> Self {
        Self::Commit {
            tx_id,
            status: default_commit_status(),
        }
    }

    /// `SUCCESS` with the fixed `"SUCCESS"` message.
    pub fn success(tx_id: TransactionId) -> Self {
        Self::Success {
            tx_id,
            message: default_success_message(),
        }
    }

    /// The step tag this message carries.
    pub fn step(&self) -> Step {
        match self {
            Self::Request { .. } => Step::Request,
            Self::Init { .. } => Step::Init,
            Self::Ack { .. } => Step::Ack,
            Self::Commit { .. } => Step::Commit,
            Self::Success { .. } => Step::Success,
        }
    }

    /// The transaction id, for every variant after REQUEST.
    pub fn tx_id(&self) -> Option<&TransactionId> {
        match self {
            Self::Request { .. } => None,
            Self::Init { tx_id, .. }
            | Self::Ack { tx_id, .. }
            | Self::Commit { tx_id, .. }
            | Self::Success { tx_id, .. } => Some(tx_id),
        }
    }

    /// Serializes to the QR payload text.
    pub fn encode(&self) -> String {
        encode(self)
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Serializes a message to its QR payload.
pub fn encode(message: &ProtocolMessage) -> String {
    // Identity, TransactionId and Money all serialize infallibly and every
    // map key is a static string.
    serde_json::to_string(message).expect("protocol messages always serialize")
}

/// Reads only the `type` tag of a payload.
///
/// # Errors
///
/// [`DecodeError::UnknownType`] when the text is not a JSON object, has no
/// string `type`, or names a step we do not know.
pub fn sniff(text: &str) -> Result<Step, DecodeError> {
    let value = parse_object(text)?;
    sniff_value(&value)
}

/// Fully decodes a payload.
///
/// # Errors
///
/// [`DecodeError::UnknownType`] as for [`sniff`];
/// [`DecodeError::Malformed`] when the tag is known but the variant's
/// fields do not decode.
pub fn decode(text: &str) -> Result<ProtocolMessage, DecodeError> {
    let value = parse_object(text)?;
    let step = sniff_value(&value)?;
    serde_json::from_value(value).map_err(|e| DecodeError::Malformed {
        step,
        reason: e.to_string(),
    })
}

fn parse_object(text: &str) -> Result<Value, DecodeError> {
    serde_json::from_str::<Value>(text.trim())
        .map_err(|_| DecodeError::UnknownType("<not json>".to_string()))
}

fn sniff_value(value: &Value) -> Result<Step, DecodeError> {
    let tag = value
        .get(TYPE_FIELD)
        .ok_or_else(|| DecodeError::UnknownType("<missing>".to_string()))?;
    let tag = tag
        .as_str()
        .ok_or_else(|| DecodeError::UnknownType(tag.to_string()))?;
    Step::from_tag(tag).ok_or_else(|| DecodeError::UnknownType(tag.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
