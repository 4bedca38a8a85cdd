//! # Protocol Configuration & Constants
//!
//! Every literal that ends up inside a QR code lives here. Both devices must
//! agree on these byte for byte, so changing one is a wire-format break and
//! needs a version bump on both sides of the counter.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// Version of the handoff payload format. Not carried on the wire; the
/// payload schema itself is the compatibility contract.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Wire Literals
// ---------------------------------------------------------------------------

/// JSON key holding the message discriminant.
pub const TYPE_FIELD: &str = "type";

/// Fixed `status` value carried by ACK.
pub const ACK_STATUS: &str = "OK";

/// Fixed `status` value carried by COMMIT.
pub const COMMIT_STATUS: &str = "DONE";

/// Fixed `message` value carried by SUCCESS.
pub const SUCCESS_MESSAGE: &str = "SUCCESS";

// ---------------------------------------------------------------------------
// Identity Fallbacks
// ---------------------------------------------------------------------------

/// Identity a receiver advertises when the account has neither a phone
/// number nor a user id.
pub const RECEIVER_FALLBACK_IDENTITY: &str = "unknown";

/// Identity a sender writes into INIT under the same conditions.
pub const SENDER_FALLBACK_IDENTITY: &str = "sender";

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Minor units per major unit. Two decimal places, like every fiat wallet
/// this was built for.
pub const MONEY_SCALE: u64 = 100;

/// Decimal places implied by [`MONEY_SCALE`].
pub const MONEY_DECIMALS: usize = 2;

/// Largest amount, in minor units, that can go on the wire. Fractional
/// amounts travel as JSON floats; below 2^50 cents every cent survives the
/// float round trip.
pub const MAX_WIRE_MINOR: u64 = 1 << 50;

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// How many characters of the last captured frame the debug overlay keeps.
pub const SCAN_PREVIEW_LEN: usize = 20;

// ---------------------------------------------------------------------------
// Status Lines
// ---------------------------------------------------------------------------

/// Shown while no role has been picked.
pub const STATUS_SELECT_ROLE: &str = "Select Role";
/// Sender has entered an amount and is pointing the camera at the receiver.
pub const STATUS_SENDER_SCANNING: &str = "Scanning for Receiver...";
/// Receiver is showing its REQUEST.
pub const STATUS_RECEIVER_SHOWING: &str = "Show QR to Sender";
/// Sender accepted the REQUEST and shows INIT.
pub const STATUS_INITIALIZING: &str = "Initializing...";
/// Receiver accepted INIT and shows ACK.
pub const STATUS_CONFIRMING: &str = "Confirming...";
/// Sender debited and shows COMMIT.
pub const STATUS_FINALIZING: &str = "Finalizing...";
/// Receiver credited and shows SUCCESS.
pub const STATUS_RECEIVER_DONE: &str = "Success!";
/// Sender saw the receiver's SUCCESS.
pub const STATUS_SENDER_DONE: &str = "Transfer Complete!";
