//! # CLI Interface
//!
//! `clap` derive definitions for `offpay-device`: `send`, `receive`,
//! `decode` and `version`.

use clap::{Args, Parser, Subcommand};
use offpay_protocol::Money;

/// Offline QR value transfer, one terminal per phone.
///
/// `send` and `receive` read scanned payloads from stdin, one per line, and
/// print every code the device would show on stdout. Pipe two of them into
/// each other (or copy lines by hand) to run a handoff.
#[derive(Parser, Debug)]
#[command(
    name = "offpay-device",
    about = "Offline QR value transfer device",
    version,
    propagate_version = true
)]
pub struct DeviceCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send money: scan the receiver's REQUEST, show INIT, and so on.
    Send(SendArgs),
    /// Receive money: show a REQUEST and wait for the sender.
    Receive(DeviceArgs),
    /// Decode one captured payload and print it.
    Decode(DecodeArgs),
    /// Print version information and exit.
    Version,
}

/// Options shared by `send` and `receive`.
#[derive(Args, Debug)]
pub struct DeviceArgs {
    /// This device's identity (phone number or user id).
    ///
    /// Falls back to a role-specific placeholder when unset or empty.
    #[arg(long, short = 'i', env = "OFFPAY_IDENTITY")]
    pub identity: Option<String>,

    /// Opening wallet balance, e.g. `100` or `12.50`.
    #[arg(long, short = 'b', default_value = "0")]
    pub balance: Money,

    /// Serve Prometheus metrics on this port.
    #[arg(long, env = "OFFPAY_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Log format: `pretty` or `json`.
    #[arg(long, env = "OFFPAY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `send` subcommand.
#[derive(Args, Debug)]
pub struct SendArgs {
    /// Amount to transfer. Must be greater than zero.
    #[arg(long, short = 'a')]
    pub amount: Money,

    #[command(flatten)]
    pub device: DeviceArgs,
}

/// Arguments for the `decode` subcommand.
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// The scanned text.
    pub payload: String,
}
