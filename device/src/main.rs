// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # offpay Device
//!
//! Entry point for the `offpay-device` binary, a terminal stand-in for the
//! phone app. Stdin is the camera, stdout is the screen:
//!
//! - `send`    — pay someone: scan their REQUEST, show INIT, ...
//! - `receive` — get paid: show a REQUEST, scan INIT, ...
//! - `decode`  — print what a captured payload decodes to
//! - `version` — print build version information
//!
//! Two devices can be wired together with a pair of FIFOs, each reading the
//! other's stdout.

mod cli;
mod console;
mod logging;
mod metrics;

use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::{mpsc, watch};

use offpay_protocol::config::{
    PROTOCOL_VERSION, RECEIVER_FALLBACK_IDENTITY, SENDER_FALLBACK_IDENTITY,
};
use offpay_protocol::handoff::decode;
use offpay_protocol::{
    Identity, MemoryWallet, Money, ProtocolEngine, Role, RunExit, ScanDispatcher, ScanOutcome,
    Step, Wallet,
};

use cli::{Commands, DecodeArgs, DeviceArgs, DeviceCli};
use logging::LogFormat;
use metrics::DeviceMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DeviceCli::parse();

    match cli.command {
        Commands::Send(args) => run_device(Role::Sender, Some(args.amount), args.device).await?,
        Commands::Receive(args) => run_device(Role::Receiver, None, args).await?,
        Commands::Decode(args) => return decode_payload(args),
        Commands::Version => {
            print_version();
            return Ok(());
        }
    }

    // The stdin reader is parked in a blocking read that cannot be cancelled;
    // dropping the runtime would wait for the next line.
    std::process::exit(0)
}

/// Runs one handoff as `role` until SUCCESS, cancel, end of input or Ctrl+C.
async fn run_device(role: Role, amount: Option<Money>, args: DeviceArgs) -> Result<()> {
    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&args.log_format),
    );

    let fallback = match role {
        Role::Sender => SENDER_FALLBACK_IDENTITY,
        Role::Receiver => RECEIVER_FALLBACK_IDENTITY,
    };
    let identity = Identity::resolve(None, args.identity.as_deref(), fallback);

    tracing::info!(
        %identity,
        %role,
        balance = %args.balance,
        metrics_port = ?args.metrics_port,
        "starting offpay-device"
    );

    // --- Wallet and dispatcher ---
    let wallet = Arc::new(MemoryWallet::new(identity.clone(), args.balance));
    let dispatcher = Arc::new(ScanDispatcher::new(ProtocolEngine::new(identity), wallet));

    // --- Metrics ---
    let device_metrics = Arc::new(DeviceMetrics::new().context("failed to create metrics")?);
    let metrics_server = match args.metrics_port {
        Some(port) => Some(spawn_metrics_server(port, Arc::clone(&device_metrics)).await?),
        None => None,
    };

    // --- Session ---
    let started = dispatcher
        .begin(role, amount)
        .with_context(|| format!("cannot start {role} session"))?;
    tracing::info!(status = %started.status, prompt = %started.scan_prompt, "session started");
    let mut shown = started.outgoing;
    if let Some(payload) = &shown {
        println!("{payload}");
    }

    // --- Console and signals ---
    let (frames_tx, frames_rx) = mpsc::channel(console::FRAME_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reader = tokio::spawn(console::read_console(
        tokio::io::BufReader::new(tokio::io::stdin()),
        Arc::clone(&dispatcher),
        frames_tx,
        shutdown_tx.clone(),
    ));

    let signals = tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    // --- Scan loop ---
    let exit = dispatcher
        .run(
            console::frame_stream(frames_rx),
            shutdown_rx,
            |outcome: &ScanOutcome| {
                device_metrics.record(outcome);

                let ScanOutcome::Accepted { step, outgoing, .. } = outcome else {
                    return ControlFlow::Continue(());
                };
                if *outgoing != shown {
                    if let Some(payload) = outgoing {
                        println!("{payload}");
                    }
                    shown = outgoing.clone();
                }
                if *step == Step::Success {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )
        .await;

    let finished = dispatcher.snapshot();
    match (exit, finished.completion) {
        (_, Some(line)) => tracing::info!(tx_id = ?finished.tx_id, "{line}"),
        (RunExit::Shutdown, None) => tracing::info!("handoff abandoned"),
        (RunExit::CaptureEnded, None) => {
            tracing::warn!(step = %finished.step, "input closed before the handoff completed")
        }
        (RunExit::Stopped, None) => {}
    }
    tracing::info!(balance = %dispatcher.wallet().balance(), "final balance");

    signals.abort();
    reader.abort();
    if let Some(server) = metrics_server {
        server.abort();
    }
    tracing::info!("offpay-device stopped");
    Ok(())
}

/// Binds the metrics port and serves `/metrics` in the background.
async fn spawn_metrics_server(
    port: u16,
    device_metrics: metrics::SharedMetrics,
) -> Result<tokio::task::JoinHandle<()>> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {addr}"))?;
    tracing::info!("Metrics server listening on {}", addr);

    let router = metrics::router(device_metrics);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!("Metrics server error: {}", e);
        }
    }))
}

/// Prints the decoded form of a captured payload.
fn decode_payload(args: DecodeArgs) -> Result<()> {
    let message = decode(&args.payload).context("payload is not a handoff message")?;
    let pretty =
        serde_json::to_string_pretty(&message).context("failed to render decoded message")?;
    println!("{} {}", message.step(), pretty);
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("offpay-device {}", env!("CARGO_PKG_VERSION"));
    println!("protocol      {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
