//! # Scan Dispatcher
//!
//! The capture pipeline decodes frames far faster than a person can move a
//! phone, so the same QR code arrives dozens of times in a row. The
//! dispatcher turns that stream into single, non-overlapping engine calls:
//!
//! 1. Take the session's scan lock. If it is already held, drop the frame
//!    ([`ScanOutcome::Busy`]). Frames are never queued.
//! 2. Run the engine against a copy of the session, outside the mutex.
//! 3. Re-take the mutex. If the session was replaced meanwhile (cancel, new
//!    transaction) the result is [`ScanOutcome::Stale`] and is thrown away.
//! 4. Otherwise apply the balance action, install the new session and
//!    release the lock in one critical section.
//!
//! Step 4 is where "exactly once" comes from: the debit or credit and the
//! step change that makes the same message unacceptable happen together.

use std::ops::ControlFlow;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::engine::{BalanceAction, ProtocolEngine, Transition};
use super::error::{RejectReason, SessionError};
use super::message::Step;
use super::session::{Role, Session, SessionSnapshot};
use crate::config::SCAN_PREVIEW_LEN;
use crate::types::Money;
use crate::wallet::{Wallet, WalletError};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What happened to one submitted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Dropped: another scan was still being processed.
    Busy,
    /// Processed, no transition.
    Rejected(RejectReason),
    /// Processed against a session that has since been replaced; discarded.
    Stale,
    /// Transition applied.
    Accepted {
        /// Step after the transition.
        step: Step,
        /// Payload now on screen.
        outgoing: Option<String>,
        /// Wallet mutation the transition requested, if any.
        action: Option<BalanceAction>,
        /// Set when the wallet refused `action`. The step still advanced.
        wallet_error: Option<WalletError>,
    },
}

impl ScanOutcome {
    /// `true` for [`ScanOutcome::Accepted`].
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Why [`ScanDispatcher::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The frame stream ended.
    CaptureEnded,
    /// The shutdown flag was raised or its sender dropped.
    Shutdown,
    /// The outcome callback asked to stop.
    Stopped,
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Releases the scan lock taken by [`ScanDispatcher::submit`] if the engine
/// or the wallet unwinds before the result is installed.
struct ScanLockGuard<'a> {
    session: &'a Mutex<Session>,
    epoch: u64,
    armed: bool,
}

impl ScanLockGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ScanLockGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut current = self.session.lock();
        if current.epoch() == self.epoch {
            current.unlock_scan();
        }
        warn!(epoch = self.epoch, "scan aborted, scan lock released");
    }
}

/// Single writer for one device's handoff session.
///
/// `Sync`: [`submit`](Self::submit) may be called from the capture thread
/// while the UI thread reads snapshots or cancels.
pub struct ScanDispatcher {
    engine: ProtocolEngine,
    wallet: Arc<dyn Wallet>,
    session: Mutex<Session>,
    snapshots: watch::Sender<SessionSnapshot>,
    last_frame: Mutex<Option<String>>,
}

impl std::fmt::Debug for ScanDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanDispatcher")
            .field("engine", &self.engine)
            .field("session", &*self.session.lock())
            .finish_non_exhaustive()
    }
}

impl ScanDispatcher {
    /// Dispatcher with an idle session.
    pub fn new(engine: ProtocolEngine, wallet: Arc<dyn Wallet>) -> Self {
        let session = Session::reset();
        let (snapshots, _) = watch::channel(session.snapshot());
        Self {
            engine,
            wallet,
            session: Mutex::new(session),
            snapshots,
            last_frame: Mutex::new(None),
        }
    }

    /// The engine this dispatcher drives.
    pub fn engine(&self) -> &ProtocolEngine {
        &self.engine
    }

    /// The wallet balance actions are applied to.
    pub fn wallet(&self) -> &Arc<dyn Wallet> {
        &self.wallet
    }

    /// Current session state.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().snapshot()
    }

    /// Receives a snapshot after every accepted transition, begin and reset.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    /// First characters of the last frame seen, for a debug overlay.
    pub fn last_frame_preview(&self) -> Option<String> {
        self.last_frame.lock().clone()
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Starts a session for `role`, replacing whatever was there.
    ///
    /// # Errors
    ///
    /// See [`Session::begin`].
    pub fn begin(
        &self,
        role: Role,
        amount: Option<Money>,
    ) -> Result<SessionSnapshot, SessionError> {
        let session = Session::begin(role, self.engine.identity(), amount)?;
        Ok(self.install(session))
    }

    /// Starts sending `amount`.
    ///
    /// # Errors
    ///
    /// [`SessionError::InvalidAmount`] for zero or above [`Money::MAX`].
    pub fn begin_sender(&self, amount: Money) -> Result<SessionSnapshot, SessionError> {
        self.begin(Role::Sender, Some(amount))
    }

    /// Starts receiving; the REQUEST is on screen immediately.
    pub fn begin_receiver(&self) -> SessionSnapshot {
        self.install(Session::begin_receiver(self.engine.identity()))
    }

    /// Cancels or finishes: back to role selection. Any scan still in flight
    /// becomes [`ScanOutcome::Stale`]. No balance is compensated.
    pub fn reset(&self) -> SessionSnapshot {
        self.install(Session::reset())
    }

    fn install(&self, session: Session) -> SessionSnapshot {
        let snapshot = session.snapshot();
        let mut current = self.session.lock();

        if current.role().is_some() && !current.is_terminal() {
            if current.role() == Some(Role::Sender) && current.step() == Step::Commit {
                warn!(
                    tx_id = current.tx_id().map(|t| t.as_str()).unwrap_or("-"),
                    amount = %current.amount(),
                    "abandoning handoff after debit; funds are not returned"
                );
            } else {
                info!(
                    role = ?current.role(),
                    step = %current.step(),
                    "abandoning handoff in progress"
                );
            }
        }

        *current = session;
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    // -----------------------------------------------------------------------
    // Scanning
    // -----------------------------------------------------------------------

    /// Processes one captured frame.
    pub fn submit(&self, text: &str) -> ScanOutcome {
        self.remember_frame(text);

        let base = {
            let mut current = self.session.lock();
            if !current.try_lock_scan() {
                debug!("frame dropped, previous scan still in flight");
                return ScanOutcome::Busy;
            }
            current.clone()
        };

        // Declared before `current` so that on unwind the mutex guard is
        // released first.
        let mut lock_guard = ScanLockGuard {
            session: &self.session,
            epoch: base.epoch(),
            armed: true,
        };

        let transition = self.engine.apply_text(&base, text, self.wallet.as_ref());

        let mut current = self.session.lock();
        if current.epoch() != base.epoch() {
            lock_guard.disarm();
            debug!(
                epoch = base.epoch(),
                "session replaced during scan, discarding result"
            );
            return ScanOutcome::Stale;
        }

        match transition {
            Transition::Rejected(reason) => {
                current.unlock_scan();
                lock_guard.disarm();
                ScanOutcome::Rejected(reason)
            }
            Transition::Accepted {
                mut session,
                action,
                ..
            } => {
                let wallet_error = action.and_then(|a| self.apply_action(a, &session).err());
                session.unlock_scan();

                let outcome = ScanOutcome::Accepted {
                    step: session.step(),
                    outgoing: session.outgoing().map(str::to_string),
                    action,
                    wallet_error,
                };
                *current = session;
                lock_guard.disarm();
                self.snapshots.send_replace(current.snapshot());
                outcome
            }
        }
    }

    /// Drains `frames` until the stream ends, `shutdown` flips to `true`, or
    /// `on_outcome` breaks.
    pub async fn run<S, F>(
        &self,
        frames: S,
        mut shutdown: watch::Receiver<bool>,
        mut on_outcome: F,
    ) -> RunExit
    where
        S: Stream<Item = String>,
        F: FnMut(&ScanOutcome) -> ControlFlow<()>,
    {
        futures::pin_mut!(frames);
        info!(identity = %self.engine.identity(), "scan dispatcher starting");

        loop {
            if *shutdown.borrow() {
                info!("scan dispatcher received shutdown signal");
                return RunExit::Shutdown;
            }

            tokio::select! {
                frame = frames.next() => {
                    let Some(frame) = frame else {
                        debug!("capture stream ended");
                        return RunExit::CaptureEnded;
                    };
                    let outcome = self.submit(&frame);
                    if on_outcome(&outcome).is_break() {
                        return RunExit::Stopped;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        info!("shutdown sender dropped, stopping scan dispatcher");
                        return RunExit::Shutdown;
                    }
                }
            }
        }
    }

    fn apply_action(
        &self,
        action: BalanceAction,
        session: &Session,
    ) -> Result<Money, WalletError> {
        let tx_id = session.tx_id().map(|t| t.as_str()).unwrap_or("-");
        let result = action.apply(self.wallet.as_ref());
        match &result {
            Ok(balance) => info!(tx_id, %action, %balance, "wallet updated"),
            // Fire-and-forget: the handoff has already moved on.
            Err(e) => error!(tx_id, %action, error = %e, "wallet mutation failed"),
        }
        result
    }

    fn remember_frame(&self, text: &str) {
        let preview: String = text.chars().take(SCAN_PREVIEW_LEN).collect();
        *self.last_frame.lock() = Some(preview);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
