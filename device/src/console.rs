//! Stdin handling: every line is either a scanned frame or a user command.

use futures::Stream;
use offpay_protocol::ScanDispatcher;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Frames buffered between the console reader and the dispatcher loop.
pub const FRAME_BUFFER: usize = 16;

/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Text the camera would have decoded.
    Frame(String),
    /// `:cancel`, back to role selection.
    Cancel,
    /// `:status`, dump the session.
    Status,
    /// Blank line.
    Empty,
}

impl Input {
    /// Classifies a line. Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "" => Input::Empty,
            ":cancel" => Input::Cancel,
            ":status" => Input::Status,
            frame => Input::Frame(frame.to_string()),
        }
    }
}

/// Reads `input` line by line, forwarding frames and acting on commands.
///
/// Returns when input ends, on `:cancel` (after resetting the session and
/// raising `shutdown`), or when the frame receiver is gone.
pub async fn read_console<R>(
    input: R,
    dispatcher: Arc<ScanDispatcher>,
    frames: mpsc::Sender<String>,
    shutdown: watch::Sender<bool>,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Empty => {}
            Input::Status => print_status(&dispatcher),
            Input::Cancel => {
                dispatcher.reset();
                info!("handoff cancelled by user");
                let _ = shutdown.send(true);
                return Ok(());
            }
            Input::Frame(frame) => {
                if frames.send(frame).await.is_err() {
                    debug!("dispatcher loop gone, console reader stopping");
                    return Ok(());
                }
            }
        }
    }
    debug!("console input closed");
    Ok(())
}

/// Adapts the frame channel into the stream the dispatcher consumes.
pub fn frame_stream(frames: mpsc::Receiver<String>) -> impl Stream<Item = String> {
    futures::stream::unfold(frames, |mut rx| async move {
        rx.recv().await.map(|frame| (frame, rx))
    })
}

fn print_status(dispatcher: &ScanDispatcher) {
    let snapshot = dispatcher.snapshot();
    match serde_json::to_string(&snapshot) {
        Ok(json) => eprintln!("{json}"),
        Err(e) => eprintln!("status unavailable: {e}"),
    }
    if let Some(last) = dispatcher.last_frame_preview() {
        eprintln!("Last: {last}");
    }
}
