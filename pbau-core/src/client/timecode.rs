//! Per-sequence timecode polling over a dedicated socket.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::PbauError;
use crate::events::EventHandler;
use crate::message::TransportState;
use crate::network::{ConnectionInfo, PbauConnection};
use crate::protocol::{Reply, Request};
use crate::task::Task;

/// Poll period while the sequence is playing.
pub const PLAYING_INTERVAL: Duration = Duration::from_millis(33);
/// Poll period for every other transport state.
pub const IDLE_INTERVAL: Duration = Duration::from_millis(200);

/// Delay between two poll cycles for the given transport state.
pub fn poll_interval(state: TransportState) -> Duration {
    match state {
        TransportState::Play => PLAYING_INTERVAL,
        _ => IDLE_INTERVAL,
    }
}

/// Handle to one sequence's timecode loop.
///
/// The loop connects in the background; [`spawn`](Self::spawn) returns at
/// once. Dropping the handle stops the loop and closes the socket.
#[derive(Debug)]
pub struct TimecodeConnection {
    sequence: i32,
    state: watch::Sender<TransportState>,
    task: Task,
}

impl TimecodeConnection {
    pub fn spawn(
        info: ConnectionInfo,
        sequence: i32,
        handler: Arc<dyn EventHandler>,
        track_next_cue: bool,
    ) -> Self {
        let (state, state_rx) = watch::channel(TransportState::Unknown);
        let task = Task::spawn(move |cancel| async move {
            let poller = Poller {
                sequence,
                handler,
                track_next_cue,
                state: state_rx,
            };
            poller.run(info, cancel).await;
        });
        Self {
            sequence,
            state,
            task,
        }
    }

    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    /// Last state pushed by the control connection.
    pub fn state(&self) -> TransportState {
        *self.state.borrow()
    }

    /// Feed the latest transport state; the next wait uses it.
    pub fn update_state(&self, state: TransportState) {
        self.state.send_replace(state);
    }

    /// `false` once the loop stopped (disconnect or socket failure).
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop polling and close the socket.
    pub async fn disconnect(self) {
        self.task.shutdown().await;
    }
}

// ── Poll loop ────────────────────────────────────────────────────

struct Poller {
    sequence: i32,
    handler: Arc<dyn EventHandler>,
    track_next_cue: bool,
    state: watch::Receiver<TransportState>,
}

impl Poller {
    async fn run(self, info: ConnectionInfo, cancel: CancellationToken) {
        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            r = PbauConnection::connect(&info) => r,
        };
        let mut conn = match connected {
            Ok(conn) => conn,
            Err(e) => {
                warn!(sequence = self.sequence, "timecode connect to {info} failed: {e}");
                self.handler.on_transport_error(&e);
                return;
            }
        };
        debug!(sequence = self.sequence, "timecode connection up");

        if let Err(e) = self.poll(&mut conn, &cancel).await {
            warn!(sequence = self.sequence, "timecode connection lost: {e}");
            self.handler.on_transport_error(&e);
        }
        debug!(sequence = self.sequence, "timecode loop stopped");
    }

    /// Returns `Ok` only when cancelled.
    async fn poll(
        &self,
        conn: &mut PbauConnection,
        cancel: &CancellationToken,
    ) -> Result<(), PbauError> {
        let sequence = self.sequence;
        loop {
            let request = Request::GetSequenceTime { sequence };
            match exchange(conn, &request, cancel).await? {
                None => return Ok(()),
                Some(Reply::SequenceTime(time)) => self.handler.on_sequence_time(sequence, time),
                Some(other) => self.unexpected(&request, other),
            }

            if self.track_next_cue {
                let request = Request::GetRemainingTime { sequence };
                match exchange(conn, &request, cancel).await? {
                    None => return Ok(()),
                    Some(Reply::RemainingTime(time)) => {
                        self.handler.on_next_cue_time(sequence, time)
                    }
                    Some(other) => self.unexpected(&request, other),
                }
            }

            let wait = poll_interval(*self.state.borrow());
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    fn unexpected(&self, request: &Request, reply: Reply) {
        let message = match reply {
            Reply::Error => format!(
                "server rejected {} for sequence {}",
                request.command(),
                self.sequence
            ),
            other => format!(
                "unexpected reply {other:?} to {} for sequence {}",
                request.command(),
                self.sequence
            ),
        };
        debug!("{message}");
        self.handler.on_debug(&message);
    }
}

/// Send one request and wait for the next parsable reply.
///
/// `Ok(None)` means the token fired first.
async fn exchange(
    conn: &mut PbauConnection,
    request: &Request,
    cancel: &CancellationToken,
) -> Result<Option<Reply>, PbauError> {
    conn.send(request.to_frame(conn.domain())?).await?;
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            item = conn.recv() => item,
        };
        let frame = match item {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Err(e),
            None => return Err(PbauError::ConnectionClosed),
        };
        match Reply::parse(&frame) {
            Ok(reply) => return Ok(Some(reply)),
            Err(e) => debug!("ignoring unparsable reply: {e}"),
        }
    }
}
