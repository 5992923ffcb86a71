//! The control connection: commands, status polling, discovery, and the
//! timecode connections of the watched sequences.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::timecode::TimecodeConnection;
use crate::error::PbauError;
use crate::events::EventHandler;
use crate::message::{SmpteMode, TransportState};
use crate::network::{ConnectionGuard, ConnectionInfo, ConnectionSender, Inbound, PbauConnection};
use crate::packet::Frame;
use crate::protocol::{Reply, Request};
use crate::state::{ConnectionPhase, ControlState, Effect};
use crate::task::Task;

/// Period of the status-poll scheduler.
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Shortest status-poll period accepted; shorter ones are raised to it.
pub const MIN_STATUS_INTERVAL: Duration = Duration::from_millis(10);

const CONTROL_CAPACITY: usize = 32;
const CLOSE_GRACE: Duration = Duration::from_millis(250);

/// Tunables of a control connection.
#[derive(Debug, Clone)]
pub struct ControlOptions {
    /// Also poll the remaining time until the next cue on every timecode
    /// connection.
    pub track_next_cue: bool,
    /// Raised to [`MIN_STATUS_INTERVAL`] if shorter.
    pub status_interval: Duration,
}

impl Default for ControlOptions {
    fn default() -> Self {
        Self {
            track_next_cue: true,
            status_interval: STATUS_POLL_INTERVAL,
        }
    }
}

#[derive(Debug)]
enum ControlMsg {
    SetPoll(Vec<i32>),
    Refresh,
}

#[derive(Debug)]
struct Session {
    outbound: ConnectionSender,
    control: mpsc::Sender<ControlMsg>,
    task: Task,
}

impl Session {
    fn is_alive(&self) -> bool {
        !self.task.is_cancelled() && !self.task.is_finished()
    }
}

/// One connection to the automation server for commands and polling.
///
/// Commands issued while not connected are dropped. The watch set survives
/// disconnects and is applied again on the next [`connect`](Self::connect).
pub struct ControlConnection {
    info: ConnectionInfo,
    handler: Arc<dyn EventHandler>,
    options: ControlOptions,
    phase: ConnectionPhase,
    watched: Vec<i32>,
    session: Option<Session>,
}

impl std::fmt::Debug for ControlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlConnection")
            .field("info", &self.info)
            .field("phase", &self.phase)
            .field("watched", &self.watched)
            .finish_non_exhaustive()
    }
}

impl ControlConnection {
    pub fn new(info: ConnectionInfo, handler: Arc<dyn EventHandler>) -> Self {
        Self::with_options(info, handler, ControlOptions::default())
    }

    pub fn with_options(
        info: ConnectionInfo,
        handler: Arc<dyn EventHandler>,
        mut options: ControlOptions,
    ) -> Self {
        options.status_interval = options.status_interval.max(MIN_STATUS_INTERVAL);
        Self {
            info,
            handler,
            options,
            phase: ConnectionPhase::Disconnected,
            watched: Vec::new(),
            session: None,
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    pub fn options(&self) -> &ControlOptions {
        &self.options
    }

    pub fn watched(&self) -> &[i32] {
        &self.watched
    }

    /// Current phase. A session whose task ended on its own reads as
    /// `Disconnected`.
    pub fn phase(&self) -> ConnectionPhase {
        if self.phase.is_connected() && self.live().is_none() {
            ConnectionPhase::Disconnected
        } else {
            self.phase.clone()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.phase().is_connected()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Open the socket and start polling. A no-op while already connected.
    ///
    /// A failure is reported through `on_transport_error` and returned.
    pub async fn connect(&mut self) -> Result<(), PbauError> {
        self.reap();
        if self.phase.is_active() {
            debug!("connect ignored: already {}", self.phase);
            return Ok(());
        }
        self.phase.begin_connect()?;
        info!("connecting to {}", self.info);

        let conn = match PbauConnection::connect(&self.info).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("connect to {} failed: {e}", self.info);
                self.handler.on_transport_error(&e);
                self.phase.finish_disconnect()?;
                return Err(e);
            }
        };

        let (outbound, inbound, guard) = conn.into_parts();
        let (control_tx, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let cancel = CancellationToken::new();

        let mut actor = ControlActor {
            info: self.info.clone(),
            cancel: cancel.clone(),
            handler: self.handler.clone(),
            track_next_cue: self.options.track_next_cue,
            outbound: outbound.clone(),
            state: ControlState::new(),
            timecodes: HashMap::new(),
        };
        actor.set_poll(self.watched.clone());
        let interval = self.options.status_interval;
        let task = Task::spawn_with(
            cancel.clone(),
            actor.run(interval, inbound, control_rx, guard),
        );

        self.session = Some(Session {
            outbound,
            control: control_tx,
            task,
        });
        self.phase.complete_connect()?;
        info!("connected to {}", self.info);
        Ok(())
    }

    /// Stop polling, close every timecode connection and the socket.
    pub async fn disconnect(&mut self) {
        let Some(Session {
            outbound,
            control,
            task,
        }) = self.session.take()
        else {
            self.phase.force_disconnect();
            return;
        };
        if self.phase.begin_disconnect().is_err() {
            self.phase.force_disconnect();
        }
        // Lets the writer drain what was already queued.
        drop(outbound);
        drop(control);
        task.shutdown().await;
        self.phase.force_disconnect();
        info!("disconnected from {}", self.info);
    }

    /// Replace the set of sequences to poll. Remembered while disconnected.
    pub async fn set_poll_sequences(&mut self, ids: impl IntoIterator<Item = i32>) {
        self.watched = ids.into_iter().collect();
        if let Some(session) = self.live() {
            let _ = session
                .control
                .send(ControlMsg::SetPoll(self.watched.clone()))
                .await;
        }
    }

    /// Start a fresh discovery run; the result arrives through
    /// `on_sequences_updated`.
    pub async fn refresh_sequences(&self) {
        match self.live() {
            Some(session) => {
                let _ = session.control.send(ControlMsg::Refresh).await;
            }
            None => debug!("refresh_sequences dropped: not connected"),
        }
    }

    // ── Commands ─────────────────────────────────────────────────

    pub async fn set_transport(&self, sequence: i32, state: TransportState) -> Result<(), PbauError> {
        self.send(Request::SetTransport { sequence, state }).await
    }

    pub async fn select_sequence(&self, sequence: i32) -> Result<(), PbauError> {
        self.send(Request::SelectSequence { sequence }).await
    }

    pub async fn goto_cue(&self, sequence: i32, cue: i32) -> Result<(), PbauError> {
        self.send(Request::GotoCue { sequence, cue }).await
    }

    /// `next = false` jumps to the previous cue.
    pub async fn next_or_last_cue(&self, sequence: i32, next: bool) -> Result<(), PbauError> {
        self.send(Request::NextOrLastCue { sequence, next }).await
    }

    pub async fn ignore_next_cue(&self, sequence: i32, ignore: bool) -> Result<(), PbauError> {
        self.send(Request::IgnoreNextCue { sequence, ignore }).await
    }

    pub async fn apply_view(&self, view: i32) -> Result<(), PbauError> {
        self.send(Request::ApplyView { view }).await
    }

    pub async fn save_project(&self) -> Result<(), PbauError> {
        self.send(Request::SaveProject).await
    }

    pub async fn toggle_fullscreen(&self, site: i32) -> Result<(), PbauError> {
        self.send(Request::ToggleFullscreen { site }).await
    }

    pub async fn set_site_ip(&self, site: i32, ip: impl Into<String>) -> Result<(), PbauError> {
        self.send(Request::SetSiteIp {
            site,
            ip: ip.into(),
        })
        .await
    }

    pub async fn clear_all_active(&self) -> Result<(), PbauError> {
        self.send(Request::ClearAllActive).await
    }

    pub async fn store_active(&self, sequence: i32) -> Result<(), PbauError> {
        self.send(Request::StoreActive { sequence }).await
    }

    pub async fn store_active_to_beginning(&self, sequence: i32) -> Result<(), PbauError> {
        self.send(Request::StoreActiveToBeginning { sequence }).await
    }

    pub async fn reset_all(&self) -> Result<(), PbauError> {
        self.send(Request::ResetAll).await
    }

    pub async fn set_sequence_smpte_mode(
        &self,
        sequence: i32,
        mode: SmpteMode,
        stopped: bool,
    ) -> Result<(), PbauError> {
        self.send(Request::SetSequenceSmpteMode {
            sequence,
            mode,
            stopped,
        })
        .await
    }

    /// Encode and queue a command. Dropped (not an error) when offline.
    ///
    /// Queries are refused: their replies are correlated by the pollers,
    /// and an extra one in flight would be attributed to the wrong entity.
    pub async fn send(&self, request: Request) -> Result<(), PbauError> {
        if request.command().expects_response() {
            return Err(PbauError::ProtocolViolation(
                "queries are issued by the connection itself",
            ));
        }
        let frame = request.to_frame(self.info.domain())?;
        let Some(session) = self.live() else {
            debug!("{} dropped: not connected", request.command());
            return Ok(());
        };
        if session.outbound.send(frame).await.is_err() {
            debug!("{} dropped: connection closing", request.command());
        }
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    fn live(&self) -> Option<&Session> {
        self.session.as_ref().filter(|s| s.is_alive())
    }

    /// Forget a session whose task ended on its own (socket failure, panic).
    fn reap(&mut self) {
        if self.session.as_ref().is_some_and(|s| !s.is_alive()) {
            self.session = None;
            self.phase.force_disconnect();
        }
    }
}

// ── Actor ────────────────────────────────────────────────────────

struct ControlActor {
    info: ConnectionInfo,
    cancel: CancellationToken,
    handler: Arc<dyn EventHandler>,
    track_next_cue: bool,
    outbound: ConnectionSender,
    state: ControlState,
    timecodes: HashMap<i32, TimecodeConnection>,
}

impl ControlActor {
    async fn run(
        mut self,
        interval: Duration,
        mut inbound: mpsc::Receiver<Inbound>,
        mut control: mpsc::Receiver<ControlMsg>,
        guard: ConnectionGuard,
    ) {
        let cancel = self.cancel.clone();
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    let effects = self.state.on_tick();
                    self.apply(effects).await;
                }
                item = inbound.recv() => match item {
                    Some(Ok(frame)) => self.on_frame(frame).await,
                    Some(Err(e)) => {
                        warn!("control connection to {} lost: {e}", self.info);
                        self.handler.on_transport_error(&e);
                        break;
                    }
                    None => {
                        self.handler.on_transport_error(&PbauError::ConnectionClosed);
                        break;
                    }
                },
                msg = control.recv() => match msg {
                    Some(ControlMsg::SetPoll(ids)) => self.set_poll(ids),
                    Some(ControlMsg::Refresh) => {
                        let effects = self.state.refresh();
                        self.apply(effects).await;
                    }
                    None => break,
                },
            }
        }

        // Marks the session dead for the owning handle.
        cancel.cancel();
        let ControlActor {
            info,
            outbound,
            timecodes,
            ..
        } = self;
        for (_, tc) in timecodes {
            tc.disconnect().await;
        }
        drop(outbound);
        guard.close(CLOSE_GRACE).await;
        debug!("control loop for {info} stopped");
    }

    async fn on_frame(&mut self, frame: Frame) {
        match Reply::parse(&frame) {
            Ok(reply) => {
                let effects = self.state.on_reply(reply);
                self.apply(effects).await;
            }
            Err(e) => debug!("ignoring unparsable frame {frame:?}: {e}"),
        }
    }

    /// Reconcile timecode connections with the new watch set.
    fn set_poll(&mut self, ids: Vec<i32>) {
        let delta = self.state.set_watched(ids);
        for id in delta.removed {
            // Dropping the handle cancels its loop and closes the socket.
            if self.timecodes.remove(&id).is_some() {
                debug!(sequence = id, "timecode connection retired");
            }
        }
        for id in delta.added {
            let tc = TimecodeConnection::spawn(
                self.info.clone(),
                id,
                self.handler.clone(),
                self.track_next_cue,
            );
            self.timecodes.insert(id, tc);
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(request) => match request.to_frame(self.info.domain()) {
                    Ok(frame) => tokio::select! {
                        _ = self.cancel.cancelled() => {
                            debug!("{} dropped: shutting down", request.command());
                        }
                        sent = self.outbound.send(frame) => {
                            if sent.is_err() {
                                debug!("{} dropped: writer gone", request.command());
                            }
                        }
                    },
                    Err(e) => debug!("cannot encode {}: {e}", request.command()),
                },
                Effect::SequenceState { sequence, state } => {
                    self.handler.on_sequence_state(sequence, state);
                    if let Some(tc) = self.timecodes.get(&sequence) {
                        tc.update_state(state);
                    }
                }
                Effect::GlobalState(state) => self.handler.on_transport_state(state),
                Effect::SequencesUpdated(list) => {
                    info!("discovered {} sequences", list.len());
                    self.handler.on_sequences_updated(&list);
                }
                Effect::Evicted(id) => {
                    if self.timecodes.remove(&id).is_some() {
                        debug!(sequence = id, "timecode connection retired");
                    }
                }
                Effect::Debug(message) => {
                    debug!("{message}");
                    self.handler.on_debug(&message);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopHandler;

    fn offline() -> ControlConnection {
        ControlConnection::new(ConnectionInfo::new("127.0.0.1", 1, 0), Arc::new(NoopHandler))
    }

    #[tokio::test]
    async fn commands_offline_are_dropped() {
        let conn = offline();
        conn.save_project().await.unwrap();
        conn.goto_cue(1, 2).await.unwrap();
        conn.refresh_sequences().await;
        assert!(!conn.is_connected());
    }

    #[tokio::test]
    async fn unencodable_command_fails_even_offline() {
        let conn = offline();
        assert!(conn.set_transport(1, TransportState::Unknown).await.is_err());
    }

    #[tokio::test]
    async fn queries_cannot_be_sent_directly() {
        let conn = offline();
        let err = conn.send(Request::GetSequenceIds).await.unwrap_err();
        assert!(matches!(err, PbauError::ProtocolViolation(_)));
        conn.send(Request::ResetAll).await.unwrap();
    }

    #[tokio::test]
    async fn watch_set_remembered_while_offline() {
        let mut conn = offline();
        conn.set_poll_sequences([4, 2]).await;
        assert_eq!(conn.watched(), &[4, 2]);
        assert!(conn.phase().is_disconnected());
    }

    #[test]
    fn zero_status_interval_is_raised() {
        let options = ControlOptions {
            status_interval: Duration::ZERO,
            ..ControlOptions::default()
        };
        let conn = ControlConnection::with_options(
            ConnectionInfo::new("127.0.0.1", 1, 0),
            Arc::new(NoopHandler),
            options,
        );
        assert_eq!(conn.options().status_interval, MIN_STATUS_INTERVAL);
    }

    #[tokio::test]
    async fn session_whose_task_ended_reads_disconnected() {
        let mut conn = offline();
        let (outbound, _frames) = mpsc::channel(1);
        let (control, _msgs) = mpsc::channel(1);
        let task = Task::spawn(|_cancel| async {});
        conn.phase.begin_connect().unwrap();
        conn.phase.complete_connect().unwrap();
        conn.session = Some(Session {
            outbound,
            control,
            task,
        });

        tokio::time::timeout(Duration::from_secs(1), async {
            while conn.session.as_ref().is_some_and(|s| !s.task.is_finished()) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        // The token was never cancelled; the task just returned.
        assert!(!conn.is_connected());
        assert!(conn.phase().is_disconnected());
        conn.save_project().await.unwrap();
        conn.reap();
        assert!(conn.session.is_none());
    }

    #[tokio::test]
    async fn blocked_send_gives_way_to_cancel() {
        let (outbound, _frames) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut actor = ControlActor {
            info: ConnectionInfo::new("127.0.0.1", 1, 0),
            cancel: cancel.clone(),
            handler: Arc::new(NoopHandler),
            track_next_cue: false,
            outbound,
            state: ControlState::new(),
            timecodes: HashMap::new(),
        };
        let send = || Effect::Send(Request::SaveProject);

        // Fills the writer queue; nobody drains it.
        actor.apply(vec![send()]).await;
        let blocked = tokio::spawn(async move { actor.apply(vec![send()]).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!blocked.is_finished());

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn failed_connect_stays_disconnected() {
        let mut conn = offline();
        assert!(conn.connect().await.is_err());
        assert!(conn.phase().is_disconnected());
        conn.disconnect().await;
    }
}
