//! Bridge service core logic.
//!
//! Owns one control connection and either monitors it until stopped or
//! runs a single discovery/command round trip.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pbau_core::{
    ControlConnection, Event, EventHandler, PbauError, SequenceInfo, Timecode, TransportState,
};

use crate::config::BridgeConfig;

/// How long one-shot discovery waits for the server.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

// ── LoggingHandler ───────────────────────────────────────────────

/// Logs every callback and optionally forwards it as an [`Event`].
#[derive(Debug, Default)]
pub struct LoggingHandler {
    forward: Option<mpsc::UnboundedSender<Event>>,
}

impl LoggingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { forward: Some(tx) }
    }

    fn forward(&self) -> Option<&mpsc::UnboundedSender<Event>> {
        self.forward.as_ref()
    }
}

impl EventHandler for LoggingHandler {
    fn on_sequence_time(&self, sequence: i32, time: Timecode) {
        debug!(sequence, "time {time}");
        if let Some(tx) = self.forward() {
            tx.on_sequence_time(sequence, time);
        }
    }

    fn on_next_cue_time(&self, sequence: i32, time: Timecode) {
        debug!(sequence, "next cue in {time}");
        if let Some(tx) = self.forward() {
            tx.on_next_cue_time(sequence, time);
        }
    }

    fn on_transport_state(&self, state: TransportState) {
        info!("global transport: {state}");
        if let Some(tx) = self.forward() {
            tx.on_transport_state(state);
        }
    }

    fn on_sequence_state(&self, sequence: i32, state: TransportState) {
        info!(sequence, "transport: {state}");
        if let Some(tx) = self.forward() {
            tx.on_sequence_state(sequence, state);
        }
    }

    fn on_sequences_updated(&self, sequences: &[SequenceInfo]) {
        for s in sequences {
            info!(sequence = s.id, "found '{}'", s.name);
        }
        if let Some(tx) = self.forward() {
            tx.on_sequences_updated(sequences);
        }
    }

    fn on_transport_error(&self, error: &PbauError) {
        warn!("transport error: {error}");
        if let Some(tx) = self.forward() {
            tx.on_transport_error(error);
        }
    }

    fn on_debug(&self, message: &str) {
        debug!("{message}");
        if let Some(tx) = self.forward() {
            tx.on_debug(message);
        }
    }
}

// ── BridgeCommand ────────────────────────────────────────────────

/// A single command sent by the one-shot subcommands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeCommand {
    Transport { sequence: i32, state: TransportState },
    Cue { sequence: i32, cue: i32 },
    SaveProject,
}

// ── BridgeService ────────────────────────────────────────────────

pub struct BridgeService {
    config: BridgeConfig,
    running: Arc<AtomicBool>,
}

impl BridgeService {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task (e.g. the Ctrl-C handler).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    fn control(&self, handler: LoggingHandler) -> ControlConnection {
        ControlConnection::with_options(
            self.config.connection_info(),
            Arc::new(handler),
            self.config.control_options(),
        )
    }

    /// Monitor the configured sequences until stopped or the control
    /// connection drops.
    pub async fn run(&self) -> Result<(), PbauError> {
        self.running.store(true, Ordering::SeqCst);

        let mut control = self.control(LoggingHandler::new());
        control
            .set_poll_sequences(self.config.polling.sequences.iter().copied())
            .await;
        if let Err(e) = control.connect().await {
            self.running.store(false, Ordering::SeqCst);
            return Err(e);
        }
        control.refresh_sequences().await;
        info!(
            "watching {} sequence(s) on {}",
            self.config.polling.sequences.len(),
            control.info()
        );

        while self.running.load(Ordering::SeqCst) {
            if !control.is_connected() {
                warn!("control connection lost");
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        control.disconnect().await;
        self.running.store(false, Ordering::SeqCst);
        info!("bridge stopped");
        Ok(())
    }

    /// Run one discovery and return its result.
    pub async fn discover(&self, timeout: Duration) -> Result<Vec<SequenceInfo>, PbauError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut control = self.control(LoggingHandler::forwarding(tx));
        control.connect().await?;
        control.refresh_sequences().await;

        let waited = tokio::time::timeout(timeout, async {
            while let Some(event) = rx.recv().await {
                match event {
                    Event::SequencesUpdated { sequences } => return Ok(sequences),
                    Event::TransportError { message } => return Err(PbauError::Other(message)),
                    _ => {}
                }
            }
            Err(PbauError::ConnectionClosed)
        })
        .await;

        control.disconnect().await;
        match waited {
            Ok(result) => result,
            Err(_) => Err(PbauError::Other(format!(
                "no discovery result within {timeout:?}"
            ))),
        }
    }

    /// Connect, send one command, and close once it is flushed.
    pub async fn send_command(&self, command: BridgeCommand) -> Result<(), PbauError> {
        let mut control = self.control(LoggingHandler::new());
        control.connect().await?;

        let sent = match command {
            BridgeCommand::Transport { sequence, state } => {
                control.set_transport(sequence, state).await
            }
            BridgeCommand::Cue { sequence, cue } => control.goto_cue(sequence, cue).await,
            BridgeCommand::SaveProject => control.save_project().await,
        };
        control.disconnect().await;
        sent?;
        info!("sent {command:?}");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_creates_with_defaults() {
        let svc = BridgeService::new(BridgeConfig::default());
        assert!(!svc.is_running());
        assert_eq!(svc.config().network.port, 6211);
    }

    #[test]
    fn stop_handle_works() {
        let svc = BridgeService::new(BridgeConfig::default());
        let handle = svc.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(svc.is_running());
        svc.stop();
        assert!(!svc.is_running());
    }

    #[test]
    fn logging_handler_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handler = LoggingHandler::forwarding(tx);
        handler.on_sequence_state(2, TransportState::Stop);
        assert_eq!(
            rx.try_recv().unwrap(),
            Event::SequenceState {
                sequence: 2,
                state: TransportState::Stop
            }
        );
    }

    #[tokio::test]
    async fn run_fails_without_server() {
        let mut config = BridgeConfig::default();
        config.network.port = 1;
        let svc = BridgeService::new(config);
        assert!(svc.run().await.is_err());
        assert!(!svc.is_running());
    }
}
