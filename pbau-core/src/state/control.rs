//! Control-connection state: status polling and discovery correlation.
//!
//! Replies carry no entity ID, so each pipeline keeps at most one request
//! outstanding and remembers which sequence it asked about. Replies come
//! back in send order, so the queries in flight are also kept in a FIFO;
//! an error reply belongs to its head. The state machine is synchronous;
//! the connection task feeds it ticks and replies and carries out the
//! returned [`Effect`]s.

use std::collections::{HashMap, VecDeque};

use crate::message::{SequenceInfo, TransportState};
use crate::protocol::{Reply, Request};
use crate::state::discovery::{Discovery, DiscoveryStep};

/// Work for the connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Send(Request),
    SequenceState { sequence: i32, state: TransportState },
    GlobalState(TransportState),
    SequencesUpdated(Vec<SequenceInfo>),
    /// The server rejected this sequence; stop watching it.
    Evicted(i32),
    Debug(String),
}

/// Result of replacing the watch set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WatchDelta {
    pub added: Vec<i32>,
    pub removed: Vec<i32>,
}

/// A query awaiting its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InFlight {
    Status(i32),
    Name(i32),
    Ids,
}

impl InFlight {
    fn answered_by(&self, reply: &Reply) -> bool {
        matches!(
            (self, reply),
            (Self::Status(_), Reply::TransportMode(_))
                | (Self::Name(_), Reply::SequenceName(_))
                | (Self::Ids, Reply::SequenceIds(_))
        )
    }
}

#[derive(Debug, Default)]
pub struct ControlState {
    watched: Vec<i32>,
    states: HashMap<i32, TransportState>,
    status_queue: VecDeque<i32>,
    status_cursor: Option<i32>,
    discovery: Discovery,
    in_flight: VecDeque<InFlight>,
}

impl ControlState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watched(&self) -> &[i32] {
        &self.watched
    }

    pub fn state_of(&self, sequence: i32) -> TransportState {
        self.states.get(&sequence).copied().unwrap_or_default()
    }

    pub fn status_cursor(&self) -> Option<i32> {
        self.status_cursor
    }

    pub fn name_cursor(&self) -> Option<i32> {
        self.discovery.cursor()
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Queries sent and not yet answered, oldest first.
    pub fn in_flight(&self) -> impl Iterator<Item = &InFlight> {
        self.in_flight.iter()
    }

    /// Aggregate over the watched sequences.
    pub fn global_state(&self) -> TransportState {
        TransportState::aggregate(self.watched.iter().map(|id| self.state_of(*id)))
    }

    // ── Inputs ───────────────────────────────────────────────────

    /// Replace the watch set (duplicates collapsed, order kept).
    ///
    /// An outstanding status request for a removed ID stays outstanding;
    /// its reply is consumed and dropped so the queue keeps its alignment.
    pub fn set_watched(&mut self, ids: impl IntoIterator<Item = i32>) -> WatchDelta {
        let mut next: Vec<i32> = Vec::new();
        for id in ids {
            if !next.contains(&id) {
                next.push(id);
            }
        }

        let added = next
            .iter()
            .copied()
            .filter(|id| !self.watched.contains(id))
            .collect();
        let removed: Vec<i32> = self
            .watched
            .iter()
            .copied()
            .filter(|id| !next.contains(id))
            .collect();

        for id in &removed {
            self.states.remove(id);
        }
        self.status_queue.retain(|id| next.contains(id));
        self.watched = next;

        WatchDelta { added, removed }
    }

    /// Status scheduler tick.
    pub fn on_tick(&mut self) -> Vec<Effect> {
        if self.status_queue.is_empty() && !self.watched.is_empty() {
            self.status_queue.extend(self.watched.iter().copied());
        }
        let mut effects = Vec::new();
        if self.status_cursor.is_none() {
            self.send_next_status(&mut effects);
        }
        effects
    }

    /// Start a discovery run, abandoning any run in progress.
    pub fn refresh(&mut self) -> Vec<Effect> {
        self.discovery.restart();
        self.in_flight.push_back(InFlight::Ids);
        vec![Effect::Send(Request::GetSequenceIds)]
    }

    pub fn on_reply(&mut self, reply: Reply) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !matches!(reply, Reply::Ack(_) | Reply::Error) {
            self.settle(&reply);
        }
        match reply {
            Reply::TransportMode(state) => self.on_transport_mode(state, &mut effects),
            Reply::Error => {
                let head = self.in_flight.pop_front();
                self.on_error(head, &mut effects)
            }
            Reply::SequenceIds(ids) => {
                if !self.discovery.awaiting_ids() {
                    effects.push(Effect::Debug("unrequested sequence ID list".into()));
                }
                effects.push(Effect::Debug(format!("discovered {} sequence IDs", ids.len())));
                let step = self.discovery.on_ids(ids);
                self.push_step(step, &mut effects);
            }
            Reply::SequenceName(name) => {
                if self.discovery.cursor().is_none() {
                    effects.push(Effect::Debug(format!("unrequested sequence name '{name}'")));
                } else {
                    let step = self.discovery.on_name(name);
                    self.push_step(step, &mut effects);
                }
            }
            Reply::SequenceTime(_) | Reply::RemainingTime(_) => {
                effects.push(Effect::Debug("timecode reply on control connection".into()));
            }
            Reply::Ack(_) => {}
        }
        effects
    }

    /// Forget in-flight requests; keep the watch set for the next connect.
    pub fn reset(&mut self) {
        self.states.clear();
        self.status_queue.clear();
        self.status_cursor = None;
        self.discovery.abort();
        self.in_flight.clear();
    }

    // ── Internals ────────────────────────────────────────────────

    fn send_next_status(&mut self, effects: &mut Vec<Effect>) {
        if let Some(id) = self.status_queue.pop_front() {
            self.status_cursor = Some(id);
            self.in_flight.push_back(InFlight::Status(id));
            effects.push(Effect::Send(Request::GetTransportMode { sequence: id }));
        }
    }

    fn on_transport_mode(&mut self, state: TransportState, effects: &mut Vec<Effect>) {
        let Some(id) = self.status_cursor.take() else {
            effects.push(Effect::Debug("unrequested transport mode reply".into()));
            return;
        };
        if self.watched.contains(&id) {
            self.states.insert(id, state);
            effects.push(Effect::SequenceState {
                sequence: id,
                state,
            });
            effects.push(Effect::GlobalState(self.global_state()));
        }
        self.send_next_status(effects);
    }

    /// Drop the oldest query this reply answers. Anything queued ahead
    /// of it was never answered.
    fn settle(&mut self, reply: &Reply) {
        if let Some(pos) = self.in_flight.iter().position(|q| q.answered_by(reply)) {
            self.in_flight.drain(..=pos);
        }
    }

    fn push_step(&mut self, step: DiscoveryStep, effects: &mut Vec<Effect>) {
        match step {
            DiscoveryStep::RequestName(id) => {
                self.in_flight.push_back(InFlight::Name(id));
                effects.push(Effect::Send(Request::GetSequenceName { sequence: id }))
            }
            DiscoveryStep::Complete(list) => effects.push(Effect::SequencesUpdated(list)),
            DiscoveryStep::Idle => {}
        }
    }

    /// Error replies carry no cause: they belong to the oldest query in
    /// flight.
    fn on_error(&mut self, head: Option<InFlight>, effects: &mut Vec<Effect>) {
        match head {
            Some(InFlight::Status(id)) if self.status_cursor == Some(id) => {
                self.status_cursor = None;
                effects.push(Effect::Debug(format!(
                    "server rejected status request for sequence {id}, no longer polling it"
                )));
                if self.watched.contains(&id) {
                    self.watched.retain(|w| *w != id);
                    self.states.remove(&id);
                    self.status_queue.retain(|w| *w != id);
                    effects.push(Effect::Evicted(id));
                    effects.push(Effect::GlobalState(self.global_state()));
                }
                self.send_next_status(effects);
            }
            Some(InFlight::Name(id)) if self.discovery.cursor() == Some(id) => {
                effects.push(Effect::Debug(format!(
                    "server rejected name request for sequence {id}"
                )));
                let step = self.discovery.on_error();
                self.push_step(step, effects);
            }
            Some(InFlight::Ids) if self.discovery.awaiting_ids() => {
                effects.push(Effect::Debug("server rejected sequence ID request".into()));
                self.discovery.abort();
            }
            Some(stale) => {
                effects.push(Effect::Debug(format!("error reply for abandoned {stale:?}")));
            }
            None => effects.push(Effect::Debug("unattributed error reply".into())),
        }
    }
}
