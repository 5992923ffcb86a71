//! Sequence discovery: enumerate IDs, then resolve names one at a time.

use std::collections::VecDeque;

use crate::message::SequenceInfo;

/// What the caller should do after feeding the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryStep {
    /// Send "get sequence name" for this ID.
    RequestName(i32),
    /// The run finished; report this list once.
    Complete(Vec<SequenceInfo>),
    /// Nothing to do.
    Idle,
}

/// Name-resolution pipeline of one discovery run.
///
/// Only one name request is ever outstanding; the cursor holds the ID a
/// name reply will be attributed to.
#[derive(Debug, Default)]
pub struct Discovery {
    awaiting_ids: bool,
    expected: Vec<i32>,
    queue: VecDeque<i32>,
    cursor: Option<i32>,
    recorded: Vec<(i32, String)>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything and wait for a fresh ID list.
    pub fn restart(&mut self) {
        *self = Self {
            awaiting_ids: true,
            ..Self::default()
        };
    }

    /// Drop the run without reporting anything.
    pub fn abort(&mut self) {
        *self = Self::default();
    }

    pub fn awaiting_ids(&self) -> bool {
        self.awaiting_ids
    }

    pub fn cursor(&self) -> Option<i32> {
        self.cursor
    }

    /// A run is in progress (waiting for IDs or names).
    pub fn is_active(&self) -> bool {
        self.awaiting_ids || self.cursor.is_some() || !self.queue.is_empty()
    }

    pub fn expected(&self) -> &[i32] {
        &self.expected
    }

    /// The server answered "get sequence IDs".
    pub fn on_ids(&mut self, ids: Vec<i32>) -> DiscoveryStep {
        self.awaiting_ids = false;
        self.queue = ids.iter().copied().collect();
        self.expected = ids;
        self.recorded.clear();
        self.cursor = None;
        self.advance()
    }

    /// A name reply arrived for the current cursor.
    pub fn on_name(&mut self, name: String) -> DiscoveryStep {
        let Some(id) = self.cursor.take() else {
            return DiscoveryStep::Idle;
        };
        self.recorded.push((id, name));
        self.advance()
    }

    /// The server rejected the current name request: stop expecting it.
    pub fn on_error(&mut self) -> DiscoveryStep {
        let Some(id) = self.cursor.take() else {
            return DiscoveryStep::Idle;
        };
        if let Some(pos) = self.expected.iter().position(|&e| e == id) {
            self.expected.remove(pos);
        }
        self.advance()
    }

    fn advance(&mut self) -> DiscoveryStep {
        if self.recorded.len() >= self.expected.len() {
            let result = self.result();
            self.abort();
            return DiscoveryStep::Complete(result);
        }
        match self.queue.pop_front() {
            Some(id) => {
                self.cursor = Some(id);
                DiscoveryStep::RequestName(id)
            }
            None => DiscoveryStep::Idle,
        }
    }

    /// Expected IDs in server order, each with its recorded name or a
    /// placeholder.
    fn result(&self) -> Vec<SequenceInfo> {
        self.expected
            .iter()
            .map(|&id| {
                self.recorded
                    .iter()
                    .find(|(rid, _)| *rid == id)
                    .map(|(_, name)| SequenceInfo::new(id, name.clone()))
                    .unwrap_or_else(|| SequenceInfo::placeholder(id))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(step: DiscoveryStep) -> Vec<(i32, String)> {
        match step {
            DiscoveryStep::Complete(list) => list.into_iter().map(|s| (s.id, s.name)).collect(),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn resolves_names_in_order() {
        let mut d = Discovery::new();
        d.restart();
        assert!(d.awaiting_ids());

        assert_eq!(d.on_ids(vec![3, 7, 2]), DiscoveryStep::RequestName(3));
        assert_eq!(d.on_name("Act 1".into()), DiscoveryStep::RequestName(7));
        assert_eq!(d.on_name("Act 2".into()), DiscoveryStep::RequestName(2));
        let done = d.on_name("Act 3".into());

        assert_eq!(
            names(done),
            vec![(3, "Act 1".into()), (7, "Act 2".into()), (2, "Act 3".into())]
        );
        assert!(!d.is_active());
    }

    #[test]
    fn error_drops_the_id() {
        let mut d = Discovery::new();
        d.restart();
        d.on_ids(vec![3, 7, 2]);
        d.on_name("Act 1".into());
        assert_eq!(d.cursor(), Some(7));
        assert_eq!(d.on_error(), DiscoveryStep::RequestName(2));
        let done = d.on_name("Act 3".into());
        assert_eq!(names(done), vec![(3, "Act 1".into()), (2, "Act 3".into())]);
    }

    #[test]
    fn empty_list_completes_immediately() {
        let mut d = Discovery::new();
        d.restart();
        assert_eq!(d.on_ids(Vec::new()), DiscoveryStep::Complete(Vec::new()));
        assert!(!d.is_active());
    }

    #[test]
    fn unsolicited_name_is_ignored() {
        let mut d = Discovery::new();
        assert_eq!(d.on_name("stray".into()), DiscoveryStep::Idle);
        assert_eq!(d.on_error(), DiscoveryStep::Idle);
    }

    #[test]
    fn duplicate_ids_fall_back_to_first_name() {
        let mut d = Discovery::new();
        d.on_ids(vec![5, 5]);
        d.on_name("A".into());
        let done = d.on_name("B".into());
        assert_eq!(names(done), vec![(5, "A".into()), (5, "A".into())]);
    }

    #[test]
    fn restart_discards_previous_run() {
        let mut d = Discovery::new();
        d.on_ids(vec![1, 2]);
        d.restart();
        assert_eq!(d.cursor(), None);
        assert!(d.expected().is_empty());
        assert!(d.awaiting_ids());
    }
}
