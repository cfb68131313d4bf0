//! Step graph: an ordered arena of steps with id and label indexes

use crate::error::{Error, Result};
use crate::identity::StepId;
use crate::step::{MessageStep, Step, StepKind};
use crate::time::TimerKey;
use std::collections::HashMap;

/// The ordered steps of a scenario
///
/// Steps are only ever appended, so the arena order is document order and
/// ids increase along it.
#[derive(Debug, Default)]
pub struct StepGraph {
    steps: Vec<Step>,
    index: HashMap<StepId, usize>,
    labels: HashMap<String, StepId>,
    next_id: u32,
}

impl StepGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next pushed step will receive
    pub fn peek_id(&self) -> StepId {
        StepId::new(self.next_id + 1)
    }

    /// Append a step
    ///
    /// Labels are indexed by name; declaring the same label twice fails.
    pub fn push(&mut self, kind: StepKind) -> Result<StepId> {
        let id = self.peek_id();
        if let StepKind::Label(name) = &kind {
            if self.labels.contains_key(name) {
                return Err(Error::DuplicateLabel(name.clone()));
            }
            self.labels.insert(name.clone(), id);
        }
        self.next_id += 1;
        self.index.insert(id, self.steps.len());
        self.steps.push(Step { id, kind });
        Ok(id)
    }

    pub fn get(&self, id: StepId) -> Option<&Step> {
        self.index.get(&id).map(|&i| &self.steps[i])
    }

    pub fn get_mut(&mut self, id: StepId) -> Option<&mut Step> {
        match self.index.get(&id) {
            Some(&i) => Some(&mut self.steps[i]),
            None => None,
        }
    }

    /// Get a step, failing if the id is unknown
    pub fn step(&self, id: StepId) -> Result<&Step> {
        self.get(id).ok_or(Error::StepNotFound(id))
    }

    /// Get a step mutably, failing if the id is unknown
    pub fn step_mut(&mut self, id: StepId) -> Result<&mut Step> {
        self.get_mut(id).ok_or(Error::StepNotFound(id))
    }

    /// Get a message step
    pub fn message(&self, id: StepId) -> Result<&MessageStep> {
        self.step(id)?.as_message().ok_or(Error::WrongStepKind {
            id,
            expected: "message",
        })
    }

    /// Get a message step mutably
    pub fn message_mut(&mut self, id: StepId) -> Result<&mut MessageStep> {
        self.step_mut(id)?
            .as_message_mut()
            .ok_or(Error::WrongStepKind {
                id,
                expected: "message",
            })
    }

    /// First step
    pub fn head(&self) -> Option<StepId> {
        self.steps.first().map(|s| s.id)
    }

    /// Last step
    pub fn tail(&self) -> Option<StepId> {
        self.steps.last().map(|s| s.id)
    }

    /// Step following `id`, or `None` at the end
    pub fn next_after(&self, id: StepId) -> Result<Option<StepId>> {
        let i = *self.index.get(&id).ok_or(Error::StepNotFound(id))?;
        Ok(self.steps.get(i + 1).map(|s| s.id))
    }

    /// Find a label by name
    pub fn label(&self, name: &str) -> Option<StepId> {
        self.labels.get(name).copied()
    }

    /// The `n`-th message step counting back from the end (`n = 1` is the last)
    pub fn nth_previous_message(&self, n: usize) -> Option<StepId> {
        if n == 0 {
            return None;
        }
        self.steps
            .iter()
            .rev()
            .filter(|s| s.as_message().is_some())
            .nth(n - 1)
            .map(|s| s.id)
    }

    /// Flag message steps for re-materialization
    pub fn mark_stale(&mut self, ids: &[StepId]) {
        for id in ids {
            if let Some(message) = self.get_mut(*id).and_then(Step::as_message_mut) {
                message.stale = true;
            }
        }
    }

    /// Re-arm every step for a replay after a backward jump
    ///
    /// Returns the timers that were still armed.
    pub fn rewind(&mut self) -> Vec<TimerKey> {
        let mut armed = Vec::new();
        for step in &mut self.steps {
            match &mut step.kind {
                StepKind::Message(message) => armed.extend(message.rewind()),
                StepKind::Sleep(sleep) => sleep.wake_at = None,
                _ => {}
            }
        }
        armed
    }

    /// Iterate over steps in order
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Iterate over message steps in order
    pub fn messages(&self) -> impl Iterator<Item = (StepId, &MessageStep)> {
        self.steps
            .iter()
            .filter_map(|s| s.as_message().map(|m| (s.id, m)))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MessageTemplate;
    use crate::step::{Direction, SleepStep};
    use crate::time::Deadline;
    use std::time::{Duration, Instant};

    fn message(direction: Direction) -> StepKind {
        StepKind::Message(MessageStep::new(
            direction,
            None,
            "m.ron",
            MessageTemplate::new("M", vec![], vec![], ()),
            Deadline::immediate(),
        ))
    }

    #[test]
    fn test_push_assigns_sequential_ids() {
        let mut graph = StepGraph::new();
        let a = graph.push(StepKind::Label("start".into())).unwrap();
        let b = graph.push(message(Direction::Send)).unwrap();
        assert_eq!(a, StepId::new(1));
        assert_eq!(b, StepId::new(2));
        assert_eq!(graph.head(), Some(a));
        assert_eq!(graph.tail(), Some(b));
        assert_eq!(graph.next_after(a).unwrap(), Some(b));
        assert_eq!(graph.next_after(b).unwrap(), None);
        assert!(graph.next_after(StepId::new(9)).is_err());
    }

    #[test]
    fn test_duplicate_label() {
        let mut graph = StepGraph::new();
        graph.push(StepKind::Label("loop".into())).unwrap();
        let err = graph.push(StepKind::Label("loop".into())).unwrap_err();
        assert!(matches!(err, Error::DuplicateLabel(_)));
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.label("loop"), Some(StepId::new(1)));
    }

    #[test]
    fn test_nth_previous_message_skips_other_steps() {
        let mut graph = StepGraph::new();
        let first = graph.push(message(Direction::Send)).unwrap();
        graph.push(StepKind::Label("l".into())).unwrap();
        let second = graph.push(message(Direction::Receive)).unwrap();
        graph.push(StepKind::Increment(StepId::new(1))).unwrap();

        assert_eq!(graph.nth_previous_message(1), Some(second));
        assert_eq!(graph.nth_previous_message(2), Some(first));
        assert_eq!(graph.nth_previous_message(3), None);
        assert_eq!(graph.nth_previous_message(0), None);
    }

    #[test]
    fn test_message_accessors_check_kind() {
        let mut graph = StepGraph::new();
        let label = graph.push(StepKind::Label("l".into())).unwrap();
        let msg = graph.push(message(Direction::Send)).unwrap();
        assert!(graph.message(msg).is_ok());
        assert!(matches!(
            graph.message(label),
            Err(Error::WrongStepKind { .. })
        ));
    }

    #[test]
    fn test_rewind_clears_play_state() {
        let mut graph = StepGraph::new();
        let msg = graph.push(message(Direction::Send)).unwrap();
        let sleep = graph
            .push(StepKind::Sleep(SleepStep::new(Duration::from_secs(1))))
            .unwrap();
        let now = Instant::now();
        graph.message_mut(msg).unwrap().mark_processed(now);
        if let StepKind::Sleep(s) = &mut graph.step_mut(sleep).unwrap().kind {
            s.wake_at = Some(now);
        }

        let armed = graph.rewind();
        assert!(armed.is_empty());
        let m = graph.message(msg).unwrap();
        assert!(!m.processed);
        assert!(m.timestamp.is_none());
        match &graph.step(sleep).unwrap().kind {
            StepKind::Sleep(s) => assert!(s.wake_at.is_none()),
            _ => panic!("expected sleep step"),
        }
    }

    #[test]
    fn test_mark_stale_ignores_non_messages() {
        let mut graph = StepGraph::new();
        let label = graph.push(StepKind::Label("l".into())).unwrap();
        let msg = graph.push(message(Direction::Send)).unwrap();
        graph.mark_stale(&[label, msg]);
        assert!(graph.message(msg).unwrap().stale);
    }
}
