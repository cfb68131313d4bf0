//! One-shot timers for receive deadlines
//!
//! The scheduler arms a timer when a receive step starts waiting and cancels
//! it when the expected message arrives first. Expiry comes back to the
//! player as a [`PlayerEvent::TimerExpired`] on its event channel.

use crate::player::PlayerEvent;
use scenario_core::TimerKey;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Timer collaborator of the scheduler
pub trait TimerService: Send {
    /// Arrange for `key` to expire after `after`
    fn arm(&mut self, key: TimerKey, after: Duration);

    /// Drop a timer that has not expired yet
    fn cancel(&mut self, key: TimerKey);
}

/// Timers backed by tokio tasks
///
/// Must be used from within a tokio runtime.
pub struct TokioTimers {
    events: mpsc::UnboundedSender<PlayerEvent>,
    tasks: HashMap<TimerKey, JoinHandle<()>>,
}

impl TokioTimers {
    pub fn new(events: mpsc::UnboundedSender<PlayerEvent>) -> Self {
        Self {
            events,
            tasks: HashMap::new(),
        }
    }

    /// Number of timers that have not fired or been cancelled
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|task| !task.is_finished()).count()
    }
}

impl TimerService for TokioTimers {
    fn arm(&mut self, key: TimerKey, after: Duration) {
        self.tasks.retain(|_, task| !task.is_finished());
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            // the player may already be gone
            let _ = events.send(PlayerEvent::TimerExpired(key));
        });
        debug!("Armed {} for {:?}", key, after);
        self.tasks.insert(key, task);
    }

    fn cancel(&mut self, key: TimerKey) {
        if let Some(task) = self.tasks.remove(&key) {
            task.abort();
            debug!("Cancelled {}", key);
        }
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}
