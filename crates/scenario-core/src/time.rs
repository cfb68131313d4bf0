//! Timing of message steps
//!
//! A message step is due `delay` after its anchor:
//! - `Anchor::Itself` - the first time the scheduler attempts the step
//! - `Anchor::Step` - the send/receive timestamp of an earlier message step

use crate::identity::StepId;
use std::fmt;
use std::time::{Duration, Instant};

/// Delay applied to receive steps that do not set one
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1000);

/// What a message deadline is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The step itself
    Itself,
    /// Another (earlier) message step
    Step(StepId),
}

/// Deadline of a message step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub delay: Duration,
    pub anchor: Anchor,
}

impl Deadline {
    /// Fire as soon as the step is reached
    pub fn immediate() -> Self {
        Self {
            delay: Duration::ZERO,
            anchor: Anchor::Itself,
        }
    }

    /// Fire `delay` after the step is first reached
    pub fn after(delay: Duration) -> Self {
        Self {
            delay,
            anchor: Anchor::Itself,
        }
    }

    /// Fire `delay` after another step was processed
    pub fn relative_to(step: StepId, delay: Duration) -> Self {
        Self {
            delay,
            anchor: Anchor::Step(step),
        }
    }

    /// Instant at which the deadline falls, given the anchor instant
    ///
    /// `None` when the delay reaches past what an `Instant` can hold.
    pub fn due(&self, anchored_at: Instant) -> Option<Instant> {
        anchored_at.checked_add(self.delay)
    }
}

impl fmt::Display for Deadline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.anchor {
            Anchor::Itself => write!(f, "{:?} after itself", self.delay),
            Anchor::Step(id) => write!(f, "{:?} after {}", self.delay, id),
        }
    }
}

/// Key of a one-shot timer armed for a message step
///
/// `seq` differs for every arming so that an expiry delivered after its
/// timer was cancelled can be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    /// Index of the scenario in its playlist
    pub scenario: usize,
    pub step: StepId,
    pub seq: u64,
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{} ({} of scenario {})", self.seq, self.step, self.scenario)
    }
}
