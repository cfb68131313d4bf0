//! Ordered chain of scenarios played one after the other

use crate::error::{Error, Result};
use scenario_core::Scenario;

/// The scenarios of a run and the position of the active one
#[derive(Debug, Default)]
pub struct Playlist {
    scenarios: Vec<Scenario>,
    current: usize,
}

impl Playlist {
    /// Create a playlist starting at its first scenario
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self {
            scenarios,
            current: 0,
        }
    }

    /// Index of the active scenario, `None` once every scenario was played
    pub fn current_index(&self) -> Option<usize> {
        (self.current < self.scenarios.len()).then_some(self.current)
    }

    /// The active scenario
    pub fn current(&self) -> Option<&Scenario> {
        self.scenarios.get(self.current)
    }

    /// Move to the next chained scenario
    pub fn advance(&mut self) {
        if self.current < self.scenarios.len() {
            self.current += 1;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.current >= self.scenarios.len()
    }

    pub fn get(&self, index: usize) -> Option<&Scenario> {
        self.scenarios.get(index)
    }

    /// Get a scenario, failing on an index the playlist never handed out
    pub fn scenario_mut(&mut self, index: usize) -> Result<&mut Scenario> {
        self.scenarios
            .get_mut(index)
            .ok_or_else(|| Error::Internal(format!("no scenario at index {}", index)))
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}
