//! A scenario: one loaded script plus its execution state

use crate::error::Result;
use crate::graph::StepGraph;
use crate::identity::StepId;
use crate::security::{SecurityState, UsimProfile};
use crate::store::VariableStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

/// Execution status of a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioStatus {
    #[default]
    Null,
    Loading,
    Loaded,
    LoadFailed,
    Playing,
    Paused,
    PlayFailed,
    PlaySuccess,
}

impl ScenarioStatus {
    /// No further step will be played
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScenarioStatus::LoadFailed | ScenarioStatus::PlayFailed | ScenarioStatus::PlaySuccess
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ScenarioStatus::LoadFailed | ScenarioStatus::PlayFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Null => "NULL",
            ScenarioStatus::Loading => "LOADING",
            ScenarioStatus::Loaded => "LOADED",
            ScenarioStatus::LoadFailed => "LOAD_FAILED",
            ScenarioStatus::Playing => "PLAYING",
            ScenarioStatus::Paused => "PAUSED",
            ScenarioStatus::PlayFailed => "PLAY_FAILED",
            ScenarioStatus::PlaySuccess => "PLAY_SUCCESS",
        }
    }
}

impl fmt::Display for ScenarioStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scenario of a playlist
#[derive(Debug)]
pub struct Scenario {
    pub name: String,
    /// Script file the scenario was loaded from
    pub path: PathBuf,
    status: ScenarioStatus,
    reason: Option<String>,
    pub graph: StepGraph,
    pub vars: VariableStore,
    /// Last step successfully played
    pub last_played: Option<StepId>,
    /// Timers armed and not yet expired or cancelled
    pub timers: usize,
    pub usim: Option<UsimProfile>,
    pub security: SecurityState,
    pub started: Option<Instant>,
}

impl Scenario {
    /// Create an empty scenario
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            status: ScenarioStatus::Null,
            reason: None,
            graph: StepGraph::new(),
            vars: VariableStore::new(),
            last_played: None,
            timers: 0,
            usim: None,
            security: SecurityState::default(),
            started: None,
        }
    }

    /// Placeholder for a script that could not be loaded
    pub fn load_failed(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        let mut scenario = Self::new(name, path);
        scenario.status = ScenarioStatus::LoadFailed;
        scenario.reason = Some(reason.into());
        scenario
    }

    pub fn status(&self) -> ScenarioStatus {
        self.status
    }

    /// Why the scenario failed, if it did
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn set_status(&mut self, status: ScenarioStatus) {
        self.status = status;
    }

    /// Mark the scenario failed with a reason
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = ScenarioStatus::PlayFailed;
        self.reason = Some(reason.into());
    }

    /// Step to play next: the one after the last played, or the head
    pub fn next_step(&self) -> Result<Option<StepId>> {
        match self.last_played {
            None => Ok(self.graph.head()),
            Some(id) => self.graph.next_after(id),
        }
    }
}
