//! Player configuration
//!
//! The player only runs when the process is configured for the scenario
//! player run mode; the same configuration names the root scenario list.
//!
//! ```ron
//! (
//!     run_mode: ScenarioPlayer,
//!     scenario_list: "scenarios/list.ron",
//!     continue_on_load_error: true,
//!     result_file: Some("results.ron"),
//! )
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Operating mode of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RunMode {
    /// Regular operation, the player stays idle
    #[default]
    Normal,
    /// Drive the system from the scenario list
    ScenarioPlayer,
}

/// Configuration for the scenario player
///
/// # Example
///
/// ```
/// use scenario_player::{PlayerConfig, RunMode};
///
/// let config = PlayerConfig::new("scenarios/list.ron");
/// assert_eq!(config.run_mode, RunMode::ScenarioPlayer);
/// assert!(config.is_player_enabled());
/// assert!(config.continue_on_load_error);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub run_mode: RunMode,
    /// Root scenario list
    pub scenario_list: PathBuf,
    /// Keep playing the other scenarios when one fails to load
    #[serde(default = "default_continue_on_load_error")]
    pub continue_on_load_error: bool,
    /// Where to write the RON report once play ends
    #[serde(default)]
    pub result_file: Option<PathBuf>,
}

fn default_continue_on_load_error() -> bool {
    true
}

impl PlayerConfig {
    /// Create a configuration enabling the player on `scenario_list`
    pub fn new(scenario_list: impl Into<PathBuf>) -> Self {
        Self {
            run_mode: RunMode::ScenarioPlayer,
            scenario_list: scenario_list.into(),
            continue_on_load_error: true,
            result_file: None,
        }
    }

    /// Set the report file
    ///
    /// # Example
    ///
    /// ```
    /// use scenario_player::PlayerConfig;
    ///
    /// let config = PlayerConfig::new("list.ron").with_result_file("out.ron");
    /// assert_eq!(config.result_file.unwrap().to_str(), Some("out.ron"));
    /// ```
    pub fn with_result_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.result_file = Some(path.into());
        self
    }

    /// Whether the run mode enables the player
    pub fn is_player_enabled(&self) -> bool {
        self.run_mode == RunMode::ScenarioPlayer
    }

    /// Parse a configuration from RON text
    ///
    /// # Example
    ///
    /// ```
    /// use scenario_player::{PlayerConfig, RunMode};
    ///
    /// let config = PlayerConfig::from_ron_str(r#"(scenario_list: "list.ron")"#).unwrap();
    /// assert_eq!(config.run_mode, RunMode::Normal);
    /// assert!(!config.is_player_enabled());
    /// ```
    pub fn from_ron_str(content: &str) -> Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Load a configuration file
    ///
    /// Relative paths inside it are resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_ron_str(&content)?;
        if let Some(dir) = path.parent() {
            config.scenario_list = dir.join(&config.scenario_list);
            config.result_file = config.result_file.map(|file| dir.join(file));
        }
        Ok(config)
    }
}
