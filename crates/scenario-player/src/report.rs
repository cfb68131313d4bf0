//! Outcome of a player run

use crate::error::{Error, Result};
use crate::playlist::Playlist;
use chrono::{DateTime, Utc};
use scenario_core::ScenarioStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Final status of one scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub path: PathBuf,
    pub status: ScenarioStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Statuses of every scenario of a playlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerReport {
    pub finished_at: DateTime<Utc>,
    pub scenarios: Vec<ScenarioResult>,
}

impl PlayerReport {
    pub fn from_playlist(playlist: &Playlist) -> Self {
        Self {
            finished_at: Utc::now(),
            scenarios: playlist
                .scenarios()
                .iter()
                .map(|s| ScenarioResult {
                    name: s.name.clone(),
                    path: s.path.clone(),
                    status: s.status(),
                    reason: s.reason().map(str::to_string),
                })
                .collect(),
        }
    }

    /// Whether every scenario ended with `PLAY_SUCCESS`
    pub fn all_passed(&self) -> bool {
        self.scenarios
            .iter()
            .all(|s| s.status == ScenarioStatus::PlaySuccess)
    }

    /// Number of scenarios with `status`
    pub fn count(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} scenario(s): {} passed, {} failed, {} failed to load",
            self.scenarios.len(),
            self.count(ScenarioStatus::PlaySuccess),
            self.count(ScenarioStatus::PlayFailed),
            self.count(ScenarioStatus::LoadFailed)
        )
    }

    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Report(e.to_string()))
    }

    /// Write the report as RON, creating missing directories
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| Error::Report(format!("{}: {}", dir.display(), e)))?;
        }
        fs::write(path, self.to_ron()?)
            .map_err(|e| Error::Report(format!("{}: {}", path.display(), e)))
    }
}

impl fmt::Display for PlayerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        for s in &self.scenarios {
            write!(f, "  {:<14} {}", s.status.as_str(), s.name)?;
            if let Some(reason) = &s.reason {
                write!(f, ": {}", reason)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scenario_core::Scenario;

    fn playlist() -> Playlist {
        let mut passed = Scenario::new("attach", "attach.ron");
        passed.set_status(ScenarioStatus::PlaySuccess);
        let broken = Scenario::load_failed("detach", "detach.ron", "unknown label: end");
        Playlist::new(vec![passed, broken])
    }

    #[test]
    fn test_report_counts() {
        let report = PlayerReport::from_playlist(&playlist());
        assert!(!report.all_passed());
        assert_eq!(report.count(ScenarioStatus::PlaySuccess), 1);
        assert_eq!(report.count(ScenarioStatus::LoadFailed), 1);
        assert_eq!(
            report.summary(),
            "2 scenario(s): 1 passed, 0 failed, 1 failed to load"
        );
        let text = report.to_string();
        assert!(text.contains("LOAD_FAILED"));
        assert!(text.contains("unknown label: end"));
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("results.ron");
        let report = PlayerReport::from_playlist(&playlist());
        report.write_to(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: PlayerReport = ron::from_str(&content).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_empty_report_passes() {
        let report = PlayerReport::from_playlist(&Playlist::new(Vec::new()));
        assert!(report.all_passed());
    }
}
