//! Scenario list schema

use serde::{Deserialize, Serialize};

/// A scenario list document
///
/// ```ron
/// (
///     scenarios: [
///         Scenario("attach.ron"),
///         Include("detach/list.ron"),
///     ],
/// )
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistDef {
    pub scenarios: Vec<PlaylistEntry>,
}

/// One entry of a scenario list; paths are relative to the list file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaylistEntry {
    /// A scenario script
    Scenario(String),
    /// Another scenario list, loaded in place
    Include(String),
}
