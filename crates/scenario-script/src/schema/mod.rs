//! Schema definitions for RON scenario scripts

pub mod playlist;
pub mod scenario;

pub use playlist::{PlaylistDef, PlaylistEntry};
pub use scenario::{Action, ExitStatusDef, ScenarioDef, StepDef};
