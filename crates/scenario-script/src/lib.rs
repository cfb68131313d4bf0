//! Scenario Script - RON loader and message codec
//!
//! Loads scenario content from RON files:
//! - Scenario lists, with nested inclusion of further lists
//! - Scenario documents, turned into a step graph and value store
//! - Message files, through the reference [`RonMessageCodec`]

mod error;
pub mod literal;
mod loader;
mod message;
mod schema;

pub use error::{Error, Result};
pub use loader::Loader;
pub use message::{MessageDoc, RonMessageCodec};
pub use schema::{Action, ExitStatusDef, PlaylistDef, PlaylistEntry, ScenarioDef, StepDef};
