//! Scenario Player - Plays MME test scenarios against the system under test
//!
//! This crate drives the scenarios loaded by `scenario-script`: it sends the
//! scripted messages, waits for the expected ones and ends every scenario
//! with `PLAY_SUCCESS` or `PLAY_FAILED`.
//!
//! ## Architecture
//!
//! ```text
//! Player (tokio task, owns the playlist)
//!  │
//!  ├── events ← PlayerHandle::deliver / TokioTimers / shutdown
//!  │
//!  └── Scheduler (synchronous, takes `now`)
//!       ├── MessageMatcher → MessageCodec
//!       ├── MessageBus     ← sends
//!       ├── TimerService   ← receive deadlines
//!       └── CredentialEngine
//! ```
//!
//! ## Key Components
//!
//! - [`Scheduler`]: Resumable step machine returning a [`Flow`] to its driver
//! - [`MessageMatcher`]: Settles the pending receive step with an arrival
//! - [`Player`]: Event loop feeding timer expiries and messages to the scheduler
//! - [`PlayerConfig`]: Run mode and scenario list selection
//! - [`PlayerReport`]: Final statuses, written as RON

mod bus;
mod config;
mod error;
mod matcher;
mod player;
mod playlist;
mod report;
mod scheduler;
mod timer;

pub use bus::{ChannelBus, Outbound};
pub use config::{PlayerConfig, RunMode};
pub use error::{Error, Result};
pub use matcher::{MatchOutcome, MessageMatcher};
pub use player::{Player, PlayerEvent, PlayerHandle};
pub use playlist::Playlist;
pub use report::{PlayerReport, ScenarioResult};
pub use scheduler::{Flow, Scheduler};
pub use timer::{TimerService, TokioTimers};
