//! Scenario Core - Step graph and value store of the MME scenario player
//!
//! This crate provides the data model shared by the loader and the player:
//! - Typed variable values (`Value`, `ValueKind`) and the per-scenario
//!   `VariableStore` with change subscriptions
//! - Typed steps (`Step`, `StepKind`) kept in an ordered `StepGraph`
//! - `Scenario` with its execution status
//! - Message timing (`Deadline`, `Anchor`, `TimerKey`)
//!
//! ## Collaborators
//!
//! The player talks to the outside world through three traits:
//! - `MessageCodec` - load, materialize and compare messages
//! - `MessageBus` - send messages to other tasks
//! - `CredentialEngine` - AKA and NAS key derivation

mod bus;
mod codec;
mod error;
mod graph;
mod identity;
mod scenario;
mod security;
mod step;
mod store;
pub mod time;
mod value;

pub use bus::MessageBus;
pub use codec::{Comparison, MessageCodec, MessageTemplate, VarLookup, WireMessage};
pub use error::{Error, Result};
pub use graph::StepGraph;
pub use identity::{StepId, TaskId};
pub use scenario::{Scenario, ScenarioStatus};
pub use security::{
    AuthOutcome, CredentialEngine, NasKeys, NasSecurityContext, SecurityState,
    UnsupportedCredentials, UsimProfile, SQN_MS_LIMIT,
};
pub use step::{
    CondOp, Direction, ExitStatus, JumpStep, MessageStep, Operand, SecurityUpdateStep,
    SetVarStep, SleepStep, Step, StepKind,
};
pub use store::{VarInit, Variable, VariableStore};
pub use time::{Anchor, Deadline, TimerKey, DEFAULT_RECEIVE_TIMEOUT};
pub use value::{Value, ValueKind};
