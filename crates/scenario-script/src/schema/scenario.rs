//! Scenario document schema

use serde::{Deserialize, Serialize};

/// A scenario document
///
/// Scripts usually start with `#![enable(implicit_some)]` so optional
/// attributes can be written without `Some(..)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioDef {
    /// Display name
    pub name: String,
    /// Steps in play order
    #[serde(default)]
    pub steps: Vec<StepDef>,
}

/// Direction of a message step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Send,
    Receive,
}

/// Status forced by an `Exit` step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitStatusDef {
    Success,
    Failed,
}

/// One step element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepDef {
    /// Send or expect the message stored in `file`
    Message {
        action: Action,
        file: String,
        /// `now` or `seconds[.fraction]`; defaults to `now` for a send and
        /// 1000 s for a receive
        #[serde(default)]
        time: Option<String>,
        /// `this` (default) or `-N`
        #[serde(default)]
        time_ref: Option<String>,
        /// Destination task of a send, expected origin of a receive
        #[serde(default)]
        peer: Option<String>,
    },
    Var {
        name: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        ascii: Option<String>,
        #[serde(default)]
        hex: Option<String>,
    },
    SetVar {
        name: String,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        ascii: Option<String>,
        #[serde(default)]
        hex: Option<String>,
    },
    IncrVar {
        name: String,
    },
    DecrVar {
        name: String,
    },
    Label {
        name: String,
    },
    /// Jump to `label` when `var_name <cond> value`
    JumpIf {
        var_name: String,
        cond: String,
        label: String,
        /// Integer literal, same grammar as `Var(value: ..)`
        value: String,
    },
    Sleep {
        seconds: u64,
        #[serde(default)]
        useconds: u64,
    },
    Exit {
        #[serde(default)]
        status: Option<ExitStatusDef>,
    },
    /// USIM key material: K as 32 hex digits, SQN_MS as hex
    Usim {
        k: String,
        sqn_ms: String,
    },
    ComputeAuthenticationResponseParameter,
    /// Each attribute is a literal or `$NAME`
    UpdateEmmSecurityContext {
        #[serde(default)]
        seea: Option<String>,
        #[serde(default)]
        seia: Option<String>,
        #[serde(default)]
        ul_count: Option<String>,
    },
}
