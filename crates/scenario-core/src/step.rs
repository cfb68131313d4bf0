//! Typed steps of a scenario

use crate::codec::{MessageTemplate, WireMessage};
use crate::error::{Error, Result};
use crate::identity::{StepId, TaskId};
use crate::time::{Deadline, TimerKey};
use crate::value::Value;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Direction of a message step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

/// A message to send or to expect
#[derive(Debug)]
pub struct MessageStep {
    pub direction: Direction,
    /// Destination of a send, expected origin of a receive
    pub peer: Option<TaskId>,
    /// Message file the template was loaded from
    pub source: PathBuf,
    pub template: MessageTemplate,
    pub deadline: Deadline,
    /// Last materialized form, reused until `stale` is set
    pub wire: Option<WireMessage>,
    /// Content depends on a variable that changed since `wire` was built
    pub stale: bool,
    /// Sent, or matched against an arrival
    pub processed: bool,
    /// When the message was sent or received
    pub timestamp: Option<Instant>,
    /// When the scheduler first reached the step
    pub first_attempt: Option<Instant>,
    /// Outstanding timer, if armed
    pub timer: Option<TimerKey>,
}

impl MessageStep {
    /// Create an unplayed message step
    pub fn new(
        direction: Direction,
        peer: Option<TaskId>,
        source: impl Into<PathBuf>,
        template: MessageTemplate,
        deadline: Deadline,
    ) -> Self {
        Self {
            direction,
            peer,
            source: source.into(),
            template,
            deadline,
            wire: None,
            stale: false,
            processed: false,
            timestamp: None,
            first_attempt: None,
            timer: None,
        }
    }

    pub fn is_send(&self) -> bool {
        self.direction == Direction::Send
    }

    pub fn is_receive(&self) -> bool {
        self.direction == Direction::Receive
    }

    /// Record that the message went out or came in
    pub fn mark_processed(&mut self, at: Instant) {
        self.processed = true;
        self.timestamp = Some(at);
    }

    /// Forget everything that happened while playing
    ///
    /// Returns the timer that was still armed, for the caller to cancel.
    pub fn rewind(&mut self) -> Option<TimerKey> {
        self.processed = false;
        self.timestamp = None;
        self.first_attempt = None;
        self.timer.take()
    }
}

/// A literal or a reference to a variable
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<T> {
    Literal(T),
    Variable(StepId),
}

/// Assign a variable
#[derive(Debug, Clone, PartialEq)]
pub struct SetVarStep {
    pub target: StepId,
    pub source: Operand<Value>,
}

/// Comparison operator of a conditional jump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CondOp {
    /// Compare `lhs` (the variable) with `rhs` (the literal)
    ///
    /// Both sides are ordered as unsigned 64-bit integers, so `-1` and
    /// `0xffffffffffffffff` are the largest value.
    pub fn evaluate(&self, lhs: i64, rhs: i64) -> bool {
        let (lhs, rhs) = (lhs as u64, rhs as u64);
        match self {
            CondOp::Eq => lhs == rhs,
            CondOp::Ne => lhs != rhs,
            CondOp::Gt => lhs > rhs,
            CondOp::Ge => lhs >= rhs,
            CondOp::Lt => lhs < rhs,
            CondOp::Le => lhs <= rhs,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CondOp::Eq => "eq",
            CondOp::Ne => "ne",
            CondOp::Gt => "gt",
            CondOp::Ge => "ge",
            CondOp::Lt => "lt",
            CondOp::Le => "le",
        }
    }
}

impl FromStr for CondOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Ok(CondOp::Eq),
            "ne" => Ok(CondOp::Ne),
            "gt" => Ok(CondOp::Gt),
            "ge" => Ok(CondOp::Ge),
            "lt" => Ok(CondOp::Lt),
            "le" => Ok(CondOp::Le),
            other => Err(Error::InvalidOperation(format!(
                "unknown jump condition: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for CondOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Jump to a label when `variable <op> operand` holds
#[derive(Debug, Clone, PartialEq)]
pub struct JumpStep {
    pub variable: StepId,
    pub op: CondOp,
    pub operand: i64,
    pub label: StepId,
}

/// Pause the scenario for a fixed duration
#[derive(Debug, Clone, PartialEq)]
pub struct SleepStep {
    pub duration: Duration,
    /// Set while the sleep is in progress
    pub wake_at: Option<Instant>,
}

impl SleepStep {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            wake_at: None,
        }
    }
}

/// Terminal status forced by an exit step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Failed,
}

/// Update of the EMM NAS security context
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecurityUpdateStep {
    /// Selected ciphering algorithm
    pub eea: Option<Operand<u8>>,
    /// Selected integrity algorithm
    pub eia: Option<Operand<u8>>,
    /// Uplink NAS count
    pub ul_count: Option<Operand<u32>>,
}

/// Kind-specific content of a step
#[derive(Debug)]
pub enum StepKind {
    Message(MessageStep),
    /// Declares the variable of this name; the record lives in the value store
    Variable(String),
    SetVar(SetVarStep),
    Increment(StepId),
    Decrement(StepId),
    Label(String),
    Jump(JumpStep),
    Sleep(SleepStep),
    Exit(Option<ExitStatus>),
    /// Compute the authentication response from RAND and AUTN
    ComputeAuthResponse,
    UpdateSecurityContext(SecurityUpdateStep),
}

impl StepKind {
    /// Short name of the kind, for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Message(m) if m.is_send() => "send",
            StepKind::Message(_) => "receive",
            StepKind::Variable(_) => "var",
            StepKind::SetVar(_) => "set_var",
            StepKind::Increment(_) => "incr_var",
            StepKind::Decrement(_) => "decr_var",
            StepKind::Label(_) => "label",
            StepKind::Jump(_) => "jcond",
            StepKind::Sleep(_) => "sleep",
            StepKind::Exit(_) => "exit",
            StepKind::ComputeAuthResponse => "compute_authentication_response_parameter",
            StepKind::UpdateSecurityContext(_) => "update_emm_security_context",
        }
    }
}

/// A step with its id
#[derive(Debug)]
pub struct Step {
    pub id: StepId,
    pub kind: StepKind,
}

impl Step {
    pub fn as_message(&self) -> Option<&MessageStep> {
        match &self.kind {
            StepKind::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut MessageStep> {
        match &mut self.kind {
            StepKind::Message(m) => Some(m),
            _ => None,
        }
    }
}
