//! Message codec seam
//!
//! The scheduler never looks inside a message. It asks a [`MessageCodec`] to
//! load a template from a message file, to materialize it into a
//! [`WireMessage`] using the current variable values, and to compare a
//! received wire message against a template.

use crate::error::Result;
use crate::identity::TaskId;
use crate::value::{Value, ValueKind};
use std::any::Any;
use std::fmt;
use std::path::Path;

/// A serialized message as it travels on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    /// Message kind (e.g. `NAS_DOWNLINK_DATA_REQ`)
    pub kind: String,
    /// Sending task, when known
    pub origin: Option<TaskId>,
    /// Encoded body
    pub payload: Vec<u8>,
}

impl WireMessage {
    /// Create a wire message with no origin
    pub fn new(kind: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            origin: None,
            payload,
        }
    }

    /// Set the sending task
    pub fn from_task(mut self, origin: impl Into<TaskId>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// A loaded message file, opaque to everything but its codec
pub struct MessageTemplate {
    kind: String,
    references: Vec<String>,
    captures: Vec<String>,
    body: Box<dyn Any + Send>,
}

impl MessageTemplate {
    /// Wrap a codec-specific body
    ///
    /// `references` are variables whose value is substituted into the
    /// message; `captures` are variables written from a received message.
    pub fn new<T: Any + Send>(
        kind: impl Into<String>,
        references: Vec<String>,
        captures: Vec<String>,
        body: T,
    ) -> Self {
        Self {
            kind: kind.into(),
            references,
            captures,
            body: Box::new(body),
        }
    }

    /// Message kind
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Variables the content depends on
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Variables assigned from a received message
    pub fn captures(&self) -> &[String] {
        &self.captures
    }

    /// Downcast the codec body
    pub fn body<T: Any>(&self) -> Option<&T> {
        self.body.downcast_ref::<T>()
    }
}

impl fmt::Debug for MessageTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageTemplate")
            .field("kind", &self.kind)
            .field("references", &self.references)
            .field("captures", &self.captures)
            .finish_non_exhaustive()
    }
}

/// Outcome of comparing a received message with its expectation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    /// Human-readable differences; empty when the message matched
    pub diffs: Vec<String>,
    /// Values to store into variables (`#NAME` fields)
    pub captures: Vec<(String, Value)>,
}

impl Comparison {
    /// A comparison with no differences
    pub fn matching() -> Self {
        Self::default()
    }

    /// Whether the received message matched
    pub fn is_match(&self) -> bool {
        self.diffs.is_empty()
    }

    /// Record a difference
    pub fn diff(&mut self, message: impl Into<String>) {
        self.diffs.push(message.into());
    }
}

/// Read access to scenario variables by name
pub trait VarLookup {
    /// Current value of a variable, if declared and set
    fn resolve(&self, name: &str) -> Option<&Value>;

    /// Declared kind of a variable
    fn kind_of(&self, name: &str) -> Option<ValueKind>;
}

/// Message marshalling collaborator
pub trait MessageCodec: Send {
    /// Load a message file into a template
    fn load(&self, path: &Path) -> Result<MessageTemplate>;

    /// Serialize a template with the current variable values
    fn materialize(&self, template: &MessageTemplate, vars: &dyn VarLookup) -> Result<WireMessage>;

    /// Compare a received message against a template
    fn compare(
        &self,
        received: &WireMessage,
        expected: &MessageTemplate,
        vars: &dyn VarLookup,
    ) -> Result<Comparison>;
}
