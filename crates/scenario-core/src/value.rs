//! Typed variable values
//!
//! Scenario variables carry one of three kinds of data:
//! - `Int` - 64-bit integer (decimal, hex and negative literals all land here)
//! - `Ascii` - text blob
//! - `Bytes` - binary blob, written as a hex stream in scripts

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a value, fixed when a variable is declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Int,
    Ascii,
    Bytes,
}

impl ValueKind {
    /// Get the name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            ValueKind::Int => "int",
            ValueKind::Ascii => "ascii",
            ValueKind::Bytes => "bytes",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A variable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// 64-bit integer
    ///
    /// Unsigned literals above `i64::MAX` keep their bit pattern.
    Int(i64),
    /// ASCII text stream
    Ascii(String),
    /// Binary stream
    Bytes(Vec<u8>),
}

impl Value {
    /// Get the kind of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Ascii(_) => ValueKind::Ascii,
            Value::Bytes(_) => ValueKind::Bytes,
        }
    }

    /// Get the type name of this value
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Try to get this value as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get this value as text
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Ascii(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get the raw bytes of a blob value (text or binary)
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Ascii(s) => Some(s.as_bytes()),
            Value::Bytes(b) => Some(b),
            Value::Int(_) => None,
        }
    }

    /// Render this value the way it appears inside a message field
    ///
    /// Integers are decimal, text is verbatim and binary is lowercase hex.
    pub fn to_field_text(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Ascii(s) => s.clone(),
            Value::Bytes(b) => hex::encode(b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{} (0x{:x})", i, i),
            Value::Ascii(s) => write!(f, "\"{}\"", s),
            Value::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Ascii(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Ascii(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}
