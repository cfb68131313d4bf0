//! RON message codec
//!
//! A message file names the message kind and lists its fields as text:
//!
//! ```ron
//! (
//!     kind: "NAS_DOWNLINK_DATA_REQ",
//!     fields: {
//!         "ue_id": "$UE_ID",
//!         "nas_msg": "#AUTH_REQUEST",
//!         "cause": "ANY",
//!     },
//! )
//! ```
//!
//! Field patterns:
//! - `$NAME` - the variable's current value (sent, or expected on receive)
//! - `#NAME` - on receive, store the received value into the variable
//! - `ANY` - on receive, accept any value
//! - anything else - literal text

use crate::literal::parse_int;
use indexmap::IndexMap;
use scenario_core::{
    Comparison, Error, MessageCodec, MessageTemplate, Result, Value, ValueKind, VarLookup,
    WireMessage,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Field value matching anything on receive
const WILDCARD: &str = "ANY";

/// On-disk and on-wire form of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDoc {
    pub kind: String,
    #[serde(default)]
    pub fields: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
enum FieldPattern {
    Literal(String),
    Substitute(String),
    Capture(String),
    Any,
}

impl FieldPattern {
    fn parse(text: &str) -> Self {
        if text == WILDCARD {
            FieldPattern::Any
        } else if let Some(name) = text.strip_prefix('$').filter(|n| !n.is_empty()) {
            FieldPattern::Substitute(name.to_string())
        } else if let Some(name) = text.strip_prefix('#').filter(|n| !n.is_empty()) {
            FieldPattern::Capture(name.to_string())
        } else {
            FieldPattern::Literal(text.to_string())
        }
    }
}

#[derive(Debug)]
struct RonBody {
    fields: IndexMap<String, FieldPattern>,
}

/// Message codec reading and writing [`MessageDoc`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct RonMessageCodec;

impl RonMessageCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encode a document as a wire message
    pub fn encode(&self, doc: &MessageDoc) -> Result<WireMessage> {
        let payload = ron::to_string(doc).map_err(|e| Error::Codec(e.to_string()))?;
        Ok(WireMessage::new(doc.kind.clone(), payload.into_bytes()))
    }

    /// Decode the payload of a wire message
    pub fn decode(&self, wire: &WireMessage) -> Result<MessageDoc> {
        let text = std::str::from_utf8(&wire.payload)
            .map_err(|e| Error::Codec(format!("payload is not UTF-8: {}", e)))?;
        ron::from_str(text).map_err(|e| Error::Codec(e.to_string()))
    }

    /// Read a message file holding only literal fields, ready to be delivered
    pub fn read_wire(&self, path: &Path) -> Result<WireMessage> {
        let doc = read_doc(path)?;
        self.encode(&doc)
    }

    fn body<'a>(&self, template: &'a MessageTemplate) -> Result<&'a RonBody> {
        template
            .body::<RonBody>()
            .ok_or_else(|| Error::Codec(format!("template {} has a foreign body", template.kind())))
    }
}

fn read_doc(path: &Path) -> Result<MessageDoc> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Codec(format!("{}: {}", path.display(), e)))?;
    ron::from_str(&content).map_err(|e| Error::Codec(format!("{}: {}", path.display(), e)))
}

/// Parse received field text according to a variable kind
fn parse_field(kind: ValueKind, text: &str) -> Option<Value> {
    match kind {
        ValueKind::Int => parse_int(text).ok().map(Value::Int),
        ValueKind::Ascii => Some(Value::Ascii(text.to_string())),
        ValueKind::Bytes => hex::decode(text).ok().map(Value::Bytes),
    }
}

impl MessageCodec for RonMessageCodec {
    fn load(&self, path: &Path) -> Result<MessageTemplate> {
        let doc = read_doc(path)?;
        let mut references = Vec::new();
        let mut captures = Vec::new();
        let mut fields = IndexMap::new();
        for (name, text) in doc.fields {
            let pattern = FieldPattern::parse(&text);
            match &pattern {
                FieldPattern::Substitute(var) if !references.contains(var) => {
                    references.push(var.clone())
                }
                FieldPattern::Capture(var) if !captures.contains(var) => captures.push(var.clone()),
                _ => {}
            }
            fields.insert(name, pattern);
        }
        Ok(MessageTemplate::new(
            doc.kind,
            references,
            captures,
            RonBody { fields },
        ))
    }

    fn materialize(&self, template: &MessageTemplate, vars: &dyn VarLookup) -> Result<WireMessage> {
        let body = self.body(template)?;
        let mut fields = IndexMap::new();
        for (name, pattern) in &body.fields {
            let text = match pattern {
                FieldPattern::Literal(text) => text.clone(),
                FieldPattern::Substitute(var) => vars
                    .resolve(var)
                    .map(Value::to_field_text)
                    .ok_or_else(|| Error::Codec(format!("variable {} has no value", var)))?,
                FieldPattern::Capture(_) | FieldPattern::Any => {
                    return Err(Error::Codec(format!(
                        "field {} of {} can only be matched, not sent",
                        name,
                        template.kind()
                    )))
                }
            };
            fields.insert(name.clone(), text);
        }
        self.encode(&MessageDoc {
            kind: template.kind().to_string(),
            fields,
        })
    }

    fn compare(
        &self,
        received: &WireMessage,
        expected: &MessageTemplate,
        vars: &dyn VarLookup,
    ) -> Result<Comparison> {
        let body = self.body(expected)?;
        let mut cmp = Comparison::matching();
        if received.kind != expected.kind() {
            cmp.diff(format!(
                "message kind: expected {}, got {}",
                expected.kind(),
                received.kind
            ));
            return Ok(cmp);
        }
        let doc = match self.decode(received) {
            Ok(doc) => doc,
            Err(e) => {
                cmp.diff(format!("undecodable payload: {}", e));
                return Ok(cmp);
            }
        };

        for (name, pattern) in &body.fields {
            let Some(got) = doc.fields.get(name) else {
                cmp.diff(format!("field {}: missing", name));
                continue;
            };
            match pattern {
                FieldPattern::Any => {}
                FieldPattern::Literal(want) => {
                    if want != got {
                        cmp.diff(format!("field {}: expected {:?}, got {:?}", name, want, got));
                    }
                }
                FieldPattern::Substitute(var) => match vars.resolve(var) {
                    Some(value) if value.to_field_text() == *got => {}
                    Some(value) => cmp.diff(format!(
                        "field {}: expected ${} = {:?}, got {:?}",
                        name,
                        var,
                        value.to_field_text(),
                        got
                    )),
                    None => cmp.diff(format!("field {}: variable {} has no value", name, var)),
                },
                FieldPattern::Capture(var) => {
                    let kind = vars
                        .kind_of(var)
                        .ok_or_else(|| Error::VariableNotFound(var.clone()))?;
                    match parse_field(kind, got) {
                        Some(value) => cmp.captures.push((var.clone(), value)),
                        None => cmp.diff(format!(
                            "field {}: {:?} is not a valid {} for #{}",
                            name, got, kind, var
                        )),
                    }
                }
            }
        }
        for name in doc.fields.keys() {
            if !body.fields.contains_key(name) {
                cmp.diff(format!("field {}: unexpected", name));
            }
        }
        Ok(cmp)
    }
}
