//! Value store: the variables of one scenario
//!
//! A variable is keyed by the id of the step that declares it and can also be
//! found by name. Message steps whose content depends on a variable subscribe
//! to it; when the variable changes, [`VariableStore::notify_if_changed`]
//! hands back the subscribers so they can be marked for re-materialization.

use crate::codec::VarLookup;
use crate::error::{Error, Result};
use crate::identity::StepId;
use crate::value::{Value, ValueKind};
use indexmap::IndexMap;
use std::collections::HashMap;

/// How a variable gets its value
#[derive(Debug, Clone, PartialEq)]
pub enum VarInit {
    /// A literal, known at load time
    Value(Value),
    /// Copy of another variable, taken each time the declaring step plays
    Mirror(StepId),
}

/// A variable record
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    kind: ValueKind,
    value: Option<Value>,
    mirror: Option<StepId>,
    changed: bool,
    subscribers: Vec<StepId>,
}

impl Variable {
    /// Variable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared kind
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Current value; a mirror has none until it plays
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Source variable when this is a mirror
    pub fn mirror_of(&self) -> Option<StepId> {
        self.mirror
    }

    /// Whether the value changed since subscribers were last notified
    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Steps depending on this variable
    pub fn subscribers(&self) -> &[StepId] {
        &self.subscribers
    }
}

/// All variables of a scenario
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    vars: IndexMap<StepId, Variable>,
    names: HashMap<String, StepId>,
}

impl VariableStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a variable under the id of its declaring step
    pub fn declare(&mut self, id: StepId, name: impl Into<String>, init: VarInit) -> Result<()> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(Error::DuplicateVariable(name));
        }
        let variable = match init {
            VarInit::Value(value) => Variable {
                name: name.clone(),
                kind: value.kind(),
                value: Some(value),
                mirror: None,
                changed: false,
                subscribers: Vec::new(),
            },
            VarInit::Mirror(source) => {
                let kind = self.variable(source)?.kind;
                Variable {
                    name: name.clone(),
                    kind,
                    value: None,
                    mirror: Some(source),
                    changed: false,
                    subscribers: Vec::new(),
                }
            }
        };
        self.names.insert(name, id);
        self.vars.insert(id, variable);
        Ok(())
    }

    /// Get a variable by id
    pub fn get(&self, id: StepId) -> Option<&Variable> {
        self.vars.get(&id)
    }

    /// Get a variable by id, failing if it is unknown
    pub fn variable(&self, id: StepId) -> Result<&Variable> {
        self.vars
            .get(&id)
            .ok_or_else(|| Error::VariableNotFound(id.to_string()))
    }

    /// Find the id of a variable by name
    pub fn lookup(&self, name: &str) -> Option<StepId> {
        self.names.get(name).copied()
    }

    /// Get a variable by name
    pub fn by_name(&self, name: &str) -> Option<&Variable> {
        self.lookup(name).and_then(|id| self.vars.get(&id))
    }

    /// Current value of a variable
    pub fn value(&self, id: StepId) -> Option<&Value> {
        self.vars.get(&id).and_then(|v| v.value.as_ref())
    }

    /// Store a new value, returning whether it differs from the old one
    ///
    /// The value must have the variable's declared kind.
    pub fn set(&mut self, id: StepId, value: Value) -> Result<bool> {
        let var = self
            .vars
            .get_mut(&id)
            .ok_or_else(|| Error::VariableNotFound(id.to_string()))?;
        if value.kind() != var.kind {
            return Err(Error::type_error(
                format!("{} for {}", var.kind, var.name),
                value.kind(),
            ));
        }
        let changed = var.value.as_ref() != Some(&value);
        if changed {
            var.value = Some(value);
            var.changed = true;
        }
        Ok(changed)
    }

    /// Refresh a mirror from its source variable
    pub fn mirror(&mut self, id: StepId) -> Result<bool> {
        let var = self.variable(id)?;
        let source = var.mirror.ok_or_else(|| {
            Error::InvalidOperation(format!("variable {} is not a mirror", var.name))
        })?;
        let source_var = self.variable(source)?;
        let value = source_var.value.clone().ok_or_else(|| {
            Error::InvalidOperation(format!("variable {} has no value yet", source_var.name))
        })?;
        self.set(id, value)
    }

    /// Register a step to be notified when the variable changes
    pub fn subscribe(&mut self, id: StepId, step: StepId) -> Result<()> {
        let var = self
            .vars
            .get_mut(&id)
            .ok_or_else(|| Error::VariableNotFound(id.to_string()))?;
        if !var.subscribers.contains(&step) {
            var.subscribers.push(step);
        }
        Ok(())
    }

    /// Take the subscribers to notify if the variable changed
    ///
    /// Clears the changed flag. Returns an empty list when nothing changed.
    pub fn notify_if_changed(&mut self, id: StepId) -> Vec<StepId> {
        match self.vars.get_mut(&id) {
            Some(var) if var.changed => {
                var.changed = false;
                var.subscribers.clone()
            }
            _ => Vec::new(),
        }
    }

    /// Iterate over variables in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (StepId, &Variable)> {
        self.vars.iter().map(|(id, var)| (*id, var))
    }

    /// Number of declared variables
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Check if no variable is declared
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl VarLookup for VariableStore {
    fn resolve(&self, name: &str) -> Option<&Value> {
        self.by_name(name).and_then(|v| v.value.as_ref())
    }

    fn kind_of(&self, name: &str) -> Option<ValueKind> {
        self.by_name(name).map(|v| v.kind)
    }
}
