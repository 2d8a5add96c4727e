//! # Steps
//!
//! A step is an atomic, invertible document edit carrying enough data to
//! map positions across it. The set of step kinds is closed: the two
//! general-purpose replace steps plus the two mark steps. On the wire a
//! step is an object with a `stepType` discriminator, resolved through a
//! process-wide registry; registering two kinds under one discriminator is
//! a construction-time fatal error.

use crate::error::{StepFailed, TransformError};
use crate::map::{Mapping, StepMap};
use crate::mark_step::{AddMarkStep, RemoveMarkStep};
use crate::replace_step::{ReplaceAroundStep, ReplaceStep};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use vellum_model::{Node, RangeError, Schema, Slice};

/// The result of applying a step: the new document, or a structured
/// failure the caller may skip
pub type StepResult = Result<Node, StepFailed>;

/// Apply a replace to a document, converting replace errors into step
/// failures
pub(crate) fn result_from_replace(
    doc: &Node,
    from: usize,
    to: usize,
    slice: &Slice,
) -> StepResult {
    doc.replace(from, to, slice).map_err(StepFailed::from)
}

/// An atomic, invertible document edit
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Replace(ReplaceStep),
    ReplaceAround(ReplaceAroundStep),
    AddMark(AddMarkStep),
    RemoveMark(RemoveMarkStep),
}

impl Step {
    /// Apply this step to a document
    pub fn apply(&self, doc: &Node) -> StepResult {
        match self {
            Step::Replace(step) => step.apply(doc),
            Step::ReplaceAround(step) => step.apply(doc),
            Step::AddMark(step) => step.apply(doc),
            Step::RemoveMark(step) => step.apply(doc),
        }
    }

    /// The step that undoes this one, given the document it was applied to
    pub fn invert(&self, doc: &Node) -> Result<Step, RangeError> {
        match self {
            Step::Replace(step) => step.invert(doc),
            Step::ReplaceAround(step) => step.invert(doc),
            Step::AddMark(step) => Ok(step.invert()),
            Step::RemoveMark(step) => Ok(step.invert()),
        }
    }

    /// Map this step through a mapping; `None` when the step's content was
    /// entirely deleted
    pub fn map(&self, mapping: &Mapping) -> Option<Step> {
        match self {
            Step::Replace(step) => step.map(mapping),
            Step::ReplaceAround(step) => step.map(mapping),
            Step::AddMark(step) => step.map(mapping),
            Step::RemoveMark(step) => step.map(mapping),
        }
    }

    /// The positional delta this step induces
    pub fn get_map(&self) -> StepMap {
        match self {
            Step::Replace(step) => step.get_map(),
            Step::ReplaceAround(step) => step.get_map(),
            Step::AddMark(_) | Step::RemoveMark(_) => StepMap::empty(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Step::Replace(step) => step.to_json(),
            Step::ReplaceAround(step) => step.to_json(),
            Step::AddMark(step) => step.to_json(),
            Step::RemoveMark(step) => step.to_json(),
        }
    }

    /// Deserialize a step through the default registry
    pub fn from_json(schema: &Schema, value: &Value) -> Result<Step, RangeError> {
        StepRegistry::global().read(schema, value)
    }
}

/// A function that reads one step kind from its JSON form
pub type StepReader = fn(&Schema, &Value) -> Result<Step, RangeError>;

/// Maps `stepType` discriminators to deserializers. The default registry
/// holds the built-in kinds; custom registries may be built up with
/// [`StepRegistry::register`], which rejects duplicate discriminators.
pub struct StepRegistry {
    readers: HashMap<String, StepReader>,
}

impl StepRegistry {
    pub fn new() -> StepRegistry {
        StepRegistry {
            readers: HashMap::new(),
        }
    }

    /// The registry holding the built-in step kinds
    pub fn with_defaults() -> StepRegistry {
        let mut registry = StepRegistry::new();
        registry
            .readers
            .insert("replace".to_string(), ReplaceStep::from_json);
        registry
            .readers
            .insert("replaceAround".to_string(), ReplaceAroundStep::from_json);
        registry
            .readers
            .insert("addMark".to_string(), AddMarkStep::from_json);
        registry
            .readers
            .insert("removeMark".to_string(), RemoveMarkStep::from_json);
        registry
    }

    pub(crate) fn global() -> &'static StepRegistry {
        static GLOBAL: OnceLock<StepRegistry> = OnceLock::new();
        GLOBAL.get_or_init(StepRegistry::with_defaults)
    }

    /// Register a deserializer under a discriminator. Registering a
    /// duplicate is fatal to construction.
    pub fn register(&mut self, id: &str, reader: StepReader) -> Result<(), TransformError> {
        if self.readers.contains_key(id) {
            return Err(TransformError::DuplicateStepType(id.to_string()));
        }
        self.readers.insert(id.to_string(), reader);
        Ok(())
    }

    /// Parse a step, dispatching on its `stepType` field
    pub fn read(&self, schema: &Schema, value: &Value) -> Result<Step, RangeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RangeError::json("step", "expected an object"))?;
        let step_type = obj
            .get("stepType")
            .and_then(Value::as_str)
            .ok_or_else(|| RangeError::json("step", "missing 'stepType' field"))?;
        let reader = self.readers.get(step_type).ok_or_else(|| {
            RangeError::json("step", format!("unknown step type '{}'", step_type))
        })?;
        reader(schema, value)
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        StepRegistry::with_defaults()
    }
}

/// Read a required integer position field from step JSON
pub(crate) fn json_pos(obj: &serde_json::Map<String, Value>, field: &str) -> Result<usize, RangeError> {
    obj.get(field)
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .ok_or_else(|| RangeError::json("step", format!("missing or invalid '{}' field", field)))
}

/// Read an optional slice field from step JSON
pub(crate) fn json_slice(
    schema: &Schema,
    obj: &serde_json::Map<String, Value>,
) -> Result<Slice, RangeError> {
    match obj.get("slice") {
        None | Some(Value::Null) => Ok(Slice::empty()),
        Some(value) => Slice::from_json(schema, value),
    }
}

#[cfg(test)]
mod tests {
    use super::StepRegistry;
    use crate::replace_step::ReplaceStep;

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = StepRegistry::with_defaults();
        let result = registry.register("replace", ReplaceStep::from_json);
        assert!(result.is_err());
        assert!(registry.register("custom", ReplaceStep::from_json).is_ok());
    }
}
