use crate::error::RangeError;
use crate::schema::{Attrs, MarkType, Schema};
use serde_json::{Map, Value};
use std::fmt;

/// A mark is a typed, attributed annotation attached to inline content,
/// such as emphasis or a link. Marks are plain immutable values; sets of
/// marks are kept sorted by the mark type's rank (its declaration index)
/// and contain at most one mark per type unless attrs differ and the type
/// does not exclude itself.
#[derive(Clone)]
pub struct Mark {
    mark_type: MarkType,
    attrs: Attrs,
}

impl Mark {
    pub(crate) fn new(mark_type: MarkType, attrs: Attrs) -> Self {
        Self { mark_type, attrs }
    }

    pub fn mark_type(&self) -> &MarkType {
        &self.mark_type
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// The empty mark set
    pub fn none() -> Vec<Mark> {
        Vec::new()
    }

    /// Add this mark to a set, keeping the set sorted by rank and honoring
    /// mutual exclusion. Adding a mark that is already present returns the
    /// set unchanged, so the operation is idempotent.
    pub fn add_to_set(&self, set: &[Mark]) -> Vec<Mark> {
        let mut copy: Option<Vec<Mark>> = None;
        let mut placed = false;

        for (i, other) in set.iter().enumerate() {
            if self == other {
                return set.to_vec();
            }
            if self.mark_type.excludes(other.mark_type()) {
                if copy.is_none() {
                    copy = Some(set[..i].to_vec());
                }
            } else if other.mark_type().excludes(&self.mark_type) {
                return set.to_vec();
            } else {
                if !placed && other.mark_type().rank() > self.mark_type.rank() {
                    let target = copy.get_or_insert_with(|| set[..i].to_vec());
                    target.push(self.clone());
                    placed = true;
                }
                if let Some(target) = copy.as_mut() {
                    target.push(other.clone());
                }
            }
        }

        let mut result = copy.unwrap_or_else(|| set.to_vec());
        if !placed {
            result.push(self.clone());
        }
        result
    }

    /// Remove this mark (by equality) from a set
    pub fn remove_from_set(&self, set: &[Mark]) -> Vec<Mark> {
        set.iter().filter(|m| *m != self).cloned().collect()
    }

    /// Whether a mark equal to this one is a member of the set
    pub fn is_in_set(&self, set: &[Mark]) -> bool {
        set.iter().any(|m| m == self)
    }

    /// Whether two sets hold the same marks in the same order
    pub fn same_set(a: &[Mark], b: &[Mark]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
    }

    /// Normalize an arbitrary list of marks into a sorted, deduplicated set
    pub fn set_from(marks: Vec<Mark>) -> Vec<Mark> {
        let mut set = Mark::none();
        for mark in marks {
            set = mark.add_to_set(&set);
        }
        set
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "type".to_string(),
            Value::String(self.mark_type.name().to_string()),
        );
        if !self.attrs.is_empty() {
            obj.insert("attrs".to_string(), attrs_to_json(&self.attrs));
        }
        Value::Object(obj)
    }

    pub fn from_json(schema: &Schema, value: &Value) -> Result<Mark, RangeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RangeError::json("mark", "expected an object"))?;
        let name = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RangeError::json("mark", "missing 'type' field"))?;
        let attrs = attrs_from_json(obj.get("attrs"))?;
        schema.mark_type(name)?.create(attrs.as_ref())
    }
}

impl PartialEq for Mark {
    fn eq(&self, other: &Self) -> bool {
        self.mark_type == other.mark_type && self.attrs == other.attrs
    }
}

impl Eq for Mark {}

impl fmt::Debug for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attrs.is_empty() {
            write!(f, "{}", self.mark_type.name())
        } else {
            write!(f, "{}{:?}", self.mark_type.name(), self.attrs)
        }
    }
}

pub(crate) fn attrs_to_json(attrs: &Attrs) -> Value {
    Value::Object(attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

pub(crate) fn attrs_from_json(
    value: Option<&Value>,
) -> Result<Option<std::collections::BTreeMap<String, Value>>, RangeError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        )),
        Some(_) => Err(RangeError::json("attrs", "expected an object")),
    }
}

/// Parse a JSON array of marks, defaulting to the empty set when absent
pub(crate) fn marks_from_json(
    schema: &Schema,
    value: Option<&Value>,
) -> Result<Vec<Mark>, RangeError> {
    match value {
        None | Some(Value::Null) => Ok(Mark::none()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| Mark::from_json(schema, item))
            .collect(),
        Some(_) => Err(RangeError::json("marks", "expected an array")),
    }
}
