use crate::error::StepFailed;
use crate::map::{Mapping, StepMap};
use crate::step::{json_pos, json_slice, result_from_replace, Step, StepResult};
use serde_json::{Map, Value};
use vellum_model::{Node, RangeError, Schema, Slice};

/// Replace the range `[from, to)` with a slice
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceStep {
    from: usize,
    to: usize,
    slice: Slice,
    /// Structural steps refuse to overwrite content that sits between
    /// their boundary tokens; used by split and join
    structure: bool,
}

impl ReplaceStep {
    pub fn new(from: usize, to: usize, slice: Slice, structure: bool) -> ReplaceStep {
        ReplaceStep {
            from,
            to,
            slice,
            structure,
        }
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.to
    }

    pub fn slice(&self) -> &Slice {
        &self.slice
    }

    pub fn apply(&self, doc: &Node) -> StepResult {
        if self.structure && content_between(doc, self.from, self.to)? {
            return Err(StepFailed::new(
                "structure replace would overwrite content",
            ));
        }
        result_from_replace(doc, self.from, self.to, &self.slice)
    }

    pub fn invert(&self, doc: &Node) -> Result<Step, RangeError> {
        let removed = doc.slice(self.from, self.to)?;
        Ok(Step::Replace(ReplaceStep::new(
            self.from,
            self.from + self.slice.size(),
            removed,
            self.structure,
        )))
    }

    pub fn map(&self, mapping: &Mapping) -> Option<Step> {
        let from = mapping.map_result(self.from, 1);
        let to = mapping.map_result(self.to, -1);
        if from.deleted_across() && to.deleted_across() {
            return None;
        }
        Some(Step::Replace(ReplaceStep::new(
            from.pos(),
            to.pos().max(from.pos()),
            self.slice.clone(),
            self.structure,
        )))
    }

    pub fn get_map(&self) -> StepMap {
        StepMap::new(vec![self.from, self.to - self.from, self.slice.size()])
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("stepType".to_string(), Value::from("replace"));
        obj.insert("from".to_string(), Value::from(self.from));
        obj.insert("to".to_string(), Value::from(self.to));
        if self.slice.content().size() > 0 {
            obj.insert("slice".to_string(), self.slice.to_json());
        }
        if self.structure {
            obj.insert("structure".to_string(), Value::from(true));
        }
        Value::Object(obj)
    }

    pub fn from_json(schema: &Schema, value: &Value) -> Result<Step, RangeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RangeError::json("step", "expected an object"))?;
        let from = json_pos(obj, "from")?;
        let to = json_pos(obj, "to")?;
        if to < from {
            return Err(RangeError::json("step", "'to' precedes 'from'"));
        }
        let slice = json_slice(schema, obj)?;
        let structure = obj
            .get("structure")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Step::Replace(ReplaceStep::new(from, to, slice, structure)))
    }
}

/// Like [`ReplaceStep`], but preserves the gap `[gap_from, gap_to)`
/// verbatim, re-inserting it at offset `insert` inside the replacement
/// slice. This is the mechanism behind wrap, lift, and node-markup changes
/// without re-specifying their possibly large preserved content.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceAroundStep {
    from: usize,
    to: usize,
    gap_from: usize,
    gap_to: usize,
    slice: Slice,
    insert: usize,
    structure: bool,
}

impl ReplaceAroundStep {
    pub fn new(
        from: usize,
        to: usize,
        gap_from: usize,
        gap_to: usize,
        slice: Slice,
        insert: usize,
        structure: bool,
    ) -> ReplaceAroundStep {
        ReplaceAroundStep {
            from,
            to,
            gap_from,
            gap_to,
            slice,
            insert,
            structure,
        }
    }

    pub fn apply(&self, doc: &Node) -> StepResult {
        if self.structure
            && (content_between(doc, self.from, self.gap_from)?
                || content_between(doc, self.gap_to, self.to)?)
        {
            return Err(StepFailed::new("structure gap-replace would overwrite content"));
        }
        let gap = doc
            .slice(self.gap_from, self.gap_to)
            .map_err(|e| StepFailed::new(e.to_string()))?;
        if gap.open_start() != 0 || gap.open_end() != 0 {
            return Err(StepFailed::new("gap is not a flat range"));
        }
        let inserted = self
            .slice
            .insert_at(self.insert, gap.content().clone())
            .ok_or_else(|| StepFailed::new("content does not fit in gap"))?;
        result_from_replace(doc, self.from, self.to, &inserted)
    }

    pub fn invert(&self, doc: &Node) -> Result<Step, RangeError> {
        let gap = self.gap_to - self.gap_from;
        let removed = doc
            .slice(self.from, self.to)?
            .remove_between(self.gap_from - self.from, self.gap_to - self.from)?;
        Ok(Step::ReplaceAround(ReplaceAroundStep::new(
            self.from,
            self.from + self.slice.size() + gap,
            self.from + self.insert,
            self.from + self.insert + gap,
            removed,
            self.gap_from - self.from,
            self.structure,
        )))
    }

    pub fn map(&self, mapping: &Mapping) -> Option<Step> {
        let from = mapping.map_result(self.from, 1);
        let to = mapping.map_result(self.to, -1);
        let gap_from = if self.from == self.gap_from {
            from.pos()
        } else {
            mapping.map(self.gap_from, -1)
        };
        let gap_to = if self.to == self.gap_to {
            to.pos()
        } else {
            mapping.map(self.gap_to, 1)
        };
        if (from.deleted_across() && to.deleted_across())
            || gap_from < from.pos()
            || gap_to > to.pos()
        {
            return None;
        }
        Some(Step::ReplaceAround(ReplaceAroundStep::new(
            from.pos(),
            to.pos(),
            gap_from,
            gap_to,
            self.slice.clone(),
            self.insert,
            self.structure,
        )))
    }

    pub fn get_map(&self) -> StepMap {
        StepMap::new(vec![
            self.from,
            self.gap_from - self.from,
            self.insert,
            self.gap_to,
            self.to - self.gap_to,
            self.slice.size() - self.insert,
        ])
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("stepType".to_string(), Value::from("replaceAround"));
        obj.insert("from".to_string(), Value::from(self.from));
        obj.insert("to".to_string(), Value::from(self.to));
        obj.insert("gapFrom".to_string(), Value::from(self.gap_from));
        obj.insert("gapTo".to_string(), Value::from(self.gap_to));
        obj.insert("insert".to_string(), Value::from(self.insert));
        if self.slice.content().size() > 0 {
            obj.insert("slice".to_string(), self.slice.to_json());
        }
        if self.structure {
            obj.insert("structure".to_string(), Value::from(true));
        }
        Value::Object(obj)
    }

    pub fn from_json(schema: &Schema, value: &Value) -> Result<Step, RangeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RangeError::json("step", "expected an object"))?;
        let from = json_pos(obj, "from")?;
        let to = json_pos(obj, "to")?;
        let gap_from = json_pos(obj, "gapFrom")?;
        let gap_to = json_pos(obj, "gapTo")?;
        let insert = json_pos(obj, "insert")?;
        if gap_from < from || gap_to < gap_from || to < gap_to {
            return Err(RangeError::json("step", "gap range outside replaced range"));
        }
        let slice = json_slice(schema, obj)?;
        let structure = obj
            .get("structure")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(Step::ReplaceAround(ReplaceAroundStep::new(
            from, to, gap_from, gap_to, slice, insert, structure,
        )))
    }
}

/// Whether any live content (rather than just closing and opening tokens)
/// sits between two positions
fn content_between(doc: &Node, from: usize, to: usize) -> Result<bool, StepFailed> {
    let rfrom = doc
        .resolve(from)
        .map_err(|e| StepFailed::new(e.to_string()))?;
    let mut dist = to.checked_sub(from).ok_or_else(|| {
        StepFailed::new("structure range is inverted")
    })?;
    let mut depth = rfrom.depth();
    while dist > 0 && depth > 0 && rfrom.index_after(depth) == rfrom.node(depth).child_count() {
        depth -= 1;
        dist -= 1;
    }
    if dist > 0 {
        let mut next = rfrom
            .node(depth)
            .maybe_child(rfrom.index_after(depth))
            .cloned();
        while dist > 0 {
            match next {
                None => return Ok(true),
                Some(node) => {
                    if node.is_leaf() {
                        return Ok(true);
                    }
                    next = node.first_child().cloned();
                    dist -= 1;
                }
            }
        }
    }
    Ok(false)
}
