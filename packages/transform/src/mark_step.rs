use crate::map::{Mapping, StepMap};
use crate::step::{json_pos, result_from_replace, Step, StepResult};
use serde_json::{Map, Value};
use vellum_model::{Fragment, Mark, Node, RangeError, Schema, Slice};

/// Apply a function to every inline node in a fragment, rebuilding parents
/// around the changed children
fn map_inline(
    fragment: &Fragment,
    f: &dyn Fn(&Node, &Node) -> Node,
    parent: &Node,
) -> Fragment {
    let mut mapped = Vec::with_capacity(fragment.child_count());
    for child in fragment.iter() {
        let descended = if child.content().size() > 0 {
            child.copy(map_inline(child.content(), f, child))
        } else {
            child.clone()
        };
        if descended.is_inline() {
            mapped.push(f(&descended, parent));
        } else {
            mapped.push(descended);
        }
    }
    Fragment::from_vec(mapped)
}

/// Add a mark to all inline content in a range
#[derive(Debug, Clone, PartialEq)]
pub struct AddMarkStep {
    from: usize,
    to: usize,
    mark: Mark,
}

impl AddMarkStep {
    pub fn new(from: usize, to: usize, mark: Mark) -> AddMarkStep {
        AddMarkStep { from, to, mark }
    }

    pub fn mark(&self) -> &Mark {
        &self.mark
    }

    pub fn apply(&self, doc: &Node) -> StepResult {
        let old_slice = doc
            .slice(self.from, self.to)
            .map_err(|e| crate::error::StepFailed::new(e.to_string()))?;
        let rfrom = doc
            .resolve(self.from)
            .map_err(|e| crate::error::StepFailed::new(e.to_string()))?;
        let parent = rfrom.node(rfrom.shared_depth(self.to)).clone();
        let mark = self.mark.clone();
        let slice = Slice::new(
            map_inline(
                old_slice.content(),
                &move |node, parent| {
                    if !parent.node_type().allows_mark_type(mark.mark_type()) {
                        node.clone()
                    } else {
                        node.mark(mark.add_to_set(node.marks()))
                    }
                },
                &parent,
            ),
            old_slice.open_start(),
            old_slice.open_end(),
        );
        result_from_replace(doc, self.from, self.to, &slice)
    }

    pub fn invert(&self) -> Step {
        Step::RemoveMark(RemoveMarkStep::new(self.from, self.to, self.mark.clone()))
    }

    pub fn map(&self, mapping: &Mapping) -> Option<Step> {
        let from = mapping.map_result(self.from, 1);
        let to = mapping.map_result(self.to, -1);
        if (from.deleted() && to.deleted()) || from.pos() >= to.pos() {
            return None;
        }
        Some(Step::AddMark(AddMarkStep::new(
            from.pos(),
            to.pos(),
            self.mark.clone(),
        )))
    }

    pub fn get_map(&self) -> StepMap {
        StepMap::empty()
    }

    pub fn to_json(&self) -> Value {
        mark_step_json("addMark", self.from, self.to, &self.mark)
    }

    pub fn from_json(schema: &Schema, value: &Value) -> Result<Step, RangeError> {
        let (from, to, mark) = mark_step_from_json(schema, value)?;
        Ok(Step::AddMark(AddMarkStep::new(from, to, mark)))
    }
}

/// Remove a mark from all inline content in a range
#[derive(Debug, Clone, PartialEq)]
pub struct RemoveMarkStep {
    from: usize,
    to: usize,
    mark: Mark,
}

impl RemoveMarkStep {
    pub fn new(from: usize, to: usize, mark: Mark) -> RemoveMarkStep {
        RemoveMarkStep { from, to, mark }
    }

    pub fn mark(&self) -> &Mark {
        &self.mark
    }

    pub fn apply(&self, doc: &Node) -> StepResult {
        let old_slice = doc
            .slice(self.from, self.to)
            .map_err(|e| crate::error::StepFailed::new(e.to_string()))?;
        let mark = self.mark.clone();
        let slice = Slice::new(
            map_inline(
                old_slice.content(),
                &move |node, _parent| node.mark(mark.remove_from_set(node.marks())),
                doc,
            ),
            old_slice.open_start(),
            old_slice.open_end(),
        );
        result_from_replace(doc, self.from, self.to, &slice)
    }

    pub fn invert(&self) -> Step {
        Step::AddMark(AddMarkStep::new(self.from, self.to, self.mark.clone()))
    }

    pub fn map(&self, mapping: &Mapping) -> Option<Step> {
        let from = mapping.map_result(self.from, 1);
        let to = mapping.map_result(self.to, -1);
        if (from.deleted() && to.deleted()) || from.pos() >= to.pos() {
            return None;
        }
        Some(Step::RemoveMark(RemoveMarkStep::new(
            from.pos(),
            to.pos(),
            self.mark.clone(),
        )))
    }

    pub fn get_map(&self) -> StepMap {
        StepMap::empty()
    }

    pub fn to_json(&self) -> Value {
        mark_step_json("removeMark", self.from, self.to, &self.mark)
    }

    pub fn from_json(schema: &Schema, value: &Value) -> Result<Step, RangeError> {
        let (from, to, mark) = mark_step_from_json(schema, value)?;
        Ok(Step::RemoveMark(RemoveMarkStep::new(from, to, mark)))
    }
}

fn mark_step_json(step_type: &str, from: usize, to: usize, mark: &Mark) -> Value {
    let mut obj = Map::new();
    obj.insert("stepType".to_string(), Value::from(step_type));
    obj.insert("mark".to_string(), mark.to_json());
    obj.insert("from".to_string(), Value::from(from));
    obj.insert("to".to_string(), Value::from(to));
    Value::Object(obj)
}

fn mark_step_from_json(
    schema: &Schema,
    value: &Value,
) -> Result<(usize, usize, Mark), RangeError> {
    let obj = value
        .as_object()
        .ok_or_else(|| RangeError::json("step", "expected an object"))?;
    let from = json_pos(obj, "from")?;
    let to = json_pos(obj, "to")?;
    let mark_json = obj
        .get("mark")
        .ok_or_else(|| RangeError::json("step", "missing 'mark' field"))?;
    let mark = Mark::from_json(schema, mark_json)?;
    Ok((from, to, mark))
}
