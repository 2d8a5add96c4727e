//! # Transform
//!
//! Accumulates steps against a document: each applied step appends its
//! position map to the transform's mapping, and callers use that mapping
//! to translate previously captured positions into the newest document's
//! coordinate space. A failed step has zero observable side effect, since
//! all affected structures are persistent values.

use crate::error::{StepFailed, TransformError};
use crate::map::Mapping;
use crate::mark_step::{AddMarkStep, RemoveMarkStep};
use crate::replace_step::{ReplaceAroundStep, ReplaceStep};
use crate::step::Step;
use crate::structure::TypeWithAttrs;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, trace};
use vellum_model::{
    Fragment, Mark, MarkType, Node, NodeRange, NodeType, ResolveCache, ResolvedPos, Slice,
};

/// Selects which marks a [`Transform::remove_mark`] call strips
pub enum MarkTarget {
    /// Every mark in the range
    Any,
    /// All marks of one type
    OfType(MarkType),
    /// One exact mark
    Exact(Mark),
}

pub struct Transform {
    doc: Node,
    steps: Vec<Step>,
    docs: Vec<Node>,
    mapping: Mapping,
    resolve_cache: ResolveCache,
}

impl Transform {
    /// Start a transform from a document
    pub fn new(doc: Node) -> Transform {
        Transform {
            doc,
            steps: Vec::new(),
            docs: Vec::new(),
            mapping: Mapping::new(),
            resolve_cache: ResolveCache::new(),
        }
    }

    /// The current document
    pub fn doc(&self) -> &Node {
        &self.doc
    }

    /// The document before any steps
    pub fn before(&self) -> &Node {
        self.docs.first().unwrap_or(&self.doc)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The document versions before each step
    pub fn docs(&self) -> &[Node] {
        &self.docs
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Resolve a position in the current document, using this transform's
    /// resolution cache
    pub fn resolve(&mut self, pos: usize) -> Result<ResolvedPos, TransformError> {
        Ok(self.resolve_cache.resolve(&self.doc, pos)?)
    }

    /// Apply a step, failing hard when it does not apply
    pub fn step(&mut self, step: Step) -> Result<&mut Self, TransformError> {
        self.maybe_step(step)?;
        Ok(self)
    }

    /// Try to apply a step; on failure the transform is left untouched
    /// and the structured failure is returned
    pub fn maybe_step(&mut self, step: Step) -> Result<(), StepFailed> {
        match step.apply(&self.doc) {
            Ok(doc) => {
                trace!(steps = self.steps.len() + 1, "applied step");
                self.add_step(step, doc);
                Ok(())
            }
            Err(failed) => {
                debug!(reason = failed.reason(), "step failed");
                Err(failed)
            }
        }
    }

    fn add_step(&mut self, step: Step, doc: Node) {
        self.mapping.append_map(step.get_map());
        self.docs.push(std::mem::replace(&mut self.doc, doc));
        self.steps.push(step);
    }

    /// Replace the range `[from, to)` with a slice
    pub fn replace(
        &mut self,
        from: usize,
        to: usize,
        slice: Slice,
    ) -> Result<&mut Self, TransformError> {
        if from == to && slice.size() == 0 {
            return Ok(self);
        }
        self.step(Step::Replace(ReplaceStep::new(from, to, slice, false)))
    }

    /// Replace a range with closed content
    pub fn replace_with(
        &mut self,
        from: usize,
        to: usize,
        content: impl Into<Fragment>,
    ) -> Result<&mut Self, TransformError> {
        self.replace(from, to, Slice::new(content.into(), 0, 0))
    }

    /// Delete a range
    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, TransformError> {
        self.replace(from, to, Slice::empty())
    }

    /// Insert content at a position
    pub fn insert(
        &mut self,
        pos: usize,
        content: impl Into<Fragment>,
    ) -> Result<&mut Self, TransformError> {
        self.replace_with(pos, pos, content)
    }

    /// Lift the content of a range out of its parent, into the ancestor at
    /// `target` depth (found with [`crate::structure::lift_target`])
    pub fn lift(&mut self, range: &NodeRange, target: usize) -> Result<&mut Self, TransformError> {
        let rfrom = range.from();
        let rto = range.to();
        let depth = range.depth();
        let gap_start = rfrom.before(depth + 1)?;
        let gap_end = rto.after(depth + 1)?;
        let mut start = gap_start;
        let mut end = gap_end;

        let mut before = Fragment::empty();
        let mut open_start = 0;
        let mut splitting = false;
        for d in ((target + 1)..=depth).rev() {
            if splitting || rfrom.index(d) > 0 {
                splitting = true;
                before = Fragment::from(rfrom.node(d).copy(before));
                open_start += 1;
            } else {
                start -= 1;
            }
        }

        let mut after = Fragment::empty();
        let mut open_end = 0;
        splitting = false;
        for d in ((target + 1)..=depth).rev() {
            if splitting || rto.after(d + 1)? < rto.end(d) {
                splitting = true;
                after = Fragment::from(rto.node(d).copy(after));
                open_end += 1;
            } else {
                end += 1;
            }
        }

        let insert = before.size() - open_start;
        self.step(Step::ReplaceAround(ReplaceAroundStep::new(
            start,
            end,
            gap_start,
            gap_end,
            Slice::new(before.append(&after), open_start, open_end),
            insert,
            true,
        )))
    }

    /// Wrap the range in the given chain of wrappers (found with
    /// [`crate::structure::find_wrapping`])
    pub fn wrap(
        &mut self,
        range: &NodeRange,
        wrappers: &[TypeWithAttrs],
    ) -> Result<&mut Self, TransformError> {
        let mut content = Fragment::empty();
        for wrapper in wrappers.iter().rev() {
            if content.size() > 0 {
                let valid = wrapper
                    .node_type
                    .content_match()
                    .match_fragment(&content)
                    .map_or(false, |m| m.valid_end());
                if !valid {
                    return Err(TransformError::invalid(
                        "wrapper type does not form valid content of its parent wrapper",
                    ));
                }
            }
            let node = wrapper
                .node_type
                .create(wrapper.attrs.as_ref(), Some(content), vec![])?;
            content = Fragment::from(node);
        }
        let start = range.start();
        let end = range.end();
        self.step(Step::ReplaceAround(ReplaceAroundStep::new(
            start,
            end,
            start,
            end,
            Slice::new(content, 0, 0),
            wrappers.len(),
            true,
        )))
    }

    /// Split the node at `pos` into two, `depth` levels up, optionally
    /// overriding the types of the nodes after the split (innermost last)
    pub fn split(
        &mut self,
        pos: usize,
        depth: usize,
        types_after: Option<&[Option<TypeWithAttrs>]>,
    ) -> Result<&mut Self, TransformError> {
        let rpos = self.resolve(pos)?;
        if depth == 0 || depth > rpos.depth() {
            return Err(TransformError::invalid("split depth out of range"));
        }
        let mut before = Fragment::empty();
        let mut after = Fragment::empty();
        let base = rpos.depth() - depth;
        let mut i = depth as isize - 1;
        for d in ((base + 1)..=rpos.depth()).rev() {
            before = Fragment::from(rpos.node(d).copy(before));
            let type_after = if i >= 0 {
                types_after.and_then(|t| t.get(i as usize)).and_then(Option::as_ref)
            } else {
                None
            };
            after = match type_after {
                Some(t) => {
                    let node = t
                        .node_type
                        .create(t.attrs.as_ref(), Some(after), vec![])?;
                    Fragment::from(node)
                }
                None => Fragment::from(rpos.node(d).copy(after)),
            };
            i -= 1;
        }
        self.step(Step::Replace(ReplaceStep::new(
            pos,
            pos,
            Slice::new(before.append(&after), depth, depth),
            true,
        )))
    }

    /// Join the nodes flanking `pos` together, `depth` levels deep
    pub fn join(&mut self, pos: usize, depth: usize) -> Result<&mut Self, TransformError> {
        if depth == 0 || pos < depth {
            return Err(TransformError::invalid("join depth out of range"));
        }
        self.step(Step::Replace(ReplaceStep::new(
            pos - depth,
            pos + depth,
            Slice::empty(),
            true,
        )))
    }

    /// Convert every textblock in the range to the given type
    pub fn set_block_type(
        &mut self,
        from: usize,
        to: usize,
        node_type: &NodeType,
        attrs: Option<&BTreeMap<String, Value>>,
    ) -> Result<&mut Self, TransformError> {
        if !node_type.is_textblock() {
            return Err(TransformError::invalid(
                "type given to set_block_type should be a textblock",
            ));
        }
        let probe_attrs = node_type.create(attrs, None, vec![])?.attrs().clone();
        let map_from = self.mapping.len();

        let mut targets: Vec<(usize, usize, Vec<Mark>)> = Vec::new();
        let doc = self.doc.clone();
        doc.nodes_between(from, to, &mut |node, pos, _parent, _| {
            if node.is_textblock() {
                let already = node.node_type() == node_type && *node.attrs() == probe_attrs;
                if !already {
                    targets.push((pos, node.node_size(), node.marks().to_vec()));
                }
                return false;
            }
            true
        });

        for (pos, node_size, marks) in targets {
            let mapped = self.mapping.slice_from(map_from).map(pos, 1);
            if !can_change_type(&self.doc, mapped, node_type) {
                continue;
            }
            self.clear_incompatible(mapped, node_type)?;
            let mapping = self.mapping.slice_from(map_from);
            let start = mapping.map(pos, 1);
            let end = mapping.map(pos + node_size, 1);
            let replacement = node_type.create(attrs, None, marks)?;
            self.step(Step::ReplaceAround(ReplaceAroundStep::new(
                start,
                end,
                start + 1,
                end - 1,
                Slice::new(Fragment::from(replacement), 0, 0),
                1,
                true,
            )))?;
        }
        Ok(self)
    }

    /// Change the type, attributes, or marks of the node at `pos`
    pub fn set_node_markup(
        &mut self,
        pos: usize,
        node_type: Option<&NodeType>,
        attrs: Option<&BTreeMap<String, Value>>,
        marks: Option<Vec<Mark>>,
    ) -> Result<&mut Self, TransformError> {
        let node = self
            .doc
            .node_at(pos)?
            .ok_or_else(|| TransformError::invalid("no node at given position"))?;
        let node_type = node_type.cloned().unwrap_or_else(|| node.node_type().clone());
        let new_node =
            node_type.create(attrs, None, marks.unwrap_or_else(|| node.marks().to_vec()))?;
        if node.is_leaf() {
            return self.replace_with(pos, pos + node.node_size(), new_node);
        }
        if !node_type.valid_content(node.content()) {
            return Err(TransformError::invalid(format!(
                "invalid content for node type {}",
                node_type.name()
            )));
        }
        let size = node.node_size();
        self.step(Step::ReplaceAround(ReplaceAroundStep::new(
            pos,
            pos + size,
            pos + 1,
            pos + size - 1,
            Slice::new(Fragment::from(new_node), 0, 0),
            1,
            true,
        )))
    }

    /// Remove children and marks of the node at `pos` that the given type
    /// would not allow, and fill missing required content at the end
    pub fn clear_incompatible(
        &mut self,
        pos: usize,
        parent_type: &NodeType,
    ) -> Result<&mut Self, TransformError> {
        let node = self
            .doc
            .node_at(pos)?
            .ok_or_else(|| TransformError::invalid("no node at given position"))?;
        let mut state = Some(parent_type.content_match());
        let mut delete_steps = Vec::new();
        let mut cur = pos + 1;
        for i in 0..node.child_count() {
            let child = node.child(i).clone();
            let end = cur + child.node_size();
            match state.as_ref().and_then(|m| m.match_type(child.node_type())) {
                None => {
                    delete_steps.push(ReplaceStep::new(cur, end, Slice::empty(), false));
                }
                Some(next) => {
                    state = Some(next);
                    for mark in child.marks() {
                        if !parent_type.allows_mark_type(mark.mark_type()) {
                            self.step(Step::RemoveMark(RemoveMarkStep::new(
                                cur,
                                end,
                                mark.clone(),
                            )))?;
                        }
                    }
                }
            }
            cur = end;
        }
        if let Some(m) = state {
            if !m.valid_end() {
                let fill = m
                    .fill_before(&Fragment::empty(), true, 0)
                    .ok_or_else(|| {
                        TransformError::invalid("content cannot be filled to a valid end")
                    })?;
                self.replace(cur, cur, Slice::new(fill, 0, 0))?;
            }
        }
        for step in delete_steps.into_iter().rev() {
            self.step(Step::Replace(step))?;
        }
        Ok(self)
    }

    /// Add a mark to all inline content in the range
    pub fn add_mark(
        &mut self,
        from: usize,
        to: usize,
        mark: Mark,
    ) -> Result<&mut Self, TransformError> {
        let mut removed: Vec<(usize, usize, Mark)> = Vec::new();
        let mut added: Vec<(usize, usize)> = Vec::new();
        let doc = self.doc.clone();
        doc.nodes_between(from, to, &mut |node, pos, parent, _| {
            if !node.is_inline() {
                return true;
            }
            let marks = node.marks();
            let allowed = parent
                .map_or(false, |p| p.node_type().allows_mark_type(mark.mark_type()));
            if !mark.is_in_set(marks) && allowed {
                let start = pos.max(from);
                let end = (pos + node.node_size()).min(to);
                let new_set = mark.add_to_set(marks);
                for existing in marks {
                    if !existing.is_in_set(&new_set) {
                        match removed.last_mut() {
                            Some((_, rto, rmark)) if *rto == start && rmark == existing => {
                                *rto = end;
                            }
                            _ => removed.push((start, end, existing.clone())),
                        }
                    }
                }
                match added.last_mut() {
                    Some((_, ato)) if *ato == start => *ato = end,
                    _ => added.push((start, end)),
                }
            }
            true
        });
        for (start, end, displaced) in removed {
            self.step(Step::RemoveMark(RemoveMarkStep::new(start, end, displaced)))?;
        }
        for (start, end) in added {
            self.step(Step::AddMark(AddMarkStep::new(start, end, mark.clone())))?;
        }
        Ok(self)
    }

    /// Remove marks matching the target from all inline content in the
    /// range
    pub fn remove_mark(
        &mut self,
        from: usize,
        to: usize,
        target: MarkTarget,
    ) -> Result<&mut Self, TransformError> {
        struct Matched {
            from: usize,
            to: usize,
            mark: Mark,
            step: usize,
        }
        let mut matched: Vec<Matched> = Vec::new();
        let mut step_count = 0usize;
        let doc = self.doc.clone();
        doc.nodes_between(from, to, &mut |node, pos, _parent, _| {
            if !node.is_inline() {
                return true;
            }
            step_count += 1;
            let to_remove: Vec<Mark> = match &target {
                MarkTarget::OfType(mark_type) => {
                    let mut set = node.marks().to_vec();
                    let mut found = Vec::new();
                    while let Some(mark) = mark_type.find_in_set(&set) {
                        let mark = mark.clone();
                        set = mark.remove_from_set(&set);
                        found.push(mark);
                    }
                    found
                }
                MarkTarget::Exact(mark) => {
                    if mark.is_in_set(node.marks()) {
                        vec![mark.clone()]
                    } else {
                        Vec::new()
                    }
                }
                MarkTarget::Any => node.marks().to_vec(),
            };
            if !to_remove.is_empty() {
                let end = (pos + node.node_size()).min(to);
                for mark in to_remove {
                    let mut merged = false;
                    for m in matched.iter_mut() {
                        if m.step == step_count - 1 && m.mark == mark {
                            m.to = end;
                            m.step = step_count;
                            merged = true;
                            break;
                        }
                    }
                    if !merged {
                        matched.push(Matched {
                            from: pos.max(from),
                            to: end,
                            mark,
                            step: step_count,
                        });
                    }
                }
            }
            true
        });
        for m in matched {
            self.step(Step::RemoveMark(RemoveMarkStep::new(m.from, m.to, m.mark)))?;
        }
        Ok(self)
    }
}

fn can_change_type(doc: &Node, pos: usize, node_type: &NodeType) -> bool {
    let rpos = match doc.resolve(pos) {
        Ok(rpos) => rpos,
        Err(_) => return false,
    };
    let index = rpos.index(rpos.depth());
    rpos.parent().can_replace_with(index, index + 1, node_type)
}
