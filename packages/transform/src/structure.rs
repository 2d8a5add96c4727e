//! # Structure Helpers
//!
//! Capability checks for the structural operations: where a range can be
//! lifted to, which wrappers admit it, whether a position can be split or
//! joined, and where a node fits. All of them consult the schema's content
//! automaton through the `can_replace` family; none of them mutate
//! anything.

use serde_json::Value;
use std::collections::BTreeMap;
use vellum_model::{Fragment, Node, NodeRange, NodeType};

/// A node type paired with the attributes to instantiate it with; used
/// for wrappers and split overrides
#[derive(Debug, Clone)]
pub struct TypeWithAttrs {
    pub node_type: NodeType,
    pub attrs: Option<BTreeMap<String, Value>>,
}

impl TypeWithAttrs {
    pub fn plain(node_type: NodeType) -> TypeWithAttrs {
        TypeWithAttrs {
            node_type,
            attrs: None,
        }
    }

    pub fn with_attrs(node_type: NodeType, attrs: BTreeMap<String, Value>) -> TypeWithAttrs {
        TypeWithAttrs {
            node_type,
            attrs: Some(attrs),
        }
    }

    pub(crate) fn create(&self, content: Option<Fragment>) -> Option<Node> {
        self.node_type
            .create(self.attrs.as_ref(), content, vec![])
            .ok()
    }
}

fn can_cut(node: &Node, start: usize, end: usize) -> bool {
    (start == 0 || node.can_replace(start, node.child_count()))
        && (end == node.child_count() || node.can_replace(0, end))
}

/// The shallowest depth into which the range's content can be spliced
/// without crossing an isolating boundary; `None` when the range cannot be
/// lifted at all
pub fn lift_target(range: &NodeRange) -> Option<usize> {
    let parent = range.parent();
    let content = parent
        .content()
        .cut_by_index(range.start_index(), range.end_index());
    let mut depth = range.depth();
    loop {
        let node = range.from().node(depth);
        let index = range.from().index(depth);
        let end_index = range.to().index_after(depth);
        if depth < range.depth()
            && node.can_replace_fragment(index, end_index, &content, 0, content.child_count())
        {
            return Some(depth);
        }
        if depth == 0 || node.node_type().is_isolating() || !can_cut(node, index, end_index) {
            return None;
        }
        depth -= 1;
    }
}

/// Find wrappers that would allow wrapping the given range in a node of
/// the given type
pub fn find_wrapping(
    range: &NodeRange,
    node_type: &NodeType,
    attrs: Option<&BTreeMap<String, Value>>,
) -> Option<Vec<TypeWithAttrs>> {
    let around = find_wrapping_outside(range, node_type)?;
    let inner = find_wrapping_inside(range, node_type)?;
    let mut result: Vec<TypeWithAttrs> =
        around.into_iter().map(TypeWithAttrs::plain).collect();
    result.push(TypeWithAttrs {
        node_type: node_type.clone(),
        attrs: attrs.cloned(),
    });
    result.extend(inner.into_iter().map(TypeWithAttrs::plain));
    Some(result)
}

fn find_wrapping_outside(range: &NodeRange, node_type: &NodeType) -> Option<Vec<NodeType>> {
    let parent = range.parent();
    let around = parent
        .content_match_at(range.start_index())
        .ok()?
        .find_wrapping(node_type)?;
    let outer = around.first().unwrap_or(node_type);
    if parent.can_replace_with(range.start_index(), range.end_index(), outer) {
        Some(around)
    } else {
        None
    }
}

fn find_wrapping_inside(range: &NodeRange, node_type: &NodeType) -> Option<Vec<NodeType>> {
    let parent = range.parent();
    let inner_node = parent.maybe_child(range.start_index())?;
    let inside = node_type.content_match().find_wrapping(inner_node.node_type())?;
    let last_type = inside.last().unwrap_or(node_type);
    let mut inner_match = Some(last_type.content_match());
    for i in range.start_index()..range.end_index() {
        inner_match =
            inner_match.and_then(|m| m.match_type(parent.child(i).node_type()));
    }
    match inner_match {
        Some(m) if m.valid_end() => Some(inside),
        _ => None,
    }
}

/// Whether splitting at the given position, the given number of levels up,
/// preserves validity. `types_after` optionally overrides the types of the
/// nodes created after the split, innermost last.
pub fn can_split(
    doc: &Node,
    pos: usize,
    depth: usize,
    types_after: Option<&[Option<TypeWithAttrs>]>,
) -> bool {
    let rpos = match doc.resolve(pos) {
        Ok(rpos) => rpos,
        Err(_) => return false,
    };
    if depth == 0 || rpos.depth() < depth {
        return false;
    }
    let base = rpos.depth() - depth;
    let after = |i: isize| -> Option<&TypeWithAttrs> {
        if i < 0 {
            return None;
        }
        types_after.and_then(|t| t.get(i as usize)).and_then(Option::as_ref)
    };

    let parent = rpos.parent();
    let index = rpos.index(rpos.depth());
    // the innermost node after the split
    let inner_valid = match after(depth as isize - 1) {
        Some(t) => t.node_type.valid_content(
            &parent.content().cut_by_index(index, parent.child_count()),
        ),
        None => parent.node_type().valid_content(
            &parent.content().cut_by_index(index, parent.child_count()),
        ),
    };
    if parent.node_type().is_isolating()
        || !parent.can_replace(index, parent.child_count())
        || !inner_valid
    {
        return false;
    }

    let mut i = depth as isize - 2;
    let mut d = rpos.depth() - 1;
    while d > base {
        let node = rpos.node(d);
        let index = rpos.index(d);
        if node.node_type().is_isolating() {
            return false;
        }
        let mut rest = node.content().cut_by_index(index, node.child_count());
        if let Some(override_child) = after(i + 1) {
            let replacement = match override_child.create(None) {
                Some(node) => node,
                None => return false,
            };
            if rest.child_count() == 0 {
                return false;
            }
            rest = rest.replace_child(0, replacement);
        }
        let rest_valid = match after(i) {
            Some(t) => t.node_type.valid_content(&rest),
            None => node.node_type().valid_content(&rest),
        };
        if !node.can_replace(index + 1, node.child_count()) || !rest_valid {
            return false;
        }
        d -= 1;
        i -= 1;
    }

    let index = rpos.index_after(base);
    let base_type = match after(0) {
        Some(t) => t.node_type.clone(),
        None => rpos.node(base + 1).node_type().clone(),
    };
    rpos.node(base).can_replace_with(index, index, &base_type)
}

fn nodes_joinable(before: Option<&Node>, after: Option<&Node>) -> bool {
    match (before, after) {
        (Some(before), Some(after)) => !before.is_leaf() && before.can_append(after),
        _ => false,
    }
}

/// Whether the two nodes flanking the given position can be joined
pub fn can_join(doc: &Node, pos: usize) -> bool {
    let rpos = match doc.resolve(pos) {
        Ok(rpos) => rpos,
        Err(_) => return false,
    };
    let index = rpos.index(rpos.depth());
    nodes_joinable(rpos.node_before().as_ref(), rpos.node_after().as_ref())
        && rpos.parent().can_replace(index, index + 1)
}

/// Find an ancestor boundary near `pos` where a join is possible,
/// searching upward; `dir` chooses the side to look at
pub fn join_point(doc: &Node, pos: usize, dir: i8) -> Option<usize> {
    let rpos = doc.resolve(pos).ok()?;
    let mut pos = pos;
    let mut depth = rpos.depth();
    loop {
        let (before, after, index) = if depth == rpos.depth() {
            (
                rpos.node_before(),
                rpos.node_after(),
                rpos.index(depth),
            )
        } else if dir > 0 {
            let index = rpos.index(depth) + 1;
            (
                Some(rpos.node(depth + 1).clone()),
                rpos.node(depth).maybe_child(index).cloned(),
                index,
            )
        } else {
            let index = rpos.index(depth);
            let before = if index == 0 {
                None
            } else {
                rpos.node(depth).maybe_child(index - 1).cloned()
            };
            (before, Some(rpos.node(depth + 1).clone()), index)
        };
        let textblock = before.as_ref().map_or(false, |b| b.is_textblock());
        if !textblock
            && nodes_joinable(before.as_ref(), after.as_ref())
            && rpos.node(depth).can_replace(index, index + 1)
        {
            return Some(pos);
        }
        if depth == 0 {
            return None;
        }
        pos = if dir < 0 {
            rpos.before(depth).ok()?
        } else {
            rpos.after(depth).ok()?
        };
        depth -= 1;
    }
}

/// The closest position at or around `pos` where a node of the given type
/// can be inserted
pub fn insert_point(doc: &Node, pos: usize, node_type: &NodeType) -> Option<usize> {
    let rpos = doc.resolve(pos).ok()?;
    let index = rpos.index(rpos.depth());
    if rpos.parent().can_replace_with(index, index, node_type) {
        return Some(pos);
    }
    if rpos.parent_offset() == 0 {
        for depth in (0..rpos.depth()).rev() {
            let index = rpos.index(depth);
            if rpos.node(depth).can_replace_with(index, index, node_type) {
                return rpos.before(depth + 1).ok();
            }
            if index > 0 {
                return None;
            }
        }
    }
    if rpos.parent_offset() == rpos.parent().content().size() {
        for depth in (0..rpos.depth()).rev() {
            let index = rpos.index_after(depth);
            if rpos.node(depth).can_replace_with(index, index, node_type) {
                return rpos.after(depth + 1).ok();
            }
            if index < rpos.node(depth).child_count() {
                return None;
            }
        }
    }
    None
}
