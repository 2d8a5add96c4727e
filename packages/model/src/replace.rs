//! # Replace
//!
//! The tree-surgery primitive behind every edit: replace the range between
//! two resolved positions with a slice, reconciling the slice's open edges
//! with the surrounding tree at arbitrary depths while keeping every
//! constructed parent valid against its content automaton.

use crate::error::ReplaceError;
use crate::fragment::Fragment;
use crate::node::Node;
use crate::resolved_pos::ResolvedPos;
use crate::slice::Slice;

/// Replace the range between `from` and `to` with a slice, producing a new
/// document. The slice's open depths must line up with the positions:
/// `open_start` may not exceed the start depth, and both sides must open
/// onto the same depth.
pub(crate) fn replace(
    from: &ResolvedPos,
    to: &ResolvedPos,
    slice: &Slice,
) -> Result<Node, ReplaceError> {
    if slice.open_start() > from.depth() {
        return Err(ReplaceError::OpenTooDeep);
    }
    if from.depth() - slice.open_start() != to.depth() - slice.open_end() {
        return Err(ReplaceError::InconsistentOpenDepths);
    }
    replace_outer(from, to, slice, 0)
}

fn replace_outer(
    from: &ResolvedPos,
    to: &ResolvedPos,
    slice: &Slice,
    depth: usize,
) -> Result<Node, ReplaceError> {
    let index = from.index(depth);
    let node = from.node(depth);

    if index == to.index(depth) && depth < from.depth() - slice.open_start() {
        // pass-through: both ends live below the same child
        let inner = replace_outer(from, to, slice, depth + 1)?;
        Ok(node.copy(node.content().replace_child(index, inner)))
    } else if slice.content().size() == 0 {
        close(node, replace_two_way(from, to, depth)?)
    } else if slice.open_start() == 0
        && slice.open_end() == 0
        && from.depth() == depth
        && to.depth() == depth
    {
        // flat case: splice the slice content directly into the parent
        let parent = from.parent();
        let content = parent.content();
        let new_content = content
            .cut(0, from.parent_offset())
            .append(slice.content())
            .append(&content.cut(to.parent_offset(), content.size()));
        close(parent, new_content)
    } else {
        let (start, end) = prepare_slice_for_replace(slice, from)?;
        close(node, replace_three_way(from, &start, &end, to, depth)?)
    }
}

fn check_join(main: &Node, sub: &Node) -> Result<(), ReplaceError> {
    if !sub.node_type().compatible_content(main.node_type()) {
        return Err(ReplaceError::CannotJoin {
            main: main.node_type().name().to_string(),
            sub: sub.node_type().name().to_string(),
        });
    }
    Ok(())
}

fn joinable<'a>(
    before: &'a ResolvedPos,
    after: &ResolvedPos,
    depth: usize,
) -> Result<&'a Node, ReplaceError> {
    let node = before.node(depth);
    check_join(node, after.node(depth))?;
    Ok(node)
}

fn add_node(child: Node, target: &mut Vec<Node>) {
    match target.last() {
        Some(last) if child.is_text() && child.same_markup(last) => {
            let merged = format!(
                "{}{}",
                last.text().unwrap_or_default(),
                child.text().unwrap_or_default()
            );
            let merged = child.with_text(merged);
            *target.last_mut().expect("target is non-empty") = merged;
        }
        _ => target.push(child),
    }
}

fn add_range(
    start: Option<&ResolvedPos>,
    end: Option<&ResolvedPos>,
    depth: usize,
    target: &mut Vec<Node>,
) {
    let node = end.or(start).expect("one bound is always given").node(depth);
    let mut start_index = 0;
    let end_index = match end {
        Some(end) => end.index(depth),
        None => node.child_count(),
    };
    if let Some(start) = start {
        start_index = start.index(depth);
        if start.depth() > depth {
            start_index += 1;
        } else if start.text_offset() > 0 {
            if let Some(after) = start.node_after() {
                add_node(after, target);
            }
            start_index += 1;
        }
    }
    for i in start_index..end_index {
        add_node(node.child(i).clone(), target);
    }
    if let Some(end) = end {
        if end.depth() == depth && end.text_offset() > 0 {
            if let Some(before) = end.node_before() {
                add_node(before, target);
            }
        }
    }
}

fn close(node: &Node, content: Fragment) -> Result<Node, ReplaceError> {
    if !node.node_type().valid_content(&content) {
        return Err(ReplaceError::InvalidContent {
            type_name: node.node_type().name().to_string(),
        });
    }
    Ok(node.copy(content))
}

fn replace_three_way(
    from: &ResolvedPos,
    start: &ResolvedPos,
    end: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let open_start = if from.depth() > depth {
        Some(joinable(from, start, depth + 1)?.clone())
    } else {
        None
    };
    let open_end = if to.depth() > depth {
        Some(joinable(end, to, depth + 1)?.clone())
    } else {
        None
    };

    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    match (&open_start, &open_end) {
        (Some(open_start), Some(open_end)) if start.index(depth) == end.index(depth) => {
            check_join(open_start, open_end)?;
            let inner = replace_three_way(from, start, end, to, depth + 1)?;
            add_node(close(open_start, inner)?, &mut content);
        }
        _ => {
            if let Some(open_start) = &open_start {
                let inner = replace_two_way(from, start, depth + 1)?;
                add_node(close(open_start, inner)?, &mut content);
            }
            add_range(Some(start), Some(end), depth, &mut content);
            if let Some(open_end) = &open_end {
                let inner = replace_two_way(end, to, depth + 1)?;
                add_node(close(open_end, inner)?, &mut content);
            }
        }
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

fn replace_two_way(
    from: &ResolvedPos,
    to: &ResolvedPos,
    depth: usize,
) -> Result<Fragment, ReplaceError> {
    let mut content = Vec::new();
    add_range(None, Some(from), depth, &mut content);
    if from.depth() > depth {
        let node = joinable(from, to, depth + 1)?.clone();
        let inner = replace_two_way(from, to, depth + 1)?;
        add_node(close(&node, inner)?, &mut content);
    }
    add_range(Some(to), None, depth, &mut content);
    Ok(Fragment::from_vec(content))
}

/// Wrap the slice's content in the ancestors of `along` down to where its
/// open start begins, then resolve the open boundary positions inside that
/// scaffolding
fn prepare_slice_for_replace(
    slice: &Slice,
    along: &ResolvedPos,
) -> Result<(ResolvedPos, ResolvedPos), ReplaceError> {
    let extra = along.depth() - slice.open_start();
    let parent = along.node(extra);
    let mut node = parent.copy(slice.content().clone());
    for depth in (0..extra).rev() {
        node = along.node(depth).copy(Fragment::from(node));
    }
    let start = node.resolve(slice.open_start() + extra)?;
    let end = node.resolve(node.content().size() - slice.open_end() - extra)?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use crate::error::ReplaceError;
    use crate::node::Node;
    use crate::slice::Slice;
    use crate::test_util::TestSchema;
    use serde_json::json;

    fn insert_text(ts: &TestSchema, doc: &Node, pos: usize, text: &str) -> Node {
        let slice = Slice::new(ts.text(text).into(), 0, 0);
        doc.replace(pos, pos, &slice).unwrap()
    }

    #[test]
    fn inserting_text_into_empty_paragraph() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![])]);
        let result = insert_text(&ts, &doc, 1, "ab");
        assert_eq!(
            result.to_json(),
            json!({
                "type": "doc",
                "content": [
                    {"type": "paragraph", "content": [{"type": "text", "text": "ab"}]}
                ]
            })
        );
        assert_eq!(result.content().size(), 4);
    }

    #[test]
    fn deleting_across_paragraphs_joins_them() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")]), ts.p(vec![ts.text("cd")])]);
        let result = doc.replace(2, 6, &Slice::empty()).unwrap();
        let expected = ts.doc(vec![ts.p(vec![ts.text("ad")])]);
        assert_eq!(result, expected);
    }

    #[test]
    fn replacing_with_open_slice_grafts_edges() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("abcd")])]);
        let source = ts.doc(vec![ts.p(vec![ts.text("xy")]), ts.p(vec![ts.text("zw")])]);
        // open at both ends: paragraph halves graft onto the target
        let slice = source.slice(2, 6).unwrap();
        assert_eq!(slice.open_start(), 1);
        assert_eq!(slice.open_end(), 1);
        let result = doc.replace(2, 4, &slice).unwrap();
        let expected = ts.doc(vec![ts.p(vec![ts.text("ay")]), ts.p(vec![ts.text("zd")])]);
        assert_eq!(result, expected);
    }

    #[test]
    fn open_depth_mismatch_is_rejected() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")])]);
        let bogus = Slice::new(ts.text("x").into(), 1, 0);
        // open_start of 1 at a depth-1 position makes the depths inconsistent
        assert!(matches!(
            doc.replace(0, 0, &bogus),
            Err(ReplaceError::OpenTooDeep) | Err(ReplaceError::InconsistentOpenDepths)
        ));
    }

    #[test]
    fn incompatible_join_is_rejected() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")]), ts.hr()]);
        // deleting from inside the paragraph to after the rule would need
        // to join a leaf onto a textblock
        let err = doc.replace(1, 5, &Slice::empty());
        assert!(err.is_err());
    }

    #[test]
    fn failed_replace_leaves_input_untouched() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")])]);
        let before = doc.to_json();
        let bogus = Slice::new(ts.text("x").into(), 1, 1);
        let _ = doc.replace(1, 1, &bogus);
        assert_eq!(doc.to_json(), before);
    }
}
