use crate::error::RangeError;
use crate::node::{char_slice, Node};
use crate::schema::Schema;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// An immutable ordered sequence of sibling nodes with a cached total size.
/// Fragments are cheap to clone and share their child list; every
/// "mutating" operation returns a new fragment.
///
/// Invariant: adjacent text children carrying identical marks are always
/// merged into a single node.
#[derive(Clone)]
pub struct Fragment {
    data: Arc<FragmentData>,
}

struct FragmentData {
    children: Vec<Node>,
    size: usize,
}

static EMPTY: OnceLock<Fragment> = OnceLock::new();

impl Fragment {
    pub(crate) fn new(children: Vec<Node>, size: usize) -> Self {
        Self {
            data: Arc::new(FragmentData { children, size }),
        }
    }

    /// The shared empty fragment
    pub fn empty() -> Fragment {
        EMPTY
            .get_or_init(|| Fragment::new(Vec::new(), 0))
            .clone()
    }

    /// Build a fragment from a list of nodes, merging adjacent text nodes
    /// with the same marks
    pub fn from_vec(nodes: Vec<Node>) -> Fragment {
        if nodes.is_empty() {
            return Fragment::empty();
        }
        let mut size = 0;
        let mut joined: Option<Vec<Node>> = None;
        for (i, node) in nodes.iter().enumerate() {
            size += node.node_size();
            if i > 0 && node.is_text() && nodes[i - 1].same_markup(node) {
                let target = joined.get_or_insert_with(|| nodes[..i].to_vec());
                let last = target
                    .last()
                    .and_then(|n| n.text().map(str::to_string))
                    .unwrap_or_default();
                let merged_text = format!("{}{}", last, node.text().unwrap_or_default());
                let merged = node.with_text(merged_text);
                *target.last_mut().expect("joined is non-empty") = merged;
            } else if let Some(target) = joined.as_mut() {
                target.push(node.clone());
            }
        }
        Fragment::new(joined.unwrap_or(nodes), size)
    }

    pub fn size(&self) -> usize {
        self.data.size
    }

    pub fn child_count(&self) -> usize {
        self.data.children.len()
    }

    /// The child at the given index. Panics when the index is out of
    /// bounds; use [`Fragment::maybe_child`] for checked access.
    pub fn child(&self, index: usize) -> &Node {
        &self.data.children[index]
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.data.children.get(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.data.children.first()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.data.children.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.data.children.iter()
    }

    /// Append another fragment, merging a trailing and leading text node
    /// that share markup
    pub fn append(&self, other: &Fragment) -> Fragment {
        if other.size() == 0 {
            return self.clone();
        }
        if self.size() == 0 {
            return other.clone();
        }
        let last = self.last_child().expect("non-empty fragment");
        let first = other.first_child().expect("non-empty fragment");
        let mut content = self.data.children.clone();
        let mut skip = 0;
        if last.is_text() && last.same_markup(first) {
            let merged = format!(
                "{}{}",
                last.text().unwrap_or_default(),
                first.text().unwrap_or_default()
            );
            *content.last_mut().expect("non-empty fragment") = first.with_text(merged);
            skip = 1;
        }
        content.extend(other.data.children.iter().skip(skip).cloned());
        Fragment::new(content, self.size() + other.size())
    }

    /// Cut out the sub-fragment between two positions, slicing through
    /// partially covered children
    pub fn cut(&self, from: usize, to: usize) -> Fragment {
        if from == 0 && to == self.size() {
            return self.clone();
        }
        let mut result = Vec::new();
        let mut size = 0;
        if to > from {
            let mut pos = 0;
            for child in self.iter() {
                if pos >= to {
                    break;
                }
                let end = pos + child.node_size();
                if end > from {
                    let mut child = child.clone();
                    if pos < from || end > to {
                        if child.is_text() {
                            let len = child.node_size();
                            child = child.cut(from.saturating_sub(pos), to.saturating_sub(pos).min(len));
                        } else {
                            child = child.cut(
                                from.saturating_sub(pos + 1),
                                (to.saturating_sub(pos + 1)).min(child.content().size()),
                            );
                        }
                    }
                    size += child.node_size();
                    result.push(child);
                }
                pos = end;
            }
        }
        Fragment::new(result, size)
    }

    /// Cut out the children between two child indices
    pub fn cut_by_index(&self, from: usize, to: usize) -> Fragment {
        if from == to {
            return Fragment::empty();
        }
        if from == 0 && to == self.child_count() {
            return self.clone();
        }
        Fragment::from_vec(self.data.children[from..to].to_vec())
    }

    /// Replace the child at an index. Panics when the index is out of
    /// bounds.
    pub fn replace_child(&self, index: usize, node: Node) -> Fragment {
        if self.data.children[index] == node {
            return self.clone();
        }
        let mut children = self.data.children.clone();
        let size = self.size() + node.node_size() - children[index].node_size();
        children[index] = node;
        Fragment::new(children, size)
    }

    pub fn add_to_start(&self, node: Node) -> Fragment {
        let size = self.size() + node.node_size();
        let mut children = vec![node];
        children.extend(self.data.children.iter().cloned());
        Fragment::new(children, size)
    }

    pub fn add_to_end(&self, node: Node) -> Fragment {
        let size = self.size() + node.node_size();
        let mut children = self.data.children.clone();
        children.push(node);
        Fragment::new(children, size)
    }

    /// Find the child index covering a position, together with the offset
    /// at which that child starts. Exact boundary positions (including 0
    /// and `size`) resolve to the boundary index with `offset == pos`.
    pub fn find_index(&self, pos: usize) -> Result<(usize, usize), RangeError> {
        if pos == 0 {
            return Ok((0, 0));
        }
        if pos == self.size() {
            return Ok((self.child_count(), pos));
        }
        if pos > self.size() {
            return Err(RangeError::position(pos, self.size()));
        }
        let mut cur_pos = 0;
        for (i, child) in self.iter().enumerate() {
            let end = cur_pos + child.node_size();
            if end >= pos {
                if end == pos {
                    return Ok((i + 1, end));
                }
                return Ok((i, cur_pos));
            }
            cur_pos = end;
        }
        unreachable!("position within fragment size must land in a child")
    }

    /// Invoke a callback for every descendant node between two positions.
    /// The callback receives the node, its absolute position, its parent
    /// (when known) and its child index; returning `false` prevents
    /// descent into that node.
    pub fn nodes_between(
        &self,
        from: usize,
        to: usize,
        f: &mut dyn FnMut(&Node, usize, Option<&Node>, usize) -> bool,
        node_start: usize,
        parent: Option<&Node>,
    ) {
        let mut pos = 0;
        for (i, child) in self.iter().enumerate() {
            if pos >= to {
                break;
            }
            let end = pos + child.node_size();
            if end > from && f(child, node_start + pos, parent, i) && child.content().size() > 0 {
                let start = pos + 1;
                child.content().nodes_between(
                    from.saturating_sub(start),
                    to.saturating_sub(start).min(child.content().size()),
                    f,
                    node_start + start,
                    Some(child),
                );
            }
            pos = end;
        }
    }

    /// Concatenate the text between two positions, inserting the block
    /// separator (when given) between block-level nodes
    pub fn text_between(&self, from: usize, to: usize, block_separator: Option<&str>) -> String {
        let mut text = String::new();
        let mut first = true;
        self.nodes_between(
            from,
            to,
            &mut |node, pos, _parent, _index| {
                if let Some(node_text) = node.text() {
                    let start = from.saturating_sub(pos);
                    let end = (to - pos).min(node.node_size());
                    text.push_str(&char_slice(node_text, start, end));
                } else if node.is_block() && node.is_textblock() {
                    if let Some(sep) = block_separator {
                        if first {
                            first = false;
                        } else {
                            text.push_str(sep);
                        }
                    }
                }
                true
            },
            0,
            None,
        );
        text
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.iter().map(Node::to_json).collect())
    }

    /// Parse a fragment from a JSON array of nodes; `None`/null means the
    /// empty fragment
    pub fn from_json(schema: &Schema, value: Option<&Value>) -> Result<Fragment, RangeError> {
        match value {
            None | Some(Value::Null) => Ok(Fragment::empty()),
            Some(Value::Array(items)) => {
                let nodes = items
                    .iter()
                    .map(|item| Node::from_json(schema, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Fragment::from_vec(nodes))
            }
            Some(_) => Err(RangeError::json("fragment", "expected an array")),
        }
    }
}

impl PartialEq for Fragment {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
            || (self.data.children.len() == other.data.children.len()
                && self
                    .data
                    .children
                    .iter()
                    .zip(&other.data.children)
                    .all(|(a, b)| a == b))
    }
}

impl Eq for Fragment {}

impl Default for Fragment {
    fn default() -> Self {
        Fragment::empty()
    }
}

impl From<Node> for Fragment {
    fn from(node: Node) -> Self {
        let size = node.node_size();
        Fragment::new(vec![node], size)
    }
}

impl From<Vec<Node>> for Fragment {
    fn from(nodes: Vec<Node>) -> Self {
        Fragment::from_vec(nodes)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<")?;
        for (i, child) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", child)?;
        }
        write!(f, ">")
    }
}

impl fmt::Debug for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
