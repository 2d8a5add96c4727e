//! # Document Nodes
//!
//! A node is an immutable, schema-typed element of a document tree. Block
//! and inline nodes hold a [`Fragment`] of children; text nodes hold a
//! string instead. Every "mutation" returns a fresh node sharing untouched
//! subtrees with its predecessor, so any previously published document
//! version stays valid forever.
//!
//! Sizes follow the boundary-token model: a text node counts one unit per
//! character, any other leaf counts 1, and a parent counts its content
//! plus 2 for its open and close boundaries.

use crate::error::{RangeError, ReplaceError};
use crate::fragment::Fragment;
use crate::mark::{attrs_from_json, attrs_to_json, marks_from_json, Mark};
use crate::replace;
use crate::resolved_pos::ResolvedPos;
use crate::schema::{Attrs, NodeType, Schema};
use crate::slice::Slice;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Node {
    data: Arc<NodeData>,
}

struct NodeData {
    node_type: NodeType,
    attrs: Attrs,
    marks: Vec<Mark>,
    body: NodeBody,
}

enum NodeBody {
    Content(Fragment),
    // text plus its cached char count
    Text(String, usize),
}

impl Node {
    pub(crate) fn new(
        node_type: NodeType,
        attrs: Attrs,
        content: Fragment,
        marks: Vec<Mark>,
    ) -> Node {
        Node {
            data: Arc::new(NodeData {
                node_type,
                attrs,
                marks,
                body: NodeBody::Content(content),
            }),
        }
    }

    pub(crate) fn text_node(
        node_type: NodeType,
        attrs: Attrs,
        text: String,
        marks: Vec<Mark>,
    ) -> Node {
        let len = text.chars().count();
        Node {
            data: Arc::new(NodeData {
                node_type,
                attrs,
                marks,
                body: NodeBody::Text(text, len),
            }),
        }
    }

    pub fn node_type(&self) -> &NodeType {
        &self.data.node_type
    }

    pub fn attrs(&self) -> &Attrs {
        &self.data.attrs
    }

    pub fn marks(&self) -> &[Mark] {
        &self.data.marks
    }

    /// The node's text when this is a text node
    pub fn text(&self) -> Option<&str> {
        match &self.data.body {
            NodeBody::Text(text, _) => Some(text),
            NodeBody::Content(_) => None,
        }
    }

    /// The node's children; the empty fragment for text and leaf nodes
    pub fn content(&self) -> &Fragment {
        match &self.data.body {
            NodeBody::Content(content) => content,
            NodeBody::Text(..) => {
                static EMPTY: std::sync::OnceLock<Fragment> = std::sync::OnceLock::new();
                EMPTY.get_or_init(Fragment::empty)
            }
        }
    }

    /// Size in the position space: char count for text, 1 for other
    /// leaves, content size + 2 otherwise
    pub fn node_size(&self) -> usize {
        match &self.data.body {
            NodeBody::Text(_, len) => *len,
            NodeBody::Content(content) => {
                if self.is_leaf() {
                    1
                } else {
                    2 + content.size()
                }
            }
        }
    }

    pub fn child_count(&self) -> usize {
        self.content().child_count()
    }

    /// Child at an index; panics when out of bounds
    pub fn child(&self, index: usize) -> &Node {
        self.content().child(index)
    }

    pub fn maybe_child(&self, index: usize) -> Option<&Node> {
        self.content().maybe_child(index)
    }

    pub fn first_child(&self) -> Option<&Node> {
        self.content().first_child()
    }

    pub fn last_child(&self) -> Option<&Node> {
        self.content().last_child()
    }

    pub fn for_each(&self, mut f: impl FnMut(&Node, usize, usize)) {
        let mut pos = 0;
        for (i, child) in self.content().iter().enumerate() {
            f(child, pos, i);
            pos += child.node_size();
        }
    }

    /// Visit descendants intersecting the given range; the callback may
    /// return `false` to prevent descent into a node
    pub fn nodes_between(
        &self,
        from: usize,
        to: usize,
        f: &mut dyn FnMut(&Node, usize, Option<&Node>, usize) -> bool,
    ) {
        self.content().nodes_between(from, to, f, 0, Some(self));
    }

    pub fn text_between(&self, from: usize, to: usize, block_separator: Option<&str>) -> String {
        self.content().text_between(from, to, block_separator)
    }

    pub fn text_content(&self) -> String {
        match &self.data.body {
            NodeBody::Text(text, _) => text.clone(),
            NodeBody::Content(content) => content.text_between(0, content.size(), None),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self.data.body, NodeBody::Text(..))
    }

    pub fn is_block(&self) -> bool {
        self.node_type().is_block()
    }

    pub fn is_inline(&self) -> bool {
        self.node_type().is_inline()
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type().is_leaf()
    }

    pub fn is_atom(&self) -> bool {
        self.node_type().is_atom()
    }

    pub fn is_textblock(&self) -> bool {
        self.node_type().is_textblock()
    }

    /// A copy of this node with different content
    pub fn copy(&self, content: Fragment) -> Node {
        Node::new(
            self.data.node_type.clone(),
            self.data.attrs.clone(),
            content,
            self.data.marks.clone(),
        )
    }

    /// A copy of this node with a different mark set
    pub fn mark(&self, marks: Vec<Mark>) -> Node {
        if Mark::same_set(&marks, &self.data.marks) {
            return self.clone();
        }
        match &self.data.body {
            NodeBody::Text(text, _) => Node::text_node(
                self.data.node_type.clone(),
                self.data.attrs.clone(),
                text.clone(),
                marks,
            ),
            NodeBody::Content(content) => Node::new(
                self.data.node_type.clone(),
                self.data.attrs.clone(),
                content.clone(),
                marks,
            ),
        }
    }

    /// A copy of this text node carrying different text. Panics when
    /// called on a non-text node.
    pub fn with_text(&self, text: String) -> Node {
        match &self.data.body {
            NodeBody::Text(old, _) => {
                if *old == text {
                    self.clone()
                } else {
                    Node::text_node(
                        self.data.node_type.clone(),
                        self.data.attrs.clone(),
                        text,
                        self.data.marks.clone(),
                    )
                }
            }
            NodeBody::Content(_) => panic!("with_text called on a non-text node"),
        }
    }

    /// Cut this node's content between two positions (char offsets for
    /// text nodes)
    pub fn cut(&self, from: usize, to: usize) -> Node {
        match &self.data.body {
            NodeBody::Text(text, len) => {
                if from == 0 && to == *len {
                    self.clone()
                } else {
                    self.with_text(char_slice(text, from, to))
                }
            }
            NodeBody::Content(content) => {
                if from == 0 && to == content.size() {
                    self.clone()
                } else {
                    self.copy(content.cut(from, to))
                }
            }
        }
    }

    /// Extract the open-ended piece of the document between two positions
    pub fn slice(&self, from: usize, to: usize) -> Result<Slice, RangeError> {
        if from == to {
            return Ok(Slice::empty());
        }
        let rfrom = self.resolve(from)?;
        let rto = self.resolve(to)?;
        let depth = rfrom.shared_depth(to);
        let start = rfrom.start(depth);
        let node = rfrom.node(depth);
        let content = node.content().cut(rfrom.pos() - start, rto.pos() - start);
        Ok(Slice::new(
            content,
            rfrom.depth() - depth,
            rto.depth() - depth,
        ))
    }

    /// Replace the range between two positions with a slice, producing a
    /// new valid document
    pub fn replace(&self, from: usize, to: usize, slice: &Slice) -> Result<Node, ReplaceError> {
        let rfrom = self.resolve(from).map_err(ReplaceError::Range)?;
        let rto = self.resolve(to).map_err(ReplaceError::Range)?;
        replace::replace(&rfrom, &rto, slice)
    }

    /// The node directly at a position, if any
    pub fn node_at(&self, pos: usize) -> Result<Option<Node>, RangeError> {
        let mut node = self.clone();
        let mut pos = pos;
        loop {
            let (index, offset) = node.content().find_index(pos)?;
            let child = match node.maybe_child(index) {
                Some(child) => child.clone(),
                None => return Ok(None),
            };
            if offset == pos || child.is_text() {
                return Ok(Some(child));
            }
            node = child;
            pos = pos - offset - 1;
        }
    }

    /// Resolve an integer position into a full ancestor path
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos, RangeError> {
        ResolvedPos::resolve(self, pos)
    }

    /// Whether this node's markup (type, attrs, marks) matches another's
    pub fn same_markup(&self, other: &Node) -> bool {
        self.has_markup(other.node_type(), Some(other.attrs()), other.marks())
    }

    pub fn has_markup(&self, node_type: &NodeType, attrs: Option<&Attrs>, marks: &[Mark]) -> bool {
        self.node_type() == node_type
            && match attrs {
                Some(attrs) => &self.data.attrs == attrs,
                None => self
                    .node_type()
                    .default_attrs()
                    .map_or(self.data.attrs.is_empty(), |d| self.data.attrs == d),
            }
            && Mark::same_set(&self.data.marks, marks)
    }

    /// The content match state after the first `index` children
    pub fn content_match_at(
        &self,
        index: usize,
    ) -> Result<crate::content::ContentMatch, RangeError> {
        self.node_type()
            .content_match()
            .match_fragment_range(self.content(), 0, index)
            .ok_or_else(|| {
                RangeError::other("called content_match_at on a node with invalid content")
            })
    }

    /// Whether deleting the child range `from..to` leaves this node's
    /// content valid
    pub fn can_replace(&self, from: usize, to: usize) -> bool {
        self.can_replace_fragment(from, to, &Fragment::empty(), 0, 0)
    }

    /// Whether replacing child indices `from..to` with the given
    /// replacement fragment range leaves this node's content valid
    pub fn can_replace_fragment(
        &self,
        from: usize,
        to: usize,
        replacement: &Fragment,
        start: usize,
        end: usize,
    ) -> bool {
        let one = match self.content_match_at(from) {
            Ok(m) => m.match_fragment_range(replacement, start, end),
            Err(_) => return false,
        };
        let two = one.and_then(|m| m.match_fragment_range(self.content(), to, self.child_count()));
        match two {
            Some(m) if m.valid_end() => {}
            _ => return false,
        }
        for i in start..end {
            if !self.node_type().allows_marks(replacement.child(i).marks()) {
                return false;
            }
        }
        true
    }

    /// Whether a node of the given type could be inserted in place of the
    /// child range `from..to`
    pub fn can_replace_with(&self, from: usize, to: usize, node_type: &NodeType) -> bool {
        let start = match self.content_match_at(from) {
            Ok(m) => m.match_type(node_type),
            Err(_) => return false,
        };
        start
            .and_then(|m| m.match_fragment_range(self.content(), to, self.child_count()))
            .map_or(false, |m| m.valid_end())
    }

    /// Whether the given node's content could be appended to this node
    pub fn can_append(&self, other: &Node) -> bool {
        if other.content().size() > 0 {
            self.can_replace_fragment(
                self.child_count(),
                self.child_count(),
                other.content(),
                0,
                other.child_count(),
            )
        } else {
            self.node_type().compatible_content(other.node_type())
        }
    }

    /// Validate this node and all descendants against the schema
    pub fn check(&self) -> Result<(), RangeError> {
        if !self.node_type().valid_content(self.content()) {
            return Err(RangeError::other(format!(
                "invalid content for node {}: {}",
                self.node_type().name(),
                self.content()
            )));
        }
        let mut copy = Mark::none();
        for mark in self.marks() {
            copy = mark.add_to_set(&copy);
        }
        if !Mark::same_set(&copy, self.marks()) {
            return Err(RangeError::other(format!(
                "invalid collection of marks for node {}",
                self.node_type().name()
            )));
        }
        for child in self.content().iter() {
            child.check()?;
        }
        Ok(())
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.data) as *const () as usize
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "type".to_string(),
            Value::String(self.node_type().name().to_string()),
        );
        if !self.data.attrs.is_empty() {
            obj.insert("attrs".to_string(), attrs_to_json(&self.data.attrs));
        }
        match &self.data.body {
            NodeBody::Text(text, _) => {
                obj.insert("text".to_string(), Value::String(text.clone()));
            }
            NodeBody::Content(content) => {
                if content.size() > 0 {
                    obj.insert("content".to_string(), content.to_json());
                }
            }
        }
        if !self.data.marks.is_empty() {
            obj.insert(
                "marks".to_string(),
                Value::Array(self.data.marks.iter().map(Mark::to_json).collect()),
            );
        }
        Value::Object(obj)
    }

    pub fn from_json(schema: &Schema, value: &Value) -> Result<Node, RangeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RangeError::json("node", "expected an object"))?;
        let name = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| RangeError::json("node", "missing 'type' field"))?;
        let marks = marks_from_json(schema, obj.get("marks"))?;

        if name == schema.text_type().name() {
            let text = obj
                .get("text")
                .and_then(Value::as_str)
                .ok_or_else(|| RangeError::json("node", "text node missing 'text' field"))?;
            return schema.text_with_marks(text, marks);
        }

        let attrs = attrs_from_json(obj.get("attrs"))?;
        let content = Fragment::from_json(schema, obj.get("content"))?;
        schema
            .node_type(name)?
            .create(attrs.as_ref(), Some(content), marks)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.data, &other.data) {
            return true;
        }
        if !self.same_markup(other) {
            return false;
        }
        match (&self.data.body, &other.data.body) {
            (NodeBody::Text(a, _), NodeBody::Text(b, _)) => a == b,
            (NodeBody::Content(a), NodeBody::Content(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = match &self.data.body {
            NodeBody::Text(text, _) => format!("{:?}", text),
            NodeBody::Content(content) => {
                if content.size() > 0 {
                    format!(
                        "{}({})",
                        self.node_type().name(),
                        content
                            .iter()
                            .map(|n| n.to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    )
                } else {
                    self.node_type().name().to_string()
                }
            }
        };
        let mut wrapped = base;
        for mark in self.data.marks.iter().rev() {
            wrapped = format!("{}({})", mark.mark_type().name(), wrapped);
        }
        write!(f, "{}", wrapped)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Slice a string by char offsets
pub(crate) fn char_slice(s: &str, from: usize, to: usize) -> String {
    s.chars().skip(from).take(to.saturating_sub(from)).collect()
}

#[cfg(test)]
mod tests {
    use crate::node::Node;
    use crate::test_util::TestSchema;

    #[test]
    fn node_size_invariants() {
        let ts = TestSchema::new();
        let text = ts.text("abc");
        assert_eq!(text.node_size(), 3);

        let rule = ts.hr();
        assert!(rule.is_leaf());
        assert_eq!(rule.node_size(), 1);

        let para = ts.p(vec![ts.text("abc")]);
        assert_eq!(para.node_size(), 2 + para.content().size());
    }

    #[test]
    fn json_round_trip() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![
            ts.heading(2, vec![ts.text("title")]),
            ts.p(vec![
                ts.text("plain "),
                ts.marked_text("emphasis", vec![ts.em()]),
            ]),
            ts.hr(),
        ]);
        let json = doc.to_json();
        let back = Node::from_json(&ts.schema, &json).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn from_json_rejects_malformed_payloads() {
        let ts = TestSchema::new();
        assert!(Node::from_json(&ts.schema, &serde_json::json!({"type": "nope"})).is_err());
        assert!(Node::from_json(&ts.schema, &serde_json::json!({"type": "text"})).is_err());
        assert!(Node::from_json(&ts.schema, &serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn text_between_with_separator() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")]), ts.p(vec![ts.text("cd")])]);
        assert_eq!(
            doc.text_between(0, doc.content().size(), Some("\n")),
            "ab\ncd"
        );
    }

    #[test]
    fn node_at_finds_nested_nodes() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")])]);
        let found = doc.node_at(1).unwrap().unwrap();
        assert_eq!(found.text(), Some("ab"));
        let para = doc.node_at(0).unwrap().unwrap();
        assert!(para.is_textblock());
    }

    #[test]
    fn cut_on_text_uses_char_offsets() {
        let ts = TestSchema::new();
        let text = ts.text("héllo");
        assert_eq!(text.node_size(), 5);
        assert_eq!(text.cut(1, 3).text(), Some("él"));
    }

    #[test]
    fn check_validates_tree() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ok")])]);
        assert!(doc.check().is_ok());
    }
}
