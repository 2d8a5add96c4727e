//! # Resolved Positions
//!
//! An integer offset into a document says little on its own; a resolved
//! position enriches it with the full chain of ancestors, the child index
//! at every level, and the residual offset inside the deepest node.
//! Resolved positions are created per query, immutable, and discarded
//! after use.

use crate::error::RangeError;
use crate::mark::Mark;
use crate::node::Node;

/// A resolved document position: a path of (ancestor, child index,
/// position before child) triples from the root down, plus the offset
/// into the deepest node.
#[derive(Clone, Debug)]
pub struct ResolvedPos {
    pos: usize,
    path: Vec<(Node, usize, usize)>,
    parent_offset: usize,
}

impl ResolvedPos {
    pub(crate) fn resolve(doc: &Node, pos: usize) -> Result<ResolvedPos, RangeError> {
        if pos > doc.content().size() {
            return Err(RangeError::position(pos, doc.content().size()));
        }
        let mut path = Vec::new();
        let mut start = 0;
        let mut parent_offset = pos;
        let mut node = doc.clone();
        loop {
            let (index, offset) = node.content().find_index(parent_offset)?;
            let rem = parent_offset - offset;
            path.push((node.clone(), index, start + offset));
            if rem == 0 {
                break;
            }
            let child = node.child(index).clone();
            if child.is_text() {
                break;
            }
            node = child;
            parent_offset = rem - 1;
            start += offset + 1;
        }
        Ok(ResolvedPos {
            pos,
            path,
            parent_offset,
        })
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// The number of levels the deepest ancestor sits below the root
    pub fn depth(&self) -> usize {
        self.path.len() - 1
    }

    /// Offset of this position into its parent node
    pub fn parent_offset(&self) -> usize {
        self.parent_offset
    }

    /// The deepest node the position points into
    pub fn parent(&self) -> &Node {
        self.node(self.depth())
    }

    /// The root document
    pub fn doc(&self) -> &Node {
        self.node(0)
    }

    /// The ancestor node at the given depth
    pub fn node(&self, depth: usize) -> &Node {
        &self.path[depth].0
    }

    /// The index into the ancestor at the given depth
    pub fn index(&self, depth: usize) -> usize {
        self.path[depth].1
    }

    /// The index just after this position at the given depth
    pub fn index_after(&self, depth: usize) -> usize {
        let index = self.index(depth);
        if depth == self.depth() && self.text_offset() == 0 {
            index
        } else {
            index + 1
        }
    }

    /// The position at the start of the node at the given depth
    pub fn start(&self, depth: usize) -> usize {
        if depth == 0 {
            0
        } else {
            self.path[depth - 1].2 + 1
        }
    }

    /// The position at the end of the node at the given depth
    pub fn end(&self, depth: usize) -> usize {
        self.start(depth) + self.node(depth).content().size()
    }

    /// The position directly before the node at the given depth
    pub fn before(&self, depth: usize) -> Result<usize, RangeError> {
        if depth == 0 {
            return Err(RangeError::other(
                "there is no position before the top-level node",
            ));
        }
        Ok(self.path[depth - 1].2)
    }

    /// The position directly after the node at the given depth
    pub fn after(&self, depth: usize) -> Result<usize, RangeError> {
        if depth == 0 {
            return Err(RangeError::other(
                "there is no position after the top-level node",
            ));
        }
        Ok(self.path[depth - 1].2 + self.node(depth).node_size())
    }

    /// When this position points into a text node, the offset into that
    /// node; zero otherwise
    pub fn text_offset(&self) -> usize {
        self.pos - self.path.last().expect("path is never empty").2
    }

    /// The node directly after the position, splitting text if the
    /// position points into a text node
    pub fn node_after(&self) -> Option<Node> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if index == parent.child_count() {
            return None;
        }
        let d_off = self.text_offset();
        let child = parent.child(index);
        if d_off > 0 {
            Some(child.cut(d_off, child.node_size()))
        } else {
            Some(child.clone())
        }
    }

    /// The node directly before the position
    pub fn node_before(&self) -> Option<Node> {
        let index = self.index(self.depth());
        let d_off = self.text_offset();
        if d_off > 0 {
            return Some(self.parent().child(index).cut(0, d_off));
        }
        if index == 0 {
            None
        } else {
            Some(self.parent().child(index - 1).clone())
        }
    }

    /// The position of the child at `index` in the ancestor at `depth`
    pub fn pos_at_index(&self, index: usize, depth: usize) -> usize {
        let node = self.node(depth);
        let mut pos = if depth == 0 {
            0
        } else {
            self.path[depth - 1].2 + 1
        };
        for i in 0..index {
            pos += node.child(i).node_size();
        }
        pos
    }

    /// The marks this position carries: those of the adjacent content,
    /// dropping non-inclusive marks not present on both sides
    pub fn marks(&self) -> Vec<Mark> {
        let parent = self.parent();
        let index = self.index(self.depth());
        if parent.content().size() == 0 {
            return Mark::none();
        }
        if self.text_offset() > 0 {
            return parent.child(index).marks().to_vec();
        }
        let before = if index == 0 {
            None
        } else {
            parent.maybe_child(index - 1)
        };
        let after = parent.maybe_child(index);
        let (main, other) = match before {
            Some(node) => (node, after),
            None => match after {
                Some(node) => (node, None),
                None => return Mark::none(),
            },
        };
        let mut marks = main.marks().to_vec();
        let mut i = 0;
        while i < marks.len() {
            let drop = !marks[i].mark_type().inclusive()
                && other.map_or(true, |o| !marks[i].is_in_set(o.marks()));
            if drop {
                marks.remove(i);
            } else {
                i += 1;
            }
        }
        marks
    }

    /// The deepest depth at which the node containing this position also
    /// contains the given position
    pub fn shared_depth(&self, pos: usize) -> usize {
        for depth in (1..=self.depth()).rev() {
            if self.start(depth) <= pos && self.end(depth) >= pos {
                return depth;
            }
        }
        0
    }

    /// Whether another position points into the same parent node
    pub fn same_parent(&self, other: &ResolvedPos) -> bool {
        self.pos - self.parent_offset == other.pos - other.parent_offset
    }

    pub fn max<'a>(&'a self, other: &'a ResolvedPos) -> &'a ResolvedPos {
        if other.pos > self.pos {
            other
        } else {
            self
        }
    }

    pub fn min<'a>(&'a self, other: &'a ResolvedPos) -> &'a ResolvedPos {
        if other.pos < self.pos {
            other
        } else {
            self
        }
    }

    /// The block range around this position and another one: the deepest
    /// node that fully contains both, optionally filtered by a predicate
    pub fn block_range(
        &self,
        other: &ResolvedPos,
        pred: Option<&dyn Fn(&Node) -> bool>,
    ) -> Option<NodeRange> {
        if other.pos < self.pos {
            return other.block_range(self, pred);
        }
        let skip = if self.parent().node_type().inline_content() || self.pos == other.pos {
            1
        } else {
            0
        };
        let mut depth = self.depth() as isize - skip as isize;
        while depth >= 0 {
            let d = depth as usize;
            if other.pos <= self.end(d) && pred.map_or(true, |p| p(self.node(d))) {
                return Some(NodeRange {
                    from: self.clone(),
                    to: other.clone(),
                    depth: d,
                });
            }
            depth -= 1;
        }
        None
    }
}

/// A range between two positions, pinned to the depth of an ancestor that
/// fully contains it
#[derive(Clone, Debug)]
pub struct NodeRange {
    from: ResolvedPos,
    to: ResolvedPos,
    depth: usize,
}

impl NodeRange {
    pub fn new(from: ResolvedPos, to: ResolvedPos, depth: usize) -> NodeRange {
        NodeRange { from, to, depth }
    }

    pub fn from(&self) -> &ResolvedPos {
        &self.from
    }

    pub fn to(&self) -> &ResolvedPos {
        &self.to
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn start(&self) -> usize {
        self.from
            .before(self.depth + 1)
            .expect("range depth is below the root")
    }

    pub fn end(&self) -> usize {
        self.to
            .after(self.depth + 1)
            .expect("range depth is below the root")
    }

    pub fn parent(&self) -> &Node {
        self.from.node(self.depth)
    }

    pub fn start_index(&self) -> usize {
        self.from.index(self.depth)
    }

    pub fn end_index(&self) -> usize {
        self.to.index_after(self.depth)
    }
}

/// A fixed-capacity rolling cache of resolved positions, keyed on document
/// identity and position. Owned explicitly by whoever wants one; purely an
/// optimization with no correctness dependency.
pub struct ResolveCache {
    entries: Vec<(usize, ResolvedPos)>,
    next: usize,
}

const RESOLVE_CACHE_SIZE: usize = 12;

impl ResolveCache {
    pub fn new() -> ResolveCache {
        ResolveCache {
            entries: Vec::with_capacity(RESOLVE_CACHE_SIZE),
            next: 0,
        }
    }

    pub fn resolve(&mut self, doc: &Node, pos: usize) -> Result<ResolvedPos, RangeError> {
        let identity = doc.identity();
        for (cached_doc, cached) in &self.entries {
            if *cached_doc == identity && cached.pos() == pos {
                return Ok(cached.clone());
            }
        }
        let resolved = doc.resolve(pos)?;
        if self.entries.len() < RESOLVE_CACHE_SIZE {
            self.entries.push((identity, resolved.clone()));
        } else {
            self.entries[self.next] = (identity, resolved.clone());
            self.next = (self.next + 1) % RESOLVE_CACHE_SIZE;
        }
        Ok(resolved)
    }
}

impl Default for ResolveCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_util::TestSchema;

    #[test]
    fn resolve_builds_ancestor_path() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")]), ts.p(vec![ts.text("cd")])]);
        let r = doc.resolve(6).unwrap();
        assert_eq!(r.depth(), 1);
        assert_eq!(r.parent().node_type().name(), "paragraph");
        assert_eq!(r.index(0), 1);
        assert_eq!(r.start(1), 5);
        assert_eq!(r.end(1), 7);
        assert_eq!(r.before(1).unwrap(), 4);
        assert_eq!(r.after(1).unwrap(), 8);
        assert_eq!(r.parent_offset(), 1);
    }

    #[test]
    fn resolve_rejects_out_of_range() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")])]);
        assert!(doc.resolve(5).is_err());
        assert!(doc.resolve(4).is_ok());
    }

    #[test]
    fn node_before_and_after_split_text() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("abcd")])]);
        let r = doc.resolve(3).unwrap();
        assert_eq!(r.node_before().unwrap().text(), Some("ab"));
        assert_eq!(r.node_after().unwrap().text(), Some("cd"));
        assert_eq!(r.text_offset(), 2);
    }

    #[test]
    fn shared_depth_finds_common_ancestor() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![
            ts.blockquote(vec![ts.p(vec![ts.text("ab")]), ts.p(vec![ts.text("cd")])]),
        ]);
        let r = doc.resolve(3).unwrap();
        assert_eq!(r.depth(), 2);
        assert_eq!(r.shared_depth(7), 1);
        assert_eq!(r.shared_depth(3), 2);
        assert_eq!(r.shared_depth(11), 0);
    }

    #[test]
    fn marks_drop_non_inclusive_at_edges() {
        let ts = TestSchema::new();
        // link is declared non-inclusive in the test schema
        let doc = ts.doc(vec![ts.p(vec![
            ts.marked_text("link", vec![ts.link("https://x")]),
            ts.text("after"),
        ])]);
        let inside = doc.resolve(3).unwrap();
        assert_eq!(inside.marks().len(), 1);
        let boundary = doc.resolve(5).unwrap();
        assert!(boundary.marks().is_empty());
    }

    #[test]
    fn block_range_spans_siblings() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")]), ts.p(vec![ts.text("cd")])]);
        let from = doc.resolve(1).unwrap();
        let to = doc.resolve(7).unwrap();
        let range = from.block_range(&to, None).unwrap();
        assert_eq!(range.depth(), 0);
        assert_eq!(range.start_index(), 0);
        assert_eq!(range.end_index(), 2);
        assert_eq!(range.start(), 0);
        assert_eq!(range.end(), 8);
    }

    #[test]
    fn resolve_cache_reuses_entries() {
        use super::ResolveCache;
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")])]);
        let mut cache = ResolveCache::new();
        let a = cache.resolve(&doc, 2).unwrap();
        let b = cache.resolve(&doc, 2).unwrap();
        assert_eq!(a.pos(), b.pos());
        assert_eq!(a.depth(), b.depth());
    }
}
