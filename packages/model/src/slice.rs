use crate::error::RangeError;
use crate::fragment::Fragment;
use crate::node::Node;
use crate::schema::Schema;
use serde_json::{Map, Value};
use std::fmt;

/// An excised piece of a document. `open_start` and `open_end` count how
/// many levels of nesting at each edge are not self-contained and rely on
/// being grafted onto surrounding content when the slice is inserted.
#[derive(Clone, PartialEq, Eq)]
pub struct Slice {
    content: Fragment,
    open_start: usize,
    open_end: usize,
}

impl Slice {
    pub fn new(content: Fragment, open_start: usize, open_end: usize) -> Slice {
        Slice {
            content,
            open_start,
            open_end,
        }
    }

    pub fn empty() -> Slice {
        Slice::new(Fragment::empty(), 0, 0)
    }

    pub fn content(&self) -> &Fragment {
        &self.content
    }

    pub fn open_start(&self) -> usize {
        self.open_start
    }

    pub fn open_end(&self) -> usize {
        self.open_end
    }

    /// The logical size: inserting the slice grows a document by this much
    pub fn size(&self) -> usize {
        self.content.size() - self.open_start - self.open_end
    }

    /// Insert a fragment at a position inside the slice's content,
    /// returning `None` when it does not fit there
    pub fn insert_at(&self, pos: usize, fragment: Fragment) -> Option<Slice> {
        let content = insert_into(&self.content, pos + self.open_start, &fragment, None)?;
        Some(Slice::new(content, self.open_start, self.open_end))
    }

    /// Remove a flat range from the slice's content
    pub fn remove_between(&self, from: usize, to: usize) -> Result<Slice, RangeError> {
        Ok(Slice::new(
            remove_range(&self.content, from + self.open_start, to + self.open_start)?,
            self.open_start,
            self.open_end,
        ))
    }

    /// Wrap a fragment in a slice maximally open at both sides
    pub fn max_open(fragment: Fragment, open_isolating: bool) -> Slice {
        let mut open_start = 0;
        let mut open_end = 0;
        let mut node = fragment.first_child().cloned();
        while let Some(n) = node {
            if n.is_leaf() || (!open_isolating && n.node_type().is_isolating()) {
                break;
            }
            open_start += 1;
            node = n.first_child().cloned();
        }
        let mut node = fragment.last_child().cloned();
        while let Some(n) = node {
            if n.is_leaf() || (!open_isolating && n.node_type().is_isolating()) {
                break;
            }
            open_end += 1;
            node = n.last_child().cloned();
        }
        Slice::new(fragment, open_start, open_end)
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if self.content.size() > 0 {
            obj.insert("content".to_string(), self.content.to_json());
        }
        if self.open_start > 0 {
            obj.insert("openStart".to_string(), Value::from(self.open_start));
        }
        if self.open_end > 0 {
            obj.insert("openEnd".to_string(), Value::from(self.open_end));
        }
        Value::Object(obj)
    }

    pub fn from_json(schema: &Schema, value: &Value) -> Result<Slice, RangeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| RangeError::json("slice", "expected an object"))?;
        let open_start = json_open(obj.get("openStart"), "openStart")?;
        let open_end = json_open(obj.get("openEnd"), "openEnd")?;
        let content = Fragment::from_json(schema, obj.get("content"))?;
        if open_start + open_end > content.size() {
            return Err(RangeError::json("slice", "open depths exceed content size"));
        }
        Ok(Slice::new(content, open_start, open_end))
    }
}

fn json_open(value: Option<&Value>, field: &'static str) -> Result<usize, RangeError> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| RangeError::json("slice", format!("invalid '{}' field", field))),
    }
}

fn insert_into(
    content: &Fragment,
    dist: usize,
    insert: &Fragment,
    parent: Option<&Node>,
) -> Option<Fragment> {
    let (index, offset) = content.find_index(dist).ok()?;
    let child = content.maybe_child(index);
    if offset == dist || child.map_or(false, Node::is_text) {
        if let Some(parent) = parent {
            if !parent.can_replace_fragment(index, index, insert, 0, insert.child_count()) {
                return None;
            }
        }
        return Some(content.cut(0, dist).append(insert).append(&content.cut(dist, content.size())));
    }
    let child = child?;
    let inner = insert_into(child.content(), dist - offset - 1, insert, Some(child))?;
    Some(content.replace_child(index, child.copy(inner)))
}

fn remove_range(content: &Fragment, from: usize, to: usize) -> Result<Fragment, RangeError> {
    let (index, offset) = content.find_index(from)?;
    let child = content.maybe_child(index);
    let (index_to, offset_to) = content.find_index(to)?;
    if offset == from || child.map_or(false, |c| c.is_text()) {
        if offset_to != to && !content.child(index_to).is_text() {
            return Err(RangeError::other("removing non-flat range"));
        }
        return Ok(content.cut(0, from).append(&content.cut(to, content.size())));
    }
    if index != index_to {
        return Err(RangeError::other("removing non-flat range"));
    }
    let child = content.child(index);
    Ok(content.replace_child(
        index,
        child.copy(remove_range(child.content(), from - offset - 1, to - offset - 1)?),
    ))
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({},{})", self.content, self.open_start, self.open_end)
    }
}

impl fmt::Debug for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::Slice;
    use crate::fragment::Fragment;
    use crate::test_util::TestSchema;

    #[test]
    fn logical_size_subtracts_open_depths() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")]), ts.p(vec![ts.text("cd")])]);
        // from inside the first paragraph to inside the second
        let slice = doc.slice(2, 6).unwrap();
        assert_eq!(slice.open_start(), 1);
        assert_eq!(slice.open_end(), 1);
        assert_eq!(slice.size(), slice.content().size() - 2);
        assert_eq!(slice.size(), 4);
    }

    #[test]
    fn json_round_trip() {
        let ts = TestSchema::new();
        let doc = ts.doc(vec![ts.p(vec![ts.text("ab")]), ts.p(vec![ts.text("cd")])]);
        let slice = doc.slice(2, 6).unwrap();
        let back = Slice::from_json(&ts.schema, &slice.to_json()).unwrap();
        assert_eq!(slice, back);
    }

    #[test]
    fn empty_slice_json_defaults() {
        let ts = TestSchema::new();
        let parsed = Slice::from_json(&ts.schema, &serde_json::json!({})).unwrap();
        assert_eq!(parsed, Slice::empty());
    }

    #[test]
    fn max_open_stops_at_leaves() {
        let ts = TestSchema::new();
        let frag = Fragment::from(ts.blockquote(vec![ts.p(vec![ts.text("x")])]));
        let slice = Slice::max_open(frag, true);
        assert_eq!(slice.open_start(), 2);
        assert_eq!(slice.open_end(), 2);
    }
}
