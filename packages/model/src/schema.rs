//! # Schema
//!
//! Static, per-document-family configuration: which node and mark types
//! exist, their attributes, which marks nest inside which nodes, and the
//! compiled content automaton for every node type. A schema is built once
//! with [`Schema::compile`] and shared read-only by every document of that
//! family; compilation fails fast, there is no partial or degraded schema.

use crate::content::{self, ContentMatch, StateData};
use crate::error::{RangeError, SchemaError};
use crate::expr;
use crate::fragment::Fragment;
use crate::mark::Mark;
use crate::node::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Attribute values attached to a node or mark, ordered by name
pub type Attrs = Arc<BTreeMap<String, Value>>;

/// Descriptor for one attribute of a node or mark type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    /// Default value; attributes without a default are required
    pub default: Option<Value>,
}

/// Declaration of a node type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Content expression over child type and group names
    pub content: Option<String>,
    /// Space-separated mark types/groups allowed inside; `"_"` for all,
    /// `""` for none. Defaults to all for inline-content nodes, none
    /// otherwise.
    pub marks: Option<String>,
    /// Space-separated group names this type belongs to
    pub group: Option<String>,
    pub inline: bool,
    pub atom: bool,
    /// Attribute descriptors in declaration order
    pub attrs: Vec<(String, AttributeSpec)>,
    /// Isolating nodes act as boundaries for lifting and joining
    pub isolating: bool,
}

/// Declaration of a mark type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkSpec {
    pub attrs: Vec<(String, AttributeSpec)>,
    /// Whether the mark sticks to content typed at its end (default true)
    pub inclusive: Option<bool>,
    /// Space-separated mark types/groups this mark displaces; defaults to
    /// the mark's own type
    pub excludes: Option<String>,
    pub group: Option<String>,
}

/// Declaration of a complete schema. Node and mark order is significant:
/// it fixes automaton edge order and mark ranks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub nodes: Vec<(String, NodeSpec)>,
    pub marks: Vec<(String, MarkSpec)>,
    /// Name of the top node type; defaults to `"doc"`
    pub top_node: Option<String>,
}

pub(crate) struct NodeTypeData {
    pub(crate) name: String,
    pub(crate) groups: Vec<String>,
    pub(crate) attrs: Vec<(String, AttributeSpec)>,
    pub(crate) default_attrs: Option<Attrs>,
    pub(crate) has_required_attrs: bool,
    pub(crate) content_start: usize,
    pub(crate) inline: bool,
    pub(crate) is_text: bool,
    pub(crate) is_leaf: bool,
    pub(crate) atom: bool,
    pub(crate) isolating: bool,
    pub(crate) inline_content: bool,
    /// Allowed mark type ids; `None` allows every mark
    pub(crate) mark_set: Option<Vec<usize>>,
}

pub(crate) struct MarkTypeData {
    pub(crate) name: String,
    pub(crate) attrs: Vec<(String, AttributeSpec)>,
    pub(crate) default_attrs: Option<Attrs>,
    pub(crate) inclusive: bool,
    pub(crate) groups: Vec<String>,
    pub(crate) excluded: Vec<usize>,
}

pub(crate) struct SchemaData {
    pub(crate) spec: SchemaSpec,
    pub(crate) nodes: Vec<NodeTypeData>,
    pub(crate) node_index: HashMap<String, usize>,
    pub(crate) marks: Vec<MarkTypeData>,
    pub(crate) mark_index: HashMap<String, usize>,
    pub(crate) states: Vec<StateData>,
    pub(crate) top_node: usize,
    pub(crate) text_type: usize,
    // memoized find_wrapping results, (state, target type) -> chain
    wrap_cache: RwLock<HashMap<(usize, usize), Option<Vec<usize>>>>,
}

/// A compiled schema. Cheap to clone; all clones share the same data.
#[derive(Clone)]
pub struct Schema {
    data: Arc<SchemaData>,
}

impl Schema {
    /// Compile a schema spec, failing fast on any invalid declaration
    pub fn compile(spec: SchemaSpec) -> Result<Schema, SchemaError> {
        let top_name = spec.top_node.clone().unwrap_or_else(|| "doc".to_string());

        // node type table
        let mut nodes = Vec::with_capacity(spec.nodes.len());
        let mut node_index = HashMap::new();
        for (name, node_spec) in &spec.nodes {
            if node_index.insert(name.clone(), nodes.len()).is_some() {
                return Err(SchemaError::DuplicateNodeType(name.clone()));
            }
            let is_text = name == "text";
            let (default_attrs, has_required_attrs) = attr_defaults(&node_spec.attrs);
            nodes.push(NodeTypeData {
                name: name.clone(),
                groups: split_names(node_spec.group.as_deref()),
                attrs: node_spec.attrs.clone(),
                default_attrs,
                has_required_attrs,
                content_start: 0,
                inline: node_spec.inline || is_text,
                is_text,
                is_leaf: true,
                atom: node_spec.atom,
                isolating: node_spec.isolating,
                inline_content: false,
                mark_set: None,
            });
        }

        let top_node = *node_index
            .get(&top_name)
            .ok_or(SchemaError::MissingTopNode(top_name))?;
        let text_type = *node_index
            .get("text")
            .ok_or(SchemaError::MissingTextType)?;
        if !nodes[text_type].attrs.is_empty() {
            return Err(SchemaError::TextTypeAttrs);
        }

        // mark type table
        let mut marks = Vec::with_capacity(spec.marks.len());
        let mut mark_index = HashMap::new();
        for (name, mark_spec) in &spec.marks {
            if mark_index.insert(name.clone(), marks.len()).is_some() {
                return Err(SchemaError::DuplicateMarkType(name.clone()));
            }
            let (default_attrs, _) = attr_defaults(&mark_spec.attrs);
            marks.push(MarkTypeData {
                name: name.clone(),
                attrs: mark_spec.attrs.clone(),
                default_attrs,
                inclusive: mark_spec.inclusive.unwrap_or(true),
                groups: split_names(mark_spec.group.as_deref()),
                excluded: Vec::new(),
            });
        }
        for (id, (name, mark_spec)) in spec.marks.iter().enumerate() {
            let excluded = match mark_spec.excludes.as_deref() {
                None => vec![id],
                Some("") => Vec::new(),
                Some(names) => gather_marks(name, names, &marks, &mark_index)?,
            };
            marks[id].excluded = excluded;
        }

        // group name -> member type ids, declaration order
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (id, node) in nodes.iter().enumerate() {
            for group in &node.groups {
                groups.entry(group.clone()).or_default().push(id);
            }
        }

        // compile one automaton per distinct content expression
        let mut states = Vec::new();
        let empty = content::empty_state(&mut states);
        let inline_flags: Vec<bool> = nodes.iter().map(|n| n.inline).collect();
        let mut expr_cache: HashMap<String, (usize, bool)> = HashMap::new();
        let mut compiled = Vec::with_capacity(nodes.len());
        for (id, (name, node_spec)) in spec.nodes.iter().enumerate() {
            let content_str = node_spec.content.as_deref().unwrap_or("").trim();
            if id == text_type || content_str.is_empty() {
                compiled.push((empty, false, true));
                continue;
            }
            let (start, inline_content) = match expr_cache.get(content_str) {
                Some(&cached) => cached,
                None => {
                    let parsed =
                        expr::parse(content_str).map_err(|source| SchemaError::Content {
                            type_name: name.clone(),
                            source,
                        })?;
                    let resolve = |n: &str| -> Option<Vec<usize>> {
                        node_index
                            .get(n)
                            .map(|&i| vec![i])
                            .or_else(|| groups.get(n).cloned())
                    };
                    let inline_of = |i: usize| inline_flags[i];
                    let result = content::compile_expr(
                        &parsed,
                        name,
                        &resolve,
                        &inline_of,
                        &mut states,
                    )?;
                    expr_cache.insert(content_str.to_string(), result);
                    result
                }
            };
            compiled.push((start, inline_content, false));
        }
        for (id, (start, inline_content, is_leaf)) in compiled.into_iter().enumerate() {
            nodes[id].content_start = start;
            nodes[id].inline_content = inline_content;
            nodes[id].is_leaf = is_leaf;
        }

        // a reachable state that only continues through non-generatable
        // types can never be satisfied by filling
        let generatable =
            |id: usize| !(nodes[id].is_text || nodes[id].has_required_attrs);
        for (id, node) in nodes.iter().enumerate() {
            if node.is_leaf {
                continue;
            }
            if let Err(type_ids) =
                content::check_dead_ends(node.content_start, &states, &generatable)
            {
                return Err(SchemaError::DeadContent {
                    type_name: nodes[id].name.clone(),
                    names: type_ids
                        .iter()
                        .map(|&t| nodes[t].name.clone())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        // allowed marks per node type
        for (id, (name, node_spec)) in spec.nodes.iter().enumerate() {
            let mark_set = match node_spec.marks.as_deref() {
                Some("_") => None,
                Some("") => Some(Vec::new()),
                Some(names) => Some(gather_marks(name, names, &marks, &mark_index)?),
                None => {
                    if nodes[id].inline_content {
                        None
                    } else {
                        Some(Vec::new())
                    }
                }
            };
            nodes[id].mark_set = mark_set;
        }

        debug!(
            nodes = nodes.len(),
            marks = marks.len(),
            states = states.len(),
            "compiled schema"
        );

        Ok(Schema {
            data: Arc::new(SchemaData {
                spec,
                nodes,
                node_index,
                marks,
                mark_index,
                states,
                top_node,
                text_type,
                wrap_cache: RwLock::new(HashMap::new()),
            }),
        })
    }

    pub fn spec(&self) -> &SchemaSpec {
        &self.data.spec
    }

    /// Look up a node type by name
    pub fn node_type(&self, name: &str) -> Result<NodeType, RangeError> {
        self.data
            .node_index
            .get(name)
            .map(|&id| self.node_type_by_id(id))
            .ok_or_else(|| RangeError::UnknownNodeType(name.to_string()))
    }

    /// Look up a mark type by name
    pub fn mark_type(&self, name: &str) -> Result<MarkType, RangeError> {
        self.data
            .mark_index
            .get(name)
            .map(|&id| MarkType {
                schema: self.clone(),
                id,
            })
            .ok_or_else(|| RangeError::UnknownMarkType(name.to_string()))
    }

    pub fn top_node_type(&self) -> NodeType {
        self.node_type_by_id(self.data.top_node)
    }

    pub fn text_type(&self) -> NodeType {
        self.node_type_by_id(self.data.text_type)
    }

    /// Create a node of the named type
    pub fn node(
        &self,
        name: &str,
        attrs: Option<&BTreeMap<String, Value>>,
        content: Option<Fragment>,
        marks: Vec<Mark>,
    ) -> Result<Node, RangeError> {
        self.node_type(name)?.create(attrs, content, marks)
    }

    /// Create a text node. Empty text nodes are not allowed.
    pub fn text(&self, text: impl Into<String>) -> Result<Node, RangeError> {
        self.text_with_marks(text, Mark::none())
    }

    pub fn text_with_marks(
        &self,
        text: impl Into<String>,
        marks: Vec<Mark>,
    ) -> Result<Node, RangeError> {
        let text = text.into();
        if text.is_empty() {
            return Err(RangeError::other("empty text nodes are not allowed"));
        }
        Ok(Node::text_node(
            self.text_type(),
            Attrs::default(),
            text,
            Mark::set_from(marks),
        ))
    }

    pub(crate) fn node_type_by_id(&self, id: usize) -> NodeType {
        NodeType {
            schema: self.clone(),
            id,
        }
    }

    pub(crate) fn node_data(&self, id: usize) -> &NodeTypeData {
        &self.data.nodes[id]
    }

    pub(crate) fn mark_data(&self, id: usize) -> &MarkTypeData {
        &self.data.marks[id]
    }

    pub(crate) fn state_data(&self, id: usize) -> &StateData {
        &self.data.states[id]
    }

    pub(crate) fn wrap_cache_get(&self, key: &(usize, usize)) -> Option<Option<Vec<usize>>> {
        let cache = self
            .data
            .wrap_cache
            .read()
            .unwrap_or_else(|e| e.into_inner());
        cache.get(key).cloned()
    }

    pub(crate) fn wrap_cache_put(&self, key: (usize, usize), value: Option<Vec<usize>>) {
        let mut cache = self
            .data
            .wrap_cache
            .write()
            .unwrap_or_else(|e| e.into_inner());
        cache.insert(key, value);
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Schema(nodes: [{}], marks: [{}])",
            self.data
                .nodes
                .iter()
                .map(|n| n.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            self.data
                .marks
                .iter()
                .map(|m| m.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

/// An immutable node type handle; one instance per (schema, type name)
#[derive(Clone)]
pub struct NodeType {
    schema: Schema,
    id: usize,
}

impl NodeType {
    fn data(&self) -> &NodeTypeData {
        self.schema.node_data(self.id)
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn groups(&self) -> &[String] {
        &self.data().groups
    }

    pub fn is_in_group(&self, group: &str) -> bool {
        self.data().groups.iter().any(|g| g == group)
    }

    pub fn is_text(&self) -> bool {
        self.data().is_text
    }

    pub fn is_inline(&self) -> bool {
        self.data().inline
    }

    pub fn is_block(&self) -> bool {
        !self.data().inline
    }

    pub fn is_leaf(&self) -> bool {
        self.data().is_leaf
    }

    pub fn is_atom(&self) -> bool {
        self.data().is_leaf || self.data().atom
    }

    /// Whether this is a block type holding inline content
    pub fn is_textblock(&self) -> bool {
        self.is_block() && self.data().inline_content
    }

    pub fn inline_content(&self) -> bool {
        self.data().inline_content
    }

    pub fn is_isolating(&self) -> bool {
        self.data().isolating
    }

    pub fn has_required_attrs(&self) -> bool {
        self.data().has_required_attrs
    }

    pub fn default_attrs(&self) -> Option<Attrs> {
        self.data().default_attrs.clone()
    }

    /// The start state of this type's content automaton
    pub fn content_match(&self) -> ContentMatch {
        ContentMatch::new(self.schema.clone(), self.data().content_start)
    }

    /// Create a node of this type, validating and defaulting attributes
    pub fn create(
        &self,
        attrs: Option<&BTreeMap<String, Value>>,
        content: Option<Fragment>,
        marks: Vec<Mark>,
    ) -> Result<Node, RangeError> {
        if self.is_text() {
            return Err(RangeError::other(
                "NodeType::create cannot construct text nodes",
            ));
        }
        let attrs = compute_attrs(&self.data().name, &self.data().attrs, self.default_attrs(), attrs)?;
        Ok(Node::new(
            self.clone(),
            attrs,
            content.unwrap_or_default(),
            Mark::set_from(marks),
        ))
    }

    /// Like [`NodeType::create`], but also validates the content
    pub fn create_checked(
        &self,
        attrs: Option<&BTreeMap<String, Value>>,
        content: Option<Fragment>,
        marks: Vec<Mark>,
    ) -> Result<Node, RangeError> {
        let node = self.create(attrs, content, marks)?;
        if !self.valid_content(node.content()) {
            return Err(RangeError::other(format!(
                "invalid content for node {}",
                self.name()
            )));
        }
        Ok(node)
    }

    /// Create a node, growing the given content with automaton-derived
    /// filler until it is valid. Returns `None` when no valid node of this
    /// type can be built around the content.
    pub fn create_and_fill(
        &self,
        attrs: Option<&BTreeMap<String, Value>>,
        content: Option<Fragment>,
        marks: Vec<Mark>,
    ) -> Option<Node> {
        let attrs =
            compute_attrs(&self.data().name, &self.data().attrs, self.default_attrs(), attrs)
                .ok()?;
        let mut content = content.unwrap_or_default();
        if content.size() > 0 {
            let before = self.content_match().fill_before(&content, false, 0)?;
            content = before.append(&content);
        }
        let matched = self.content_match().match_fragment(&content)?;
        let after = matched.fill_before(&Fragment::empty(), true, 0)?;
        Some(Node::new(
            self.clone(),
            attrs,
            content.append(&after),
            Mark::set_from(marks),
        ))
    }

    /// Whether a fragment is valid content for this type, including its
    /// marks
    pub fn valid_content(&self, content: &Fragment) -> bool {
        match self.content_match().match_fragment(content) {
            Some(m) if m.valid_end() => {}
            _ => return false,
        }
        content.iter().all(|child| self.allows_marks(child.marks()))
    }

    pub fn allows_mark_type(&self, mark_type: &MarkType) -> bool {
        match &self.data().mark_set {
            None => true,
            Some(set) => set.contains(&mark_type.id),
        }
    }

    pub fn allows_marks(&self, marks: &[Mark]) -> bool {
        marks.iter().all(|m| self.allows_mark_type(m.mark_type()))
    }

    /// Whether content valid in `other` could appear in this type
    pub fn compatible_content(&self, other: &NodeType) -> bool {
        self == other || self.content_match().compatible(&other.content_match())
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.id == other.id
    }
}

impl Eq for NodeType {}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeType({})", self.name())
    }
}

/// An immutable mark type handle
#[derive(Clone)]
pub struct MarkType {
    schema: Schema,
    id: usize,
}

impl MarkType {
    fn data(&self) -> &MarkTypeData {
        self.schema.mark_data(self.id)
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// Mark rank: the declaration index, which fixes set ordering
    pub fn rank(&self) -> usize {
        self.id
    }

    pub fn inclusive(&self) -> bool {
        self.data().inclusive
    }

    pub fn create(&self, attrs: Option<&BTreeMap<String, Value>>) -> Result<Mark, RangeError> {
        let attrs = compute_attrs(
            &self.data().name,
            &self.data().attrs,
            self.data().default_attrs.clone(),
            attrs,
        )?;
        Ok(Mark::new(self.clone(), attrs))
    }

    /// Whether adding this mark removes marks of the other type
    pub fn excludes(&self, other: &MarkType) -> bool {
        self.data().excluded.contains(&other.id)
    }

    /// Find a mark of this type in a set
    pub fn find_in_set<'a>(&self, set: &'a [Mark]) -> Option<&'a Mark> {
        set.iter().find(|m| m.mark_type() == self)
    }
}

impl PartialEq for MarkType {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.id == other.id
    }
}

impl Eq for MarkType {}

impl fmt::Debug for MarkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkType({})", self.name())
    }
}

fn split_names(names: Option<&str>) -> Vec<String> {
    names
        .map(|s| s.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn attr_defaults(attrs: &[(String, AttributeSpec)]) -> (Option<Attrs>, bool) {
    let mut defaults = BTreeMap::new();
    for (name, spec) in attrs {
        match &spec.default {
            Some(value) => {
                defaults.insert(name.clone(), value.clone());
            }
            None => return (None, true),
        }
    }
    (Some(Arc::new(defaults)), false)
}

fn compute_attrs(
    type_name: &str,
    specs: &[(String, AttributeSpec)],
    default_attrs: Option<Attrs>,
    given: Option<&BTreeMap<String, Value>>,
) -> Result<Attrs, RangeError> {
    let given = match given {
        None => {
            return default_attrs.ok_or_else(|| {
                let attr = specs
                    .iter()
                    .find(|(_, s)| s.default.is_none())
                    .map(|(n, _)| n.clone())
                    .unwrap_or_default();
                RangeError::MissingAttr {
                    type_name: type_name.to_string(),
                    attr,
                }
            });
        }
        Some(given) => given,
    };
    for name in given.keys() {
        if !specs.iter().any(|(n, _)| n == name) {
            return Err(RangeError::UnknownAttr {
                type_name: type_name.to_string(),
                attr: name.clone(),
            });
        }
    }
    let mut built = BTreeMap::new();
    for (name, spec) in specs {
        let value = match given.get(name) {
            Some(value) => value.clone(),
            None => match &spec.default {
                Some(value) => value.clone(),
                None => {
                    return Err(RangeError::MissingAttr {
                        type_name: type_name.to_string(),
                        attr: name.clone(),
                    })
                }
            },
        };
        built.insert(name.clone(), value);
    }
    Ok(Arc::new(built))
}

fn gather_marks(
    referrer: &str,
    names: &str,
    marks: &[MarkTypeData],
    mark_index: &HashMap<String, usize>,
) -> Result<Vec<usize>, SchemaError> {
    let mut found = Vec::new();
    for name in names.split_whitespace() {
        if name == "_" {
            found.extend(0..marks.len());
            continue;
        }
        if let Some(&id) = mark_index.get(name) {
            found.push(id);
            continue;
        }
        let members: Vec<usize> = marks
            .iter()
            .enumerate()
            .filter(|(_, m)| m.groups.iter().any(|g| g == name))
            .map(|(id, _)| id)
            .collect();
        if members.is_empty() {
            return Err(SchemaError::UnknownMark {
                referrer: referrer.to_string(),
                name: name.to_string(),
            });
        }
        found.extend(members);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::{AttributeSpec, MarkSpec, NodeSpec, Schema, SchemaSpec};
    use crate::error::SchemaError;
    use crate::test_util::TestSchema;
    use serde_json::json;

    fn node(content: &str, group: Option<&str>) -> NodeSpec {
        NodeSpec {
            content: if content.is_empty() {
                None
            } else {
                Some(content.to_string())
            },
            group: group.map(str::to_string),
            ..NodeSpec::default()
        }
    }

    #[test]
    fn compile_requires_top_and_text_types() {
        let missing_doc = SchemaSpec {
            nodes: vec![("text".to_string(), node("", Some("inline")))],
            ..SchemaSpec::default()
        };
        assert!(matches!(
            Schema::compile(missing_doc),
            Err(SchemaError::MissingTopNode(_))
        ));

        let missing_text = SchemaSpec {
            nodes: vec![("doc".to_string(), node("block+", None))],
            ..SchemaSpec::default()
        };
        assert!(matches!(
            Schema::compile(missing_text),
            Err(SchemaError::MissingTextType)
        ));
    }

    #[test]
    fn compile_rejects_text_attrs() {
        let mut text_spec = node("", Some("inline"));
        text_spec.attrs = vec![("weird".to_string(), AttributeSpec::default())];
        let spec = SchemaSpec {
            nodes: vec![
                ("doc".to_string(), node("text*", None)),
                ("text".to_string(), text_spec),
            ],
            ..SchemaSpec::default()
        };
        assert!(matches!(
            Schema::compile(spec),
            Err(SchemaError::TextTypeAttrs)
        ));
    }

    #[test]
    fn compile_rejects_unknown_content_names() {
        let spec = SchemaSpec {
            nodes: vec![
                ("doc".to_string(), node("mystery+", None)),
                ("text".to_string(), node("", None)),
            ],
            ..SchemaSpec::default()
        };
        assert!(matches!(
            Schema::compile(spec),
            Err(SchemaError::UnknownContentName { .. })
        ));
    }

    #[test]
    fn compile_rejects_mixed_inline_and_block() {
        let spec = SchemaSpec {
            nodes: vec![
                ("doc".to_string(), node("paragraph text*", None)),
                ("paragraph".to_string(), node("text*", None)),
                ("text".to_string(), node("", None)),
            ],
            ..SchemaSpec::default()
        };
        assert!(matches!(
            Schema::compile(spec),
            Err(SchemaError::MixedContent { .. })
        ));
    }

    #[test]
    fn compile_rejects_dead_required_positions() {
        // the only way to satisfy doc's content is a node with a required
        // attribute, which cannot be generated automatically
        let mut figure = node("", Some("block"));
        figure.attrs = vec![("src".to_string(), AttributeSpec::default())];
        let spec = SchemaSpec {
            nodes: vec![
                ("doc".to_string(), node("figure+", None)),
                ("figure".to_string(), figure),
                ("text".to_string(), node("", Some("inline"))),
            ],
            ..SchemaSpec::default()
        };
        assert!(matches!(
            Schema::compile(spec),
            Err(SchemaError::DeadContent { .. })
        ));
    }

    #[test]
    fn create_defaults_and_validates_attrs() {
        let ts = TestSchema::new();
        let heading = ts.schema.node_type("heading").unwrap();
        let with_default = heading.create(None, None, vec![]).unwrap();
        assert_eq!(with_default.attrs().get("level"), Some(&json!(1)));

        let given = [("level".to_string(), json!(3))].into_iter().collect();
        let explicit = heading.create(Some(&given), None, vec![]).unwrap();
        assert_eq!(explicit.attrs().get("level"), Some(&json!(3)));

        let unknown = [("bogus".to_string(), json!(true))].into_iter().collect();
        assert!(heading.create(Some(&unknown), None, vec![]).is_err());
    }

    #[test]
    fn create_and_fill_produces_valid_content() {
        let ts = TestSchema::new();
        for name in ["doc", "paragraph", "blockquote", "heading"] {
            let node_type = ts.schema.node_type(name).unwrap();
            if let Some(filled) = node_type.create_and_fill(None, None, vec![]) {
                assert!(
                    node_type.valid_content(filled.content()),
                    "create_and_fill made invalid {}",
                    name
                );
            }
        }
    }

    #[test]
    fn mark_exclusion_defaults_to_self() {
        let ts = TestSchema::new();
        let em = ts.schema.mark_type("em").unwrap();
        let strong = ts.schema.mark_type("strong").unwrap();
        assert!(em.excludes(&em));
        assert!(!em.excludes(&strong));
    }

    #[test]
    fn unknown_mark_reference_fails_compile() {
        let spec = SchemaSpec {
            nodes: vec![
                ("doc".to_string(), node("paragraph+", None)),
                ("paragraph".to_string(), node("text*", None)),
                ("text".to_string(), node("", None)),
            ],
            marks: vec![(
                "em".to_string(),
                MarkSpec {
                    excludes: Some("nope".to_string()),
                    ..MarkSpec::default()
                },
            )],
            ..SchemaSpec::default()
        };
        assert!(matches!(
            Schema::compile(spec),
            Err(SchemaError::UnknownMark { .. })
        ));
    }
}
