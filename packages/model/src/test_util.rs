//! Shared test schema and node builders

use crate::fragment::Fragment;
use crate::mark::Mark;
use crate::node::Node;
use crate::schema::{AttributeSpec, MarkSpec, NodeSpec, Schema, SchemaSpec};
use serde_json::json;
use std::collections::BTreeMap;

pub(crate) struct TestSchema {
    pub(crate) schema: Schema,
}

impl TestSchema {
    /// The standard test schema: doc, paragraph, blockquote, heading,
    /// horizontal_rule, text; marks em, strong, link
    pub(crate) fn new() -> TestSchema {
        let spec = SchemaSpec {
            nodes: vec![
                (
                    "doc".to_string(),
                    NodeSpec {
                        content: Some("block+".to_string()),
                        ..NodeSpec::default()
                    },
                ),
                (
                    "paragraph".to_string(),
                    NodeSpec {
                        content: Some("inline*".to_string()),
                        group: Some("block".to_string()),
                        ..NodeSpec::default()
                    },
                ),
                (
                    "blockquote".to_string(),
                    NodeSpec {
                        content: Some("block+".to_string()),
                        group: Some("block".to_string()),
                        ..NodeSpec::default()
                    },
                ),
                (
                    "heading".to_string(),
                    NodeSpec {
                        content: Some("inline*".to_string()),
                        group: Some("block".to_string()),
                        attrs: vec![(
                            "level".to_string(),
                            AttributeSpec {
                                default: Some(json!(1)),
                            },
                        )],
                        ..NodeSpec::default()
                    },
                ),
                (
                    "horizontal_rule".to_string(),
                    NodeSpec {
                        group: Some("block".to_string()),
                        ..NodeSpec::default()
                    },
                ),
                (
                    "text".to_string(),
                    NodeSpec {
                        group: Some("inline".to_string()),
                        ..NodeSpec::default()
                    },
                ),
            ],
            marks: vec![
                ("em".to_string(), MarkSpec::default()),
                ("strong".to_string(), MarkSpec::default()),
                (
                    "link".to_string(),
                    MarkSpec {
                        attrs: vec![("href".to_string(), AttributeSpec::default())],
                        inclusive: Some(false),
                        ..MarkSpec::default()
                    },
                ),
            ],
            top_node: None,
        };
        TestSchema {
            schema: Schema::compile(spec).expect("test schema compiles"),
        }
    }

    /// A minimal schema from (name, content) pairs; the first entry is the
    /// top node
    pub(crate) fn with_nodes(nodes: &[(&str, &str)]) -> TestSchema {
        let spec = SchemaSpec {
            nodes: nodes
                .iter()
                .map(|(name, content)| {
                    (
                        name.to_string(),
                        NodeSpec {
                            content: if content.is_empty() {
                                None
                            } else {
                                Some(content.to_string())
                            },
                            group: if *name == "text" {
                                Some("inline".to_string())
                            } else {
                                None
                            },
                            ..NodeSpec::default()
                        },
                    )
                })
                .collect(),
            marks: Vec::new(),
            top_node: Some(nodes[0].0.to_string()),
        };
        TestSchema {
            schema: Schema::compile(spec).expect("test schema compiles"),
        }
    }

    pub(crate) fn doc(&self, children: Vec<Node>) -> Node {
        self.block("doc", children)
    }

    pub(crate) fn p(&self, children: Vec<Node>) -> Node {
        self.block("paragraph", children)
    }

    pub(crate) fn blockquote(&self, children: Vec<Node>) -> Node {
        self.block("blockquote", children)
    }

    pub(crate) fn heading(&self, level: i64, children: Vec<Node>) -> Node {
        let attrs: BTreeMap<_, _> = [("level".to_string(), json!(level))].into_iter().collect();
        self.schema
            .node(
                "heading",
                Some(&attrs),
                Some(Fragment::from_vec(children)),
                vec![],
            )
            .expect("heading builds")
    }

    pub(crate) fn hr(&self) -> Node {
        self.block("horizontal_rule", vec![])
    }

    pub(crate) fn text(&self, text: &str) -> Node {
        self.schema.text(text).expect("text builds")
    }

    pub(crate) fn marked_text(&self, text: &str, marks: Vec<Mark>) -> Node {
        self.schema
            .text_with_marks(text, marks)
            .expect("marked text builds")
    }

    pub(crate) fn em(&self) -> Mark {
        self.schema
            .mark_type("em")
            .and_then(|t| t.create(None))
            .expect("em builds")
    }

    pub(crate) fn strong(&self) -> Mark {
        self.schema
            .mark_type("strong")
            .and_then(|t| t.create(None))
            .expect("strong builds")
    }

    pub(crate) fn link(&self, href: &str) -> Mark {
        let attrs: BTreeMap<_, _> = [("href".to_string(), json!(href))].into_iter().collect();
        self.schema
            .mark_type("link")
            .and_then(|t| t.create(Some(&attrs)))
            .expect("link builds")
    }

    fn block(&self, name: &str, children: Vec<Node>) -> Node {
        self.schema
            .node(name, None, Some(Fragment::from_vec(children)), vec![])
            .unwrap_or_else(|e| panic!("{} builds: {}", name, e))
    }
}
