//! Shared schema and builders for the integration suites

use serde_json::json;
use std::collections::BTreeMap;
use vellum_model::{
    AttributeSpec, Fragment, Mark, MarkSpec, Node, NodeSpec, Schema, SchemaSpec,
};

pub struct TestSchema {
    pub schema: Schema,
}

#[allow(dead_code)]
impl TestSchema {
    pub fn new() -> TestSchema {
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

    pub fn doc(&self, children: Vec<Node>) -> Node {
        self.block("doc", children)
    }

    pub fn p(&self, children: Vec<Node>) -> Node {
        self.block("paragraph", children)
    }

    pub fn blockquote(&self, children: Vec<Node>) -> Node {
        self.block("blockquote", children)
    }

    pub fn heading(&self, level: i64, children: Vec<Node>) -> Node {
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

    pub fn hr(&self) -> Node {
        self.block("horizontal_rule", vec![])
    }

    pub fn text(&self, text: &str) -> Node {
        self.schema.text(text).expect("text builds")
    }

    pub fn marked_text(&self, text: &str, marks: Vec<Mark>) -> Node {
        self.schema
            .text_with_marks(text, marks)
            .expect("marked text builds")
    }

    pub fn em(&self) -> Mark {
        self.schema
            .mark_type("em")
            .and_then(|t| t.create(None))
            .expect("em builds")
    }

    pub fn strong(&self) -> Mark {
        self.schema
            .mark_type("strong")
            .and_then(|t| t.create(None))
            .expect("strong builds")
    }

    fn block(&self, name: &str, children: Vec<Node>) -> Node {
        self.schema
            .node(name, None, Some(Fragment::from_vec(children)), vec![])
            .unwrap_or_else(|e| panic!("{} builds: {}", name, e))
    }
}
