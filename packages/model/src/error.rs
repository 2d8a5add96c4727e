use crate::expr::ExprError;
use thiserror::Error;

/// Construction-time schema errors. These are fatal: there is no partial or
/// degraded schema, a spec that fails any check produces no schema at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("schema has no top node type '{0}'")]
    MissingTopNode(String),

    #[error("schema has no 'text' node type")]
    MissingTextType,

    #[error("the text node type must not declare attributes")]
    TextTypeAttrs,

    #[error("in content of '{type_name}': {source}")]
    Content {
        type_name: String,
        source: ExprError,
    },

    #[error("in content of '{type_name}': mixing inline and block content")]
    MixedContent { type_name: String },

    #[error(
        "in content of '{type_name}': only non-generatable nodes ({names}) in a required position"
    )]
    DeadContent { type_name: String, names: String },

    #[error("unknown mark type '{name}' in '{referrer}'")]
    UnknownMark { referrer: String, name: String },

    #[error("unknown node type or group '{name}' in content of '{type_name}'")]
    UnknownContentName { type_name: String, name: String },

    #[error("duplicate node type '{0}'")]
    DuplicateNodeType(String),

    #[error("duplicate mark type '{0}'")]
    DuplicateMarkType(String),
}

/// Out-of-range positions, missing children, unknown type names, and
/// malformed wire payloads. Always propagated to the immediate caller,
/// never clamped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RangeError {
    #[error("position {pos} outside of content of size {size}")]
    Position { pos: usize, size: usize },

    #[error("index {index} outside of fragment with {count} children")]
    Index { index: usize, count: usize },

    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    #[error("unknown mark type: {0}")]
    UnknownMarkType(String),

    #[error("no value supplied for attribute '{attr}' of type '{type_name}'")]
    MissingAttr { type_name: String, attr: String },

    #[error("type '{type_name}' has no attribute '{attr}'")]
    UnknownAttr { type_name: String, attr: String },

    #[error("invalid {what} JSON: {detail}")]
    Json { what: &'static str, detail: String },

    #[error("{0}")]
    Other(String),
}

impl RangeError {
    pub fn position(pos: usize, size: usize) -> Self {
        Self::Position { pos, size }
    }

    pub fn json(what: &'static str, detail: impl Into<String>) -> Self {
        Self::Json {
            what,
            detail: detail.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Errors raised by the tree-surgery primitive when a slice cannot be
/// reconciled with the target schema. Fatal when the primitive is called
/// directly; the transform layer converts them into failed step results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplaceError {
    #[error("inserted content deeper than insertion position")]
    OpenTooDeep,

    #[error("inconsistent open depths")]
    InconsistentOpenDepths,

    #[error("cannot join {sub} onto {main}")]
    CannotJoin { main: String, sub: String },

    #[error("invalid content for node {type_name}")]
    InvalidContent { type_name: String },

    #[error(transparent)]
    Range(#[from] RangeError),
}
