//! # Vellum Model
//!
//! The document model of the Vellum editing engine: schemas with compiled
//! content automatons, the persistent tree of nodes, fragments, marks and
//! slices, resolved positions, and the replace algorithm.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ schema: type tables + content automaton     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ tree: Fragment / Node / Mark / Slice        │
//! │  - persistent values, structural sharing    │
//! │  - schema-validated construction            │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ positions + replace: ResolvedPos, surgery   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Everything is a value**: a "mutation" builds a new tree sharing
//!    untouched subtrees with its predecessor; published versions are
//!    never altered in place.
//! 2. **The automaton decides validity**: content expressions compile to
//!    DFAs used for validation, filling, and wrap-finding, with edge
//!    order preserved end to end.
//! 3. **Failures leave no trace**: an operation either returns a new
//!    valid tree or an error; there is no partial mutation.

mod content;
mod error;
mod expr;
mod fragment;
mod mark;
mod node;
mod replace;
mod resolved_pos;
mod schema;
mod slice;
mod tokenizer;

#[cfg(test)]
pub(crate) mod test_util;

pub use content::ContentMatch;
pub use error::{RangeError, ReplaceError, SchemaError};
pub use expr::{Expr, ExprError, ExprResult};
pub use fragment::Fragment;
pub use mark::Mark;
pub use node::Node;
pub use resolved_pos::{NodeRange, ResolveCache, ResolvedPos};
pub use schema::{
    AttributeSpec, Attrs, MarkSpec, MarkType, NodeSpec, NodeType, Schema, SchemaSpec,
};
pub use slice::Slice;
