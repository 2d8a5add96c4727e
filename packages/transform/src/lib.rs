//! # Vellum Transform
//!
//! The edit-log layer of the Vellum editing engine: atomic invertible
//! steps, their positional effect, composition of positional effects
//! across many edits, and the transform accumulator that applies steps to
//! produce successive document versions.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: schema-validated persistent tree     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ transform: Step / StepMap / Mapping         │
//! │  - apply, invert, and rebase edits          │
//! │  - structural ops: lift, wrap, split, join  │
//! │  - mark ops over inline ranges              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Every step is invertible**: applying a step and its inverse
//!    round-trips the document exactly.
//! 2. **Positions survive rebasing**: step maps record precise deltas and
//!    mirrored inverse pairs let positions recover across
//!    delete-then-reinsert sequences.
//! 3. **Failure is a value**: `maybe_step` converts replace errors into
//!    structured failures and leaves the transform untouched.

mod error;
mod map;
mod mark_step;
mod replace_step;
mod step;
mod structure;
mod transform;

#[cfg(test)]
pub(crate) mod test_util;

pub use error::{StepFailed, TransformError};
pub use map::{MapResult, Mapping, Recover, StepMap};
pub use mark_step::{AddMarkStep, RemoveMarkStep};
pub use replace_step::{ReplaceAroundStep, ReplaceStep};
pub use step::{Step, StepReader, StepRegistry, StepResult};
pub use structure::{
    can_join, can_split, find_wrapping, insert_point, join_point, lift_target, TypeWithAttrs,
};
pub use transform::{MarkTarget, Transform};
