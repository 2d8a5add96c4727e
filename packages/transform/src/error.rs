use thiserror::Error;
use vellum_model::{RangeError, ReplaceError};

/// A structured step failure: the step could not be applied to the given
/// document. Carries a human-readable reason so callers can simply skip an
/// inapplicable edit.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}")]
pub struct StepFailed {
    reason: String,
}

impl StepFailed {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<ReplaceError> for StepFailed {
    fn from(err: ReplaceError) -> Self {
        StepFailed::new(err.to_string())
    }
}

/// Errors surfaced by the transform layer
#[derive(Error, Debug)]
pub enum TransformError {
    #[error("step failed: {0}")]
    Step(#[from] StepFailed),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Replace(#[from] ReplaceError),

    #[error("duplicate step type '{0}'")]
    DuplicateStepType(String),

    #[error("{0}")]
    Invalid(String),
}

impl TransformError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}
