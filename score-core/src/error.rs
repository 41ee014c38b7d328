use thiserror;

use crate::primitives::{Absolute, Rational};

/// Which part of the musical state a conflicting change tried to assert.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StateKind {
    Key,
    Clef,
    Meter,
}
impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key => write!(f, "key"),
            Self::Clef => write!(f, "clef"),
            Self::Meter => write!(f, "meter"),
        }
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ScoreError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("Undefined variable: `{0}`")]
    UndefinedVariable(String),
    #[error("Variable `{0}` refers to itself")]
    CyclicVariable(String),
    #[error(
        "Conflicting {kind} change at {time} in {scope}: \
        `{existing}` vs `{incoming}`"
    )]
    ConflictingStateChange {
        kind: StateKind,
        time: Absolute,
        scope: String,
        existing: String,
        incoming: String,
    },
    #[error("Illegal duration: {0}")]
    IllegalDuration(Rational),
    #[error("Internal invariant violated: {0}")]
    InternalInvariantViolation(String),
    #[error("No staff with index {0}")]
    NoSuchStaff(usize),
    #[error("No voice {voice} in staff {staff}")]
    NoSuchVoice { staff: usize, voice: usize },
}
pub type ScoreResult<T> = Result<T, ScoreError>;
