//! Failures of the synthesis entry points.

use std::fmt;

use thiserror::Error;

/// Stage of a synthesis pass, reported with every non-modeling failure.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Phase {
    Validation,
    Partitioning,
    Shuffling,
    Exploration,
    Completion,
    Splitting,
    Progressive,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Validation => "validation",
            Phase::Partitioning => "partitioning",
            Phase::Shuffling => "shuffling",
            Phase::Exploration => "exploration",
            Phase::Completion => "completion",
            Phase::Splitting => "state splitting",
            Phase::Progressive => "progressive pass",
        };
        write!(f, "{}", s)
    }
}

/// A structural problem with the input model, found before any diagram work.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ModelingError {
    #[error("input '{0}' of the specification is not an input of the fixed component")]
    SpecInputNotInFixed(String),
    #[error("output '{0}' of the specification is not an output of the fixed component")]
    SpecOutputNotInFixed(String),
    #[error("'{0}' is listed twice among the U variables")]
    DuplicateU(String),
    #[error("'{0}' is listed twice among the V variables")]
    DuplicateV(String),
    #[error("'{0}' is both an external input and a V variable")]
    InputIsV(String),
    #[error("V variable '{0}' is not an input of the fixed component")]
    VNotFixedInput(String),
    #[error("U variable '{0}' is not a node of the fixed component")]
    UNotFixedNode(String),

    #[error("'{node}' refers to unknown signal '{signal}'")]
    UnknownSignal { node: String, signal: String },
    #[error("signal '{signal}' has {found} values, expected {expected}")]
    ArityMismatch {
        signal: String,
        expected: usize,
        found: usize,
    },
    #[error("signal '{0}' has fewer than two values")]
    SingleValued(String),
    #[error("latch '{latch}' resets to {reset}, but has only {arity} values")]
    BadReset { latch: String, reset: usize, arity: usize },
    #[error("literal on '{signal}' uses value {value}, but it has only {arity} values")]
    ValueOutOfRange {
        signal: String,
        value: usize,
        arity: usize,
    },
    #[error("signal '{0}' depends on itself combinationally")]
    CombinationalCycle(String),

    #[error("formula rank must be at least 1")]
    ZeroRank,
    #[error("formula has no base variables")]
    NoFormulaVariables,
    #[error("formula variable copy {copy}, index {index} is out of range")]
    FormulaVarOutOfRange { copy: usize, index: usize },
}

#[derive(Debug, Error)]
pub enum SynthError {
    #[error(transparent)]
    Modeling(#[from] ModelingError),

    #[error("state budget of {limit} exceeded during {phase}")]
    ResourceExceeded { phase: Phase, limit: usize },

    #[error("diagram failure during {phase}: {message}")]
    Diagram { phase: Phase, message: String },

    #[error("inconsistent model during {phase}: {detail}")]
    Inconsistency { phase: Phase, detail: String },

    #[error("no progressive solution: the initial state was removed")]
    EmptySolution,
}

impl SynthError {
    pub fn inconsistency(phase: Phase, detail: impl Into<String>) -> Self {
        SynthError::Inconsistency {
            phase,
            detail: detail.into(),
        }
    }

    /// Phase of the failure; modeling errors belong to validation.
    pub fn phase(&self) -> Phase {
        match self {
            SynthError::Modeling(_) => Phase::Validation,
            SynthError::ResourceExceeded { phase, .. }
            | SynthError::Diagram { phase, .. }
            | SynthError::Inconsistency { phase, .. } => *phase,
            SynthError::EmptySolution => Phase::Progressive,
        }
    }
}

pub type Result<T> = std::result::Result<T, SynthError>;
