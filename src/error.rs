//! Error types for the analysis core.
//!
//! Two classes of failure are kept apart throughout the crate:
//! inapplicable-operation outcomes (an empty dependence, an unsplittable
//! schedule) are `Ok(None)` values, while the errors defined here always mean
//! the caller handed us malformed input.

use thiserror::Error;

/// Error raised by the polyhedral algebra layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlgebraError {
    /// Constraint text that could not be parsed.
    #[error("parse error: {message} in {text:?}")]
    Parse {
        /// What went wrong
        message: String,
        /// The offending input
        text: String,
    },

    /// A constraint referenced a dimension name that is not bound.
    #[error("unknown dimension name: {0}")]
    UnknownDimension(String),

    /// Two values that must agree in dimensionality do not.
    #[error("arity mismatch: expected {expected} dimensions, found {found}")]
    ArityMismatch {
        /// Required dimensionality
        expected: usize,
        /// Actual dimensionality
        found: usize,
    },

    /// An operation was applied across incompatible tuple spaces.
    #[error("space mismatch: {0}")]
    SpaceMismatch(String),

    /// An enumeration-backed query (lexmin, emptiness, equality, sampling)
    /// was issued on a set with an unbounded dimension.
    #[error("unbounded dimension: {0}")]
    Unbounded(String),

    /// A Fourier-Motzkin step could not be performed exactly.
    #[error("projection would lose integer exactness")]
    InexactProjection,
}

/// Error raised by the access-relation model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Statement names must be unique within an iteration domain.
    #[error("duplicate statement name: {0}")]
    DuplicateStatement(String),

    /// A read was supplied where a write was required, or vice versa.
    #[error("access relation has the wrong kind: expected {expected}")]
    WrongAccessKind {
        /// The kind the operation needed
        expected: &'static str,
    },
}

/// Error raised by schedule-tree construction and transformation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// A tree path stepped outside a node's children.
    #[error("path index {index} out of range at {node} node")]
    PathOutOfRange {
        /// The offending child index
        index: usize,
        /// Kind of node the path was standing on
        node: &'static str,
    },

    /// A coincident-member index exceeded the band arity.
    #[error("coincident index {index} out of range for band with {members} members")]
    CoincidentIndexOutOfRange {
        /// The offending member index
        index: usize,
        /// Number of members in the band
        members: usize,
    },

    /// The schedule tree does not start with a domain node.
    #[error("schedule has no domain root")]
    MissingDomainRoot,

    /// Sequence children flatten to time vectors of different lengths.
    #[error("sequence children have ragged time dimensionality")]
    RaggedSequence,

    /// An underlying algebra operation failed.
    #[error("algebra error: {0}")]
    Algebra(#[from] AlgebraError),
}

/// Top-level error type for the crate.
#[derive(Error, Debug)]
pub enum PolyschedError {
    /// Error in the polyhedral algebra layer
    #[error("algebra error: {0}")]
    Algebra(#[from] AlgebraError),

    /// Error in the access-relation model
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// Error in schedule construction or transformation
    #[error("schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Result type using [`PolyschedError`].
pub type PolyResult<T> = Result<T, PolyschedError>;
