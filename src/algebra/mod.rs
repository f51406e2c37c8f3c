//! Exact integer set and relation algebra over bounded polyhedra.
//!
//! Sets and relations are finite unions of convex pieces with optional
//! existential columns. All queries that need concrete points (emptiness,
//! lexicographic minimum, equality, sampling) enumerate the pieces, which
//! keeps every answer exact but requires every dimension to be bounded;
//! an unbounded query fails with [`crate::error::AlgebraError::Unbounded`].

pub mod constraint;
pub mod expr;
pub mod map;
mod operations;
pub mod parse;
pub mod set;
pub mod space;

pub use constraint::{Constraint, ConstraintKind};
pub use expr::LinExpr;
pub use map::{BasicMap, Map};
pub use parse::{parse_map, parse_set};
pub use set::{points_by_statement, BasicSet, Set};
pub use space::Tuple;
