//! Dependence analysis and schedule legality checks.

pub mod dependence;
pub mod legality;

pub use dependence::{distance_vector, simplify, DependenceBuilder};
pub use legality::{Legality, LegalityChecker, LegalityOptions};
