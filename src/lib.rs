//! # Polysched - Polyhedral Dependence Analysis and Schedule Trees
//!
//! The analysis core of a polyhedral loop optimizer:
//! - Flow (read-after-write) dependence construction from access relations
//! - Dependence normalization and distance vector extraction
//! - Schedule legality validation against dependences
//! - Schedule-tree construction (multiband, fusion, fission)
//! - Band tiling and vectorization-candidate collection
//!
//! ## Architecture
//!
//! ```text
//! Domain + Accesses → Dependences → Distances/Legality → Schedule Tree → Transforms
//! ```
//!
//! ## Example
//!
//! ```rust
//! use polysched::prelude::*;
//!
//! let domain = IterationDomain::parse("{ S[i] : 0 <= i < 4 }")?;
//! let write = AccessRelation::parse_write("{ S[i] -> A[i] : 0 <= i < 4 }")?;
//! let read = AccessRelation::parse_read("{ S[i] -> A[i - 1] : 1 <= i <= 3 }")?;
//!
//! let dep = DependenceBuilder::new(&domain)
//!     .flow_dependences(&write, &read)?
//!     .expect("the shifted read carries a dependence");
//! let distance = distance_vector(&dep)?.expect("uniform distance");
//! assert_eq!(distance.components(), &[1]);
//! # Ok::<(), anyhow::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algebra;
pub mod analysis;
pub mod error;
pub mod model;
pub mod schedule;

// Re-export commonly used types
pub mod prelude {
    //! Convenient re-exports of commonly used types and traits.

    pub use crate::algebra::{Map, Set, Tuple};
    pub use crate::analysis::{
        distance_vector, simplify, DependenceBuilder, Legality, LegalityChecker, LegalityOptions,
    };
    pub use crate::error::{AlgebraError, ModelError, PolyResult, PolyschedError, ScheduleError};
    pub use crate::model::{
        AccessKind, AccessRelation, DependenceRelation, DistanceVector, IterationDomain,
    };
    pub use crate::schedule::{
        arrange_fissioned, arrange_fused, build_multiband, collect_vectorization_candidates,
        tile_band, BandMember, Schedule, ScheduleNode,
    };
}

use anyhow::{Context, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Intersect two sets given in textual notation and return the canonical
/// textual form of the result: coalesced, implied equalities surfaced.
/// A disjoint pair yields `None`.
pub fn canonical_intersection(a: &str, b: &str) -> Result<Option<String>> {
    let a = algebra::Set::parse(a).context("parsing first set")?;
    let b = algebra::Set::parse(b).context("parsing second set")?;
    let out = a.intersect(&b)?.coalesce()?.detect_equalities()?;
    if out.is_empty()? {
        return Ok(None);
    }
    Ok(Some(out.to_string()))
}

/// Eliminate one named dimension from a set given in textual notation.
/// An unsatisfiable input yields `None`.
pub fn eliminate_dimension(set: &str, dim: &str) -> Result<Option<String>> {
    let s = algebra::Set::parse(set).context("parsing set")?;
    let out = s.eliminate_dim(dim)?;
    if out.is_empty()? {
        return Ok(None);
    }
    Ok(Some(out.to_string()))
}

/// The lexicographically smallest point of a set given in textual notation,
/// or `None` when the set is empty.
pub fn lexmin_point(set: &str) -> Result<Option<Vec<i64>>> {
    let s = algebra::Set::parse(set).context("parsing set")?;
    Ok(s.lexmin()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_canonical_intersection() {
        let out = canonical_intersection("{ S[i] : 0 <= i < 10 }", "{ S[i] : 5 <= i < 20 }")
            .unwrap()
            .unwrap();
        let reparsed = algebra::Set::parse(&out).unwrap();
        let expected = algebra::Set::parse("{ S[i] : 5 <= i < 10 }").unwrap();
        assert!(reparsed.is_equal(&expected).unwrap());
    }

    #[test]
    fn test_canonical_intersection_disjoint_is_none() {
        let out =
            canonical_intersection("{ S[i] : 0 <= i < 4 }", "{ S[i] : 10 <= i < 14 }").unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_eliminate_dimension() {
        let out = eliminate_dimension("{ S[i, j] : 0 <= i < 3 and 0 <= j <= i }", "j")
            .unwrap()
            .unwrap();
        let reparsed = algebra::Set::parse(&out).unwrap();
        let expected = algebra::Set::parse("{ S[i] : 0 <= i < 3 }").unwrap();
        assert!(reparsed.is_equal(&expected).unwrap());
    }

    #[test]
    fn test_eliminate_dimension_unsatisfiable_is_none() {
        let out = eliminate_dimension(
            "{ S[i, j] : i > j and j > i and 0 <= i < 5 and 0 <= j < 5 }",
            "j",
        )
        .unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn test_lexmin_point() {
        assert_eq!(
            lexmin_point("{ [i, j] : 0 <= i < 3 and 0 <= j < 3 and i + j >= 2 }").unwrap(),
            Some(vec![0, 2])
        );
        assert_eq!(lexmin_point("{ [i] : 0 <= i < 0 }").unwrap(), None);
    }
}
