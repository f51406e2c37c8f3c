//! Flow dependence construction, normalization, and distance extraction.

use crate::algebra::Map;
use crate::error::{AlgebraError, PolyschedError};
use crate::model::{AccessKind, AccessRelation, DependenceRelation, DistanceVector, IterationDomain};
use log::debug;

/// Derives flow (read-after-write) dependences for one iteration domain.
pub struct DependenceBuilder<'a> {
    domain: &'a IterationDomain,
}

impl<'a> DependenceBuilder<'a> {
    /// A builder over the given iteration domain.
    pub fn new(domain: &'a IterationDomain) -> Self {
        Self { domain }
    }

    /// Flow dependences carried from `write` to `read`: pairs of iterations
    /// where the source writes an element the target reads, both restricted
    /// to the iteration domain.
    ///
    /// An empty result (disjoint element sets, empty accesses) is the
    /// expected `Ok(None)`; errors mean the inputs were malformed.
    pub fn flow_dependences(
        &self,
        write: &AccessRelation,
        read: &AccessRelation,
    ) -> Result<Option<DependenceRelation>, PolyschedError> {
        let w = write.require(AccessKind::Write)?;
        let r = read.require(AccessKind::Read)?;

        // source -> target through the shared array elements
        let raw = w.apply_range(&r.reverse());
        let restricted = raw
            .intersect_domain(self.domain.set())
            .intersect_range(self.domain.set());

        if restricted.is_empty().map_err(PolyschedError::from)? {
            debug!("flow dependences: empty for {} against {}", write, read);
            return Ok(None);
        }
        debug!("flow dependences: {}", restricted);
        Ok(Some(DependenceRelation(restricted)))
    }
}

/// Normalize a dependence relation: merge convex pieces that union into a
/// single convex piece and surface implied equalities. Membership is
/// preserved exactly; the input is left untouched.
///
/// An empty relation yields `Ok(None)`.
pub fn simplify(dep: &DependenceRelation) -> Result<Option<DependenceRelation>, AlgebraError> {
    let simplified = dep.map().coalesce()?.detect_equalities()?;
    if simplified.is_empty()? {
        return Ok(None);
    }
    debug!(
        "simplified {} piece(s) down to {}",
        dep.map().pieces.len(),
        simplified.pieces.len()
    );
    Ok(Some(DependenceRelation(simplified)))
}

/// The lexicographically smallest target-minus-source distance of a
/// dependence whose pieces relate a statement to itself.
///
/// An empty relation yields `Ok(None)`; pieces across different spaces or
/// arities are a malformed-input error.
pub fn distance_vector(dep: &DependenceRelation) -> Result<Option<DistanceVector>, AlgebraError> {
    let deltas = dep.map().deltas()?;
    let min = match deltas.lexmin() {
        Ok(v) => v,
        // an empty union has no space to disagree about
        Err(AlgebraError::SpaceMismatch(_)) if deltas.pieces.is_empty() => None,
        Err(e) => return Err(e),
    };
    Ok(min.map(DistanceVector))
}

/// Chase a dependence into schedule time: the relation from source time
/// vectors to target time vectors under the given schedule map.
pub(crate) fn time_relation(schedule: &Map, dep: &DependenceRelation) -> Map {
    dep.map().apply_domain(schedule).apply_range(schedule)
}
