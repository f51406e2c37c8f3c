//! Integer sets: unions of convex pieces over named tuple spaces.
//!
//! A piece owns a column vector laid out as `[dims | locals]`: the visible
//! dimensions of its tuple first, then existentially quantified columns.
//! A [`Set`] is a finite union of pieces, possibly spanning several tuple
//! spaces, which is how an iteration domain holds every statement at once.

use crate::algebra::constraint::{Constraint, ConstraintKind};
use crate::algebra::expr::LinExpr;
use crate::algebra::operations;
use crate::algebra::space::Tuple;
use crate::error::AlgebraError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A single convex piece: a tuple space, existential columns, constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicSet {
    /// The tuple space of the visible dimensions
    pub tuple: Tuple,
    /// Number of existential columns appended after the dimensions
    pub n_local: usize,
    /// Constraints over `[dims | locals]`
    pub constraints: Vec<Constraint>,
}

impl BasicSet {
    /// Create a piece. Every constraint must span exactly the piece width.
    pub fn new(tuple: Tuple, n_local: usize, constraints: Vec<Constraint>) -> Self {
        let n_cols = tuple.arity() + n_local;
        debug_assert!(constraints.iter().all(|c| c.expr.n_cols() == n_cols));
        Self {
            tuple,
            n_local,
            constraints,
        }
    }

    /// The unconstrained piece over a tuple space.
    pub fn universe(tuple: Tuple) -> Self {
        Self {
            tuple,
            n_local: 0,
            constraints: Vec::new(),
        }
    }

    /// Number of visible dimensions.
    pub fn n_dim(&self) -> usize {
        self.tuple.arity()
    }

    /// Total column count, locals included.
    pub fn n_cols(&self) -> usize {
        self.tuple.arity() + self.n_local
    }

    /// Column names for rendering: dimension names then `e0`, `e1`, ...
    pub(crate) fn col_names(&self) -> Vec<String> {
        let mut names = self.tuple.dims.clone();
        names.extend((0..self.n_local).map(|i| format!("e{}", i)));
        names
    }

    /// Emptiness over the integers.
    pub fn is_empty(&self) -> Result<bool, AlgebraError> {
        operations::is_empty(self.n_cols(), &self.constraints)
    }

    /// The visible integer points of the piece.
    pub fn points(&self) -> Result<BTreeSet<Vec<i64>>, AlgebraError> {
        operations::visible_points(self.n_cols(), self.n_dim(), &self.constraints)
    }

    /// Membership of a visible point, existentials permitting.
    pub fn contains(&self, point: &[i64]) -> Result<bool, AlgebraError> {
        if point.len() != self.n_dim() {
            return Err(AlgebraError::ArityMismatch {
                expected: self.n_dim(),
                found: point.len(),
            });
        }
        let mut cs = self.constraints.clone();
        for (i, &v) in point.iter().enumerate() {
            let mut e = LinExpr::var(i, self.n_cols());
            e.constant = -v;
            cs.push(Constraint::eq_zero(e));
        }
        Ok(!operations::is_empty(self.n_cols(), &cs)?)
    }

    /// Intersection with a piece over the same space. Locals of both sides
    /// are kept, the other piece's shifted past ours.
    pub fn intersect(&self, other: &BasicSet) -> Result<BasicSet, AlgebraError> {
        if !self.tuple.same_space(&other.tuple) {
            return Err(AlgebraError::SpaceMismatch(format!(
                "{} vs {}",
                self.tuple, other.tuple
            )));
        }
        let n_local = self.n_local + other.n_local;
        let n_cols = self.n_dim() + n_local;
        let mut constraints: Vec<Constraint> = self
            .constraints
            .iter()
            .map(|c| Constraint {
                expr: c.expr.extend_cols(other.n_local),
                kind: c.kind,
            })
            .collect();
        // dims stay put, other's locals land after ours
        let mapping: Vec<usize> = (0..other.n_dim())
            .chain((0..other.n_local).map(|l| self.n_cols() + l))
            .collect();
        for c in &other.constraints {
            constraints.push(Constraint {
                expr: c.expr.remap(n_cols, &mapping),
                kind: c.kind,
            });
        }
        Ok(BasicSet::new(
            self.tuple.clone(),
            n_local,
            operations::simplify_system(&constraints),
        ))
    }

    /// Upgrade inequalities that the piece forces to hold with equality.
    pub fn detect_equalities(&self) -> Result<BasicSet, AlgebraError> {
        let n_cols = self.n_cols();
        let mut cs = operations::simplify_system(&self.constraints);
        for i in 0..cs.len() {
            if cs[i].kind != ConstraintKind::Inequality {
                continue;
            }
            // e >= 0 is an equality when e >= 1 is infeasible alongside the
            // rest of the piece.
            let mut trial = cs.clone();
            let mut strict = cs[i].expr.clone();
            strict.constant -= 1;
            trial[i] = Constraint::ge_zero(strict);
            if operations::is_empty(n_cols, &trial)? {
                cs[i] = Constraint::eq_zero(cs[i].expr.clone());
            }
        }
        Ok(BasicSet::new(
            self.tuple.clone(),
            self.n_local,
            operations::simplify_system(&cs),
        ))
    }

    fn render(&self) -> String {
        let names = self.col_names();
        let mut body = self.tuple.to_string();
        let mut parts: Vec<String> = Vec::new();
        if self.n_local > 0 {
            let locals: Vec<String> = (0..self.n_local).map(|i| format!("e{}", i)).collect();
            parts.push(format!("exists {}:", locals.join(", ")));
        }
        let rendered: Vec<String> = self
            .constraints
            .iter()
            .map(|c| c.to_string_with_names(&names))
            .collect();
        if !rendered.is_empty() {
            parts.push(rendered.join(" and "));
        }
        if !parts.is_empty() {
            body.push_str(" : ");
            body.push_str(&parts.join(" "));
        }
        body
    }
}

/// A finite union of pieces, possibly over several tuple spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    /// The pieces of the union; empty means the empty set
    pub pieces: Vec<BasicSet>,
}

impl Set {
    /// The empty set.
    pub fn empty() -> Self {
        Self { pieces: Vec::new() }
    }

    /// A set with a single piece.
    pub fn from_piece(piece: BasicSet) -> Self {
        Self {
            pieces: vec![piece],
        }
    }

    /// A set from several pieces.
    pub fn from_pieces(pieces: Vec<BasicSet>) -> Self {
        Self { pieces }
    }

    /// The unconstrained set over one tuple space.
    pub fn universe(tuple: Tuple) -> Self {
        Self::from_piece(BasicSet::universe(tuple))
    }

    /// Names of the statement tuples present in the union.
    pub fn statement_names(&self) -> BTreeSet<String> {
        self.pieces
            .iter()
            .filter_map(|p| p.tuple.name.clone())
            .collect()
    }

    /// The common tuple space, when every piece shares one.
    pub fn single_space(&self) -> Option<&Tuple> {
        let first = &self.pieces.first()?.tuple;
        if self.pieces.iter().all(|p| p.tuple.same_space(first)) {
            Some(first)
        } else {
            None
        }
    }

    /// The pieces lying in a named statement space.
    pub fn pieces_for(&self, name: &str) -> Vec<&BasicSet> {
        self.pieces
            .iter()
            .filter(|p| p.tuple.name.as_deref() == Some(name))
            .collect()
    }

    /// Union; no space agreement is required.
    pub fn union(&self, other: &Set) -> Set {
        let mut pieces = self.pieces.clone();
        pieces.extend(other.pieces.iter().cloned());
        Set { pieces }
    }

    /// Intersection, distributed over the pieces. Pieces in unrelated
    /// spaces contribute nothing.
    pub fn intersect(&self, other: &Set) -> Result<Set, AlgebraError> {
        let mut pieces = Vec::new();
        for a in &self.pieces {
            for b in &other.pieces {
                if a.tuple.same_space(&b.tuple) {
                    let p = a.intersect(b)?;
                    pieces.push(p);
                }
            }
        }
        Ok(Set { pieces })
    }

    /// Emptiness over the integers.
    pub fn is_empty(&self) -> Result<bool, AlgebraError> {
        for p in &self.pieces {
            if !p.is_empty()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Every visible point, labeled with its tuple name.
    pub fn labeled_points(&self) -> Result<BTreeSet<(Option<String>, Vec<i64>)>, AlgebraError> {
        let mut out = BTreeSet::new();
        for p in &self.pieces {
            for pt in p.points()? {
                out.insert((p.tuple.name.clone(), pt));
            }
        }
        Ok(out)
    }

    /// Semantic equality: the same labeled integer points.
    pub fn is_equal(&self, other: &Set) -> Result<bool, AlgebraError> {
        Ok(self.labeled_points()? == other.labeled_points()?)
    }

    /// Membership of a point in a named space (`None` for anonymous).
    pub fn contains(&self, name: Option<&str>, point: &[i64]) -> Result<bool, AlgebraError> {
        for p in &self.pieces {
            if p.tuple.name.as_deref() == name
                && p.n_dim() == point.len()
                && p.contains(point)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Lexicographically smallest point. Defined only for sets whose pieces
    /// all share one space; `None` when the set is empty.
    pub fn lexmin(&self) -> Result<Option<Vec<i64>>, AlgebraError> {
        if self.pieces.is_empty() {
            return Ok(None);
        }
        if self.single_space().is_none() {
            return Err(AlgebraError::SpaceMismatch(
                "lexmin over a mixed-space union".into(),
            ));
        }
        let mut best: Option<Vec<i64>> = None;
        for p in &self.pieces {
            // Dims are the most significant columns, so the visible prefix
            // of the full-column lexmin is the visible lexmin.
            if let Some(full) = operations::lexmin(p.n_cols(), &p.constraints)? {
                let vis = full[..p.n_dim()].to_vec();
                if best.as_ref().map_or(true, |b| vis < *b) {
                    best = Some(vis);
                }
            }
        }
        Ok(best)
    }

    /// An arbitrary point of the set, or `None` when empty.
    pub fn sample_point(&self) -> Result<Option<Vec<i64>>, AlgebraError> {
        for p in &self.pieces {
            if let Some(full) = operations::lexmin(p.n_cols(), &p.constraints)? {
                return Ok(Some(full[..p.n_dim()].to_vec()));
            }
        }
        Ok(None)
    }

    /// Drop empty pieces and greedily merge piece pairs whose union is
    /// exactly described by their shared valid constraints.
    pub fn coalesce(&self) -> Result<Set, AlgebraError> {
        let mut pieces: Vec<BasicSet> = Vec::new();
        for p in &self.pieces {
            if !p.is_empty()? {
                pieces.push(p.clone());
            }
        }
        let mut merged = true;
        while merged {
            merged = false;
            'outer: for i in 0..pieces.len() {
                for j in (i + 1)..pieces.len() {
                    if let Some(m) = try_merge(&pieces[i], &pieces[j])? {
                        pieces[i] = m;
                        pieces.remove(j);
                        merged = true;
                        break 'outer;
                    }
                }
            }
        }
        Ok(Set { pieces })
    }

    /// [`BasicSet::detect_equalities`] applied to every piece.
    pub fn detect_equalities(&self) -> Result<Set, AlgebraError> {
        let mut pieces = Vec::with_capacity(self.pieces.len());
        for p in &self.pieces {
            pieces.push(p.detect_equalities()?);
        }
        Ok(Set { pieces })
    }

    /// Exact projection eliminating one visible dimension by name.
    pub fn eliminate_dim(&self, name: &str) -> Result<Set, AlgebraError> {
        let mut pieces = Vec::with_capacity(self.pieces.len());
        for p in &self.pieces {
            let col = p
                .tuple
                .dim_index(name)
                .ok_or_else(|| AlgebraError::UnknownDimension(name.to_string()))?;
            let cs = operations::project_col(p.n_cols(), &p.constraints, col)?;
            let mut dims = p.tuple.dims.clone();
            dims.remove(col);
            let tuple = Tuple {
                name: p.tuple.name.clone(),
                dims,
            };
            pieces.push(BasicSet::new(tuple, p.n_local, cs));
        }
        Ok(Set { pieces })
    }

    /// Number of visible dimensions; requires a single common space.
    pub fn n_dim(&self) -> Result<usize, AlgebraError> {
        self.single_space()
            .map(|t| t.arity())
            .ok_or_else(|| AlgebraError::SpaceMismatch("mixed-space union".into()))
    }
}

/// Merge two pieces when their shared valid constraints describe the union
/// exactly. Returns `None` when the pieces stay apart.
pub(crate) fn try_merge(a: &BasicSet, b: &BasicSet) -> Result<Option<BasicSet>, AlgebraError> {
    if !a.tuple.same_space(&b.tuple) {
        return Ok(None);
    }
    let n_dim = a.n_dim();

    // Candidate constraints: every local-free inequality of either piece
    // (equalities split into their two inequalities), over dims only.
    let mut candidates: Vec<LinExpr> = Vec::new();
    for (piece, n_local) in [(a, a.n_local), (b, b.n_local)] {
        for c in &piece.constraints {
            if (0..n_local).any(|l| c.expr.coeff(n_dim + l) != 0) {
                continue;
            }
            let dims_only = LinExpr {
                constant: c.expr.constant,
                coeffs: c.expr.coeffs[..n_dim].to_vec(),
            };
            candidates.push(dims_only.clone());
            if c.is_equality() {
                candidates.push(-dims_only);
            }
        }
    }
    candidates.sort();
    candidates.dedup();

    // A candidate survives when its negation is infeasible on both pieces.
    let mut hull: Vec<Constraint> = Vec::new();
    'cand: for e in candidates {
        for piece in [a, b] {
            let widened = Constraint::ge_zero(e.extend_cols(piece.n_local));
            let mut trial = piece.constraints.clone();
            trial.push(widened.negated());
            if !operations::is_empty(piece.n_cols(), &trial)? {
                continue 'cand;
            }
        }
        hull.push(Constraint::ge_zero(e));
    }

    let merged = BasicSet::new(a.tuple.clone(), 0, operations::simplify_system(&hull));
    let mut union_points = a.points()?;
    union_points.extend(b.points()?);
    if merged.points()? == union_points {
        Ok(Some(merged.detect_equalities()?))
    } else {
        Ok(None)
    }
}

impl fmt::Display for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pieces.is_empty() {
            return write!(f, "{{ }}");
        }
        let rendered: Vec<String> = self.pieces.iter().map(|p| p.render()).collect();
        write!(f, "{{ {} }}", rendered.join("; "))
    }
}

/// Group a set's points by statement name, for cross-space comparisons.
pub fn points_by_statement(
    set: &Set,
) -> Result<BTreeMap<Option<String>, BTreeSet<Vec<i64>>>, AlgebraError> {
    let mut out: BTreeMap<Option<String>, BTreeSet<Vec<i64>>> = BTreeMap::new();
    for (name, pt) in set.labeled_points()? {
        out.entry(name).or_default().insert(pt);
    }
    Ok(out)
}
