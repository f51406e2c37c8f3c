//! Integer relations: unions of convex pieces mapping one tuple space to
//! another.
//!
//! A piece's columns are laid out `[in | out | locals]`. Composition keeps
//! everything exact by demoting the mediating dimensions to existential
//! columns instead of projecting them away.

use crate::algebra::constraint::Constraint;
use crate::algebra::expr::LinExpr;
use crate::algebra::operations;
use crate::algebra::set::{BasicSet, Set};
use crate::algebra::space::Tuple;
use crate::error::AlgebraError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single convex relation piece.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicMap {
    /// Input tuple space
    pub input: Tuple,
    /// Output tuple space
    pub output: Tuple,
    /// Number of existential columns after the input and output dimensions
    pub n_local: usize,
    /// Constraints over `[in | out | locals]`
    pub constraints: Vec<Constraint>,
}

impl BasicMap {
    /// Create a piece. Every constraint must span exactly the piece width.
    pub fn new(input: Tuple, output: Tuple, n_local: usize, constraints: Vec<Constraint>) -> Self {
        let n_cols = input.arity() + output.arity() + n_local;
        debug_assert!(constraints.iter().all(|c| c.expr.n_cols() == n_cols));
        Self {
            input,
            output,
            n_local,
            constraints,
        }
    }

    /// Input arity.
    pub fn n_in(&self) -> usize {
        self.input.arity()
    }

    /// Output arity.
    pub fn n_out(&self) -> usize {
        self.output.arity()
    }

    /// Total column count.
    pub fn n_cols(&self) -> usize {
        self.n_in() + self.n_out() + self.n_local
    }

    pub(crate) fn col_names(&self) -> Vec<String> {
        let mut names = self.input.dims.clone();
        // Disambiguate colliding output names the way a primed copy would.
        for d in &self.output.dims {
            if self.input.dims.contains(d) {
                names.push(format!("{}'", d));
            } else {
                names.push(d.clone());
            }
        }
        names.extend((0..self.n_local).map(|i| format!("e{}", i)));
        names
    }

    /// Emptiness over the integers.
    pub fn is_empty(&self) -> Result<bool, AlgebraError> {
        operations::is_empty(self.n_cols(), &self.constraints)
    }

    /// Swap input and output.
    pub fn reverse(&self) -> BasicMap {
        let n_in = self.n_in();
        let n_out = self.n_out();
        let n_cols = self.n_cols();
        let mapping: Vec<usize> = (n_out..n_out + n_in)
            .chain(0..n_out)
            .chain(n_in + n_out..n_cols)
            .collect();
        let constraints = self
            .constraints
            .iter()
            .map(|c| Constraint {
                expr: c.expr.remap(n_cols, &mapping),
                kind: c.kind,
            })
            .collect();
        BasicMap::new(self.output.clone(), self.input.clone(), self.n_local, constraints)
    }

    /// The input-space shadow of the piece, outputs demoted to locals.
    pub fn domain_piece(&self) -> BasicSet {
        BasicSet::new(
            self.input.clone(),
            self.n_out() + self.n_local,
            self.constraints.clone(),
        )
    }

    /// Wrap the piece as a set over `[in, out]` for reuse of set machinery.
    pub(crate) fn wrapped(&self) -> BasicSet {
        let mut dims = self.input.dims.clone();
        dims.extend(self.output.dims.iter().cloned());
        BasicSet::new(Tuple { name: None, dims }, self.n_local, self.constraints.clone())
    }

    fn unwrap_piece(input: &Tuple, output: &Tuple, piece: BasicSet) -> BasicMap {
        debug_assert_eq!(piece.n_dim(), input.arity() + output.arity());
        BasicMap::new(input.clone(), output.clone(), piece.n_local, piece.constraints)
    }

    fn render(&self) -> String {
        let names = self.col_names();
        let out_tuple = Tuple {
            name: self.output.name.clone(),
            dims: names[self.n_in()..self.n_in() + self.n_out()].to_vec(),
        };
        let mut body = format!("{} -> {}", self.input, out_tuple);
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

/// Compose two pieces sharing the mediating space: `a: A -> B`, `b: B -> C`
/// gives `A -> C` with the B dimensions demoted to locals.
fn compose_pair(a: &BasicMap, b: &BasicMap) -> BasicMap {
    debug_assert!(a.output.same_space(&b.input));
    let n_in = a.n_in();
    let n_mid = a.n_out();
    let n_out = b.n_out();
    let n_local = n_mid + a.n_local + b.n_local;
    let n_cols = n_in + n_out + n_local;
    let mid_base = n_in + n_out;

    let map_a: Vec<usize> = (0..n_in)
        .chain(mid_base..mid_base + n_mid)
        .chain(mid_base + n_mid..mid_base + n_mid + a.n_local)
        .collect();
    let map_b: Vec<usize> = (mid_base..mid_base + n_mid)
        .chain(n_in..n_in + n_out)
        .chain(mid_base + n_mid + a.n_local..n_cols)
        .collect();

    let mut constraints: Vec<Constraint> = Vec::new();
    for c in &a.constraints {
        constraints.push(Constraint {
            expr: c.expr.remap(n_cols, &map_a),
            kind: c.kind,
        });
    }
    for c in &b.constraints {
        constraints.push(Constraint {
            expr: c.expr.remap(n_cols, &map_b),
            kind: c.kind,
        });
    }
    BasicMap::new(
        a.input.clone(),
        b.output.clone(),
        n_local,
        operations::simplify_system(&constraints),
    )
}

/// A finite union of relation pieces, possibly across tuple spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Map {
    /// The pieces of the union; empty means the empty relation
    pub pieces: Vec<BasicMap>,
}

impl Map {
    /// The empty relation.
    pub fn empty() -> Self {
        Self { pieces: Vec::new() }
    }

    /// A relation with a single piece.
    pub fn from_piece(piece: BasicMap) -> Self {
        Self {
            pieces: vec![piece],
        }
    }

    /// A relation from several pieces.
    pub fn from_pieces(pieces: Vec<BasicMap>) -> Self {
        Self { pieces }
    }

    /// The relation sending every point of `set` to the empty tuple.
    pub fn zero_range_of(set: &Set) -> Map {
        let pieces = set
            .pieces
            .iter()
            .map(|p| BasicMap::new(p.tuple.clone(), Tuple::anonymous(0), p.n_local, p.constraints.clone()))
            .collect();
        Map { pieces }
    }

    /// Swap inputs and outputs.
    pub fn reverse(&self) -> Map {
        Map {
            pieces: self.pieces.iter().map(|p| p.reverse()).collect(),
        }
    }

    /// Composition on the range: `self: A -> B` with `other: B -> C`
    /// yields `A -> C`.
    pub fn apply_range(&self, other: &Map) -> Map {
        let mut pieces = Vec::new();
        for a in &self.pieces {
            for b in &other.pieces {
                if a.output.same_space(&b.input) {
                    pieces.push(compose_pair(a, b));
                }
            }
        }
        Map { pieces }
    }

    /// Composition on the domain: `self: A -> B` with `other: A -> C`
    /// yields `C -> B`.
    pub fn apply_domain(&self, other: &Map) -> Map {
        self.reverse().apply_range(other).reverse()
    }

    /// Restrict the inputs to a set.
    pub fn intersect_domain(&self, set: &Set) -> Map {
        let mut pieces = Vec::new();
        for m in &self.pieces {
            for s in &set.pieces {
                if !m.input.same_space(&s.tuple) {
                    continue;
                }
                let n_local = m.n_local + s.n_local;
                let n_cols = m.n_in() + m.n_out() + n_local;
                let mut constraints: Vec<Constraint> = m
                    .constraints
                    .iter()
                    .map(|c| Constraint {
                        expr: c.expr.extend_cols(s.n_local),
                        kind: c.kind,
                    })
                    .collect();
                let mapping: Vec<usize> = (0..s.n_dim())
                    .chain((0..s.n_local).map(|l| m.n_cols() + l))
                    .collect();
                for c in &s.constraints {
                    constraints.push(Constraint {
                        expr: c.expr.remap(n_cols, &mapping),
                        kind: c.kind,
                    });
                }
                pieces.push(BasicMap::new(
                    m.input.clone(),
                    m.output.clone(),
                    n_local,
                    operations::simplify_system(&constraints),
                ));
            }
        }
        Map { pieces }
    }

    /// Restrict the outputs to a set.
    pub fn intersect_range(&self, set: &Set) -> Map {
        self.reverse().intersect_domain(set).reverse()
    }

    /// Pairwise intersection over matching space pairs.
    pub fn intersect(&self, other: &Map) -> Result<Map, AlgebraError> {
        let mut pieces = Vec::new();
        for a in &self.pieces {
            for b in &other.pieces {
                if a.input.same_space(&b.input) && a.output.same_space(&b.output) {
                    let merged = a.wrapped().intersect(&b.wrapped())?;
                    pieces.push(BasicMap::unwrap_piece(&a.input, &a.output, merged));
                }
            }
        }
        Ok(Map { pieces })
    }

    /// Union; no space agreement is required.
    pub fn union(&self, other: &Map) -> Map {
        let mut pieces = self.pieces.clone();
        pieces.extend(other.pieces.iter().cloned());
        Map { pieces }
    }

    /// The set of inputs.
    pub fn domain(&self) -> Set {
        Set::from_pieces(self.pieces.iter().map(|p| p.domain_piece()).collect())
    }

    /// The set of outputs.
    pub fn range(&self) -> Set {
        self.reverse().domain()
    }

    /// The difference set `{ out - in }` of a relation whose pieces all
    /// relate a space to itself.
    pub fn deltas(&self) -> Result<Set, AlgebraError> {
        let mut pieces = Vec::new();
        for p in &self.pieces {
            if !p.input.same_space(&p.output) {
                return Err(AlgebraError::SpaceMismatch(format!(
                    "deltas of {} -> {}",
                    p.input, p.output
                )));
            }
            let n = p.n_in();
            let n_local = 2 * n + p.n_local;
            let n_cols = n + n_local;
            // old columns [in | out | locals] land at [n.. | 2n.. | 3n..]
            let mapping: Vec<usize> = (n..2 * n)
                .chain(2 * n..3 * n)
                .chain(3 * n..3 * n + p.n_local)
                .collect();
            let mut constraints: Vec<Constraint> = p
                .constraints
                .iter()
                .map(|c| Constraint {
                    expr: c.expr.remap(n_cols, &mapping),
                    kind: c.kind,
                })
                .collect();
            // d_k + in_k - out_k = 0
            for k in 0..n {
                let mut e = LinExpr::zero(n_cols);
                e.coeffs[k] = 1;
                e.coeffs[n + k] = 1;
                e.coeffs[2 * n + k] = -1;
                constraints.push(Constraint::eq_zero(e));
            }
            let tuple = Tuple {
                name: None,
                dims: (0..n).map(|i| format!("d{}", i)).collect(),
            };
            pieces.push(BasicSet::new(tuple, n_local, operations::simplify_system(&constraints)));
        }
        Ok(Set { pieces })
    }

    /// Pair two relations over the same inputs into one with concatenated
    /// outputs: `A -> B` with `A -> C` gives `A -> [B C]`.
    pub fn flat_range_product(&self, other: &Map) -> Map {
        let mut pieces = Vec::new();
        for a in &self.pieces {
            for b in &other.pieces {
                if !a.input.same_space(&b.input) {
                    continue;
                }
                let n_in = a.n_in();
                let (n_b, n_c) = (a.n_out(), b.n_out());
                let n_local = a.n_local + b.n_local;
                let n_cols = n_in + n_b + n_c + n_local;
                let map_a: Vec<usize> = (0..n_in + n_b)
                    .chain(n_in + n_b + n_c..n_in + n_b + n_c + a.n_local)
                    .collect();
                let map_b: Vec<usize> = (0..n_in)
                    .chain(n_in + n_b..n_in + n_b + n_c)
                    .chain(n_in + n_b + n_c + a.n_local..n_cols)
                    .collect();
                let mut constraints: Vec<Constraint> = Vec::new();
                for c in &a.constraints {
                    constraints.push(Constraint {
                        expr: c.expr.remap(n_cols, &map_a),
                        kind: c.kind,
                    });
                }
                for c in &b.constraints {
                    constraints.push(Constraint {
                        expr: c.expr.remap(n_cols, &map_b),
                        kind: c.kind,
                    });
                }
                pieces.push(BasicMap::new(
                    a.input.clone(),
                    Tuple::anonymous(n_b + n_c),
                    n_local,
                    operations::simplify_system(&constraints),
                ));
            }
        }
        Map { pieces }
    }

    /// Prepend a constant output dimension, turning `A -> [t...]` into
    /// `A -> [k, t...]`.
    pub fn prepend_const_out(&self, value: i64) -> Map {
        let pieces = self
            .pieces
            .iter()
            .map(|p| {
                let n_in = p.n_in();
                let n_cols = p.n_cols() + 1;
                // everything at or past the new column shifts right by one
                let mapping: Vec<usize> = (0..n_in).chain(n_in + 1..n_cols).collect();
                let mut constraints: Vec<Constraint> = p
                    .constraints
                    .iter()
                    .map(|c| Constraint {
                        expr: c.expr.remap(n_cols, &mapping),
                        kind: c.kind,
                    })
                    .collect();
                let mut e = LinExpr::var(n_in, n_cols);
                e.constant = -value;
                constraints.push(Constraint::eq_zero(e));
                BasicMap::new(
                    p.input.clone(),
                    Tuple::anonymous(p.n_out() + 1),
                    p.n_local,
                    constraints,
                )
            })
            .collect();
        Map { pieces }
    }

    /// Keep output dimensions `[start, start + len)` and demote the rest to
    /// existential columns.
    pub fn output_slice(&self, start: usize, len: usize) -> Map {
        let pieces = self
            .pieces
            .iter()
            .filter(|p| start + len <= p.n_out())
            .map(|p| {
                let n_in = p.n_in();
                let demoted = p.n_out() - len;
                let n_local = demoted + p.n_local;
                let n_cols = n_in + len + n_local;
                let mut mapping: Vec<usize> = (0..n_in).collect();
                let mut next_demoted = n_in + len;
                for j in 0..p.n_out() {
                    if j >= start && j < start + len {
                        mapping.push(n_in + (j - start));
                    } else {
                        mapping.push(next_demoted);
                        next_demoted += 1;
                    }
                }
                mapping.extend(next_demoted..next_demoted + p.n_local);
                let constraints = p
                    .constraints
                    .iter()
                    .map(|c| Constraint {
                        expr: c.expr.remap(n_cols, &mapping),
                        kind: c.kind,
                    })
                    .collect();
                BasicMap::new(p.input.clone(), Tuple::anonymous(len), n_local, constraints)
            })
            .collect();
        Map { pieces }
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

    /// Every (input point, output point) pair, labeled with tuple names.
    #[allow(clippy::type_complexity)]
    pub fn labeled_pairs(
        &self,
    ) -> Result<BTreeSet<(Option<String>, Vec<i64>, Option<String>, Vec<i64>)>, AlgebraError> {
        let mut out = BTreeSet::new();
        for p in &self.pieces {
            let n_in = p.n_in();
            let n_vis = n_in + p.n_out();
            for pt in operations::visible_points(p.n_cols(), n_vis, &p.constraints)? {
                out.insert((
                    p.input.name.clone(),
                    pt[..n_in].to_vec(),
                    p.output.name.clone(),
                    pt[n_in..].to_vec(),
                ));
            }
        }
        Ok(out)
    }

    /// Semantic equality: the same labeled pairs.
    pub fn is_equal(&self, other: &Map) -> Result<bool, AlgebraError> {
        Ok(self.labeled_pairs()? == other.labeled_pairs()?)
    }

    /// Drop empty pieces and merge piece pairs whose union stays convex.
    pub fn coalesce(&self) -> Result<Map, AlgebraError> {
        let mut live: Vec<BasicMap> = Vec::new();
        for p in &self.pieces {
            if !p.is_empty()? {
                live.push(p.clone());
            }
        }
        let mut merged = true;
        while merged {
            merged = false;
            'outer: for i in 0..live.len() {
                for j in (i + 1)..live.len() {
                    let (a, b) = (&live[i], &live[j]);
                    if !(a.input.same_space(&b.input) && a.output.same_space(&b.output)) {
                        continue;
                    }
                    if let Some(m) = crate::algebra::set::try_merge(&a.wrapped(), &b.wrapped())? {
                        live[i] = BasicMap::unwrap_piece(&a.input.clone(), &a.output.clone(), m);
                        live.remove(j);
                        merged = true;
                        break 'outer;
                    }
                }
            }
        }
        Ok(Map { pieces: live })
    }

    /// Upgrade implied equalities in every piece.
    pub fn detect_equalities(&self) -> Result<Map, AlgebraError> {
        let mut pieces = Vec::with_capacity(self.pieces.len());
        for p in &self.pieces {
            let d = p.wrapped().detect_equalities()?;
            pieces.push(BasicMap::unwrap_piece(&p.input, &p.output, d));
        }
        Ok(Map { pieces })
    }

    /// The common output arity, when every piece agrees on one.
    pub fn uniform_out_arity(&self) -> Option<usize> {
        let first = self.pieces.first()?.n_out();
        if self.pieces.iter().all(|p| p.n_out() == first) {
            Some(first)
        } else {
            None
        }
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pieces.is_empty() {
            return write!(f, "{{ }}");
        }
        let rendered: Vec<String> = self.pieces.iter().map(|p| p.render()).collect();
        write!(f, "{{ {} }}", rendered.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // { S[i] -> T[i + shift] : lo <= i <= hi }
    fn shift_piece(from: &str, to: &str, shift: i64, lo: i64, hi: i64) -> BasicMap {
        let mut lower = LinExpr::var(0, 2);
        lower.constant = -lo;
        let mut upper = -LinExpr::var(0, 2);
        upper.constant = hi;
        // o - i - shift = 0
        let mut link = LinExpr::zero(2);
        link.coeffs[0] = -1;
        link.coeffs[1] = 1;
        link.constant = -shift;
        BasicMap::new(
            Tuple::named(from, vec!["i".into()]),
            Tuple::named(to, vec!["o".into()]),
            0,
            vec![
                Constraint::ge_zero(lower),
                Constraint::ge_zero(upper),
                Constraint::eq_zero(link),
            ],
        )
    }

    #[test]
    fn test_reverse() {
        let m = Map::from_piece(shift_piece("S", "T", 1, 0, 2));
        let pairs = m.reverse().labeled_pairs().unwrap();
        assert!(pairs.contains(&(Some("T".into()), vec![1], Some("S".into()), vec![0])));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_apply_range_composes() {
        let a = Map::from_piece(shift_piece("S", "T", 1, 0, 3));
        let b = Map::from_piece(shift_piece("T", "U", 2, 0, 10));
        let c = a.apply_range(&b);
        let pairs = c.labeled_pairs().unwrap();
        assert!(pairs.contains(&(Some("S".into()), vec![0], Some("U".into()), vec![3])));
        assert_eq!(pairs.len(), 4);
    }

    #[test]
    fn test_apply_range_space_mismatch_is_empty() {
        let a = Map::from_piece(shift_piece("S", "T", 1, 0, 3));
        let b = Map::from_piece(shift_piece("U", "V", 1, 0, 3));
        assert!(a.apply_range(&b).pieces.is_empty());
    }

    #[test]
    fn test_domain_range() {
        let m = Map::from_piece(shift_piece("S", "T", 5, 0, 2));
        let d = m.domain().labeled_points().unwrap();
        assert_eq!(d.len(), 3);
        assert!(d.contains(&(Some("S".into()), vec![0])));
        let r = m.range().labeled_points().unwrap();
        assert!(r.contains(&(Some("T".into()), vec![7])));
    }

    #[test]
    fn test_deltas_constant_shift() {
        let m = Map::from_piece(shift_piece("S", "S", 1, 0, 3));
        let d = m.deltas().unwrap();
        let pts: Vec<Vec<i64>> = d.labeled_points().unwrap().into_iter().map(|(_, p)| p).collect();
        assert_eq!(pts, vec![vec![1]]);
    }

    #[test]
    fn test_deltas_mixed_space_rejected() {
        let m = Map::from_piece(shift_piece("S", "T", 1, 0, 3));
        assert!(matches!(m.deltas(), Err(AlgebraError::SpaceMismatch(_))));
    }

    #[test]
    fn test_flat_range_product() {
        let a = Map::from_piece(shift_piece("S", "T", 0, 0, 1));
        let b = Map::from_piece(shift_piece("S", "T", 10, 0, 1));
        let m = a.flat_range_product(&b);
        let pairs = m.labeled_pairs().unwrap();
        assert!(pairs.contains(&(Some("S".into()), vec![1], None, vec![1, 11])));
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_prepend_const_out() {
        let m = Map::from_piece(shift_piece("S", "T", 0, 0, 1)).prepend_const_out(3);
        let pairs = m.labeled_pairs().unwrap();
        assert!(pairs.contains(&(Some("S".into()), vec![0], None, vec![3, 0])));
    }

    #[test]
    fn test_intersect_domain() {
        let m = Map::from_piece(shift_piece("S", "T", 0, 0, 9));
        let narrow = {
            let mut lower = LinExpr::var(0, 1);
            lower.constant = -4;
            let mut upper = -LinExpr::var(0, 1);
            upper.constant = 5;
            Set::from_piece(BasicSet::new(
                Tuple::named("S", vec!["i".into()]),
                0,
                vec![Constraint::ge_zero(lower), Constraint::ge_zero(upper)],
            ))
        };
        let r = m.intersect_domain(&narrow);
        assert_eq!(r.labeled_pairs().unwrap().len(), 2);
    }

    #[test]
    fn test_coalesce_pieces() {
        let m = Map::from_pieces(vec![
            shift_piece("S", "S", 1, 0, 2),
            shift_piece("S", "S", 1, 3, 5),
        ]);
        let c = m.coalesce().unwrap();
        assert_eq!(c.pieces.len(), 1);
        assert!(c
            .is_equal(&Map::from_piece(shift_piece("S", "S", 1, 0, 5)))
            .unwrap());
    }
}
