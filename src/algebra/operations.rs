//! Core operations on raw constraint systems: bound derivation, bounded
//! lexicographic enumeration, and Fourier-Motzkin projection.
//!
//! Everything here works on a flat column vector; the set/map layers assign
//! meaning (visible dimension, existential dimension) to the columns.

use crate::algebra::constraint::{Constraint, ConstraintKind};
use crate::algebra::expr::LinExpr;
use crate::error::AlgebraError;
use std::collections::BTreeSet;

/// Hard cap on enumerated points, to keep a mistakenly huge query from
/// spinning instead of failing.
const ENUMERATION_CAP: usize = 1 << 20;

/// Normalize a system: gcd-tighten every constraint, drop trivially true
/// ones, and deduplicate.
pub(crate) fn simplify_system(cs: &[Constraint]) -> Vec<Constraint> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for c in cs {
        let n = c.normalized();
        if n.is_trivially_true() {
            continue;
        }
        let key = (n.kind, n.expr.constant, n.expr.coeffs.clone());
        if seen.insert(key) {
            out.push(n);
        }
    }
    out
}

/// True when the system contains a constant contradiction.
pub(crate) fn obviously_empty(cs: &[Constraint]) -> bool {
    cs.iter().any(|c| c.normalized().is_trivially_infeasible())
}

fn ceil_div(a: i128, b: i128) -> i128 {
    debug_assert!(b > 0);
    let q = a.div_euclid(b);
    if a.rem_euclid(b) != 0 {
        q + 1
    } else {
        q
    }
}

fn floor_div(a: i128, b: i128) -> i128 {
    debug_assert!(b > 0);
    a.div_euclid(b)
}

/// Per-column intervals; `None` bounds mean unbounded in that direction.
type Intervals = Vec<(Option<i128>, Option<i128>)>;

/// Largest value `coeff * x` can take for x in the interval, if finite.
fn term_max(coeff: i64, iv: (Option<i128>, Option<i128>)) -> Option<i128> {
    let c = coeff as i128;
    if c == 0 {
        return Some(0);
    }
    if c > 0 {
        iv.1.map(|hi| c * hi)
    } else {
        iv.0.map(|lo| c * lo)
    }
}

/// Smallest value `coeff * x` can take for x in the interval, if finite.
fn term_min(coeff: i64, iv: (Option<i128>, Option<i128>)) -> Option<i128> {
    let c = coeff as i128;
    if c == 0 {
        return Some(0);
    }
    if c > 0 {
        iv.0.map(|lo| c * lo)
    } else {
        iv.1.map(|hi| c * hi)
    }
}

/// Derive constant per-column bounds by interval propagation over the
/// constraints. Equalities act as opposing inequality pairs. Returns an
/// error when some column cannot be bounded on both sides.
pub(crate) fn bounds(n_cols: usize, cs: &[Constraint]) -> Result<Vec<(i64, i64)>, AlgebraError> {
    if n_cols == 0 {
        return Ok(Vec::new());
    }

    // Work on inequalities only.
    let mut ineqs: Vec<LinExpr> = Vec::new();
    for c in cs {
        match c.kind {
            ConstraintKind::Inequality => ineqs.push(c.expr.clone()),
            ConstraintKind::Equality => {
                ineqs.push(c.expr.clone());
                ineqs.push(-c.expr.clone());
            }
        }
    }

    let mut iv: Intervals = vec![(None, None); n_cols];
    let max_rounds = 4 * n_cols + 8;
    for _ in 0..max_rounds {
        let mut changed = false;
        for e in &ineqs {
            for k in 0..n_cols {
                let a = e.coeff(k);
                if a == 0 {
                    continue;
                }
                // a*x_k >= -(constant + rest); bound rest from above.
                let mut rest_max: Option<i128> = Some(e.constant as i128);
                for j in 0..n_cols {
                    if j == k {
                        continue;
                    }
                    rest_max = match (rest_max, term_max(e.coeff(j), iv[j])) {
                        (Some(acc), Some(t)) => Some(acc + t),
                        _ => None,
                    };
                    if rest_max.is_none() {
                        break;
                    }
                }
                let Some(rm) = rest_max else { continue };
                if a > 0 {
                    let lo = ceil_div(-rm, a as i128);
                    if iv[k].0.map_or(true, |old| lo > old) {
                        iv[k].0 = Some(lo);
                        changed = true;
                    }
                } else {
                    let hi = floor_div(rm, (-a) as i128);
                    if iv[k].1.map_or(true, |old| hi < old) {
                        iv[k].1 = Some(hi);
                        changed = true;
                    }
                }
            }
        }
        if !changed {
            break;
        }
        // An inverted interval means the system has no integer point; report
        // empty ranges so callers see emptiness, not a bounding failure for
        // columns the cut-short propagation never reached.
        if iv
            .iter()
            .any(|&(lo, hi)| matches!((lo, hi), (Some(l), Some(h)) if l > h))
        {
            return Ok(vec![(0, -1); n_cols]);
        }
    }

    let mut out = Vec::with_capacity(n_cols);
    for (k, &(lo, hi)) in iv.iter().enumerate() {
        let (l, h) = match (lo, hi) {
            (Some(l), Some(h)) => (l, h),
            // propagation could not seed this column; project the others away
            _ => projected_interval(n_cols, cs, k)?,
        };
        let l = i64::try_from(l).map_err(|_| AlgebraError::Unbounded(format!("column {}", k)))?;
        let h = i64::try_from(h).map_err(|_| AlgebraError::Unbounded(format!("column {}", k)))?;
        out.push((l, h));
    }
    Ok(out)
}

/// Interval for one column after eliminating every other column by exact
/// projection. Covers systems interval propagation cannot seed, such as
/// rotated polytopes whose individual constraints bound no column alone.
fn projected_interval(
    n_cols: usize,
    cs: &[Constraint],
    col: usize,
) -> Result<(i128, i128), AlgebraError> {
    let others: Vec<usize> = (0..n_cols).filter(|&j| j != col).collect();
    let reduced = match project_cols(n_cols, cs, &others) {
        Ok(r) => r,
        Err(AlgebraError::InexactProjection) => {
            return Err(AlgebraError::Unbounded(format!("column {}", col)))
        }
        Err(e) => return Err(e),
    };
    if obviously_empty(&reduced) {
        return Ok((0, -1));
    }
    let mut lo: Option<i128> = None;
    let mut hi: Option<i128> = None;
    let mut consider = |e: &LinExpr| {
        let a = e.coeff(0) as i128;
        let b = e.constant as i128;
        if a > 0 {
            let l = ceil_div(-b, a);
            if lo.map_or(true, |old| l > old) {
                lo = Some(l);
            }
        } else if a < 0 {
            let h = floor_div(b, -a);
            if hi.map_or(true, |old| h < old) {
                hi = Some(h);
            }
        }
    };
    for c in &reduced {
        consider(&c.expr);
        if c.is_equality() {
            consider(&-c.expr.clone());
        }
    }
    match (lo, hi) {
        (Some(l), Some(h)) => Ok((l, h)),
        _ => Err(AlgebraError::Unbounded(format!("column {}", col))),
    }
}

/// Can the partially assigned point still satisfy the constraint, given the
/// intervals of the unassigned columns?
fn prefix_feasible(c: &Constraint, assigned: &[i64], iv: &[(i64, i64)]) -> bool {
    let k = assigned.len();
    let mut fixed = c.expr.constant as i128;
    for (j, &v) in assigned.iter().enumerate() {
        fixed += c.expr.coeff(j) as i128 * v as i128;
    }
    let mut rem_min = 0i128;
    let mut rem_max = 0i128;
    for j in k..c.expr.n_cols() {
        let a = c.expr.coeff(j) as i128;
        if a == 0 {
            continue;
        }
        let (lo, hi) = (iv[j].0 as i128, iv[j].1 as i128);
        if a > 0 {
            rem_min += a * lo;
            rem_max += a * hi;
        } else {
            rem_min += a * hi;
            rem_max += a * lo;
        }
    }
    match c.kind {
        ConstraintKind::Inequality => fixed + rem_max >= 0,
        ConstraintKind::Equality => fixed + rem_max >= 0 && fixed + rem_min <= 0,
    }
}

fn dfs(
    n_cols: usize,
    cs: &[Constraint],
    iv: &[(i64, i64)],
    current: &mut Vec<i64>,
    all: Option<&mut Vec<Vec<i64>>>,
) -> Result<Option<Vec<i64>>, AlgebraError> {
    if current.len() == n_cols {
        if cs.iter().all(|c| c.is_satisfied(current)) {
            if let Some(sink) = all {
                if sink.len() >= ENUMERATION_CAP {
                    return Err(AlgebraError::Unbounded("enumeration too large".into()));
                }
                sink.push(current.clone());
                return Ok(None);
            }
            return Ok(Some(current.clone()));
        }
        return Ok(None);
    }
    let k = current.len();
    let (lo, hi) = iv[k];
    let mut sink = all;
    for v in lo..=hi {
        current.push(v);
        let viable = cs.iter().all(|c| prefix_feasible(c, current, iv));
        if viable {
            let found = dfs(n_cols, cs, iv, current, sink.as_deref_mut())?;
            if found.is_some() {
                current.pop();
                return Ok(found);
            }
        }
        current.pop();
    }
    Ok(None)
}

/// Lexicographically smallest integer point of the system, or `None` when
/// the system is empty. Column order is the lexicographic significance
/// order, most significant first.
pub(crate) fn lexmin(n_cols: usize, cs: &[Constraint]) -> Result<Option<Vec<i64>>, AlgebraError> {
    let cs = simplify_system(cs);
    if obviously_empty(&cs) {
        return Ok(None);
    }
    if n_cols == 0 {
        return Ok(Some(Vec::new()));
    }
    let iv = bounds(n_cols, &cs)?;
    if iv.iter().any(|&(lo, hi)| lo > hi) {
        return Ok(None);
    }
    dfs(n_cols, &cs, &iv, &mut Vec::new(), None)
}

/// All integer points of the system, in lexicographic order.
pub(crate) fn enumerate(n_cols: usize, cs: &[Constraint]) -> Result<Vec<Vec<i64>>, AlgebraError> {
    let cs = simplify_system(cs);
    if obviously_empty(&cs) {
        return Ok(Vec::new());
    }
    if n_cols == 0 {
        return Ok(vec![Vec::new()]);
    }
    let iv = bounds(n_cols, &cs)?;
    if iv.iter().any(|&(lo, hi)| lo > hi) {
        return Ok(Vec::new());
    }
    let mut all = Vec::new();
    dfs(n_cols, &cs, &iv, &mut Vec::new(), Some(&mut all))?;
    Ok(all)
}

/// Emptiness of the system.
pub(crate) fn is_empty(n_cols: usize, cs: &[Constraint]) -> Result<bool, AlgebraError> {
    Ok(lexmin(n_cols, cs)?.is_none())
}

/// Points projected to the first `n_vis` columns, deduplicated.
pub(crate) fn visible_points(
    n_cols: usize,
    n_vis: usize,
    cs: &[Constraint],
) -> Result<BTreeSet<Vec<i64>>, AlgebraError> {
    let mut out = BTreeSet::new();
    for p in enumerate(n_cols, cs)? {
        out.insert(p[..n_vis].to_vec());
    }
    Ok(out)
}

/// Eliminate one column by exact integer projection.
///
/// A unit-coefficient equality on the column is used for direct
/// substitution; otherwise Fourier-Motzkin pairing applies, which is exact
/// over the integers when at least one coefficient of every lower/upper pair
/// is a unit. A pairing that would lose exactness is refused.
pub(crate) fn project_col(
    n_cols: usize,
    cs: &[Constraint],
    col: usize,
) -> Result<Vec<Constraint>, AlgebraError> {
    debug_assert!(col < n_cols);
    let cs = simplify_system(cs);

    // Substitution through a unit equality: a*x + r = 0 with a = +-1 gives
    // x = -a*r, so b*x + s becomes s - (a*b)*r.
    if let Some(eq) = cs
        .iter()
        .find(|c| c.is_equality() && c.expr.coeff(col).abs() == 1)
    {
        let a = eq.expr.coeff(col);
        let mut r = eq.expr.clone();
        r.coeffs[col] = 0;
        let mut out = Vec::new();
        for c in &cs {
            if std::ptr::eq(c, eq) {
                continue;
            }
            let b = c.expr.coeff(col);
            let mut e = c.expr.clone();
            e.coeffs[col] = 0;
            if b != 0 {
                e = e - r.scale(a * b);
            }
            out.push(Constraint {
                expr: e.drop_col(col),
                kind: c.kind,
            });
        }
        return Ok(simplify_system(&out));
    }

    // Classify; remaining equalities on the column split into two
    // inequalities.
    let mut lowers: Vec<LinExpr> = Vec::new();
    let mut uppers: Vec<LinExpr> = Vec::new();
    let mut out: Vec<Constraint> = Vec::new();
    for c in &cs {
        let a = c.expr.coeff(col);
        if a == 0 {
            out.push(Constraint {
                expr: c.expr.drop_col(col),
                kind: c.kind,
            });
            continue;
        }
        match c.kind {
            ConstraintKind::Inequality => {
                if a > 0 {
                    lowers.push(c.expr.clone());
                } else {
                    uppers.push(c.expr.clone());
                }
            }
            ConstraintKind::Equality => {
                if a > 0 {
                    lowers.push(c.expr.clone());
                    uppers.push(-c.expr.clone());
                } else {
                    lowers.push(-c.expr.clone());
                    uppers.push(c.expr.clone());
                }
            }
        }
    }

    for l in &lowers {
        let a = l.coeff(col);
        for u in &uppers {
            let b = -u.coeff(col);
            debug_assert!(a > 0 && b > 0);
            if a != 1 && b != 1 {
                return Err(AlgebraError::InexactProjection);
            }
            let combined = l.scale(b) + u.scale(a);
            debug_assert_eq!(combined.coeff(col), 0);
            out.push(Constraint::ge_zero(combined.drop_col(col)));
        }
    }
    Ok(simplify_system(&out))
}

/// Eliminate several columns, highest index first so the remaining indices
/// stay valid.
pub(crate) fn project_cols(
    n_cols: usize,
    cs: &[Constraint],
    cols: &[usize],
) -> Result<Vec<Constraint>, AlgebraError> {
    let mut sorted: Vec<usize> = cols.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut cs = cs.to_vec();
    let mut n = n_cols;
    for &col in sorted.iter().rev() {
        cs = project_col(n, &cs, col)?;
        n -= 1;
    }
    Ok(cs)
}
