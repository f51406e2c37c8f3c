//! Band tiling: rewrite one band into a tile band over a point band.

use crate::algebra::{BasicMap, Constraint, LinExpr, Map, Tuple};
use crate::error::PolyschedError;
use crate::schedule::tree::{BandMember, Schedule, ScheduleNode};
use log::debug;
use std::sync::Arc;

/// `{ s -> [q] : exists t: (s, t) in member, size*q <= t < size*(q + 1) }`
fn tile_member(member: &Map, size: i64) -> Map {
    let pieces = member
        .pieces
        .iter()
        .map(|p| {
            let n_in = p.n_in();
            let n_local = 1 + p.n_local;
            let n_cols = n_in + 1 + n_local;
            // t moves to the first local slot, q takes the output
            let t = n_in + 1;
            let mapping: Vec<usize> = (0..n_in).chain(t..t + 1).chain(t + 1..t + 1 + p.n_local).collect();
            let mut constraints: Vec<Constraint> = p
                .constraints
                .iter()
                .map(|c| Constraint {
                    expr: c.expr.remap(n_cols, &mapping),
                    kind: c.kind,
                })
                .collect();
            // t - size*q >= 0
            let mut lower = LinExpr::zero(n_cols);
            lower.coeffs[t] = 1;
            lower.coeffs[n_in] = -size;
            constraints.push(Constraint::ge_zero(lower));
            // size*q + size - 1 - t >= 0
            let mut upper = LinExpr::zero(n_cols);
            upper.coeffs[n_in] = size;
            upper.coeffs[t] = -1;
            upper.constant = size - 1;
            constraints.push(Constraint::ge_zero(upper));
            BasicMap::new(p.input.clone(), Tuple::anonymous(1), n_local, constraints)
        })
        .collect();
    Map::from_pieces(pieces)
}

/// `{ s -> [r] : exists t, q: (s, t) in member, t = size*q + r, 0 <= r < size }`
fn point_member(member: &Map, size: i64) -> Map {
    let pieces = member
        .pieces
        .iter()
        .map(|p| {
            let n_in = p.n_in();
            let n_local = 2 + p.n_local;
            let n_cols = n_in + 1 + n_local;
            let r = n_in;
            let t = n_in + 1;
            let q = n_in + 2;
            let mapping: Vec<usize> = (0..n_in).chain(t..t + 1).chain(q + 1..q + 1 + p.n_local).collect();
            let mut constraints: Vec<Constraint> = p
                .constraints
                .iter()
                .map(|c| Constraint {
                    expr: c.expr.remap(n_cols, &mapping),
                    kind: c.kind,
                })
                .collect();
            // t - size*q - r = 0
            let mut link = LinExpr::zero(n_cols);
            link.coeffs[t] = 1;
            link.coeffs[q] = -size;
            link.coeffs[r] = -1;
            constraints.push(Constraint::eq_zero(link));
            constraints.push(Constraint::ge_zero(LinExpr::var(r, n_cols)));
            let mut upper = -LinExpr::var(r, n_cols);
            upper.constant = size - 1;
            constraints.push(Constraint::ge_zero(upper));
            BasicMap::new(p.input.clone(), Tuple::anonymous(1), n_local, constraints)
        })
        .collect();
    Map::from_pieces(pieces)
}

/// Tile the band addressed by `path` with the given sizes, one per member.
///
/// The band is replaced by a tile band (member divided by its size, rounded
/// toward negative infinity) over a point band (member reduced modulo its
/// size); the original child subtree hangs below the point band, and both
/// new members inherit the original coincidence flag.
///
/// A non-band target, a size-count mismatch, or a nonpositive size yields
/// `Ok(None)`; a path stepping outside the tree is a malformed-input error.
pub fn tile_band(
    schedule: &Schedule,
    path: &[usize],
    sizes: &[i64],
) -> Result<Option<Schedule>, PolyschedError> {
    let node = schedule.node_at(path).map_err(PolyschedError::from)?;
    let ScheduleNode::Band { members, child } = &**node else {
        debug!("tiling: target at {:?} is a {} node", path, node.kind());
        return Ok(None);
    };
    if sizes.len() != members.len() || sizes.iter().any(|&s| s <= 0) {
        debug!("tiling: sizes {:?} do not fit {} members", sizes, members.len());
        return Ok(None);
    }
    if members
        .iter()
        .any(|m| m.schedule.pieces.iter().any(|p| p.n_out() != 1))
    {
        return Ok(None);
    }

    let mut tile_members = Vec::with_capacity(members.len());
    let mut point_members = Vec::with_capacity(members.len());
    for (m, &size) in members.iter().zip(sizes) {
        tile_members.push(BandMember {
            schedule: tile_member(&m.schedule, size),
            coincident: m.coincident,
        });
        point_members.push(BandMember {
            schedule: point_member(&m.schedule, size),
            coincident: m.coincident,
        });
    }
    let replacement = ScheduleNode::Band {
        members: tile_members,
        child: Arc::new(ScheduleNode::Band {
            members: point_members,
            child: child.clone(),
        }),
    };
    Ok(Some(schedule.replace_at(path, replacement)?))
}
