//! Collection of vectorization candidates from coincident band members.

use crate::schedule::tree::{Schedule, ScheduleNode};
use std::collections::{BTreeMap, BTreeSet};

/// Walk every band of the tree and report, per statement, the coincident
/// members that cover it: `(band depth, member index)` pairs, where band
/// depth counts Band ancestors from the root starting at zero.
///
/// Lists are duplicate-free and sorted by depth, then member index. A tree
/// without coincident members yields an empty mapping.
pub fn collect_vectorization_candidates(
    schedule: &Schedule,
) -> BTreeMap<String, Vec<(usize, usize)>> {
    let mut found: BTreeMap<String, BTreeSet<(usize, usize)>> = BTreeMap::new();
    walk(schedule.root(), 0, &BTreeSet::new(), &mut found);
    found
        .into_iter()
        .map(|(stmt, pairs)| (stmt, pairs.into_iter().collect()))
        .collect()
}

/// Returns the statements reachable in leaves beneath `node`, recording
/// coincident members along the way.
fn walk(
    node: &ScheduleNode,
    band_depth: usize,
    current: &BTreeSet<String>,
    found: &mut BTreeMap<String, BTreeSet<(usize, usize)>>,
) -> BTreeSet<String> {
    match node {
        ScheduleNode::Domain { domain, child } => {
            walk(child, 0, &domain.statement_names(), found)
        }
        ScheduleNode::Leaf => current.clone(),
        ScheduleNode::Filter { filter, child } => {
            let narrowed: BTreeSet<String> = current
                .intersection(&filter.statement_names())
                .cloned()
                .collect();
            walk(child, band_depth, &narrowed, found)
        }
        ScheduleNode::Sequence { children } => {
            let mut reach = BTreeSet::new();
            for c in children {
                reach.extend(walk(c, band_depth, current, found));
            }
            reach
        }
        ScheduleNode::Band { members, child } => {
            let reach = walk(child, band_depth + 1, current, found);
            for (index, m) in members.iter().enumerate() {
                if m.coincident {
                    for stmt in &reach {
                        found
                            .entry(stmt.clone())
                            .or_default()
                            .insert((band_depth, index));
                    }
                }
            }
            reach
        }
    }
}
