//! Construction of schedule trees from flat schedule maps.

use crate::algebra::{Map, Set};
use crate::error::{PolyschedError, ScheduleError};
use crate::model::IterationDomain;
use crate::schedule::tree::{BandMember, Schedule, ScheduleNode};
use log::debug;
use std::sync::Arc;

fn members_for(schedule: &Map, range: std::ops::Range<usize>, coincident: &[usize]) -> Vec<BandMember> {
    let base = range.start;
    range
        .map(|dim| BandMember {
            schedule: schedule.output_slice(dim, 1),
            coincident: coincident.contains(&(dim - base)),
        })
        .collect()
}

fn check_coincident(indices: &[usize], members: usize) -> Result<(), ScheduleError> {
    for &index in indices {
        if index >= members {
            return Err(ScheduleError::CoincidentIndexOutOfRange { index, members });
        }
    }
    Ok(())
}

/// Build a two-band tree from a flat schedule: the first `split_at` time
/// dimensions form the outer band, the rest the inner band, member order
/// preserved. Coincidence indices are relative to their own band.
///
/// A split position outside `(0, k)` cannot produce two bands and yields
/// `Ok(None)`; a coincidence index outside its band is a malformed-input
/// error.
pub fn build_multiband(
    domain: &IterationDomain,
    schedule: &Map,
    split_at: usize,
    outer_coincident: &[usize],
    inner_coincident: &[usize],
) -> Result<Option<Schedule>, PolyschedError> {
    let Some(k) = schedule.uniform_out_arity() else {
        return Ok(None);
    };
    if split_at == 0 || split_at >= k {
        debug!("multiband: cannot split {} dims at {}", k, split_at);
        return Ok(None);
    }
    check_coincident(outer_coincident, split_at)?;
    check_coincident(inner_coincident, k - split_at)?;

    let inner = ScheduleNode::Band {
        members: members_for(schedule, split_at..k, inner_coincident),
        child: Arc::new(ScheduleNode::Leaf),
    };
    let outer = ScheduleNode::Band {
        members: members_for(schedule, 0..split_at, outer_coincident),
        child: Arc::new(inner),
    };
    let tree = Schedule::new(ScheduleNode::Domain {
        domain: domain.set().clone(),
        child: Arc::new(outer),
    })?;
    Ok(Some(tree))
}

/// Build a fused tree: one band carrying every time dimension over the whole
/// domain. Members start without coincidence flags.
pub fn arrange_fused(domain: &IterationDomain, schedule: &Map) -> Result<Option<Schedule>, PolyschedError> {
    let Some(k) = schedule.uniform_out_arity() else {
        return Ok(None);
    };
    let band = ScheduleNode::Band {
        members: members_for(schedule, 0..k, &[]),
        child: Arc::new(ScheduleNode::Leaf),
    };
    let tree = Schedule::new(ScheduleNode::Domain {
        domain: domain.set().clone(),
        child: Arc::new(band),
    })?;
    Ok(Some(tree))
}

/// Build a fissioned tree: a sequence of filter-band branches, one per
/// filter, in caller order. Whether the filters partition the domain is the
/// caller's responsibility. An empty filter list yields `Ok(None)`.
pub fn arrange_fissioned(
    domain: &IterationDomain,
    schedule: &Map,
    filters: &[Set],
) -> Result<Option<Schedule>, PolyschedError> {
    if filters.is_empty() {
        debug!("fission: no filters supplied");
        return Ok(None);
    }
    let Some(k) = schedule.uniform_out_arity() else {
        return Ok(None);
    };
    let children = filters
        .iter()
        .map(|f| {
            Arc::new(ScheduleNode::Filter {
                filter: f.clone(),
                child: Arc::new(ScheduleNode::Band {
                    members: members_for(schedule, 0..k, &[]),
                    child: Arc::new(ScheduleNode::Leaf),
                }),
            })
        })
        .collect();
    let tree = Schedule::new(ScheduleNode::Domain {
        domain: domain.set().clone(),
        child: Arc::new(ScheduleNode::Sequence { children }),
    })?;
    Ok(Some(tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::Map;

    fn fixtures() -> (IterationDomain, Map) {
        let domain =
            IterationDomain::parse("{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }").unwrap();
        let theta = Map::parse("{ S[i, j] -> [i, j] }").unwrap();
        (domain, theta)
    }

    #[test]
    fn test_multiband_shape() {
        let (domain, theta) = fixtures();
        let tree = build_multiband(&domain, &theta, 1, &[], &[0]).unwrap().unwrap();
        let outer = tree.node_at(&[0]).unwrap();
        let ScheduleNode::Band { members, .. } = &**outer else {
            panic!("expected outer band");
        };
        assert_eq!(members.len(), 1);
        assert!(!members[0].coincident);
        let inner = tree.node_at(&[0, 0]).unwrap();
        let ScheduleNode::Band { members, .. } = &**inner else {
            panic!("expected inner band");
        };
        assert_eq!(members.len(), 1);
        assert!(members[0].coincident);
        assert_eq!(tree.node_at(&[0, 0, 0]).unwrap().kind(), "leaf");
    }

    #[test]
    fn test_multiband_flattens_back() {
        let (domain, theta) = fixtures();
        let tree = build_multiband(&domain, &theta, 1, &[], &[]).unwrap().unwrap();
        let flat = tree.schedule_map().unwrap();
        let expected =
            Map::parse("{ S[i, j] -> [i, j] : 0 <= i < 4 and 0 <= j < 4 }").unwrap();
        assert!(flat.is_equal(&expected).unwrap());
    }

    #[test]
    fn test_multiband_bad_split_is_none() {
        let (domain, theta) = fixtures();
        assert!(build_multiband(&domain, &theta, 0, &[], &[]).unwrap().is_none());
        assert!(build_multiband(&domain, &theta, 2, &[], &[]).unwrap().is_none());
    }

    #[test]
    fn test_multiband_coincident_out_of_range() {
        let (domain, theta) = fixtures();
        let res = build_multiband(&domain, &theta, 1, &[1], &[]);
        assert!(matches!(
            res,
            Err(PolyschedError::Schedule(ScheduleError::CoincidentIndexOutOfRange {
                index: 1,
                members: 1,
            }))
        ));
    }

    #[test]
    fn test_fused_single_band() {
        let (domain, theta) = fixtures();
        let tree = arrange_fused(&domain, &theta).unwrap().unwrap();
        let ScheduleNode::Band { members, .. } = &**tree.node_at(&[0]).unwrap() else {
            panic!("expected band");
        };
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn test_fission_branches_in_order() {
        let domain = IterationDomain::parse("{ S[i] : 0 <= i < 2; T[i] : 0 <= i < 2 }").unwrap();
        let theta = Map::parse("{ S[i] -> [i]; T[i] -> [i] }").unwrap();
        let filters = vec![
            Set::parse("{ T[i] }").unwrap(),
            Set::parse("{ S[i] }").unwrap(),
        ];
        let tree = arrange_fissioned(&domain, &theta, &filters).unwrap().unwrap();
        assert_eq!(tree.node_at(&[0]).unwrap().kind(), "sequence");
        assert_eq!(tree.node_at(&[0, 0]).unwrap().kind(), "filter");
        assert_eq!(tree.node_at(&[0, 0, 0]).unwrap().kind(), "band");
        // T runs first under the flattened order
        let flat = tree.schedule_map().unwrap();
        let expected = Map::parse("{ T[i] -> [0, i] : 0 <= i < 2; S[i] -> [1, i] : 0 <= i < 2 }")
            .unwrap();
        assert!(flat.is_equal(&expected).unwrap());
    }

    #[test]
    fn test_fission_empty_filters_is_none() {
        let (domain, theta) = fixtures();
        assert!(arrange_fissioned(&domain, &theta, &[]).unwrap().is_none());
    }
}
