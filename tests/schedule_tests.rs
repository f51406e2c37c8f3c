//! Integration tests for schedule-tree construction and transformation.

use polysched::prelude::*;
use std::collections::BTreeMap;

fn square_domain() -> IterationDomain {
    IterationDomain::parse("{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }").unwrap()
}

fn identity_theta() -> Map {
    Map::parse("{ S[i, j] -> [i, j] }").unwrap()
}

#[test]
fn test_multiband_split_shapes_and_flags() {
    let tree = build_multiband(&square_domain(), &identity_theta(), 1, &[], &[0])
        .unwrap()
        .unwrap();

    let ScheduleNode::Band { members, .. } = &**tree.node_at(&[0]).unwrap() else {
        panic!("expected outer band");
    };
    assert_eq!(members.len(), 1);
    assert!(!members[0].coincident);

    let ScheduleNode::Band { members, .. } = &**tree.node_at(&[0, 0]).unwrap() else {
        panic!("expected inner band");
    };
    assert_eq!(members.len(), 1);
    assert!(members[0].coincident);

    assert_eq!(tree.node_at(&[0, 0, 0]).unwrap().kind(), "leaf");
}

#[test]
fn test_multiband_unsplittable_one_dim() {
    let domain = IterationDomain::parse("{ S[i] : 0 <= i < 4 }").unwrap();
    let theta = Map::parse("{ S[i] -> [i] }").unwrap();
    assert!(build_multiband(&domain, &theta, 1, &[], &[]).unwrap().is_none());
}

#[test]
fn test_multiband_schedule_map_matches_flat_input() {
    let tree = build_multiband(&square_domain(), &identity_theta(), 1, &[], &[])
        .unwrap()
        .unwrap();
    let flat = tree.schedule_map().unwrap();
    let expected = Map::parse("{ S[i, j] -> [i, j] : 0 <= i < 4 and 0 <= j < 4 }").unwrap();
    assert!(flat.is_equal(&expected).unwrap());
}

#[test]
fn test_fusion_interleaves_statements() {
    let domain = IterationDomain::parse("{ S[i] : 0 <= i < 2; T[i] : 0 <= i < 2 }").unwrap();
    let theta = Map::parse("{ S[i] -> [i]; T[i] -> [i] }").unwrap();
    let tree = arrange_fused(&domain, &theta).unwrap().unwrap();

    assert_eq!(tree.node_at(&[0]).unwrap().kind(), "band");
    let flat = tree.schedule_map().unwrap();
    // both statements land at the same time coordinates
    let expected =
        Map::parse("{ S[i] -> [i] : 0 <= i < 2; T[i] -> [i] : 0 <= i < 2 }").unwrap();
    assert!(flat.is_equal(&expected).unwrap());
}

#[test]
fn test_fission_runs_filters_in_caller_order() {
    let domain = IterationDomain::parse("{ S[i] : 0 <= i < 2; T[i] : 0 <= i < 2 }").unwrap();
    let theta = Map::parse("{ S[i] -> [i]; T[i] -> [i] }").unwrap();
    let filters = vec![Set::parse("{ T[i] }").unwrap(), Set::parse("{ S[i] }").unwrap()];
    let tree = arrange_fissioned(&domain, &theta, &filters).unwrap().unwrap();

    assert_eq!(tree.node_at(&[0]).unwrap().kind(), "sequence");
    let flat = tree.schedule_map().unwrap();
    let expected =
        Map::parse("{ T[i] -> [0, i] : 0 <= i < 2; S[i] -> [1, i] : 0 <= i < 2 }").unwrap();
    assert!(flat.is_equal(&expected).unwrap());
}

#[test]
fn test_fission_without_filters_is_none() {
    assert!(arrange_fissioned(&square_domain(), &identity_theta(), &[])
        .unwrap()
        .is_none());
}

#[test]
fn test_tiling_2x2_preserves_flags_pairwise() {
    let tree = build_multiband(&square_domain(), &identity_theta(), 1, &[0], &[0])
        .unwrap()
        .unwrap();
    // collapse to one fused band first so one node holds both members
    let fused = arrange_fused(&square_domain(), &identity_theta()).unwrap().unwrap();
    let tiled = tile_band(&fused, &[0], &[2, 2]).unwrap().unwrap();

    let ScheduleNode::Band { members, child } = &**tiled.node_at(&[0]).unwrap() else {
        panic!("expected tile band");
    };
    assert_eq!(members.len(), 2);
    let ScheduleNode::Band { members: points, .. } = &**child else {
        panic!("expected point band");
    };
    assert_eq!(points.len(), 2);

    // tiling the coincident inner band of the split tree keeps both new
    // members coincident
    let tiled = tile_band(&tree, &[0, 0], &[2]).unwrap().unwrap();
    let ScheduleNode::Band { members, child } = &**tiled.node_at(&[0, 0]).unwrap() else {
        panic!("expected tile band");
    };
    assert!(members[0].coincident);
    let ScheduleNode::Band { members: points, .. } = &**child else {
        panic!("expected point band");
    };
    assert!(points[0].coincident);
}

#[test]
fn test_tiling_semantics_floor_and_mod() {
    let fused = arrange_fused(&square_domain(), &identity_theta()).unwrap().unwrap();
    let tiled = tile_band(&fused, &[0], &[2, 2]).unwrap().unwrap();
    let flat = tiled.schedule_map().unwrap();
    let expected = Map::parse(
        "{ S[i, j] -> [ti, tj, pi, pj] : exists qi, qj: \
         0 <= i < 4 and 0 <= j < 4 and \
         i = 2*qi + pi and 0 <= pi < 2 and ti = qi and \
         j = 2*qj + pj and 0 <= pj < 2 and tj = qj }",
    )
    .unwrap();
    assert!(flat.is_equal(&expected).unwrap());
}

#[test]
fn test_tiling_arity_mismatch_is_none() {
    let fused = arrange_fused(&square_domain(), &identity_theta()).unwrap().unwrap();
    assert!(tile_band(&fused, &[0], &[2]).unwrap().is_none());
    assert!(tile_band(&fused, &[0, 0], &[2, 2]).unwrap().is_none());
}

#[test]
fn test_vectorization_candidates_per_statement() {
    let domain = IterationDomain::parse(
        "{ S[i, j] : 0 <= i < 2 and 0 <= j < 2; T[i, j] : 0 <= i < 2 and 0 <= j < 2 }",
    )
    .unwrap();
    let theta = Map::parse("{ S[i, j] -> [i, j]; T[i, j] -> [i, j] }").unwrap();
    let tree = build_multiband(&domain, &theta, 1, &[], &[0]).unwrap().unwrap();

    let got = collect_vectorization_candidates(&tree);
    let mut expected = BTreeMap::new();
    expected.insert("S".to_string(), vec![(1, 0)]);
    expected.insert("T".to_string(), vec![(1, 0)]);
    assert_eq!(got, expected);
}

#[test]
fn test_vectorization_empty_without_coincidence() {
    let tree = arrange_fused(&square_domain(), &identity_theta()).unwrap().unwrap();
    assert!(collect_vectorization_candidates(&tree).is_empty());
}

#[test]
fn test_tiled_tree_still_validates() {
    // end to end: dependences from accesses, tiled schedule, legality verdict
    let domain = IterationDomain::parse("{ S[i, j] : 0 <= i < 4 and 0 <= j < 4 }").unwrap();
    let write =
        AccessRelation::parse_write("{ S[i, j] -> A[i, j] : 0 <= i < 4 and 0 <= j < 4 }").unwrap();
    let read = AccessRelation::parse_read(
        "{ S[i, j] -> A[i - 1, j] : 1 <= i < 4 and 0 <= j < 4 }",
    )
    .unwrap();
    let dep = DependenceBuilder::new(&domain)
        .flow_dependences(&write, &read)
        .unwrap()
        .unwrap();

    let fused = arrange_fused(&domain, &identity_theta()).unwrap().unwrap();
    let tiled = tile_band(&fused, &[0], &[2, 2]).unwrap().unwrap();
    let v = LegalityChecker::new().validate_tree(&tiled, &dep).unwrap();
    assert_eq!(v, Legality::Legal);
}

#[test]
fn test_transforms_leave_earlier_values_intact() {
    // persistence: the original tree is unchanged and usable after tiling
    let fused = arrange_fused(&square_domain(), &identity_theta()).unwrap().unwrap();
    let before = fused.schedule_map().unwrap();
    let _tiled = tile_band(&fused, &[0], &[2, 2]).unwrap().unwrap();
    let after = fused.schedule_map().unwrap();
    assert!(before.is_equal(&after).unwrap());
    assert_eq!(fused.node_at(&[0]).unwrap().kind(), "band");
}
