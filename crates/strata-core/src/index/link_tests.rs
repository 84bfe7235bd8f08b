//! Tests for the neighbor-selection heuristic and mutual linking.

use std::collections::BinaryHeap;

use super::candidate::Candidate;
use super::engine::HnswIndex;
use super::options::HnswOptions;
use crate::distance::Metric;

/// Builds an index over the given 2-D points; the heuristic only needs
/// their stored vectors to evaluate pairwise distances.
fn index_with_points(points: &[[f32; 2]]) -> HnswIndex<f32> {
    let mut options = HnswOptions::new(2, Metric::L2, 32);
    options.batch_size = 32;
    let index = HnswIndex::new(options).unwrap();
    for (i, p) in points.iter().enumerate() {
        index.insert(i as u64, p).unwrap();
    }
    index
}

/// Candidate heap from `(distance-to-query, loc)` pairs.
fn heap_of(cands: &[(f32, u32)]) -> BinaryHeap<Candidate> {
    cands.iter().map(|&(d, loc)| Candidate::new(d, loc)).collect()
}

fn sorted_locs(top: BinaryHeap<Candidate>) -> Vec<u32> {
    let mut locs: Vec<u32> = top.into_iter().map(|c| c.loc).collect();
    locs.sort_unstable();
    locs
}

#[test]
fn test_select_keeps_small_sets_untouched() {
    // Fewer candidates than M: the heuristic must not prune anything.
    let index = index_with_points(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
    let mut top = heap_of(&[(1.0, 1), (2.0, 2)]);
    index.select_neighbors(&mut top, 3).unwrap();
    assert_eq!(sorted_locs(top), vec![1, 2]);
}

#[test]
fn test_select_rejects_candidate_shadowed_by_kept_neighbor() {
    // Query sits at loc 0. The point at (2, 0) is strictly closer to the
    // already-kept (1, 0) than to the query, so it is pruned; (0, 5) is
    // unshadowed and survives.
    let index = index_with_points(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [0.0, 5.0]]);
    let mut top = heap_of(&[(1.0, 1), (2.0, 2), (5.0, 3)]);
    index.select_neighbors(&mut top, 2).unwrap();
    assert_eq!(sorted_locs(top), vec![1, 3]);
}

#[test]
fn test_select_keeps_equal_distance_candidates() {
    // d(c, kept) == d(q, c) is not a rejection: only a kept neighbor
    // strictly closer than the query shadows a candidate.
    let index = index_with_points(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
    let mut top = heap_of(&[(1.0, 1), (1.0, 2)]);
    index.select_neighbors(&mut top, 2).unwrap();
    assert_eq!(sorted_locs(top), vec![1, 2]);
}

#[test]
fn test_select_caps_at_m() {
    // Points on a wide circle shadow nothing; only the cap limits the
    // result, and equal distances admit in location order.
    let index = index_with_points(&[
        [0.0, 0.0],
        [100.0, 0.0],
        [0.0, 100.0],
        [-100.0, 0.0],
        [0.0, -100.0],
    ]);
    let mut top = heap_of(&[(100.0, 1), (100.0, 2), (100.0, 3), (100.0, 4)]);
    index.select_neighbors(&mut top, 3).unwrap();
    assert_eq!(sorted_locs(top), vec![1, 2, 3]);
}

#[test]
fn test_select_prefers_spread_over_nearest() {
    // A tight cluster near the query collapses to one representative plus
    // the far point, rather than keeping the two nearest.
    let index = index_with_points(&[[0.0, 0.0], [1.0, 0.0], [1.1, 0.0], [0.0, 4.0]]);
    let mut top = heap_of(&[(1.0, 1), (1.1, 2), (4.0, 3)]);
    index.select_neighbors(&mut top, 2).unwrap();
    assert_eq!(sorted_locs(top), vec![1, 3]);
}

#[test]
fn test_connect_produces_mutual_links() {
    // With M far above the node count nothing is pruned, so every link
    // written by the connect step must have its back-link.
    let index = index_with_points(&[[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]]);
    for loc in 0..3u32 {
        for &n in &index.graph.neighbors(loc, 0) {
            assert!(
                index.graph.neighbors(n, 0).contains(&loc),
                "link {loc} -> {n} has no back-link"
            );
        }
    }
    assert!(index.graph.neighbors(1, 0).contains(&0));
    assert!(index.graph.neighbors(1, 0).contains(&2));
}

#[test]
fn test_connect_overflow_respects_level_capacity() {
    // m = 2 gives level 0 a cap of 4. Insert a crowd around the origin so
    // back-link overflow forces the re-selection path on node 0.
    let mut options = HnswOptions::new(2, Metric::L2, 32);
    options.batch_size = 32;
    options.m = 2;
    let index: HnswIndex<f32> = HnswIndex::new(options).unwrap();
    for i in 0..12u64 {
        #[allow(clippy::cast_precision_loss)]
        let (angle, radius) = (i as f32 * 0.5, 1.0 + i as f32);
        index
            .insert(i, &[angle.cos() * radius, angle.sin() * radius])
            .unwrap();
    }
    for loc in 0..12u32 {
        let links = index.graph.neighbors(loc, 0);
        assert!(links.len() <= 4, "loc {loc} holds {} links", links.len());
        assert!(!links.contains(&loc), "self-link at {loc}");
    }
}
