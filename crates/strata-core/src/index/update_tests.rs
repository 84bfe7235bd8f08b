//! Tests for in-place updates and topology repair.

#![allow(clippy::cast_precision_loss)]

use super::engine::HnswIndex;
use super::options::HnswOptions;
use crate::distance::Metric;

fn l2_index(max_elements: u32) -> HnswIndex<f32> {
    let mut options = HnswOptions::new(2, Metric::L2, max_elements);
    options.batch_size = 64;
    HnswIndex::new(options).unwrap()
}

#[test]
fn test_update_moves_vector() {
    let index = l2_index(10);
    index.insert(1, &[0.0, 0.0]).unwrap();
    let hits = index.search(&[5.0, 5.0], 1).unwrap();
    assert_eq!(hits[0].label, 1);

    index.insert(2, &[6.0, 6.0]).unwrap();
    index.insert(1, &[100.0, 100.0]).unwrap();

    let hits = index.search(&[5.0, 5.0], 1).unwrap();
    assert_eq!(hits[0].label, 2);

    let hits = index.search(&[100.0, 100.0], 1).unwrap();
    assert_eq!(hits[0].label, 1);
}

#[test]
fn test_update_single_element_index() {
    let index = l2_index(4);
    index.insert(1, &[0.0, 0.0]).unwrap();
    // Entry point update on a single-element graph is a pure rewrite.
    index.insert(1, &[3.0, 4.0]).unwrap();
    let hits = index.search(&[3.0, 4.0], 1).unwrap();
    assert_eq!(hits[0].label, 1);
    assert!(hits[0].distance < 1e-5);
}

#[test]
fn test_repeated_updates_keep_graph_searchable() {
    let index = l2_index(64);
    for i in 0..32u64 {
        index.insert(i, &[i as f32, 0.0]).unwrap();
    }
    // Shuffle a handful of vectors around several times.
    for round in 0..4u64 {
        for i in (0..32u64).step_by(3) {
            let x = (i + round * 7) % 32;
            index.insert(i, &[x as f32, 1.0]).unwrap();
        }
    }
    for i in (0..32u64).step_by(3) {
        let x = (i + 3 * 7) % 32;
        let hits = index.search(&[x as f32, 1.0], 1).unwrap();
        assert_eq!(hits[0].label, i, "query at ({x}, 1)");
    }
}

#[test]
fn test_update_repairs_neighborhoods() {
    let index = l2_index(64);
    for i in 0..30u64 {
        index.insert(i, &[i as f32, 0.0]).unwrap();
    }
    // Teleport a middle node to the far end; its old neighbors must still
    // find each other, the moved node must be findable at its new home.
    index.insert(15, &[1000.0, 0.0]).unwrap();

    let hits = index.search(&[1000.0, 0.0], 1).unwrap();
    assert_eq!(hits[0].label, 15);

    let hits = index.search(&[14.0, 0.0], 3).unwrap();
    assert_eq!(hits[0].label, 14);
    assert!(hits.iter().all(|n| n.label != 15));
}

#[test]
fn test_update_after_neighbor_deleted() {
    let index = l2_index(32);
    for i in 0..10u64 {
        index.insert(i, &[i as f32, 0.0]).unwrap();
    }
    index.remove(4).unwrap();
    index.insert(5, &[4.5, 0.0]).unwrap();

    let hits = index.search(&[4.5, 0.0], 2).unwrap();
    assert_eq!(hits[0].label, 5);
    assert!(hits.iter().all(|n| n.label != 4));
}

#[test]
fn test_update_sampling_probability_zero_skips_repair() {
    let mut index = l2_index(32);
    index.update_neighbor_probability = 0.0;
    for i in 0..10u64 {
        index.insert(i, &[i as f32, 0.0]).unwrap();
    }
    // With repair sampling off, the update still rewires the node's own
    // outgoing links through the connect pipeline.
    index.insert(3, &[20.0, 0.0]).unwrap();
    let hits = index.search(&[20.0, 0.0], 1).unwrap();
    assert_eq!(hits[0].label, 3);
}
