//! Tests for the layered link graph.

use super::graph::LinkGraph;
use crate::error::Error;

#[test]
fn test_setup_and_capacities() {
    let graph = LinkGraph::new(8, 4);
    {
        let mut node = graph.lock(0);
        graph.setup_node(&mut node, 2).unwrap();
        assert_eq!(node.level(), 2);
        assert_eq!(node.capacity(0), 8, "level 0 holds 2M links");
        assert_eq!(node.capacity(1), 4);
        assert_eq!(node.capacity(2), 4);
        assert_eq!(node.len(0), 0);
    }
    assert_eq!(graph.level(0), 2);
}

#[test]
fn test_double_setup_is_internal_error() {
    let graph = LinkGraph::new(4, 4);
    let mut node = graph.lock(1);
    graph.setup_node(&mut node, 0).unwrap();
    let err = graph.setup_node(&mut node, 1).unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
}

#[test]
fn test_push_and_assign_respect_caps() {
    let graph = LinkGraph::new(8, 2);
    let mut node = graph.lock(0);
    graph.setup_node(&mut node, 1).unwrap();

    // Level 1 cap is M = 2.
    node.push(1, 5).unwrap();
    node.push(1, 6).unwrap();
    assert!(matches!(node.push(1, 7), Err(Error::Internal(_))));
    assert_eq!(node.links(1), &[5, 6]);

    // Level 0 cap is 2M = 4.
    node.assign(0, &[1, 2, 3, 4]).unwrap();
    assert!(matches!(
        node.assign(0, &[1, 2, 3, 4, 5]),
        Err(Error::Internal(_))
    ));
    assert_eq!(node.links(0), &[1, 2, 3, 4]);

    // Levels are independent: level 1 list is unchanged.
    assert_eq!(node.links(1), &[5, 6]);
}

#[test]
fn test_links_past_node_level_are_empty() {
    let graph = LinkGraph::new(4, 2);
    {
        let mut node = graph.lock(0);
        graph.setup_node(&mut node, 0).unwrap();
        node.assign(0, &[1]).unwrap();
    }
    let node = graph.lock(0);
    assert!(node.links(3).is_empty());
    assert_eq!(node.len(3), 0);
}

#[test]
fn test_neighbors_copies_under_lock() {
    let graph = LinkGraph::new(4, 2);
    {
        let mut node = graph.lock(2);
        graph.setup_node(&mut node, 0).unwrap();
        node.assign(0, &[0, 1, 3]).unwrap();
    }
    assert_eq!(graph.neighbors(2, 0), vec![0, 1, 3]);
    assert!(graph.neighbors(2, 1).is_empty());
}

#[test]
fn test_save_load_round_trip() {
    let graph = LinkGraph::new(4, 2);
    {
        let mut node = graph.lock(0);
        graph.setup_node(&mut node, 1).unwrap();
        node.assign(0, &[1, 2]).unwrap();
        node.assign(1, &[2]).unwrap();
    }
    {
        let mut node = graph.lock(1);
        graph.setup_node(&mut node, 0).unwrap();
        node.assign(0, &[0]).unwrap();
    }

    let mut buf = Vec::new();
    graph.save(&mut buf, 2).unwrap();

    let restored = LinkGraph::new(4, 2);
    restored.load(&mut buf.as_slice(), 2).unwrap();
    assert_eq!(restored.level(0), 1);
    assert_eq!(restored.neighbors(0, 0), vec![1, 2]);
    assert_eq!(restored.neighbors(0, 1), vec![2]);
    assert_eq!(restored.neighbors(1, 0), vec![0]);
}

#[test]
fn test_load_rejects_corrupt_lists() {
    // Over-capacity length prefix.
    let graph = LinkGraph::new(4, 2);
    let mut buf = Vec::new();
    buf.push(0u8); // level
    buf.extend_from_slice(&99u32.to_le_bytes()); // len 99 > 2M
    let err = graph.load(&mut buf.as_slice(), 1).unwrap_err();
    assert!(matches!(err, Error::DataLoss(_)));

    // Link target outside the arena.
    let mut buf = Vec::new();
    buf.push(0u8);
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&77u32.to_le_bytes());
    let err = graph.load(&mut buf.as_slice(), 1).unwrap_err();
    assert!(matches!(err, Error::DataLoss(_)));

    // Truncation.
    let mut buf = Vec::new();
    buf.push(0u8);
    buf.extend_from_slice(&2u32.to_le_bytes());
    buf.extend_from_slice(&1u32.to_le_bytes());
    let err = graph.load(&mut buf.as_slice(), 1).unwrap_err();
    assert!(matches!(err, Error::DataLoss(_)));
}
