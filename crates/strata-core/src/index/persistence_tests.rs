//! Save/load round-trip tests.

#![allow(clippy::cast_precision_loss)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::engine::{HnswIndex, HNSW_MAGIC};
use super::options::{HnswOptions, WriteOptions};
use crate::distance::Metric;
use crate::error::Error;

fn options_32d() -> HnswOptions {
    let mut options = HnswOptions::new(32, Metric::L2, 2048);
    options.batch_size = 256;
    options.random_seed = 42;
    options
}

/// Deterministic pseudo-random vector for test data.
fn pseudo_vector(i: u64, dim: usize) -> Vec<f32> {
    (0..dim)
        .map(|j| (((i * 31 + j as u64 * 17) % 97) as f32 * 0.13).sin())
        .collect()
}

#[test]
fn test_save_load_identical_results() {
    let mut rng = StdRng::seed_from_u64(4242);
    let index: HnswIndex<f32> = HnswIndex::new(options_32d()).unwrap();
    for i in 0..1000u64 {
        let v: Vec<f32> = (0..32).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        index.insert(i, &v).unwrap();
    }

    let queries: Vec<Vec<f32>> = (0..10)
        .map(|_| (0..32).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
        .collect();
    let before: Vec<Vec<u64>> = queries
        .iter()
        .map(|q| {
            index
                .search(q, 10)
                .unwrap()
                .iter()
                .map(|n| n.label)
                .collect()
        })
        .collect();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.strata");
    index.save(&path).unwrap();

    let restored: HnswIndex<f32> = HnswIndex::load(options_32d(), &path).unwrap();
    assert_eq!(restored.len(), 1000);

    for (q, expected) in queries.iter().zip(before.iter()) {
        let labels: Vec<u64> = restored
            .search(q, 10)
            .unwrap()
            .iter()
            .map(|n| n.label)
            .collect();
        assert_eq!(&labels, expected);
    }
}

#[test]
fn test_save_load_preserves_deletions_and_vacancy() {
    let index: HnswIndex<f32> = HnswIndex::new(options_32d()).unwrap();
    for i in 0..50u64 {
        index.insert(i, &pseudo_vector(i, 32)).unwrap();
    }
    index.remove(7).unwrap();
    index.remove(21).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.strata");
    index.save(&path).unwrap();

    let restored: HnswIndex<f32> = HnswIndex::load(options_32d(), &path).unwrap();
    assert_eq!(restored.len(), 48);
    assert_eq!(restored.deleted_len(), 2);
    assert!(restored.store().find_label(7).is_none());

    // The free list survives: a replace_deleted insert reuses slot 7.
    let write = WriteOptions {
        replace_deleted: true,
        ..WriteOptions::default()
    };
    restored.insert_with(999, &pseudo_vector(999, 32), &write).unwrap();
    assert_eq!(restored.store().current_index(), 50);
    assert_eq!(restored.deleted_len(), 1);

    let hits = restored.search(&pseudo_vector(999, 32), 1).unwrap();
    assert_eq!(hits[0].label, 999);
}

#[test]
fn test_empty_index_round_trip() {
    let index: HnswIndex<f32> = HnswIndex::new(options_32d()).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.strata");
    index.save(&path).unwrap();

    let restored: HnswIndex<f32> = HnswIndex::load(options_32d(), &path).unwrap();
    assert!(restored.is_empty());
    assert!(restored.search(&pseudo_vector(0, 32), 5).unwrap().is_empty());
    // And the restored index accepts new inserts.
    restored.insert(1, &pseudo_vector(1, 32)).unwrap();
    assert_eq!(restored.len(), 1);
}

#[test]
fn test_load_rejects_mismatched_options() {
    let index: HnswIndex<f32> = HnswIndex::new(options_32d()).unwrap();
    index.insert(1, &pseudo_vector(1, 32)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.strata");
    index.save(&path).unwrap();

    let mut wrong_dim = options_32d();
    wrong_dim.dimension = 16;
    let err = HnswIndex::<f32>::load(wrong_dim, &path).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(err.to_string().contains("dimension"));

    let mut wrong_m = options_32d();
    wrong_m.m = 32;
    assert!(matches!(
        HnswIndex::<f32>::load(wrong_m, &path),
        Err(Error::InvalidArgument(_))
    ));

    let mut wrong_metric = options_32d();
    wrong_metric.metric = Metric::Cosine;
    assert!(matches!(
        HnswIndex::<f32>::load(wrong_metric, &path),
        Err(Error::InvalidArgument(_))
    ));

    let mut wrong_max = options_32d();
    wrong_max.max_elements = 4096;
    assert!(matches!(
        HnswIndex::<f32>::load(wrong_max, &path),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_load_rejects_bad_magic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bogus.strata");
    std::fs::write(&path, 0xDEAD_BEEFu64.to_le_bytes()).unwrap();
    let err = HnswIndex::<f32>::load(options_32d(), &path).unwrap_err();
    assert!(matches!(err, Error::DataLoss(_)));
}

#[test]
fn test_load_rejects_truncation() {
    let index: HnswIndex<f32> = HnswIndex::new(options_32d()).unwrap();
    for i in 0..20u64 {
        index.insert(i, &pseudo_vector(i, 32)).unwrap();
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.strata");
    index.save(&path).unwrap();

    let bytes = std::fs::read(&path).unwrap();
    assert_eq!(u64::from_le_bytes(bytes[..8].try_into().unwrap()), HNSW_MAGIC);

    // Chop the file at several depths; every prefix must fail cleanly.
    for cut in [4usize, 30, bytes.len() / 2, bytes.len() - 3] {
        let path = dir.path().join(format!("cut_{cut}.strata"));
        std::fs::write(&path, &bytes[..cut]).unwrap();
        let err = HnswIndex::<f32>::load(options_32d(), &path).unwrap_err();
        assert!(
            matches!(err, Error::DataLoss(_)),
            "cut at {cut}: got {err:?}"
        );
    }
}

#[test]
fn test_missing_file_is_unavailable() {
    let err = HnswIndex::<f32>::load(options_32d(), "/nonexistent/index.strata").unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));
}

#[test]
fn test_save_to_reader_round_trip_in_memory() {
    let index: HnswIndex<f32> = HnswIndex::new(options_32d()).unwrap();
    for i in 0..10u64 {
        index.insert(i, &pseudo_vector(i, 32)).unwrap();
    }
    let mut buf = Vec::new();
    index.save_to(&mut buf).unwrap();

    let restored = HnswIndex::<f32>::load_from(options_32d(), &mut buf.as_slice()).unwrap();
    assert_eq!(restored.len(), 10);
    let hits = restored.search(&pseudo_vector(3, 32), 1).unwrap();
    assert_eq!(hits[0].label, 3);
}
