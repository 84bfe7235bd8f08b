//! Tests for index options.

use super::options::{HnswOptions, WriteOptions};
use crate::distance::Metric;
use crate::element::ElementType;
use crate::error::Error;

#[test]
fn test_defaults() {
    let options = HnswOptions::new(128, Metric::Cosine, 10_000);
    assert_eq!(options.m, 16);
    assert_eq!(options.ef_construction, 200);
    assert_eq!(options.batch_size, 64 * 1024);
    assert_eq!(options.element_type, ElementType::F32);
    assert!(options.enable_vacant);
    options.validate().unwrap();
}

#[test]
fn test_zero_dimension_rejected() {
    let options = HnswOptions::new(0, Metric::L2, 100);
    let err = options.validate().unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(err.to_string().contains("dimension"));
}

#[test]
fn test_degenerate_m_rejected() {
    let mut options = HnswOptions::new(8, Metric::L2, 100);
    options.m = 1;
    assert!(matches!(
        options.validate(),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_zero_widths_rejected() {
    let mut options = HnswOptions::new(8, Metric::L2, 100);
    options.ef_construction = 0;
    assert!(options.validate().is_err());

    let mut options = HnswOptions::new(8, Metric::L2, 100);
    options.ef = 0;
    assert!(options.validate().is_err());

    let mut options = HnswOptions::new(8, Metric::L2, 100);
    options.batch_size = 0;
    assert!(options.validate().is_err());
}

#[test]
fn test_write_options_default() {
    let write = WriteOptions::default();
    assert!(!write.replace_deleted);
    assert!(!write.is_normalized);
}
