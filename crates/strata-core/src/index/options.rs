//! Index construction and write options.

use serde::{Deserialize, Serialize};

use crate::distance::Metric;
use crate::element::ElementType;
use crate::error::{Error, Result};

/// HNSW index configuration.
///
/// `m` and `ef_construction` trade recall against build cost the usual way:
/// higher values give a denser, better-connected graph and slower inserts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HnswOptions {
    /// Vector dimension. Required, must be > 0.
    pub dimension: u32,
    /// Distance metric.
    pub metric: Metric,
    /// Element type of stored vectors; must match the index's compile-time
    /// element parameter.
    pub element_type: ElementType,
    /// Max out-degree per layer (2M at layer 0). Typical 16–64.
    pub m: u32,
    /// Beam width of the base-layer search during construction.
    pub ef_construction: u32,
    /// Default beam width of the base-layer search at query time; the
    /// effective width is `max(ef, k)`.
    pub ef: u32,
    /// Hard cap on stored vectors (live + soft-deleted).
    pub max_elements: u32,
    /// Vector-store allocation grain.
    pub batch_size: u32,
    /// Seed for level sampling; identical seeds and insertion order yield
    /// identical graphs.
    pub random_seed: u64,
    /// Whether deletions feed a vacant-slot free list that
    /// `replace_deleted` inserts may consume.
    pub enable_vacant: bool,
}

impl HnswOptions {
    /// Creates options with the defaults for everything but shape.
    #[must_use]
    pub fn new(dimension: u32, metric: Metric, max_elements: u32) -> Self {
        Self {
            dimension,
            metric,
            element_type: ElementType::F32,
            m: 16,
            ef_construction: 200,
            ef: 64,
            max_elements,
            batch_size: 64 * 1024,
            random_seed: 100,
            enable_vacant: true,
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidArgument(
                "invalid dimension: 0, please set dimension".into(),
            ));
        }
        if self.m <= 1 {
            return Err(Error::InvalidArgument(format!("m must be > 1, got {}", self.m)));
        }
        if self.ef_construction == 0 {
            return Err(Error::InvalidArgument("ef_construction must be > 0".into()));
        }
        if self.ef == 0 {
            return Err(Error::InvalidArgument("ef must be > 0".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidArgument("batch_size must be > 0".into()));
        }
        Ok(())
    }
}

/// Per-insert behavior flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Reuse a vacant (deleted) slot for this insert if one exists and the
    /// store allows it. Only affects the fresh-insert branch: inserting an
    /// existing live label always updates in place.
    pub replace_deleted: bool,
    /// The vector is already unit length; skip cosine preprocessing.
    pub is_normalized: bool,
}
