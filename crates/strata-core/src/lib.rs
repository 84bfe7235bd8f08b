//! # Strata Core
//!
//! Concurrent in-memory HNSW vector index written in Rust.
//!
//! Strata builds a hierarchical proximity graph over a stream of labeled
//! fixed-dimension vectors (`f32`, `u8` or `i8`) and answers approximate
//! top-k nearest-neighbor queries under L2, inner-product or cosine
//! distance. Insertion, deletion, update and search run concurrently from
//! plain `&self` references; the whole index persists to a single binary
//! file and loads back verbatim.
//!
//! ## Quick Start
//!
//! ```rust
//! use strata_core::{HnswIndex, HnswOptions, Metric};
//!
//! let options = HnswOptions::new(4, Metric::L2, 1_000);
//! let index: HnswIndex<f32> = HnswIndex::new(options)?;
//!
//! index.insert(1, &[0.0, 0.0, 0.0, 0.0])?;
//! index.insert(2, &[1.0, 0.0, 0.0, 0.0])?;
//!
//! let hits = index.search(&[0.1, 0.0, 0.0, 0.0], 1)?;
//! assert_eq!(hits[0].label, 1);
//! # Ok::<(), strata_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod datasets;
pub mod distance;
pub mod element;
pub mod error;
pub mod index;
pub mod store;

mod io;
mod visited;

#[cfg(test)]
mod error_tests;
#[cfg(test)]
mod visited_tests;

pub use distance::{DistanceKernel, Metric};
pub use element::{Element, ElementType};
pub use error::{Error, Result};
pub use index::{
    HnswIndex, HnswOptions, MetricsSnapshot, Neighbor, SearchMetrics, SearchQuery, WriteOptions,
};
pub use store::{VectorStore, UNKNOWN_LABEL};
