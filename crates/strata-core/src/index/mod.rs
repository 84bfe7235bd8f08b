//! HNSW (Hierarchical Navigable Small World) index implementation.
//!
//! A multi-layer proximity graph: the base layer links every stored
//! vector, each higher layer links an exponentially sparser subset, and
//! every search greedily descends from the global entry point before
//! running an ef-bounded best-first scan of the base layer.
//!
//! # Module Organization
//!
//! - `options`: index parameters and per-insert write options
//! - `engine`: the `HnswIndex` type — construction, insert, delete,
//!   persistence
//! - `search`: greedy descent and the base-layer searches
//! - `update`: in-place updates with incremental graph repair
//! - `link`: neighbor-selection heuristic and mutual linking
//! - `graph`: layered adjacency arena with per-node locks
//! - `metrics`: search instrumentation counters

mod candidate;
mod engine;
mod graph;
mod link;
mod metrics;
mod options;
mod rng;
mod search;
mod update;

#[cfg(test)]
mod graph_tests;
#[cfg(test)]
mod link_tests;
#[cfg(test)]
mod options_tests;
#[cfg(test)]
mod persistence_tests;
#[cfg(test)]
mod update_tests;

pub use engine::{HnswIndex, HNSW_MAGIC};
pub use metrics::{MetricsSnapshot, SearchMetrics};
pub use options::{HnswOptions, WriteOptions};
pub use search::{Neighbor, SearchQuery};
