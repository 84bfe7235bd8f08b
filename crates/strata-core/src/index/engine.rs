//! HNSW engine: construction, insertion, deletion and persistence.
//!
//! The engine ties together the vector store, the layered link graph and
//! the visited-list pool. All operations take `&self`; concurrency is
//! governed by the lock inventory described on [`HnswIndex`].

use parking_lot::{Mutex, MutexGuard};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use super::candidate::Candidate;
use super::graph::LinkGraph;
use super::metrics::SearchMetrics;
use super::options::{HnswOptions, WriteOptions};
use super::rng::XorShift64;
use crate::distance::DistanceKernel;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::io;
use crate::store::VectorStore;
use crate::visited::VisitedListPool;

/// Magic word opening every index file ("STRATANN").
pub const HNSW_MAGIC: u64 = u64::from_le_bytes(*b"STRATANN");

/// Hard cap on sampled node levels.
pub(super) const MAX_LEVEL: u8 = 16;

/// Number of striped label-operation locks.
const LABEL_STRIPES: usize = 1 << 16;

/// Global search/build starting point: the location of the single node
/// occupying the top layer, together with that layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct EntryPoint {
    pub loc: u32,
    pub level: u8,
}

/// Concurrent HNSW index over vectors of element type `E`.
///
/// # Concurrency
///
/// - Each graph node carries its own mutex guarding its link lists, held
///   briefly around snapshots and rewrites.
/// - Operations on one label serialize on a striped label lock, so two
///   concurrent inserts of the same label cannot create duplicate slots.
/// - The entry-point mutex serializes promotions; an insert that cannot
///   raise the top layer releases it immediately after snapshotting.
/// - Vector bytes, the label bimap and the deleted set live behind the
///   store's reader-writer locks.
///
/// Searches that start after an insert returns can reach the new vector;
/// whether it lands in the top-k depends on `ef` as usual for HNSW.
#[derive(Debug)]
pub struct HnswIndex<E: Element> {
    pub(super) options: HnswOptions,
    pub(super) kernel: DistanceKernel<E>,
    pub(super) store: VectorStore<E>,
    pub(super) graph: LinkGraph,
    pub(super) visited: VisitedListPool,
    label_locks: Box<[Mutex<()>]>,
    pub(super) entry: Mutex<Option<EntryPoint>>,
    ef: AtomicUsize,
    pub(super) mult: f64,
    level_rng: XorShift64,
    pub(super) update_rng: XorShift64,
    /// Probability that the update path repairs each 1-hop neighborhood.
    pub(super) update_neighbor_probability: f64,
    pub(super) metrics: SearchMetrics,
}

impl<E: Element> HnswIndex<E> {
    /// Creates an empty index.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for invalid options or when
    /// `options.element_type` disagrees with `E`.
    pub fn new(options: HnswOptions) -> Result<Self> {
        options.validate()?;
        if options.element_type != E::ELEMENT_TYPE {
            return Err(Error::InvalidArgument(format!(
                "options declare element type {:?}, index is instantiated for {:?}",
                options.element_type,
                E::ELEMENT_TYPE
            )));
        }
        let label_locks = (0..LABEL_STRIPES)
            .map(|_| Mutex::new(()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Ok(Self {
            kernel: DistanceKernel::new(options.metric),
            store: VectorStore::new(
                options.metric,
                options.dimension as usize,
                options.batch_size,
                options.max_elements,
                options.enable_vacant,
            ),
            graph: LinkGraph::new(options.max_elements, options.m),
            visited: VisitedListPool::new(1, options.max_elements as usize),
            label_locks,
            entry: Mutex::new(None),
            ef: AtomicUsize::new(options.ef as usize),
            mult: 1.0 / f64::from(options.m).ln(),
            level_rng: XorShift64::seeded(options.random_seed),
            update_rng: XorShift64::seeded(options.random_seed.wrapping_add(1)),
            update_neighbor_probability: 1.0,
            metrics: SearchMetrics::default(),
            options,
        })
    }

    /// Configuration this index was built with.
    #[must_use]
    pub const fn options(&self) -> &HnswOptions {
        &self.options
    }

    /// Number of live (not deleted) vectors.
    #[must_use]
    pub fn len(&self) -> u32 {
        self.store.size()
    }

    /// Whether the index holds no live vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of soft-deleted slots awaiting reuse.
    #[must_use]
    pub fn deleted_len(&self) -> u32 {
        self.store.deleted_len()
    }

    /// The backing vector store.
    #[must_use]
    pub const fn store(&self) -> &VectorStore<E> {
        &self.store
    }

    /// Cumulative search counters.
    #[must_use]
    pub const fn metrics(&self) -> &SearchMetrics {
        &self.metrics
    }

    /// Current query-time beam width.
    #[must_use]
    pub fn ef(&self) -> usize {
        self.ef.load(Ordering::Relaxed)
    }

    /// Adjusts the query-time beam width; the effective width of a search
    /// is `max(ef, k)`.
    pub fn set_ef(&self, ef: usize) {
        self.ef.store(ef.max(1), Ordering::Relaxed);
    }

    fn label_lock(&self, label: u64) -> MutexGuard<'_, ()> {
        self.label_locks[(label as usize) & (LABEL_STRIPES - 1)].lock()
    }

    /// Samples a level from the exponential distribution
    /// `P(level = l) ∝ M^-l` via `floor(-ln(U) / ln(M))`.
    pub(super) fn random_level(&self) -> u8 {
        let u = self.level_rng.next_f64();
        let level = (-u.ln() * self.mult).floor();
        if level >= f64::from(MAX_LEVEL) {
            MAX_LEVEL
        } else {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                level as u8
            }
        }
    }

    /// Validates dimensionality and applies metric preprocessing
    /// (cosine normalization of a copy) unless the caller opted out.
    pub(super) fn prepare_vector<'v>(
        &self,
        vector: &'v [E],
        is_normalized: bool,
    ) -> Result<Cow<'v, [E]>> {
        if vector.len() != self.options.dimension as usize {
            return Err(Error::InvalidArgument(format!(
                "vector has {} elements, index dimension is {}",
                vector.len(),
                self.options.dimension
            )));
        }
        if !is_normalized && self.kernel.preprocess_required() {
            let mut owned = vector.to_vec();
            self.kernel.preprocess_in_place(&mut owned);
            Ok(Cow::Owned(owned))
        } else {
            Ok(Cow::Borrowed(vector))
        }
    }

    /// Inserts `(label, vector)` with default write options.
    ///
    /// # Errors
    ///
    /// See [`HnswIndex::insert_with`].
    pub fn insert(&self, label: u64, vector: &[E]) -> Result<()> {
        self.insert_with(label, vector, &WriteOptions::default())
    }

    /// Inserts `(label, vector)`.
    ///
    /// If the label is live, its vector is updated in place (regardless of
    /// `replace_deleted`). Otherwise, with `replace_deleted` set and a
    /// vacant slot available, the slot is resurrected for this label; else
    /// a fresh slot is appended and linked into the graph.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on dimension mismatch,
    /// `ResourceExhausted` at `max_elements` with no reusable slot, or an
    /// `Internal` error if a graph invariant is found violated (the index
    /// should then be rebuilt).
    pub fn insert_with(&self, label: u64, vector: &[E], options: &WriteOptions) -> Result<()> {
        let _label_guard = self.label_lock(label);

        if let Some(loc) = self.store.find_label(label) {
            debug!(label, loc, "updating live label in place");
            return self.update_vector(loc, vector, options);
        }

        if options.replace_deleted {
            match self.store.get_vacant(label) {
                Ok(loc) => {
                    debug!(label, loc, "inserting into resurrected slot");
                    return self.update_vector(loc, vector, options);
                }
                // Reuse disabled or nothing vacant: fall through to a
                // fresh insert.
                Err(Error::Unavailable(_) | Error::ResourceExhausted(_)) => {}
                Err(e) => return Err(e),
            }
        }

        self.insert_fresh(label, vector, options)
    }

    fn insert_fresh(&self, label: u64, vector: &[E], options: &WriteOptions) -> Result<()> {
        let data = self.prepare_vector(vector, options.is_normalized)?;
        let cur_c = self.store.prefer_add(label)?;

        let mut cur_links = self.graph.lock(cur_c);
        let cur_level = self.random_level();

        // Snapshot the entry point; keep the lock only when this insert
        // may promote a new top layer.
        let mut entry_guard = Some(self.entry.lock());
        let snapshot: Option<EntryPoint> = entry_guard.as_deref().copied().flatten();
        let max_level = snapshot.map_or(-1, |ep| i32::from(ep.level));
        if i32::from(cur_level) <= max_level {
            entry_guard = None;
        }

        self.store.set_vector(cur_c, &data)?;
        self.graph.setup_node(&mut cur_links, cur_level)?;
        debug!(label, loc = cur_c, level = cur_level, "inserting vector");

        if let Some(ep) = snapshot {
            let mut cur_obj = ep.loc;
            if i32::from(cur_level) < max_level {
                cur_obj =
                    self.descend_for_location(cur_c, cur_obj, max_level, i32::from(cur_level))?;
            }

            let ep_deleted = self.store.is_deleted(ep.loc)?;
            let mut level = i32::from(cur_level).min(max_level);
            while level >= 0 {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let l = level as u8;
                let mut top = self.search_base_layer(cur_obj, cur_c, l)?;
                if ep_deleted {
                    // Keep a path to the rest of the graph even when the
                    // entry point itself is deleted.
                    top.push(Candidate::new(self.store.distance(cur_c, ep.loc)?, ep.loc));
                    while top.len() > self.options.ef_construction as usize {
                        top.pop();
                    }
                }
                cur_obj = self.mutually_connect(cur_c, &mut cur_links, top, l, false)?;
                level -= 1;
            }
        }
        drop(cur_links);

        // First element, or a promotion to a new top layer.
        if let Some(mut guard) = entry_guard {
            *guard = Some(EntryPoint {
                loc: cur_c,
                level: cur_level,
            });
        }
        Ok(())
    }

    /// Soft-deletes `label`.
    ///
    /// The slot is marked deleted and unmapped; its links stay in the
    /// graph for routing until the slot is resurrected by a later
    /// `replace_deleted` insert. Searches filter deleted entries from
    /// their results.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown label.
    pub fn remove(&self, label: u64) -> Result<()> {
        let _label_guard = self.label_lock(label);
        let loc = self.store.remove(label)?;
        debug!(label, loc, "soft-deleted label");
        Ok(())
    }

    /// Serializes the index to `path`.
    ///
    /// # Errors
    ///
    /// Propagates IO errors; the in-memory index is unaffected.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        self.save_to(&mut w)?;
        w.flush()?;
        Ok(())
    }

    /// Serializes the index to a writer: magic, option header, entry
    /// point, vector store, then the link graph.
    ///
    /// # Errors
    ///
    /// Propagates IO errors.
    pub fn save_to<W: Write>(&self, w: &mut W) -> Result<()> {
        info!(
            vectors = self.store.current_index(),
            "serializing hnsw index"
        );
        io::write_u64(w, HNSW_MAGIC)?;
        io::write_u32(w, self.options.dimension)?;
        io::write_u8(w, self.options.metric.as_u8())?;
        io::write_u8(w, self.options.element_type.as_u8())?;
        io::write_u32(w, self.options.m)?;
        io::write_u32(w, self.options.batch_size)?;
        io::write_u32(w, self.options.max_elements)?;
        io::write_u32(w, self.options.ef_construction)?;
        io::write_u64(w, self.options.random_seed)?;

        let ep = *self.entry.lock();
        io::write_u32(w, ep.map_or(u32::MAX, |e| e.loc))?;
        io::write_i32(w, ep.map_or(-1, |e| i32::from(e.level)))?;
        io::write_f64(w, self.mult)?;

        self.store.save(w)?;
        self.graph.save(w, self.store.current_index())?;
        info!("hnsw index serialized");
        Ok(())
    }

    /// Loads an index from `path`, verifying the persisted header against
    /// `options`.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` if the file cannot be opened,
    /// `DataLoss` on truncation or magic mismatch, `InvalidArgument` on a
    /// header/option conflict. On any failure the partially loaded index
    /// is discarded.
    pub fn load(options: HnswOptions, path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            Error::Unavailable(format!(
                "cannot open index file {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let mut r = BufReader::new(file);
        Self::load_from(options, &mut r)
    }

    /// Loads an index from a reader. See [`HnswIndex::load`].
    ///
    /// # Errors
    ///
    /// See [`HnswIndex::load`].
    pub fn load_from<R: Read>(options: HnswOptions, r: &mut R) -> Result<Self> {
        let mut index = Self::new(options)?;

        let magic = io::read_u64(r)?;
        if magic != HNSW_MAGIC {
            return Err(Error::DataLoss(
                "file format error, not an hnsw index file".into(),
            ));
        }
        Self::check_header(&index.options, r)?;

        let entry_loc = io::read_u32(r)?;
        let max_level = io::read_i32(r)?;
        let mult = io::read_f64(r)?;

        index.store.load(r)?;
        index.graph.load(r, index.store.current_index())?;

        let entry = if entry_loc == u32::MAX || max_level < 0 {
            None
        } else {
            if entry_loc >= index.store.current_index() {
                return Err(Error::DataLoss(format!(
                    "entry point {entry_loc} past stored count {}",
                    index.store.current_index()
                )));
            }
            let level = u8::try_from(max_level)
                .map_err(|_| Error::DataLoss(format!("entry level {max_level} out of range")))?;
            Some(EntryPoint {
                loc: entry_loc,
                level,
            })
        };
        *index.entry.lock() = entry;
        index.mult = mult;
        info!(
            vectors = index.store.current_index(),
            deleted = index.store.deleted_len(),
            "hnsw index loaded"
        );
        Ok(index)
    }

    /// Verifies the persisted option header against the runtime options.
    /// `ef_construction` and `random_seed` are informational; the
    /// structural fields must match exactly.
    fn check_header<R: Read>(options: &HnswOptions, r: &mut R) -> Result<()> {
        let dimension = io::read_u32(r)?;
        let metric = io::read_u8(r)?;
        let element_type = io::read_u8(r)?;
        let m = io::read_u32(r)?;
        let batch_size = io::read_u32(r)?;
        let max_elements = io::read_u32(r)?;
        let _ef_construction = io::read_u32(r)?;
        let _random_seed = io::read_u64(r)?;

        if dimension != options.dimension {
            return Err(Error::InvalidArgument(format!(
                "index option conflict dimension: {}, read from index: {dimension}",
                options.dimension
            )));
        }
        if metric != options.metric.as_u8() {
            return Err(Error::InvalidArgument(format!(
                "index option conflict metric: {:?}, read from index tag: {metric}",
                options.metric
            )));
        }
        if element_type != options.element_type.as_u8() {
            return Err(Error::InvalidArgument(format!(
                "index option conflict element type: {:?}, read from index tag: {element_type}",
                options.element_type
            )));
        }
        if m != options.m {
            return Err(Error::InvalidArgument(format!(
                "index option conflict m: {}, read from index: {m}",
                options.m
            )));
        }
        if batch_size != options.batch_size {
            return Err(Error::InvalidArgument(format!(
                "index option conflict batch_size: {}, read from index: {batch_size}",
                options.batch_size
            )));
        }
        if max_elements != options.max_elements {
            return Err(Error::InvalidArgument(format!(
                "index option conflict max_elements: {}, read from index: {max_elements}",
                options.max_elements
            )));
        }
        Ok(())
    }
}
