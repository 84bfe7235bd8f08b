//! Batched vector storage with label mapping and soft deletion.
//!
//! Vectors are packed into fixed-size batches so that growth never moves
//! existing vectors, and a whole batch can be streamed during persistence.
//! The store keeps the label↔location bimap, the compressed deleted-location
//! bitmap, and the vacant-slot reuse policy.

use parking_lot::RwLock;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, info};

use crate::datasets::{VectorFileReader, VectorFileWriter};
use crate::distance::{DistanceKernel, Metric};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::io;

/// Sentinel label for a slot that holds no live entry.
pub const UNKNOWN_LABEL: u64 = u64::MAX;

/// One contiguous allocation holding up to `batch_size` vectors.
#[derive(Debug)]
struct VectorBatch<E> {
    data: Box<[E]>,
    /// Number of occupied vector slots in this batch.
    len: u32,
    per_vector: usize,
}

impl<E: Element> VectorBatch<E> {
    fn new(per_vector: usize, batch_size: u32) -> Self {
        Self {
            data: vec![E::default(); per_vector * batch_size as usize].into_boxed_slice(),
            len: 0,
            per_vector,
        }
    }

    #[inline]
    fn vector(&self, slot: u32) -> &[E] {
        let start = slot as usize * self.per_vector;
        &self.data[start..start + self.per_vector]
    }

    #[inline]
    fn vector_mut(&mut self, slot: u32) -> &mut [E] {
        let start = slot as usize * self.per_vector;
        &mut self.data[start..start + self.per_vector]
    }

    fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Label bimap state, guarded as one unit so both directions stay
/// consistent under concurrent mutation.
#[derive(Debug)]
struct LabelMap {
    label_to_loc: FxHashMap<u64, u32>,
    loc_to_label: Vec<u64>,
}

/// Batched fixed-dimension vector store with vacant-slot reuse.
///
/// All methods take `&self`; interior locks serialize mutation. Lock order
/// inside the store is labels → deleted → data, and no lock is held across
/// a call back into the engine.
#[derive(Debug)]
pub struct VectorStore<E: Element> {
    kernel: DistanceKernel<E>,
    dimension: usize,
    batch_size: u32,
    max_elements: u32,
    vacant_enabled: AtomicBool,
    data: RwLock<Vec<VectorBatch<E>>>,
    labels: RwLock<LabelMap>,
    deleted: RwLock<RoaringBitmap>,
    current_idx: AtomicU32,
    deleted_count: AtomicU32,
}

impl<E: Element> VectorStore<E> {
    /// Creates a store with all batch storage pre-allocated up to
    /// `max_elements`, so later growth never reallocates vector memory.
    #[must_use]
    pub fn new(
        metric: Metric,
        dimension: usize,
        batch_size: u32,
        max_elements: u32,
        vacant_enabled: bool,
    ) -> Self {
        let store = Self {
            kernel: DistanceKernel::new(metric),
            dimension,
            batch_size,
            max_elements,
            vacant_enabled: AtomicBool::new(vacant_enabled),
            data: RwLock::new(Vec::new()),
            labels: RwLock::new(LabelMap {
                label_to_loc: FxHashMap::default(),
                loc_to_label: vec![UNKNOWN_LABEL; max_elements as usize],
            }),
            deleted: RwLock::new(RoaringBitmap::new()),
            current_idx: AtomicU32::new(0),
            deleted_count: AtomicU32::new(0),
        };
        store.reserve(max_elements);
        store
    }

    /// Distance kernel used by this store.
    #[must_use]
    pub const fn kernel(&self) -> &DistanceKernel<E> {
        &self.kernel
    }

    /// Configured vector dimension.
    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    /// Live entry count (`current_index() - deleted_len()`).
    #[must_use]
    pub fn size(&self) -> u32 {
        self.current_idx.load(Ordering::Relaxed) - self.deleted_count.load(Ordering::Relaxed)
    }

    /// Number of soft-deleted slots.
    #[must_use]
    pub fn deleted_len(&self) -> u32 {
        self.deleted_count.load(Ordering::Relaxed)
    }

    /// High-water mark: the next location a fresh append would take.
    #[must_use]
    pub fn current_index(&self) -> u32 {
        self.current_idx.load(Ordering::Relaxed)
    }

    /// Allocated slot capacity, clamped to `max_elements`.
    #[must_use]
    pub fn capacity(&self) -> u32 {
        let slots = self.data.read().len() as u64 * u64::from(self.batch_size);
        u32::try_from(slots.min(u64::from(self.max_elements))).unwrap_or(self.max_elements)
    }

    /// Slots still available for fresh appends.
    #[must_use]
    pub fn available(&self) -> u32 {
        self.capacity() - self.current_index()
    }

    /// Enables vacant-slot reuse for subsequent deletions/inserts.
    pub fn enable_vacant(&self) {
        self.vacant_enabled.store(true, Ordering::Relaxed);
    }

    /// Disables vacant-slot reuse; [`VectorStore::get_vacant`] will refuse.
    pub fn disable_vacant(&self) {
        self.vacant_enabled.store(false, Ordering::Relaxed);
    }

    /// Ensures batch storage exists for at least `n` slots (clamped to
    /// `max_elements`).
    pub fn reserve(&self, n: u32) {
        let n = n.min(self.max_elements);
        let mut data = self.data.write();
        while (data.len() as u64) * u64::from(self.batch_size) < u64::from(n) {
            data.push(VectorBatch::new(self.dimension, self.batch_size));
        }
    }

    /// Drops empty trailing batches.
    pub fn shrink(&self) {
        let mut data = self.data.write();
        while data.last().is_some_and(VectorBatch::is_empty) {
            data.pop();
        }
    }

    /// Removes the last `n` appended slots.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` if `n` exceeds the appended count.
    pub fn pop_back(&self, n: u32) -> Result<()> {
        let cur = self.current_index();
        if n > cur {
            return Err(Error::OutOfRange(format!(
                "cannot pop {n} slots, only {cur} appended"
            )));
        }
        let mut data = self.data.write();
        self.resize_locked(&mut data, cur - n);
        Ok(())
    }

    /// Adjusts per-batch occupancy to `n` total slots. Callers hold the
    /// data write lock; `current_idx` is published at the end.
    fn resize_locked(&self, data: &mut Vec<VectorBatch<E>>, n: u32) {
        while (data.len() as u64) * u64::from(self.batch_size) < u64::from(n) {
            data.push(VectorBatch::new(self.dimension, self.batch_size));
        }
        let cur = self.current_idx.load(Ordering::Relaxed);
        if n == cur {
            return;
        }
        if n < cur {
            let mut need_to_pop = cur - n;
            let mut idx = (cur / self.batch_size) as usize;
            idx = idx.min(data.len().saturating_sub(1));
            loop {
                let bs = data[idx].len;
                if bs >= need_to_pop {
                    data[idx].len = bs - need_to_pop;
                    break;
                }
                data[idx].len = 0;
                need_to_pop -= bs;
                if idx == 0 {
                    break;
                }
                idx -= 1;
            }
        } else {
            let mut need_to_expand = n - cur;
            let mut idx = (cur / self.batch_size) as usize;
            while need_to_expand > 0 {
                let available = self.batch_size - data[idx].len;
                if available >= need_to_expand {
                    data[idx].len += need_to_expand;
                    need_to_expand = 0;
                } else {
                    data[idx].len = self.batch_size;
                    need_to_expand -= available;
                    idx += 1;
                }
            }
        }
        self.current_idx.store(n, Ordering::Relaxed);
    }

    /// Appends a fresh slot for `label` and returns its location.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` at capacity, `AlreadyExists` if the
    /// label is live.
    pub fn prefer_add(&self, label: u64) -> Result<u32> {
        let mut labels = self.labels.write();
        let cur = self.current_idx.load(Ordering::Relaxed);
        if cur >= self.max_elements {
            return Err(Error::ResourceExhausted(format!(
                "store is at max_elements = {}",
                self.max_elements
            )));
        }
        if labels.label_to_loc.contains_key(&label) {
            return Err(Error::AlreadyExists(format!("label {label} is live")));
        }
        let loc = cur;
        labels.label_to_loc.insert(label, loc);
        labels.loc_to_label[loc as usize] = label;
        let mut data = self.data.write();
        self.resize_locked(&mut data, cur + 1);
        Ok(loc)
    }

    /// Resurrects the lowest deleted location for `label`.
    ///
    /// The slot is removed from the deleted set and re-labeled; its old
    /// vector bytes and graph links remain until the caller overwrites them.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` when reuse is disabled, `ResourceExhausted`
    /// when no slot is vacant, `AlreadyExists` if the label is live.
    pub fn get_vacant(&self, label: u64) -> Result<u32> {
        if !self.vacant_enabled.load(Ordering::Relaxed) {
            return Err(Error::Unavailable(
                "vacant-slot reuse is disabled by configuration".into(),
            ));
        }
        let mut labels = self.labels.write();
        let mut deleted = self.deleted.write();
        let Some(loc) = deleted.min() else {
            return Err(Error::ResourceExhausted("no vacant slot to reuse".into()));
        };
        if labels.label_to_loc.contains_key(&label) {
            return Err(Error::AlreadyExists(format!("label {label} is live")));
        }
        deleted.remove(loc);
        self.deleted_count.fetch_sub(1, Ordering::Relaxed);
        labels.label_to_loc.insert(label, loc);
        labels.loc_to_label[loc as usize] = label;
        debug!(label, loc, "resurrected vacant slot");
        Ok(loc)
    }

    /// Overwrites the vector at `loc`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for an unallocated location, `InvalidArgument`
    /// on a dimension mismatch.
    pub fn set_vector(&self, loc: u32, v: &[E]) -> Result<()> {
        if v.len() != self.dimension {
            return Err(Error::InvalidArgument(format!(
                "vector has {} elements, store dimension is {}",
                v.len(),
                self.dimension
            )));
        }
        self.check_loc(loc)?;
        let mut data = self.data.write();
        let (bi, si) = (loc / self.batch_size, loc % self.batch_size);
        data[bi as usize].vector_mut(si).copy_from_slice(v);
        Ok(())
    }

    /// Returns a copy of the vector at `loc`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for an unallocated location.
    pub fn get_vector(&self, loc: u32) -> Result<Vec<E>> {
        self.check_loc(loc)?;
        let data = self.data.read();
        let (bi, si) = (loc / self.batch_size, loc % self.batch_size);
        Ok(data[bi as usize].vector(si).to_vec())
    }

    /// Copies the vector at `loc` into `out`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for an unallocated location, `InvalidArgument`
    /// on a buffer size mismatch.
    pub fn copy_vector(&self, loc: u32, out: &mut [E]) -> Result<()> {
        if out.len() != self.dimension {
            return Err(Error::InvalidArgument(format!(
                "buffer has {} elements, store dimension is {}",
                out.len(),
                self.dimension
            )));
        }
        self.check_loc(loc)?;
        let data = self.data.read();
        let (bi, si) = (loc / self.batch_size, loc % self.batch_size);
        out.copy_from_slice(data[bi as usize].vector(si));
        Ok(())
    }

    /// Distance between two stored vectors.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for an unallocated location.
    pub fn distance(&self, a: u32, b: u32) -> Result<f32> {
        self.check_loc(a)?;
        self.check_loc(b)?;
        let data = self.data.read();
        let va = data[(a / self.batch_size) as usize].vector(a % self.batch_size);
        let vb = data[(b / self.batch_size) as usize].vector(b % self.batch_size);
        Ok(self.kernel.compare(va, vb))
    }

    /// Distance between a query vector and a stored vector.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for an unallocated location.
    pub fn distance_to_query(&self, query: &[E], loc: u32) -> Result<f32> {
        self.check_loc(loc)?;
        let data = self.data.read();
        let v = data[(loc / self.batch_size) as usize].vector(loc % self.batch_size);
        Ok(self.kernel.compare(v, query))
    }

    /// Batch variant of [`VectorStore::distance_to_query`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `out` is shorter than `locs`,
    /// `OutOfRange` for any unallocated location.
    pub fn distances_to_query(&self, query: &[E], locs: &[u32], out: &mut [f32]) -> Result<()> {
        if out.len() < locs.len() {
            return Err(Error::InvalidArgument(format!(
                "output buffer holds {} distances, need {}",
                out.len(),
                locs.len()
            )));
        }
        for (slot, &loc) in out.iter_mut().zip(locs.iter()) {
            *slot = self.distance_to_query(query, loc)?;
        }
        Ok(())
    }

    /// Whether `loc` is soft-deleted.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for an unallocated location.
    pub fn is_deleted(&self, loc: u32) -> Result<bool> {
        self.check_loc(loc)?;
        Ok(self.deleted.read().contains(loc))
    }

    /// Soft-deletes the slot at `loc`, erasing its label mapping.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for an unallocated location, `AlreadyExists`
    /// if the slot is already deleted.
    pub fn mark_deleted(&self, loc: u32) -> Result<()> {
        self.check_loc(loc)?;
        let mut labels = self.labels.write();
        let mut deleted = self.deleted.write();
        if deleted.contains(loc) {
            return Err(Error::AlreadyExists(format!("slot {loc} is already deleted")));
        }
        let label = labels.loc_to_label[loc as usize];
        if label != UNKNOWN_LABEL {
            labels.label_to_loc.remove(&label);
            labels.loc_to_label[loc as usize] = UNKNOWN_LABEL;
        }
        deleted.insert(loc);
        self.deleted_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Clears the deleted mark on `loc`. The caller is responsible for
    /// assigning a label afterwards.
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for an unallocated location, `Unavailable` if
    /// the slot is not deleted.
    pub fn unmark_deleted(&self, loc: u32) -> Result<()> {
        self.check_loc(loc)?;
        let mut deleted = self.deleted.write();
        if !deleted.remove(loc) {
            return Err(Error::Unavailable(format!("slot {loc} is not deleted")));
        }
        self.deleted_count.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }

    /// Soft-deletes by label: looks up the location, erases the mapping
    /// and marks the slot deleted in one critical section.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown label.
    pub fn remove(&self, label: u64) -> Result<u32> {
        let mut labels = self.labels.write();
        let mut deleted = self.deleted.write();
        let Some(&loc) = labels.label_to_loc.get(&label) else {
            return Err(Error::NotFound(format!("label {label} not in store")));
        };
        labels.label_to_loc.remove(&label);
        labels.loc_to_label[loc as usize] = UNKNOWN_LABEL;
        deleted.insert(loc);
        self.deleted_count.fetch_add(1, Ordering::Relaxed);
        Ok(loc)
    }

    /// Label stored at `loc` ([`UNKNOWN_LABEL`] for vacant slots).
    ///
    /// # Errors
    ///
    /// Returns `OutOfRange` for an unallocated location.
    pub fn get_label(&self, loc: u32) -> Result<u64> {
        self.check_loc(loc)?;
        Ok(self.labels.read().loc_to_label[loc as usize])
    }

    /// Location of a live label, if any.
    #[must_use]
    pub fn find_label(&self, label: u64) -> Option<u32> {
        self.labels.read().label_to_loc.get(&label).copied()
    }

    /// Whether `label` maps to a live slot.
    #[must_use]
    pub fn exists_label(&self, label: u64) -> bool {
        self.find_label(label).is_some()
    }

    fn check_loc(&self, loc: u32) -> Result<()> {
        let cur = self.current_idx.load(Ordering::Relaxed);
        if loc >= cur {
            return Err(Error::OutOfRange(format!(
                "location {loc} past high-water mark {cur}"
            )));
        }
        Ok(())
    }

    /// Serializes the store: counters, deleted bitmap, label table, then
    /// the raw vectors in the shared `{nvec, dim}` format.
    ///
    /// # Errors
    ///
    /// Propagates IO errors.
    pub fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        let labels = self.labels.read();
        let deleted = self.deleted.read();
        let data = self.data.read();
        let current = self.current_idx.load(Ordering::Relaxed);

        io::write_u32(w, current)?;
        io::write_u32(w, self.deleted_count.load(Ordering::Relaxed))?;

        let mut bitmap_bytes = Vec::with_capacity(deleted.serialized_size());
        deleted
            .serialize_into(&mut bitmap_bytes)
            .map_err(Error::Io)?;
        io::write_len_prefixed(w, &bitmap_bytes)?;

        io::write_u64(w, labels.loc_to_label.len() as u64)?;
        for &label in &labels.loc_to_label {
            io::write_u64(w, label)?;
        }

        let mut writer: VectorFileWriter<'_, W, E> =
            VectorFileWriter::create(w, current, self.dimension as u32)?;
        for batch in data.iter() {
            for si in 0..batch.len {
                writer.write_vector(batch.vector(si))?;
            }
        }
        writer.finish()?;
        info!(vectors = current, "vector store serialized");
        Ok(())
    }

    /// Deserializes a store section written by [`VectorStore::save`].
    ///
    /// # Errors
    ///
    /// Returns `DataLoss` on truncation or count mismatches; the store must
    /// be discarded on failure.
    pub fn load<R: Read>(&self, r: &mut R) -> Result<()> {
        let current = io::read_u32(r)?;
        if current > self.max_elements {
            return Err(Error::DataLoss(format!(
                "stored count {current} exceeds max_elements {}",
                self.max_elements
            )));
        }
        let deleted_count = io::read_u32(r)?;

        let bitmap_bytes = io::read_len_prefixed(r, 1 << 30)?;
        let bitmap = RoaringBitmap::deserialize_from(&bitmap_bytes[..])
            .map_err(|e| Error::DataLoss(format!("deleted bitmap corrupt: {e}")))?;
        if bitmap.len() != u64::from(deleted_count) {
            return Err(Error::DataLoss(format!(
                "deleted bitmap holds {} entries, header says {deleted_count}",
                bitmap.len()
            )));
        }

        let label_count = io::read_u64(r)?;
        if label_count != u64::from(self.max_elements) {
            return Err(Error::DataLoss(format!(
                "label table holds {label_count} entries, expected {}",
                self.max_elements
            )));
        }
        let mut loc_to_label = vec![UNKNOWN_LABEL; self.max_elements as usize];
        for slot in &mut loc_to_label {
            *slot = io::read_u64(r)?;
        }

        let mut reader: VectorFileReader<'_, R, E> = VectorFileReader::open(r)?;
        if reader.nvec() != current {
            return Err(Error::DataLoss(format!(
                "raw vector section holds {} vectors, header says {current}",
                reader.nvec()
            )));
        }
        if reader.dim() as usize != self.dimension {
            return Err(Error::DataLoss(format!(
                "raw vector section dimension {} differs from store dimension {}",
                reader.dim(),
                self.dimension
            )));
        }

        let mut data = self.data.write();
        self.resize_locked(&mut data, current);
        for batch in data.iter_mut() {
            for si in 0..batch.len {
                reader.read_vector(batch.vector_mut(si))?;
            }
        }
        drop(data);

        let mut label_to_loc = FxHashMap::default();
        for (loc, &label) in loc_to_label.iter().enumerate() {
            if label != UNKNOWN_LABEL {
                label_to_loc.insert(label, loc as u32);
            }
        }
        *self.labels.write() = LabelMap {
            label_to_loc,
            loc_to_label,
        };
        *self.deleted.write() = bitmap;
        self.deleted_count.store(deleted_count, Ordering::Relaxed);
        info!(vectors = current, deleted = deleted_count, "vector store deserialized");
        Ok(())
    }
}
