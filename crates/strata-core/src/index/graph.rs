//! Layered adjacency storage for the HNSW graph.
//!
//! The graph is an arena indexed by location. Each node owns one contiguous
//! block holding its per-level link arrays — capacity 2M at level 0 and M
//! above — plus a length per level. Capacity is fixed once by
//! `setup_location`; afterwards only array contents change, never layout.
//!
//! The per-node mutex wrapping each block is the engine's link-list lock:
//! any two operations touching the same node's links serialize on it.

use parking_lot::{Mutex, MutexGuard};
use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::io;

/// Link lists of a single node, all levels in one allocation.
#[derive(Debug, Default)]
pub(crate) struct NodeLinks {
    level: u8,
    initialized: bool,
    m: u32,
    /// Current length per level, `lens[l] <= capacity(l)`.
    lens: Vec<u32>,
    /// Backing block: `[level 0: 2M slots][level 1: M]...[level L: M]`.
    links: Vec<u32>,
}

impl NodeLinks {
    /// Max links at `level`: 2M at the base layer, M above.
    #[inline]
    pub(crate) fn capacity(&self, level: u8) -> usize {
        if level == 0 {
            2 * self.m as usize
        } else {
            self.m as usize
        }
    }

    #[inline]
    fn offset(&self, level: u8) -> usize {
        if level == 0 {
            0
        } else {
            (2 * self.m + (u32::from(level) - 1) * self.m) as usize
        }
    }

    /// Highest level this node occupies.
    #[inline]
    pub(crate) fn level(&self) -> u8 {
        self.level
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current link count at `level` (zero past the node's top level).
    #[inline]
    pub(crate) fn len(&self, level: u8) -> usize {
        self.lens.get(usize::from(level)).map_or(0, |&l| l as usize)
    }

    /// Links at `level` (empty past the node's top level).
    #[inline]
    pub(crate) fn links(&self, level: u8) -> &[u32] {
        if usize::from(level) >= self.lens.len() {
            return &[];
        }
        let off = self.offset(level);
        &self.links[off..off + self.len(level)]
    }

    /// Overwrites the link list at `level`.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if `new_links` exceeds the level capacity.
    pub(crate) fn assign(&mut self, level: u8, new_links: &[u32]) -> Result<()> {
        if new_links.len() > self.capacity(level) {
            return Err(Error::Internal(format!(
                "{} links exceed capacity {} at level {level}",
                new_links.len(),
                self.capacity(level)
            )));
        }
        let off = self.offset(level);
        self.links[off..off + new_links.len()].copy_from_slice(new_links);
        self.lens[usize::from(level)] = new_links.len() as u32;
        Ok(())
    }

    /// Appends one link at `level`.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when the list is full.
    pub(crate) fn push(&mut self, level: u8, loc: u32) -> Result<()> {
        let len = self.len(level);
        if len >= self.capacity(level) {
            return Err(Error::Internal(format!(
                "link list full at level {level} (capacity {})",
                self.capacity(level)
            )));
        }
        let off = self.offset(level);
        self.links[off + len] = loc;
        self.lens[usize::from(level)] = (len + 1) as u32;
        Ok(())
    }

    fn setup(&mut self, level: u8, m: u32) {
        self.level = level;
        self.m = m;
        self.lens = vec![0u32; usize::from(level) + 1];
        self.links = vec![0u32; (2 * m + u32::from(level) * m) as usize];
        self.initialized = true;
    }
}

/// Arena of per-location link blocks with their guarding mutexes.
#[derive(Debug)]
pub(crate) struct LinkGraph {
    nodes: Box<[Mutex<NodeLinks>]>,
    m: u32,
}

impl LinkGraph {
    pub(crate) fn new(max_elements: u32, m: u32) -> Self {
        let nodes = (0..max_elements)
            .map(|_| Mutex::new(NodeLinks::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { nodes, m }
    }

    /// Locks the node at `loc`. The guard is the link-list lock of the
    /// spec's lock inventory; hold it only around snapshot or rewrite.
    #[inline]
    pub(crate) fn lock(&self, loc: u32) -> MutexGuard<'_, NodeLinks> {
        self.nodes[loc as usize].lock()
    }

    /// Allocates the link block for a freshly inserted node. The caller
    /// holds the node's guard; vacant-slot reuse keeps the previous block,
    /// so a double setup is an invariant violation.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when the node was already set up.
    pub(crate) fn setup_node(&self, node: &mut NodeLinks, level: u8) -> Result<()> {
        if node.is_initialized() {
            return Err(Error::Internal("node already has a link block".into()));
        }
        node.setup(level, self.m);
        Ok(())
    }

    /// Highest level occupied by the node at `loc`.
    pub(crate) fn level(&self, loc: u32) -> u8 {
        self.lock(loc).level()
    }

    /// Copies the link list at `(loc, level)` under the node lock.
    pub(crate) fn neighbors(&self, loc: u32, level: u8) -> Vec<u32> {
        let node = self.lock(loc);
        node.links(level).to_vec()
    }

    /// Serializes link blocks for locations `0..count`.
    ///
    /// # Errors
    ///
    /// Propagates IO errors.
    pub(crate) fn save<W: Write>(&self, w: &mut W, count: u32) -> Result<()> {
        for loc in 0..count {
            let node = self.lock(loc);
            io::write_u8(w, node.level())?;
            for level in 0..=node.level() {
                let links = node.links(level);
                io::write_u32(w, links.len() as u32)?;
                for &l in links {
                    io::write_u32(w, l)?;
                }
            }
        }
        Ok(())
    }

    /// Deserializes link blocks for locations `0..count`.
    ///
    /// # Errors
    ///
    /// Returns `DataLoss` on truncation, over-capacity lists, or link
    /// targets outside the arena.
    pub(crate) fn load<R: Read>(&self, r: &mut R, count: u32) -> Result<()> {
        let arena = self.nodes.len() as u32;
        for loc in 0..count {
            let level = io::read_u8(r)?;
            let mut node = self.lock(loc);
            node.setup(level, self.m);
            for l in 0..=level {
                let len = io::read_u32(r)? as usize;
                if len > node.capacity(l) {
                    return Err(Error::DataLoss(format!(
                        "link list of {len} exceeds capacity {} at level {l}",
                        node.capacity(l)
                    )));
                }
                let mut links = vec![0u32; len];
                for slot in &mut links {
                    let target = io::read_u32(r)?;
                    if target >= arena {
                        return Err(Error::DataLoss(format!(
                            "link target {target} outside graph arena of {arena}"
                        )));
                    }
                    *slot = target;
                }
                node.assign(l, &links)?;
            }
        }
        Ok(())
    }
}
