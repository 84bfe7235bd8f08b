//! Reusable visited-list scratch buffers for graph searches.
//!
//! A visited list marks which locations the current search has expanded.
//! Instead of clearing the array between searches, each borrow bumps a
//! generation counter and "visited" means "tag equals the current
//! generation" — an O(1) reset. Lists are pooled so steady-state searches
//! allocate nothing.

use parking_lot::Mutex;

/// Generation-tagged visited array sized for `max_elements` locations.
#[derive(Debug)]
pub(crate) struct VisitedList {
    tags: Box<[u16]>,
    current: u16,
}

impl VisitedList {
    fn new(num_elements: usize) -> Self {
        Self {
            tags: vec![0u16; num_elements].into_boxed_slice(),
            current: 0,
        }
    }

    /// Starts a fresh generation. On tag wrap-around the whole array is
    /// cleared once, keeping the tag comparison sound.
    fn advance(&mut self) {
        if self.current == u16::MAX {
            self.tags.fill(0);
            self.current = 0;
        }
        self.current += 1;
    }

    /// Marks a location as visited.
    #[inline]
    pub(crate) fn mark(&mut self, loc: u32) {
        self.tags[loc as usize] = self.current;
    }

    /// Marks a location, returning true if it was not yet visited in this
    /// generation.
    #[inline]
    pub(crate) fn check_and_mark(&mut self, loc: u32) -> bool {
        let slot = &mut self.tags[loc as usize];
        if *slot == self.current {
            false
        } else {
            *slot = self.current;
            true
        }
    }
}

/// Pool of [`VisitedList`] buffers shared by all searches on an index.
#[derive(Debug)]
pub(crate) struct VisitedListPool {
    free: Mutex<Vec<VisitedList>>,
    num_elements: usize,
}

impl VisitedListPool {
    /// Creates a pool holding `initial` pre-allocated lists.
    pub(crate) fn new(initial: usize, num_elements: usize) -> Self {
        let free = (0..initial).map(|_| VisitedList::new(num_elements)).collect();
        Self {
            free: Mutex::new(free),
            num_elements,
        }
    }

    /// Borrows a list for one search. The returned guard hands the list
    /// back to the pool on drop, on every exit path.
    pub(crate) fn acquire(&self) -> VisitedGuard<'_> {
        let mut list = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| VisitedList::new(self.num_elements));
        list.advance();
        VisitedGuard {
            pool: self,
            list: Some(list),
        }
    }
}

/// RAII borrow of a [`VisitedList`].
pub(crate) struct VisitedGuard<'a> {
    pool: &'a VisitedListPool,
    list: Option<VisitedList>,
}

impl std::ops::Deref for VisitedGuard<'_> {
    type Target = VisitedList;

    fn deref(&self) -> &VisitedList {
        self.list.as_ref().expect("visited list present until drop")
    }
}

impl std::ops::DerefMut for VisitedGuard<'_> {
    fn deref_mut(&mut self) -> &mut VisitedList {
        self.list.as_mut().expect("visited list present until drop")
    }
}

impl Drop for VisitedGuard<'_> {
    fn drop(&mut self) {
        if let Some(list) = self.list.take() {
            self.pool.free.lock().push(list);
        }
    }
}
