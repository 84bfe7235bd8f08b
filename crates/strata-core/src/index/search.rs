//! Graph search: greedy descent and the ef-bounded base-layer search.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tracing::trace;

use super::candidate::Candidate;
use super::engine::HnswIndex;
use crate::element::Element;
use crate::error::{Error, Result};

/// A single search hit: distance to the query and the external label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Distance under the index metric (smaller is closer).
    pub distance: f32,
    /// External label of the matching vector.
    pub label: u64,
}

/// A top-k query with an optional label filter.
pub struct SearchQuery<'a, E> {
    /// Query vector; normalized internally for cosine indexes.
    pub vector: &'a [E],
    /// Number of neighbors requested.
    pub k: usize,
    /// Optional allow-list predicate over external labels.
    pub filter: Option<&'a dyn Fn(u64) -> bool>,
}

impl<E: Element> HnswIndex<E> {
    /// Returns the `k` nearest live vectors, sorted ascending by distance.
    ///
    /// An empty index yields an empty result without error; fewer than `k`
    /// live vectors yield as many as exist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` on a dimension mismatch, or corruption
    /// errors surfaced from graph traversal.
    pub fn search(&self, query: &[E], k: usize) -> Result<Vec<Neighbor>> {
        self.search_with(&SearchQuery {
            vector: query,
            k,
            filter: None,
        })
    }

    /// Filtered variant of [`HnswIndex::search`].
    ///
    /// # Errors
    ///
    /// See [`HnswIndex::search`].
    pub fn search_with(&self, query: &SearchQuery<'_, E>) -> Result<Vec<Neighbor>> {
        if self.store.size() == 0 {
            return Ok(Vec::new());
        }
        let Some(ep) = *self.entry.lock() else {
            return Ok(Vec::new());
        };
        let prepared = self.prepare_vector(query.vector, false)?;

        // Greedy hill-climb down to level 1.
        let mut cur = ep.loc;
        let mut curdist = self.store.distance_to_query(&prepared, cur)?;
        for level in (1..=ep.level).rev() {
            loop {
                let mut changed = false;
                {
                    let node = self.graph.lock(cur);
                    let links = node.links(level);
                    self.metrics.record(1, links.len() as u64);
                    for &cand in links {
                        self.check_link(cand)?;
                        let d = self.store.distance_to_query(&prepared, cand)?;
                        if d < curdist {
                            curdist = d;
                            cur = cand;
                            changed = true;
                        }
                    }
                }
                if !changed {
                    break;
                }
            }
        }

        let ef = self.ef().max(query.k);
        let mut top = if self.store.deleted_len() > 0 {
            self.search_base_layer_st::<true, true>(cur, &prepared, ef, query.filter)?
        } else {
            self.search_base_layer_st::<false, true>(cur, &prepared, ef, query.filter)?
        };

        while top.len() > query.k {
            top.pop();
        }
        let mut results = Vec::with_capacity(top.len());
        while let Some(c) = top.pop() {
            results.push(Neighbor {
                distance: c.distance(),
                label: self.store.get_label(c.loc)?,
            });
        }
        results.reverse();
        Ok(results)
    }

    /// Best-first base-layer search for queries.
    ///
    /// `top` is a max-heap capped at `ef` (worst candidate on top);
    /// `frontier` is a min-heap of not-yet-expanded candidates. The
    /// deletion filter and metric counters are compiled out when the
    /// corresponding const flags are off.
    pub(super) fn search_base_layer_st<const HAS_DELETIONS: bool, const COLLECT_METRICS: bool>(
        &self,
        ep_id: u32,
        query: &[E],
        ef: usize,
        filter: Option<&dyn Fn(u64) -> bool>,
    ) -> Result<BinaryHeap<Candidate>> {
        let mut visited = self.visited.acquire();
        let mut top: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();

        let ep_allowed = (!HAS_DELETIONS || !self.store.is_deleted(ep_id)?)
            && match filter {
                Some(f) => f(self.store.get_label(ep_id)?),
                None => true,
            };
        let mut lower_bound;
        if ep_allowed {
            let d = self.store.distance_to_query(query, ep_id)?;
            lower_bound = d;
            top.push(Candidate::new(d, ep_id));
            frontier.push(Reverse(Candidate::new(d, ep_id)));
        } else {
            lower_bound = f32::MAX;
            frontier.push(Reverse(Candidate::new(lower_bound, ep_id)));
        }
        visited.mark(ep_id);

        while let Some(&Reverse(current)) = frontier.peek() {
            if current.distance() > lower_bound
                && (top.len() == ef || (filter.is_none() && !HAS_DELETIONS))
            {
                break;
            }
            frontier.pop();

            let node = self.graph.lock(current.loc);
            let links = node.links(0);
            if COLLECT_METRICS {
                self.metrics.record(1, links.len() as u64);
            }
            for &cand in links {
                self.check_link(cand)?;
                if !visited.check_and_mark(cand) {
                    continue;
                }
                let d = self.store.distance_to_query(query, cand)?;
                if top.len() < ef || d < lower_bound {
                    frontier.push(Reverse(Candidate::new(d, cand)));
                    let allowed = (!HAS_DELETIONS || !self.store.is_deleted(cand)?)
                        && match filter {
                            Some(f) => f(self.store.get_label(cand)?),
                            None => true,
                        };
                    if allowed {
                        top.push(Candidate::new(d, cand));
                    }
                    if top.len() > ef {
                        top.pop();
                    }
                    if let Some(worst) = top.peek() {
                        lower_bound = worst.distance();
                    }
                }
            }
        }
        Ok(top)
    }

    /// Best-first base-layer search during construction: the query is a
    /// stored location and the beam width is `ef_construction`.
    pub(super) fn search_base_layer(
        &self,
        ep_id: u32,
        loc: u32,
        level: u8,
    ) -> Result<BinaryHeap<Candidate>> {
        let ef_construction = self.options.ef_construction as usize;
        let mut visited = self.visited.acquire();
        let mut top: BinaryHeap<Candidate> = BinaryHeap::new();
        let mut frontier: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();

        let mut lower_bound;
        if self.store.is_deleted(ep_id)? {
            lower_bound = f32::MAX;
            frontier.push(Reverse(Candidate::new(lower_bound, ep_id)));
        } else {
            let d = self.store.distance(loc, ep_id)?;
            lower_bound = d;
            top.push(Candidate::new(d, ep_id));
            frontier.push(Reverse(Candidate::new(d, ep_id)));
        }
        visited.mark(ep_id);

        while let Some(&Reverse(current)) = frontier.peek() {
            if current.distance() > lower_bound && top.len() == ef_construction {
                break;
            }
            frontier.pop();

            let node = self.graph.lock(current.loc);
            for &cand in node.links(level) {
                self.check_link(cand)?;
                if !visited.check_and_mark(cand) {
                    continue;
                }
                let d = self.store.distance(loc, cand)?;
                if top.len() < ef_construction || d < lower_bound {
                    frontier.push(Reverse(Candidate::new(d, cand)));
                    if !self.store.is_deleted(cand)? {
                        top.push(Candidate::new(d, cand));
                    }
                    if top.len() > ef_construction {
                        top.pop();
                    }
                    if let Some(worst) = top.peek() {
                        lower_bound = worst.distance();
                    }
                }
            }
        }
        Ok(top)
    }

    /// Hill-climbs from `cur` through `(to_level, from_level]` toward the
    /// stored vector at `loc`, returning the per-level local optimum.
    pub(super) fn descend_for_location(
        &self,
        loc: u32,
        mut cur: u32,
        from_level: i32,
        to_level: i32,
    ) -> Result<u32> {
        let mut curdist = self.store.distance(loc, cur)?;
        let mut level = from_level;
        while level > to_level {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let l = level as u8;
            loop {
                let mut changed = false;
                {
                    let node = self.graph.lock(cur);
                    let links = node.links(l);
                    trace!(node = cur, level = l, links = links.len(), "descend scan");
                    for &cand in links {
                        self.check_link(cand)?;
                        let d = self.store.distance(loc, cand)?;
                        if d < curdist {
                            curdist = d;
                            cur = cand;
                            changed = true;
                        }
                    }
                }
                if !changed {
                    break;
                }
            }
            level -= 1;
        }
        Ok(cur)
    }

    /// A link target past the configured capacity means the graph bytes
    /// are corrupt.
    #[inline]
    pub(super) fn check_link(&self, loc: u32) -> Result<()> {
        if loc >= self.options.max_elements {
            return Err(Error::OutOfRange(format!(
                "link target {loc} past max_elements {}",
                self.options.max_elements
            )));
        }
        Ok(())
    }
}
