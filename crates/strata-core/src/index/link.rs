//! Neighbor selection and mutual linking.

use std::collections::BinaryHeap;
use tracing::trace;

use super::candidate::Candidate;
use super::engine::HnswIndex;
use super::graph::NodeLinks;
use crate::element::Element;
use crate::error::{Error, Result};

impl<E: Element> HnswIndex<E> {
    /// Prunes `top` (a worst-on-top candidate heap keyed by distance to
    /// the query) down to at most `m` well-spread candidates.
    ///
    /// Walking candidates by increasing query distance, a candidate `c`
    /// is dropped when some already-kept neighbor is strictly closer to it
    /// than the query is; `d(c, kept) == d(q, c)` keeps it. Heaps smaller
    /// than `m` pass through untouched.
    ///
    /// # Errors
    ///
    /// Propagates distance-evaluation errors.
    pub(super) fn select_neighbors(
        &self,
        top: &mut BinaryHeap<Candidate>,
        m: usize,
    ) -> Result<()> {
        if top.len() < m {
            return Ok(());
        }
        // Ascending distance order.
        let closest_first = std::mem::take(top).into_sorted_vec();
        let mut selected: Vec<Candidate> = Vec::with_capacity(m);
        for cand in closest_first {
            if selected.len() >= m {
                break;
            }
            let mut keep = true;
            for s in &selected {
                let d = self.store.distance(s.loc, cand.loc)?;
                if d < cand.distance() {
                    keep = false;
                    break;
                }
            }
            if keep {
                selected.push(cand);
            }
        }
        for cand in selected {
            top.push(cand);
        }
        Ok(())
    }

    /// Writes the selected neighbors as `cur_c`'s link list at `level`
    /// and back-links each of them to `cur_c`, re-selecting any neighbor
    /// list that overflows its capacity.
    ///
    /// Returns the closest selected neighbor, the entry point for the
    /// next-lower level. The caller holds `cur_c`'s node guard
    /// (`cur_links`); each back-link briefly takes the neighbor's guard.
    ///
    /// # Errors
    ///
    /// Returns `Internal` on any graph invariant violation: self-link,
    /// over-capacity list, link above a node's level, or a non-blank list
    /// on a fresh insert.
    pub(super) fn mutually_connect(
        &self,
        cur_c: u32,
        cur_links: &mut NodeLinks,
        mut top: BinaryHeap<Candidate>,
        level: u8,
        is_update: bool,
    ) -> Result<u32> {
        let m_cur_max = cur_links.capacity(level);
        self.select_neighbors(&mut top, self.options.m as usize)?;
        if top.len() > self.options.m as usize {
            return Err(Error::Internal(
                "heuristic returned more than M candidates".into(),
            ));
        }

        // Pop order is farthest-first, so the last entry is the closest.
        let mut selected = Vec::with_capacity(top.len());
        while let Some(c) = top.pop() {
            selected.push(c.loc);
        }
        let Some(&next_closest) = selected.last() else {
            return Err(Error::Internal(
                "no candidates survived neighbor selection".into(),
            ));
        };
        trace!(
            loc = cur_c,
            level,
            selected = selected.len(),
            "mutually connecting"
        );

        if !is_update && cur_links.len(level) != 0 {
            return Err(Error::Internal(
                "newly inserted element should have a blank link list".into(),
            ));
        }
        if level > cur_links.level() {
            return Err(Error::Internal(
                "trying to make a link on a non-existent level".into(),
            ));
        }
        cur_links.assign(level, &selected)?;

        for &neighbor in &selected {
            if neighbor == cur_c {
                return Err(Error::Internal(
                    "trying to connect an element to itself".into(),
                ));
            }
            let mut other = self.graph.lock(neighbor);
            let size = other.len(level);
            if size > other.capacity(level) {
                return Err(Error::Internal(format!(
                    "neighbor list of {size} exceeds capacity at level {level}"
                )));
            }
            if level > other.level() {
                return Err(Error::Internal(
                    "trying to make a link on a non-existent level".into(),
                ));
            }

            // On updates the back-link may already exist; leave the list
            // untouched then.
            if is_update && other.links(level).contains(&cur_c) {
                continue;
            }

            if size < other.capacity(level) {
                other.push(level, cur_c)?;
            } else {
                // The list is full: re-select from the union of the new
                // node and the existing neighbors, distances taken from
                // the overflowing node.
                let mut candidates = BinaryHeap::new();
                candidates.push(Candidate::new(
                    self.store.distance(cur_c, neighbor)?,
                    cur_c,
                ));
                for &existing in other.links(level) {
                    candidates.push(Candidate::new(
                        self.store.distance(existing, neighbor)?,
                        existing,
                    ));
                }
                self.select_neighbors(&mut candidates, m_cur_max)?;

                let mut new_links = Vec::with_capacity(candidates.len());
                while let Some(c) = candidates.pop() {
                    new_links.push(c.loc);
                }
                other.assign(level, &new_links)?;
            }
        }

        Ok(next_closest)
    }
}
