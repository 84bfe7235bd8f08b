//! In-place vector updates with incremental graph repair.

use rustc_hash::FxHashSet;
use std::collections::BinaryHeap;
use tracing::debug;

use super::candidate::Candidate;
use super::engine::{EntryPoint, HnswIndex};
use super::options::WriteOptions;
use crate::element::Element;
use crate::error::{Error, Result};

impl<E: Element> HnswIndex<E> {
    /// Rewrites the vector at `loc` and repairs the surrounding topology.
    ///
    /// For every level the node occupies, the 2-hop closure around the old
    /// position is gathered and each sampled 1-hop neighbor has its link
    /// list re-selected from that closure. Finally the node's own outgoing
    /// links are rebuilt through the regular descend-and-connect pipeline.
    pub(super) fn update_vector(
        &self,
        loc: u32,
        vector: &[E],
        options: &WriteOptions,
    ) -> Result<()> {
        let data = self.prepare_vector(vector, options.is_normalized)?;
        self.store.set_vector(loc, &data)?;

        let snapshot = *self.entry.lock();
        let Some(ep) = snapshot else {
            return Err(Error::Internal(
                "update on an index without an entry point".into(),
            ));
        };
        // A single-element graph has no topology to repair.
        if ep.loc == loc && self.store.size() == 1 {
            return Ok(());
        }

        let elem_level = self.graph.level(loc);
        debug!(loc, level = elem_level, "updating vector in place");

        for layer in 0..=elem_level {
            let one_hop = self.graph.neighbors(loc, layer);
            if one_hop.is_empty() {
                continue;
            }

            let mut closure: FxHashSet<u32> = FxHashSet::default();
            closure.insert(loc);
            let mut repair_targets: Vec<u32> = Vec::with_capacity(one_hop.len());
            for &n in &one_hop {
                closure.insert(n);
                if self.update_rng.next_f64() > self.update_neighbor_probability {
                    continue;
                }
                repair_targets.push(n);
                for two_hop in self.graph.neighbors(n, layer) {
                    closure.insert(two_hop);
                }
            }

            for &neigh in &repair_targets {
                // The closure always contains `neigh` itself.
                let keep = (self.options.ef_construction as usize).min(closure.len() - 1);
                let mut candidates: BinaryHeap<Candidate> = BinaryHeap::new();
                for &cand in &closure {
                    if cand == neigh {
                        continue;
                    }
                    let d = self.store.distance(neigh, cand)?;
                    if candidates.len() < keep {
                        candidates.push(Candidate::new(d, cand));
                    } else if let Some(worst) = candidates.peek() {
                        if d < worst.distance() {
                            candidates.pop();
                            candidates.push(Candidate::new(d, cand));
                        }
                    }
                }

                let cap = if layer == 0 {
                    2 * self.options.m as usize
                } else {
                    self.options.m as usize
                };
                self.select_neighbors(&mut candidates, cap)?;

                let mut node = self.graph.lock(neigh);
                let mut new_links = Vec::with_capacity(candidates.len());
                while let Some(c) = candidates.pop() {
                    new_links.push(c.loc);
                }
                node.assign(layer, &new_links)?;
            }
        }

        self.repair_connections(ep, loc, elem_level)
    }

    /// Re-runs the descend-and-connect pipeline for the updated node's own
    /// outgoing links.
    fn repair_connections(&self, ep: EntryPoint, loc: u32, elem_level: u8) -> Result<()> {
        let max_level = i32::from(ep.level);
        if i32::from(elem_level) > max_level {
            return Err(Error::Internal(
                "level of updated element cannot exceed the entry point level".into(),
            ));
        }

        let mut cur_obj = ep.loc;
        if i32::from(elem_level) < max_level {
            cur_obj = self.descend_for_location(loc, cur_obj, max_level, i32::from(elem_level))?;
        }

        let ep_deleted = self.store.is_deleted(ep.loc)?;
        let mut level = i32::from(elem_level);
        while level >= 0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let l = level as u8;
            let top = self.search_base_layer(cur_obj, loc, l)?;

            // The search can return the node itself; drop it so the
            // connect step cannot produce a self-link. The filtered set
            // may then be empty (entry point only), in which case this
            // level keeps its current links.
            let mut filtered = BinaryHeap::new();
            for c in top.into_vec() {
                if c.loc != loc {
                    filtered.push(c);
                }
            }

            if !filtered.is_empty() {
                if ep_deleted {
                    filtered.push(Candidate::new(self.store.distance(loc, ep.loc)?, ep.loc));
                    while filtered.len() > self.options.ef_construction as usize {
                        filtered.pop();
                    }
                }
                let mut cur_links = self.graph.lock(loc);
                cur_obj = self.mutually_connect(loc, &mut cur_links, filtered, l, true)?;
            }
            level -= 1;
        }
        Ok(())
    }
}
