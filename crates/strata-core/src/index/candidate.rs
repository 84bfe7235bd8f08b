//! Heap entries for graph searches.

use std::cmp::Ordering;

/// A `(distance, location)` pair with a total order.
///
/// Distances come out of the kernels as plain `f32`, which carries no
/// `Ord`. Candidates compare by `f32::total_cmp` on the distance and fall
/// back to the location, so a `BinaryHeap` stays well-formed even if a
/// kernel ever emits a NaN, and equal distances always pop in the same
/// order. Equality matches the total order by comparing the distance bits
/// rather than using float `==` (which would disagree on NaN and ±0.0).
///
/// A `BinaryHeap<Candidate>` is a max-heap with the *worst* candidate on
/// top — the shape every search keeps its result set in. Wrap entries in
/// `std::cmp::Reverse` for a best-first frontier.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Candidate {
    dist: f32,
    pub loc: u32,
}

impl Candidate {
    pub(crate) fn new(dist: f32, loc: u32) -> Self {
        Self { dist, loc }
    }

    /// Distance to the query under the index metric.
    #[inline]
    pub(crate) fn distance(&self) -> f32 {
        self.dist
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist.to_bits() == other.dist.to_bits() && self.loc == other.loc
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.loc.cmp(&other.loc))
    }
}
