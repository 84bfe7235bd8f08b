//! Distance metrics and the pairwise distance kernel.
//!
//! Every metric is oriented so that *smaller is better*: L2 is the euclidean
//! distance, inner product is `1 - dot`, and cosine is `1 - dot` over unit
//! vectors. The engine's candidate ordering relies on this convention.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

use crate::element::Element;
use crate::error::{Error, Result};

/// Distance metric for vector similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Euclidean distance (L2 norm).
    L2,
    /// Inner product, sign-flipped (`1 - dot`) so smaller means closer.
    InnerProduct,
    /// Cosine distance (`1 - cos`). For float vectors the base points are
    /// L2-normalized once at insert time and compared with a plain dot
    /// product; integer vectors divide by the norms on every compare.
    Cosine,
}

impl Metric {
    /// Encodes the metric as a single header byte.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::L2 => 0,
            Self::InnerProduct => 1,
            Self::Cosine => 2,
        }
    }

    /// Decodes a header byte back into a metric.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unknown tag byte.
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(Self::L2),
            1 => Ok(Self::InnerProduct),
            2 => Ok(Self::Cosine),
            other => Err(Error::InvalidArgument(format!("unknown metric tag: {other}"))),
        }
    }
}

/// Pairwise distance kernel, monomorphized over the element type.
///
/// Distances are symmetric and stable: the same pair always compares to the
/// same value, and `compare(a, a) == 0` for L2 and (preprocessed) cosine.
#[derive(Debug, Clone, Copy)]
pub struct DistanceKernel<E> {
    metric: Metric,
    _marker: PhantomData<E>,
}

impl<E: Element> DistanceKernel<E> {
    /// Creates a kernel for the given metric.
    #[must_use]
    pub const fn new(metric: Metric) -> Self {
        Self {
            metric,
            _marker: PhantomData,
        }
    }

    /// Returns the metric this kernel computes.
    #[must_use]
    pub const fn metric(&self) -> Metric {
        self.metric
    }

    /// Computes the distance between two equal-length vectors.
    #[inline]
    #[must_use]
    pub fn compare(&self, a: &[E], b: &[E]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self.metric {
            Metric::L2 => euclidean(a, b),
            Metric::InnerProduct => 1.0 - dot(a, b),
            Metric::Cosine => {
                if E::NORMALIZABLE {
                    // Base points were normalized at insert time.
                    1.0 - dot(a, b)
                } else {
                    cosine(a, b)
                }
            }
        }
    }

    /// Whether base points must be preprocessed before storage.
    ///
    /// True only for float cosine, where vectors are L2-normalized once so
    /// every compare is a single dot product.
    #[must_use]
    pub const fn preprocess_required(&self) -> bool {
        matches!(self.metric, Metric::Cosine) && E::NORMALIZABLE
    }

    /// Preprocesses a base point in place (L2 normalization).
    ///
    /// Idempotent: a unit vector stays byte-identical up to float rounding.
    pub fn preprocess_in_place(&self, v: &mut [E]) {
        if self.preprocess_required() {
            E::l2_normalize(v);
        }
    }
}

#[inline]
fn dot<E: Element>(a: &[E], b: &[E]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.to_f32() * y.to_f32())
        .sum()
}

#[inline]
fn euclidean<E: Element>(a: &[E], b: &[E]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x.to_f32() - y.to_f32();
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

#[inline]
fn cosine<E: Element>(a: &[E], b: &[E]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (x.to_f32(), y.to_f32());
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
