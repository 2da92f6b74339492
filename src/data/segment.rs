//! # Segments of Modalities
//!
//! A closed integer interval `[lo, hi]` of still-possible modalities. Every
//! step of the binary ordinal search narrows one segment down to a
//! sub-segment, so the type is small, `Copy`, and immutable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Zero-based modality index
pub type Modality = usize;

/// Closed interval `[lo, hi]` with `lo <= hi`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    lo: Modality,
    hi: Modality,
}

impl Segment {
    /// Create a segment. Bounds are swapped if given in the wrong order.
    pub fn new(lo: Modality, hi: Modality) -> Self {
        if lo <= hi {
            Self { lo, hi }
        } else {
            Self { lo: hi, hi: lo }
        }
    }

    /// Degenerate segment holding a single modality
    pub fn point(value: Modality) -> Self {
        Self { lo: value, hi: value }
    }

    /// Full range `[0, n_modalities - 1]`
    pub fn full(n_modalities: usize) -> Self {
        Self::new(0, n_modalities.saturating_sub(1))
    }

    #[inline]
    pub fn lo(self) -> Modality {
        self.lo
    }

    #[inline]
    pub fn hi(self) -> Modality {
        self.hi
    }

    /// Number of modalities in the segment
    #[inline]
    pub fn size(self) -> usize {
        self.hi - self.lo + 1
    }

    #[inline]
    pub fn is_point(self) -> bool {
        self.lo == self.hi
    }

    #[inline]
    pub fn contains(self, value: Modality) -> bool {
        self.lo <= value && value <= self.hi
    }

    /// True when `other` lies entirely inside `self`
    #[inline]
    pub fn contains_segment(self, other: Segment) -> bool {
        self.lo <= other.lo && other.hi <= self.hi
    }

    #[inline]
    pub fn overlaps(self, other: Segment) -> bool {
        self.lo <= other.hi && other.lo <= self.hi
    }

    /// Distance from `mode` to the nearer of the two endpoints.
    ///
    /// This is the steering criterion of an accurate comparison; it is not the
    /// point-to-interval distance (a mode strictly inside a wide segment still
    /// measures to an endpoint).
    #[inline]
    pub fn endpoint_distance(self, mode: Modality) -> usize {
        mode.abs_diff(self.lo).min(mode.abs_diff(self.hi))
    }

    pub fn iter(self) -> std::ops::RangeInclusive<Modality> {
        self.lo..=self.hi
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.lo, self.hi)
    }
}
