//! # Search Nodes
//!
//! One step of the binary ordinal search. A node splits its parent segment
//! at a breakpoint into at most three parts (left, center, right), flags the
//! comparison as accurate or blind, and keeps one part as the segment the
//! next step starts from.
//!
//! ## Elementary probabilities
//! - breakpoint: uniform over the parent segment
//! - accuracy: Bernoulli(precision)
//! - choice: accurate steps take the part whose nearer endpoint is closest to
//!   the mode (first in left, center, right order on ties); blind steps pick a
//!   part with probability proportional to its size
//!
//! The partition is not stored on the node. It is a pure function of the
//! parent segment and the breakpoint, and the parent is only known to the
//! owning path.

use serde::{Deserialize, Serialize};

use crate::data::segment::{Modality, Segment};

/// Ordered split of a segment: left (if non-empty), center, right (if non-empty)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    parts: [Segment; 3],
    len: u8,
}

impl Partition {
    /// Split `parent` at `breakpoint`.
    ///
    /// A breakpoint outside `parent` yields an empty partition, which every
    /// probability function below scores as impossible.
    pub fn split(parent: Segment, breakpoint: Modality) -> Self {
        let mut parts = [Segment::point(breakpoint); 3];
        let mut len = 0u8;
        if !parent.contains(breakpoint) {
            return Self { parts, len };
        }
        if breakpoint > parent.lo() {
            parts[len as usize] = Segment::new(parent.lo(), breakpoint - 1);
            len += 1;
        }
        parts[len as usize] = Segment::point(breakpoint);
        len += 1;
        if breakpoint < parent.hi() {
            parts[len as usize] = Segment::new(breakpoint + 1, parent.hi());
            len += 1;
        }
        Self { parts, len }
    }

    #[inline]
    pub fn as_slice(&self) -> &[Segment] {
        &self.parts[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sum of part sizes (the parent size, or 0 when empty)
    pub fn total_size(&self) -> usize {
        self.as_slice().iter().map(|s| s.size()).sum()
    }

    pub fn contains(&self, seg: Segment) -> bool {
        self.as_slice().contains(&seg)
    }

    /// Part an accurate comparison steers to.
    ///
    /// Strict `<` keeps the first part found on ties.
    pub fn closest_to(&self, mode: Modality) -> Option<Segment> {
        let mut best: Option<(usize, Segment)> = None;
        for &seg in self.as_slice() {
            let d = seg.endpoint_distance(mode);
            match best {
                Some((best_d, _)) if d >= best_d => {}
                _ => best = Some((d, seg)),
            }
        }
        best.map(|(_, seg)| seg)
    }

    /// Part sizes as weights for a blind draw
    pub fn size_weights(&self) -> ([f64; 3], usize) {
        let mut w = [0.0; 3];
        for (slot, seg) in w.iter_mut().zip(self.as_slice()) {
            *slot = seg.size() as f64;
        }
        (w, self.len())
    }
}

/// One step of a path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathNode {
    pub breakpoint: Modality,
    pub accurate: bool,
    pub chosen: Segment,
}

impl PathNode {
    pub fn new(breakpoint: Modality, accurate: bool, chosen: Segment) -> Self {
        Self {
            breakpoint,
            accurate,
            chosen,
        }
    }

    pub fn partition(&self, parent: Segment) -> Partition {
        Partition::split(parent, self.breakpoint)
    }

    /// `-ln |parent|` when the breakpoint lies in `parent`, else `-inf`
    #[inline]
    pub fn log_prob_breakpoint(&self, parent: Segment) -> f64 {
        if parent.contains(self.breakpoint) {
            -(parent.size() as f64).ln()
        } else {
            f64::NEG_INFINITY
        }
    }

    #[inline]
    pub fn log_prob_accuracy(&self, precision: f64) -> f64 {
        log_prob_accuracy(self.accurate, precision)
    }

    /// Log-probability of `chosen` given an already computed partition
    pub fn log_prob_choice_in(&self, partition: &Partition, mode: Modality) -> f64 {
        if !partition.contains(self.chosen) {
            return f64::NEG_INFINITY;
        }
        if self.accurate {
            if partition.closest_to(mode) == Some(self.chosen) {
                0.0
            } else {
                f64::NEG_INFINITY
            }
        } else {
            let total = partition.total_size();
            if total == 0 {
                return f64::NEG_INFINITY;
            }
            (self.chosen.size() as f64 / total as f64).ln()
        }
    }

    pub fn log_prob_choice(&self, parent: Segment, mode: Modality) -> f64 {
        self.log_prob_choice_in(&self.partition(parent), mode)
    }

    /// Full log-probability of this step given its parent segment
    pub fn log_prob(&self, parent: Segment, mode: Modality, precision: f64) -> f64 {
        let lp_bp = self.log_prob_breakpoint(parent);
        if lp_bp == f64::NEG_INFINITY {
            return lp_bp;
        }
        let lp_acc = self.log_prob_accuracy(precision);
        if lp_acc == f64::NEG_INFINITY {
            return lp_acc;
        }
        lp_bp + lp_acc + self.log_prob_choice(parent, mode)
    }
}

#[inline]
pub fn log_prob_accuracy(accurate: bool, precision: f64) -> f64 {
    if accurate {
        precision.ln()
    } else {
        (1.0 - precision).ln()
    }
}
