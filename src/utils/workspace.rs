//! # Workspace Pattern for Sweep Buffers
//!
//! Pre-allocated buffers for the tuple enumeration of a Gibbs sweep, so the
//! hot loop does not allocate per candidate.
//!
//! ## Design Philosophy
//! Instead of storing scratch buffers inside [`Path`](crate::model::path::Path)
//! (which would make every path carry them and complicate borrowing while the
//! path itself is read during enumeration), a separate workspace owns all
//! temporary buffers and `&mut SweepWorkspace` is passed to the sweep.

use std::cell::RefCell;

use crate::data::segment::Segment;
use crate::model::node::PathNode;

/// Scratch space for one tuple enumeration
#[derive(Debug, Default)]
pub struct SweepWorkspace {
    /// Node tuple under construction (tuple_size)
    pub tuple: Vec<PathNode>,

    /// Surviving candidates, flattened (n_candidates x tuple_size)
    pub candidates: Vec<PathNode>,

    /// Log-probability of each surviving candidate
    pub log_probs: Vec<f64>,

    /// Normalized probabilities, filled before the draw
    pub probs: Vec<f64>,
}

impl SweepWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a workspace sized for a tuple and an expected candidate count
    pub fn with_capacity(tuple_size: usize, n_candidates: usize) -> Self {
        Self {
            tuple: Vec::with_capacity(tuple_size),
            candidates: Vec::with_capacity(tuple_size * n_candidates),
            log_probs: Vec::with_capacity(n_candidates),
            probs: Vec::with_capacity(n_candidates),
        }
    }

    /// Clear candidates and size the tuple buffer for a new enumeration
    pub fn reset(&mut self, tuple_size: usize) {
        let filler = PathNode::new(0, false, Segment::point(0));
        self.tuple.clear();
        self.tuple.resize(tuple_size, filler);
        self.candidates.clear();
        self.log_probs.clear();
        self.probs.clear();
    }

    #[inline]
    pub fn n_candidates(&self) -> usize {
        self.log_probs.len()
    }

    /// Candidate `idx` as a slice of `tuple.len()` nodes
    #[inline]
    pub fn candidate(&self, idx: usize) -> &[PathNode] {
        let t = self.tuple.len();
        &self.candidates[idx * t..(idx + 1) * t]
    }

    /// Record the current tuple as a candidate
    #[inline]
    pub fn push_candidate(&mut self, log_prob: f64) {
        self.candidates.extend_from_slice(&self.tuple);
        self.log_probs.push(log_prob);
    }
}

thread_local! {
    static THREAD_WORKSPACE: RefCell<Option<SweepWorkspace>> = const { RefCell::new(None) };
}

/// Run `f` with this thread's sweep workspace, creating it on first use
pub fn with_thread_workspace<T>(f: impl FnOnce(&mut SweepWorkspace) -> T) -> T {
    THREAD_WORKSPACE.with(|cell| {
        let mut slot = cell.borrow_mut();
        let ws = slot.get_or_insert_with(SweepWorkspace::new);
        f(ws)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_and_candidates() {
        let mut ws = SweepWorkspace::with_capacity(2, 8);
        ws.reset(2);
        assert_eq!(ws.tuple.len(), 2);
        ws.tuple[0] = PathNode::new(1, true, Segment::point(1));
        ws.tuple[1] = PathNode::new(2, false, Segment::point(2));
        ws.push_candidate(-1.0);
        ws.tuple[1].accurate = true;
        ws.push_candidate(-2.0);
        assert_eq!(ws.n_candidates(), 2);
        assert!(ws.candidate(1)[1].accurate);
        assert!(!ws.candidate(0)[1].accurate);

        ws.reset(3);
        assert_eq!(ws.n_candidates(), 0);
        assert_eq!(ws.tuple.len(), 3);
    }

    #[test]
    fn test_thread_workspace_persists() {
        with_thread_workspace(|ws| {
            ws.reset(1);
            ws.push_candidate(0.0);
        });
        let n = with_thread_workspace(|ws| ws.n_candidates());
        assert_eq!(n, 1);
    }
}
