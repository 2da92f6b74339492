//! # Search Paths
//!
//! ## Role
//! The latent completion of one individual: a chain of [`PathNode`]s that
//! narrows the initial segment `[lo, hi]` down to a single modality, subject
//! to an end condition derived from what was observed.
//!
//! ## Layout
//! A path over `[lo, hi]` has exactly `hi - lo` nodes. Every node removes at
//! least one modality from its parent (the center part is a singleton), so
//! the terminal segment is always a single point. Node `k` takes its parent
//! from node `k - 1`'s chosen segment; node 0 takes the initial segment.
//!
//! ## Resampling
//! - [`Path::gibbs_sweep_with`] slides a window of `tuple_size` adjacent nodes
//!   over the path and redraws the window jointly from its exact conditional,
//!   obtained by enumerating every breakpoint, accuracy and part choice.
//! - [`Path::forward_sample`] draws a whole path from the generative process.
//!   It ignores the end condition, so it is only valid when nothing was
//!   observed.
//! - [`Path::init_blind`] builds a parameter-free valid path with every node
//!   blind.

use rand::Rng;

use crate::data::segment::{Modality, Segment};
use crate::error::{BosError, Result};
use crate::utils::sampling::{sample_from_log_weights, sample_from_weights};
use crate::utils::workspace::{with_thread_workspace, SweepWorkspace};

use super::node::{log_prob_accuracy, Partition, PathNode};

/// Attempts before a constrained forward sample gives up
pub const MAX_FORWARD_RETRIES: usize = 1000;

/// Summary of the accuracy flags along a path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccuracyPattern {
    /// No accurate node (also the pattern of a path without nodes)
    AllBlind,
    AllAccurate,
    Mixed,
}

impl AccuracyPattern {
    pub fn from_counts(n_accurate: usize, n_nodes: usize) -> Self {
        if n_accurate == 0 {
            AccuracyPattern::AllBlind
        } else if n_accurate == n_nodes {
            AccuracyPattern::AllAccurate
        } else {
            AccuracyPattern::Mixed
        }
    }
}

/// Restriction on the accuracy pattern a resampled path may end up with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AccuracyConstraint {
    #[default]
    Unconstrained,
    ForbidAllBlind,
    ForbidAllAccurate,
}

impl AccuracyConstraint {
    /// Whether a path with `n_accurate` accurate nodes out of `n_nodes` is allowed
    #[inline]
    pub fn admits(self, n_accurate: usize, n_nodes: usize) -> bool {
        if n_nodes == 0 {
            return true;
        }
        match self {
            AccuracyConstraint::Unconstrained => true,
            AccuracyConstraint::ForbidAllBlind => n_accurate != 0,
            AccuracyConstraint::ForbidAllAccurate => n_accurate != n_nodes,
        }
    }
}

/// Fixed inputs of one tuple enumeration
struct TupleFrame {
    mode: Modality,
    precision: f64,
    start: usize,
    outside_accurate: usize,
    constraint: AccuracyConstraint,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Path {
    initial: Segment,
    end_condition: Segment,
    nodes: Vec<PathNode>,
}

impl Path {
    /// Create a path over `initial` with an unconstrained end condition.
    ///
    /// Nodes start collapsed onto `initial.lo()`; call [`Path::init_blind`]
    /// or a sampler before relying on them.
    pub fn new(initial: Segment) -> Self {
        let n_nodes = initial.hi() - initial.lo();
        let low = Segment::point(initial.lo());
        let mut nodes = Vec::with_capacity(n_nodes);
        let mut parent = initial;
        for _ in 0..n_nodes {
            let node = PathNode::new(parent.lo(), false, low);
            nodes.push(node);
            parent = low;
        }
        Self {
            initial,
            end_condition: initial,
            nodes,
        }
    }

    /// Build a path from explicit nodes, checking that they chain correctly
    pub fn from_nodes(initial: Segment, end_condition: Segment, nodes: Vec<PathNode>) -> Result<Self> {
        let mut path = Self::new(initial);
        path.set_end_condition(end_condition);
        path.set_nodes(nodes)?;
        Ok(path)
    }

    #[inline]
    pub fn initial(&self) -> Segment {
        self.initial
    }

    #[inline]
    pub fn end_condition(&self) -> Segment {
        self.end_condition
    }

    pub fn set_end_condition(&mut self, end_condition: Segment) {
        self.end_condition = end_condition;
    }

    #[inline]
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    /// Node vector, as handed out by [`PathChain`](super::chain::PathChain)
    pub(crate) fn node_vec(&self) -> &Vec<PathNode> {
        &self.nodes
    }

    /// Replace all nodes. Each node's breakpoint must lie in its parent and
    /// its chosen segment must be a part of the induced partition.
    pub fn set_nodes(&mut self, nodes: Vec<PathNode>) -> Result<()> {
        if nodes.len() != self.nodes.len() {
            return Err(BosError::invalid_data(format!(
                "path over {} needs {} nodes, got {}",
                self.initial,
                self.nodes.len(),
                nodes.len()
            )));
        }
        let mut parent = self.initial;
        for (k, node) in nodes.iter().enumerate() {
            if !node.partition(parent).contains(node.chosen) {
                return Err(BosError::invalid_data(format!(
                    "node {} (breakpoint {}, chosen {}) does not split parent {}",
                    k, node.breakpoint, node.chosen, parent
                )));
            }
            parent = node.chosen;
        }
        self.nodes = nodes;
        Ok(())
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn accurate_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.accurate).count()
    }

    pub fn pattern(&self) -> AccuracyPattern {
        AccuracyPattern::from_counts(self.accurate_count(), self.node_count())
    }

    pub fn all_accurate(&self) -> bool {
        self.pattern() == AccuracyPattern::AllAccurate
    }

    pub fn all_blind(&self) -> bool {
        self.pattern() == AccuracyPattern::AllBlind
    }

    /// Segment the parent of node `k` is (initial segment for `k == 0`)
    #[inline]
    pub fn parent_of(&self, k: usize) -> Segment {
        if k == 0 {
            self.initial
        } else {
            self.nodes[k - 1].chosen
        }
    }

    /// Chosen segment of the last node
    pub fn terminal(&self) -> Segment {
        self.nodes.last().map_or(self.initial, |n| n.chosen)
    }

    /// Completed value carried by the path
    pub fn value(&self) -> Modality {
        self.terminal().lo()
    }

    /// Completed-data log-likelihood under `(mode, precision)`.
    ///
    /// `-inf` unless the terminal segment is a single modality inside the
    /// end condition.
    pub fn joint_log_probability(&self, mode: Modality, precision: f64) -> f64 {
        let terminal = self.terminal();
        if !(terminal.is_point() && self.end_condition.contains(terminal.lo())) {
            return f64::NEG_INFINITY;
        }
        let mut parent = self.initial;
        let mut total = 0.0;
        for node in &self.nodes {
            let lp = node.log_prob(parent, mode, precision);
            if lp == f64::NEG_INFINITY {
                return lp;
            }
            total += lp;
            parent = node.chosen;
        }
        total
    }

    // === Initialization ===

    /// Parameter-free initialization: uniform breakpoints, every node blind,
    /// and each choice restricted to parts that can still reach the end
    /// condition, weighted by part size.
    pub fn init_blind<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let end = self.end_condition;
        let mut seg = self.initial;
        for node in self.nodes.iter_mut() {
            let breakpoint = rng.random_range(seg.lo()..=seg.hi());
            let partition = Partition::split(seg, breakpoint);
            let mut weights = [0.0; 3];
            for (w, part) in weights.iter_mut().zip(partition.as_slice()) {
                if part.overlaps(end) {
                    *w = part.size() as f64;
                }
            }
            let pick = sample_from_weights(&weights[..partition.len()], rng);
            let chosen = partition.as_slice()[pick];
            *node = PathNode::new(breakpoint, false, chosen);
            seg = chosen;
        }
    }

    // === Forward Sampling ===

    /// Draw the whole path from the generative process.
    ///
    /// Redraws until `constraint` is satisfied, at most
    /// [`MAX_FORWARD_RETRIES`] times. Returns `false` if the last draw still
    /// violates it (the path is kept).
    pub fn forward_sample<R: Rng + ?Sized>(
        &mut self,
        mode: Modality,
        precision: f64,
        constraint: AccuracyConstraint,
        rng: &mut R,
    ) -> bool {
        let p = if precision.is_nan() { 0.5 } else { precision.clamp(0.0, 1.0) };
        let n_nodes = self.nodes.len();
        for _ in 0..MAX_FORWARD_RETRIES {
            let mut seg = self.initial;
            let mut n_accurate = 0;
            for node in self.nodes.iter_mut() {
                let breakpoint = rng.random_range(seg.lo()..=seg.hi());
                let partition = Partition::split(seg, breakpoint);
                let accurate = rng.random_bool(p);
                let chosen = if accurate {
                    n_accurate += 1;
                    partition.closest_to(mode).unwrap_or(Segment::point(breakpoint))
                } else {
                    let (weights, len) = partition.size_weights();
                    partition.as_slice()[sample_from_weights(&weights[..len], rng)]
                };
                *node = PathNode::new(breakpoint, accurate, chosen);
                seg = chosen;
            }
            if constraint.admits(n_accurate, n_nodes) {
                return true;
            }
        }
        false
    }

    // === Gibbs Sweep ===

    /// One Gibbs sweep using this thread's workspace
    pub fn gibbs_sweep<R: Rng + ?Sized>(
        &mut self,
        mode: Modality,
        precision: f64,
        tuple_size: usize,
        constraint: AccuracyConstraint,
        rng: &mut R,
    ) {
        with_thread_workspace(|ws| {
            self.gibbs_sweep_with(mode, precision, tuple_size, constraint, ws, rng)
        });
    }

    /// One in-place Gibbs sweep.
    ///
    /// For every window start, candidates are enumerated depth-first and a
    /// branch is abandoned as soon as its probability is zero. A window with
    /// no surviving candidate is left unchanged.
    pub fn gibbs_sweep_with<R: Rng + ?Sized>(
        &mut self,
        mode: Modality,
        precision: f64,
        tuple_size: usize,
        constraint: AccuracyConstraint,
        ws: &mut SweepWorkspace,
        rng: &mut R,
    ) {
        let n_nodes = self.nodes.len();
        if n_nodes == 0 {
            return;
        }
        let t = tuple_size.clamp(1, n_nodes);
        let mut total_accurate = self.accurate_count();

        for start in 0..=(n_nodes - t) {
            let window = start..start + t;
            let window_accurate = self.nodes[window.clone()].iter().filter(|n| n.accurate).count();
            let frame = TupleFrame {
                mode,
                precision,
                start,
                outside_accurate: total_accurate - window_accurate,
                constraint,
            };

            ws.reset(t);
            self.enumerate_node(&frame, 0, 0.0, ws);
            if ws.n_candidates() == 0 {
                continue;
            }

            let pick = sample_from_log_weights(&ws.log_probs, &mut ws.probs, rng);
            self.nodes[window.clone()].copy_from_slice(ws.candidate(pick));
            total_accurate = frame.outside_accurate
                + self.nodes[window].iter().filter(|n| n.accurate).count();
        }
    }

    fn enumerate_node(&self, frame: &TupleFrame, depth: usize, log_prob: f64, ws: &mut SweepWorkspace) {
        let parent = if depth == 0 {
            self.parent_of(frame.start)
        } else {
            ws.tuple[depth - 1].chosen
        };
        let lp_breakpoint = -(parent.size() as f64).ln();
        let last = depth + 1 == ws.tuple.len();

        for breakpoint in parent.iter() {
            let partition = Partition::split(parent, breakpoint);
            for accurate in [false, true] {
                let lp_accuracy = log_prob_accuracy(accurate, frame.precision);
                if lp_accuracy == f64::NEG_INFINITY {
                    continue;
                }
                for &chosen in partition.as_slice() {
                    let node = PathNode::new(breakpoint, accurate, chosen);
                    let lp_choice = node.log_prob_choice_in(&partition, frame.mode);
                    if lp_choice == f64::NEG_INFINITY {
                        continue;
                    }
                    ws.tuple[depth] = node;
                    let lp = log_prob + lp_breakpoint + lp_accuracy + lp_choice;
                    if last {
                        self.close_tuple(frame, lp, ws);
                    } else {
                        self.enumerate_node(frame, depth + 1, lp, ws);
                    }
                }
            }
        }
    }

    /// Score a complete tuple against the rest of the path and keep it if
    /// it is admissible
    fn close_tuple(&self, frame: &TupleFrame, log_prob: f64, ws: &mut SweepWorkspace) {
        let n_nodes = self.nodes.len();
        let t = ws.tuple.len();

        if frame.constraint != AccuracyConstraint::Unconstrained {
            let inside = ws.tuple.iter().filter(|n| n.accurate).count();
            if !frame.constraint.admits(frame.outside_accurate + inside, n_nodes) {
                return;
            }
        }

        let last = ws.tuple[t - 1].chosen;
        let next = frame.start + t;
        let mut lp = log_prob;
        if next < n_nodes {
            let lp_next = self.nodes[next].log_prob(last, frame.mode, frame.precision);
            if lp_next == f64::NEG_INFINITY {
                return;
            }
            lp += lp_next;
        } else if !last.overlaps(self.end_condition) {
            return;
        }

        ws.push_candidate(lp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn terminal_frequencies(path: &mut Path, mode: usize, precision: f64, sweeps: usize, seed: u64) -> Vec<f64> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let n = path.initial().size();
        let mut counts = vec![0usize; n];
        let mut ws = SweepWorkspace::new();
        for _ in 0..sweeps {
            path.gibbs_sweep_with(mode, precision, 2, AccuracyConstraint::Unconstrained, &mut ws, &mut rng);
            counts[path.value() - path.initial().lo()] += 1;
        }
        counts.iter().map(|&c| c as f64 / sweeps as f64).collect()
    }

    #[test]
    fn test_node_count_and_terminal() {
        let path = Path::new(Segment::new(0, 4));
        assert_eq!(path.node_count(), 4);
        assert!(path.terminal().is_point());
        assert_eq!(path.value(), 0);
        assert_eq!(path.pattern(), AccuracyPattern::AllBlind);
    }

    #[test]
    fn test_joint_probability_hand_computed() {
        let nodes = vec![PathNode::new(1, true, Segment::point(1))];
        let path = Path::from_nodes(Segment::new(0, 1), Segment::new(0, 1), nodes).unwrap();
        let p = path.joint_log_probability(1, 0.5).exp();
        assert!((p - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_joint_probability_two_nodes() {
        // [0:2] split at 0 blind -> [1:2] (2/3), then split at 2 accurate toward mode 2 -> [2:2]
        let nodes = vec![
            PathNode::new(0, false, Segment::new(1, 2)),
            PathNode::new(2, true, Segment::point(2)),
        ];
        let path = Path::from_nodes(Segment::new(0, 2), Segment::point(2), nodes).unwrap();
        let expected = (1.0 / 3.0) * 0.6 * (2.0 / 3.0) * (1.0 / 2.0) * 0.4 * 1.0;
        assert!((path.joint_log_probability(2, 0.4).exp() - expected).abs() < 1e-12);
        // mode 0 would steer the second step to [1:1]
        assert_eq!(path.joint_log_probability(0, 0.4), f64::NEG_INFINITY);
    }

    #[test]
    fn test_end_condition_gate() {
        let nodes = vec![PathNode::new(1, true, Segment::point(1))];
        let mut path = Path::from_nodes(Segment::new(0, 1), Segment::point(0), nodes).unwrap();
        assert_eq!(path.joint_log_probability(1, 0.5), f64::NEG_INFINITY);
        path.set_end_condition(Segment::new(0, 1));
        assert!(path.joint_log_probability(1, 0.5).is_finite());
    }

    #[test]
    fn test_set_nodes_rejects_broken_chain() {
        let mut path = Path::new(Segment::new(0, 2));
        let bad = vec![
            PathNode::new(0, false, Segment::new(1, 2)),
            PathNode::new(0, false, Segment::point(0)),
        ];
        assert!(path.set_nodes(bad).is_err());
        assert!(path.set_nodes(vec![]).is_err());
    }

    #[test]
    fn test_init_blind_respects_end_condition() {
        let mut rng = SmallRng::seed_from_u64(11);
        let mut path = Path::new(Segment::new(0, 5));
        for value in 0..6 {
            path.set_end_condition(Segment::point(value));
            for _ in 0..50 {
                path.init_blind(&mut rng);
                assert_eq!(path.value(), value);
                assert!(path.all_blind());
                assert!(path.joint_log_probability(3, 0.5).is_finite());
            }
        }
        path.set_end_condition(Segment::new(2, 3));
        path.init_blind(&mut rng);
        assert!(Segment::new(2, 3).contains(path.value()));
    }

    #[test]
    fn test_gibbs_preserves_observed_value() {
        let mut rng = SmallRng::seed_from_u64(5);
        let mut path = Path::new(Segment::new(0, 4));
        path.set_end_condition(Segment::point(3));
        path.init_blind(&mut rng);
        for _ in 0..200 {
            path.gibbs_sweep(1, 0.6, 2, AccuracyConstraint::Unconstrained, &mut rng);
            assert_eq!(path.value(), 3);
            assert!(path.joint_log_probability(1, 0.6).is_finite());
        }
    }

    #[test]
    fn test_gibbs_respects_interval() {
        let mut rng = SmallRng::seed_from_u64(6);
        let mut path = Path::new(Segment::new(0, 5));
        let interval = Segment::new(1, 3);
        path.set_end_condition(interval);
        path.init_blind(&mut rng);
        let mut seen = [false; 6];
        for _ in 0..2000 {
            path.gibbs_sweep(4, 0.3, 2, AccuracyConstraint::Unconstrained, &mut rng);
            assert!(interval.contains(path.value()));
            seen[path.value()] = true;
        }
        assert!(seen[1] && seen[2] && seen[3]);
    }

    #[test]
    fn test_gibbs_stationarity_blind_two_modalities() {
        let mut path = Path::new(Segment::new(0, 1));
        let freqs = terminal_frequencies(&mut path, 0, 0.0, 10_000, 17);
        assert!((freqs[0] - 0.5).abs() < 0.03, "freqs = {:?}", freqs);
    }

    #[test]
    fn test_gibbs_mode_recovery() {
        let mut path = Path::new(Segment::new(0, 3));
        let freqs = terminal_frequencies(&mut path, 1, 0.5, 20_000, 23);
        let argmax = freqs
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(argmax, 1, "freqs = {:?}", freqs);
    }

    #[test]
    fn test_gibbs_matches_forward_distribution() {
        let (mode, precision) = (3, 0.5);
        let mut rng = SmallRng::seed_from_u64(29);
        let mut forward = Path::new(Segment::new(0, 4));
        let n = 40_000;
        let mut fwd_counts = [0usize; 5];
        for _ in 0..n {
            forward.forward_sample(mode, precision, AccuracyConstraint::Unconstrained, &mut rng);
            fwd_counts[forward.value()] += 1;
        }
        let mut path = Path::new(Segment::new(0, 4));
        let gibbs = terminal_frequencies(&mut path, mode, precision, n, 31);
        for v in 0..5 {
            let f = fwd_counts[v] as f64 / n as f64;
            assert!((f - gibbs[v]).abs() < 0.04, "value {}: forward {} gibbs {}", v, f, gibbs[v]);
        }
    }

    #[test]
    fn test_constraint_forbids_all_blind() {
        let mut rng = SmallRng::seed_from_u64(41);
        let mut path = Path::new(Segment::new(0, 3));
        path.set_end_condition(Segment::point(2));
        path.init_blind(&mut rng);
        for _ in 0..300 {
            path.gibbs_sweep(2, 0.05, 2, AccuracyConstraint::ForbidAllBlind, &mut rng);
        }
        // low precision pulls toward all-blind; the constraint keeps at least one accurate node
        assert!(!path.all_blind());
        for _ in 0..300 {
            path.gibbs_sweep(2, 0.05, 2, AccuracyConstraint::ForbidAllBlind, &mut rng);
            assert!(!path.all_blind());
        }
    }

    #[test]
    fn test_constraint_forbids_all_accurate() {
        let mut rng = SmallRng::seed_from_u64(43);
        let mut path = Path::new(Segment::new(0, 3));
        for _ in 0..200 {
            assert!(path.forward_sample(1, 0.99, AccuracyConstraint::ForbidAllAccurate, &mut rng));
            assert!(!path.all_accurate());
        }
        for _ in 0..200 {
            assert!(path.forward_sample(1, 0.01, AccuracyConstraint::ForbidAllBlind, &mut rng));
            assert!(!path.all_blind());
        }
    }

    #[test]
    fn test_forward_sample_gives_valid_paths() {
        let mut rng = SmallRng::seed_from_u64(47);
        let mut path = Path::new(Segment::new(0, 6));
        for _ in 0..500 {
            path.forward_sample(4, 0.7, AccuracyConstraint::Unconstrained, &mut rng);
            assert!(path.terminal().is_point());
            assert!(path.joint_log_probability(4, 0.7).is_finite());
        }
    }

    #[test]
    fn test_forward_sample_precision_one_is_all_accurate() {
        let mut rng = SmallRng::seed_from_u64(53);
        let mut path = Path::new(Segment::new(0, 4));
        for _ in 0..50 {
            path.forward_sample(2, 1.0, AccuracyConstraint::Unconstrained, &mut rng);
            assert!(path.all_accurate());
            assert_eq!(path.value(), 2);
        }
        assert!(!path.forward_sample(2, 1.0, AccuracyConstraint::ForbidAllAccurate, &mut rng));
    }

    #[test]
    fn test_accuracy_constraint_admits() {
        assert!(AccuracyConstraint::Unconstrained.admits(0, 3));
        assert!(!AccuracyConstraint::ForbidAllBlind.admits(0, 3));
        assert!(AccuracyConstraint::ForbidAllBlind.admits(1, 3));
        assert!(!AccuracyConstraint::ForbidAllAccurate.admits(3, 3));
        assert!(AccuracyConstraint::ForbidAllAccurate.admits(2, 3));
        assert_eq!(AccuracyPattern::from_counts(0, 0), AccuracyPattern::AllBlind);
    }
}
