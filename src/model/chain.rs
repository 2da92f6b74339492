//! # Single-Path Chain
//!
//! A [`Path`] and fixed class parameters wrapped as a [`MarkovChain`], for
//! sampling one individual's latent path in isolation (diagnostics,
//! benchmarks, convergence checks).
//!
//! The chain state is the node vector of the path: one [`PathNode`]
//! (breakpoint, accuracy, chosen part) per step of the search.

use mini_mcmc::core::MarkovChain;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::data::segment::Modality;
use crate::utils::workspace::SweepWorkspace;

use super::node::PathNode;
use super::parameters::ClassParams;
use super::path::{AccuracyConstraint, Path};

pub struct PathChain {
    path: Path,
    params: ClassParams,
    tuple_size: usize,
    rng: SmallRng,
    workspace: SweepWorkspace,
}

impl PathChain {
    pub fn new(path: Path, params: ClassParams, tuple_size: usize, seed: u64) -> Self {
        let n_nodes = path.node_count();
        Self {
            path,
            params,
            tuple_size,
            rng: SmallRng::seed_from_u64(seed),
            workspace: SweepWorkspace::with_capacity(tuple_size.clamp(1, n_nodes.max(1)), 64),
        }
    }

    pub fn params(&self) -> ClassParams {
        self.params
    }

    pub fn set_params(&mut self, params: ClassParams) {
        self.params = params;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Completed value of the current state
    pub fn value(&self) -> Modality {
        self.path.value()
    }

    pub fn into_path(self) -> Path {
        self.path
    }
}

impl MarkovChain<PathNode> for PathChain {
    fn step(&mut self) -> &Vec<PathNode> {
        let ClassParams { mode, precision } = self.params;
        // Nothing observed: forward draws are exact and independent
        if self.path.end_condition() == self.path.initial() {
            self.path
                .forward_sample(mode, precision, AccuracyConstraint::Unconstrained, &mut self.rng);
        } else {
            self.path.gibbs_sweep_with(
                mode,
                precision,
                self.tuple_size,
                AccuracyConstraint::Unconstrained,
                &mut self.workspace,
                &mut self.rng,
            );
        }
        self.path.node_vec()
    }

    fn current_state(&self) -> &Vec<PathNode> {
        self.path.node_vec()
    }
}
