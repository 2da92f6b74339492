//! # Model Module
//!
//! The BOS (binary ordinal search) model of an ordinal variable and its
//! stochastic-EM estimator.
//!
//! ## Core Pieces
//! - `node`: one step of the search (breakpoint, accuracy, chosen part)
//! - `path`: the full latent search, its likelihood and its samplers
//! - `parameters`: per-class `(mode, precision)` and sampler settings
//! - `ordinal`: the per-variable estimator driven by the SEM pipeline
//! - `observed`: Monte Carlo table of terminal-value probabilities
//! - `param_stats`: SEM history and median / confidence bounds
//! - `chain`: a single path exposed as a `MarkovChain`
//!
//! ## Why Not a Closed-Form Likelihood
//!
//! The probability of a terminal value sums over every search that ends
//! there, which grows combinatorially with the number of modalities. The
//! estimator therefore works on completed data: the latent path is sampled
//! (forward or by Gibbs sweeps over small node tuples), and the M-step only
//! needs accuracy counts and per-mode joint likelihoods. The observed
//! likelihood, needed for model selection, is estimated by forward
//! simulation once parameters are fixed.

pub mod chain;
pub mod node;
pub mod observed;
pub mod ordinal;
pub mod param_stats;
pub mod parameters;
pub mod path;

pub use chain::PathChain;
pub use node::{Partition, PathNode};
pub use observed::ObservedProbabilityTable;
pub use ordinal::OrdinalEstimator;
pub use param_stats::{ParamExport, ParamStatistics};
pub use parameters::{ClassParams, RunMode, SamplerSettings};
pub use path::{AccuracyConstraint, AccuracyPattern, Path};
