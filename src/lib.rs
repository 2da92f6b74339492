//! # Bosmix Library
//!
//! Estimation of ordinal variables with the BOS (binary ordinal search)
//! model: latent search paths, stochastic EM over class parameters, and
//! Gibbs-based imputation of missing or interval-censored values.
//!
//! ## Modules
//! - `config`: CLI argument parsing and validation
//! - `data`: Segments, observations, class assignments
//! - `error`: Error types, result aliases, data-validity warnings
//! - `io`: Observation and parameter readers, result writers
//! - `model`: BOS nodes and paths, the ordinal estimator
//! - `pipelines`: SEM run orchestration
//! - `utils`: Sampling helpers, seeding, workspaces, telemetry

pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod model;
pub mod pipelines;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use data::{ClassAssignment, Modality, Observation, OrdinalDatum, Segment};
pub use error::{BosError, Result, Warning, Warnings};
pub use model::{ClassParams, OrdinalEstimator, Path, PathChain, PathNode, RunMode, SamplerSettings};
pub use pipelines::{AnalysisPipeline, SemOutcome, SemPipeline, SemSettings};
