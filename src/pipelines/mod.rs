//! # Pipeline Module
//!
//! High-level orchestration of a run. `sem` sequences the estimator
//! operations for one variable; `analysis` wraps it with file I/O.

pub mod analysis;
pub mod sem;

pub use analysis::AnalysisPipeline;
pub use sem::{SemOutcome, SemPipeline, SemSettings};
