//! # Utilities Module
//!
//! ## Role
//! Cross-cutting helpers that don't belong in domain-specific modules.
//!
//! ## Sub-modules
//! - `sampling`: categorical draws from weights and log-weights
//! - `telemetry`: progress blackboard and heartbeat thread
//! - `threading`: rayon thread pools and per-item RNG streams
//! - `workspace`: pre-allocated buffers for allocation-free Gibbs sweeps

pub mod sampling;
pub mod telemetry;
pub mod threading;
pub mod workspace;
