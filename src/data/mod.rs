//! # Data Module
//!
//! In-memory representations of ordinal observations.
//!
//! ## Sub-modules
//! - `segment`: closed intervals of modalities
//! - `observation`: raw and validated per-individual observations
//! - `assignment`: per-individual class labels

pub mod assignment;
pub mod observation;
pub mod segment;

pub use assignment::{ClassAssignment, ClassIdx};
pub use observation::{DataRange, MissingKind, Observation, OrdinalDatum};
pub use segment::{Modality, Segment};
