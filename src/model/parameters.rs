//! # Model Parameters
//!
//! ## Role
//! Pure data structures for the per-class parameters and the sampler
//! hyperparameters.
//!
//! ### ClassParams
//! - `mode`: the modality accurate comparisons steer toward
//! - `precision`: probability that a comparison is accurate, in `[0, 1]`
//!
//! ### SamplerSettings
//! Tuning of the latent-path sampler. The burn-in length and the bootstrap
//! precision have no analytical derivation and are exposed as settings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::segment::Modality;
use crate::error::{BosError, Result};

/// Prefix of the parameter string carrying the modality count
pub const N_MODALITY_KEY: &str = "nModality:";

/// Parameters of one class
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassParams {
    pub mode: Modality,
    pub precision: f64,
}

impl ClassParams {
    pub fn new(mode: Modality, precision: f64) -> Self {
        Self { mode, precision }
    }
}

impl fmt::Display for ClassParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mu: {}, pi: {:.6}", self.mode, self.precision)
    }
}

/// Sampler hyperparameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SamplerSettings {
    /// Sweeps per individual before the first M-step
    pub burn_in: usize,
    /// Precision used during burn-in and as the initial precision
    pub bootstrap_precision: f64,
    /// Adjacent nodes resampled jointly in a Gibbs sweep
    pub tuple_size: usize,
    /// Forward simulations per class for the observed-probability table
    pub observed_samples: usize,
    /// Clamp precision into `[epsilon, 1 - epsilon]` in the M-step
    pub biased: bool,
    pub epsilon: f64,
}

impl Default for SamplerSettings {
    fn default() -> Self {
        Self {
            burn_in: 100,
            bootstrap_precision: 0.9,
            tuple_size: 2,
            observed_samples: 10_000,
            biased: false,
            epsilon: 1e-8,
        }
    }
}

impl SamplerSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.bootstrap_precision > 0.0 && self.bootstrap_precision < 1.0) {
            return Err(BosError::config(format!(
                "bootstrap precision must lie in (0, 1), got {}",
                self.bootstrap_precision
            )));
        }
        if self.tuple_size == 0 {
            return Err(BosError::config("tuple size must be at least 1"));
        }
        if self.observed_samples == 0 {
            return Err(BosError::config("observed sample count must be at least 1"));
        }
        if !(self.epsilon >= 0.0 && self.epsilon < 0.5) {
            return Err(BosError::config(format!(
                "epsilon must lie in [0, 0.5), got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Whether parameters are estimated or imported
#[derive(Clone, Debug, PartialEq)]
pub enum RunMode {
    /// Estimate parameters. The modality count is inferred from the data
    /// unless given.
    Learning { n_modalities: Option<usize> },
    /// Use imported parameters, one per class
    Prediction {
        n_modalities: usize,
        params: Vec<ClassParams>,
    },
}

impl RunMode {
    pub fn is_learning(&self) -> bool {
        matches!(self, RunMode::Learning { .. })
    }
}

/// Format the parameter string `nModality: <n>`
pub fn format_param_string(n_modalities: usize) -> String {
    format!("{} {}", N_MODALITY_KEY, n_modalities)
}

/// Parse `nModality: <n>`; `None` for an empty string
pub fn parse_param_string(s: &str) -> Result<Option<usize>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let rest = s.strip_prefix(N_MODALITY_KEY).ok_or_else(|| {
        BosError::invalid_data(format!(
            "parameter string '{}' does not match '{} <n>'",
            s, N_MODALITY_KEY
        ))
    })?;
    let n = rest.trim().parse::<usize>().map_err(|e| {
        BosError::invalid_data(format!("invalid modality count in '{}': {}", s, e))
    })?;
    Ok(Some(n))
}
