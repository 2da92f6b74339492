//! # Configuration Logic
//!
//! ## Role
//! CLI argument parsing and validation. The parsed [`Config`] is converted
//! into [`SamplerSettings`] and [`SemSettings`] so the library can be driven
//! without clap.
//!
//! ## Example CLI
//! ```bash
//! # learn 2 classes, labels taken from the second column of the data file
//! bosmix --data answers.txt --out run1 --iterations 200 --seed 7
//!
//! # impute with previously learned parameters
//! bosmix --data new.txt --params run1.params.tsv --out run2
//! ```

use std::path::PathBuf;

use clap::Parser;

use crate::error::{BosError, Result};
use crate::model::parameters::SamplerSettings;
use crate::pipelines::sem::SemSettings;

#[derive(Parser, Debug, Clone)]
#[command(name = "bosmix", version, about = "Mixture estimation for ordinal data with the BOS model")]
pub struct Config {
    /// Observation file, one `value [class]` per line
    #[arg(long)]
    pub data: PathBuf,

    /// Output prefix
    #[arg(long)]
    pub out: PathBuf,

    /// Parameter file from a previous run; switches to prediction
    #[arg(long)]
    pub params: Option<PathBuf>,

    /// Variable name used in messages and labels
    #[arg(long, default_value = "ordinal")]
    pub name: String,

    /// Number of classes (default: from labels or parameters, else 1)
    #[arg(long)]
    pub classes: Option<usize>,

    /// Number of modalities in learning (default: data maximum + 1)
    #[arg(long = "n-modalities")]
    pub n_modalities: Option<usize>,

    /// SEM iterations whose parameters feed the estimates
    #[arg(long, default_value_t = 100)]
    pub iterations: usize,

    /// SEM iterations run first and discarded
    #[arg(long = "sem-burnin", default_value_t = 50)]
    pub sem_burnin: usize,

    /// SEM attempts, each from a fresh initialization, before giving up on
    /// a degenerate variable
    #[arg(long = "sem-tries", default_value_t = 5)]
    pub sem_tries: usize,

    /// Gibbs iterations with frozen parameters
    #[arg(long, default_value_t = 100)]
    pub gibbs: usize,

    /// Burn-in sweeps per individual
    #[arg(long, default_value_t = 100)]
    pub burnin: usize,

    /// Precision used during burn-in
    #[arg(long = "bootstrap-precision", default_value_t = 0.9)]
    pub bootstrap_precision: f64,

    /// Adjacent nodes resampled jointly
    #[arg(long = "tuple-size", default_value_t = 2)]
    pub tuple_size: usize,

    /// Forward simulations per class for the observed probabilities
    #[arg(long = "observed-samples", default_value_t = 10_000)]
    pub observed_samples: usize,

    /// Keep precision away from 0 and 1
    #[arg(long)]
    pub biased: bool,

    #[arg(long, default_value_t = 1e-8)]
    pub epsilon: f64,

    /// Confidence level of the parameter bounds
    #[arg(long, default_value_t = 0.95)]
    pub confidence: f64,

    /// Resampling attempts when a class becomes uniformly blind or accurate
    #[arg(long = "degeneracy-retries", default_value_t = 10)]
    pub degeneracy_retries: usize,

    /// Random seed (default: from the clock)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker threads (default: all cores)
    #[arg(long)]
    pub nthreads: Option<usize>,

    /// Print span timings
    #[arg(long)]
    pub profile: bool,
}

impl Config {
    /// Parse from the command line and validate
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.sampler_settings().validate()?;
        self.sem_settings().validate()?;
        if self.classes == Some(0) {
            return Err(BosError::config("--classes must be at least 1"));
        }
        if self.nthreads == Some(0) {
            return Err(BosError::config("--nthreads must be at least 1"));
        }
        if !self.data.exists() {
            return Err(BosError::FileNotFound {
                path: self.data.clone(),
            });
        }
        if let Some(p) = &self.params {
            if !p.exists() {
                return Err(BosError::FileNotFound { path: p.clone() });
            }
        }
        Ok(())
    }

    pub fn nthreads(&self) -> usize {
        self.nthreads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    pub fn is_prediction_mode(&self) -> bool {
        self.params.is_some()
    }

    pub fn sampler_settings(&self) -> SamplerSettings {
        SamplerSettings {
            burn_in: self.burnin,
            bootstrap_precision: self.bootstrap_precision,
            tuple_size: self.tuple_size,
            observed_samples: self.observed_samples,
            biased: self.biased,
            epsilon: self.epsilon,
        }
    }

    pub fn sem_settings(&self) -> SemSettings {
        SemSettings {
            iterations: self.iterations,
            burn_in_iterations: self.sem_burnin,
            max_attempts: self.sem_tries,
            gibbs_iterations: self.gibbs,
            degeneracy_retries: self.degeneracy_retries,
            confidence: self.confidence,
            seed: self.seed,
        }
    }

    /// `<out>.<suffix>`; an `--out` ending in `.gz` gives
    /// `<out without .gz>.<suffix>.gz` (compressed output)
    pub fn output_path(&self, suffix: &str) -> PathBuf {
        let out = self.out.to_string_lossy();
        match out.strip_suffix(".gz") {
            Some(prefix) => PathBuf::from(format!("{}.{}.gz", prefix, suffix)),
            None => PathBuf::from(format!("{}.{}", out, suffix)),
        }
    }
}
