//! # SEM Pipeline
//!
//! ## Role
//! Drives one ordinal variable through a full stochastic-EM run:
//!
//! ```text
//! learning:   setup -> attempt {
//!                 init_data -> init_params -> burn-in
//!                 -> (sample + degeneracy check -> M-step) x burn_in_iterations
//!                 -> (sample + degeneracy check -> M-step -> store) x (iterations + 1)
//!             } until an attempt completes
//!             -> observed probabilities -> Gibbs run
//! prediction: setup -> init_data -> burn-in -> observed probabilities -> Gibbs run
//! ```
//!
//! A degenerate sample that survives the retries abandons the attempt
//! before its M-step, so precisions never reach 0 or 1. When every attempt
//! is abandoned the run fails with the collected findings.
//!
//! The class assignment is an input: in a full mixture it is resampled by
//! the caller between iterations; here it is held fixed.

use std::sync::Arc;

use rand::rngs::SmallRng;
use tracing::info_span;

use crate::data::assignment::ClassAssignment;
use crate::data::observation::{Observation, OrdinalDatum};
use crate::data::segment::Modality;
use crate::error::{BosError, Result, Warnings};
use crate::model::observed::ObservedProbabilityTable;
use crate::model::ordinal::OrdinalEstimator;
use crate::model::param_stats::ParamExport;
use crate::model::parameters::{ClassParams, RunMode, SamplerSettings};
use crate::utils::telemetry::{Stage, TelemetryBlackboard};
use crate::utils::threading::master_rng;

/// Iteration budgets of a run
#[derive(Clone, Debug, PartialEq)]
pub struct SemSettings {
    /// SEM iterations run before storage starts
    pub burn_in_iterations: usize,
    /// Stored SEM iterations; the loop runs `iterations + 1` times
    pub iterations: usize,
    /// Gibbs iterations with frozen parameters (at least one is run)
    pub gibbs_iterations: usize,
    /// Extra sampling attempts when a class degenerates
    pub degeneracy_retries: usize,
    /// Full restarts allowed before giving up on degeneracy
    pub max_attempts: usize,
    /// Confidence level of the parameter bounds
    pub confidence: f64,
    pub seed: Option<u64>,
}

impl Default for SemSettings {
    fn default() -> Self {
        Self {
            burn_in_iterations: 50,
            iterations: 100,
            gibbs_iterations: 100,
            degeneracy_retries: 10,
            max_attempts: 5,
            confidence: 0.95,
            seed: None,
        }
    }
}

impl SemSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence > 0.0 && self.confidence <= 1.0) {
            return Err(BosError::config(format!(
                "confidence must lie in (0, 1], got {}",
                self.confidence
            )));
        }
        if self.max_attempts == 0 {
            return Err(BosError::config("at least one SEM attempt is required"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SemPhase {
    BurnIn,
    Run,
}

/// Everything a run produces
#[derive(Clone, Debug)]
pub struct SemOutcome {
    pub params: Vec<ClassParams>,
    pub export: ParamExport,
    pub observed: ObservedProbabilityTable,
    pub data: Vec<OrdinalDatum>,
    pub imputed: Vec<Modality>,
    /// Per individual completed-value counts over the Gibbs run (empty for
    /// observed individuals)
    pub tallies: Vec<Vec<u32>>,
    /// `sum_i ln P(x_i | z_i)`
    pub ln_likelihood: f64,
    pub n_free_parameters: usize,
    /// Degeneracy findings of abandoned attempts
    pub warnings: Warnings,
}

pub struct SemPipeline {
    name: String,
    sampler: SamplerSettings,
    sem: SemSettings,
    telemetry: Option<Arc<TelemetryBlackboard>>,
}

impl SemPipeline {
    pub fn new(name: impl Into<String>, sampler: SamplerSettings, sem: SemSettings) -> Self {
        Self {
            name: name.into(),
            sampler,
            sem,
            telemetry: None,
        }
    }

    pub fn with_telemetry(mut self, telemetry: Option<Arc<TelemetryBlackboard>>) -> Self {
        self.telemetry = telemetry;
        self
    }

    fn set_stage(&self, stage: Stage) {
        if let Some(t) = &self.telemetry {
            t.set_stage(stage);
        }
    }

    /// Run with a master generator seeded from the settings
    pub fn run(
        &self,
        observations: &[Observation],
        assignment: &ClassAssignment,
        run_mode: RunMode,
    ) -> Result<SemOutcome> {
        let mut rng = master_rng(self.sem.seed);
        self.run_with_rng(observations, assignment, run_mode, &mut rng)
    }

    pub fn run_with_rng(
        &self,
        observations: &[Observation],
        assignment: &ClassAssignment,
        run_mode: RunMode,
        rng: &mut SmallRng,
    ) -> Result<SemOutcome> {
        self.sampler.validate()?;
        self.sem.validate()?;
        if assignment.n_individuals() != observations.len() {
            return Err(BosError::invalid_data(format!(
                "{} class labels for {} observations",
                assignment.n_individuals(),
                observations.len()
            )));
        }

        let learning = run_mode.is_learning();
        let mut est = info_span!("setup", variable = %self.name).in_scope(|| {
            OrdinalEstimator::setup(
                self.name.as_str(),
                observations,
                assignment.n_classes(),
                run_mode,
                self.sampler.clone(),
                self.sem.confidence,
            )
        })?;
        if let Some(t) = &self.telemetry {
            t.set_total_individuals(est.n_individuals());
            est = est.with_telemetry(Arc::clone(t));
        }
        eprintln!(
            "Variable {}: {} individuals, {} modalities, {} classes",
            est.name(),
            est.n_individuals(),
            est.n_modalities(),
            est.n_classes()
        );

        let warnings = if learning {
            self.learn(&mut est, assignment, rng)?
        } else {
            est.init_data(rng);
            self.set_stage(Stage::BurnIn);
            est.initialize_markov_chain(assignment, rng)?;
            Warnings::new()
        };

        self.set_stage(Stage::ObservedProbability);
        est.compute_observed_probability(rng);
        let mut ln_likelihood = 0.0;
        for (i, &k) in assignment.labels().iter().enumerate() {
            ln_likelihood += est.ln_observed_probability(i, k)?;
        }

        self.set_stage(Stage::GibbsRun);
        let n_gibbs = self.sem.gibbs_iterations.max(1);
        info_span!("gibbs_run", n_gibbs).in_scope(|| -> Result<()> {
            for it in 0..n_gibbs {
                if let Some(t) = &self.telemetry {
                    t.set_iteration(it, n_gibbs);
                }
                est.sampling_step(assignment, false, rng)?;
                est.store_gibbs_run(it, n_gibbs - 1);
            }
            Ok(())
        })?;

        eprint!("{}", est);
        let observed = est
            .observed_table()
            .cloned()
            .ok_or_else(|| BosError::algorithm("observed probabilities missing after run"))?;

        Ok(SemOutcome {
            params: est.params().to_vec(),
            export: est.export_params(),
            observed,
            data: est.data().to_vec(),
            imputed: est.imputed_values().to_vec(),
            tallies: est.imputation_tallies().to_vec(),
            ln_likelihood,
            n_free_parameters: est.n_free_parameters(),
            warnings,
        })
    }

    /// Restarted SEM: each attempt reinitializes data, parameters and
    /// chains, then runs the unstored and the stored phase. Returns the
    /// findings of the abandoned attempts.
    fn learn(
        &self,
        est: &mut OrdinalEstimator,
        assignment: &ClassAssignment,
        rng: &mut SmallRng,
    ) -> Result<Warnings> {
        let mut abandoned = Warnings::new();
        for attempt in 0..self.sem.max_attempts {
            let _span = info_span!("sem_attempt", attempt).entered();
            est.init_data(rng);
            est.init_params(assignment, rng)?;
            self.set_stage(Stage::BurnIn);
            est.initialize_markov_chain(assignment, rng)?;

            self.set_stage(Stage::Sem);
            let outcome = match self.run_phase(est, assignment, rng, SemPhase::BurnIn)? {
                Ok(()) => self.run_phase(est, assignment, rng, SemPhase::Run)?,
                Err(w) => Err(w),
            };
            match outcome {
                Ok(()) => return Ok(abandoned),
                Err(w) => {
                    for warning in w.iter() {
                        tracing::warn!(attempt, "{}, restarting SEM", warning);
                    }
                    abandoned.extend(w);
                }
            }
        }
        Err(BosError::Validation(abandoned))
    }

    /// One SEM phase. Only the run phase feeds the parameter statistics.
    /// The inner `Err` carries the findings of a degenerate sample.
    fn run_phase(
        &self,
        est: &mut OrdinalEstimator,
        assignment: &ClassAssignment,
        rng: &mut SmallRng,
        phase: SemPhase,
    ) -> Result<std::result::Result<(), Warnings>> {
        let total = match phase {
            SemPhase::BurnIn => self.sem.burn_in_iterations,
            SemPhase::Run => self.sem.iterations + 1,
        };
        let _span = info_span!("sem_phase", ?phase).entered();
        for it in 0..total {
            if let Some(t) = &self.telemetry {
                t.set_iteration(it, total);
            }
            if let Err(w) = self.sample_checked(est, assignment, rng)? {
                return Ok(Err(w));
            }
            est.m_step(assignment, rng)?;
            if phase == SemPhase::Run {
                est.store_sem_run(it, self.sem.iterations)?;
            }

            tracing::debug!(?phase, iteration = it, params = ?est.params(), "SEM iteration done");
            if (it + 1) % 10 == 0 || it + 1 == total {
                eprintln!("SEM {:?} iteration {}/{}", phase, it + 1, total);
            }
        }
        Ok(Ok(()))
    }

    /// Sampling step followed by the degeneracy check, resampled up to the
    /// configured number of retries. The inner `Err` carries the findings of
    /// the last attempt.
    fn sample_checked(
        &self,
        est: &mut OrdinalEstimator,
        assignment: &ClassAssignment,
        rng: &mut SmallRng,
    ) -> Result<std::result::Result<(), Warnings>> {
        let mut last = Ok(());
        for attempt in 0..=self.sem.degeneracy_retries {
            est.sampling_step(assignment, true, rng)?;
            last = est.check_sample_condition(assignment);
            if last.is_ok() {
                break;
            }
            tracing::debug!(attempt, "degenerate accuracy pattern, resampling");
        }
        Ok(last)
    }
}
