//! # File-Driven Analysis
//!
//! Reads the observation (and optional parameter) file named in the
//! [`Config`], runs the [`SemPipeline`], and writes the result tables next to
//! the output prefix.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{BosError, Result};
use crate::io::{read_observations, read_param_file, ResultWriter};
use crate::model::parameters::RunMode;
use crate::utils::telemetry::{Stage, TelemetryBlackboard};

use super::sem::{SemOutcome, SemPipeline};

pub struct AnalysisPipeline {
    config: Config,
    telemetry: Option<Arc<TelemetryBlackboard>>,
}

impl AnalysisPipeline {
    pub fn new(config: Config, telemetry: Option<Arc<TelemetryBlackboard>>) -> Self {
        Self { config, telemetry }
    }

    pub fn run(&mut self) -> Result<SemOutcome> {
        eprintln!("Loading observations...");
        let set = read_observations(&self.config.data)?;
        if set.is_empty() {
            return Err(BosError::invalid_data(format!(
                "no observations in {:?}",
                self.config.data
            )));
        }

        let param_file = match &self.config.params {
            Some(p) => {
                eprintln!("Loading parameters from {:?}", p);
                Some(read_param_file(p)?)
            }
            None => None,
        };

        let n_classes = self
            .config
            .classes
            .or_else(|| param_file.as_ref().map(|f| f.n_classes()))
            .or_else(|| set.label_classes())
            .unwrap_or(1);
        let assignment = set.assignment(n_classes)?;
        eprintln!("Loaded {} individuals in {} classes", set.len(), n_classes);

        let run_mode = match param_file {
            Some(f) => f.into_run_mode(),
            None => RunMode::Learning {
                n_modalities: self.config.n_modalities,
            },
        };

        let pipeline = SemPipeline::new(
            self.config.name.as_str(),
            self.config.sampler_settings(),
            self.config.sem_settings(),
        )
        .with_telemetry(self.telemetry.clone());
        let outcome = pipeline.run(&set.observations, &assignment, run_mode)?;

        if let Some(t) = &self.telemetry {
            t.set_stage(Stage::WritingOutput);
        }
        self.write_outputs(&outcome)?;

        eprintln!("Observed log-likelihood: {:.6}", outcome.ln_likelihood);
        eprintln!("Free parameters: {}", outcome.n_free_parameters);
        if !outcome.warnings.is_empty() {
            eprintln!("{} SEM attempt(s) abandoned on degeneracy", outcome.warnings.len());
        }
        Ok(outcome)
    }

    fn write_outputs(&self, outcome: &SemOutcome) -> Result<()> {
        let params_path = self.config.output_path("params.tsv");
        eprintln!("Writing output to {:?}", params_path);
        let mut w = ResultWriter::create(&params_path)?;
        w.write_params(&outcome.export)?;
        w.finish()?;

        let mut w = ResultWriter::create(&self.config.output_path("imputed.tsv"))?;
        w.write_imputed(&outcome.data, &outcome.imputed, &outcome.tallies)?;
        w.finish()?;

        let mut w = ResultWriter::create(&self.config.output_path("observed.tsv"))?;
        w.write_observed(&outcome.observed)?;
        w.finish()?;
        Ok(())
    }
}
