//! # Parameter Statistics
//!
//! Per-coefficient history of the parameters across SEM iterations, and the
//! summary exported at the end of learning: median plus a two-sided
//! confidence interval taken from order statistics.
//!
//! Coefficients are stored flat. For the ordinal model row `2k` is the mode
//! of class `k` and row `2k + 1` its precision.

use serde::{Deserialize, Serialize};

use crate::error::{BosError, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct ParamStatistics {
    confidence: f64,
    /// coefficient x iteration
    history: Vec<Vec<f64>>,
    /// coefficient x stat column (median, low, high), or a single column
    /// when parameters were imported
    stats: Vec<Vec<f64>>,
}

impl ParamStatistics {
    pub fn new(confidence: f64) -> Self {
        Self {
            confidence,
            history: Vec::new(),
            stats: Vec::new(),
        }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Record the parameters of one iteration.
    ///
    /// Iteration 0 resets the history. At `iteration == iteration_max` the
    /// statistics are computed.
    pub fn sample(&mut self, iteration: usize, iteration_max: usize, values: &[f64]) -> Result<()> {
        if iteration == 0 {
            self.history = vec![Vec::with_capacity(iteration_max + 1); values.len()];
            self.stats.clear();
        }
        if values.len() != self.history.len() {
            return Err(BosError::algorithm(format!(
                "parameter count changed from {} to {} at iteration {}",
                self.history.len(),
                values.len(),
                iteration
            )));
        }
        for (h, &v) in self.history.iter_mut().zip(values) {
            h.push(v);
        }
        if iteration == iteration_max {
            self.compute(iteration_max);
        }
        Ok(())
    }

    fn compute(&mut self, iteration_max: usize) {
        let alpha = (1.0 - self.confidence) / 2.0;
        let low_idx = (alpha * iteration_max as f64) as usize;
        let high_idx = ((1.0 - alpha) * iteration_max as f64) as usize + 1;

        self.stats = self
            .history
            .iter()
            .map(|h| {
                let mut sorted = h.clone();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let last = sorted.len().saturating_sub(1);
                let at = |i: usize| sorted.get(i.min(last)).copied().unwrap_or(f64::NAN);
                vec![at(iteration_max / 2), at(low_idx), at(high_idx)]
            })
            .collect();
    }

    /// Use imported parameters: one statistics column, no history
    pub fn set_imported(&mut self, values: &[f64]) {
        self.history.clear();
        self.stats = values.iter().map(|&v| vec![v]).collect();
    }

    pub fn is_computed(&self) -> bool {
        !self.stats.is_empty()
    }

    /// First statistics column (the median in learning)
    pub fn expectation(&self) -> Option<Vec<f64>> {
        if self.stats.is_empty() {
            return None;
        }
        Some(self.stats.iter().map(|row| row[0]).collect())
    }

    pub fn stats(&self) -> &[Vec<f64>] {
        &self.stats
    }

    pub fn history(&self) -> &[Vec<f64>] {
        &self.history
    }

    pub fn n_stat_columns(&self) -> usize {
        self.stats.first().map_or(0, |r| r.len())
    }
}

/// Flat parameter table handed to the caller at the end of a run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamExport {
    /// One label per row, `"k: <k>, mu"` / `"k: <k>, pi"`
    pub labels: Vec<String>,
    /// `(2 x n_classes) x n_stat_columns`
    pub stats: Vec<Vec<f64>>,
    /// `(2 x n_classes) x n_iterations` (empty in prediction)
    pub history: Vec<Vec<f64>>,
    pub confidence: f64,
    pub param_string: String,
}

impl ParamExport {
    pub fn labels_for(n_classes: usize) -> Vec<String> {
        (0..n_classes)
            .flat_map(|k| [format!("k: {}, mu", k), format!("k: {}, pi", k)])
            .collect()
    }
}
