//! # Class Assignment
//!
//! Per-individual class labels supplied by the encompassing mixture. The
//! estimator only reads them; they may change between SEM iterations.

use crate::error::{BosError, Result};

/// Zero-based class label
pub type ClassIdx = usize;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassAssignment {
    labels: Vec<ClassIdx>,
    n_classes: usize,
}

impl ClassAssignment {
    /// Build an assignment, rejecting labels outside `0..n_classes`
    pub fn new(labels: Vec<ClassIdx>, n_classes: usize) -> Result<Self> {
        if n_classes == 0 {
            return Err(BosError::invalid_data("at least one class is required"));
        }
        if let Some((i, &k)) = labels.iter().enumerate().find(|(_, &k)| k >= n_classes) {
            return Err(BosError::invalid_data(format!(
                "individual {} has class label {} but only {} classes exist",
                i, k, n_classes
            )));
        }
        Ok(Self { labels, n_classes })
    }

    /// Every individual in class 0
    pub fn single_class(n_individuals: usize) -> Self {
        Self {
            labels: vec![0; n_individuals],
            n_classes: 1,
        }
    }

    #[inline]
    pub fn class_of(&self, individual: usize) -> ClassIdx {
        self.labels[individual]
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    #[inline]
    pub fn n_individuals(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[ClassIdx] {
        &self.labels
    }

    /// Individuals currently in class `k`, in index order
    pub fn members(&self, k: ClassIdx) -> impl Iterator<Item = usize> + '_ {
        self.labels
            .iter()
            .enumerate()
            .filter(move |(_, &c)| c == k)
            .map(|(i, _)| i)
    }

    /// Number of individuals per class
    pub fn class_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.n_classes];
        for &k in &self.labels {
            sizes[k] += 1;
        }
        sizes
    }

    /// Move one individual to another class
    pub fn reassign(&mut self, individual: usize, k: ClassIdx) -> Result<()> {
        if k >= self.n_classes {
            return Err(BosError::invalid_data(format!(
                "class label {} out of range (n_classes = {})",
                k, self.n_classes
            )));
        }
        let slot = self.labels.get_mut(individual).ok_or_else(|| {
            BosError::invalid_data(format!("individual {} out of range", individual))
        })?;
        *slot = k;
        Ok(())
    }
}
