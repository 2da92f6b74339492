//! # Observed Probability Table
//!
//! The marginal distribution of the terminal modality under each class's
//! parameters. The per-run table is estimated by forward-simulating
//! unconstrained paths and counting where they end; [`exact_distribution`]
//! computes it by recursion over sub-segments, which is affordable for
//! small modality counts and is used to seed class parameters.

use rand::rngs::SmallRng;
use rand::Rng;
use rayon::prelude::*;

use crate::data::observation::OrdinalDatum;
use crate::data::segment::{Modality, Segment};
use crate::error::{BosError, Result};
use crate::utils::threading::child_rngs;

use super::node::Partition;
use super::parameters::ClassParams;
use super::path::{AccuracyConstraint, Path};

/// Class x modality probabilities, class-major
#[derive(Clone, Debug, PartialEq)]
pub struct ObservedProbabilityTable {
    n_classes: usize,
    n_modalities: usize,
    probs: Vec<f64>,
}

impl ObservedProbabilityTable {
    /// Forward-simulate `n_samples` paths per class (classes in parallel)
    pub fn estimate<R: Rng + ?Sized>(
        params: &[ClassParams],
        n_modalities: usize,
        n_samples: usize,
        rng: &mut R,
    ) -> Self {
        let rngs = child_rngs(rng, params.len());
        let rows: Vec<Vec<f64>> = params
            .par_iter()
            .zip(rngs)
            .map(|(p, mut class_rng)| simulate_class(*p, n_modalities, n_samples, &mut class_rng))
            .collect();

        Self {
            n_classes: params.len(),
            n_modalities,
            probs: rows.into_iter().flatten().collect(),
        }
    }

    /// Exact rows, one per parameter pair (rows in parallel)
    pub fn exact(params: &[ClassParams], n_modalities: usize) -> Self {
        let rows: Vec<Vec<f64>> = params
            .par_iter()
            .map(|p| exact_distribution(*p, n_modalities))
            .collect();
        Self {
            n_classes: params.len(),
            n_modalities,
            probs: rows.into_iter().flatten().collect(),
        }
    }

    /// Build from explicit rows (one per class)
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_modalities = rows.first().map_or(0, |r| r.len());
        if rows.iter().any(|r| r.len() != n_modalities) {
            return Err(BosError::invalid_data("observed probability rows differ in length"));
        }
        Ok(Self {
            n_classes: rows.len(),
            n_modalities,
            probs: rows.into_iter().flatten().collect(),
        })
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    pub fn n_modalities(&self) -> usize {
        self.n_modalities
    }

    #[inline]
    pub fn get(&self, k: usize, v: Modality) -> f64 {
        self.probs[k * self.n_modalities + v]
    }

    pub fn row(&self, k: usize) -> &[f64] {
        &self.probs[k * self.n_modalities..(k + 1) * self.n_modalities]
    }

    /// Log-probability of an observation in class `k`.
    ///
    /// Fully missing values marginalize to probability 1. Values and
    /// intervals reaching outside the table are impossible.
    pub fn ln_probability(&self, k: usize, datum: OrdinalDatum) -> f64 {
        match datum {
            OrdinalDatum::Missing => 0.0,
            OrdinalDatum::Present(v) => {
                if v < self.n_modalities {
                    self.get(k, v).ln()
                } else {
                    f64::NEG_INFINITY
                }
            }
            OrdinalDatum::Interval(seg) => {
                let row = self.row(k);
                let hi = seg.hi().min(self.n_modalities.saturating_sub(1));
                let p: f64 = (seg.lo()..=hi).filter_map(|v| row.get(v)).sum();
                p.ln()
            }
        }
    }
}

/// Terminal-value distribution of the BOS process started on the full range.
///
/// For a segment `S` of size `s > 1`:
/// `dist(S) = 1/s * sum_y sum_e P(e | y) dist(e)` over breakpoints `y` and
/// parts `e` of the split, with
/// `P(e | y) = precision * [e is the closest part] + (1 - precision) * |e| / s`.
/// Parts are strictly smaller than `S`, so segments are filled by
/// increasing size. Each row only spans its own segment.
pub fn exact_distribution(params: ClassParams, n_modalities: usize) -> Vec<f64> {
    let n = n_modalities;
    if n == 0 {
        return Vec::new();
    }
    let ClassParams { mode, precision } = params;
    // dist[lo * n + hi], entry v - lo
    let mut dist: Vec<Vec<f64>> = vec![Vec::new(); n * n];

    for size in 1..=n {
        for lo in 0..=n - size {
            let seg = Segment::new(lo, lo + size - 1);
            let mut row = vec![0.0f64; size];
            if size == 1 {
                row[0] = 1.0;
            } else {
                for y in seg.iter() {
                    let partition = Partition::split(seg, y);
                    let closest = partition.closest_to(mode);
                    let total = partition.total_size() as f64;
                    for &part in partition.as_slice() {
                        let mut w = (1.0 - precision) * part.size() as f64 / total;
                        if closest == Some(part) {
                            w += precision;
                        }
                        if w == 0.0 {
                            continue;
                        }
                        let offset = part.lo() - lo;
                        let sub = &dist[part.lo() * n + part.hi()];
                        for (r, &q) in row[offset..offset + part.size()].iter_mut().zip(sub) {
                            *r += w * q;
                        }
                    }
                }
                let inv = 1.0 / size as f64;
                row.iter_mut().for_each(|r| *r *= inv);
            }
            dist[lo * n + seg.hi()] = row;
        }
    }
    std::mem::take(&mut dist[n - 1])
}

fn simulate_class(params: ClassParams, n_modalities: usize, n_samples: usize, rng: &mut SmallRng) -> Vec<f64> {
    let mut counts = vec![0usize; n_modalities];
    if n_modalities == 0 || n_samples == 0 {
        return vec![0.0; n_modalities];
    }
    let mut path = Path::new(Segment::full(n_modalities));
    for _ in 0..n_samples {
        path.forward_sample(params.mode, params.precision, AccuracyConstraint::Unconstrained, rng);
        counts[path.value()] += 1;
    }
    counts
        .into_iter()
        .map(|c| c as f64 / n_samples as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_rows_are_distributions() {
        let mut rng = SmallRng::seed_from_u64(3);
        let params = [ClassParams::new(0, 0.8), ClassParams::new(3, 0.4)];
        let table = ObservedProbabilityTable::estimate(&params, 5, 10_000, &mut rng);
        assert_eq!(table.n_classes(), 2);
        for k in 0..2 {
            let total: f64 = table.row(k).iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
        }
        let argmax = |k: usize| {
            (0..5)
                .max_by(|&a, &b| table.get(k, a).total_cmp(&table.get(k, b)))
                .unwrap()
        };
        assert_eq!(argmax(0), 0);
        assert_eq!(argmax(1), 3);
    }

    #[test]
    fn test_blind_two_modalities_uniform() {
        let mut rng = SmallRng::seed_from_u64(4);
        let table = ObservedProbabilityTable::estimate(&[ClassParams::new(0, 0.0)], 2, 20_000, &mut rng);
        assert!((table.get(0, 0) - 0.5).abs() < 0.02);
    }

    #[test]
    fn test_ln_probability_queries() {
        let table = ObservedProbabilityTable::from_rows(vec![vec![0.1, 0.2, 0.3, 0.4]]).unwrap();
        assert!((table.ln_probability(0, OrdinalDatum::Present(2)) - 0.3f64.ln()).abs() < 1e-12);
        assert_eq!(table.ln_probability(0, OrdinalDatum::Missing), 0.0);
        let interval = OrdinalDatum::Interval(Segment::new(1, 2));
        assert!((table.ln_probability(0, interval) - 0.5f64.ln()).abs() < 1e-12);
        assert_eq!(table.ln_probability(0, OrdinalDatum::Present(9)), f64::NEG_INFINITY);
    }

    #[test]
    fn test_exact_distribution_values() {
        let d = exact_distribution(ClassParams::new(2, 0.6), 5);
        let expected = [0.071776, 0.11856, 0.619328, 0.11856, 0.071776];
        for (a, b) in d.iter().zip(expected) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
        // fully blind on two modalities
        let blind = exact_distribution(ClassParams::new(0, 0.0), 2);
        assert!((blind[0] - 0.5).abs() < 1e-12);
        assert_eq!(exact_distribution(ClassParams::new(0, 0.5), 1), vec![1.0]);
    }

    #[test]
    fn test_exact_matches_simulation() {
        let params = [ClassParams::new(1, 0.3), ClassParams::new(5, 0.8)];
        let exact = ObservedProbabilityTable::exact(&params, 7);
        let mut rng = SmallRng::seed_from_u64(8);
        let simulated = ObservedProbabilityTable::estimate(&params, 7, 40_000, &mut rng);
        for k in 0..2 {
            let total: f64 = exact.row(k).iter().sum();
            assert!((total - 1.0).abs() < 1e-9);
            for v in 0..7 {
                assert!((exact.get(k, v) - simulated.get(k, v)).abs() < 0.015, "class {} value {}", k, v);
            }
        }
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(ObservedProbabilityTable::from_rows(vec![vec![0.5, 0.5], vec![1.0]]).is_err());
    }
}
