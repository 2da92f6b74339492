//! # Categorical Sampling
//!
//! Small helpers for drawing from unnormalized discrete distributions. All
//! take the RNG by `&mut` so callers own the seeding policy.

use rand::Rng;

/// Draw an index with probability proportional to `weights`.
///
/// When the weights sum to zero (or less) the draw falls back to a uniform
/// index. Returns 0 for an empty slice.
pub fn sample_from_weights<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) {
        if weights.is_empty() {
            return 0;
        }
        return rng.random_range(0..weights.len());
    }

    let mut threshold = rng.random::<f64>() * total;
    for (i, w) in weights.iter().enumerate() {
        threshold -= *w;
        if threshold <= 0.0 && *w > 0.0 {
            return i;
        }
    }
    // Rounding left a residue: return the last index with positive weight
    weights
        .iter()
        .rposition(|&w| w > 0.0)
        .unwrap_or(weights.len() - 1)
}

/// Convert log-weights into normalized probabilities in `out`.
///
/// The maximum is subtracted before exponentiation. If every entry is
/// `-inf` the result is uniform.
pub fn log_to_probabilities(log_weights: &[f64], out: &mut Vec<f64>) {
    out.clear();
    let max = log_weights
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY || max.is_nan() {
        let n = log_weights.len().max(1) as f64;
        out.extend(log_weights.iter().map(|_| 1.0 / n));
        return;
    }
    out.extend(log_weights.iter().map(|&lw| (lw - max).exp()));
    let total: f64 = out.iter().sum();
    for p in out.iter_mut() {
        *p /= total;
    }
}

/// Softmax draw over log-weights, using `scratch` as the probability buffer
pub fn sample_from_log_weights<R: Rng + ?Sized>(
    log_weights: &[f64],
    scratch: &mut Vec<f64>,
    rng: &mut R,
) -> usize {
    log_to_probabilities(log_weights, scratch);
    sample_from_weights(scratch, rng)
}
