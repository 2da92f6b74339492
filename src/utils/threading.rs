//! # Threading and Seeding
//!
//! ## Role
//! Configure rayon thread pools and derive reproducible random streams for
//! parallel loops.
//!
//! ## Seeding policy
//! One master [`SmallRng`] is created at the process boundary, from a fixed
//! seed or from the clock. A parallel loop draws a single `u64` from it and
//! gives item `i` its own generator seeded with [`stream_seed`]`(base, i)`.
//! Results therefore depend on the seed only, not on the number of threads
//! or on scheduling.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::error::{BosError, Result};

/// Create a configured thread pool
pub fn build_thread_pool(n_threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("bosmix-worker-{}", i))
        .build()
        .map_err(|e| BosError::config(format!("Failed to create thread pool: {}", e)))
}

/// Configure the global rayon pool. Ignored if it was already initialized.
pub fn init_global_pool(n_threads: usize) {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("bosmix-worker-{}", i))
        .build_global()
        .ok();
}

/// Seed derived from the system clock
pub fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x5EED)
}

/// Master generator for a run
pub fn master_rng(seed: Option<u64>) -> SmallRng {
    SmallRng::seed_from_u64(seed.unwrap_or_else(clock_seed))
}

/// Child seed for stream `stream` of a parallel loop (SplitMix64 finalizer)
#[inline]
pub fn stream_seed(base: u64, stream: u64) -> u64 {
    let mut z = base.wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// One generator per item, all derived from a single draw of `rng`
pub fn child_rngs<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<SmallRng> {
    let base = rng.random::<u64>();
    (0..n)
        .map(|i| SmallRng::seed_from_u64(stream_seed(base, i as u64)))
        .collect()
}
