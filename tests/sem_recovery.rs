//! Parameter recovery on data simulated from the BOS process.
//!
//! Data are drawn by forward sampling with known `(mode, precision)`, then a
//! full learning run must find the mode and land near the precision.

use bosmix::model::path::AccuracyConstraint;
use bosmix::{ClassAssignment, Observation, Path, RunMode, SamplerSettings, Segment, SemPipeline, SemSettings};
use rand::rngs::SmallRng;
use rand::SeedableRng;

fn simulate(n: usize, n_modalities: usize, mode: usize, precision: f64, seed: u64) -> Vec<Observation> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut path = Path::new(Segment::full(n_modalities));
    (0..n)
        .map(|_| {
            path.forward_sample(mode, precision, AccuracyConstraint::Unconstrained, &mut rng);
            Observation::Present(path.value() as i64)
        })
        .collect()
}

fn settings(seed: u64) -> (SamplerSettings, SemSettings) {
    (
        SamplerSettings {
            burn_in: 10,
            observed_samples: 5_000,
            ..SamplerSettings::default()
        },
        SemSettings {
            burn_in_iterations: 10,
            iterations: 30,
            gibbs_iterations: 10,
            seed: Some(seed),
            ..SemSettings::default()
        },
    )
}

#[test]
fn test_recovers_mode_and_precision() {
    let obs = simulate(1000, 5, 2, 0.6, 11);
    let z = ClassAssignment::single_class(obs.len());
    let (sampler, sem) = settings(5);
    let outcome = SemPipeline::new("simulated", sampler, sem)
        .run(&obs, &z, RunMode::Learning { n_modalities: None })
        .unwrap();

    let p = outcome.params[0];
    assert_eq!(p.mode, 2);
    assert!((p.precision - 0.6).abs() < 0.05, "precision {}", p.precision);

    // median row bracketed by the bounds
    let pi_row = &outcome.export.stats[1];
    assert!(pi_row[1] <= pi_row[0] && pi_row[0] <= pi_row[2]);
    assert!(outcome.ln_likelihood.is_finite());
}

#[test]
fn test_two_classes_with_labels() {
    let a = simulate(600, 5, 1, 0.7, 21);
    let b = simulate(600, 5, 3, 0.7, 22);
    let mut labels = vec![0; a.len()];
    labels.extend(vec![1; b.len()]);
    let obs: Vec<Observation> = a.into_iter().chain(b).collect();
    let z = ClassAssignment::new(labels, 2).unwrap();

    let (sampler, sem) = settings(9);
    let outcome = SemPipeline::new("simulated", sampler, sem)
        .run(&obs, &z, RunMode::Learning { n_modalities: Some(5) })
        .unwrap();

    assert_eq!(outcome.params[0].mode, 1);
    assert_eq!(outcome.params[1].mode, 3);
    for p in &outcome.params {
        assert!((p.precision - 0.7).abs() < 0.08, "precision {}", p.precision);
    }
    assert_eq!(outcome.n_free_parameters, 2);
}

#[test]
fn test_missing_values_imputed_near_mode() {
    let mut obs = simulate(300, 5, 3, 0.8, 31);
    for o in obs.iter_mut().skip(1).step_by(5) {
        *o = Observation::Missing;
    }
    let z = ClassAssignment::single_class(obs.len());
    let (sampler, mut sem) = settings(13);
    sem.gibbs_iterations = 50;
    let outcome = SemPipeline::new("simulated", sampler, sem)
        .run(&obs, &z, RunMode::Learning { n_modalities: Some(5) })
        .unwrap();

    assert_eq!(outcome.params[0].mode, 3);
    // pooled posterior over all missing individuals peaks at the mode
    let mut pooled = vec![0u32; 5];
    for (obs, tally) in obs.iter().zip(&outcome.tallies) {
        if *obs == Observation::Missing {
            for (p, c) in pooled.iter_mut().zip(tally) {
                *p += c;
            }
        }
    }
    let argmax = (0..5).max_by_key(|&v| pooled[v]).unwrap();
    assert_eq!(argmax, 3);
}
