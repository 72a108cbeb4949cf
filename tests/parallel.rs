use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use sgd_mlp::{Activation, Error, Examples, Network, NetworkBuilder, OutputHead, Sampling, TrainConfig, Trainer};

fn six_examples() -> Examples {
    Examples::from_rows(
        &[
            vec![1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0],
            vec![0.0, 0.0, 1.0, 0.0],
            vec![0.0, 0.0, 0.0, 1.0],
            vec![0.9, 0.1, 0.0, 0.0],
            vec![0.0, 0.0, 0.1, 0.9],
        ],
        &[0, 0, 1, 1, 0, 1],
    )
    .unwrap()
}

#[test]
fn one_worker_partition_reproduces_sequential_sgd() {
    let train = six_examples();
    let initial = Network::new_with_seed(&[4, 5, 2], 8).unwrap();
    let cfg = TrainConfig {
        epochs: 3,
        batch_size: 4,
        eta: 2.0,
        decay: Some(0.9),
        lambda: Some(1e-3),
        workers: 1,
        sampling: Sampling::ShuffledPartition,
    };

    let mut sequential = initial.clone();
    let seq_report = Trainer::new(&mut sequential, &train, None)
        .unwrap()
        .sgd_full(&mut StdRng::seed_from_u64(21), &cfg)
        .unwrap();

    let mut pooled = initial;
    let pool_report = Trainer::new(&mut pooled, &train, None)
        .unwrap()
        .sgd_parallel(&mut StdRng::seed_from_u64(21), &cfg)
        .unwrap();

    assert_eq!(sequential, pooled);
    for (a, b) in seq_report.epochs.iter().zip(&pool_report.epochs) {
        assert_eq!(a.train_accuracy, b.train_accuracy);
        assert_eq!(a.eta, b.eta);
    }
}

#[test]
fn one_worker_with_replacement_draws_from_a_seeded_private_source() {
    let train = six_examples();
    let initial = Network::new_with_seed(&[4, 5, 2], 8).unwrap();
    let cfg = TrainConfig {
        epochs: 3,
        batch_size: 4,
        eta: 2.0,
        decay: Some(0.9),
        lambda: Some(1e-3),
        workers: 1,
        sampling: Sampling::WithReplacement,
    };

    // The single worker's source is seeded from the caller's first draw.
    let worker_seed = StdRng::seed_from_u64(21).next_u64();
    let mut sequential = initial.clone();
    Trainer::new(&mut sequential, &train, None)
        .unwrap()
        .sgd_sampled(&mut StdRng::seed_from_u64(worker_seed), &cfg)
        .unwrap();

    let mut pooled = initial;
    Trainer::new(&mut pooled, &train, None)
        .unwrap()
        .sgd_parallel(&mut StdRng::seed_from_u64(21), &cfg)
        .unwrap();

    assert_eq!(sequential, pooled);
}

#[test]
fn many_workers_with_replacement_converge() {
    let train = six_examples();
    let mut network = Network::new_with_seed(&[4, 6, 2], 3).unwrap();
    let cfg = TrainConfig {
        epochs: 400,
        batch_size: 3,
        eta: 3.0,
        workers: 4,
        sampling: Sampling::WithReplacement,
        ..TrainConfig::default()
    };
    let report = Trainer::new(&mut network, &train, Some(&train))
        .unwrap()
        .sgd_parallel(&mut StdRng::seed_from_u64(6), &cfg)
        .unwrap();

    assert_eq!(report.epochs.len(), 400);
    assert_eq!(report.last().unwrap().train_accuracy, 1.0);
}

#[test]
fn zero_epochs_starts_and_joins_the_pool() {
    let train = six_examples();
    let mut network = Network::new_with_seed(&[4, 3, 2], 0).unwrap();
    let before = network.clone();
    let cfg = TrainConfig {
        epochs: 0,
        workers: 5,
        ..TrainConfig::default()
    };

    let report = Trainer::new(&mut network, &train, None)
        .unwrap()
        .sgd_parallel(&mut StdRng::seed_from_u64(0), &cfg)
        .unwrap();

    assert!(report.epochs.is_empty());
    assert_eq!(network, before);
}

fn identity(z: f32) -> f32 {
    z
}

fn exploding_derivative(_: f32) -> f32 {
    panic!("derivative unavailable")
}

#[test]
fn a_panicking_worker_fails_the_run() {
    let train = six_examples();
    let mut network = NetworkBuilder::new(4)
        .unwrap()
        .hidden(
            3,
            Activation::Custom {
                f: identity,
                df: exploding_derivative,
            },
        )
        .unwrap()
        .output(2, OutputHead::default())
        .unwrap()
        .build_with_seed(0)
        .unwrap();
    let cfg = TrainConfig {
        epochs: 2,
        batch_size: 3,
        workers: 2,
        ..TrainConfig::default()
    };

    let result = Trainer::new(&mut network, &train, None)
        .unwrap()
        .sgd_parallel(&mut StdRng::seed_from_u64(0), &cfg);

    assert!(matches!(result, Err(Error::WorkerFailed { .. })));
}

#[test]
fn invalid_config_is_rejected_before_spawning() {
    let train = six_examples();
    let mut network = Network::new_with_seed(&[4, 3, 2], 0).unwrap();
    let cfg = TrainConfig {
        workers: 0,
        ..TrainConfig::default()
    };
    let result = Trainer::new(&mut network, &train, None)
        .unwrap()
        .sgd_parallel(&mut StdRng::seed_from_u64(0), &cfg);
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
