//! Minibatch SGD trainers.
//!
//! Three modes share one [`TrainConfig`]:
//!
//! - [`Trainer::sgd_full`]: shuffles the training set each epoch and walks it in
//!   consecutive minibatches.
//! - [`Trainer::sgd_sampled`]: same minibatch count and sizes, but every index is drawn
//!   independently with replacement.
//! - [`Trainer::sgd_parallel`]: a fixed worker pool computes each minibatch's gradient
//!   (see `parallel.rs`).
//!
//! Every update uses `eta_piece = eta / batch_size`. When `decay` is set, `eta` is
//! multiplied by it after every minibatch.

use std::time::{Duration, Instant};

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{info, trace};

use crate::{Error, Examples, Network, Result, TrainConfig};

/// Accuracy snapshot taken after one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    pub train_accuracy: f32,
    pub test_accuracy: Option<f32>,
    pub elapsed: Duration,
    /// Learning rate after the epoch's last minibatch.
    pub eta: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitReport {
    pub epochs: Vec<EpochReport>,
}

impl FitReport {
    pub fn last(&self) -> Option<&EpochReport> {
        self.epochs.last()
    }
}

/// Drives training of one network over a fixed training set.
///
/// The example sets are borrowed read-only; the network is mutated in place once per
/// minibatch.
#[derive(Debug)]
pub struct Trainer<'a> {
    pub(crate) network: &'a mut Network,
    pub(crate) train: &'a Examples,
    pub(crate) test: Option<&'a Examples>,
}

impl<'a> Trainer<'a> {
    /// Pair `network` with its training set and optional held-out set.
    ///
    /// Fails if the training set is empty or either set does not fit the network.
    pub fn new(
        network: &'a mut Network,
        train: &'a Examples,
        test: Option<&'a Examples>,
    ) -> Result<Self> {
        if train.is_empty() {
            return Err(Error::InvalidData(
                "training set must not be empty".to_owned(),
            ));
        }
        train.check_against(network)?;
        if let Some(test) = test {
            test.check_against(network)?;
        }
        Ok(Self {
            network,
            train,
            test,
        })
    }

    #[inline]
    pub fn network(&self) -> &Network {
        self.network
    }

    /// Sequential SGD over a shuffled partition of the training set.
    ///
    /// Each epoch shuffles the example order with `rng` (Fisher-Yates), so a run is
    /// reproducible from the seed.
    pub fn sgd_full<R: Rng + ?Sized>(&mut self, rng: &mut R, cfg: &TrainConfig) -> Result<FitReport> {
        cfg.validate()?;

        let train = self.train;
        let mut order: Vec<usize> = (0..train.len()).collect();
        let mut nabla = self.network.nabla();
        let mut scratch = self.network.scratch();
        let mut schedule = EtaSchedule::new(cfg);
        let mut report = FitReport::default();

        for epoch in 0..cfg.epochs {
            let start = Instant::now();
            order.shuffle(rng);

            for batch in order.chunks(cfg.batch_size) {
                nabla.zero();
                for &idx in batch {
                    self.network
                        .backprop_with(&mut nabla, train.input(idx), train.label(idx), &mut scratch);
                }
                schedule.apply(self.network, &nabla, batch.len());
            }

            report
                .epochs
                .push(epoch_report(self.network, train, self.test, epoch, start, schedule.eta));
        }

        Ok(report)
    }

    /// Sequential SGD with minibatch indices drawn independently with replacement.
    pub fn sgd_sampled<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        cfg: &TrainConfig,
    ) -> Result<FitReport> {
        cfg.validate()?;

        let train = self.train;
        let n = train.len();
        let mut nabla = self.network.nabla();
        let mut scratch = self.network.scratch();
        let mut schedule = EtaSchedule::new(cfg);
        let mut report = FitReport::default();

        for epoch in 0..cfg.epochs {
            let start = Instant::now();

            for batch_len in minibatch_lens(n, cfg.batch_size) {
                nabla.zero();
                for _ in 0..batch_len {
                    let idx = rng.gen_range(0..n);
                    self.network
                        .backprop_with(&mut nabla, train.input(idx), train.label(idx), &mut scratch);
                }
                schedule.apply(self.network, &nabla, batch_len);
            }

            report
                .epochs
                .push(epoch_report(self.network, train, self.test, epoch, start, schedule.eta));
        }

        Ok(report)
    }
}

/// Sizes of the consecutive minibatches covering `n` examples; the last may be short.
pub(crate) fn minibatch_lens(n: usize, batch_size: usize) -> impl Iterator<Item = usize> {
    (0..n)
        .step_by(batch_size)
        .map(move |start| batch_size.min(n - start))
}

/// Learning-rate state across minibatches.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EtaSchedule {
    pub(crate) eta: f32,
    batch_size: usize,
    decay: Option<f32>,
    lambda: Option<f32>,
}

impl EtaSchedule {
    pub(crate) fn new(cfg: &TrainConfig) -> Self {
        Self {
            eta: cfg.eta,
            batch_size: cfg.batch_size,
            decay: cfg.decay,
            lambda: cfg.lambda,
        }
    }

    /// Apply one update from `nabla`, then decay `eta`.
    pub(crate) fn apply(&mut self, network: &mut Network, nabla: &crate::Nabla, batch_len: usize) {
        let eta_piece = self.eta / self.batch_size as f32;
        network.update_weights(nabla, eta_piece, self.lambda);
        trace!(batch_len, eta = self.eta, "minibatch update");
        if let Some(decay) = self.decay {
            self.eta *= decay;
        }
    }
}

pub(crate) fn epoch_report(
    network: &Network,
    train: &Examples,
    test: Option<&Examples>,
    epoch: usize,
    start: Instant,
    eta: f32,
) -> EpochReport {
    let elapsed = start.elapsed();
    let train_accuracy = network.evaluate_accuracy(train);
    let test_accuracy = test.map(|t| network.evaluate_accuracy(t));

    info!(
        epoch,
        train_accuracy,
        test_accuracy = ?test_accuracy,
        elapsed_ms = elapsed.as_millis() as u64,
        "epoch finished"
    );

    EpochReport {
        epoch,
        train_accuracy,
        test_accuracy,
        elapsed,
        eta,
    }
}
