//! Multithreaded minibatch scheduler.
//!
//! A fixed pool of worker threads lives for the whole run. Per minibatch:
//!
//! 1. The coordinator publishes `remaining = batch_len`, `done = 0` under the progress
//!    mutex and broadcasts `work_ready`.
//! 2. A worker wakes, claims up to `share` items by decrementing `remaining` under the
//!    lock, and releases the lock.
//! 3. It runs that many `backprop` calls into its own accumulator slot. Only the
//!    parameter read lock and its private slot are held, never the progress mutex.
//! 4. It adds its count to `done` under the lock; whoever brings `done` to `batch_len`
//!    signals `batch_done`. Workers keep claiming until `remaining` is zero.
//! 5. The coordinator waits until `done == batch_len`, sums every slot, zeroes them,
//!    and takes the parameter write lock for the single `update_weights` call.
//!
//! When `done == batch_len` every worker has dropped its parameter read guard and its
//! slot guard, so the write lock never waits on, and never overlaps, a `backprop`.
//!
//! Shutdown sets a flag and broadcasts `work_ready`; workers exit on wake and are
//! joined. A panicking worker records itself in `failed` and signals `batch_done`, so
//! the coordinator aborts the run with [`Error::WorkerFailed`] instead of waiting
//! forever.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::thread;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use tracing::debug;

use crate::train::{EtaSchedule, FitReport, Trainer, epoch_report, minibatch_lens};
use crate::{Error, Examples, Nabla, Network, Result, Sampling, TrainConfig};

#[derive(Debug, Default)]
struct Progress {
    /// Items of the current minibatch not yet claimed.
    remaining: usize,
    /// Items of the current minibatch fully accumulated.
    done: usize,
    batch_len: usize,
    /// Offset of the current minibatch within the epoch order.
    batch_start: usize,
    /// Maximum items a worker claims per wake-up.
    share: usize,
    shutdown: bool,
    failed: Option<usize>,
}

#[derive(Debug, Default)]
struct Coordination {
    progress: Mutex<Progress>,
    work_ready: Condvar,
    batch_done: Condvar,
}

/// State the coordinator mutates between minibatches and workers only read.
struct Params<'n> {
    network: &'n mut Network,
    order: Vec<usize>,
}

struct Pool<'n, 'd> {
    coordination: Coordination,
    params: RwLock<Params<'n>>,
    slots: Vec<Mutex<Nabla>>,
    train: &'d Examples,
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    offset: usize,
    count: usize,
}

// Worker failure is reported through `Progress::failed`, so poisoned locks are
// recovered rather than propagated.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<'a, 'n>(params: &'a RwLock<Params<'n>>) -> RwLockReadGuard<'a, Params<'n>> {
    params.read().unwrap_or_else(PoisonError::into_inner)
}

impl Coordination {
    fn shutdown(&self) {
        lock(&self.progress).shutdown = true;
        self.work_ready.notify_all();
    }

    /// Block until the next claim is available; `None` once shutdown is requested.
    fn claim(&self) -> Option<Claim> {
        let guard = lock(&self.progress);
        let mut p = self
            .work_ready
            .wait_while(guard, |p| p.remaining == 0 && !p.shutdown)
            .unwrap_or_else(PoisonError::into_inner);
        if p.shutdown {
            return None;
        }

        let count = p.share.min(p.remaining);
        let offset = p.batch_start + (p.batch_len - p.remaining);
        p.remaining -= count;
        Some(Claim { offset, count })
    }

    fn complete(&self, count: usize) {
        let mut p = lock(&self.progress);
        p.done += count;
        if p.done == p.batch_len {
            self.batch_done.notify_all();
        }
    }
}

/// Sets the shutdown flag when the coordinator leaves the pool, including by panic
/// or early return, so no worker is left waiting.
struct ShutdownOnDrop<'c>(&'c Coordination);

impl Drop for ShutdownOnDrop<'_> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

/// Reports a worker panic to the coordinator.
struct FailureSignal<'c> {
    coordination: &'c Coordination,
    worker: usize,
}

impl Drop for FailureSignal<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            lock(&self.coordination.progress)
                .failed
                .get_or_insert(self.worker);
            self.coordination.batch_done.notify_all();
        }
    }
}

fn run_worker(pool: &Pool<'_, '_>, worker: usize, mut source: Option<StdRng>) {
    let _failure = FailureSignal {
        coordination: &pool.coordination,
        worker,
    };
    let n = pool.train.len();
    let mut scratch = read(&pool.params).network.scratch();
    debug!(worker, "worker started");

    while let Some(claim) = pool.coordination.claim() {
        {
            let params = read(&pool.params);
            let mut nabla = lock(&pool.slots[worker]);
            for k in 0..claim.count {
                let idx = match source.as_mut() {
                    Some(rng) => rng.gen_range(0..n),
                    None => params.order[claim.offset + k],
                };
                params.network.backprop_with(
                    &mut nabla,
                    pool.train.input(idx),
                    pool.train.label(idx),
                    &mut scratch,
                );
            }
        }
        pool.coordination.complete(claim.count);
    }

    debug!(worker, "worker exiting");
}

impl Trainer<'_> {
    /// Minibatch SGD with gradients computed by a pool of `cfg.workers` threads.
    ///
    /// With [`Sampling::WithReplacement`] each worker gets a private random source
    /// seeded from `rng` at pool start and draws its indices independently. With
    /// [`Sampling::ShuffledPartition`] the epoch order is shuffled with `rng` exactly
    /// as in [`Trainer::sgd_full`], and a one-worker pool reproduces it.
    pub fn sgd_parallel<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        cfg: &TrainConfig,
    ) -> Result<FitReport> {
        cfg.validate()?;

        let train = self.train;
        let test = self.test;
        let n = train.len();

        let sources: Vec<Option<StdRng>> = (0..cfg.workers)
            .map(|_| match cfg.sampling {
                Sampling::WithReplacement => Some(StdRng::seed_from_u64(rng.next_u64())),
                Sampling::ShuffledPartition => None,
            })
            .collect();

        let slots = (0..cfg.workers)
            .map(|_| Mutex::new(self.network.nabla()))
            .collect();
        let pool = Pool {
            coordination: Coordination::default(),
            params: RwLock::new(Params {
                network: &mut *self.network,
                order: (0..n).collect(),
            }),
            slots,
            train,
        };

        debug!(workers = cfg.workers, sampling = ?cfg.sampling, "starting worker pool");

        thread::scope(|scope| -> Result<FitReport> {
            let shutdown = ShutdownOnDrop(&pool.coordination);

            let mut handles = Vec::with_capacity(cfg.workers);
            for (worker, source) in sources.into_iter().enumerate() {
                let pool = &pool;
                let handle = thread::Builder::new()
                    .name(format!("sgd-worker-{worker}"))
                    .spawn_scoped(scope, move || run_worker(pool, worker, source))?;
                handles.push(handle);
            }

            let outcome = coordinate(&pool, rng, cfg, test);

            drop(shutdown);
            let mut panicked = None;
            for (worker, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    panicked.get_or_insert(worker);
                }
            }
            debug!("worker pool joined");

            match panicked {
                Some(worker) => Err(Error::WorkerFailed { worker }),
                None => outcome,
            }
        })
    }
}

fn coordinate<R: Rng + ?Sized>(
    pool: &Pool<'_, '_>,
    rng: &mut R,
    cfg: &TrainConfig,
    test: Option<&Examples>,
) -> Result<FitReport> {
    let n = pool.train.len();
    let coordination = &pool.coordination;
    let mut total = read(&pool.params).network.nabla();
    let mut schedule = EtaSchedule::new(cfg);
    let mut report = FitReport::default();

    for epoch in 0..cfg.epochs {
        let start = Instant::now();
        if cfg.sampling == Sampling::ShuffledPartition {
            let mut params = pool.params.write().unwrap_or_else(PoisonError::into_inner);
            params.order.shuffle(rng);
        }

        let mut batch_start = 0;
        for batch_len in minibatch_lens(n, cfg.batch_size) {
            {
                let mut p = lock(&coordination.progress);
                p.remaining = batch_len;
                p.done = 0;
                p.batch_len = batch_len;
                p.batch_start = batch_start;
                p.share = batch_len.div_ceil(cfg.workers);
            }
            coordination.work_ready.notify_all();

            {
                let guard = lock(&coordination.progress);
                let p = coordination
                    .batch_done
                    .wait_while(guard, |p| p.done < p.batch_len && p.failed.is_none())
                    .unwrap_or_else(PoisonError::into_inner);
                if let Some(worker) = p.failed {
                    return Err(Error::WorkerFailed { worker });
                }
            }

            total.zero();
            for slot in &pool.slots {
                let mut nabla = lock(slot);
                total.merge(&nabla);
                nabla.zero();
            }

            let mut params = pool.params.write().unwrap_or_else(PoisonError::into_inner);
            schedule.apply(&mut *params.network, &total, batch_len);
            batch_start += batch_len;
        }

        let params = read(&pool.params);
        report.epochs.push(epoch_report(
            &*params.network,
            pool.train,
            test,
            epoch,
            start,
            schedule.eta,
        ));
    }

    Ok(report)
}
