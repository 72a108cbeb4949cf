//! Training configuration.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Worker-pool size used when none is configured.
pub const FALLBACK_WORKERS: usize = 8;

/// How parallel workers pick the examples of a minibatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Sampling {
    /// Every worker draws its indices independently, with replacement, from the full
    /// training set using a private random source.
    ///
    /// This is a noisier gradient estimate than a shuffled partition and converges
    /// more slowly.
    #[default]
    WithReplacement,
    /// Workers consume disjoint ranges of the epoch's shuffled order, exactly like
    /// the sequential trainer.
    ShuffledPartition,
}

/// Hyperparameters shared by every trainer mode.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    /// Learning rate. Each update uses `eta / batch_size`.
    pub eta: f32,
    /// Multiply `eta` by this factor after every minibatch.
    pub decay: Option<f32>,
    /// L2 weight-decay coefficient.
    pub lambda: Option<f32>,
    /// Worker threads for the parallel trainer.
    pub workers: usize,
    /// Parallel sampling policy.
    pub sampling: Sampling,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 30,
            batch_size: 60,
            eta: 3.0,
            decay: None,
            lambda: None,
            workers: default_workers(),
            sampling: Sampling::default(),
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
        }
        if !(self.eta.is_finite() && self.eta >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "eta must be finite and >= 0, got {}",
                self.eta
            )));
        }
        if let Some(decay) = self.decay
            && !(decay.is_finite() && decay > 0.0 && decay <= 1.0)
        {
            return Err(Error::InvalidConfig(format!(
                "decay must be in (0, 1], got {decay}"
            )));
        }
        if let Some(lambda) = self.lambda
            && !(lambda.is_finite() && lambda >= 0.0)
        {
            return Err(Error::InvalidConfig(format!(
                "lambda must be finite and >= 0, got {lambda}"
            )));
        }
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be > 0".to_owned()));
        }
        Ok(())
    }

    /// Parse a JSON config; missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| Error::InvalidConfig(format!("config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[cfg(feature = "serde")]
    pub fn load_json<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_json_str(&s)
    }
}

/// Hardware concurrency, or [`FALLBACK_WORKERS`] when it cannot be queried.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_WORKERS)
}
