//! A dense feed-forward network trained with minibatch SGD.
//!
//! `sgd-mlp` is a from-scratch implementation of a fully connected classifier:
//! flattened inputs go in, one score per class comes out, and training is plain
//! (optionally L2-regularized, optionally decayed) gradient descent on summed
//! per-example gradients.
//!
//! # Pieces
//!
//! - [`Vector`] / [`Matrix`]: owned `f32` buffers with shape-asserted arithmetic.
//! - [`LayerSpec`], [`Activation`], [`OutputHead`]: the layer chain. The output head
//!   bundles the output activation with its loss gradient so the two cannot drift.
//! - [`Network`]: forward pass, `backprop` into a caller-owned [`Nabla`], and in-place
//!   `update_weights`.
//! - [`Nabla`]: gradient accumulator; merging is associative and commutative with the
//!   zero accumulator as identity.
//! - [`Trainer`]: sequential (`sgd_full`, `sgd_sampled`) and multithreaded
//!   (`sgd_parallel`) training loops.
//!
//! # Panics vs `Result`
//!
//! - Low-level hot path (panics on misuse): vector/matrix arithmetic,
//!   [`Network::feedforward`], [`Network::backprop`], [`Network::update_weights`].
//!   Shape mismatches are programmer error and trip an `assert!`.
//! - Boundary APIs return [`Result`]: [`NetworkBuilder`], [`TrainConfig::validate`],
//!   [`Examples::new`], [`Trainer`] and the [`io`] loaders.
//!
//! # Quick start
//!
//! ```rust
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use sgd_mlp::{Examples, Network, TrainConfig, Trainer};
//!
//! # fn main() -> sgd_mlp::Result<()> {
//! let train = Examples::from_rows(
//!     &[
//!         vec![1.0, 0.0, 0.0, 0.0],
//!         vec![0.0, 1.0, 0.0, 0.0],
//!         vec![0.0, 0.0, 1.0, 0.0],
//!         vec![0.0, 0.0, 0.0, 1.0],
//!     ],
//!     &[0, 0, 1, 1],
//! )?;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut network = Network::new_with_rng(&[4, 8, 2], &mut rng)?;
//! let cfg = TrainConfig {
//!     epochs: 5,
//!     batch_size: 2,
//!     eta: 3.0,
//!     ..TrainConfig::default()
//! };
//! let report = Trainer::new(&mut network, &train, None)?.sgd_full(&mut rng, &cfg)?;
//! assert_eq!(report.epochs.len(), 5);
//! # Ok(())
//! # }
//! ```
//!
//! # Driving backprop by hand
//!
//! ```rust
//! use sgd_mlp::Network;
//!
//! # fn main() -> sgd_mlp::Result<()> {
//! let mut network = Network::new_with_seed(&[3, 4, 2], 0)?;
//! let mut nabla = network.nabla();
//! let mut scratch = network.scratch();
//!
//! network.backprop_with(&mut nabla, &[0.1, -0.2, 0.3], 1, &mut scratch);
//! network.backprop_with(&mut nabla, &[0.5, 0.5, 0.0], 0, &mut scratch);
//! network.update_weights(&nabla, 0.5 / 2.0, None);
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod builder;
pub mod config;
pub mod data;
pub mod error;
pub mod io;
pub mod layer;
pub mod linalg;
pub mod loss;
pub(crate) mod matmul;
pub mod metrics;
pub mod nabla;
pub mod network;
mod parallel;
pub mod train;

pub use activation::Activation;
pub use builder::NetworkBuilder;
pub use config::{Sampling, TrainConfig, default_workers};
pub use data::Examples;
pub use error::{Error, Result};
pub use layer::{LayerRole, LayerSpec, Transition};
pub use linalg::{Matrix, Vector};
pub use loss::OutputHead;
pub use nabla::Nabla;
pub use network::{Network, Scratch};
pub use train::{EpochReport, FitReport, Trainer};
