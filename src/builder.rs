//! Network builder.
//!
//! `NetworkBuilder` is the recommended way to define a network. It makes the layer
//! chain explicit (widths, hidden activations, output head) and validates it before
//! any parameter is allocated:
//!
//! ```rust
//! use sgd_mlp::{Activation, NetworkBuilder, OutputHead};
//!
//! # fn main() -> sgd_mlp::Result<()> {
//! let network = NetworkBuilder::new(784)?
//!     .hidden(30, Activation::Sigmoid)?
//!     .output(10, OutputHead::default())?
//!     .build_with_seed(42)?;
//! assert_eq!(network.output_dim(), 10);
//! # Ok(())
//! # }
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Activation, Error, LayerSpec, Network, OutputHead, Result};

#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    layers: Vec<LayerSpec>,
    output: Option<LayerSpec>,
}

impl NetworkBuilder {
    /// Start a network whose input layer has `input_width` entries.
    pub fn new(input_width: usize) -> Result<Self> {
        if input_width == 0 {
            return Err(Error::InvalidConfig("input width must be > 0".to_owned()));
        }
        Ok(Self {
            layers: vec![LayerSpec::input(input_width)],
            output: None,
        })
    }

    /// Builder from a full width list: sigmoid hidden layers and `head` on the output.
    pub fn from_sizes(sizes: &[usize], head: OutputHead) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::InvalidConfig(
                "sizes must include input and output widths".to_owned(),
            ));
        }
        let last = sizes.len() - 1;
        let mut b = Self::new(sizes[0])?;
        for &width in &sizes[1..last] {
            b = b.hidden(width, Activation::Sigmoid)?;
        }
        b.output(sizes[last], head)
    }

    /// Append a hidden layer.
    pub fn hidden(mut self, width: usize, activation: Activation) -> Result<Self> {
        if self.output.is_some() {
            return Err(Error::InvalidConfig(
                "hidden layers must be added before the output layer".to_owned(),
            ));
        }
        let spec = LayerSpec::hidden(width, activation);
        spec.validate()?;
        self.layers.push(spec);
        Ok(self)
    }

    /// Set the output layer and its head.
    pub fn output(mut self, width: usize, head: OutputHead) -> Result<Self> {
        if self.output.is_some() {
            return Err(Error::InvalidConfig(
                "output layer is already set".to_owned(),
            ));
        }
        let spec = LayerSpec::output(width, head);
        spec.validate()?;
        self.output = Some(spec);
        Ok(self)
    }

    /// Build using a deterministic seed.
    pub fn build_with_seed(self, seed: u64) -> Result<Network> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.build_with_rng(&mut rng)
    }

    /// Build using the provided random source.
    pub fn build_with_rng<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Network> {
        let Some(output) = self.output else {
            return Err(Error::InvalidConfig(
                "network needs an output layer".to_owned(),
            ));
        };
        let mut layers = self.layers;
        layers.push(output);
        Network::from_layers(layers, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_matches_sizes_shortcut() {
        let a = NetworkBuilder::from_sizes(&[4, 3, 2], OutputHead::default())
            .unwrap()
            .build_with_seed(5)
            .unwrap();
        let b = Network::new_with_seed(&[4, 3, 2], 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn builder_rejects_misordered_or_missing_layers() {
        assert!(NetworkBuilder::new(0).is_err());
        assert!(NetworkBuilder::new(2).unwrap().build_with_seed(0).is_err());

        let with_output = NetworkBuilder::new(2)
            .unwrap()
            .output(2, OutputHead::default())
            .unwrap();
        assert!(with_output.clone().hidden(3, Activation::ReLU).is_err());
        assert!(with_output.output(2, OutputHead::default()).is_err());

        assert!(
            NetworkBuilder::new(2)
                .unwrap()
                .hidden(3, Activation::LeakyReLU { alpha: f32::NAN })
                .is_err()
        );
    }

    #[test]
    fn builder_records_activations() {
        let network = NetworkBuilder::new(3)
            .unwrap()
            .hidden(4, Activation::ReLU)
            .unwrap()
            .hidden(4, Activation::Tanh)
            .unwrap()
            .output(2, OutputHead::SoftmaxCrossEntropy)
            .unwrap()
            .build_with_seed(0)
            .unwrap();
        let layers = network.layers();
        assert_eq!(layers.len(), 4);
        assert_eq!(layers[1].activation(), Some(Activation::ReLU));
        assert_eq!(layers[2].activation(), Some(Activation::Tanh));
        assert_eq!(network.head(), OutputHead::SoftmaxCrossEntropy);
    }
}
