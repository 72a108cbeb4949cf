use std::fmt;
use std::io;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::layer::Transition;
use crate::{Activation, Error, Examples, LayerRole, LayerSpec, Nabla, OutputHead, Result, Vector};

/// A dense feed-forward network: an ordered chain of layers joined by transitions.
///
/// `layers[0]` is the input layer and owns no parameters; transition `i` feeds
/// `layers[i + 1]` from `layers[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    layers: Vec<LayerSpec>,
    transitions: Vec<Transition>,
    head: OutputHead,
}

/// Reusable buffers for `feedforward_into` and `backprop_with`.
///
/// Holds every transition's pre-activation, activation and delta from the most
/// recent pass. One `Scratch` per thread; it is cheap to keep and reuse.
#[derive(Debug, Clone)]
pub struct Scratch {
    zs: Vec<Vector>,
    activations: Vec<Vector>,
    deltas: Vec<Vector>,
    target: Vector,
}

impl Network {
    /// Sigmoid hidden layers and a sigmoid squared-error head.
    ///
    /// `sizes` lists every layer width, input first.
    pub fn new_with_seed(sizes: &[usize], seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new_with_rng(sizes, &mut rng)
    }

    pub fn new_with_rng<R: Rng + ?Sized>(sizes: &[usize], rng: &mut R) -> Result<Self> {
        if sizes.len() < 2 {
            return Err(Error::InvalidConfig(
                "sizes must include input and output widths".to_owned(),
            ));
        }

        let last = sizes.len() - 1;
        let mut layers = Vec::with_capacity(sizes.len());
        layers.push(LayerSpec::input(sizes[0]));
        for &width in &sizes[1..last] {
            layers.push(LayerSpec::hidden(width, Activation::Sigmoid));
        }
        layers.push(LayerSpec::output(sizes[last], OutputHead::default()));

        Self::from_layers(layers, rng)
    }

    /// Allocate and randomly initialize every transition for `layers`.
    ///
    /// `layers` must be one input layer, any number of hidden layers, then one output
    /// layer.
    pub fn from_layers<R: Rng + ?Sized>(layers: Vec<LayerSpec>, rng: &mut R) -> Result<Self> {
        let head = validate_layers(&layers)?;

        let mut transitions = Vec::with_capacity(layers.len() - 1);
        for pair in layers.windows(2) {
            transitions.push(Transition::new_with_rng(pair[0].width(), pair[1].width(), rng)?);
        }

        Ok(Self {
            layers,
            transitions,
            head,
        })
    }

    /// Assemble a network from explicit parameters.
    pub fn from_parts(layers: Vec<LayerSpec>, transitions: Vec<Transition>) -> Result<Self> {
        let head = validate_layers(&layers)?;
        if transitions.len() != layers.len() - 1 {
            return Err(Error::InvalidShape(format!(
                "{} layers need {} transitions, got {}",
                layers.len(),
                layers.len() - 1,
                transitions.len()
            )));
        }
        for (idx, (pair, t)) in layers.windows(2).zip(&transitions).enumerate() {
            if t.in_dim() != pair[0].width() || t.out_dim() != pair[1].width() {
                return Err(Error::InvalidShape(format!(
                    "transition {idx} is {} -> {}, layers are {} -> {}",
                    t.in_dim(),
                    t.out_dim(),
                    pair[0].width(),
                    pair[1].width()
                )));
            }
        }

        Ok(Self {
            layers,
            transitions,
            head,
        })
    }

    #[inline]
    pub fn input_dim(&self) -> usize {
        self.layers[0].width()
    }

    /// Width of the output layer, i.e. the number of classes.
    #[inline]
    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].width()
    }

    #[inline]
    pub fn num_transitions(&self) -> usize {
        self.transitions.len()
    }

    #[inline]
    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    #[inline]
    pub fn head(&self) -> OutputHead {
        self.head
    }

    #[inline]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[inline]
    pub fn transition(&self, idx: usize) -> Option<&Transition> {
        self.transitions.get(idx)
    }

    pub fn scratch(&self) -> Scratch {
        Scratch::new(self)
    }

    /// A zeroed gradient accumulator shaped like this network.
    pub fn nabla(&self) -> Nabla {
        Nabla::zeros_like(self)
    }

    /// Forward pass. Returns the output layer's activation.
    pub fn feedforward(&self, input: &[f32]) -> Vector {
        let mut scratch = self.scratch();
        Vector::from_vec(self.feedforward_into(input, &mut scratch).to_vec())
    }

    /// Forward pass into `scratch`, retaining every pre-activation and activation.
    ///
    /// Shape contract:
    /// - `input.len() == self.input_dim()`
    /// - `scratch` was built for this network
    pub fn feedforward_into<'a>(&self, input: &[f32], scratch: &'a mut Scratch) -> &'a [f32] {
        assert_eq!(
            input.len(),
            self.input_dim(),
            "input len {} does not match network input_dim {}",
            input.len(),
            self.input_dim()
        );
        scratch.assert_built_for(self);

        let Scratch { zs, activations, .. } = scratch;
        for (idx, t) in self.transitions.iter().enumerate() {
            let (done, rest) = activations.split_at_mut(idx);
            let a_in: &[f32] = if idx == 0 { input } else { &done[idx - 1] };
            t.pre_activation_into(a_in, &mut zs[idx]);
            self.layers[idx + 1].activate_into(&zs[idx], &mut rest[0]);
        }

        scratch.output()
    }

    /// Index of the largest output entry (ties go to the lowest index).
    pub fn predict(&self, input: &[f32]) -> usize {
        let mut scratch = self.scratch();
        crate::linalg::argmax(self.feedforward_into(input, &mut scratch))
    }

    /// Predicted labels, index-aligned with `inputs`.
    pub fn predict_batch(&self, inputs: &[Vector]) -> Vec<usize> {
        let mut scratch = self.scratch();
        inputs
            .iter()
            .map(|x| crate::linalg::argmax(self.feedforward_into(x, &mut scratch)))
            .collect()
    }

    /// Fraction of `examples` whose predicted label matches the true one.
    pub fn evaluate_accuracy(&self, examples: &Examples) -> f32 {
        let predicted = self.predict_batch(examples.inputs());
        crate::metrics::accuracy(&predicted, examples.labels())
    }

    /// Mean per-example loss of the output head over `examples`.
    pub fn mean_loss(&self, examples: &Examples) -> f32 {
        if examples.is_empty() {
            return 0.0;
        }
        let mut scratch = self.scratch();
        let mut total = 0.0_f32;
        for (x, &y) in examples.iter() {
            self.feedforward_into(x, &mut scratch);
            scratch.target.set_one_hot(y);
            let Scratch {
                activations,
                target,
                ..
            } = &scratch;
            total += self.head.loss(&activations[activations.len() - 1], target);
        }
        total / examples.len() as f32
    }

    /// Backpropagate one example, adding its gradient into `nabla`.
    ///
    /// Returns the delta of the first transition (`dL/dz` of the first non-input layer).
    /// Every call adds one more copy of this example's gradient; call exactly once per
    /// contribution.
    pub fn backprop(&self, nabla: &mut Nabla, input: &[f32], label: usize) -> Vector {
        let mut scratch = self.scratch();
        Vector::from_vec(self.backprop_with(nabla, input, label, &mut scratch).to_vec())
    }

    /// Allocation-free `backprop` using caller-owned buffers.
    ///
    /// Only reads network parameters; all writes go to `nabla` and `scratch`.
    pub fn backprop_with<'a>(
        &self,
        nabla: &mut Nabla,
        input: &[f32],
        label: usize,
        scratch: &'a mut Scratch,
    ) -> &'a [f32] {
        assert_eq!(
            nabla.num_transitions(),
            self.num_transitions(),
            "nabla has {} transitions, network has {}",
            nabla.num_transitions(),
            self.num_transitions()
        );
        assert!(
            label < self.output_dim(),
            "label {label} out of range for {} classes",
            self.output_dim()
        );

        self.feedforward_into(input, scratch);

        let Scratch {
            zs,
            activations,
            deltas,
            target,
        } = scratch;
        target.set_one_hot(label);

        let last = self.transitions.len() - 1;
        self.head
            .delta_into(&zs[last], &activations[last], target, &mut deltas[last]);

        for idx in (0..self.transitions.len()).rev() {
            if idx < last {
                // delta_l = (W_{l+1}^T delta_{l+1}) ⊙ phi'(z_l)
                let (lower, upper) = deltas.split_at_mut(idx + 1);
                let delta = &mut lower[idx];
                self.transitions[idx + 1]
                    .weights()
                    .matvec_transposed_into(&upper[0], delta);
                if let Some(activation) = self.layers[idx + 1].activation() {
                    activation.scale_by_derivative(&zs[idx], delta);
                }
            }

            let a_in: &[f32] = if idx == 0 {
                input
            } else {
                &activations[idx - 1]
            };
            *nabla.biases_mut(idx) += &deltas[idx];
            nabla.weights_mut(idx).add_outer(&deltas[idx], a_in);
        }

        &deltas[0]
    }

    /// One gradient step, in place, on every transition:
    ///
    /// - `weight -= (nabla.weight + lambda * weight) * eta_piece`
    /// - `bias -= nabla.bias * eta_piece`
    ///
    /// `eta_piece` is the learning rate already divided by the minibatch size;
    /// `lambda` is the optional L2 coefficient.
    ///
    /// Callers must make sure no `backprop` is reading this network concurrently;
    /// `&mut self` enforces that.
    pub fn update_weights(&mut self, nabla: &Nabla, eta_piece: f32, lambda: Option<f32>) {
        assert!(
            nabla.matches(self),
            "nabla shape does not match network shape"
        );
        let lambda = lambda.unwrap_or(0.0);
        for (idx, t) in self.transitions.iter_mut().enumerate() {
            t.descend(nabla.weights(idx), nabla.biases(idx), eta_piece, lambda);
        }
    }

    /// Human-readable parameter dump: per layer its size, bias vector and weights.
    ///
    /// Not a reloadable format.
    pub fn write_report<W: io::Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{self}")
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "INPUT LAYER size {}", self.input_dim())?;
        for t in &self.transitions {
            writeln!(f, "LAYER size {}", t.out_dim())?;
            writeln!(f, "Biases: {}", t.biases())?;
            writeln!(f, "Weights:")?;
            writeln!(f, "{}", t.weights())?;
        }
        writeln!(f, "OUTPUT LAYER size {}", self.output_dim())
    }
}

fn validate_layers(layers: &[LayerSpec]) -> Result<OutputHead> {
    if layers.len() < 2 {
        return Err(Error::InvalidConfig(
            "network needs an input and an output layer".to_owned(),
        ));
    }
    for layer in layers {
        layer.validate()?;
    }

    let last = layers.len() - 1;
    for (idx, layer) in layers.iter().enumerate() {
        let expected = match idx {
            0 => LayerRole::Input,
            i if i == last => LayerRole::Output,
            _ => LayerRole::Hidden,
        };
        if layer.role() != expected {
            return Err(Error::InvalidConfig(format!(
                "layer {idx} has role {:?}, expected {expected:?}",
                layer.role()
            )));
        }
    }

    layers[last]
        .head()
        .ok_or_else(|| Error::InvalidConfig("output layer has no head".to_owned()))
}

impl Scratch {
    pub fn new(network: &Network) -> Self {
        let n = network.num_transitions();
        let mut zs = Vec::with_capacity(n);
        let mut activations = Vec::with_capacity(n);
        let mut deltas = Vec::with_capacity(n);
        for t in network.transitions() {
            zs.push(Vector::zeros(t.out_dim()));
            activations.push(Vector::zeros(t.out_dim()));
            deltas.push(Vector::zeros(t.out_dim()));
        }
        Self {
            zs,
            activations,
            deltas,
            target: Vector::zeros(network.output_dim()),
        }
    }

    /// Output activation of the most recent forward pass.
    #[inline]
    pub fn output(&self) -> &[f32] {
        &self.activations[self.activations.len() - 1]
    }

    fn assert_built_for(&self, network: &Network) {
        assert_eq!(
            self.zs.len(),
            network.num_transitions(),
            "scratch has {} layers, network has {} transitions",
            self.zs.len(),
            network.num_transitions()
        );
        for (idx, (z, t)) in self.zs.iter().zip(network.transitions()).enumerate() {
            assert_eq!(
                z.len(),
                t.out_dim(),
                "scratch layer {idx} len {} does not match transition out_dim {}",
                z.len(),
                t.out_dim()
            );
        }
    }
}
