//! Layer descriptors and the parameter block between two consecutive layers.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::{Activation, Error, Matrix, OutputHead, Result, Vector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    /// Pass-through; owns no parameters and applies no activation.
    Input,
    Hidden,
    /// Applies the network's output head.
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LayerKind {
    Input,
    Hidden(Activation),
    Output(OutputHead),
}

/// Width and role of one layer, together with what it applies to its pre-activation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerSpec {
    width: usize,
    kind: LayerKind,
}

impl LayerSpec {
    pub fn input(width: usize) -> Self {
        Self {
            width,
            kind: LayerKind::Input,
        }
    }

    pub fn hidden(width: usize, activation: Activation) -> Self {
        Self {
            width,
            kind: LayerKind::Hidden(activation),
        }
    }

    pub fn output(width: usize, head: OutputHead) -> Self {
        Self {
            width,
            kind: LayerKind::Output(head),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn role(&self) -> LayerRole {
        match self.kind {
            LayerKind::Input => LayerRole::Input,
            LayerKind::Hidden(_) => LayerRole::Hidden,
            LayerKind::Output(_) => LayerRole::Output,
        }
    }

    /// Element-wise activation, if this layer applies one.
    ///
    /// `None` for the input layer and for a softmax output head.
    pub fn activation(&self) -> Option<Activation> {
        match self.kind {
            LayerKind::Input => None,
            LayerKind::Hidden(activation) => Some(activation),
            LayerKind::Output(OutputHead::SquaredError { activation }) => Some(activation),
            LayerKind::Output(OutputHead::SoftmaxCrossEntropy) => None,
        }
    }

    /// Output head, for the output layer only.
    pub fn head(&self) -> Option<OutputHead> {
        match self.kind {
            LayerKind::Output(head) => Some(head),
            LayerKind::Input | LayerKind::Hidden(_) => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(Error::InvalidConfig("layer width must be > 0".to_owned()));
        }
        match self.kind {
            LayerKind::Input => Ok(()),
            LayerKind::Hidden(activation) => activation.validate(),
            LayerKind::Output(head) => head.validate(),
        }
    }

    /// Applies this layer's activation: `a = phi(z)`.
    ///
    /// Panics when called on the input layer.
    #[inline]
    pub(crate) fn activate_into(&self, z: &[f32], a: &mut [f32]) {
        match self.kind {
            LayerKind::Hidden(activation) => activation.forward_into(z, a),
            LayerKind::Output(head) => head.activate_into(z, a),
            LayerKind::Input => panic!("the input layer has no activation"),
        }
    }
}

/// Weights and biases feeding one non-input layer.
///
/// `weights` has shape `(out_dim, in_dim)`, so the pre-activation is `z = W a + b`.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    weights: Matrix,
    biases: Vector,
}

impl Transition {
    /// Allocate a transition with every parameter drawn from a standard normal.
    ///
    /// Biases are drawn first, then weights in row-major order.
    pub fn new_with_rng<R: Rng + ?Sized>(in_dim: usize, out_dim: usize, rng: &mut R) -> Result<Self> {
        if in_dim == 0 || out_dim == 0 {
            return Err(Error::InvalidConfig(format!(
                "transition dims must be > 0, got {in_dim} -> {out_dim}"
            )));
        }

        let biases = (0..out_dim)
            .map(|_| rng.sample::<f32, _>(StandardNormal))
            .collect();
        let weights = Matrix::from_fn(out_dim, in_dim, |_, _| rng.sample::<f32, _>(StandardNormal));
        Ok(Self { weights, biases })
    }

    /// Build a transition from explicit parameters.
    pub fn from_parts(weights: Matrix, biases: Vector) -> Result<Self> {
        if weights.rows() != biases.len() {
            return Err(Error::InvalidShape(format!(
                "weights have {} rows but biases have len {}",
                weights.rows(),
                biases.len()
            )));
        }
        Ok(Self { weights, biases })
    }

    #[inline]
    pub fn in_dim(&self) -> usize {
        self.weights.cols()
    }

    #[inline]
    pub fn out_dim(&self) -> usize {
        self.weights.rows()
    }

    #[inline]
    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    #[inline]
    pub fn biases(&self) -> &Vector {
        &self.biases
    }

    #[inline]
    pub fn weights_mut(&mut self) -> &mut Matrix {
        &mut self.weights
    }

    #[inline]
    pub fn biases_mut(&mut self) -> &mut Vector {
        &mut self.biases
    }

    /// `z = W a + b`.
    #[inline]
    pub(crate) fn pre_activation_into(&self, a: &[f32], z: &mut [f32]) {
        self.weights.affine_into(a, &self.biases, z);
    }

    /// Gradient step on this transition.
    ///
    /// `w -= eta_piece * (d_w + lambda * w)`, `b -= eta_piece * d_b`.
    pub(crate) fn descend(&mut self, d_weights: &Matrix, d_biases: &Vector, eta_piece: f32, lambda: f32) {
        assert_eq!(
            d_weights.shape(),
            self.weights.shape(),
            "gradient shape {:?} does not match weights shape {:?}",
            d_weights.shape(),
            self.weights.shape()
        );
        assert_eq!(
            d_biases.len(),
            self.biases.len(),
            "gradient len {} does not match biases len {}",
            d_biases.len(),
            self.biases.len()
        );

        for (w, &g) in self.weights.as_mut_slice().iter_mut().zip(d_weights.as_slice()) {
            *w -= (g + lambda * *w) * eta_piece;
        }
        for (b, &g) in self.biases.iter_mut().zip(d_biases.iter()) {
            *b -= g * eta_piece;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn roles_and_activations() {
        assert_eq!(LayerSpec::input(4).role(), LayerRole::Input);
        assert_eq!(LayerSpec::input(4).activation(), None);

        let hidden = LayerSpec::hidden(3, Activation::ReLU);
        assert_eq!(hidden.role(), LayerRole::Hidden);
        assert_eq!(hidden.activation(), Some(Activation::ReLU));
        assert_eq!(hidden.head(), None);

        let out = LayerSpec::output(2, OutputHead::SoftmaxCrossEntropy);
        assert_eq!(out.role(), LayerRole::Output);
        assert_eq!(out.head(), Some(OutputHead::SoftmaxCrossEntropy));
        assert_eq!(out.activation(), None);
    }

    #[test]
    fn zero_width_is_rejected() {
        assert!(LayerSpec::hidden(0, Activation::Sigmoid).validate().is_err());
        assert!(Transition::new_with_rng(0, 3, &mut StdRng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn seeded_init_is_deterministic_and_shaped() {
        let a = Transition::new_with_rng(3, 2, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = Transition::new_with_rng(3, 2, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.weights().shape(), (2, 3));
        assert_eq!(a.biases().len(), 2);
        assert_eq!((a.in_dim(), a.out_dim()), (3, 2));
    }

    #[test]
    fn descend_applies_weight_decay_to_weights_only() {
        let mut t = Transition::from_parts(
            Matrix::from_vec(1, 1, vec![2.0]).unwrap(),
            Vector::from_vec(vec![1.0]),
        )
        .unwrap();
        let dw = Matrix::from_vec(1, 1, vec![1.0]).unwrap();
        let db = Vector::from_vec(vec![1.0]);
        t.descend(&dw, &db, 0.5, 0.1);

        // 2 - (1 + 0.1 * 2) * 0.5 = 1.4
        assert!((t.weights().get(0, 0) - 1.4).abs() < 1e-6);
        // 1 - 1 * 0.5 = 0.5
        assert!((t.biases()[0] - 0.5).abs() < 1e-6);
    }
}
