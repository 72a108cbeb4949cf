//! Output heads: the output activation bundled with its loss gradient.
//!
//! The output-layer error term depends on both the output activation and the loss.
//! `OutputHead` keeps the two together, so swapping the activation without also
//! swapping the gradient formula is not expressible.
//!
//! - `SquaredError { activation }`: `L = 0.5 * ||a - y||^2`,
//!   `delta_L = (a - y) ⊙ activation'(z)`
//! - `SoftmaxCrossEntropy`: `a = softmax(z)`, `L = -sum(y * ln a)`,
//!   `delta_L = a - y`

use crate::{Activation, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputHead {
    /// Element-wise activation with squared-error loss.
    SquaredError { activation: Activation },
    /// Softmax output with cross-entropy loss.
    SoftmaxCrossEntropy,
}

impl Default for OutputHead {
    fn default() -> Self {
        OutputHead::SquaredError {
            activation: Activation::Sigmoid,
        }
    }
}

impl OutputHead {
    pub fn validate(self) -> Result<()> {
        match self {
            OutputHead::SquaredError { activation } => activation.validate(),
            OutputHead::SoftmaxCrossEntropy => Ok(()),
        }
    }

    /// Output activation: `out = head(z)`.
    #[inline]
    pub fn activate_into(self, z: &[f32], out: &mut [f32]) {
        match self {
            OutputHead::SquaredError { activation } => activation.forward_into(z, out),
            OutputHead::SoftmaxCrossEntropy => softmax_into(z, out),
        }
    }

    /// Output-layer error term `dL/dz` for one example.
    ///
    /// `z` and `a` are the output layer's pre-activation and activation from the
    /// same forward pass; `target` is the one-hot label.
    #[inline]
    pub fn delta_into(self, z: &[f32], a: &[f32], target: &[f32], delta: &mut [f32]) {
        assert_eq!(
            a.len(),
            target.len(),
            "output len {} does not match target len {}",
            a.len(),
            target.len()
        );
        debug_assert_eq!(z.len(), a.len());
        debug_assert_eq!(delta.len(), a.len());

        for ((d, &ai), &ti) in delta.iter_mut().zip(a).zip(target) {
            *d = ai - ti;
        }
        if let OutputHead::SquaredError { activation } = self {
            activation.scale_by_derivative(z, delta);
        }
    }

    /// Loss of output activation `a` against `target`.
    pub fn loss(self, a: &[f32], target: &[f32]) -> f32 {
        assert_eq!(
            a.len(),
            target.len(),
            "output len {} does not match target len {}",
            a.len(),
            target.len()
        );
        match self {
            OutputHead::SquaredError { .. } => {
                let mut sum_sq = 0.0_f32;
                for (&ai, &ti) in a.iter().zip(target) {
                    let diff = ai - ti;
                    sum_sq = diff.mul_add(diff, sum_sq);
                }
                0.5 * sum_sq
            }
            OutputHead::SoftmaxCrossEntropy => {
                let mut sum = 0.0_f32;
                for (&ai, &ti) in a.iter().zip(target) {
                    if ti != 0.0 {
                        sum -= ti * ai.max(f32::MIN_POSITIVE).ln();
                    }
                }
                sum
            }
        }
    }
}

fn softmax_into(z: &[f32], out: &mut [f32]) {
    debug_assert_eq!(z.len(), out.len());
    let max_z = z.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let mut sum = 0.0_f32;
    for (o, &x) in out.iter_mut().zip(z) {
        *o = (x - max_z).exp();
        sum += *o;
    }
    let inv = 1.0 / sum;
    for o in out.iter_mut() {
        *o *= inv;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squared_error_delta_scales_by_activation_derivative() {
        let head = OutputHead::default();
        let z = [0.0_f32, 0.0];
        let mut a = [0.0_f32; 2];
        head.activate_into(&z, &mut a);
        assert_eq!(a, [0.5, 0.5]);

        let mut delta = [0.0_f32; 2];
        head.delta_into(&z, &a, &[1.0, 0.0], &mut delta);
        // (0.5 - 1) * 0.25, (0.5 - 0) * 0.25
        assert!((delta[0] + 0.125).abs() < 1e-6);
        assert!((delta[1] - 0.125).abs() < 1e-6);

        assert!((head.loss(&a, &[1.0, 0.0]) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn softmax_head_outputs_a_distribution() {
        let head = OutputHead::SoftmaxCrossEntropy;
        let z = [1.0_f32, 2.0, 3.0];
        let mut a = [0.0_f32; 3];
        head.activate_into(&z, &mut a);
        let total: f32 = a.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(a[2] > a[1] && a[1] > a[0]);

        let mut delta = [0.0_f32; 3];
        head.delta_into(&z, &a, &[0.0, 0.0, 1.0], &mut delta);
        assert!((delta[2] - (a[2] - 1.0)).abs() < 1e-6);
        assert!((delta[0] - a[0]).abs() < 1e-6);
    }

    #[test]
    fn cross_entropy_prefers_correct_class() {
        let head = OutputHead::SoftmaxCrossEntropy;
        let target = [1.0_f32, 0.0, 0.0];
        let good = [0.9_f32, 0.05, 0.05];
        let bad = [0.05_f32, 0.05, 0.9];
        assert!(head.loss(&good, &target) < head.loss(&bad, &target));
    }

    #[test]
    fn head_validation_forwards_to_activation() {
        let bad = OutputHead::SquaredError {
            activation: Activation::LeakyReLU { alpha: -1.0 },
        };
        assert!(bad.validate().is_err());
        assert!(OutputHead::SoftmaxCrossEntropy.validate().is_ok());
    }
}
