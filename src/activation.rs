//! Activation functions.
//!
//! A transition computes a pre-activation `z = W a + b` and then applies its
//! activation element-wise: `a' = activation(z)`.
//!
//! Backprop needs `activation'(z)`, and every variant carries its exact analytic
//! derivative with respect to `z`. Custom activations must supply the function and its
//! derivative together.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
/// Element-wise activation function paired with its derivative.
pub enum Activation {
    #[default]
    Sigmoid,
    Tanh,
    /// `max(z, 0)`. The derivative at `z == 0` is taken to be `0`.
    ReLU,
    /// `z` for `z > 0`, `alpha * z` otherwise. The derivative at `z == 0` is `alpha`.
    LeakyReLU { alpha: f32 },
    Identity,
    /// A user-supplied function `f` and its exact derivative `df`.
    Custom {
        f: fn(f32) -> f32,
        df: fn(f32) -> f32,
    },
}

impl Activation {
    /// Validate activation parameters.
    pub fn validate(self) -> Result<()> {
        match self {
            Activation::LeakyReLU { alpha } => {
                if !(alpha.is_finite() && alpha >= 0.0) {
                    return Err(Error::InvalidConfig(format!(
                        "leaky ReLU alpha must be finite and >= 0, got {alpha}"
                    )));
                }
            }
            Activation::Sigmoid
            | Activation::Tanh
            | Activation::ReLU
            | Activation::Identity
            | Activation::Custom { .. } => {}
        }

        Ok(())
    }

    #[inline]
    pub fn forward(self, z: f32) -> f32 {
        match self {
            Activation::Sigmoid => sigmoid(z),
            Activation::Tanh => z.tanh(),
            Activation::ReLU => z.max(0.0),
            Activation::LeakyReLU { alpha } => {
                if z > 0.0 {
                    z
                } else {
                    alpha * z
                }
            }
            Activation::Identity => z,
            Activation::Custom { f, .. } => f(z),
        }
    }

    /// Derivative with respect to the pre-activation `z`.
    #[inline]
    pub fn derivative(self, z: f32) -> f32 {
        match self {
            Activation::Sigmoid => {
                let s = sigmoid(z);
                s * (1.0 - s)
            }
            Activation::Tanh => {
                let t = z.tanh();
                1.0 - t * t
            }
            Activation::ReLU => {
                if z > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyReLU { alpha } => {
                if z > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
            Activation::Identity => 1.0,
            Activation::Custom { df, .. } => df(z),
        }
    }

    /// `out[i] = activation(z[i])`.
    #[inline]
    pub fn forward_into(self, z: &[f32], out: &mut [f32]) {
        debug_assert_eq!(z.len(), out.len());
        for (o, &x) in out.iter_mut().zip(z) {
            *o = self.forward(x);
        }
    }

    /// `out[i] *= activation'(z[i])`.
    #[inline]
    pub fn scale_by_derivative(self, z: &[f32], out: &mut [f32]) {
        debug_assert_eq!(z.len(), out.len());
        for (o, &x) in out.iter_mut().zip(z) {
            *o *= self.derivative(x);
        }
    }
}

#[inline]
pub(crate) fn sigmoid(x: f32) -> f32 {
    // Numerically stable sigmoid.
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}
