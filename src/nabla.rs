//! Gradient accumulator.
//!
//! A `Nabla` mirrors the parameter shape of a [`Network`]: one weight matrix and one
//! bias vector per transition. `Network::backprop` adds into a caller-owned `Nabla`
//! and never into network state, so independent call sites (one per worker) can
//! accumulate concurrently against the same `&Network`.
//!
//! Accumulators form a commutative monoid under [`Nabla::merge`] with
//! [`Nabla::zeros_like`] as identity. The gradient of a summed loss equals the sum of
//! per-example gradients, so partial accumulators over disjoint example sets merge by
//! plain addition into the gradient of their union.

use std::ops::{Add, AddAssign};

use crate::{Matrix, Network, Vector};

#[derive(Debug, Clone, PartialEq)]
pub struct Nabla {
    weights: Vec<Matrix>,
    biases: Vec<Vector>,
}

impl Nabla {
    /// An all-zero accumulator shaped like `network`.
    pub fn zeros_like(network: &Network) -> Self {
        let mut weights = Vec::with_capacity(network.num_transitions());
        let mut biases = Vec::with_capacity(network.num_transitions());
        for t in network.transitions() {
            weights.push(Matrix::zeros(t.out_dim(), t.in_dim()));
            biases.push(Vector::zeros(t.out_dim()));
        }
        Self { weights, biases }
    }

    #[inline]
    pub fn num_transitions(&self) -> usize {
        self.weights.len()
    }

    #[inline]
    pub fn weights(&self, idx: usize) -> &Matrix {
        &self.weights[idx]
    }

    #[inline]
    pub fn biases(&self, idx: usize) -> &Vector {
        &self.biases[idx]
    }

    #[inline]
    pub(crate) fn weights_mut(&mut self, idx: usize) -> &mut Matrix {
        &mut self.weights[idx]
    }

    #[inline]
    pub(crate) fn biases_mut(&mut self, idx: usize) -> &mut Vector {
        &mut self.biases[idx]
    }

    /// True if this accumulator has exactly the parameter shape of `network`.
    pub fn matches(&self, network: &Network) -> bool {
        self.weights.len() == network.num_transitions()
            && network
                .transitions()
                .iter()
                .zip(&self.weights)
                .zip(&self.biases)
                .all(|((t, w), b)| w.shape() == t.weights().shape() && b.len() == t.out_dim())
    }

    /// Reset every entry to zero, keeping the allocation.
    pub fn zero(&mut self) {
        for w in &mut self.weights {
            w.fill(0.0);
        }
        for b in &mut self.biases {
            b.fill(0.0);
        }
    }

    /// `self += other`, element-wise.
    ///
    /// Panics if the two accumulators were built for different shapes.
    pub fn merge(&mut self, other: &Nabla) {
        assert_eq!(
            self.weights.len(),
            other.weights.len(),
            "nabla has {} transitions, other has {}",
            self.weights.len(),
            other.weights.len()
        );
        for (a, b) in self.weights.iter_mut().zip(&other.weights) {
            *a += b;
        }
        for (a, b) in self.biases.iter_mut().zip(&other.biases) {
            *a += b;
        }
    }

    /// Iterator over `(weights, biases)` per transition.
    pub fn iter(&self) -> impl Iterator<Item = (&Matrix, &Vector)> {
        self.weights.iter().zip(&self.biases)
    }
}

impl AddAssign<&Nabla> for Nabla {
    fn add_assign(&mut self, rhs: &Nabla) {
        self.merge(rhs);
    }
}

impl Add for &Nabla {
    type Output = Nabla;

    fn add(self, rhs: &Nabla) -> Nabla {
        let mut out = self.clone();
        out.merge(rhs);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_nabla_close(a: &Nabla, b: &Nabla, tol: f32) {
        assert_eq!(a.num_transitions(), b.num_transitions());
        for ((wa, ba), (wb, bb)) in a.iter().zip(b.iter()) {
            for (x, y) in wa.as_slice().iter().zip(wb.as_slice()) {
                assert!((x - y).abs() <= tol, "{x} vs {y}");
            }
            for (x, y) in ba.iter().zip(bb.iter()) {
                assert!((x - y).abs() <= tol, "{x} vs {y}");
            }
        }
    }

    fn example_nabla(network: &Network, x: &[f32], label: usize) -> Nabla {
        let mut nabla = Nabla::zeros_like(network);
        network.backprop(&mut nabla, x, label);
        nabla
    }

    #[test]
    fn zeros_like_matches_network_shape() {
        let network = Network::new_with_seed(&[4, 3, 2], 1).unwrap();
        let nabla = Nabla::zeros_like(&network);
        assert!(nabla.matches(&network));
        assert_eq!(nabla.weights(0).shape(), (3, 4));
        assert_eq!(nabla.weights(1).shape(), (2, 3));
        assert!(nabla.weights(0).as_slice().iter().all(|&x| x == 0.0));

        let other = Network::new_with_seed(&[4, 5, 2], 1).unwrap();
        assert!(!nabla.matches(&other));
    }

    #[test]
    fn merge_is_a_commutative_monoid() {
        let network = Network::new_with_seed(&[3, 4, 2], 9).unwrap();
        let a = example_nabla(&network, &[0.1, 0.2, 0.3], 0);
        let b = example_nabla(&network, &[0.9, -0.5, 0.0], 1);
        let c = example_nabla(&network, &[-0.4, 0.4, 0.8], 1);
        let zero = Nabla::zeros_like(&network);

        assert_eq!(&a + &zero, a);
        assert_eq!(&zero + &a, a);
        assert_eq!(&a + &b, &b + &a);
        assert_nabla_close(&(&(&a + &b) + &c), &(&a + &(&b + &c)), 1e-6);
    }

    #[test]
    fn per_example_sum_equals_single_accumulation_in_any_order() {
        let network = Network::new_with_seed(&[3, 4, 2], 3).unwrap();
        let xs = [[0.1_f32, 0.2, 0.3], [0.9, -0.5, 0.0], [-0.4, 0.4, 0.8], [0.0, 0.0, 1.0]];
        let ys = [0_usize, 1, 1, 0];

        let mut summed = Nabla::zeros_like(&network);
        for (x, &y) in xs.iter().zip(&ys) {
            summed += &example_nabla(&network, x, y);
        }

        let mut accumulated = Nabla::zeros_like(&network);
        for (x, &y) in xs.iter().zip(&ys).rev() {
            network.backprop(&mut accumulated, x, y);
        }

        assert_nabla_close(&summed, &accumulated, 1e-5);
    }

    #[test]
    fn zero_clears_accumulated_values() {
        let network = Network::new_with_seed(&[2, 2], 0).unwrap();
        let mut nabla = example_nabla(&network, &[1.0, -1.0], 1);
        nabla.zero();
        assert_eq!(nabla, Nabla::zeros_like(&network));
    }
}
