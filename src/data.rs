//! Labelled example sets.
//!
//! An `Examples` value is an index-aligned pair of sequences: fixed-width input vectors
//! and integer class labels. Trainers only ever read it.

use crate::{Error, Network, Result, Vector};

#[derive(Debug, Clone, PartialEq)]
pub struct Examples {
    inputs: Vec<Vector>,
    labels: Vec<usize>,
}

impl Examples {
    /// Pair `inputs` with `labels`.
    ///
    /// Both sequences must have the same length and every input must have the same
    /// non-zero width.
    pub fn new(inputs: Vec<Vector>, labels: Vec<usize>) -> Result<Self> {
        if inputs.len() != labels.len() {
            return Err(Error::InvalidData(format!(
                "inputs/labels length mismatch: {} vs {}",
                inputs.len(),
                labels.len()
            )));
        }

        if let Some(first) = inputs.first() {
            let width = first.len();
            if width == 0 {
                return Err(Error::InvalidData("input width must be > 0".to_owned()));
            }
            for (i, x) in inputs.iter().enumerate() {
                if x.len() != width {
                    return Err(Error::InvalidData(format!(
                        "input row {i} has len {}, expected {width}",
                        x.len()
                    )));
                }
            }
        }

        Ok(Self { inputs, labels })
    }

    /// Convenience constructor from plain rows.
    pub fn from_rows(inputs: &[Vec<f32>], labels: &[usize]) -> Result<Self> {
        let inputs = inputs.iter().cloned().map(Vector::from_vec).collect();
        Self::new(inputs, labels.to_vec())
    }

    /// Check that this set can be fed to `network`: matching input width and every
    /// label below the number of output classes.
    pub fn check_against(&self, network: &Network) -> Result<()> {
        if let Some(width) = self.input_width()
            && width != network.input_dim()
        {
            return Err(Error::InvalidData(format!(
                "example width {width} does not match network input_dim {}",
                network.input_dim()
            )));
        }
        let classes = network.output_dim();
        if let Some((i, &label)) = self.labels.iter().enumerate().find(|(_, l)| **l >= classes) {
            return Err(Error::InvalidData(format!(
                "label {label} at row {i} is out of range for {classes} classes"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Width of each input, or `None` for an empty set.
    #[inline]
    pub fn input_width(&self) -> Option<usize> {
        self.inputs.first().map(|x| x.len())
    }

    #[inline]
    pub fn inputs(&self) -> &[Vector] {
        &self.inputs
    }

    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// The `idx`-th input.
    ///
    /// Panics if `idx >= len`.
    #[inline]
    pub fn input(&self, idx: usize) -> &[f32] {
        &self.inputs[idx]
    }

    /// The `idx`-th label.
    ///
    /// Panics if `idx >= len`.
    #[inline]
    pub fn label(&self, idx: usize) -> usize {
        self.labels[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vector, &usize)> {
        self.inputs.iter().zip(&self.labels)
    }
}
