//! Dense vector and matrix primitives.
//!
//! Both types own a flat `Vec<f32>`; matrices are row-major. Dimensions are runtime
//! values, so every binary operation asserts matching shapes and panics on
//! mismatch. Shapes are fixed once a network is built, so a mismatch is a wiring bug
//! and is caught on the first call that sees it.
//!
//! There is no NaN/Inf guarding anywhere: arithmetic is total and non-finite values
//! propagate.
//!
//! Operators are implemented on references (`&a + &b`) and allocate a result. The
//! `*_into` / `*_assign` methods write into existing buffers and are what the
//! training hot path uses.

use std::fmt;
use std::ops::{Add, AddAssign, Deref, DerefMut, Mul, Sub, SubAssign};

use crate::matmul;
use crate::{Error, Result};

/// A fixed-length column vector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Vector {
    data: Vec<f32>,
}

impl Vector {
    #[inline]
    pub fn zeros(len: usize) -> Self {
        Self {
            data: vec![0.0; len],
        }
    }

    #[inline]
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self { data }
    }

    /// One-hot encoding of `index` in a vector of length `len`.
    ///
    /// Panics if `index >= len`.
    pub fn one_hot(len: usize, index: usize) -> Self {
        let mut v = Self::zeros(len);
        v.set_one_hot(index);
        v
    }

    /// Overwrites `self` with the one-hot encoding of `index`.
    #[inline]
    pub fn set_one_hot(&mut self, index: usize) {
        assert!(
            index < self.data.len(),
            "one-hot index {index} out of range for length {}",
            self.data.len()
        );
        self.data.fill(0.0);
        self.data[index] = 1.0;
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Index of the largest entry. Ties resolve to the lowest index.
    ///
    /// Panics on an empty vector.
    pub fn argmax(&self) -> usize {
        argmax(&self.data)
    }

    /// Element-wise map.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        self.data.iter().map(|&x| f(x)).collect()
    }

    /// Element-wise (Hadamard) product.
    pub fn hadamard(&self, other: &Vector) -> Self {
        assert_same_len(self, other);
        self.data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| a * b)
            .collect()
    }

    pub fn dot(&self, other: &Vector) -> f32 {
        assert_same_len(self, other);
        self.data
            .iter()
            .zip(&other.data)
            .fold(0.0, |acc, (&a, &b)| a.mul_add(b, acc))
    }
}

/// Index of the largest entry of `xs`; ties resolve to the lowest index.
pub fn argmax(xs: &[f32]) -> usize {
    assert!(!xs.is_empty(), "argmax of an empty vector");
    let mut best = 0;
    for (i, &x) in xs.iter().enumerate().skip(1) {
        if x > xs[best] {
            best = i;
        }
    }
    best
}

#[inline]
fn assert_same_len(a: &Vector, b: &Vector) {
    assert_eq!(
        a.len(),
        b.len(),
        "vector len {} does not match len {}",
        a.len(),
        b.len()
    );
}

impl Deref for Vector {
    type Target = [f32];

    #[inline]
    fn deref(&self) -> &[f32] {
        &self.data
    }
}

impl DerefMut for Vector {
    #[inline]
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl From<Vec<f32>> for Vector {
    fn from(data: Vec<f32>) -> Self {
        Self { data }
    }
}

impl FromIterator<f32> for Vector {
    fn from_iter<I: IntoIterator<Item = f32>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}

impl Add for &Vector {
    type Output = Vector;

    fn add(self, rhs: &Vector) -> Vector {
        assert_same_len(self, rhs);
        self.data.iter().zip(&rhs.data).map(|(a, b)| a + b).collect()
    }
}

impl Sub for &Vector {
    type Output = Vector;

    fn sub(self, rhs: &Vector) -> Vector {
        assert_same_len(self, rhs);
        self.data.iter().zip(&rhs.data).map(|(a, b)| a - b).collect()
    }
}

impl Mul<f32> for &Vector {
    type Output = Vector;

    fn mul(self, rhs: f32) -> Vector {
        self.map(|x| x * rhs)
    }
}

impl AddAssign<&Vector> for Vector {
    fn add_assign(&mut self, rhs: &Vector) {
        assert_same_len(self, rhs);
        for (a, &b) in self.data.iter_mut().zip(&rhs.data) {
            *a += b;
        }
    }
}

impl SubAssign<&Vector> for Vector {
    fn sub_assign(&mut self, rhs: &Vector) {
        assert_same_len(self, rhs);
        for (a, &b) in self.data.iter_mut().zip(&rhs.data) {
            *a -= b;
        }
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, x) in self.data.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{x}")?;
        }
        write!(f, "]")
    }
}

/// A dense row-major matrix with shape `(rows, cols)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    #[inline]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build a matrix from a row-major buffer.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidShape(format!(
                "buffer length {} does not match {rows} x {cols}",
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |r, c| if r == c { 1.0 } else { 0.0 })
    }

    /// Outer product `a b^T`, shape `(a.len(), b.len())`.
    pub fn outer(a: &[f32], b: &[f32]) -> Self {
        let mut m = Self::zeros(a.len(), b.len());
        m.add_outer(a, b);
        m
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn get(&self, r: usize, c: usize) -> f32 {
        self.data[r * self.cols + c]
    }

    #[inline]
    pub fn row(&self, r: usize) -> &[f32] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    /// Matrix-vector product `W x`.
    pub fn matvec(&self, x: &[f32]) -> Vector {
        let mut out = Vector::zeros(self.rows);
        self.matvec_into(x, &mut out);
        out
    }

    /// `out = W x`.
    pub fn matvec_into(&self, x: &[f32], out: &mut [f32]) {
        self.assert_matvec_shapes(x.len(), out.len());
        if self.data.is_empty() {
            out.fill(0.0);
            return;
        }
        matmul::matvec(&self.data, self.rows, self.cols, x, 0.0, out);
    }

    /// `out = W x + bias`.
    pub fn affine_into(&self, x: &[f32], bias: &[f32], out: &mut [f32]) {
        self.assert_matvec_shapes(x.len(), out.len());
        assert_eq!(
            bias.len(),
            self.rows,
            "bias len {} does not match matrix rows {}",
            bias.len(),
            self.rows
        );
        out.copy_from_slice(bias);
        if self.data.is_empty() {
            return;
        }
        matmul::matvec(&self.data, self.rows, self.cols, x, 1.0, out);
    }

    /// Transposed product `W^T d`, used to push deltas backwards.
    pub fn matvec_transposed(&self, d: &[f32]) -> Vector {
        let mut out = Vector::zeros(self.cols);
        self.matvec_transposed_into(d, &mut out);
        out
    }

    /// `out = W^T d`.
    pub fn matvec_transposed_into(&self, d: &[f32], out: &mut [f32]) {
        assert_eq!(
            d.len(),
            self.rows,
            "vector len {} does not match matrix rows {}",
            d.len(),
            self.rows
        );
        assert_eq!(
            out.len(),
            self.cols,
            "output len {} does not match matrix cols {}",
            out.len(),
            self.cols
        );
        if self.data.is_empty() {
            out.fill(0.0);
            return;
        }
        matmul::matvec_transposed(&self.data, self.rows, self.cols, d, 0.0, out);
    }

    /// `self += a b^T`.
    pub fn add_outer(&mut self, a: &[f32], b: &[f32]) {
        assert_eq!(
            (a.len(), b.len()),
            (self.rows, self.cols),
            "outer product shape ({}, {}) does not match matrix shape ({}, {})",
            a.len(),
            b.len(),
            self.rows,
            self.cols
        );
        if self.data.is_empty() {
            return;
        }
        matmul::add_outer(&mut self.data, a, b);
    }

    pub fn map(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    pub fn hadamard(&self, other: &Matrix) -> Self {
        self.zip_with(other, |a, b| a * b)
    }

    fn zip_with(&self, other: &Matrix, f: impl Fn(f32, f32) -> f32) -> Self {
        self.assert_same_shape(other);
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        }
    }

    #[inline]
    fn assert_same_shape(&self, other: &Matrix) {
        assert_eq!(
            self.shape(),
            other.shape(),
            "matrix shape {:?} does not match {:?}",
            self.shape(),
            other.shape()
        );
    }

    #[inline]
    fn assert_matvec_shapes(&self, x_len: usize, out_len: usize) {
        assert_eq!(
            x_len, self.cols,
            "vector len {x_len} does not match matrix cols {}",
            self.cols
        );
        assert_eq!(
            out_len, self.rows,
            "output len {out_len} does not match matrix rows {}",
            self.rows
        );
    }
}

impl Add for &Matrix {
    type Output = Matrix;

    fn add(self, rhs: &Matrix) -> Matrix {
        self.zip_with(rhs, |a, b| a + b)
    }
}

impl Sub for &Matrix {
    type Output = Matrix;

    fn sub(self, rhs: &Matrix) -> Matrix {
        self.zip_with(rhs, |a, b| a - b)
    }
}

impl Mul<f32> for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: f32) -> Matrix {
        self.map(|x| x * rhs)
    }
}

impl AddAssign<&Matrix> for Matrix {
    fn add_assign(&mut self, rhs: &Matrix) {
        self.assert_same_shape(rhs);
        for (a, &b) in self.data.iter_mut().zip(&rhs.data) {
            *a += b;
        }
    }
}

impl SubAssign<&Matrix> for Matrix {
    fn sub_assign(&mut self, rhs: &Matrix) {
        self.assert_same_shape(rhs);
        for (a, &b) in self.data.iter_mut().zip(&rhs.data) {
            *a -= b;
        }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in 0..self.rows {
            write!(f, "[")?;
            for (c, x) in self.row(r).iter().enumerate() {
                if c > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{x}")?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}
