//! Strided GEMM kernel behind every dense product in the crate.
//!
//! Computes `C = alpha * A * B + beta * C` where `A` is `(m, k)`, `B` is `(k, n)`
//! and `C` is `(m, n)`, each addressed through explicit row/column strides.
//!
//! - default: a plain triple loop
//! - optional: the `matrixmultiply` backend (feature `matrixmultiply`)
//!
//! `beta == 0.0` means "overwrite": the previous contents of `C` are never read,
//! so stale NaNs in an output buffer cannot leak into the result.

#[allow(clippy::too_many_arguments)]
#[inline]
pub(crate) fn gemm_f32(
    m: usize,
    n: usize,
    k: usize,
    alpha: f32,
    a: &[f32],
    rsa: usize,
    csa: usize,
    b: &[f32],
    rsb: usize,
    csb: usize,
    beta: f32,
    c: &mut [f32],
    rsc: usize,
    csc: usize,
) {
    debug_assert!(m > 0 && n > 0 && k > 0);
    debug_assert!(a.len() > (m - 1) * rsa + (k - 1) * csa);
    debug_assert!(b.len() > (k - 1) * rsb + (n - 1) * csb);
    debug_assert!(c.len() > (m - 1) * rsc + (n - 1) * csc);

    #[cfg(feature = "matrixmultiply")]
    {
        // SAFETY: the debug assertions above describe the extents the kernel touches;
        // callers in this crate derive strides from the buffers they pass.
        unsafe {
            matrixmultiply::sgemm(
                m,
                k,
                n,
                alpha,
                a.as_ptr(),
                rsa as isize,
                csa as isize,
                b.as_ptr(),
                rsb as isize,
                csb as isize,
                beta,
                c.as_mut_ptr(),
                rsc as isize,
                csc as isize,
            );
        }
    }

    #[cfg(not(feature = "matrixmultiply"))]
    for i in 0..m {
        for j in 0..n {
            let mut acc = 0.0_f32;
            for p in 0..k {
                acc = a[i * rsa + p * csa].mul_add(b[p * rsb + j * csb], acc);
            }

            let idx = i * rsc + j * csc;
            c[idx] = if beta == 0.0 {
                alpha * acc
            } else {
                alpha * acc + beta * c[idx]
            };
        }
    }
}

/// `out = W x + beta * out` for a row-major `(rows, cols)` matrix `W`.
#[inline]
pub(crate) fn matvec(w: &[f32], rows: usize, cols: usize, x: &[f32], beta: f32, out: &mut [f32]) {
    gemm_f32(rows, 1, cols, 1.0, w, cols, 1, x, 1, 1, beta, out, 1, 1);
}

/// `out = W^T d + beta * out` for a row-major `(rows, cols)` matrix `W`.
#[inline]
pub(crate) fn matvec_transposed(
    w: &[f32],
    rows: usize,
    cols: usize,
    d: &[f32],
    beta: f32,
    out: &mut [f32],
) {
    gemm_f32(cols, 1, rows, 1.0, w, 1, cols, d, 1, 1, beta, out, 1, 1);
}

/// Rank-1 accumulation `W += a b^T` for a row-major `(a.len(), b.len())` matrix `W`.
#[inline]
pub(crate) fn add_outer(w: &mut [f32], a: &[f32], b: &[f32]) {
    let (rows, cols) = (a.len(), b.len());
    gemm_f32(rows, cols, 1, 1.0, a, 1, 1, b, 1, 1, 1.0, w, cols, 1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matvec_and_transpose_agree_with_hand_computation() {
        // W = [[1, 2, 3], [4, 5, 6]]
        let w = [1.0_f32, 2.0, 3.0, 4.0, 5.0, 6.0];

        let mut out = [f32::NAN; 2];
        matvec(&w, 2, 3, &[1.0, 0.0, -1.0], 0.0, &mut out);
        assert_eq!(out, [-2.0, -2.0]);

        let mut out_t = [0.0_f32; 3];
        matvec_transposed(&w, 2, 3, &[1.0, 1.0], 0.0, &mut out_t);
        assert_eq!(out_t, [5.0, 7.0, 9.0]);
    }

    #[test]
    fn add_outer_accumulates() {
        let mut w = [1.0_f32; 6];
        add_outer(&mut w, &[1.0, 2.0], &[1.0, 0.0, -1.0]);
        assert_eq!(w, [2.0, 1.0, 0.0, 3.0, 1.0, -1.0]);
    }
}
