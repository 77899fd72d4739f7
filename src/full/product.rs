use super::{op, FullMatrix};
use crate::{Side, Trans};
use equator::assert;
use faer::{
    linalg::matmul::{
        matmul,
        triangular::{self, BlockStructure},
    },
    ComplexField, Mat, MatRef, Parallelism,
};

impl<E: ComplexField> FullMatrix<E> {
    /// Computes `self = beta * self + alpha * op(a) * op(b)`.
    ///
    /// When `beta` is zero, the previous contents of `self` are never read.
    #[track_caller]
    pub fn gemm(
        &mut self,
        trans_a: Trans,
        a: MatRef<'_, E>,
        trans_b: Trans,
        b: MatRef<'_, E>,
        alpha: E,
        beta: E,
        parallelism: Parallelism,
    ) {
        let a = op(a, trans_a);
        let b = op(b, trans_b);
        assert!(all(
            a.nrows() == self.nrows(),
            b.ncols() == self.ncols(),
            a.ncols() == b.nrows(),
        ));

        let acc_scale = if beta == E::faer_zero() {
            None
        } else {
            Some(beta)
        };
        matmul(self.data.as_mut(), a, b, acc_scale, alpha, parallelism);
    }

    /// Computes `self -= m * diag(d) * n^T`, or `self -= m * n^T` when `d` is `None`.
    ///
    /// When `lower_only` is set, `self` must be square and only its lower triangle is updated.
    #[track_caller]
    pub fn mdnt_product(
        &mut self,
        m: MatRef<'_, E>,
        d: Option<&[E]>,
        n: MatRef<'_, E>,
        lower_only: bool,
        parallelism: Parallelism,
    ) {
        assert!(all(
            m.nrows() == self.nrows(),
            n.nrows() == self.ncols(),
            m.ncols() == n.ncols(),
        ));

        let scaled;
        let lhs = match d {
            Some(d) => {
                assert!(d.len() == m.ncols());
                let mut md = FullMatrix::new(m.to_owned());
                md.multiply_with_diag(d, Side::Right, false);
                scaled = md.data;
                scaled.as_ref()
            }
            None => m,
        };

        if lower_only {
            assert!(self.nrows() == self.ncols());
            triangular::matmul(
                self.data.as_mut(),
                BlockStructure::TriangularLower,
                lhs,
                BlockStructure::Rectangular,
                n.transpose(),
                BlockStructure::Rectangular,
                Some(E::faer_one()),
                E::faer_one().faer_neg(),
                parallelism,
            );
        } else {
            matmul(
                self.data.as_mut(),
                lhs,
                n.transpose(),
                Some(E::faer_one()),
                E::faer_one().faer_neg(),
                parallelism,
            );
        }
    }

    /// Computes `self -= m * diag(d) * m^T` on the lower triangle of `self`.
    #[inline]
    #[track_caller]
    pub fn mdmt_product(&mut self, m: MatRef<'_, E>, d: &[E], parallelism: Parallelism) {
        self.mdnt_product(m, Some(d), m, true, parallelism)
    }
}

/// Returns `op(a) * op(b)`.
pub(crate) fn dense_product<E: ComplexField>(
    trans_a: Trans,
    a: MatRef<'_, E>,
    trans_b: Trans,
    b: MatRef<'_, E>,
    parallelism: Parallelism,
) -> Mat<E> {
    let a = op(a, trans_a);
    let b = op(b, trans_b);
    let mut out = Mat::zeros(a.nrows(), b.ncols());
    matmul(out.as_mut(), a, b, None, E::faer_one(), parallelism);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::assert;
    use assert_approx_eq::assert_approx_eq;
    use rand::prelude::*;

    #[test]
    fn gemm_with_transposes() {
        let rng = &mut StdRng::seed_from_u64(0);
        let a = Mat::from_fn(4, 3, |_, _| rng.gen::<f64>());
        let b = Mat::from_fn(5, 4, |_, _| rng.gen::<f64>());
        let c0 = Mat::from_fn(3, 5, |_, _| rng.gen::<f64>());

        let mut c = FullMatrix::new(c0.clone());
        c.gemm(
            Trans::Yes,
            a.as_ref(),
            Trans::Yes,
            b.as_ref(),
            2.0,
            0.5,
            Parallelism::None,
        );
        for j in 0..5 {
            for i in 0..3 {
                let mut acc = 0.0;
                for k in 0..4 {
                    acc += a.read(k, i) * b.read(j, k);
                }
                assert_approx_eq!(c.as_ref().read(i, j), 0.5 * c0.read(i, j) + 2.0 * acc);
            }
        }
    }

    #[test]
    fn gemm_zero_beta_ignores_nan() {
        let a = Mat::<f64>::identity(2, 2);
        let mut c = FullMatrix::new(Mat::from_fn(2, 2, |_, _| f64::NAN));
        c.gemm(Trans::No, a.as_ref(), Trans::No, a.as_ref(), 1.0, 0.0, Parallelism::None);
        assert_eq!(c.as_ref().read(0, 0), 1.0);
        assert_eq!(c.as_ref().read(1, 0), 0.0);
    }

    #[test]
    fn mdmt_touches_lower_only() {
        let rng = &mut StdRng::seed_from_u64(1);
        let n = 5;
        let m = Mat::from_fn(n, 3, |_, _| rng.gen::<f64>());
        let d = [1.0, -2.0, 0.5];

        let mut c = FullMatrix::new(Mat::from_fn(n, n, |_, _| 7.0));
        c.mdmt_product(m.as_ref(), &d, Parallelism::None);
        for j in 0..n {
            for i in 0..n {
                if i < j {
                    assert_eq!(c.as_ref().read(i, j), 7.0);
                } else {
                    let mut acc = 0.0;
                    for k in 0..3 {
                        acc += m.read(i, k) * d[k] * m.read(j, k);
                    }
                    assert_approx_eq!(c.as_ref().read(i, j), 7.0 - acc);
                }
            }
        }
    }

    #[test]
    fn mdnt_without_diagonal() {
        let rng = &mut StdRng::seed_from_u64(2);
        let m = Mat::from_fn(3, 2, |_, _| rng.gen::<f64>());
        let n = Mat::from_fn(4, 2, |_, _| rng.gen::<f64>());
        let mut c = FullMatrix::zeros(3, 4);
        c.mdnt_product(m.as_ref(), None, n.as_ref(), false, Parallelism::None);
        for j in 0..4 {
            for i in 0..3 {
                let acc = m.read(i, 0) * n.read(j, 0) + m.read(i, 1) * n.read(j, 1);
                assert_approx_eq!(c.as_ref().read(i, j), -acc);
            }
        }
    }
}
