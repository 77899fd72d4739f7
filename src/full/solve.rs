use super::FullMatrix;
use equator::assert;
use faer::{
    linalg::triangular_solve, perm::permute_rows, reborrow::*, ComplexField, MatMut, Parallelism,
};

impl<E: ComplexField> FullMatrix<E> {
    /// Solves `L * X = B` in place, where `L` is the lower triangle of `self`.
    ///
    /// If `self` holds an LU decomposition, the row permutation is applied to `B` first, so that
    /// this solves with the `P^T * L` factor.
    #[track_caller]
    pub fn solve_lower_triangular_left(
        &self,
        rhs: MatMut<'_, E>,
        unitriangular: bool,
        parallelism: Parallelism,
    ) {
        let mut rhs = rhs;
        assert!(all(self.nrows() == self.ncols(), rhs.nrows() == self.nrows()));

        if let Some(pivots) = &self.pivots {
            let copy = rhs.rb().to_owned();
            permute_rows(rhs.rb_mut(), copy.as_ref(), pivots.as_perm());
        }

        if unitriangular {
            triangular_solve::solve_unit_lower_triangular_in_place(
                self.data.as_ref(),
                rhs,
                parallelism,
            );
        } else {
            triangular_solve::solve_lower_triangular_in_place(self.data.as_ref(), rhs, parallelism);
        }
    }

    /// Solves `X * U = B` in place.
    ///
    /// `U` is the upper triangle of `self`, or the transpose of its lower triangle when
    /// `lower_stored` is set.
    #[track_caller]
    pub fn solve_upper_triangular_right(
        &self,
        rhs: MatMut<'_, E>,
        unitriangular: bool,
        lower_stored: bool,
        parallelism: Parallelism,
    ) {
        assert!(all(self.nrows() == self.ncols(), rhs.ncols() == self.nrows()));

        // X * U = B  <=>  U^T * X^T = B^T, with U^T lower triangular
        let tri = if lower_stored {
            self.data.as_ref()
        } else {
            self.data.transpose()
        };
        let rhs = rhs.transpose_mut();
        if unitriangular {
            triangular_solve::solve_unit_lower_triangular_in_place(tri, rhs, parallelism);
        } else {
            triangular_solve::solve_lower_triangular_in_place(tri, rhs, parallelism);
        }
    }

    /// Solves `U * X = B` in place.
    ///
    /// `U` is the upper triangle of `self`, or the transpose of its lower triangle when
    /// `lower_stored` is set.
    #[track_caller]
    pub fn solve_upper_triangular_left(
        &self,
        rhs: MatMut<'_, E>,
        unitriangular: bool,
        lower_stored: bool,
        parallelism: Parallelism,
    ) {
        assert!(all(self.nrows() == self.ncols(), rhs.nrows() == self.nrows()));

        let tri = if lower_stored {
            self.data.transpose()
        } else {
            self.data.as_ref()
        };
        if unitriangular {
            triangular_solve::solve_unit_upper_triangular_in_place(tri, rhs, parallelism);
        } else {
            triangular_solve::solve_upper_triangular_in_place(tri, rhs, parallelism);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::assert;
    use assert_approx_eq::assert_approx_eq;
    use faer::{linalg::matmul::matmul, Mat};
    use rand::prelude::*;

    fn lower(rng: &mut StdRng, n: usize) -> Mat<f64> {
        Mat::from_fn(n, n, |i, j| {
            if i == j {
                2.0 + rng.gen::<f64>()
            } else if i > j {
                rng.gen::<f64>()
            } else {
                0.0
            }
        })
    }

    #[test]
    fn lower_left() {
        let rng = &mut StdRng::seed_from_u64(0);
        for (n, k) in [(1, 1), (4, 3), (16, 5)] {
            let l = lower(rng, n);
            let b = Mat::from_fn(n, k, |_, _| rng.gen::<f64>());
            let mut x = b.clone();
            FullMatrix::new(l.clone()).solve_lower_triangular_left(
                x.as_mut(),
                false,
                Parallelism::None,
            );

            let mut lx = Mat::<f64>::zeros(n, k);
            matmul(lx.as_mut(), l.as_ref(), x.as_ref(), None, 1.0, Parallelism::None);
            for j in 0..k {
                for i in 0..n {
                    assert_approx_eq!(lx.read(i, j), b.read(i, j));
                }
            }
        }
    }

    #[test]
    fn upper_right_lower_stored() {
        let rng = &mut StdRng::seed_from_u64(1);
        let (n, m) = (7, 4);
        let l = lower(rng, n);
        let b = Mat::from_fn(m, n, |_, _| rng.gen::<f64>());

        for (unit, stored) in [(false, true), (false, false), (true, true), (true, false)] {
            let factor = if stored { l.clone() } else { l.transpose().to_owned() };
            let mut x = b.clone();
            FullMatrix::new(factor).solve_upper_triangular_right(
                x.as_mut(),
                unit,
                stored,
                Parallelism::None,
            );

            let u = Mat::from_fn(n, n, |i, j| {
                if i == j && unit {
                    1.0
                } else {
                    l.read(j, i)
                }
            });
            let mut xu = Mat::<f64>::zeros(m, n);
            matmul(xu.as_mut(), x.as_ref(), u.as_ref(), None, 1.0, Parallelism::None);
            for j in 0..n {
                for i in 0..m {
                    assert_approx_eq!(xu.read(i, j), b.read(i, j));
                }
            }
        }
    }

    #[test]
    fn upper_left_lower_stored() {
        let rng = &mut StdRng::seed_from_u64(2);
        let (n, k) = (6, 3);
        let l = lower(rng, n);
        let b = Mat::from_fn(n, k, |_, _| rng.gen::<f64>());
        let mut x = b.clone();
        FullMatrix::new(l.clone()).solve_upper_triangular_left(
            x.as_mut(),
            false,
            true,
            Parallelism::None,
        );
        let mut ltx = Mat::<f64>::zeros(n, k);
        matmul(ltx.as_mut(), l.transpose(), x.as_ref(), None, 1.0, Parallelism::None);
        for j in 0..k {
            for i in 0..n {
                assert_approx_eq!(ltx.read(i, j), b.read(i, j));
            }
        }
    }

    #[test]
    fn pivoted_lower_solve() {
        let rng = &mut StdRng::seed_from_u64(3);
        let n = 8;
        let a = Mat::from_fn(n, n, |_, _| rng.gen::<f64>());
        let b = Mat::from_fn(n, 2, |_, _| rng.gen::<f64>());
        let mut lu = FullMatrix::new(a.clone());
        lu.lu_decomposition(Parallelism::None).unwrap();

        let mut x = b.clone();
        lu.solve_lower_triangular_left(x.as_mut(), true, Parallelism::None);
        lu.solve_upper_triangular_left(x.as_mut(), false, false, Parallelism::None);

        let mut ax = Mat::<f64>::zeros(n, 2);
        matmul(ax.as_mut(), a.as_ref(), x.as_ref(), None, 1.0, Parallelism::None);
        for j in 0..2 {
            for i in 0..n {
                assert_approx_eq!(ax.read(i, j), b.read(i, j));
            }
        }
    }
}
