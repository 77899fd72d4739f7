//! Factorize once, solve many times.

use crate::{
    recursion::{
        inverse_in_place, ldlt_in_place, llt_in_place, lu_in_place,
        product::{gemm, multiply_with_diag},
        solve::{solve_lower_triangular_left, solve_upper_triangular_left},
    },
    Factorization, HMatError, HMatSettings, HMatrix, Side, Trans,
};
use faer::{reborrow::*, ComplexField, Mat, MatMut, MatRef, Parallelism};

/// Hierarchical matrix holding one of the factorizations of [`Factorization`], ready to solve
/// linear systems.
#[derive(Clone, Debug)]
pub struct FactorizedHMatrix<E: ComplexField> {
    tree: HMatrix<E>,
    kind: Factorization,
    diagonal: Option<Vec<E>>,
}

impl<E: ComplexField> HMatrix<E> {
    /// Consumes the matrix and factorizes it in place.
    ///
    /// # Errors
    /// - [`HMatError::DimensionMismatch`] if the matrix is not square.
    /// - The error of the underlying decomposition, see [`crate::recursion`]. The partially
    /// factorized tree is dropped.
    pub fn factorize(
        mut self,
        kind: Factorization,
        parallelism: Parallelism,
    ) -> Result<FactorizedHMatrix<E>, HMatError> {
        let (nrows, ncols) = (self.nrows(), self.ncols());
        if nrows != ncols {
            return Err(HMatError::DimensionMismatch {
                expected: (nrows, nrows),
                found: (nrows, ncols),
            });
        }

        log::debug!(
            target: "faer_hmat",
            "factorize: {kind:?} of a {nrows}x{ncols} matrix, {} leaves, {} null blocks, depth {}",
            self.leaf_count(),
            self.null_count(),
            self.depth(),
        );

        match kind {
            Factorization::Lu => lu_in_place(&mut self, parallelism)?,
            Factorization::Ldlt => ldlt_in_place(&mut self, parallelism)?,
            Factorization::Llt => llt_in_place(&mut self, parallelism)?,
            Factorization::Inverse => inverse_in_place(&mut self, parallelism)?,
        }

        let diagonal = match kind {
            Factorization::Ldlt => Some(self.diagonal_factor()),
            _ => None,
        };
        Ok(FactorizedHMatrix {
            tree: self,
            kind,
            diagonal,
        })
    }

    /// Factorizes with the factorization and parallelism given by `settings`.
    ///
    /// # Errors
    /// See [`Self::factorize`].
    #[inline]
    pub fn factorize_with(self, settings: &HMatSettings) -> Result<FactorizedHMatrix<E>, HMatError> {
        self.factorize(settings.factorization, settings.parallelism)
    }
}

impl<E: ComplexField> FactorizedHMatrix<E> {
    /// Returns the factorization held by `self`.
    #[inline]
    pub fn factorization(&self) -> Factorization {
        self.kind
    }

    /// Returns the factorized tree.
    #[inline]
    pub fn tree(&self) -> &HMatrix<E> {
        &self.tree
    }

    /// Consumes `self` and returns the factorized tree.
    #[inline]
    pub fn into_tree(self) -> HMatrix<E> {
        self.tree
    }

    /// Returns the dimension of the factorized matrix.
    #[inline]
    pub fn dim(&self) -> usize {
        self.tree.nrows()
    }

    /// Overwrites `rhs` with the solution `X` of `A * X = rhs`.
    ///
    /// # Errors
    /// Returns [`HMatError::DimensionMismatch`] if `rhs` does not have as many rows as `A`.
    pub fn solve_in_place(
        &self,
        rhs: MatMut<'_, E>,
        parallelism: Parallelism,
    ) -> Result<(), HMatError> {
        let mut rhs = rhs;
        let n = self.dim();
        if rhs.nrows() != n {
            return Err(HMatError::DimensionMismatch {
                expected: (n, rhs.ncols()),
                found: (rhs.nrows(), rhs.ncols()),
            });
        }
        if rhs.ncols() == 0 {
            return Ok(());
        }

        let tree = &self.tree;
        let mut x = HMatrix::leaf(rhs.rb().to_owned());
        match self.kind {
            Factorization::Lu => {
                solve_lower_triangular_left(tree, &mut x, true, parallelism);
                solve_upper_triangular_left(tree, &mut x, false, false, parallelism);
            }
            Factorization::Ldlt => {
                solve_lower_triangular_left(tree, &mut x, true, parallelism);
                if let Some(d) = &self.diagonal {
                    multiply_with_diag(&mut x, d, Side::Left, true);
                }
                solve_upper_triangular_left(tree, &mut x, true, true, parallelism);
            }
            Factorization::Llt => {
                solve_lower_triangular_left(tree, &mut x, false, parallelism);
                solve_upper_triangular_left(tree, &mut x, false, true, parallelism);
            }
            Factorization::Inverse => {
                let b = x.clone();
                gemm(
                    &mut x,
                    Trans::No,
                    tree,
                    Trans::No,
                    &b,
                    E::faer_one(),
                    E::faer_zero(),
                    parallelism,
                );
            }
        }
        x.write_dense(rhs.rb_mut());
        Ok(())
    }

    /// Returns the solution `X` of `A * X = rhs`.
    ///
    /// # Errors
    /// See [`Self::solve_in_place`].
    pub fn solve(&self, rhs: MatRef<'_, E>, parallelism: Parallelism) -> Result<Mat<E>, HMatError> {
        let mut x = rhs.to_owned();
        self.solve_in_place(x.as_mut(), parallelism)?;
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recursion::test_utils::*;
    use faer::linalg::matmul::matmul;
    use rand::prelude::*;

    fn residual_is_small(a: &Mat<f64>, x: &Mat<f64>, b: &Mat<f64>, tol: f64) {
        let mut ax = Mat::<f64>::zeros(b.nrows(), b.ncols());
        matmul(ax.as_mut(), a.as_ref(), x.as_ref(), None, 1.0, Parallelism::None);
        assert_close(ax.as_ref(), b.as_ref(), tol);
    }

    #[test]
    fn eight_by_eight_three_levels_lu() {
        let rng = &mut StdRng::seed_from_u64(0);
        let n = 8;
        let a = diagonally_dominant(rng, n);
        let identity = Mat::<f64>::identity(n, n);

        let deep = HMatrix::from_dense_uniform(a.as_ref(), 2);
        assert_eq!(deep.leaf_count(), 16);
        let flat = HMatrix::leaf(a.clone());

        let deep = deep.factorize(Factorization::Lu, Parallelism::Rayon(0)).unwrap();
        let flat = flat.factorize(Factorization::Lu, Parallelism::None).unwrap();
        let deep_inv = deep.solve(identity.as_ref(), Parallelism::Rayon(0)).unwrap();
        let flat_inv = flat.solve(identity.as_ref(), Parallelism::None).unwrap();
        assert_close(deep_inv.as_ref(), flat_inv.as_ref(), 1e-9);
        residual_is_small(&a, &deep_inv, &identity, 1e-9);
    }

    #[test]
    fn every_factorization_solves() {
        let rng = &mut StdRng::seed_from_u64(1);
        let n = 11;
        let a = spd(rng, n);
        let b = Mat::from_fn(n, 3, |_, _| rng.gen::<f64>());

        for kind in [
            Factorization::Lu,
            Factorization::Ldlt,
            Factorization::Llt,
            Factorization::Inverse,
        ] {
            for leaf_size in [1, 3, n] {
                let h = HMatrix::from_dense_uniform(a.as_ref(), leaf_size);
                let factors = h.factorize(kind, Parallelism::Rayon(0)).unwrap();
                assert_eq!(factors.factorization(), kind);

                let mut x = b.clone();
                factors.solve_in_place(x.as_mut(), Parallelism::Rayon(0)).unwrap();
                residual_is_small(&a, &x, &b, 1e-9);
            }
        }
    }

    #[test]
    fn rejects_mismatched_rhs() {
        let a = Mat::<f64>::identity(4, 4);
        let factors = HMatrix::from_dense_uniform(a.as_ref(), 2)
            .factorize(Factorization::Lu, Parallelism::None)
            .unwrap();
        let mut rhs = Mat::<f64>::zeros(3, 2);
        assert_eq!(
            factors.solve_in_place(rhs.as_mut(), Parallelism::None),
            Err(HMatError::DimensionMismatch {
                expected: (4, 2),
                found: (3, 2),
            })
        );
    }

    #[test]
    fn rejects_rectangular_matrix() {
        let a = Mat::<f64>::zeros(4, 3);
        let err = HMatrix::leaf(a)
            .factorize(Factorization::Lu, Parallelism::None)
            .unwrap_err();
        assert_eq!(
            err,
            HMatError::DimensionMismatch {
                expected: (4, 4),
                found: (4, 3),
            }
        );
    }

    #[test]
    fn into_tree_returns_factors() {
        let a = Mat::<f64>::identity(4, 4);
        let factors = HMatrix::from_dense_uniform(a.as_ref(), 2)
            .factorize(Factorization::Llt, Parallelism::None)
            .unwrap();
        assert_eq!(factors.tree().leaf_count(), 4);
        let tree = factors.into_tree();
        assert_close(tree.to_dense().as_ref(), a.as_ref(), 0.0);
    }
}
