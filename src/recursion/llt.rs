use super::{lookup, par, product::mdnt, solve::solve_upper_triangular_right, Panel};
use crate::{HMatError, HMatrix};
use equator::assert;
use faer::{ComplexField, Parallelism};

/// Computes the `L * L^T` decomposition of a symmetric positive definite matrix in place.
///
/// Only the blocks on and below the diagonal are read or written. On exit, they hold `L`, and the
/// diagonal leaves hold their lower triangular factor with a zeroed upper triangle.
///
/// # Errors
/// Returns [`HMatError::NonPositivePivot`] if the matrix is not numerically positive definite.
///
/// # Panics
/// Panics if the partitions of a diagonal block are not square, or a diagonal block is absent.
#[track_caller]
pub fn llt_in_place<E: ComplexField>(
    matrix: &mut HMatrix<E>,
    parallelism: Parallelism,
) -> Result<(), HMatError> {
    let grid = match matrix {
        HMatrix::Leaf(full) => return full.llt_decomposition(parallelism),
        HMatrix::Internal(grid) => grid,
    };
    assert!(grid.row_sizes == grid.col_sizes);

    let n = grid.nr_child_row();
    let offsets = grid.row_offsets();
    for k in 0..n {
        log::trace!(target: "faer_hmat", "llt: step {k} of {n}");
        grid.fill_in(|grid, i, j| {
            j > k && i >= j && grid.get(i, k).is_some() && grid.get(j, k).is_some()
        });
        let Panel {
            diag,
            mut col,
            trailing,
            ..
        } = Panel::split(grid, k, |i, j| j >= k && i >= j);

        llt_in_place(diag, parallelism).map_err(|err| err.shifted(offsets[k]))?;
        let diag = &*diag;

        // L(i, k) = H(i, k) * L(k, k)^-T
        let solves: Vec<_> = col.iter_mut().map(|(_, block)| &mut **block).collect();
        par::for_each(solves, parallelism, |block| {
            solve_upper_triangular_right(diag, block, false, true, parallelism)
        });

        let lower = lookup(&col, n);
        par::for_each(trailing, parallelism, |(i, j, target)| {
            if let (Some(l_ik), Some(l_jk)) = (lower[i], lower[j]) {
                mdnt(target, l_ik, None, l_jk, i == j, parallelism);
            }
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recursion::test_utils::*;
    use faer::{linalg::matmul::matmul, Mat};
    use rand::prelude::*;

    fn lower(h: &HMatrix<f64>) -> Mat<f64> {
        let packed = h.to_dense();
        Mat::from_fn(h.nrows(), h.ncols(), |i, j| {
            if i >= j {
                packed.read(i, j)
            } else {
                0.0
            }
        })
    }

    #[test]
    fn spd_with_nan_upper_blocks() {
        let rng = &mut StdRng::seed_from_u64(0);
        for n in [5, 12] {
            let a = spd(rng, n);
            let poisoned = Mat::from_fn(n, n, |i, j| if i >= j { a.read(i, j) } else { f64::NAN });

            for leaf_size in [1, 3, 4] {
                let mut tree = HMatrix::from_dense_uniform(poisoned.as_ref(), leaf_size);
                llt_in_place(&mut tree, Parallelism::Rayon(0)).unwrap();

                let l = lower(&tree);
                let mut prod = Mat::<f64>::zeros(n, n);
                matmul(prod.as_mut(), l.as_ref(), l.transpose(), None, 1.0, Parallelism::None);
                assert_close(prod.as_ref(), a.as_ref(), 1e-10);
            }
        }
    }

    #[test]
    fn flat_and_deep_trees_agree() {
        let rng = &mut StdRng::seed_from_u64(1);
        let n = 9;
        let a = spd(rng, n);
        let mut flat = HMatrix::leaf(a.clone());
        llt_in_place(&mut flat, Parallelism::None).unwrap();

        let mut deep = HMatrix::from_dense_uniform(a.as_ref(), 2);
        llt_in_place(&mut deep, Parallelism::None).unwrap();
        assert_close(lower(&deep).as_ref(), lower(&flat).as_ref(), 1e-10);
    }

    #[test]
    fn indefinite_matrix_is_rejected() {
        let a = Mat::from_fn(4, 4, |i, j| match (i, j) {
            (3, 3) => -1.0,
            _ if i == j => 2.0,
            _ => 0.0,
        });
        let mut tree = HMatrix::from_dense_uniform(a.as_ref(), 2);
        assert_eq!(
            llt_in_place(&mut tree, Parallelism::None),
            Err(HMatError::NonPositivePivot { index: 3 })
        );
    }
}
