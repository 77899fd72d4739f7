use super::{
    lookup, par,
    product::{mdnt, multiply_with_diag},
    solve::solve_upper_triangular_right,
    Panel,
};
use crate::{HMatError, HMatrix, Side};
use equator::assert;
use faer::{ComplexField, Parallelism};

/// Computes the `L * D * L^T` decomposition of a symmetric matrix in place.
///
/// Only the blocks on and below the diagonal are read or written, so the upper blocks may hold
/// anything, or be absent. On exit, the lower blocks hold `L`, the diagonal leaves hold their unit
/// lower triangular factor and their part of `D`, which can be gathered with
/// [`HMatrix::diagonal_factor`].
///
/// Transposes are plain transposes: for complex scalars this factorizes complex symmetric
/// matrices, not hermitian ones.
///
/// # Errors
/// Returns [`HMatError::SingularPivot`] if a pivot of `D` is zero.
///
/// # Panics
/// Panics if the partitions of a diagonal block are not square, or a diagonal block is absent.
#[track_caller]
pub fn ldlt_in_place<E: ComplexField>(
    matrix: &mut HMatrix<E>,
    parallelism: Parallelism,
) -> Result<(), HMatError> {
    let grid = match matrix {
        HMatrix::Leaf(full) => return full.ldlt_decomposition(parallelism),
        HMatrix::Internal(grid) => grid,
    };
    assert!(grid.row_sizes == grid.col_sizes);

    let n = grid.nr_child_row();
    let offsets = grid.row_offsets();
    for k in 0..n {
        log::trace!(target: "faer_hmat", "ldlt: step {k} of {n}");
        grid.fill_in(|grid, i, j| {
            j > k && i >= j && grid.get(i, k).is_some() && grid.get(j, k).is_some()
        });
        let Panel {
            diag,
            mut col,
            trailing,
            ..
        } = Panel::split(grid, k, |i, j| j >= k && i >= j);

        ldlt_in_place(diag, parallelism).map_err(|err| err.shifted(offsets[k]))?;
        let d = diag.diagonal_factor();
        let diag = &*diag;

        // L(i, k) = H(i, k) * L(k, k)^-T * D(k)^-1
        let solves: Vec<_> = col.iter_mut().map(|(_, block)| &mut **block).collect();
        par::for_each(solves, parallelism, |block| {
            solve_upper_triangular_right(diag, block, true, true, parallelism);
            multiply_with_diag(block, &d, Side::Right, true);
        });

        let lower = lookup(&col, n);
        par::for_each(trailing, parallelism, |(i, j, target)| {
            if let (Some(l_ik), Some(l_jk)) = (lower[i], lower[j]) {
                mdnt(target, l_ik, Some(d.as_slice()), l_jk, i == j, parallelism);
            }
        });
    }
    Ok(())
}
