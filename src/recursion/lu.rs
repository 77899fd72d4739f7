use super::{
    lookup, par,
    product::gemm,
    solve::{solve_lower_triangular_left, solve_upper_triangular_right},
    Panel,
};
use crate::{HMatError, HMatrix, Trans};
use equator::assert;
use faer::{ComplexField, Parallelism};

enum PanelSolve<'a, E: ComplexField> {
    /// `L(k, k) * U(k, j) = H(k, j)`
    Row(&'a mut HMatrix<E>),
    /// `L(i, k) * U(k, k) = H(i, k)`
    Col(&'a mut HMatrix<E>),
}

/// Computes the LU decomposition of `matrix` in place.
///
/// On exit, the blocks on and above the diagonal hold `U`, the blocks below the diagonal hold
/// `L`, and each diagonal leaf holds its own packed `L * U` factors together with its row
/// permutation. No pivoting is done across blocks.
///
/// # Errors
/// Returns [`HMatError::SingularPivot`] if a diagonal leaf is singular. The matrix is left
/// partially factorized.
///
/// # Panics
/// Panics if the partitions of a diagonal block are not square, or a diagonal block is absent.
#[track_caller]
pub fn lu_in_place<E: ComplexField>(
    matrix: &mut HMatrix<E>,
    parallelism: Parallelism,
) -> Result<(), HMatError> {
    let grid = match matrix {
        HMatrix::Leaf(full) => return full.lu_decomposition(parallelism),
        HMatrix::Internal(grid) => grid,
    };
    assert!(grid.row_sizes == grid.col_sizes);

    let n = grid.nr_child_row();
    let offsets = grid.row_offsets();
    for k in 0..n {
        log::trace!(target: "faer_hmat", "lu: step {k} of {n}");
        grid.fill_in(|grid, i, j| {
            i > k && j > k && grid.get(i, k).is_some() && grid.get(k, j).is_some()
        });
        let Panel {
            diag,
            mut row,
            mut col,
            trailing,
        } = Panel::split(grid, k, |i, j| i >= k && j >= k);

        lu_in_place(diag, parallelism).map_err(|err| err.shifted(offsets[k]))?;
        let diag = &*diag;

        let solves: Vec<_> = row
            .iter_mut()
            .map(|(_, block)| PanelSolve::Row(&mut **block))
            .chain(col.iter_mut().map(|(_, block)| PanelSolve::Col(&mut **block)))
            .collect();
        par::for_each(solves, parallelism, |solve| match solve {
            PanelSolve::Row(block) => solve_lower_triangular_left(diag, block, true, parallelism),
            PanelSolve::Col(block) => {
                solve_upper_triangular_right(diag, block, false, false, parallelism)
            }
        });

        let upper = lookup(&row, n);
        let lower = lookup(&col, n);
        par::for_each(trailing, parallelism, |(i, j, target)| {
            if let (Some(l_ik), Some(u_kj)) = (lower[i], upper[j]) {
                gemm(
                    target,
                    Trans::No,
                    l_ik,
                    Trans::No,
                    u_kj,
                    E::faer_one().faer_neg(),
                    E::faer_one(),
                    parallelism,
                );
            }
        });
    }
    Ok(())
}
