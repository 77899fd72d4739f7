use super::{lookup, par, product::gemm, Panel};
use crate::{HMatError, HMatrix, Trans};
use equator::assert;
use faer::{ComplexField, Parallelism};

/// Replaces `matrix` by its inverse, using block Gauss-Jordan elimination.
///
/// No pivoting is done across blocks. An absent block is stored as a zero leaf as soon as an
/// elimination step writes to it, so the result only keeps the blocks of the inverse that are
/// structurally zero absent.
///
/// # Errors
/// Returns [`HMatError::SingularPivot`] if a diagonal block is singular once eliminated.
///
/// # Panics
/// Panics if the partitions of a diagonal block are not square, or a diagonal block is absent.
#[track_caller]
pub fn inverse_in_place<E: ComplexField>(
    matrix: &mut HMatrix<E>,
    parallelism: Parallelism,
) -> Result<(), HMatError> {
    let grid = match matrix {
        HMatrix::Leaf(full) => return full.inverse(parallelism),
        HMatrix::Internal(grid) => grid,
    };
    assert!(grid.row_sizes == grid.col_sizes);

    let one = E::faer_one();
    let zero = E::faer_zero();
    let n = grid.nr_child_row();
    let offsets = grid.row_offsets();
    for k in 0..n {
        log::trace!(target: "faer_hmat", "inverse: step {k} of {n}");
        grid.fill_in(|grid, i, j| {
            i != k && j != k && grid.get(i, k).is_some() && grid.get(k, j).is_some()
        });
        let Panel {
            diag,
            mut row,
            mut col,
            trailing,
        } = Panel::split(grid, k, |_, _| true);

        inverse_in_place(diag, parallelism).map_err(|err| err.shifted(offsets[k]))?;
        let diag = &*diag;

        // H(k, j) = H(k, k)^-1 * H(k, j)
        let blocks: Vec<_> = row.iter_mut().map(|(_, block)| &mut **block).collect();
        par::for_each(blocks, parallelism, |block| {
            let rhs = block.clone();
            gemm(block, Trans::No, diag, Trans::No, &rhs, one, zero, parallelism);
        });

        // H(i, j) -= H(i, k) * H(k, j)
        {
            let upper = lookup(&row, n);
            let left = lookup(&col, n);
            par::for_each(trailing, parallelism, |(i, j, target)| {
                if let (Some(h_ik), Some(h_kj)) = (left[i], upper[j]) {
                    gemm(target, Trans::No, h_ik, Trans::No, h_kj, one.faer_neg(), one, parallelism);
                }
            });
        }

        // H(i, k) = -H(i, k) * H(k, k)^-1
        let blocks: Vec<_> = col.iter_mut().map(|(_, block)| &mut **block).collect();
        par::for_each(blocks, parallelism, |block| {
            let lhs = block.clone();
            gemm(block, Trans::No, &lhs, Trans::No, diag, one.faer_neg(), zero, parallelism);
        });
    }
    Ok(())
}
