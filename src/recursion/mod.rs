//! Recursive block algorithms.
//!
//! Every algorithm is written once against [`HMatrix`]: a leaf delegates to the dense kernels of
//! [`FullMatrix`](crate::FullMatrix), an internal node recurses over its grid of children.
//! Absent children are exact zero blocks and are skipped as operands. A block update that reaches
//! an absent child stores a zero leaf there first.
//!
//! The factorizations eliminate one block row/column `k` at a time. The steps for different `k`
//! run in order, while the block operations inside one step touch pairwise distinct blocks and
//! are dispatched together according to the given [`Parallelism`](faer::Parallelism).

use crate::{hmatrix::BlockGrid, HMatrix};
use faer::ComplexField;

pub mod inverse;
pub mod ldlt;
pub mod llt;
pub mod lu;
pub mod product;
pub mod solve;

pub(crate) mod par;

pub use inverse::inverse_in_place;
pub use ldlt::ldlt_in_place;
pub use llt::llt_in_place;
pub use lu::lu_in_place;

/// Blocks of a grid taking part in elimination step `k`, borrowed mutably and disjointly.
pub(crate) struct Panel<'a, E: ComplexField> {
    /// Block `(k, k)`.
    pub diag: &'a mut HMatrix<E>,
    /// Present blocks `(k, j)`, `j != k`, tagged with `j`.
    pub row: Vec<(usize, &'a mut HMatrix<E>)>,
    /// Present blocks `(i, k)`, `i != k`, tagged with `i`.
    pub col: Vec<(usize, &'a mut HMatrix<E>)>,
    /// Present blocks `(i, j)`, `i != k` and `j != k`.
    pub trailing: Vec<(usize, usize, &'a mut HMatrix<E>)>,
}

impl<'a, E: ComplexField> Panel<'a, E> {
    /// Borrows the blocks `(i, j)` of `grid` for which `keep(i, j)` holds.
    ///
    /// # Panics
    /// Panics if the diagonal block `(k, k)` is absent.
    #[track_caller]
    pub fn split(grid: &'a mut BlockGrid<E>, k: usize, keep: impl Fn(usize, usize) -> bool) -> Self {
        let ncol = grid.nr_child_col();
        let mut diag = None;
        let mut row = Vec::new();
        let mut col = Vec::new();
        let mut trailing = Vec::new();

        for (idx, child) in grid.children.iter_mut().enumerate() {
            let (i, j) = (idx / ncol, idx % ncol);
            if !keep(i, j) {
                continue;
            }
            let child = match child.as_deref_mut() {
                Some(child) => child,
                None => continue,
            };
            match (i == k, j == k) {
                (true, true) => diag = Some(child),
                (true, false) => row.push((j, child)),
                (false, true) => col.push((i, child)),
                (false, false) => trailing.push((i, j, child)),
            }
        }

        let diag = match diag {
            Some(diag) => diag,
            None => panic!("diagonal block ({k}, {k}) is absent"),
        };
        Self {
            diag,
            row,
            col,
            trailing,
        }
    }
}

/// Returns a table mapping a block index to the matching block of `blocks`, if present.
pub(crate) fn lookup<'s, E: ComplexField>(
    blocks: &'s [(usize, &mut HMatrix<E>)],
    len: usize,
) -> Vec<Option<&'s HMatrix<E>>> {
    let mut table = vec![None; len];
    for (idx, block) in blocks {
        table[*idx] = Some(&**block);
    }
    table
}

/// Returns the diagonal block `(k, k)` of `grid`.
///
/// # Panics
/// Panics if the block is absent.
#[track_caller]
pub(crate) fn diagonal_block<E: ComplexField>(grid: &BlockGrid<E>, k: usize) -> &HMatrix<E> {
    match grid.get(k, k) {
        Some(diag) => diag,
        None => panic!("diagonal block ({k}, {k}) is absent"),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    #[test]
    fn panel_partitions_blocks() {
        let a = Mat::from_fn(6, 6, |i, j| (i + j) as f64);
        let mut h = HMatrix::from_blocks(
            vec![2, 2, 2],
            vec![2, 2, 2],
            (0..9)
                .map(|idx| {
                    let (i, j) = (idx / 3, idx % 3);
                    if (i, j) == (2, 1) {
                        None
                    } else {
                        Some(HMatrix::leaf(a.as_ref().submatrix(2 * i, 2 * j, 2, 2).to_owned()))
                    }
                })
                .collect(),
        );
        let grid = h.as_internal_mut().unwrap();
        let panel = Panel::split(grid, 1, |i, j| i >= 1 && j >= 1);
        assert_eq!(panel.diag.nrows(), 2);
        assert_eq!(panel.row.iter().map(|(j, _)| *j).collect::<Vec<_>>(), vec![2]);
        assert_eq!(panel.col.len(), 0);
        assert_eq!(panel.trailing.len(), 1);

        let table = lookup(&panel.row, 3);
        assert!(table[0].is_none());
        assert!(table[2].is_some());
    }

    #[test]
    #[should_panic]
    fn missing_diagonal_panics() {
        let mut h = HMatrix::<f64>::from_blocks(
            vec![1, 1],
            vec![1, 1],
            vec![None, None, None, Some(HMatrix::leaf(Mat::identity(1, 1)))],
        );
        let grid = h.as_internal_mut().unwrap();
        let _ = Panel::split(grid, 0, |_, _| true);
    }
}
