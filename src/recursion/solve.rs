//! Block triangular solves.
//!
//! Each solve overwrites the right-hand side `b` with the solution. Blocks of `b` are visited in
//! dependency order, known contributions are subtracted with [`gemm`], and the diagonal block of
//! the factor finishes the job recursively. Absent off-diagonal blocks of the factor contribute
//! nothing. An absent block of `b` stays absent unless a contribution reaches it, in which case
//! it is stored as a zero leaf before the solve starts.
//!
//! `lower_stored` selects where the factor of an upper solve lives: in the upper triangle, or as
//! the transpose of the lower triangle (LDLT and LLT factors).

use super::{diagonal_block, par, product::gemm};
use crate::{hmatrix::BlockGrid, HMatrix, Trans};
use equator::assert;
use faer::{ComplexField, Parallelism};

/// Groups the child slots of `grid` by block column, each group in block row order.
fn columns<E: ComplexField>(grid: &mut BlockGrid<E>) -> Vec<Vec<Option<&mut HMatrix<E>>>> {
    let ncol = grid.nr_child_col();
    let mut out: Vec<Vec<_>> = (0..ncol)
        .map(|_| Vec::with_capacity(grid.nr_child_row()))
        .collect();
    for (idx, child) in grid.children.iter_mut().enumerate() {
        out[idx % ncol].push(child.as_deref_mut());
    }
    out
}

/// Groups the child slots of `grid` by block row, each group in block column order.
fn rows<E: ComplexField>(grid: &mut BlockGrid<E>) -> Vec<Vec<Option<&mut HMatrix<E>>>> {
    let ncol = grid.nr_child_col();
    let mut out: Vec<Vec<_>> = (0..grid.nr_child_row())
        .map(|_| Vec::with_capacity(ncol))
        .collect();
    for (idx, child) in grid.children.iter_mut().enumerate() {
        out[idx / ncol].push(child.as_deref_mut());
    }
    out
}

/// Solves a leaf factor against an internal right-hand side through a dense copy.
fn solve_densely<E: ComplexField>(
    b: &mut HMatrix<E>,
    solve: impl FnOnce(faer::MatMut<'_, E>),
) {
    log::warn!(
        target: "faer_hmat_perf",
        "solving with a dense {}x{} right-hand side built from a block grid",
        b.nrows(),
        b.ncols(),
    );
    let mut x = b.to_dense();
    solve(x.as_mut());
    b.set_dense(x.as_ref());
}

/// Returns the block `U(j, i)`, stored as `L(i, j)` when `lower_stored` is set.
fn upper_block<E: ComplexField>(
    ug: &BlockGrid<E>,
    j: usize,
    i: usize,
    lower_stored: bool,
) -> Option<&HMatrix<E>> {
    if lower_stored {
        ug.get(i, j)
    } else {
        ug.get(j, i)
    }
}

#[track_caller]
fn check_square<E: ComplexField>(grid: &BlockGrid<E>) {
    assert!(grid.row_sizes == grid.col_sizes);
}

/// Solves `L * X = B` in place, where `L` is the lower triangle of `l`.
///
/// Leaves holding an LU decomposition apply their row permutation first.
#[track_caller]
pub fn solve_lower_triangular_left<E: ComplexField>(
    l: &HMatrix<E>,
    b: &mut HMatrix<E>,
    unitriangular: bool,
    parallelism: Parallelism,
) {
    assert!(all(l.nrows() == l.ncols(), b.nrows() == l.nrows()));

    let lg = match l {
        HMatrix::Leaf(l) => {
            match b {
                HMatrix::Leaf(b) => {
                    l.solve_lower_triangular_left(b.as_mut(), unitriangular, parallelism)
                }
                HMatrix::Internal(_) => solve_densely(b, |x| {
                    l.solve_lower_triangular_left(x, unitriangular, parallelism)
                }),
            }
            return;
        }
        HMatrix::Internal(lg) => lg,
    };

    match b {
        HMatrix::Leaf(full) => {
            let mut split = HMatrix::Internal(BlockGrid::from_dense(
                full.as_ref(),
                &lg.row_sizes,
                &[full.ncols()],
            ));
            solve_lower_triangular_left(l, &mut split, unitriangular, parallelism);
            split.write_dense(full.as_mut());
        }
        HMatrix::Internal(bg) => {
            check_square(lg);
            assert!(bg.row_sizes == lg.row_sizes);
            let n = lg.nr_child_row();

            // x_i picks up L(i, j) * x_j for j < i
            for c in 0..bg.nr_child_col() {
                for i in 0..n {
                    if bg.get(i, c).is_none()
                        && (0..i).any(|j| lg.get(i, j).is_some() && bg.get(j, c).is_some())
                    {
                        bg.materialize(i, c);
                    }
                }
            }

            par::for_each(columns(bg), parallelism, |mut column| {
                for i in 0..n {
                    let (solved, rest) = column.split_at_mut(i);
                    let x_i = match &mut rest[0] {
                        Some(x_i) => &mut **x_i,
                        None => continue,
                    };
                    for (j, x_j) in solved.iter().enumerate() {
                        if let (Some(l_ij), Some(x_j)) = (lg.get(i, j), x_j) {
                            gemm(
                                x_i,
                                Trans::No,
                                l_ij,
                                Trans::No,
                                x_j,
                                E::faer_one().faer_neg(),
                                E::faer_one(),
                                parallelism,
                            );
                        }
                    }
                    solve_lower_triangular_left(
                        diagonal_block(lg, i),
                        x_i,
                        unitriangular,
                        parallelism,
                    );
                }
            });
        }
    }
}

/// Solves `X * U = B` in place.
///
/// `U` is the upper triangle of `u`, or the transpose of its lower triangle when `lower_stored` is
/// set.
#[track_caller]
pub fn solve_upper_triangular_right<E: ComplexField>(
    u: &HMatrix<E>,
    b: &mut HMatrix<E>,
    unitriangular: bool,
    lower_stored: bool,
    parallelism: Parallelism,
) {
    assert!(all(u.nrows() == u.ncols(), b.ncols() == u.nrows()));

    let ug = match u {
        HMatrix::Leaf(u) => {
            match b {
                HMatrix::Leaf(b) => u.solve_upper_triangular_right(
                    b.as_mut(),
                    unitriangular,
                    lower_stored,
                    parallelism,
                ),
                HMatrix::Internal(_) => solve_densely(b, |x| {
                    u.solve_upper_triangular_right(x, unitriangular, lower_stored, parallelism)
                }),
            }
            return;
        }
        HMatrix::Internal(ug) => ug,
    };

    match b {
        HMatrix::Leaf(full) => {
            let mut split = HMatrix::Internal(BlockGrid::from_dense(
                full.as_ref(),
                &[full.nrows()],
                &ug.col_sizes,
            ));
            solve_upper_triangular_right(u, &mut split, unitriangular, lower_stored, parallelism);
            split.write_dense(full.as_mut());
        }
        HMatrix::Internal(bg) => {
            check_square(ug);
            assert!(bg.col_sizes == ug.col_sizes);
            let n = ug.nr_child_col();

            // x_i picks up x_j * U(j, i) for j < i
            for r in 0..bg.nr_child_row() {
                for i in 0..n {
                    if bg.get(r, i).is_none()
                        && (0..i).any(|j| {
                            bg.get(r, j).is_some() && upper_block(ug, j, i, lower_stored).is_some()
                        })
                    {
                        bg.materialize(r, i);
                    }
                }
            }

            par::for_each(rows(bg), parallelism, |mut row| {
                for i in 0..n {
                    let (solved, rest) = row.split_at_mut(i);
                    let x_i = match &mut rest[0] {
                        Some(x_i) => &mut **x_i,
                        None => continue,
                    };
                    for (j, x_j) in solved.iter().enumerate() {
                        // U(j, i), read from L(i, j) when the factor is lower-stored
                        let (u_ji, trans) = if lower_stored {
                            (ug.get(i, j), Trans::Yes)
                        } else {
                            (ug.get(j, i), Trans::No)
                        };
                        if let (Some(x_j), Some(u_ji)) = (x_j, u_ji) {
                            gemm(
                                x_i,
                                Trans::No,
                                x_j,
                                trans,
                                u_ji,
                                E::faer_one().faer_neg(),
                                E::faer_one(),
                                parallelism,
                            );
                        }
                    }
                    solve_upper_triangular_right(
                        diagonal_block(ug, i),
                        x_i,
                        unitriangular,
                        lower_stored,
                        parallelism,
                    );
                }
            });
        }
    }
}

/// Solves `U * X = B` in place.
///
/// `U` is the upper triangle of `u`, or the transpose of its lower triangle when `lower_stored` is
/// set.
#[track_caller]
pub fn solve_upper_triangular_left<E: ComplexField>(
    u: &HMatrix<E>,
    b: &mut HMatrix<E>,
    unitriangular: bool,
    lower_stored: bool,
    parallelism: Parallelism,
) {
    assert!(all(u.nrows() == u.ncols(), b.nrows() == u.nrows()));

    let ug = match u {
        HMatrix::Leaf(u) => {
            match b {
                HMatrix::Leaf(b) => u.solve_upper_triangular_left(
                    b.as_mut(),
                    unitriangular,
                    lower_stored,
                    parallelism,
                ),
                HMatrix::Internal(_) => solve_densely(b, |x| {
                    u.solve_upper_triangular_left(x, unitriangular, lower_stored, parallelism)
                }),
            }
            return;
        }
        HMatrix::Internal(ug) => ug,
    };

    match b {
        HMatrix::Leaf(full) => {
            let mut split = HMatrix::Internal(BlockGrid::from_dense(
                full.as_ref(),
                &ug.row_sizes,
                &[full.ncols()],
            ));
            solve_upper_triangular_left(u, &mut split, unitriangular, lower_stored, parallelism);
            split.write_dense(full.as_mut());
        }
        HMatrix::Internal(bg) => {
            check_square(ug);
            assert!(bg.row_sizes == ug.row_sizes);
            let n = ug.nr_child_row();

            // x_j picks up U(j, i) * x_i for i > j
            for c in 0..bg.nr_child_col() {
                for j in (0..n).rev() {
                    if bg.get(j, c).is_none()
                        && (j + 1..n).any(|i| {
                            upper_block(ug, j, i, lower_stored).is_some() && bg.get(i, c).is_some()
                        })
                    {
                        bg.materialize(j, c);
                    }
                }
            }

            par::for_each(columns(bg), parallelism, |mut column| {
                for i in (0..n).rev() {
                    let (pending, rest) = column.split_at_mut(i);
                    let x_i = match &mut rest[0] {
                        Some(x_i) => &mut **x_i,
                        None => continue,
                    };
                    solve_upper_triangular_left(
                        diagonal_block(ug, i),
                        x_i,
                        unitriangular,
                        lower_stored,
                        parallelism,
                    );
                    let x_i = &*x_i;

                    for (j, b_j) in pending.iter_mut().enumerate() {
                        let (u_ji, trans) = if lower_stored {
                            (ug.get(i, j), Trans::Yes)
                        } else {
                            (ug.get(j, i), Trans::No)
                        };
                        if let (Some(b_j), Some(u_ji)) = (b_j, u_ji) {
                            gemm(
                                b_j,
                                trans,
                                u_ji,
                                Trans::No,
                                x_i,
                                E::faer_one().faer_neg(),
                                E::faer_one(),
                                parallelism,
                            );
                        }
                    }
                }
            });
        }
    }
}
