//! Block products and rank updates.

use super::par;
use crate::{
    full::product::dense_product,
    hmatrix::{offsets, BlockGrid},
    HMatrix, Side, Trans,
};
use equator::assert;
use faer::{ComplexField, MatRef, Parallelism};

/// Calls `f` with a dense view of `node`, converting it first if it is internal.
pub(crate) fn with_dense<E: ComplexField, R>(
    node: &HMatrix<E>,
    f: impl FnOnce(MatRef<'_, E>) -> R,
) -> R {
    match node {
        HMatrix::Leaf(full) => f(full.as_ref()),
        HMatrix::Internal(_) => {
            let dense = node.to_dense();
            f(dense.as_ref())
        }
    }
}

#[inline]
fn oriented_dims<E: ComplexField>(node: &HMatrix<E>, trans: Trans) -> (usize, usize) {
    match trans {
        Trans::No => (node.nrows(), node.ncols()),
        Trans::Yes => (node.ncols(), node.nrows()),
    }
}

/// Returns the partition of the inner dimension of `op(a) * op(b)`, taken from whichever operand
/// is internal, or `None` if both are leaves.
fn inner_partition<E: ComplexField>(
    a: &HMatrix<E>,
    trans_a: Trans,
    b: &HMatrix<E>,
    trans_b: Trans,
) -> Option<Vec<usize>> {
    match (a, b) {
        (HMatrix::Internal(a), _) => Some(match trans_a {
            Trans::No => a.col_sizes.clone(),
            Trans::Yes => a.row_sizes.clone(),
        }),
        (_, HMatrix::Internal(b)) => Some(match trans_b {
            Trans::No => b.row_sizes.clone(),
            Trans::Yes => b.col_sizes.clone(),
        }),
        _ => None,
    }
}

/// Collects the present children of `grid`, tagged with their block position, keeping those for
/// which `keep(i, j)` holds.
fn present_children<E: ComplexField>(
    grid: &mut BlockGrid<E>,
    keep: impl Fn(usize, usize) -> bool,
) -> Vec<(usize, usize, &mut HMatrix<E>)> {
    let ncol = grid.nr_child_col();
    grid.children
        .iter_mut()
        .enumerate()
        .filter_map(|(idx, child)| {
            let (i, j) = (idx / ncol, idx % ncol);
            if keep(i, j) {
                child.as_deref_mut().map(|child| (i, j, child))
            } else {
                None
            }
        })
        .collect()
}

/// Computes `target = beta * target + alpha * op(a) * op(b)`.
///
/// Absent blocks of `a` or `b` contribute nothing. An absent block of `target` that receives a
/// contribution is stored as a zero leaf before the update.
#[track_caller]
pub fn gemm<E: ComplexField>(
    target: &mut HMatrix<E>,
    trans_a: Trans,
    a: &HMatrix<E>,
    trans_b: Trans,
    b: &HMatrix<E>,
    alpha: E,
    beta: E,
    parallelism: Parallelism,
) {
    let (a_rows, a_cols) = oriented_dims(a, trans_a);
    let (b_rows, b_cols) = oriented_dims(b, trans_b);
    assert!(all(
        a_rows == target.nrows(),
        b_cols == target.ncols(),
        a_cols == b_rows,
    ));

    match target {
        HMatrix::Leaf(full) => with_dense(a, |a| {
            with_dense(b, |b| {
                full.gemm(trans_a, a, trans_b, b, alpha, beta, parallelism)
            })
        }),
        HMatrix::Internal(grid) => {
            if beta != E::faer_one() {
                for child in grid.children.iter_mut().flatten() {
                    child.scale(beta);
                }
            }

            let inner = match inner_partition(a, trans_a, b, trans_b) {
                Some(inner) => inner,
                None => {
                    let product = with_dense(a, |a| {
                        with_dense(b, |b| dense_product(trans_a, a, trans_b, b, parallelism))
                    });
                    grid.add_dense(alpha, product.as_ref());
                    return;
                }
            };

            let a = match trans_a {
                Trans::No => a.conform(&grid.row_sizes, &inner),
                Trans::Yes => a.conform(&inner, &grid.row_sizes),
            };
            let b = match trans_b {
                Trans::No => b.conform(&inner, &grid.col_sizes),
                Trans::Yes => b.conform(&grid.col_sizes, &inner),
            };
            let (a, b) = (&*a, &*b);
            let nblocks = inner.len();
            let a_block = |i: usize, k: usize| match trans_a {
                Trans::No => a.get(i, k),
                Trans::Yes => a.get(k, i),
            };
            let b_block = |k: usize, j: usize| match trans_b {
                Trans::No => b.get(k, j),
                Trans::Yes => b.get(j, k),
            };

            grid.fill_in(|_, i, j| {
                (0..nblocks).any(|k| a_block(i, k).is_some() && b_block(k, j).is_some())
            });
            let tasks = present_children(grid, |_, _| true);
            par::for_each(tasks, parallelism, |(i, j, target)| {
                for k in 0..nblocks {
                    if let (Some(a_ik), Some(b_kj)) = (a_block(i, k), b_block(k, j)) {
                        gemm(
                            target,
                            trans_a,
                            a_ik,
                            trans_b,
                            b_kj,
                            alpha,
                            E::faer_one(),
                            parallelism,
                        );
                    }
                }
            });
        }
    }
}

/// Computes `target -= m * diag(d) * n^T`, or `target -= m * n^T` when `d` is `None`.
///
/// `d` is indexed like the columns of `m`. When `lower_only` is set, `target` must be square with
/// matching row and column partitions, and only its lower triangle is updated: blocks above the
/// diagonal are neither read nor written.
///
/// An absent block of `target` that receives a contribution is stored as a zero leaf before the
/// update.
#[track_caller]
pub fn mdnt<E: ComplexField>(
    target: &mut HMatrix<E>,
    m: &HMatrix<E>,
    d: Option<&[E]>,
    n: &HMatrix<E>,
    lower_only: bool,
    parallelism: Parallelism,
) {
    assert!(all(
        m.nrows() == target.nrows(),
        n.nrows() == target.ncols(),
        m.ncols() == n.ncols(),
    ));
    if let Some(d) = d {
        assert!(d.len() == m.ncols());
    }

    match target {
        HMatrix::Leaf(full) => with_dense(m, |m| {
            with_dense(n, |n| full.mdnt_product(m, d, n, lower_only, parallelism))
        }),
        HMatrix::Internal(grid) => {
            if lower_only {
                assert!(grid.row_sizes == grid.col_sizes);
            }

            let inner = match (m, n) {
                (HMatrix::Internal(m), _) => m.col_sizes.clone(),
                (_, HMatrix::Internal(n)) => n.col_sizes.clone(),
                _ => {
                    // both operands are leaves, form the product densely and scatter it
                    let product = with_dense(m, |m| {
                        with_dense(n, |n| {
                            let mut md = crate::FullMatrix::new(m.to_owned());
                            if let Some(d) = d {
                                md.multiply_with_diag(d, Side::Right, false);
                            }
                            dense_product(Trans::No, md.as_ref(), Trans::Yes, n, parallelism)
                        })
                    });
                    if lower_only {
                        grid.sub_dense_lower(product.as_ref());
                    } else {
                        grid.add_dense(E::faer_one().faer_neg(), product.as_ref());
                    }
                    return;
                }
            };

            let m = m.conform(&grid.row_sizes, &inner);
            let n = n.conform(&grid.col_sizes, &inner);
            let (m, n) = (&*m, &*n);
            let d_offsets = offsets(&inner);
            let inner = &inner;

            grid.fill_in(|_, i, j| {
                (!lower_only || j <= i)
                    && (0..inner.len()).any(|k| m.get(i, k).is_some() && n.get(j, k).is_some())
            });
            let tasks = present_children(grid, |i, j| !lower_only || j <= i);
            par::for_each(tasks, parallelism, |(i, j, target)| {
                for k in 0..inner.len() {
                    if let (Some(m_ik), Some(n_jk)) = (m.get(i, k), n.get(j, k)) {
                        let d_k = d.map(|d| &d[d_offsets[k]..d_offsets[k] + inner[k]]);
                        mdnt(target, m_ik, d_k, n_jk, lower_only && i == j, parallelism);
                    }
                }
            });
        }
    }
}

/// Computes `target -= m * D * m^T` on the lower triangle of `target`, where `D` is the diagonal
/// of the LDLT-factorized block `d`.
///
/// The diagonal of `d` is gathered from all of its diagonal leaves and split along the column
/// partition of `m`. When `d` is a single leaf and `m` has a single block column, this is the
/// product with that block column.
#[track_caller]
pub fn mdmt_product<E: ComplexField>(
    target: &mut HMatrix<E>,
    m: &HMatrix<E>,
    d: &HMatrix<E>,
    parallelism: Parallelism,
) {
    let d = d.diagonal_factor();
    mdnt(target, m, Some(d.as_slice()), m, true, parallelism)
}

/// Computes `target -= m * D * n^T`, where `D` is the diagonal of the LDLT-factorized block `d`.
#[track_caller]
pub fn mdnt_product<E: ComplexField>(
    target: &mut HMatrix<E>,
    m: &HMatrix<E>,
    d: &HMatrix<E>,
    n: &HMatrix<E>,
    parallelism: Parallelism,
) {
    let d = d.diagonal_factor();
    mdnt(target, m, Some(d.as_slice()), n, false, parallelism)
}

/// Scales the rows (`side == Left`) or the columns (`side == Right`) of `target` by `d`, or by its
/// inverse when `inverse` is set.
#[track_caller]
pub fn multiply_with_diag<E: ComplexField>(
    target: &mut HMatrix<E>,
    d: &[E],
    side: Side,
    inverse: bool,
) {
    match target {
        HMatrix::Leaf(full) => full.multiply_with_diag(d, side, inverse),
        HMatrix::Internal(grid) => {
            let (sizes, starts) = match side {
                Side::Left => (grid.row_sizes.clone(), grid.row_offsets()),
                Side::Right => (grid.col_sizes.clone(), grid.col_offsets()),
            };
            assert!(d.len() == sizes.iter().sum::<usize>());
            let ncol = grid.nr_child_col();
            for (idx, child) in grid.children.iter_mut().enumerate() {
                if let Some(child) = child {
                    let block = match side {
                        Side::Left => idx / ncol,
                        Side::Right => idx % ncol,
                    };
                    let d = &d[starts[block]..starts[block] + sizes[block]];
                    multiply_with_diag(child, d, side, inverse);
                }
            }
        }
    }
}
