use super::{BlockGrid, HMatrix};
use equator::assert;
use faer::{reborrow::*, ComplexField, Mat, MatMut, MatRef};
use std::borrow::Cow;

impl<E: ComplexField> HMatrix<E> {
    /// Builds a tree from a dense matrix by halving the rows and the columns until both
    /// dimensions are at most `leaf_size`.
    ///
    /// A dimension that is already small enough is not split further, so square matrices get
    /// square diagonal blocks at every level.
    #[track_caller]
    pub fn from_dense_uniform(mat: MatRef<'_, E>, leaf_size: usize) -> Self {
        assert!(leaf_size > 0);
        let (m, n) = (mat.nrows(), mat.ncols());
        if m <= leaf_size && n <= leaf_size {
            return HMatrix::leaf(mat.to_owned());
        }

        let halve = |size: usize| {
            if size <= leaf_size {
                vec![size]
            } else {
                vec![(size + 1) / 2, size / 2]
            }
        };
        let row_sizes = halve(m);
        let col_sizes = halve(n);

        let mut children = Vec::with_capacity(row_sizes.len() * col_sizes.len());
        let mut row = 0;
        for &bm in &row_sizes {
            let mut col = 0;
            for &bn in &col_sizes {
                let block = mat.submatrix(row, col, bm, bn);
                children.push(Some(Box::new(Self::from_dense_uniform(block, leaf_size))));
                col += bn;
            }
            row += bm;
        }
        HMatrix::Internal(BlockGrid {
            row_sizes,
            col_sizes,
            children,
        })
    }

    /// Returns the matrix as a dense one. Absent blocks are zero.
    pub fn to_dense(&self) -> Mat<E> {
        let mut out = Mat::zeros(self.nrows(), self.ncols());
        self.write_dense(out.as_mut());
        out
    }

    /// Writes the matrix into `dst`. Absent blocks are written as zero.
    #[track_caller]
    pub fn write_dense(&self, dst: MatMut<'_, E>) {
        let mut dst = dst;
        assert!(all(dst.nrows() == self.nrows(), dst.ncols() == self.ncols()));
        match self {
            HMatrix::Leaf(full) => dst.copy_from(full.as_ref()),
            HMatrix::Internal(grid) => {
                for_each_block(grid, |i, j, row, col| {
                    let (m, n) = (grid.row_sizes[i], grid.col_sizes[j]);
                    let block = dst.rb_mut().submatrix_mut(row, col, m, n);
                    match grid.get(i, j) {
                        Some(child) => child.write_dense(block),
                        None => {
                            let mut block = block;
                            block.fill_zero();
                        }
                    }
                });
            }
        }
    }

    /// Computes `self += alpha * src`.
    ///
    /// An absent block receiving a non-zero contribution is stored as a leaf.
    #[track_caller]
    pub fn add_dense(&mut self, alpha: E, src: MatRef<'_, E>) {
        assert!(all(src.nrows() == self.nrows(), src.ncols() == self.ncols()));
        match self {
            HMatrix::Leaf(full) => full.add(alpha, src),
            HMatrix::Internal(grid) => grid.add_dense(alpha, src),
        }
    }

    /// Computes `self -= src` on the lower triangle of a square matrix.
    #[track_caller]
    pub(crate) fn sub_dense_lower(&mut self, src: MatRef<'_, E>) {
        match self {
            HMatrix::Leaf(full) => full.sub_lower(src),
            HMatrix::Internal(grid) => grid.sub_dense_lower(src),
        }
    }

    /// Overwrites the matrix with `src`.
    ///
    /// Absent blocks stay absent where `src` is zero.
    #[track_caller]
    pub fn set_dense(&mut self, src: MatRef<'_, E>) {
        assert!(all(src.nrows() == self.nrows(), src.ncols() == self.ncols()));
        match self {
            HMatrix::Leaf(full) => full.copy_from(src),
            HMatrix::Internal(grid) => {
                grid.for_each_nonzero_block(src, |_, _| true, |_, _, child, block| {
                    child.set_dense(block)
                });
            }
        }
    }

    /// Returns a grid with the given partitions holding the same matrix.
    ///
    /// An internal node that already has these partitions is borrowed. Anything else is
    /// converted to dense leaves.
    #[track_caller]
    pub(crate) fn conform(&self, row_sizes: &[usize], col_sizes: &[usize]) -> Cow<'_, BlockGrid<E>> {
        match self {
            HMatrix::Internal(grid)
                if grid.row_sizes == row_sizes && grid.col_sizes == col_sizes =>
            {
                Cow::Borrowed(grid)
            }
            HMatrix::Internal(grid) => {
                log::warn!(
                    target: "faer_hmat_perf",
                    "repartitioning a {}x{} block grid into {}x{} blocks through a dense copy",
                    grid.nr_child_row(),
                    grid.nr_child_col(),
                    row_sizes.len(),
                    col_sizes.len(),
                );
                Cow::Owned(BlockGrid::from_dense(
                    self.to_dense().as_ref(),
                    row_sizes,
                    col_sizes,
                ))
            }
            HMatrix::Leaf(full) => {
                Cow::Owned(BlockGrid::from_dense(full.as_ref(), row_sizes, col_sizes))
            }
        }
    }
}

impl<E: ComplexField> BlockGrid<E> {
    /// Computes `self += alpha * src`.
    #[track_caller]
    pub(crate) fn add_dense(&mut self, alpha: E, src: MatRef<'_, E>) {
        assert!(all(src.nrows() == self.nrows(), src.ncols() == self.ncols()));
        if alpha == E::faer_zero() {
            return;
        }
        self.for_each_nonzero_block(src, |_, _| true, |_, _, child, block| {
            child.add_dense(alpha, block)
        });
    }

    /// Computes `self -= src` on the lower triangle of a square matrix.
    ///
    /// Blocks strictly above the diagonal are not touched.
    #[track_caller]
    pub(crate) fn sub_dense_lower(&mut self, src: MatRef<'_, E>) {
        assert!(all(
            self.row_sizes == self.col_sizes,
            src.nrows() == self.nrows(),
            src.ncols() == self.ncols(),
        ));
        self.for_each_nonzero_block(src, |i, j| j <= i, |i, j, child, block| {
            if i == j {
                child.sub_dense_lower(block);
            } else {
                child.add_dense(E::faer_one().faer_neg(), block);
            }
        });
    }

    /// Calls `f` on every child at a position where `keep` holds, along with the matching block
    /// of `src`.
    ///
    /// Absent children are skipped when their block of `src` is zero, and stored as zero leaves
    /// otherwise.
    fn for_each_nonzero_block(
        &mut self,
        src: MatRef<'_, E>,
        keep: impl Fn(usize, usize) -> bool,
        mut f: impl FnMut(usize, usize, &mut HMatrix<E>, MatRef<'_, E>),
    ) {
        let (row_offsets, col_offsets) = (self.row_offsets(), self.col_offsets());
        for i in 0..self.nr_child_row() {
            for j in 0..self.nr_child_col() {
                if !keep(i, j) {
                    continue;
                }
                let block = src.submatrix(
                    row_offsets[i],
                    col_offsets[j],
                    self.row_sizes[i],
                    self.col_sizes[j],
                );
                if self.get(i, j).is_none() && is_zero(block) {
                    continue;
                }
                f(i, j, self.materialize(i, j), block);
            }
        }
    }
}

pub(crate) fn is_zero<E: ComplexField>(mat: MatRef<'_, E>) -> bool {
    let zero = E::faer_zero();
    (0..mat.ncols()).all(|j| (0..mat.nrows()).all(|i| mat.read(i, j) == zero))
}

fn for_each_block<E: ComplexField>(
    grid: &BlockGrid<E>,
    mut f: impl FnMut(usize, usize, usize, usize),
) {
    let mut row = 0;
    for (i, &m) in grid.row_sizes.iter().enumerate() {
        let mut col = 0;
        for (j, &n) in grid.col_sizes.iter().enumerate() {
            f(i, j, row, col);
            col += n;
        }
        row += m;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BlockNode;
    use equator::assert;

    #[test]
    fn dense_round_trip_with_nulls() {
        let a = Mat::from_fn(5, 5, |i, j| (1 + i * 5 + j) as f64);
        let mut h = HMatrix::from_dense_uniform(a.as_ref(), 2);
        assert_eq!(h.as_internal().unwrap().row_sizes(), &[3, 2]);

        let dense = h.to_dense();
        for j in 0..5 {
            for i in 0..5 {
                assert_eq!(dense.read(i, j), a.read(i, j));
            }
        }

        h.as_internal_mut().unwrap().set(0, 1, None);
        let lower = Mat::from_fn(5, 5, |i, j| if i < 3 && j >= 3 { 0.0 } else { 1.0 });
        h.add_dense(1.0, lower.as_ref());
        assert_eq!(h.null_count(), 1);

        h.add_dense(1.0, Mat::from_fn(5, 5, |_, _| 1.0).as_ref());
        assert_eq!(h.null_count(), 0);
        let dense = h.to_dense();
        for j in 0..5 {
            for i in 0..5 {
                let expected = if i < 3 && j >= 3 { 1.0 } else { a.read(i, j) + 2.0 };
                assert_eq!(dense.read(i, j), expected);
            }
        }
    }

    #[test]
    fn set_dense_fills_only_nonzero_null_blocks() {
        let mut h = HMatrix::from_dense_uniform(Mat::<f64>::zeros(4, 4).as_ref(), 2);
        let grid = h.as_internal_mut().unwrap();
        grid.set(0, 1, None);
        grid.set(1, 0, None);

        let src = Mat::from_fn(4, 4, |i, j| if i >= 2 && j < 2 { (i + j) as f64 } else { 0.0 });
        h.set_dense(src.as_ref());
        assert_eq!(h.null_count(), 1);
        assert!(h.get(0, 1).is_none());
        assert_eq!(h.to_dense().read(3, 1), 4.0);
    }

    #[test]
    fn lower_subtraction_skips_upper_blocks() {
        let a = Mat::from_fn(4, 4, |_, _| 3.0f64);
        let mut h = HMatrix::from_dense_uniform(a.as_ref(), 2);
        h.as_internal_mut().unwrap().set(0, 1, None);
        h.sub_dense_lower(Mat::from_fn(4, 4, |_, _| 1.0).as_ref());
        assert!(h.get(0, 1).is_none());
        let dense = h.to_dense();
        for j in 0..4 {
            for i in 0..4 {
                let expected = if i >= j {
                    2.0
                } else if i < 2 && j >= 2 {
                    0.0
                } else {
                    3.0
                };
                assert_eq!(dense.read(i, j), expected);
            }
        }
    }

    #[test]
    fn conform_borrows_matching_partition() {
        let a = Mat::from_fn(4, 4, |i, j| (i + j) as f64);
        let h = HMatrix::from_dense_uniform(a.as_ref(), 2);
        assert!(matches!(h.conform(&[2, 2], &[2, 2]), Cow::Borrowed(_)));

        let split = h.conform(&[1, 3], &[4]);
        assert!(matches!(split, Cow::Owned(_)));
        assert_eq!(split.get(1, 0).unwrap().to_dense().read(0, 3), a.read(1, 3));

        let leaf = HMatrix::leaf(a.clone());
        let grid = leaf.conform(&[2, 2], &[3, 1]);
        assert!(grid.get(1, 1).unwrap().is_leaf());
        assert_eq!(grid.get(1, 1).unwrap().to_dense().read(1, 0), a.read(3, 3));
    }
}
