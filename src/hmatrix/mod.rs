//! Block tree of a hierarchical matrix.
//!
//! An [`HMatrix`] is either a [`HMatrix::Leaf`], holding a dense [`FullMatrix`], or an
//! [`HMatrix::Internal`] node holding a [`BlockGrid`]: an `R x C` grid of children, stored in
//! row-major order. A child slot may be empty, in which case the corresponding block is exactly
//! zero.

use crate::full::FullMatrix;
use equator::assert;
use faer::{ComplexField, Mat, MatRef};

mod dense;

pub(crate) use dense::is_zero;

/// Read-only view of the structure of a block tree node.
pub trait BlockNode {
    /// Returns `true` if the node has no children.
    fn is_leaf(&self) -> bool;
    /// Returns the number of block rows. Zero for a leaf.
    fn nr_child_row(&self) -> usize;
    /// Returns the number of block columns. Zero for a leaf.
    fn nr_child_col(&self) -> usize;
    /// Returns the child at block position `(i, j)`, or `None` if it is absent.
    fn get(&self, i: usize, j: usize) -> Option<&Self>;
}

/// Returns the number of levels of the tree below and including `node`.
pub fn depth<N: BlockNode>(node: &N) -> usize {
    let mut max = 0;
    for i in 0..node.nr_child_row() {
        for j in 0..node.nr_child_col() {
            if let Some(child) = node.get(i, j) {
                max = Ord::max(max, depth(child));
            }
        }
    }
    max + 1
}

/// Returns the number of leaves of the tree.
pub fn leaf_count<N: BlockNode>(node: &N) -> usize {
    if node.is_leaf() {
        return 1;
    }
    let mut count = 0;
    for i in 0..node.nr_child_row() {
        for j in 0..node.nr_child_col() {
            if let Some(child) = node.get(i, j) {
                count += leaf_count(child);
            }
        }
    }
    count
}

/// Returns the number of absent children in the tree.
pub fn null_count<N: BlockNode>(node: &N) -> usize {
    let mut count = 0;
    for i in 0..node.nr_child_row() {
        for j in 0..node.nr_child_col() {
            match node.get(i, j) {
                Some(child) => count += null_count(child),
                None => count += 1,
            }
        }
    }
    count
}

/// Node of a hierarchical matrix.
#[derive(Clone, Debug)]
pub enum HMatrix<E: ComplexField> {
    /// Dense block.
    Leaf(FullMatrix<E>),
    /// Grid of sub-blocks.
    Internal(BlockGrid<E>),
}

/// Grid of children of an internal node.
#[derive(Clone, Debug)]
pub struct BlockGrid<E: ComplexField> {
    pub(crate) row_sizes: Vec<usize>,
    pub(crate) col_sizes: Vec<usize>,
    pub(crate) children: Vec<Option<Box<HMatrix<E>>>>,
}

impl<E: ComplexField> BlockGrid<E> {
    /// Creates a grid from its row and column partitions and its children, given in row-major
    /// order.
    ///
    /// # Panics
    /// Panics if the number of children does not match the partitions, or if a present child
    /// does not have the dimensions of its block.
    #[track_caller]
    pub fn new(
        row_sizes: Vec<usize>,
        col_sizes: Vec<usize>,
        children: Vec<Option<HMatrix<E>>>,
    ) -> Self {
        assert!(children.len() == row_sizes.len() * col_sizes.len());
        let ncol = col_sizes.len();
        for (idx, child) in children.iter().enumerate() {
            if let Some(child) = child {
                let (i, j) = (idx / ncol, idx % ncol);
                assert!(all(
                    child.nrows() == row_sizes[i],
                    child.ncols() == col_sizes[j],
                ));
            }
        }
        Self {
            row_sizes,
            col_sizes,
            children: children.into_iter().map(|c| c.map(Box::new)).collect(),
        }
    }

    /// Splits a dense matrix into leaves following the given partitions.
    #[track_caller]
    pub fn from_dense(mat: MatRef<'_, E>, row_sizes: &[usize], col_sizes: &[usize]) -> Self {
        assert!(all(
            row_sizes.iter().sum::<usize>() == mat.nrows(),
            col_sizes.iter().sum::<usize>() == mat.ncols(),
        ));
        let mut children = Vec::with_capacity(row_sizes.len() * col_sizes.len());
        let mut row = 0;
        for &m in row_sizes {
            let mut col = 0;
            for &n in col_sizes {
                let block = mat.submatrix(row, col, m, n).to_owned();
                children.push(Some(Box::new(HMatrix::Leaf(FullMatrix::new(block)))));
                col += n;
            }
            row += m;
        }
        Self {
            row_sizes: row_sizes.to_vec(),
            col_sizes: col_sizes.to_vec(),
            children,
        }
    }

    #[inline]
    pub fn nr_child_row(&self) -> usize {
        self.row_sizes.len()
    }

    #[inline]
    pub fn nr_child_col(&self) -> usize {
        self.col_sizes.len()
    }

    #[inline]
    pub fn row_sizes(&self) -> &[usize] {
        &self.row_sizes
    }

    #[inline]
    pub fn col_sizes(&self) -> &[usize] {
        &self.col_sizes
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.row_sizes.iter().sum()
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.col_sizes.iter().sum()
    }

    /// Returns the first row of each block row.
    pub fn row_offsets(&self) -> Vec<usize> {
        offsets(&self.row_sizes)
    }

    /// Returns the first column of each block column.
    pub fn col_offsets(&self) -> Vec<usize> {
        offsets(&self.col_sizes)
    }

    #[inline]
    #[track_caller]
    pub fn get(&self, i: usize, j: usize) -> Option<&HMatrix<E>> {
        assert!(all(i < self.nr_child_row(), j < self.nr_child_col()));
        self.children[i * self.nr_child_col() + j].as_deref()
    }

    #[inline]
    #[track_caller]
    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut HMatrix<E>> {
        assert!(all(i < self.nr_child_row(), j < self.nr_child_col()));
        let ncol = self.nr_child_col();
        self.children[i * ncol + j].as_deref_mut()
    }

    /// Replaces the child at `(i, j)`, returning the previous one.
    #[track_caller]
    pub fn set(&mut self, i: usize, j: usize, child: Option<HMatrix<E>>) -> Option<HMatrix<E>> {
        assert!(all(i < self.nr_child_row(), j < self.nr_child_col()));
        if let Some(child) = &child {
            assert!(all(
                child.nrows() == self.row_sizes[i],
                child.ncols() == self.col_sizes[j],
            ));
        }
        let ncol = self.nr_child_col();
        core::mem::replace(&mut self.children[i * ncol + j], child.map(Box::new)).map(|c| *c)
    }

    /// Returns the child at `(i, j)`, storing a zero leaf there first if it is absent.
    #[track_caller]
    pub(crate) fn materialize(&mut self, i: usize, j: usize) -> &mut HMatrix<E> {
        assert!(all(i < self.nr_child_row(), j < self.nr_child_col()));
        let (m, n) = (self.row_sizes[i], self.col_sizes[j]);
        let ncol = self.nr_child_col();
        self.children[i * ncol + j].get_or_insert_with(|| Box::new(HMatrix::leaf(Mat::zeros(m, n))))
    }

    /// Stores a zero leaf at every absent position `(i, j)` for which `reached(self, i, j)`
    /// holds, so that an update can be accumulated there.
    pub(crate) fn fill_in(&mut self, reached: impl Fn(&Self, usize, usize) -> bool) {
        let ncol = self.nr_child_col();
        let targets: Vec<usize> = (0..self.children.len())
            .filter(|&idx| self.children[idx].is_none() && reached(self, idx / ncol, idx % ncol))
            .collect();
        if !targets.is_empty() {
            log::trace!(
                target: "faer_hmat",
                "filling in {} null blocks of a {}x{} grid",
                targets.len(),
                self.nr_child_row(),
                ncol,
            );
        }
        for idx in targets {
            self.materialize(idx / ncol, idx % ncol);
        }
    }
}

pub(crate) fn offsets(sizes: &[usize]) -> Vec<usize> {
    let mut acc = 0;
    sizes
        .iter()
        .map(|&size| {
            let start = acc;
            acc += size;
            start
        })
        .collect()
}

impl<E: ComplexField> BlockNode for HMatrix<E> {
    #[inline]
    fn is_leaf(&self) -> bool {
        matches!(self, HMatrix::Leaf(_))
    }

    #[inline]
    fn nr_child_row(&self) -> usize {
        match self {
            HMatrix::Leaf(_) => 0,
            HMatrix::Internal(grid) => grid.nr_child_row(),
        }
    }

    #[inline]
    fn nr_child_col(&self) -> usize {
        match self {
            HMatrix::Leaf(_) => 0,
            HMatrix::Internal(grid) => grid.nr_child_col(),
        }
    }

    #[inline]
    fn get(&self, i: usize, j: usize) -> Option<&Self> {
        match self {
            HMatrix::Leaf(_) => None,
            HMatrix::Internal(grid) => grid.get(i, j),
        }
    }
}

impl<E: ComplexField> HMatrix<E> {
    /// Creates a leaf holding `mat`.
    #[inline]
    pub fn leaf(mat: Mat<E>) -> Self {
        HMatrix::Leaf(FullMatrix::new(mat))
    }

    /// Creates an internal node. See [`BlockGrid::new`].
    #[inline]
    #[track_caller]
    pub fn from_blocks(
        row_sizes: Vec<usize>,
        col_sizes: Vec<usize>,
        children: Vec<Option<HMatrix<E>>>,
    ) -> Self {
        HMatrix::Internal(BlockGrid::new(row_sizes, col_sizes, children))
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        match self {
            HMatrix::Leaf(full) => full.nrows(),
            HMatrix::Internal(grid) => grid.nrows(),
        }
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        match self {
            HMatrix::Leaf(full) => full.ncols(),
            HMatrix::Internal(grid) => grid.ncols(),
        }
    }

    #[inline]
    pub fn as_leaf(&self) -> Option<&FullMatrix<E>> {
        match self {
            HMatrix::Leaf(full) => Some(full),
            HMatrix::Internal(_) => None,
        }
    }

    #[inline]
    pub fn as_internal(&self) -> Option<&BlockGrid<E>> {
        match self {
            HMatrix::Leaf(_) => None,
            HMatrix::Internal(grid) => Some(grid),
        }
    }

    #[inline]
    pub fn as_internal_mut(&mut self) -> Option<&mut BlockGrid<E>> {
        match self {
            HMatrix::Leaf(_) => None,
            HMatrix::Internal(grid) => Some(grid),
        }
    }

    /// Returns the number of levels of the tree.
    #[inline]
    pub fn depth(&self) -> usize {
        depth(self)
    }

    /// Returns the number of leaves of the tree.
    #[inline]
    pub fn leaf_count(&self) -> usize {
        leaf_count(self)
    }

    /// Returns the number of absent blocks in the tree.
    #[inline]
    pub fn null_count(&self) -> usize {
        null_count(self)
    }

    /// Multiplies every stored entry by `alpha`.
    pub fn scale(&mut self, alpha: E) {
        match self {
            HMatrix::Leaf(full) => full.scale(alpha),
            HMatrix::Internal(grid) => {
                for child in grid.children.iter_mut().flatten() {
                    child.scale(alpha);
                }
            }
        }
    }

    /// Concatenates the `D` factors stored in the diagonal leaves after an LDLT decomposition.
    ///
    /// # Panics
    /// Panics if a diagonal block is absent or was not LDLT-factorized.
    #[track_caller]
    pub fn diagonal_factor(&self) -> Vec<E> {
        let mut out = Vec::with_capacity(self.nrows());
        self.collect_diagonal(&mut out);
        out
    }

    #[track_caller]
    fn collect_diagonal(&self, out: &mut Vec<E>) {
        match self {
            HMatrix::Leaf(full) => {
                let d = full.diagonal();
                assert!(d.is_some());
                if let Some(d) = d {
                    out.extend_from_slice(d);
                }
            }
            HMatrix::Internal(grid) => {
                assert!(grid.nr_child_row() == grid.nr_child_col());
                for k in 0..grid.nr_child_row() {
                    let diag = grid.get(k, k);
                    assert!(diag.is_some());
                    if let Some(diag) = diag {
                        diag.collect_diagonal(out);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equator::assert;

    fn sample(n: usize) -> Mat<f64> {
        Mat::from_fn(n, n, |i, j| (i * n + j) as f64)
    }

    #[test]
    fn structure_of_uniform_tree() {
        let h = HMatrix::from_dense_uniform(sample(8).as_ref(), 2);
        assert_eq!(h.nrows(), 8);
        assert_eq!(h.ncols(), 8);
        assert_eq!(h.depth(), 3);
        assert_eq!(h.leaf_count(), 16);
        assert_eq!(h.null_count(), 0);
        assert!(!h.is_leaf());
        assert_eq!(h.nr_child_row(), 2);
        assert!(h.get(1, 0).unwrap().get(0, 1).unwrap().is_leaf());
    }

    #[test]
    fn grid_accessors() {
        let mut grid = BlockGrid::new(
            vec![1, 2],
            vec![2],
            vec![Some(HMatrix::leaf(Mat::<f64>::zeros(1, 2))), None],
        );
        assert_eq!(grid.nrows(), 3);
        assert_eq!(grid.row_offsets(), vec![0, 1]);
        assert!(grid.get(1, 0).is_none());

        let previous = grid.set(1, 0, Some(HMatrix::leaf(Mat::from_fn(2, 2, |_, _| 1.0))));
        assert!(previous.is_none());
        assert_eq!(grid.get(1, 0).unwrap().to_dense().read(1, 1), 1.0);
        assert_eq!(offsets(&[3, 0, 2]), vec![0, 3, 3]);
    }

    #[test]
    #[should_panic]
    fn grid_rejects_mismatched_child() {
        BlockGrid::new(
            vec![1, 2],
            vec![2],
            vec![Some(HMatrix::leaf(Mat::<f64>::zeros(2, 2))), None],
        );
    }

    #[test]
    fn null_children_are_counted() {
        let h = HMatrix::from_blocks(
            vec![2, 2],
            vec![2, 2],
            vec![
                Some(HMatrix::leaf(Mat::<f64>::identity(2, 2))),
                None,
                None,
                Some(HMatrix::leaf(Mat::<f64>::identity(2, 2))),
            ],
        );
        assert_eq!(h.null_count(), 2);
        assert_eq!(h.leaf_count(), 2);
        assert_eq!(depth(&h), 2);
    }
}
