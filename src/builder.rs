//! Assembly of block trees from a pair of cluster trees.

use crate::{
    admissibility::{AdmissibilityCondition, StandardAdmissibility},
    cluster::{Cluster, ClusterTree},
    hmatrix::is_zero,
    recursion::par,
    HMatError, HMatSettings, HMatrix,
};
use faer::{ComplexField, Mat, MatRef, Parallelism};

/// Builds the block tree of a matrix whose rows and columns are clustered by two cluster trees.
///
/// The clusters are paired recursively, starting from the roots. A pair becomes a dense leaf when
/// it is admissible or when both clusters are leaves, otherwise it becomes an internal node over
/// the pairs of their children. A leaf cluster paired with an internal one is kept whole.
///
/// Entries are indexed in the cluster ordering of the trees, see [`ClusterTree::permutation`].
#[derive(Copy, Clone)]
pub struct HMatrixBuilder<'a> {
    rows: &'a ClusterTree,
    cols: &'a ClusterTree,
    admissibility: &'a dyn AdmissibilityCondition,
    drop_zero_blocks: bool,
}

impl core::fmt::Debug for HMatrixBuilder<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HMatrixBuilder")
            .field("rows", &self.rows.len())
            .field("cols", &self.cols.len())
            .field("admissibility", &self.admissibility.describe())
            .field("drop_zero_blocks", &self.drop_zero_blocks)
            .finish()
    }
}

impl<'a> HMatrixBuilder<'a> {
    #[inline]
    pub fn new(
        rows: &'a ClusterTree,
        cols: &'a ClusterTree,
        admissibility: &'a dyn AdmissibilityCondition,
    ) -> Self {
        Self {
            rows,
            cols,
            admissibility,
            drop_zero_blocks: false,
        }
    }

    /// Stores off-diagonal blocks that assemble to exact zeros as absent blocks.
    #[inline]
    pub fn drop_zero_blocks(self, drop_zero_blocks: bool) -> Self {
        Self {
            drop_zero_blocks,
            ..self
        }
    }

    /// Assembles the block tree, calling `entry(i, j)` with the original indices of a row and a
    /// column for every stored entry.
    pub fn build<E: ComplexField>(
        &self,
        entry: impl Sync + Fn(usize, usize) -> E,
        parallelism: Parallelism,
    ) -> HMatrix<E> {
        let rows = self.rows.root();
        let cols = self.cols.root();
        // the root block lies on the diagonal only if both sides share their clustering
        let diagonal = core::ptr::eq(self.rows, self.cols);

        let tree = match self.block(rows, cols, diagonal, &entry, parallelism) {
            Some(tree) => tree,
            // a dropped root is a zero matrix
            None => HMatrix::leaf(Mat::zeros(rows.size(), cols.size())),
        };
        log::debug!(
            target: "faer_hmat",
            "assembled a {}x{} block tree: {} leaves, {} null blocks, depth {}",
            tree.nrows(),
            tree.ncols(),
            tree.leaf_count(),
            tree.null_count(),
            tree.depth(),
        );
        tree
    }

    fn block<E: ComplexField, F: Sync + Fn(usize, usize) -> E>(
        &self,
        rows: Cluster<'a>,
        cols: Cluster<'a>,
        diagonal: bool,
        entry: &F,
        parallelism: Parallelism,
    ) -> Option<HMatrix<E>> {
        let both_leaves = rows.is_leaf() && cols.is_leaf();
        if both_leaves || (!diagonal && self.admissibility.is_admissible(rows, cols)) {
            let (row_indices, col_indices) = (rows.indices(), cols.indices());
            let mat = Mat::from_fn(row_indices.len(), col_indices.len(), |i, j| {
                entry(row_indices[i], col_indices[j])
            });
            if self.drop_zero_blocks && !diagonal && is_zero(mat.as_ref()) {
                return None;
            }
            return Some(HMatrix::leaf(mat));
        }

        let halves = |cluster: Cluster<'a>| match cluster.children() {
            Some(children) => children.to_vec(),
            None => vec![cluster],
        };
        let (row_children, col_children) = (halves(rows), halves(cols));
        let tasks: Vec<_> = (0..row_children.len())
            .flat_map(|i| (0..col_children.len()).map(move |j| (i, j)))
            .collect();
        let children = par::map(tasks, parallelism, |(i, j)| {
            self.block(
                row_children[i],
                col_children[j],
                diagonal && i == j,
                entry,
                parallelism,
            )
        });

        if self.drop_zero_blocks && !diagonal && children.iter().all(Option::is_none) {
            return None;
        }
        Some(HMatrix::from_blocks(
            row_children.iter().map(Cluster::size).collect(),
            col_children.iter().map(Cluster::size).collect(),
            children,
        ))
    }
}

/// Clusters `points` and assembles the square matrix `entry(i, j)` over them, following
/// `settings`.
///
/// The returned block tree is expressed in the cluster ordering: its entry `(p, q)` is
/// `entry(perm[p], perm[q])`, with `perm` the permutation of the returned cluster tree.
///
/// # Errors
/// Returns [`HMatError::InvalidSettings`] if `settings` does not validate, or if `points` is
/// empty.
pub fn assemble<E: ComplexField>(
    points: MatRef<'_, f64>,
    entry: impl Sync + Fn(usize, usize) -> E,
    settings: &HMatSettings,
) -> Result<(ClusterTree, HMatrix<E>), HMatError> {
    settings.validate()?;
    let tree = ClusterTree::new(points, settings.max_leaf_size, settings.clustering)?;
    let admissibility = StandardAdmissibility::new(settings.eta);
    let matrix = HMatrixBuilder::new(&tree, &tree, &admissibility)
        .drop_zero_blocks(settings.drop_zero_blocks)
        .build(entry, settings.parallelism);
    Ok((tree, matrix))
}
