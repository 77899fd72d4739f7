//! Cluster trees over a cloud of degrees of freedom.
//!
//! A [`ClusterTree`] recursively bisects the set of points, reordering them so that every cluster
//! owns a contiguous range of the permuted ordering. Block trees are built by pairing the clusters
//! of a row tree and a column tree, see [`crate::builder`].

use crate::HMatError;
use faer::MatRef;

/// Strategy used to bisect a cluster.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ClusteringMethod {
    /// Splits at the median coordinate along the largest extent of the bounding box, which
    /// yields balanced halves.
    #[default]
    Median,
    /// Splits at the middle of the largest extent of the bounding box.
    Geometric,
    /// Splits geometrically, falling back to the median when one half holds less than a fifth of
    /// the points.
    Hybrid,
}

const HYBRID_THRESHOLD: f64 = 0.2;

/// Axis-aligned bounding box.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBox {
    min: Vec<f64>,
    max: Vec<f64>,
}

impl BoundingBox {
    fn of(points: MatRef<'_, f64>, indices: &[usize]) -> Self {
        let dim = points.ncols();
        let mut min = vec![f64::INFINITY; dim];
        let mut max = vec![f64::NEG_INFINITY; dim];
        for &idx in indices {
            for d in 0..dim {
                let x = points.read(idx, d);
                min[d] = min[d].min(x);
                max[d] = max[d].max(x);
            }
        }
        Self { min, max }
    }

    /// Returns the lower corner.
    #[inline]
    pub fn min(&self) -> &[f64] {
        &self.min
    }

    /// Returns the upper corner.
    #[inline]
    pub fn max(&self) -> &[f64] {
        &self.max
    }

    /// Returns the length of the diagonal.
    pub fn diameter(&self) -> f64 {
        self.min
            .iter()
            .zip(&self.max)
            .map(|(lo, hi)| (hi - lo) * (hi - lo))
            .sum::<f64>()
            .sqrt()
    }

    /// Returns the euclidean distance between `self` and `other`, zero if they intersect.
    pub fn distance_to(&self, other: &BoundingBox) -> f64 {
        let mut acc = 0.0;
        for d in 0..self.min.len() {
            let gap = (other.min[d] - self.max[d]).max(self.min[d] - other.max[d]);
            if gap > 0.0 {
                acc += gap * gap;
            }
        }
        acc.sqrt()
    }

    fn largest_axis(&self) -> usize {
        let mut axis = 0;
        let mut extent = f64::NEG_INFINITY;
        for d in 0..self.min.len() {
            let e = self.max[d] - self.min[d];
            if e > extent {
                axis = d;
                extent = e;
            }
        }
        axis
    }
}

#[derive(Clone, Debug)]
struct Node {
    offset: usize,
    size: usize,
    depth: usize,
    bbox: BoundingBox,
    children: Option<[usize; 2]>,
}

/// Binary cluster tree over a set of points.
#[derive(Clone, Debug)]
pub struct ClusterTree {
    nodes: Vec<Node>,
    // position in the cluster ordering -> original index
    permutation: Vec<usize>,
    method: ClusteringMethod,
}

/// Borrowed view of one cluster of a [`ClusterTree`].
#[derive(Copy, Clone, Debug)]
pub struct Cluster<'a> {
    tree: &'a ClusterTree,
    id: usize,
}

impl ClusterTree {
    /// Builds the cluster tree of `points`, stored one point per row, subdividing clusters until
    /// they hold at most `max_leaf_size` points.
    ///
    /// # Errors
    /// Returns [`HMatError::InvalidSettings`] if `max_leaf_size` is zero, or if `points` has no
    /// points or no coordinates.
    pub fn new(
        points: MatRef<'_, f64>,
        max_leaf_size: usize,
        method: ClusteringMethod,
    ) -> Result<Self, HMatError> {
        if max_leaf_size == 0 {
            return Err(HMatError::InvalidSettings {
                reason: "max_leaf_size must be positive",
            });
        }
        if points.nrows() == 0 || points.ncols() == 0 {
            return Err(HMatError::InvalidSettings {
                reason: "the point cloud is empty",
            });
        }

        let n = points.nrows();
        let mut tree = Self {
            nodes: Vec::new(),
            permutation: (0..n).collect(),
            method,
        };
        let mut stack = vec![tree.push(points, 0, n, 0)];
        while let Some(id) = stack.pop() {
            let Node {
                offset,
                size,
                depth,
                ..
            } = tree.nodes[id];
            if size <= max_leaf_size {
                continue;
            }
            let axis = tree.nodes[id].bbox.largest_axis();
            let range = &mut tree.permutation[offset..offset + size];
            let left = match bisect(points, range, axis, method) {
                Some(left) => left,
                None => continue,
            };

            let first = tree.push(points, offset, left, depth + 1);
            let second = tree.push(points, offset + left, size - left, depth + 1);
            tree.nodes[id].children = Some([first, second]);
            stack.push(second);
            stack.push(first);
        }

        log::debug!(
            target: "faer_hmat",
            "cluster tree: {n} points, {} clusters, {method:?} bisection",
            tree.nodes.len(),
        );
        Ok(tree)
    }

    fn push(&mut self, points: MatRef<'_, f64>, offset: usize, size: usize, depth: usize) -> usize {
        let bbox = BoundingBox::of(points, &self.permutation[offset..offset + size]);
        self.nodes.push(Node {
            offset,
            size,
            depth,
            bbox,
            children: None,
        });
        self.nodes.len() - 1
    }

    /// Returns the root cluster, holding every point.
    #[inline]
    pub fn root(&self) -> Cluster<'_> {
        Cluster { tree: self, id: 0 }
    }

    /// Returns the number of clusters.
    #[inline]
    pub fn nodes_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.permutation.len()
    }

    /// Returns `true` if the tree holds no points. Never the case for a constructed tree.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.permutation.is_empty()
    }

    /// Returns the depth of the deepest cluster, the root having depth zero.
    pub fn depth(&self) -> usize {
        self.nodes.iter().map(|node| node.depth).max().unwrap_or(0)
    }

    /// Returns the bisection strategy the tree was built with.
    #[inline]
    pub fn method(&self) -> ClusteringMethod {
        self.method
    }

    /// Maps a position of the cluster ordering to the original index of the point.
    #[inline]
    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }
}

impl<'a> Cluster<'a> {
    #[inline]
    fn node(&self) -> &'a Node {
        &self.tree.nodes[self.id]
    }

    /// Returns the first position of the cluster in the cluster ordering.
    #[inline]
    pub fn offset(&self) -> usize {
        self.node().offset
    }

    /// Returns the number of points of the cluster.
    #[inline]
    pub fn size(&self) -> usize {
        self.node().size
    }

    /// Returns the depth of the cluster, the root having depth zero.
    #[inline]
    pub fn depth(&self) -> usize {
        self.node().depth
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.node().children.is_none()
    }

    /// Returns the two halves of the cluster, or `None` for a leaf.
    pub fn children(&self) -> Option<[Cluster<'a>; 2]> {
        self.node().children.map(|[first, second]| {
            [
                Cluster {
                    tree: self.tree,
                    id: first,
                },
                Cluster {
                    tree: self.tree,
                    id: second,
                },
            ]
        })
    }

    /// Returns the original indices of the points of the cluster.
    #[inline]
    pub fn indices(&self) -> &'a [usize] {
        let node = self.node();
        &self.tree.permutation[node.offset..node.offset + node.size]
    }

    #[inline]
    pub fn bounding_box(&self) -> &'a BoundingBox {
        &self.node().bbox
    }

    /// Returns the diameter of the bounding box.
    #[inline]
    pub fn diameter(&self) -> f64 {
        self.node().bbox.diameter()
    }

    /// Returns the distance between the bounding boxes of `self` and `other`.
    #[inline]
    pub fn distance_to(&self, other: &Cluster<'_>) -> f64 {
        self.node().bbox.distance_to(&other.node().bbox)
    }

    /// Returns `true` if `self` and `other` are the same cluster of the same tree.
    #[inline]
    pub fn is_same(&self, other: &Cluster<'_>) -> bool {
        core::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

/// Reorders `range` so that its first `left` points form the first half, and returns `left`, or
/// `None` if the points cannot be separated.
fn bisect(
    points: MatRef<'_, f64>,
    range: &mut [usize],
    axis: usize,
    method: ClusteringMethod,
) -> Option<usize> {
    let size = range.len();
    let coord = |idx: usize| points.read(idx, axis);

    let geometric = |range: &mut [usize]| {
        let (lo, hi) = range
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &idx| {
                (lo.min(coord(idx)), hi.max(coord(idx)))
            });
        let mid = 0.5 * (lo + hi);
        range.sort_unstable_by(|&a, &b| coord(a).total_cmp(&coord(b)));
        range.partition_point(|&idx| coord(idx) < mid)
    };
    let median = |range: &mut [usize]| {
        range.sort_by(|&a, &b| coord(a).total_cmp(&coord(b)));
        size / 2
    };

    let left = match method {
        ClusteringMethod::Median => median(range),
        ClusteringMethod::Geometric => geometric(range),
        ClusteringMethod::Hybrid => {
            let left = geometric(&mut *range);
            if (left.min(size - left) as f64) < HYBRID_THRESHOLD * size as f64 {
                median(&mut *range)
            } else {
                left
            }
        }
    };

    if left == 0 || left == size {
        None
    } else {
        Some(left)
    }
}
