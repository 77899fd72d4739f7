//! Admissibility conditions, deciding which pairs of clusters form a far-field block.

use crate::cluster::Cluster;

/// Decides whether the block coupling two clusters is admissible.
///
/// Admissible blocks are not subdivided any further by [`crate::builder::HMatrixBuilder`].
pub trait AdmissibilityCondition: Send + Sync {
    /// Returns `true` if the block `rows x cols` is admissible.
    fn is_admissible(&self, rows: Cluster<'_>, cols: Cluster<'_>) -> bool;

    /// Returns a short human readable description of the condition.
    fn describe(&self) -> String;
}

/// Hackbusch's condition: `min(diam(rows), diam(cols)) <= eta * dist(rows, cols)`.
///
/// Clusters whose bounding boxes touch are never admissible, and neither are blocks holding more
/// than `max_elements_per_block` entries, so that large blocks keep getting subdivided.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StandardAdmissibility {
    eta: f64,
    max_elements_per_block: usize,
}

impl StandardAdmissibility {
    pub const DEFAULT_MAX_ELEMENTS_PER_BLOCK: usize = 5_000_000;

    #[inline]
    pub fn new(eta: f64) -> Self {
        Self {
            eta,
            max_elements_per_block: Self::DEFAULT_MAX_ELEMENTS_PER_BLOCK,
        }
    }

    #[inline]
    pub fn with_max_elements_per_block(self, max_elements_per_block: usize) -> Self {
        Self {
            max_elements_per_block,
            ..self
        }
    }

    #[inline]
    pub fn set_eta(&mut self, eta: f64) {
        self.eta = eta;
    }

    #[inline]
    pub fn eta(&self) -> f64 {
        self.eta
    }

    #[inline]
    pub fn max_elements_per_block(&self) -> usize {
        self.max_elements_per_block
    }
}

impl Default for StandardAdmissibility {
    #[inline]
    fn default() -> Self {
        Self::new(2.0)
    }
}

impl AdmissibilityCondition for StandardAdmissibility {
    fn is_admissible(&self, rows: Cluster<'_>, cols: Cluster<'_>) -> bool {
        if rows.size().saturating_mul(cols.size()) > self.max_elements_per_block {
            return false;
        }
        let dist = rows.distance_to(&cols);
        dist > 0.0 && rows.diameter().min(cols.diameter()) <= self.eta * dist
    }

    fn describe(&self) -> String {
        format!(
            "standard admissibility, eta = {}, at most {} elements per block",
            self.eta, self.max_elements_per_block
        )
    }
}

/// Admissible when the clusters are further apart than the sum of their largest influence radii.
///
/// `radii[i]` is the influence radius of the degree of freedom of original index `i`.
#[derive(Clone, Debug, PartialEq)]
pub struct InfluenceRadiusAdmissibility {
    radii: Vec<f64>,
}

impl InfluenceRadiusAdmissibility {
    #[inline]
    pub fn new(radii: Vec<f64>) -> Self {
        Self { radii }
    }

    fn max_radius(&self, cluster: Cluster<'_>) -> f64 {
        cluster
            .indices()
            .iter()
            .map(|&idx| self.radii[idx])
            .fold(0.0, f64::max)
    }
}

impl AdmissibilityCondition for InfluenceRadiusAdmissibility {
    fn is_admissible(&self, rows: Cluster<'_>, cols: Cluster<'_>) -> bool {
        rows.distance_to(&cols) > self.max_radius(rows) + self.max_radius(cols)
    }

    fn describe(&self) -> String {
        format!("influence radius admissibility over {} dofs", self.radii.len())
    }
}

/// Never admissible: the block tree is subdivided down to the leaves of the cluster trees.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NeverAdmissible;

impl AdmissibilityCondition for NeverAdmissible {
    #[inline]
    fn is_admissible(&self, _: Cluster<'_>, _: Cluster<'_>) -> bool {
        false
    }

    fn describe(&self) -> String {
        "never admissible".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{ClusterTree, ClusteringMethod};
    use faer::Mat;

    // two groups of four points on a line, [0, 3] and [10, 13]
    fn two_groups() -> ClusterTree {
        let points = Mat::from_fn(8, 1, |i, _| if i < 4 { i as f64 } else { 6.0 + i as f64 });
        ClusterTree::new(points.as_ref(), 4, ClusteringMethod::Median).unwrap()
    }

    #[test]
    fn standard_condition() {
        let tree = two_groups();
        let [a, b] = tree.root().children().unwrap();

        // diam = 3, dist = 7
        assert!(StandardAdmissibility::new(0.5).is_admissible(a, b));
        assert!(!StandardAdmissibility::new(0.4).is_admissible(a, b));
        assert!(!StandardAdmissibility::new(100.0).is_admissible(a, a));

        let mut small = StandardAdmissibility::new(2.0).with_max_elements_per_block(15);
        assert!(!small.is_admissible(a, b));
        small = small.with_max_elements_per_block(16);
        assert!(small.is_admissible(a, b));
        small.set_eta(0.1);
        assert!(!small.is_admissible(a, b));
        assert_eq!(small.eta(), 0.1);
        assert!(small.describe().contains("eta = 0.1"));
    }

    #[test]
    fn influence_radius_condition() {
        let tree = two_groups();
        let [a, b] = tree.root().children().unwrap();
        let mut radii = vec![1.0; 8];
        assert!(InfluenceRadiusAdmissibility::new(radii.clone()).is_admissible(a, b));
        radii[7] = 6.5;
        assert!(!InfluenceRadiusAdmissibility::new(radii).is_admissible(a, b));
    }

    #[test]
    fn never_admissible() {
        let tree = two_groups();
        let [a, b] = tree.root().children().unwrap();
        assert!(!NeverAdmissible.is_admissible(a, b));
        assert_eq!(NeverAdmissible.describe(), "never admissible");
    }
}
