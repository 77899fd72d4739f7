//! `faer-hmat` factorizes hierarchical matrices (H-matrices) with recursive block algorithms
//! built on top of [`faer`].
//!
//! A hierarchical matrix is stored as a block tree. Every node is either a leaf, holding a dense
//! block, or an internal node, holding a grid of children. A child may be absent, in which case
//! it stands for an exact zero block. Algorithms skip it as an operand, and store a zero leaf in
//! its place when an update reaches it.
//!
//! The following operations are provided on [`HMatrix`]:
//! - LU decomposition, [`recursion::lu::lu_in_place`],
//! - symmetric LDLT decomposition, [`recursion::ldlt::ldlt_in_place`],
//! - Cholesky decomposition, [`recursion::llt::llt_in_place`],
//! - block Gauss-Jordan inversion, [`recursion::inverse::inverse_in_place`],
//! - triangular solves, [`recursion::solve`],
//! - products and symmetric rank updates, [`recursion::product`].
//!
//! Block trees are usually assembled from a point cloud: [`cluster::ClusterTree`] reorders the
//! points into nested clusters, and [`builder::HMatrixBuilder`] pairs the clusters into blocks,
//! subdividing the pairs that an [`admissibility::AdmissibilityCondition`] rejects.
//! [`HMatrix::from_dense_uniform`] builds a tree out of a dense matrix instead.
//!
//! Factorizations are computed in place. Within one elimination step, independent block
//! operations are dispatched on the rayon thread pool when the given [`Parallelism`] allows it.
//!
//! # Example
//! ```
//! use faer::Mat;
//! use faer_hmat::{Factorization, HMatrix, Parallelism};
//!
//! let n = 8;
//! let a = Mat::<f64>::from_fn(n, n, |i, j| if i == j { 4.0 } else { 1.0 / (1.0 + (i + j) as f64) });
//! let h = HMatrix::from_dense_uniform(a.as_ref(), 2);
//!
//! let factors = h.factorize(Factorization::Lu, Parallelism::None).unwrap();
//! let mut x = Mat::<f64>::from_fn(n, 1, |i, _| i as f64);
//! factors.solve_in_place(x.as_mut(), Parallelism::None).unwrap();
//! ```

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(non_snake_case)]

pub mod admissibility;
pub mod builder;
pub mod cluster;
mod error;
pub mod factorized;
pub mod full;
pub mod hmatrix;
pub mod recursion;
pub mod settings;

pub use cluster::{ClusterTree, ClusteringMethod};
pub use error::HMatError;
pub use factorized::FactorizedHMatrix;
pub use faer::{ComplexField, Mat, MatMut, MatRef, Parallelism};
pub use full::FullMatrix;
pub use hmatrix::{BlockGrid, BlockNode, HMatrix};
pub use settings::HMatSettings;

/// Whether an operand should be implicitly transposed when read or not.
///
/// Transposition never conjugates, including for complex scalars.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Trans {
    /// Do not transpose.
    No,
    /// Do transpose.
    Yes,
}

/// Specifies on which side a diagonal is applied.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Side {
    /// `D * M`, scales the rows.
    Left,
    /// `M * D`, scales the columns.
    Right,
}

/// Factorization computed by [`HMatrix::factorize`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Factorization {
    /// `A = L * U`, with row pivoting inside the diagonal leaves.
    #[default]
    Lu,
    /// `A = L * D * L^T`, for symmetric matrices whose lower triangle is stored.
    Ldlt,
    /// `A = L * L^T`, for symmetric positive definite matrices whose lower triangle is stored.
    Llt,
    /// `A` is replaced by its inverse.
    Inverse,
}

/// Returns the version of the library.
#[inline]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
