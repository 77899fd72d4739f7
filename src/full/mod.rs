//! Dense leaf blocks.
//!
//! [`FullMatrix`] is the payload of a leaf of the block tree. It owns a column-major
//! [`faer::Mat`] and, once factorized, the side data produced by the factorization: the row
//! permutation of an LU decomposition, or the diagonal `D` of an LDLT decomposition.
//!
//! The kernels in this module never conjugate. A transposed operand is read as the plain
//! transpose, including for complex scalars.

use crate::Trans;
use equator::assert;
use faer::{perm::PermRef, unzipped, zipped, ComplexField, Mat, MatMut, MatRef};

pub mod factor;
pub mod product;
pub mod solve;

/// Row permutation computed by a partial pivoting LU decomposition.
///
/// Row `i` of the permuted matrix is row `forward[i]` of the original one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pivots {
    forward: Vec<usize>,
    inverse: Vec<usize>,
}

impl Pivots {
    #[inline]
    pub(crate) fn new(forward: Vec<usize>, inverse: Vec<usize>) -> Self {
        Self { forward, inverse }
    }

    /// Returns the forward permutation.
    #[inline]
    pub fn forward(&self) -> &[usize] {
        &self.forward
    }

    #[inline]
    pub(crate) fn as_perm(&self) -> PermRef<'_, usize> {
        PermRef::new_checked(&self.forward, &self.inverse)
    }
}

/// Dense block stored in a leaf of the tree.
#[derive(Clone, Debug)]
pub struct FullMatrix<E: ComplexField> {
    pub(crate) data: Mat<E>,
    pub(crate) pivots: Option<Pivots>,
    pub(crate) diagonal: Option<Vec<E>>,
}

impl<E: ComplexField> FullMatrix<E> {
    /// Wraps a dense matrix.
    #[inline]
    pub fn new(data: Mat<E>) -> Self {
        Self {
            data,
            pivots: None,
            diagonal: None,
        }
    }

    /// Returns a zero block with the given dimensions.
    #[inline]
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self::new(Mat::zeros(nrows, ncols))
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    /// Returns a view over the stored entries.
    ///
    /// After a factorization, this holds the packed factors.
    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, E> {
        self.data.as_ref()
    }

    /// Returns a mutable view over the stored entries.
    #[inline]
    pub fn as_mut(&mut self) -> MatMut<'_, E> {
        self.data.as_mut()
    }

    /// Returns the row permutation of the LU decomposition, if one was computed.
    #[inline]
    pub fn pivots(&self) -> Option<&Pivots> {
        self.pivots.as_ref()
    }

    /// Returns the diagonal `D` of the LDLT decomposition, if one was computed.
    #[inline]
    pub fn diagonal(&self) -> Option<&[E]> {
        self.diagonal.as_deref()
    }

    /// Consumes the block and returns the stored entries.
    #[inline]
    pub fn into_inner(self) -> Mat<E> {
        self.data
    }

    /// Multiplies every entry by `alpha`.
    pub fn scale(&mut self, alpha: E) {
        if alpha == E::faer_one() {
            return;
        }
        if alpha == E::faer_zero() {
            self.data.fill_zero();
            return;
        }
        zipped!(self.data.as_mut()).for_each(|unzipped!(mut x)| x.write(x.read().faer_mul(alpha)));
    }

    /// Computes `self += alpha * src`.
    pub fn add(&mut self, alpha: E, src: MatRef<'_, E>) {
        assert!(all(
            src.nrows() == self.nrows(),
            src.ncols() == self.ncols(),
        ));
        zipped!(self.data.as_mut(), src).for_each(|unzipped!(mut dst, src)| {
            dst.write(dst.read().faer_add(alpha.faer_mul(src.read())))
        });
    }

    /// Computes `self -= src`, only touching the lower triangle (diagonal included).
    pub(crate) fn sub_lower(&mut self, src: MatRef<'_, E>) {
        assert!(all(
            src.nrows() == self.nrows(),
            src.ncols() == self.ncols(),
        ));
        zipped!(self.data.as_mut(), src).for_each_triangular_lower(
            faer::linalg::zip::Diag::Include,
            |unzipped!(mut dst, src)| dst.write(dst.read().faer_sub(src.read())),
        );
    }

    /// Overwrites the entries with `src`. Any factorization data is discarded.
    pub fn copy_from(&mut self, src: MatRef<'_, E>) {
        self.data.copy_from(src);
        self.pivots = None;
        self.diagonal = None;
    }

    /// Scales the rows (`side == Left`) or the columns (`side == Right`) by `diag`, or by its
    /// inverse when `inverse` is set.
    pub fn multiply_with_diag(&mut self, diag: &[E], side: crate::Side, inverse: bool) {
        let factor = |x: E| if inverse { x.faer_inv() } else { x };
        match side {
            crate::Side::Left => {
                assert!(diag.len() == self.nrows());
                let d = Mat::from_fn(self.nrows(), 1, |i, _| factor(diag[i]));
                for j in 0..self.ncols() {
                    zipped!(self.data.as_mut().col_mut(j).as_2d_mut(), d.as_ref())
                        .for_each(|unzipped!(mut x, d)| x.write(x.read().faer_mul(d.read())));
                }
            }
            crate::Side::Right => {
                assert!(diag.len() == self.ncols());
                for j in 0..self.ncols() {
                    let d = factor(diag[j]);
                    zipped!(self.data.as_mut().col_mut(j).as_2d_mut())
                        .for_each(|unzipped!(mut x)| x.write(x.read().faer_mul(d)));
                }
            }
        }
    }
}

/// Returns `mat` or its transpose.
#[inline]
pub(crate) fn op<E: ComplexField>(mat: MatRef<'_, E>, trans: Trans) -> MatRef<'_, E> {
    match trans {
        Trans::No => mat,
        Trans::Yes => mat.transpose(),
    }
}
