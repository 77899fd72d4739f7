use super::{FullMatrix, Pivots};
use crate::HMatError;
use equator::assert;
use faer::{
    dyn_stack::{GlobalPodBuffer, PodStack},
    linalg::{
        cholesky::{
            ldlt_diagonal::compute::{raw_cholesky_in_place, raw_cholesky_in_place_req},
            llt::compute::{cholesky_in_place, cholesky_in_place_req},
        },
        lu::partial_pivoting::compute::{lu_in_place, lu_in_place_req},
        triangular_solve,
    },
    perm::permute_rows,
    ComplexField, Mat, Parallelism,
};

impl<E: ComplexField> FullMatrix<E> {
    /// Computes `P * A = L * U` in place, where `L` has a unit diagonal.
    ///
    /// `L` is stored in the strictly lower triangle, `U` in the upper triangle, and `P` in
    /// [`FullMatrix::pivots`].
    ///
    /// # Errors
    /// Returns [`HMatError::SingularPivot`] if a diagonal entry of `U` is exactly zero.
    #[track_caller]
    pub fn lu_decomposition(&mut self, parallelism: Parallelism) -> Result<(), HMatError> {
        assert!(self.nrows() == self.ncols());
        let n = self.nrows();

        let mut forward = vec![0usize; n];
        let mut inverse = vec![0usize; n];
        let mut mem = GlobalPodBuffer::new(lu_in_place_req::<usize, E>(
            n,
            n,
            parallelism,
            Default::default(),
        )?);
        let _ = lu_in_place(
            self.data.as_mut(),
            &mut forward,
            &mut inverse,
            parallelism,
            PodStack::new(&mut mem),
            Default::default(),
        );
        self.pivots = Some(Pivots::new(forward, inverse));
        self.diagonal = None;

        for i in 0..n {
            if self.data.read(i, i) == E::faer_zero() {
                return Err(HMatError::SingularPivot { index: i });
            }
        }
        Ok(())
    }

    /// Computes `A = L * D * L^T` in place, reading only the lower triangle of `A`.
    ///
    /// On exit, the lower triangle holds `L` with an explicit unit diagonal, the strict upper
    /// triangle is zero, and `D` is stored in [`FullMatrix::diagonal`].
    ///
    /// # Errors
    /// Returns [`HMatError::SingularPivot`] if a pivot of `D` is exactly zero.
    #[track_caller]
    pub fn ldlt_decomposition(&mut self, parallelism: Parallelism) -> Result<(), HMatError> {
        assert!(self.nrows() == self.ncols());
        let n = self.nrows();

        let d = if coe::is_same::<E, E::Real>() {
            // plain and conjugate transposes coincide for real scalars
            let mut mem = GlobalPodBuffer::new(raw_cholesky_in_place_req::<E>(
                n,
                parallelism,
                Default::default(),
            )?);
            let _ = raw_cholesky_in_place(
                self.data.as_mut(),
                Default::default(),
                parallelism,
                PodStack::new(&mut mem),
                Default::default(),
            );
            // the diagonal holds the inverses of the pivots
            let d: Vec<E> = (0..n).map(|j| self.data.read(j, j).faer_inv()).collect();
            if let Some(index) = d.iter().position(|&pivot| pivot == E::faer_zero()) {
                return Err(HMatError::SingularPivot { index });
            }
            d
        } else {
            self.ldlt_unblocked()?
        };

        let a = &mut self.data;
        for j in 0..n {
            for i in 0..j {
                a.write(i, j, E::faer_zero());
            }
            a.write(j, j, E::faer_one());
        }
        self.diagonal = Some(d);
        self.pivots = None;
        Ok(())
    }

    fn ldlt_unblocked(&mut self) -> Result<Vec<E>, HMatError> {
        let n = self.nrows();
        let a = &mut self.data;
        let mut d = Vec::with_capacity(n);

        for j in 0..n {
            // d_j = a_jj - sum_p l_jp^2 d_p
            let mut pivot = a.read(j, j);
            for p in 0..j {
                let l = a.read(j, p);
                pivot = pivot.faer_sub(l.faer_mul(l).faer_mul(d[p]));
            }
            if pivot == E::faer_zero() {
                return Err(HMatError::SingularPivot { index: j });
            }
            d.push(pivot);

            let inv = pivot.faer_inv();
            for i in j + 1..n {
                let mut acc = a.read(i, j);
                for p in 0..j {
                    acc = acc.faer_sub(a.read(i, p).faer_mul(d[p]).faer_mul(a.read(j, p)));
                }
                a.write(i, j, acc.faer_mul(inv));
            }
        }
        Ok(d)
    }

    /// Computes `A = L * L^T` in place, reading only the lower triangle of `A`.
    ///
    /// On exit, the lower triangle holds `L` and the strict upper triangle is zero.
    ///
    /// # Errors
    /// Returns [`HMatError::NonPositivePivot`] if a pivot has a non-positive real part.
    #[track_caller]
    pub fn llt_decomposition(&mut self, parallelism: Parallelism) -> Result<(), HMatError> {
        assert!(self.nrows() == self.ncols());
        let n = self.nrows();

        if coe::is_same::<E, E::Real>() {
            let mut mem = GlobalPodBuffer::new(cholesky_in_place_req::<E>(
                n,
                parallelism,
                Default::default(),
            )?);
            cholesky_in_place(
                self.data.as_mut(),
                Default::default(),
                parallelism,
                PodStack::new(&mut mem),
                Default::default(),
            )
            .map_err(|err| HMatError::NonPositivePivot {
                index: err.non_positive_definite_minor - 1,
            })?;
        } else {
            self.llt_unblocked()?;
        }

        let a = &mut self.data;
        for j in 0..n {
            for i in 0..j {
                a.write(i, j, E::faer_zero());
            }
        }
        self.pivots = None;
        self.diagonal = None;
        Ok(())
    }

    fn llt_unblocked(&mut self) -> Result<(), HMatError> {
        let n = self.nrows();
        let a = &mut self.data;

        for j in 0..n {
            let mut pivot = a.read(j, j);
            for p in 0..j {
                let l = a.read(j, p);
                pivot = pivot.faer_sub(l.faer_mul(l));
            }
            if !(pivot.faer_real() > E::Real::faer_zero()) {
                return Err(HMatError::NonPositivePivot { index: j });
            }
            let l_jj = pivot.faer_sqrt();
            a.write(j, j, l_jj);

            let inv = l_jj.faer_inv();
            for i in j + 1..n {
                let mut acc = a.read(i, j);
                for p in 0..j {
                    acc = acc.faer_sub(a.read(i, p).faer_mul(a.read(j, p)));
                }
                a.write(i, j, acc.faer_mul(inv));
            }
        }
        Ok(())
    }

    /// Replaces the block by its inverse.
    ///
    /// # Errors
    /// Returns [`HMatError::SingularPivot`] if the block is singular.
    #[track_caller]
    pub fn inverse(&mut self, parallelism: Parallelism) -> Result<(), HMatError> {
        assert!(self.nrows() == self.ncols());
        let n = self.nrows();

        let mut lu = FullMatrix::new(core::mem::replace(&mut self.data, Mat::new()));
        let result = lu.lu_decomposition(parallelism);
        if let Err(err) = result {
            self.data = lu.data;
            return Err(err);
        }

        let identity = Mat::<E>::identity(n, n);
        let mut inv = Mat::<E>::zeros(n, n);
        if let Some(pivots) = &lu.pivots {
            permute_rows(inv.as_mut(), identity.as_ref(), pivots.as_perm());
        }
        triangular_solve::solve_unit_lower_triangular_in_place(
            lu.data.as_ref(),
            inv.as_mut(),
            parallelism,
        );
        triangular_solve::solve_upper_triangular_in_place(
            lu.data.as_ref(),
            inv.as_mut(),
            parallelism,
        );

        self.data = inv;
        self.pivots = None;
        self.diagonal = None;
        Ok(())
    }
}
