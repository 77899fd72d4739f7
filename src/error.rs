use faer::dyn_stack::SizeOverflow;

/// Error that can occur while factorizing or solving with a hierarchical matrix.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum HMatError {
    /// A diagonal pivot was exactly zero. `index` is the row of the pivot, counted from the first
    /// row of the matrix the operation was called on.
    SingularPivot { index: usize },
    /// A Cholesky pivot had a non-positive real part. `index` is the row of the pivot, counted
    /// from the first row of the matrix the operation was called on.
    NonPositivePivot { index: usize },
    /// The size of a workspace could not be represented.
    WorkspaceOverflow,
    /// A caller-provided matrix did not have the expected dimensions.
    DimensionMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    /// The settings failed validation.
    InvalidSettings { reason: &'static str },
}

impl HMatError {
    /// Moves the reported pivot index by `offset` rows.
    ///
    /// Used while the error travels out of a diagonal block, so that the index ends up relative to
    /// the outermost matrix.
    #[inline]
    pub(crate) fn shifted(self, offset: usize) -> Self {
        match self {
            HMatError::SingularPivot { index } => HMatError::SingularPivot {
                index: index + offset,
            },
            HMatError::NonPositivePivot { index } => HMatError::NonPositivePivot {
                index: index + offset,
            },
            other => other,
        }
    }
}

impl From<SizeOverflow> for HMatError {
    #[inline]
    fn from(_: SizeOverflow) -> Self {
        HMatError::WorkspaceOverflow
    }
}

impl core::fmt::Display for HMatError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for HMatError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_only_moves_pivot_errors() {
        assert_eq!(
            HMatError::SingularPivot { index: 1 }.shifted(4),
            HMatError::SingularPivot { index: 5 }
        );
        assert_eq!(
            HMatError::NonPositivePivot { index: 0 }.shifted(2),
            HMatError::NonPositivePivot { index: 2 }
        );
        assert_eq!(
            HMatError::WorkspaceOverflow.shifted(3),
            HMatError::WorkspaceOverflow
        );
    }

    #[test]
    fn display_is_debug() {
        let err = HMatError::SingularPivot { index: 7 };
        assert_eq!(format!("{err}"), format!("{err:?}"));
    }
}
