use crate::{cluster::ClusteringMethod, Factorization, HMatError};
use faer::Parallelism;

/// Parameters for assembling and factorizing a hierarchical matrix with
/// [`crate::builder::assemble`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HMatSettings {
    /// Largest number of degrees of freedom held by a leaf cluster.
    pub max_leaf_size: usize,
    /// Admissibility factor of [`StandardAdmissibility`](crate::admissibility::StandardAdmissibility).
    pub eta: f64,
    pub clustering: ClusteringMethod,
    pub factorization: Factorization,
    /// Whether off-diagonal leaves that assemble to exact zeros are stored as absent blocks.
    pub drop_zero_blocks: bool,
    pub parallelism: Parallelism,
}

impl Default for HMatSettings {
    #[inline]
    fn default() -> Self {
        Self {
            max_leaf_size: 100,
            eta: 2.0,
            clustering: ClusteringMethod::Median,
            factorization: Factorization::Lu,
            drop_zero_blocks: true,
            parallelism: faer::get_global_parallelism(),
        }
    }
}

impl HMatSettings {
    /// Checks that the parameters are usable.
    ///
    /// # Errors
    /// Returns [`HMatError::InvalidSettings`] naming the first offending parameter.
    pub fn validate(&self) -> Result<(), HMatError> {
        if self.max_leaf_size == 0 {
            return Err(HMatError::InvalidSettings {
                reason: "max_leaf_size must be positive",
            });
        }
        if !(self.eta.is_finite() && self.eta >= 0.0) {
            return Err(HMatError::InvalidSettings {
                reason: "eta must be finite and non-negative",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let settings = HMatSettings::default();
        assert_eq!(settings.validate(), Ok(()));
        assert_eq!(settings.factorization, Factorization::Lu);
    }

    #[test]
    fn invalid_values() {
        let settings = HMatSettings {
            max_leaf_size: 0,
            ..HMatSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(HMatError::InvalidSettings { .. })
        ));

        for eta in [-1.0, f64::NAN, f64::INFINITY] {
            let settings = HMatSettings {
                eta,
                ..HMatSettings::default()
            };
            assert!(settings.validate().is_err());
        }
    }
}
