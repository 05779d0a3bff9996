//! Goodness-of-fit statistics between an observed and a model cube.

use serde::{Deserialize, Serialize};

use kinefit_core::errors::ErrorInfo;
use kinefit_core::{Cube, CubeShape, KineError, ParameterMask};

/// Chi-square variant minimised by the sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChiStatistic {
    /// `(D - M)² / V`.
    #[default]
    Gaussian,
    /// Modified Neyman: `(M - D)² / max(D, 1)`.
    Neyman,
    /// Mighell (1999): `(D + min(D, 1) - M)² / (D + 1)`.
    Mighell,
    /// Cash statistic: `M - D + D ln(D / M)`.
    Cstat,
    /// Pearson: `(M - D)² / M`.
    Pearson,
}

impl ChiStatistic {
    /// Contribution of one voxel with data `d`, model `m` and variance `v`.
    pub fn term(&self, d: f64, m: f64, v: f64) -> f64 {
        match self {
            ChiStatistic::Gaussian => (d - m).powi(2) / v,
            ChiStatistic::Neyman => (m - d).powi(2) / d.max(1.0),
            ChiStatistic::Mighell => (d + d.min(1.0) - m).powi(2) / (d + 1.0),
            ChiStatistic::Cstat => m - d + d * (d / m).ln(),
            ChiStatistic::Pearson => (m - d).powi(2) / m,
        }
    }
}

/// Observed cube, its variance and the statistic used to compare models.
#[derive(Debug, Clone)]
pub struct ChiSquare<'a> {
    data: &'a Cube,
    variance: &'a Cube,
    statistic: ChiStatistic,
    finite_voxels: usize,
}

impl<'a> ChiSquare<'a> {
    /// Binds an observation; data and variance must share a shape.
    pub fn new(data: &'a Cube, variance: &'a Cube, statistic: ChiStatistic) -> Result<Self, KineError> {
        if data.dim() != variance.dim() {
            return Err(KineError::Config(
                ErrorInfo::new("variance-shape", "variance cube does not match the data cube")
                    .with_context("data", format!("{:?}", data.dim()))
                    .with_context("variance", format!("{:?}", variance.dim())),
            ));
        }
        let finite_voxels = data
            .iter()
            .zip(variance.iter())
            .filter(|(d, v)| (*d * *d / *v).is_finite())
            .count();
        Ok(Self {
            data,
            variance,
            statistic,
            finite_voxels,
        })
    }

    /// Statistic in use.
    pub fn statistic(&self) -> ChiStatistic {
        self.statistic
    }

    /// Shape of the observation.
    pub fn shape(&self) -> CubeShape {
        CubeShape::of(self.data)
    }

    /// Number of voxels where `D² / V` is finite.
    pub fn finite_voxels(&self) -> usize {
        self.finite_voxels
    }

    /// Degrees of freedom `N - k_free - 1` for the known parameters in `known`.
    pub fn degrees_of_freedom(&self, known: &ParameterMask) -> f64 {
        self.finite_voxels as f64 - known.free_count() as f64 - 1.0
    }

    /// Sum of the finite per-voxel terms for a model cube.
    pub fn evaluate(&self, model: &Cube) -> f64 {
        self.data
            .iter()
            .zip(model.iter())
            .zip(self.variance.iter())
            .map(|((&d, &m), &v)| self.statistic.term(d, m, v))
            .filter(|term| term.is_finite())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_vanish_on_a_perfect_model() {
        for statistic in [
            ChiStatistic::Gaussian,
            ChiStatistic::Neyman,
            ChiStatistic::Cstat,
            ChiStatistic::Pearson,
        ] {
            assert_eq!(statistic.term(4.0, 4.0, 2.0), 0.0);
        }
        assert!((ChiStatistic::Mighell.term(0.5, 1.0, 1.0)).abs() < 1e-12);
    }

    #[test]
    fn non_finite_voxels_are_skipped() {
        let mut data = Cube::from_elem((1, 2, 2), 1.0);
        data[[0, 0, 0]] = f64::NAN;
        let variance = Cube::from_elem((1, 2, 2), 0.5);
        let chi = ChiSquare::new(&data, &variance, ChiStatistic::Gaussian).unwrap();
        assert_eq!(chi.finite_voxels(), 3);
        let model = Cube::zeros((1, 2, 2));
        assert_eq!(chi.evaluate(&model), 6.0);
        assert_eq!(chi.degrees_of_freedom(&ParameterMask::none()), 3.0 - 10.0 - 1.0);
    }
}
