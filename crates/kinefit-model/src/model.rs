use ndarray::Array2;
use serde::{Deserialize, Serialize};

use kinefit_core::{Cube, CubeShape, GalaxyParameters, KineError, ParameterBounds};

use crate::flux::estimate_flux;

/// What a model knows about the observation when it proposes defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelContext {
    /// Shape of the observed cube.
    pub shape: CubeShape,
    /// Total flux estimated from the observed cube.
    pub flux_estimate: f64,
}

impl ModelContext {
    /// Context for an observed cube.
    pub fn observe(cube: &Cube) -> Self {
        Self {
            shape: CubeShape::of(cube),
            flux_estimate: estimate_flux(cube),
        }
    }
}

/// Clean (unconvolved) model cube together with the maps it was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelCube {
    /// Spectral cube with axes `(spectral, y, x)`.
    pub cube: Cube,
    /// Flux per spaxel; sums to the model flux.
    pub flux_map: Array2<f64>,
    /// Flux-weighted line-of-sight velocity, NaN where there is no flux.
    pub velocity_map: Array2<f64>,
    /// Total line-of-sight dispersion, NaN where there is no flux.
    pub dispersion_map: Array2<f64>,
}

/// Parametric kinematic model fitted by the sampler.
pub trait KinematicModel: Send + Sync {
    /// Short display name.
    fn name(&self) -> &str;

    /// Checks the model settings before a run.
    fn validate(&self) -> Result<(), KineError> {
        Ok(())
    }

    /// Default sampling boundaries for an observation.
    fn default_bounds(&self, ctx: &ModelContext) -> ParameterBounds;

    /// Model-specific starting point; NaN fields fall back to the bounds.
    fn initial_parameters(&self, _ctx: &ModelContext) -> GalaxyParameters {
        GalaxyParameters::nan()
    }

    /// Tunes the proposal amplitude computed from the boundaries.
    ///
    /// The amplitude arrives as `sqrt((max - min)² / 12) · p / v` for `p`
    /// parameters and `v` voxels.
    fn adjust_random_amplitude(&self, _ctx: &ModelContext, _amplitude: &mut GalaxyParameters) {}

    /// Canonicalises a proposed vector before it is turned into a cube.
    fn sanitize_parameters(&self, params: &mut GalaxyParameters) {
        if params.inclination < 0.0 {
            params.pa += 180.0;
        }
        params.pa = params.pa.rem_euclid(360.0);
    }

    /// Canonicalises a chain row once sampling is over.
    fn sanitize_chain_row(&self, params: &mut GalaxyParameters) {
        if params.maximum_velocity < 0.0 {
            params.maximum_velocity = -params.maximum_velocity;
            params.pa += 180.0;
        }
        params.pa = params.pa.rem_euclid(360.0);
    }

    /// Builds the clean cube of `shape` for `params`.
    fn clean_cube(
        &self,
        params: &GalaxyParameters,
        shape: CubeShape,
        z_step_kms: f64,
    ) -> Result<ModelCube, KineError>;
}
