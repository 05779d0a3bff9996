use kinefit_conv::Convolver;
use kinefit_core::{Cube, CubeShape, GalaxyParameters, KineError};
use kinefit_model::{KinematicModel, ModelCube};

/// Clean model followed by the instrument convolution, for one cube shape.
pub struct ForwardModel<'m, M: ?Sized> {
    model: &'m M,
    convolver: Convolver,
    z_step_kms: f64,
}

impl<'m, M: KinematicModel + ?Sized> ForwardModel<'m, M> {
    /// Wraps a model and the convolver built for the observed shape.
    pub fn new(model: &'m M, convolver: Convolver, z_step_kms: f64) -> Self {
        Self {
            model,
            convolver,
            z_step_kms,
        }
    }

    /// Kinematic model being evaluated.
    pub fn model(&self) -> &'m M {
        self.model
    }

    /// Shape of the produced cubes.
    pub fn shape(&self) -> CubeShape {
        self.convolver.shape()
    }

    /// Velocity width of one spectral plane, in km/s.
    pub fn z_step_kms(&self) -> f64 {
        self.z_step_kms
    }

    /// Clean and convolved cubes for `params`.
    ///
    /// The model sees a sanitised copy; `params` itself is left untouched so
    /// that boundary checks keep operating on the raw random-walk state.
    pub fn evaluate(&mut self, params: &GalaxyParameters) -> Result<(ModelCube, Cube), KineError> {
        let mut sanitized = *params;
        self.model.sanitize_parameters(&mut sanitized);
        let clean = self
            .model
            .clean_cube(&sanitized, self.shape(), self.z_step_kms)?;
        let convolved = self.convolver.convolve(&clean.cube)?;
        Ok((clean, convolved))
    }

    /// Convolved cube for `params`.
    pub fn convolved(&mut self, params: &GalaxyParameters) -> Result<Cube, KineError> {
        self.evaluate(params).map(|(_, convolved)| convolved)
    }
}
