#![deny(missing_docs)]

//! Parametric kinematic models turning a galaxy parameter vector into a
//! clean spectral cube and its flux, velocity and dispersion maps.

/// Thick rotating disk model.
pub mod disk;
/// Observed flux estimate used for default boundaries.
pub mod flux;
/// Model trait and the data it exchanges with the sampler.
pub mod model;
pub mod profiles;

pub use disk::{DiskModel, LineDoublet};
pub use flux::estimate_flux;
pub use model::{KinematicModel, ModelContext, ModelCube};
pub use profiles::{DispersionProfile, FluxProfile, RotationCurve, ThicknessProfile};
