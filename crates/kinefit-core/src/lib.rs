#![deny(missing_docs)]
#![doc = "Core parameter, boundary, cube and error types shared by the kinefit crates."]

/// Cube aliases and shape descriptors.
pub mod cube;
pub mod errors;
pub mod parameters;
pub mod provenance;
pub mod rng;

pub use cube::{Cube, CubeShape};
pub use errors::{ErrorInfo, KineError};
pub use parameters::{
    GalaxyParameters, ParameterBounds, ParameterMask, ParameterName, PARAMETER_COUNT,
};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
