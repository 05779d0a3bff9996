#![deny(missing_docs)]

//! Spread functions, instrument presets and the FFT convolution engine used to
//! bring clean kinematic model cubes to the resolution of an observation.

pub mod convolution;
mod fft;
pub mod instrument;
pub mod spread;

pub use convolution::{
    convolve_1d, convolve_2d, convolve_3d, convolve_same, convolve_same_with, padded_length,
    ConvolutionOutput, Kernel, KernelSpectrum,
};
pub use fft::FftPlans;
pub use instrument::{Convolver, Instrument, InstrumentConfig, InstrumentPreset};
pub use spread::{extrude, LineSpread, PointSpread};
