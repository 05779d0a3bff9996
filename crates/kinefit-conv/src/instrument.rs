//! Instrument descriptions and the memoising cube convolver.

use ndarray::Array3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kinefit_core::{Cube, CubeShape, ErrorInfo, KineError};

use crate::convolution::{convolve_same_with, Kernel, KernelSpectrum};
use crate::fft::FftPlans;
use crate::spread::{extrude, LineSpread, PointSpread};

/// Speed of light used to convert spectral steps, in km/s.
pub const SPEED_OF_LIGHT_KMS: f64 = 3e5;

/// Instrument observing the cube: sampling steps and spread functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Display name.
    pub name: String,
    /// Spatial step, in arcsec per pixel.
    pub xy_step: f64,
    /// Spectral step, in `z_cunit` per plane.
    pub z_step: f64,
    /// Spectral coordinate of the line centre, in `z_cunit`.
    pub z_central: f64,
    /// Spectral unit label.
    pub z_cunit: String,
    /// Point spread function; `None` disables convolution.
    #[serde(default)]
    pub psf: Option<PointSpread>,
    /// Line spread function; `None` disables convolution.
    #[serde(default)]
    pub lsf: Option<LineSpread>,
}

impl Instrument {
    /// Velocity width of one spectral plane, in km/s.
    pub fn z_step_kms(&self) -> f64 {
        SPEED_OF_LIGHT_KMS * self.z_step / self.z_central
    }

    /// Checks steps and spread functions.
    pub fn validate(&self) -> Result<(), KineError> {
        for (field, value) in [
            ("xy_step", self.xy_step),
            ("z_step", self.z_step),
            ("z_central", self.z_central),
        ] {
            if !(value.is_finite() && value != 0.0) {
                return Err(KineError::Config(
                    ErrorInfo::new("instrument-step", "instrument sampling value is not usable")
                        .with_context("instrument", self.name.clone())
                        .with_context("field", field)
                        .with_context("value", value.to_string()),
                ));
            }
        }
        if let Some(psf) = &self.psf {
            psf.validate()?;
        }
        if let Some(lsf) = &self.lsf {
            lsf.validate()?;
        }
        Ok(())
    }

    /// 3D kernel for a cube of `shape`, or `None` when a spread function is missing.
    pub fn kernel(&self, shape: CubeShape) -> Result<Option<Array3<f64>>, KineError> {
        match (&self.psf, &self.lsf) {
            (Some(psf), Some(lsf)) => {
                let image = psf.as_image(shape.ny, shape.nx, self.xy_step)?;
                let vector = lsf.as_vector(shape.nz, self.z_step)?;
                Ok(Some(extrude(&image, &vector)))
            }
            _ => Ok(None),
        }
    }

    /// Builds the convolver used for every forward model of `shape`.
    pub fn convolver(&self, shape: CubeShape) -> Result<Convolver, KineError> {
        let kernel = self.kernel(shape)?;
        if kernel.is_none() {
            warn!(
                instrument = %self.name,
                "instrument has no PSF or no LSF; model cubes are not convolved"
            );
        }
        Ok(Convolver {
            shape,
            kernel,
            spectrum: None,
            plans: FftPlans::new(),
        })
    }
}

/// Known instrument configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstrumentPreset {
    /// MUSE wide field mode.
    #[default]
    MuseWfm,
    /// MUSE narrow field mode.
    MuseNfm,
    /// KMOS; `z_central` must come from the cube.
    Kmos,
    /// SINFONI K band, 250 mas scale.
    SinfoniK250,
    /// SINFONI K band, 100 mas scale.
    SinfoniK100,
    /// SINFONI H band, 250 mas scale.
    SinfoniH250,
    /// SINFONI J band, 250 mas scale.
    SinfoniJ250,
    /// SINFONI J band, 100 mas scale.
    SinfoniJ100,
    /// No defaults: every value must be supplied.
    Generic,
}

struct PresetDefaults {
    name: &'static str,
    xy_step: Option<f64>,
    z_step: Option<f64>,
    z_central: Option<f64>,
    z_cunit: &'static str,
    psf: Option<PointSpread>,
    lsf_fwhm: Option<f64>,
}

impl InstrumentPreset {
    fn defaults(&self) -> PresetDefaults {
        let sinfoni_psf = Some(PointSpread::Gaussian {
            fwhm: 1.2,
            pa: 90.0,
            ba: 0.8,
        });
        let sinfoni = |name: &'static str,
                       xy_step: f64,
                       z_step: f64,
                       z_central: f64,
                       lsf_fwhm: f64| PresetDefaults {
            name,
            xy_step: Some(xy_step),
            z_step: Some(z_step),
            z_central: Some(z_central),
            z_cunit: "micron",
            psf: sinfoni_psf.clone(),
            lsf_fwhm: Some(lsf_fwhm),
        };
        match self {
            InstrumentPreset::MuseWfm | InstrumentPreset::MuseNfm => PresetDefaults {
                name: if *self == InstrumentPreset::MuseWfm {
                    "MUSE-WFM"
                } else {
                    "MUSE-NFM"
                },
                xy_step: Some(if *self == InstrumentPreset::MuseWfm {
                    0.2
                } else {
                    0.025
                }),
                z_step: Some(1.25),
                z_central: Some(6564.0),
                z_cunit: "Angstrom",
                psf: Some(PointSpread::gaussian(1.0)),
                lsf_fwhm: None,
            },
            InstrumentPreset::Kmos => PresetDefaults {
                name: "KMOS",
                xy_step: Some(0.2),
                z_step: Some(0.0002),
                z_central: None,
                z_cunit: "micron",
                psf: Some(PointSpread::Gaussian {
                    fwhm: 0.6,
                    pa: 90.0,
                    ba: 0.8,
                }),
                lsf_fwhm: Some(0.00065),
            },
            InstrumentPreset::SinfoniK250 => sinfoni("SINFONI-K250", 0.125, 2.45e-4, 2.20, 0.00065),
            InstrumentPreset::SinfoniK100 => sinfoni("SINFONI-K100", 0.05, 2.45e-4, 2.20, 0.00065),
            InstrumentPreset::SinfoniH250 => sinfoni("SINFONI-H250", 0.125, 1.95e-4, 1.50, 0.00078),
            InstrumentPreset::SinfoniJ250 => sinfoni("SINFONI-J250", 0.125, 1.45e-4, 1.20, 0.00065),
            InstrumentPreset::SinfoniJ100 => sinfoni("SINFONI-J100", 0.05, 1.45e-4, 1.20, 0.00065),
            InstrumentPreset::Generic => PresetDefaults {
                name: "Generic",
                xy_step: None,
                z_step: None,
                z_central: None,
                z_cunit: "",
                psf: None,
                lsf_fwhm: None,
            },
        }
    }
}

/// YAML-configurable instrument: a preset plus optional overrides.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Preset providing the default values.
    #[serde(default)]
    pub preset: InstrumentPreset,
    /// Spatial step override, in arcsec.
    #[serde(default)]
    pub xy_step: Option<f64>,
    /// Spectral step override.
    #[serde(default)]
    pub z_step: Option<f64>,
    /// Line centre override.
    #[serde(default)]
    pub z_central: Option<f64>,
    /// Spectral unit label override.
    #[serde(default)]
    pub z_cunit: Option<String>,
    /// PSF override.
    #[serde(default)]
    pub psf: Option<PointSpread>,
    /// LSF override.
    #[serde(default)]
    pub lsf: Option<LineSpread>,
    /// Drop the PSF entirely (disables convolution).
    #[serde(default)]
    pub without_psf: bool,
    /// Drop the LSF entirely (disables convolution).
    #[serde(default)]
    pub without_lsf: bool,
}

impl InstrumentConfig {
    /// Resolves the preset and overrides into a validated [`Instrument`].
    pub fn build(&self) -> Result<Instrument, KineError> {
        let defaults = self.preset.defaults();
        let name = defaults.name;
        let z_cunit = defaults.z_cunit;
        let missing = |field: &str| {
            KineError::Config(
                ErrorInfo::new("instrument-missing", "instrument value is required")
                    .with_context("instrument", name)
                    .with_context("field", field)
                    .with_hint(format!("set instrument.{field} in the fit configuration")),
            )
        };
        let xy_step = self
            .xy_step
            .or(defaults.xy_step)
            .ok_or_else(|| missing("xy_step"))?;
        let z_step = self
            .z_step
            .or(defaults.z_step)
            .ok_or_else(|| missing("z_step"))?;
        let z_central = self
            .z_central
            .or(defaults.z_central)
            .ok_or_else(|| missing("z_central"))?;

        let psf = match (self.without_psf, self.psf.clone().or(defaults.psf)) {
            (true, _) => None,
            (false, Some(psf)) => Some(psf),
            (false, None) => return Err(missing("psf")),
        };
        let is_muse = matches!(
            self.preset,
            InstrumentPreset::MuseWfm | InstrumentPreset::MuseNfm
        );
        let lsf = match (self.without_lsf, &self.lsf, defaults.lsf_fwhm) {
            (true, _, _) => None,
            (false, Some(lsf), _) => Some(lsf.clone()),
            (false, None, Some(fwhm)) => Some(LineSpread::gaussian(fwhm)),
            (false, None, None) if is_muse => {
                info!(z_central, "LSF width set from the MUSE resolution curve");
                Some(LineSpread::muse(z_central))
            }
            (false, None, None) => return Err(missing("lsf")),
        };

        let instrument = Instrument {
            name: name.to_string(),
            xy_step,
            z_step,
            z_central,
            z_cunit: self
                .z_cunit
                .clone()
                .unwrap_or_else(|| z_cunit.to_string()),
            psf,
            lsf,
        };
        instrument.validate()?;
        Ok(instrument)
    }
}

/// Convolves model cubes with an instrument kernel, memoising its spectrum.
///
/// The first call transforms the kernel; later calls reuse the stored
/// spectrum read-only, along with the FFT plans of the padded shape. Without a
/// kernel the convolver is the identity.
#[derive(Debug, Clone)]
pub struct Convolver {
    shape: CubeShape,
    kernel: Option<Array3<f64>>,
    spectrum: Option<KernelSpectrum>,
    plans: FftPlans,
}

impl Convolver {
    /// Convolver that returns its input unchanged.
    pub fn identity(shape: CubeShape) -> Self {
        Self {
            shape,
            kernel: None,
            spectrum: None,
            plans: FftPlans::new(),
        }
    }

    /// Convolver around an explicit kernel.
    pub fn with_kernel(shape: CubeShape, kernel: Array3<f64>) -> Self {
        Self {
            shape,
            kernel: Some(kernel),
            spectrum: None,
            plans: FftPlans::new(),
        }
    }

    /// Returns true when no kernel is configured.
    pub fn is_identity(&self) -> bool {
        self.kernel.is_none()
    }

    /// Cube shape the convolver was built for.
    pub fn shape(&self) -> CubeShape {
        self.shape
    }

    /// Spatial kernel, if any.
    pub fn kernel(&self) -> Option<&Array3<f64>> {
        self.kernel.as_ref()
    }

    /// Memoised kernel spectrum, once the first convolution ran.
    pub fn spectrum(&self) -> Option<&KernelSpectrum> {
        self.spectrum.as_ref()
    }

    /// FFT plans cached by earlier convolutions.
    pub fn plans(&self) -> &FftPlans {
        &self.plans
    }

    /// Convolves `cube` with the instrument kernel.
    pub fn convolve(&mut self, cube: &Cube) -> Result<Cube, KineError> {
        let Some(kernel) = &self.kernel else {
            return Ok(cube.clone());
        };
        if let Some(spectrum) = &self.spectrum {
            let out = convolve_same_with(cube.view(), Kernel::Spectrum(spectrum), &mut self.plans)?;
            return Ok(out.data);
        }
        let out = convolve_same_with(cube.view(), Kernel::spatial(kernel.view()), &mut self.plans)?;
        debug!(
            padded = ?out.spectrum.as_ref().map(|s| s.padded_shape().to_vec()),
            plans = self.plans.len(),
            "kernel spectrum memoised"
        );
        self.spectrum = out.spectrum;
        Ok(out.data)
    }
}
