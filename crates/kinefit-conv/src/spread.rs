//! Point and line spread functions.
//!
//! Every profile is sampled on a grid whose centre is the pixel at index
//! `len / 2` and normalised to unit sum, matching the kernel convention of the
//! convolution engine.

use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};

use kinefit_core::{ErrorInfo, KineError};

/// `2 sqrt(2 ln 2)`: ratio between a Gaussian FWHM and its sigma.
pub const FWHM_PER_SIGMA: f64 = 2.354_820_045_030_949;

/// Spatial (2D) point spread function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PointSpread {
    /// Elliptical Gaussian.
    Gaussian {
        /// Full width at half maximum along the major axis, in arcsec.
        fwhm: f64,
        /// Major-axis position angle, anti-clockwise from the y axis, in degrees.
        #[serde(default)]
        pa: f64,
        /// Minor to major axis ratio.
        #[serde(default = "default_ba")]
        ba: f64,
    },
    /// Elliptical Moffat profile `(1 + (r / alpha)^2)^-beta`.
    Moffat {
        /// Full width at half maximum, in arcsec. Exclusive with `alpha`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fwhm: Option<f64>,
        /// Core width, in arcsec. Exclusive with `fwhm`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        alpha: Option<f64>,
        /// Power index of the wings.
        #[serde(default = "default_beta")]
        beta: f64,
        /// Major-axis position angle, anti-clockwise from the y axis, in degrees.
        #[serde(default)]
        pa: f64,
        /// Minor to major axis ratio.
        #[serde(default = "default_ba")]
        ba: f64,
    },
}

fn default_ba() -> f64 {
    1.0
}

fn default_beta() -> f64 {
    2.5
}

impl PointSpread {
    /// Circular Gaussian with the given FWHM in arcsec.
    pub fn gaussian(fwhm: f64) -> Self {
        PointSpread::Gaussian {
            fwhm,
            pa: 0.0,
            ba: default_ba(),
        }
    }

    /// Checks widths, axis ratio and the `fwhm`/`alpha` exclusivity.
    pub fn validate(&self) -> Result<(), KineError> {
        let (pa, ba) = match self {
            PointSpread::Gaussian { fwhm, pa, ba } => {
                ensure_positive("psf-fwhm", *fwhm)?;
                (*pa, *ba)
            }
            PointSpread::Moffat {
                fwhm,
                alpha,
                beta,
                pa,
                ba,
            } => {
                match (fwhm, alpha) {
                    (Some(width), None) | (None, Some(width)) => ensure_positive("psf-width", *width)?,
                    _ => {
                        return Err(KineError::Config(
                            ErrorInfo::new(
                                "moffat-width",
                                "a Moffat PSF needs exactly one of fwhm or alpha",
                            )
                            .with_context("fwhm", format!("{fwhm:?}"))
                            .with_context("alpha", format!("{alpha:?}")),
                        ))
                    }
                }
                ensure_positive("moffat-beta", *beta)?;
                (*pa, *ba)
            }
        };
        if !pa.is_finite() || !(ba > 0.0 && ba <= 1.0) {
            return Err(KineError::Config(
                ErrorInfo::new("psf-shape", "PSF axis ratio must lie in (0, 1]")
                    .with_context("pa", pa.to_string())
                    .with_context("ba", ba.to_string()),
            ));
        }
        Ok(())
    }

    /// Full width at half maximum in arcsec.
    pub fn fwhm(&self) -> f64 {
        match self {
            PointSpread::Gaussian { fwhm, .. } => *fwhm,
            PointSpread::Moffat {
                fwhm: Some(fwhm), ..
            } => *fwhm,
            PointSpread::Moffat { alpha, beta, .. } => {
                2.0 * alpha.unwrap_or(f64::NAN) * (2f64.powf(1.0 / beta) - 1.0).sqrt()
            }
        }
    }

    /// Samples the PSF on an `ny x nx` grid with `xy_step` arcsec per pixel.
    pub fn as_image(&self, ny: usize, nx: usize, xy_step: f64) -> Result<Array2<f64>, KineError> {
        self.validate()?;
        ensure_positive("xy-step", xy_step)?;
        let (cy, cx) = ((ny / 2) as f64, (nx / 2) as f64);
        let image = match self {
            PointSpread::Gaussian { fwhm, pa, ba } => {
                let sigma = fwhm / xy_step / FWHM_PER_SIGMA;
                Array2::from_shape_fn((ny, nx), |(j, i)| {
                    let r = elliptical_radius(i as f64 - cx, j as f64 - cy, *pa, *ba);
                    (-0.5 * (r / sigma).powi(2)).exp()
                })
            }
            PointSpread::Moffat {
                fwhm,
                alpha,
                beta,
                pa,
                ba,
            } => {
                let alpha_arcsec = match (fwhm, alpha) {
                    (_, Some(alpha)) => *alpha,
                    (Some(fwhm), None) => fwhm / (2.0 * (2f64.powf(1.0 / beta) - 1.0).sqrt()),
                    (None, None) => f64::NAN,
                };
                let alpha_px = alpha_arcsec / xy_step;
                Array2::from_shape_fn((ny, nx), |(j, i)| {
                    let r = elliptical_radius(i as f64 - cx, j as f64 - cy, *pa, *ba);
                    (1.0 + (r / alpha_px).powi(2)).powf(-beta)
                })
            }
        };
        normalised(image, "psf")
    }
}

/// Spectral (1D) line spread function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LineSpread {
    /// Gaussian line profile.
    Gaussian {
        /// Full width at half maximum, in the spectral unit of the cube.
        fwhm: f64,
    },
}

impl LineSpread {
    /// Gaussian LSF with the given FWHM.
    pub fn gaussian(fwhm: f64) -> Self {
        LineSpread::Gaussian { fwhm }
    }

    /// MUSE resolution model (Bacon et al. 2017) at `wavelength` Angstrom.
    pub fn muse(wavelength: f64) -> Self {
        let fwhm = 5.835e-8 * wavelength * wavelength - 9.080e-4 * wavelength + 5.983;
        LineSpread::Gaussian { fwhm }
    }

    /// Full width at half maximum in spectral units.
    pub fn fwhm(&self) -> f64 {
        match self {
            LineSpread::Gaussian { fwhm } => *fwhm,
        }
    }

    /// Checks the width.
    pub fn validate(&self) -> Result<(), KineError> {
        ensure_positive("lsf-fwhm", self.fwhm())
    }

    /// Samples the LSF on `nz` planes spaced by `z_step` spectral units.
    pub fn as_vector(&self, nz: usize, z_step: f64) -> Result<Array1<f64>, KineError> {
        self.validate()?;
        ensure_positive("z-step", z_step.abs())?;
        let centre = (nz / 2) as f64;
        let sigma = self.fwhm() / z_step.abs() / FWHM_PER_SIGMA;
        let vector = Array1::from_shape_fn(nz, |k| (-0.5 * ((k as f64 - centre) / sigma).powi(2)).exp());
        normalised(vector, "lsf")
    }
}

/// Combines a PSF image and an LSF vector into a `(nz, ny, nx)` kernel.
pub fn extrude(psf: &Array2<f64>, lsf: &Array1<f64>) -> Array3<f64> {
    let (ny, nx) = psf.dim();
    Array3::from_shape_fn((lsf.len(), ny, nx), |(k, j, i)| lsf[k] * psf[[j, i]])
}

fn elliptical_radius(dx: f64, dy: f64, pa_deg: f64, ba: f64) -> f64 {
    let (sin, cos) = pa_deg.to_radians().sin_cos();
    let along = -dx * sin + dy * cos;
    let across = dx * cos + dy * sin;
    (along * along + (across / ba).powi(2)).sqrt()
}

fn normalised<D: ndarray::Dimension>(
    mut values: ndarray::Array<f64, D>,
    what: &str,
) -> Result<ndarray::Array<f64, D>, KineError> {
    let total = values.sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(KineError::Config(
            ErrorInfo::new("degenerate-spread", "spread function has no finite positive mass")
                .with_context("function", what)
                .with_context("sum", total.to_string()),
        ));
    }
    values.mapv_inplace(|value| value / total);
    Ok(values)
}

fn ensure_positive(code: &str, value: f64) -> Result<(), KineError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(KineError::Config(
            ErrorInfo::new(code, "value must be finite and positive")
                .with_context("value", value.to_string()),
        ))
    }
}
