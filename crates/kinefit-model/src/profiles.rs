//! Radial, vertical, rotation and dispersion profiles of the disk model.

use std::f64::consts::FRAC_2_PI;

use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Scale factor between the half-light radius and the exponential scale length.
const EXPONENTIAL_SCALE: f64 = 1.68;

/// Scale factor of the de Vaucouleurs profile.
const DE_VAUCOULEURS_SCALE: f64 = 7.67;

/// Width of the gaussian profile for a given half-light radius.
fn gaussian_sigma(radius: f64) -> f64 {
    2.0 * radius / 2.35
}

/// Surface brightness profile in the disk plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FluxProfile {
    /// `exp(-1.68 r / r½)`.
    #[default]
    Exponential,
    /// `exp(-r² / 2σ²)` with `σ = 2 r½ / 2.35`.
    Gaussian,
    /// `exp(-7.67 (r / r½)^¼)`.
    DeVaucouleurs,
}

impl FluxProfile {
    /// Unnormalised surface brightness at disk radius `r`.
    pub fn brightness(&self, r: f64, radius: f64) -> f64 {
        match self {
            FluxProfile::Exponential => (-EXPONENTIAL_SCALE * r / radius).exp(),
            FluxProfile::Gaussian => {
                let sigma = gaussian_sigma(radius);
                (-r * r / (2.0 * sigma * sigma)).exp()
            }
            FluxProfile::DeVaucouleurs => (-DE_VAUCOULEURS_SCALE * (r / radius).powf(0.25)).exp(),
        }
    }

    /// Unnormalised mass enclosed within `r`, assuming mass follows light.
    pub fn enclosed_mass(&self, r: f64, radius: f64) -> f64 {
        match self {
            FluxProfile::Exponential => {
                let rr = EXPONENTIAL_SCALE * r / radius;
                1.0 - rr * (-rr).exp() - (-rr).exp()
            }
            FluxProfile::Gaussian => {
                let sigma = gaussian_sigma(radius);
                1.0 - (-r * r / 2.0 / (sigma * sigma)).exp()
            }
            FluxProfile::DeVaucouleurs => {
                de_vaucouleurs_integral(r / radius) - de_vaucouleurs_integral(0.0)
            }
        }
    }
}

/// Primitive of `x^¾ exp(-x^¼)` used by the de Vaucouleurs enclosed mass.
fn de_vaucouleurs_integral(x: f64) -> f64 {
    let q = x.powf(0.25);
    let series = 5040.0
        + 5040.0 * q
        + 2520.0 * x.sqrt()
        + 840.0 * x.powf(0.75)
        + 210.0 * x
        + 42.0 * x.powf(1.25)
        + 7.0 * x.powf(1.5)
        + x.powf(1.75);
    -4.0 * series * (-q).exp()
}

/// Vertical light profile of the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThicknessProfile {
    /// `exp(-z² / 2hz²)`.
    #[default]
    Gaussian,
    /// `exp(-|z| / hz)`.
    Exponential,
    /// `sech²(z / hz)`.
    Sech2,
    /// No vertical falloff; the disk becomes a cylinder.
    None,
}

impl ThicknessProfile {
    /// Relative weight at height `z` for scale height `hz`.
    pub fn weight(&self, z: f64, hz: f64) -> f64 {
        match self {
            ThicknessProfile::Gaussian => (-z * z / 2.0 / (hz * hz)).exp(),
            ThicknessProfile::Exponential => (-z.abs() / hz).exp(),
            ThicknessProfile::Sech2 => (z / hz).cosh().powi(-2),
            ThicknessProfile::None => 1.0,
        }
    }
}

/// Rotation curve `v(r)` of the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RotationCurve {
    /// `vmax · 2/π · atan(r / rt)`.
    #[default]
    Arctan,
    /// `vmax · (1 - exp(-r / rt))`.
    Exp,
    /// `vmax · tanh(r / rt)`.
    Tanh,
    /// `vmax · sqrt(1 - rt/r · atan(r / rt))`.
    Isothermal,
    /// Keplerian speed of the enclosed light, scaled so its peak is `vmax`.
    Mass,
}

impl RotationCurve {
    /// Speed at radius `r` for the analytic curves; `None` for [`RotationCurve::Mass`].
    pub fn speed(&self, r: f64, turnover: f64, vmax: f64) -> Option<f64> {
        let ratio = r / turnover;
        match self {
            RotationCurve::Arctan => Some(vmax * FRAC_2_PI * ratio.atan()),
            RotationCurve::Exp => Some(vmax * (1.0 - (-ratio).exp())),
            RotationCurve::Tanh => Some(vmax * ratio.tanh()),
            RotationCurve::Isothermal => Some(vmax * (1.0 - ratio.atan() / ratio).sqrt()),
            RotationCurve::Mass => None,
        }
    }

    /// Speeds over a grid of disk radii. The centre of the disk does not move.
    pub fn speeds(
        &self,
        radii: &Array3<f64>,
        turnover: f64,
        vmax: f64,
        radius: f64,
        flux: FluxProfile,
    ) -> Array3<f64> {
        let mut speeds = match self {
            RotationCurve::Mass => {
                let raw = radii.mapv(|r| (flux.enclosed_mass(r, radius) / (r + 1e-9)).sqrt());
                let peak = raw
                    .iter()
                    .copied()
                    .filter(|v| v.is_finite())
                    .fold(f64::NAN, f64::max);
                raw.mapv(|v| v / peak * vmax)
            }
            curve => radii.mapv(|r| curve.speed(r, turnover, vmax).unwrap_or(f64::NAN)),
        };
        speeds.zip_mut_with(radii, |v, &r| {
            if r == 0.0 {
                *v = 0.0;
            }
        });
        speeds
    }
}

/// Relation between the disk thickness and its intrinsic velocity dispersion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DispersionProfile {
    /// Compact disk, `R/h = V/σ`: `σ = hz · v / r`.
    #[default]
    Thick,
    /// Very thin disk, `R/h = 0.5 (V/σ)²`: `σ = sqrt(hz · v² / r)`.
    Thin,
}

impl DispersionProfile {
    /// Dispersion at radius `r` for total speed `speed` and scale height `hz`.
    pub fn sigma(&self, hz: f64, speed: f64, r: f64) -> f64 {
        match self {
            DispersionProfile::Thick => hz * speed / r,
            DispersionProfile::Thin => (hz * speed * speed / r).sqrt(),
        }
    }
}
