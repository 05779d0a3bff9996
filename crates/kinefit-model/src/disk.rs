//! Thick rotating disk: the default kinematic model.
//!
//! Sky pixels are mapped into the disk frame by rotating the position angle
//! (`pa - 90°`, about the line of sight) and then the inclination (about the
//! x axis). The line of sight is sampled over `ceil((ny + nx) / 2)` planes
//! centred on the cube, which is enough to hold the disk thickness at any
//! inclination. Collapsing that grid along the line of sight gives the
//! flux, velocity and dispersion maps; a gaussian line profile per spaxel
//! then turns the maps into a spectral cube.

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use tracing::warn;

use kinefit_core::{
    CubeShape, ErrorInfo, GalaxyParameters, KineError, ParameterBounds, PARAMETER_COUNT,
};

use crate::model::{KinematicModel, ModelContext, ModelCube};
use crate::profiles::{DispersionProfile, FluxProfile, RotationCurve, ThicknessProfile};

/// Velocity offset constant for doublet separations, in km/s.
const DOUBLET_LIGHT_SPEED: f64 = 3e5;

/// Second emission line fitted together with the primary one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineDoublet {
    /// Wavelengths `[blue, red]`; the reddest line sets the redshift.
    pub waves: [f64; 2],
    /// Relative amplitudes `[blue, red]`.
    pub ratios: [f64; 2],
}

impl LineDoublet {
    /// Velocity separation of the blue component, in km/s.
    pub fn velocity_offset(&self) -> f64 {
        let [blue, red] = self.waves;
        DOUBLET_LIGHT_SPEED * (red - blue) / (blue + red) * 2.0
    }

    /// Amplitude of the blue component relative to the red one.
    pub fn amplitude_ratio(&self) -> f64 {
        self.ratios[0] / self.ratios[1]
    }
}

/// Rotating disk with configurable light, thickness and kinematic profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskModel {
    /// Radial surface brightness.
    #[serde(default)]
    pub flux_profile: FluxProfile,
    /// Vertical light profile.
    #[serde(default)]
    pub thickness_profile: ThicknessProfile,
    /// Rotation curve.
    #[serde(default)]
    pub rotation_curve: RotationCurve,
    /// Thickness-induced dispersion.
    #[serde(default)]
    pub dispersion_profile: DispersionProfile,
    /// Scale height over half-light radius.
    #[serde(default = "default_aspect_ratio")]
    pub q: f64,
    /// Optional doublet line.
    #[serde(default)]
    pub line: Option<LineDoublet>,
}

fn default_aspect_ratio() -> f64 {
    0.15
}

impl Default for DiskModel {
    fn default() -> Self {
        Self {
            flux_profile: FluxProfile::default(),
            thickness_profile: ThicknessProfile::default(),
            rotation_curve: RotationCurve::default(),
            dispersion_profile: DispersionProfile::default(),
            q: default_aspect_ratio(),
            line: None,
        }
    }
}

/// Planes receiving a line of zero width centred on `centre` km/s, with the
/// share of the spaxel flux each one gets.
///
/// Each component lands on the nearest plane. Components falling outside the
/// cube are dropped and the remaining ones renormalised.
fn unresolved_line(
    nz: usize,
    z: f64,
    z_step_kms: f64,
    centre: f64,
    doublet: Option<(f64, f64)>,
) -> Vec<(usize, f64)> {
    let mut components = vec![(centre, 1.0)];
    if let Some((delta, ratio)) = doublet {
        components.push((centre - delta, ratio));
    }
    let planes: Vec<(usize, f64)> = components
        .into_iter()
        .filter_map(|(velocity, weight)| {
            let k = (z + velocity / z_step_kms).round();
            (k >= 0.0 && k < nz as f64).then_some((k as usize, weight))
        })
        .collect();
    let total: f64 = planes.iter().map(|(_, weight)| weight).sum();
    if !(total > 0.0) {
        return Vec::new();
    }
    planes
        .into_iter()
        .map(|(k, weight)| (k, weight / total))
        .collect()
}

/// Position of a grid voxel in the disk frame.
#[derive(Debug, Clone, Copy)]
struct DiskPoint {
    x: f64,
    y: f64,
    z: f64,
}

/// Rotation from sky pixel indices to the disk frame.
struct DiskFrame {
    centre: [f64; 3],
    cos_pa: f64,
    sin_pa: f64,
    cos_i: f64,
    sin_i: f64,
}

impl DiskFrame {
    fn new(galaxy: &GalaxyParameters, depth: usize) -> Self {
        let pa = (galaxy.pa - 90.0).to_radians();
        let inclination = galaxy.inclination.to_radians();
        Self {
            centre: [galaxy.x, galaxy.y, (depth as f64 - 1.0) / 2.0],
            cos_pa: pa.cos(),
            sin_pa: pa.sin(),
            cos_i: inclination.cos(),
            sin_i: inclination.sin(),
        }
    }

    fn project(&self, i: usize, j: usize, k: usize) -> DiskPoint {
        let xx = i as f64 - self.centre[0];
        let yy = j as f64 - self.centre[1];
        let zz = k as f64 - self.centre[2];
        let nx = self.cos_pa * xx + self.sin_pa * yy;
        let ny = -self.sin_pa * xx + self.cos_pa * yy;
        DiskPoint {
            x: nx,
            y: self.cos_i * ny - self.sin_i * zz,
            z: self.sin_i * ny + self.cos_i * zz,
        }
    }
}

/// Line-of-sight sums accumulated for one spaxel.
#[derive(Debug, Clone, Copy, Default)]
struct SpaxelSums {
    flux: f64,
    flux_sq: f64,
    velocity: f64,
    velocity_sq: f64,
    dispersion_sq: f64,
}

impl DiskModel {
    /// Flux, velocity and dispersion maps of `galaxy` on an `ny × nx` grid.
    fn maps(
        &self,
        galaxy: &GalaxyParameters,
        ny: usize,
        nx: usize,
    ) -> Result<(Array2<f64>, Array2<f64>, Array2<f64>), KineError> {
        let hz = galaxy.radius * self.q;
        let depth = (ny + nx + 1) / 2;
        let frame = DiskFrame::new(galaxy, depth);
        let points = Array3::from_shape_fn((depth, ny, nx), |(k, j, i)| frame.project(i, j, k));
        let radii = points.mapv(|p| p.x.hypot(p.y));
        let speeds = self.rotation_curve.speeds(
            &radii,
            galaxy.turnover_radius,
            galaxy.maximum_velocity,
            galaxy.radius,
            self.flux_profile,
        );

        let mut sums = Array2::<SpaxelSums>::default((ny, nx));
        for ((k, j, i), point) in points.indexed_iter() {
            let r = radii[[k, j, i]];
            let weight = self.flux_profile.brightness(r, galaxy.radius)
                * self.thickness_profile.weight(point.z, hz);
            if !weight.is_finite() {
                continue;
            }
            let speed = speeds[[k, j, i]];
            let vz = if r > 0.0 {
                frame.sin_i * speed * point.x / r
            } else {
                0.0
            };
            let sigma = self.dispersion_profile.sigma(hz, speed.abs(), r);
            let acc = &mut sums[[j, i]];
            acc.flux += weight;
            acc.flux_sq += weight * weight;
            if vz.is_finite() {
                acc.velocity += weight * vz;
                acc.velocity_sq += weight * vz * vz;
            }
            if sigma.is_finite() {
                acc.dispersion_sq += sigma * sigma * weight * weight;
            }
        }

        let total: f64 = sums.iter().map(|s| s.flux).sum();
        if !(total > 0.0) {
            return Err(KineError::Model(
                ErrorInfo::new("zero-total-flux", "total model flux is zero")
                    .with_context("radius", galaxy.radius.to_string())
                    .with_context("x", galaxy.x.to_string())
                    .with_context("y", galaxy.y.to_string()),
            ));
        }

        let intrinsic = galaxy.velocity_dispersion;
        let flux_map = sums.mapv(|s| galaxy.flux * s.flux / total);
        let velocity_map = sums.mapv(|s| {
            if s.flux == 0.0 {
                f64::NAN
            } else {
                s.velocity / s.flux
            }
        });
        let dispersion_map = sums.mapv(|s| {
            if s.flux == 0.0 {
                return f64::NAN;
            }
            let mean = s.velocity / s.flux;
            let variance = s.velocity_sq / s.flux - mean * mean;
            let disk = if variance > 0.0 { variance.sqrt() } else { 0.0 };
            let thickness = (s.dispersion_sq / s.flux_sq).sqrt();
            (disk * disk + thickness * thickness + intrinsic * intrinsic).sqrt()
        });
        Ok((flux_map, velocity_map, dispersion_map))
    }
}

impl KinematicModel for DiskModel {
    fn name(&self) -> &str {
        "disk"
    }

    fn validate(&self) -> Result<(), KineError> {
        if !(self.q.is_finite() && self.q > 0.0) {
            return Err(KineError::Config(
                ErrorInfo::new("disk-aspect-ratio", "disk aspect ratio must be positive")
                    .with_context("q", self.q.to_string()),
            ));
        }
        if let Some(line) = &self.line {
            let ratio = line.amplitude_ratio();
            if !(ratio.is_finite() && line.velocity_offset().is_finite()) {
                return Err(KineError::Config(
                    ErrorInfo::new("doublet-line", "doublet wavelengths or ratios are unusable")
                        .with_context("waves", format!("{:?}", line.waves))
                        .with_context("ratios", format!("{:?}", line.ratios)),
                ));
            }
        }
        if self.thickness_profile == ThicknessProfile::None {
            warn!("disk has no thickness profile; the galaxy becomes a cylinder");
        }
        Ok(())
    }

    fn default_bounds(&self, ctx: &ModelContext) -> ParameterBounds {
        let CubeShape { nz, ny, nx } = ctx.shape;
        let (nz, ny, nx) = (nz as f64, ny as f64, nx as f64);
        let spatial = ny.min(nx);
        let flux = ctx.flux_estimate;
        ParameterBounds {
            min: GalaxyParameters {
                x: nx * 0.33,
                y: ny * 0.33,
                z: nz * 0.33,
                flux: flux / 3.0,
                radius: 0.5,
                inclination: 0.0,
                pa: -180.0,
                turnover_radius: 0.01,
                maximum_velocity: -350.0,
                velocity_dispersion: 0.0,
            },
            max: GalaxyParameters {
                x: nx * 0.66,
                y: ny * 0.66,
                z: nz * 0.66,
                flux: flux * 3.0,
                radius: spatial / 2.0,
                inclination: 90.0,
                pa: 180.0,
                turnover_radius: spatial / 4.0,
                maximum_velocity: 350.0,
                velocity_dispersion: 180.0,
            },
        }
    }

    fn adjust_random_amplitude(&self, ctx: &ModelContext, amplitude: &mut GalaxyParameters) {
        // A tenth of the uniform-prior deviation, whatever the cube size.
        let scale = ctx.shape.voxels() as f64 / (PARAMETER_COUNT as f64 * 10.0);
        *amplitude = amplitude.map(|_, a| a * scale);
    }

    fn initial_parameters(&self, ctx: &ModelContext) -> GalaxyParameters {
        let CubeShape { nz, ny, nx } = ctx.shape;
        GalaxyParameters {
            x: (nx as f64 - 1.0) / 2.0,
            y: (ny as f64 - 1.0) / 2.0,
            z: (nz as f64 - 1.0) / 2.0,
            flux: ctx.flux_estimate,
            ..GalaxyParameters::nan()
        }
    }

    fn clean_cube(
        &self,
        params: &GalaxyParameters,
        shape: CubeShape,
        z_step_kms: f64,
    ) -> Result<ModelCube, KineError> {
        shape.ensure_non_empty()?;
        let mut galaxy = *params;
        if galaxy.maximum_velocity < 0.0 {
            galaxy.maximum_velocity = -galaxy.maximum_velocity;
            galaxy.pa += 180.0;
        }
        let (flux_map, velocity_map, dispersion_map) = self.maps(&galaxy, shape.ny, shape.nx)?;

        let velocities: Vec<f64> = (0..shape.nz)
            .map(|k| (k as f64 - galaxy.z) * z_step_kms)
            .collect();
        let doublet = self
            .line
            .map(|line| (line.velocity_offset(), line.amplitude_ratio()));
        let mut cube = Array3::zeros(shape.dim());
        for ((j, i), &flux) in flux_map.indexed_iter() {
            let centre = velocity_map[[j, i]];
            let sigma = dispersion_map[[j, i]];
            if sigma == 0.0 {
                let planes = unresolved_line(shape.nz, galaxy.z, z_step_kms, centre, doublet);
                for (k, weight) in planes {
                    cube[[k, j, i]] += flux * weight;
                }
                continue;
            }
            let line = |v: f64| {
                let mut value = (-0.5 * (v - centre).powi(2) / (sigma * sigma)).exp();
                if let Some((delta, ratio)) = doublet {
                    value += ratio * (-0.5 * (v - (centre - delta)).powi(2) / (sigma * sigma)).exp();
                }
                value
            };
            let norm: f64 = velocities
                .iter()
                .map(|&v| line(v))
                .filter(|v| !v.is_nan())
                .sum();
            let amplitude = flux / norm;
            if !amplitude.is_finite() {
                continue;
            }
            for (k, &v) in velocities.iter().enumerate() {
                let value = amplitude * line(v);
                if value.is_finite() {
                    cube[[k, j, i]] = value;
                }
            }
        }

        Ok(ModelCube {
            cube,
            flux_map,
            velocity_map,
            dispersion_map,
        })
    }
}
