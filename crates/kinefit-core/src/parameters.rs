//! Galaxy parameter vector, known-parameter masks and boundaries.
//!
//! The ten parameters always travel in the same fixed order:
//! `x, y, z, flux, radius, inclination, pa, turnover_radius,
//! maximum_velocity, velocity_dispersion`. Unset values are NaN, never absent.

use std::fmt::{self, Display};
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, KineError};

/// Number of parameters in a [`GalaxyParameters`] vector.
pub const PARAMETER_COUNT: usize = 10;

/// Name of one galaxy parameter. The discriminant is the fixed vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterName {
    /// Centre along the x axis, in pixels.
    X,
    /// Centre along the y axis, in pixels.
    Y,
    /// Centre along the spectral axis, in pixels.
    Z,
    /// Total flux, in the units of the input cube.
    Flux,
    /// Half-light radius, in pixels.
    Radius,
    /// Disk inclination, in degrees.
    Inclination,
    /// Position angle of the major axis, in degrees.
    Pa,
    /// Turnover radius of the rotation curve, in pixels.
    TurnoverRadius,
    /// Maximum (asymptotic) rotation velocity, in km/s.
    MaximumVelocity,
    /// Intrinsic velocity dispersion, in km/s.
    VelocityDispersion,
}

impl ParameterName {
    /// All parameter names in vector order.
    pub const ALL: [ParameterName; PARAMETER_COUNT] = [
        ParameterName::X,
        ParameterName::Y,
        ParameterName::Z,
        ParameterName::Flux,
        ParameterName::Radius,
        ParameterName::Inclination,
        ParameterName::Pa,
        ParameterName::TurnoverRadius,
        ParameterName::MaximumVelocity,
        ParameterName::VelocityDispersion,
    ];

    /// Position of the parameter inside the vector.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`ParameterName::index`].
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Canonical snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterName::X => "x",
            ParameterName::Y => "y",
            ParameterName::Z => "z",
            ParameterName::Flux => "flux",
            ParameterName::Radius => "radius",
            ParameterName::Inclination => "inclination",
            ParameterName::Pa => "pa",
            ParameterName::TurnoverRadius => "turnover_radius",
            ParameterName::MaximumVelocity => "maximum_velocity",
            ParameterName::VelocityDispersion => "velocity_dispersion",
        }
    }

    /// Short label used in reports.
    pub fn short_name(&self) -> &'static str {
        match self {
            ParameterName::Radius => "rhalf",
            ParameterName::Inclination => "incl",
            ParameterName::Pa => "PA",
            ParameterName::TurnoverRadius => "rv",
            ParameterName::MaximumVelocity => "Vmax",
            ParameterName::VelocityDispersion => "Vdisp",
            other => other.as_str(),
        }
    }

    /// Physical unit of the parameter.
    pub fn unit(&self) -> &'static str {
        match self {
            ParameterName::X
            | ParameterName::Y
            | ParameterName::Z
            | ParameterName::Radius
            | ParameterName::TurnoverRadius => "pixel",
            ParameterName::Flux => "cube units",
            ParameterName::Inclination | ParameterName::Pa => "deg",
            ParameterName::MaximumVelocity | ParameterName::VelocityDispersion => "km/s",
        }
    }
}

impl Display for ParameterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterName {
    type Err = KineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        ParameterName::ALL
            .iter()
            .copied()
            .find(|name| {
                name.as_str() == trimmed || name.short_name().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| {
                let known: Vec<&str> = ParameterName::ALL.iter().map(|n| n.as_str()).collect();
                KineError::Config(
                    ErrorInfo::new("unknown-parameter", "parameter name is not recognised")
                        .with_context("name", trimmed)
                        .with_hint(format!("use one of {}", known.join(", "))),
                )
            })
    }
}

/// Fixed-order vector of the ten disk parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParameterRecord", into = "ParameterRecord")]
pub struct GalaxyParameters {
    /// Centre along the x axis, in pixels.
    pub x: f64,
    /// Centre along the y axis, in pixels.
    pub y: f64,
    /// Centre along the spectral axis, in pixels.
    pub z: f64,
    /// Total flux, in the units of the input cube.
    pub flux: f64,
    /// Half-light radius, in pixels.
    pub radius: f64,
    /// Disk inclination, in degrees.
    pub inclination: f64,
    /// Position angle of the major axis, in degrees.
    pub pa: f64,
    /// Turnover radius of the rotation curve, in pixels.
    pub turnover_radius: f64,
    /// Maximum rotation velocity, in km/s.
    pub maximum_velocity: f64,
    /// Intrinsic velocity dispersion, in km/s.
    pub velocity_dispersion: f64,
}

impl GalaxyParameters {
    /// Vector with every field unset.
    pub const fn nan() -> Self {
        Self::splat(f64::NAN)
    }

    /// Vector with every field set to `value`.
    pub const fn splat(value: f64) -> Self {
        Self {
            x: value,
            y: value,
            z: value,
            flux: value,
            radius: value,
            inclination: value,
            pa: value,
            turnover_radius: value,
            maximum_velocity: value,
            velocity_dispersion: value,
        }
    }

    /// Builds a vector from values in the fixed parameter order.
    pub fn from_array(values: [f64; PARAMETER_COUNT]) -> Self {
        let [x, y, z, flux, radius, inclination, pa, turnover_radius, maximum_velocity, velocity_dispersion] =
            values;
        Self {
            x,
            y,
            z,
            flux,
            radius,
            inclination,
            pa,
            turnover_radius,
            maximum_velocity,
            velocity_dispersion,
        }
    }

    /// Builds a vector from a slice holding exactly ten values.
    pub fn from_slice(values: &[f64]) -> Result<Self, KineError> {
        let array: [f64; PARAMETER_COUNT] = values.try_into().map_err(|_| {
            KineError::Config(
                ErrorInfo::new("parameter-length", "parameter slice has the wrong length")
                    .with_context("expected", PARAMETER_COUNT.to_string())
                    .with_context("actual", values.len().to_string()),
            )
        })?;
        Ok(Self::from_array(array))
    }

    /// Values in the fixed parameter order.
    pub fn as_array(&self) -> [f64; PARAMETER_COUNT] {
        [
            self.x,
            self.y,
            self.z,
            self.flux,
            self.radius,
            self.inclination,
            self.pa,
            self.turnover_radius,
            self.maximum_velocity,
            self.velocity_dispersion,
        ]
    }

    /// Value of a named parameter.
    pub fn get(&self, name: ParameterName) -> f64 {
        self[name]
    }

    /// Sets a named parameter.
    pub fn set(&mut self, name: ParameterName, value: f64) {
        self[name] = value;
    }

    /// Iterates `(name, value)` pairs in vector order.
    pub fn iter(&self) -> impl Iterator<Item = (ParameterName, f64)> + '_ {
        ParameterName::ALL.iter().map(move |&name| (name, self[name]))
    }

    /// Applies `f` to every field.
    pub fn map(&self, f: impl Fn(ParameterName, f64) -> f64) -> Self {
        let mut out = *self;
        for name in ParameterName::ALL {
            out[name] = f(name, self[name]);
        }
        out
    }

    /// Combines two vectors field by field.
    pub fn zip_map(&self, other: &Self, f: impl Fn(ParameterName, f64, f64) -> f64) -> Self {
        let mut out = *self;
        for name in ParameterName::ALL {
            out[name] = f(name, self[name], other[name]);
        }
        out
    }

    /// Keeps the set fields of `self` and fills the NaN ones from `fallback`.
    pub fn merge_where_nan(&self, fallback: &Self) -> Self {
        self.zip_map(fallback, |_, own, other| if own.is_nan() { other } else { own })
    }

    /// Returns true when at least one field is unset.
    pub fn has_nan(&self) -> bool {
        self.iter().any(|(_, value)| value.is_nan())
    }

    /// Exact equality that also treats matching NaN payloads as equal.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.as_array()
            .iter()
            .zip(other.as_array().iter())
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Default for GalaxyParameters {
    fn default() -> Self {
        Self::nan()
    }
}

impl Index<ParameterName> for GalaxyParameters {
    type Output = f64;

    fn index(&self, name: ParameterName) -> &f64 {
        match name {
            ParameterName::X => &self.x,
            ParameterName::Y => &self.y,
            ParameterName::Z => &self.z,
            ParameterName::Flux => &self.flux,
            ParameterName::Radius => &self.radius,
            ParameterName::Inclination => &self.inclination,
            ParameterName::Pa => &self.pa,
            ParameterName::TurnoverRadius => &self.turnover_radius,
            ParameterName::MaximumVelocity => &self.maximum_velocity,
            ParameterName::VelocityDispersion => &self.velocity_dispersion,
        }
    }
}

impl IndexMut<ParameterName> for GalaxyParameters {
    fn index_mut(&mut self, name: ParameterName) -> &mut f64 {
        match name {
            ParameterName::X => &mut self.x,
            ParameterName::Y => &mut self.y,
            ParameterName::Z => &mut self.z,
            ParameterName::Flux => &mut self.flux,
            ParameterName::Radius => &mut self.radius,
            ParameterName::Inclination => &mut self.inclination,
            ParameterName::Pa => &mut self.pa,
            ParameterName::TurnoverRadius => &mut self.turnover_radius,
            ParameterName::MaximumVelocity => &mut self.maximum_velocity,
            ParameterName::VelocityDispersion => &mut self.velocity_dispersion,
        }
    }
}

impl Display for GalaxyParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, (name, value)) in self.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            match name {
                ParameterName::Flux => write!(f, "{:<20} = {:>12.3e}", name.as_str(), value)?,
                ParameterName::Z => write!(f, "{:<20} = {:>12.6}", name.as_str(), value)?,
                _ => write!(f, "{:<20} = {:>12.4}", name.as_str(), value)?,
            }
            write!(f, " {}", name.unit())?;
        }
        Ok(())
    }
}

/// Serialized form of [`GalaxyParameters`]: unset fields are omitted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    flux: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inclination: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pa: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    turnover_radius: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    maximum_velocity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    velocity_dispersion: Option<f64>,
}

fn present(value: f64) -> Option<f64> {
    if value.is_nan() {
        None
    } else {
        Some(value)
    }
}

impl From<ParameterRecord> for GalaxyParameters {
    fn from(record: ParameterRecord) -> Self {
        Self {
            x: record.x.unwrap_or(f64::NAN),
            y: record.y.unwrap_or(f64::NAN),
            z: record.z.unwrap_or(f64::NAN),
            flux: record.flux.unwrap_or(f64::NAN),
            radius: record.radius.unwrap_or(f64::NAN),
            inclination: record.inclination.unwrap_or(f64::NAN),
            pa: record.pa.unwrap_or(f64::NAN),
            turnover_radius: record.turnover_radius.unwrap_or(f64::NAN),
            maximum_velocity: record.maximum_velocity.unwrap_or(f64::NAN),
            velocity_dispersion: record.velocity_dispersion.unwrap_or(f64::NAN),
        }
    }
}

impl From<GalaxyParameters> for ParameterRecord {
    fn from(params: GalaxyParameters) -> Self {
        Self {
            x: present(params.x),
            y: present(params.y),
            z: present(params.z),
            flux: present(params.flux),
            radius: present(params.radius),
            inclination: present(params.inclination),
            pa: present(params.pa),
            turnover_radius: present(params.turnover_radius),
            maximum_velocity: present(params.maximum_velocity),
            velocity_dispersion: present(params.velocity_dispersion),
        }
    }
}

/// Set of parameters held fixed ("known") during sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ParameterName>", into = "Vec<ParameterName>")]
pub struct ParameterMask([bool; PARAMETER_COUNT]);

impl ParameterMask {
    /// Mask with no parameter set.
    pub const fn none() -> Self {
        Self([false; PARAMETER_COUNT])
    }

    /// Mask selecting the given parameters.
    pub fn from_names(names: impl IntoIterator<Item = ParameterName>) -> Self {
        let mut mask = Self::none();
        for name in names {
            mask.insert(name);
        }
        mask
    }

    /// Returns true when `name` is in the mask.
    pub fn contains(&self, name: ParameterName) -> bool {
        self.0[name.index()]
    }

    /// Adds `name` to the mask.
    pub fn insert(&mut self, name: ParameterName) {
        self.0[name.index()] = true;
    }

    /// Number of parameters in the mask.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&flag| flag).count()
    }

    /// Number of parameters outside the mask.
    pub fn free_count(&self) -> usize {
        PARAMETER_COUNT - self.count()
    }

    /// Names in the mask, in vector order.
    pub fn names(&self) -> Vec<ParameterName> {
        ParameterName::ALL
            .iter()
            .copied()
            .filter(|&name| self.contains(name))
            .collect()
    }
}

impl From<Vec<ParameterName>> for ParameterMask {
    fn from(names: Vec<ParameterName>) -> Self {
        Self::from_names(names)
    }
}

impl From<ParameterMask> for Vec<ParameterName> {
    fn from(mask: ParameterMask) -> Self {
        mask.names()
    }
}

/// Inclusive lower and upper boundaries for every parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    /// Lower boundaries.
    pub min: GalaxyParameters,
    /// Upper boundaries.
    pub max: GalaxyParameters,
}

impl ParameterBounds {
    /// Builds validated boundaries.
    pub fn new(min: GalaxyParameters, max: GalaxyParameters) -> Result<Self, KineError> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Fails when a boundary is unset or infinite, or when a minimum exceeds
    /// its maximum.
    pub fn validate(&self) -> Result<(), KineError> {
        for name in ParameterName::ALL {
            let (lo, hi) = (self.min[name], self.max[name]);
            if lo.is_nan() || hi.is_nan() {
                return Err(KineError::Config(
                    ErrorInfo::new("missing-boundary", "boundary is not set")
                        .with_context("parameter", name.as_str())
                        .with_context("min", lo.to_string())
                        .with_context("max", hi.to_string()),
                ));
            }
            // JSON records cannot carry infinities.
            if lo.is_infinite() || hi.is_infinite() {
                return Err(KineError::Config(
                    ErrorInfo::new("infinite-boundary", "boundary must be finite")
                        .with_context("parameter", name.as_str())
                        .with_context("min", lo.to_string())
                        .with_context("max", hi.to_string()),
                ));
            }
            if lo > hi {
                return Err(KineError::Config(
                    ErrorInfo::new("invalid-boundaries", "minimum boundary exceeds maximum")
                        .with_context("parameter", name.as_str())
                        .with_context("min", lo.to_string())
                        .with_context("max", hi.to_string())
                        .with_hint("check the min/max overrides in the fit configuration"),
                ));
            }
        }
        Ok(())
    }

    /// First parameter of `params` outside the boundaries, if any. NaN is outside.
    pub fn first_violation(&self, params: &GalaxyParameters) -> Option<ParameterName> {
        ParameterName::ALL.iter().copied().find(|&name| {
            let value = params[name];
            !(value >= self.min[name] && value <= self.max[name])
        })
    }

    /// Returns true when every parameter lies inside its boundaries.
    pub fn contains(&self, params: &GalaxyParameters) -> bool {
        self.first_violation(params).is_none()
    }

    /// Midpoint of each boundary pair.
    pub fn mean(&self) -> GalaxyParameters {
        self.min.zip_map(&self.max, |_, lo, hi| 0.5 * (lo + hi))
    }

    /// Width of each boundary pair.
    pub fn widths(&self) -> GalaxyParameters {
        self.max.zip_map(&self.min, |_, hi, lo| hi - lo)
    }

    /// Replaces boundaries with the set fields of the overrides.
    pub fn with_overrides(&self, min: &GalaxyParameters, max: &GalaxyParameters) -> Self {
        Self {
            min: min.merge_where_nan(&self.min),
            max: max.merge_where_nan(&self.max),
        }
    }

    /// Narrows a known parameter to a thin band around `value`.
    pub fn pin(&mut self, name: ParameterName, value: f64, epsilon: f64) {
        let sign = if value < 0.0 { -1.0 } else { 1.0 };
        self.min[name] = value * (1.0 - epsilon * sign) - epsilon;
        self.max[name] = value * (1.0 + epsilon * sign) + epsilon;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_brackets_negative_values() {
        let mut bounds = ParameterBounds {
            min: GalaxyParameters::splat(-10.0),
            max: GalaxyParameters::splat(10.0),
        };
        bounds.pin(ParameterName::MaximumVelocity, -120.0, 0.003);
        assert!(bounds.min.maximum_velocity < -120.0);
        assert!(bounds.max.maximum_velocity > -120.0);
        bounds.pin(ParameterName::Pa, 0.0, 0.003);
        assert!(bounds.min.pa < 0.0 && bounds.max.pa > 0.0);
    }

    #[test]
    fn short_names_parse() {
        assert_eq!("Vmax".parse::<ParameterName>().unwrap(), ParameterName::MaximumVelocity);
        assert_eq!("pa".parse::<ParameterName>().unwrap(), ParameterName::Pa);
        assert!("sugar".parse::<ParameterName>().is_err());
    }
}
