//! Best-fit extraction from a finished chain.
//!
//! Every policy selects a sub-chain, then reports the per-parameter median
//! and population standard deviation. The position angle wraps at 360°, so
//! it is summarised with circular statistics instead.

use serde::{Deserialize, Serialize};

use kinefit_core::errors::ErrorInfo;
use kinefit_core::{GalaxyParameters, KineError, ParameterName};

use crate::chain::{Chain, ChainRow};

/// Selection policy applied to the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BestFitMethod {
    /// Median of the last `n` rows.
    Last,
    /// Median of the `n` rows with the lowest reduced chi-square.
    #[default]
    ChiSorted,
    /// Median of the `n` rows surrounding the global minimum.
    ChiMin,
    /// The single row at the global minimum.
    ///
    /// Dispersions of the linear parameters are taken over the whole chain;
    /// the position angle and the percentile bounds use the rows surrounding
    /// the minimum, as for [`BestFitMethod::ChiMin`].
    Map,
}

/// Parameters extracted from a chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestFit {
    /// Policy used.
    pub method: BestFitMethod,
    /// Best-fit parameters.
    pub parameters: GalaxyParameters,
    /// Standard deviation of each parameter over the sub-chain.
    pub stdev: GalaxyParameters,
    /// Upper percentile bound, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper: Option<GalaxyParameters>,
    /// Lower percentile bound, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower: Option<GalaxyParameters>,
    /// Reduced chi-square of every row in the sub-chain.
    pub sub_chain_chi: Vec<f64>,
    /// Lowest reduced chi-square of the whole chain.
    pub best_chi: f64,
}

/// Extracts the best fit from `chain` using `fraction` percent of its rows.
pub fn best_fit(
    chain: &Chain,
    method: BestFitMethod,
    fraction: f64,
    percentile: Option<f64>,
) -> Result<BestFit, KineError> {
    if !(fraction > 0.0 && fraction <= 100.0) {
        return Err(KineError::Config(
            ErrorInfo::new("selection-fraction", "chain fraction must lie in (0, 100]")
                .with_context("fraction", fraction.to_string()),
        ));
    }
    if let Some(p) = percentile {
        if !(p > 0.0 && p <= 100.0) {
            return Err(KineError::Config(
                ErrorInfo::new("selection-percentile", "percentile width must lie in (0, 100]")
                    .with_context("percentile", p.to_string()),
            ));
        }
    }
    let Some(i_min) = chain.argmin_chi() else {
        return Err(KineError::Sampler(ErrorInfo::new(
            "empty-chain",
            "cannot extract parameters from an empty chain",
        )));
    };
    let rows = chain.rows();
    let len = rows.len();
    let n = ((len as f64 * fraction / 100.0).floor() as usize).max(1);

    let selected: Vec<ChainRow> = match method {
        BestFitMethod::Last => chain.tail(n).to_vec(),
        BestFitMethod::ChiSorted => {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|a, b| a.reduced_chi.total_cmp(&b.reduced_chi));
            sorted.truncate(n);
            sorted
        }
        BestFitMethod::ChiMin | BestFitMethod::Map => {
            let half = n / 2;
            let start = i_min.saturating_sub(half);
            let end = (i_min + half).min(len).max(i_min + 1);
            rows[start..end].to_vec()
        }
    };

    let mut parameters = GalaxyParameters::nan();
    let mut stdev = GalaxyParameters::nan();
    let mut upper = percentile.map(|_| GalaxyParameters::nan());
    let mut lower = percentile.map(|_| GalaxyParameters::nan());
    for name in ParameterName::ALL {
        let values: Vec<f64> = selected.iter().map(|row| row.parameters[name]).collect();
        let (best, spread, deviations) = if name == ParameterName::Pa {
            let best = match method {
                BestFitMethod::Map => rows[i_min].parameters.pa.rem_euclid(360.0),
                _ => circular_median(&values),
            };
            let deviations: Vec<f64> = values.iter().map(|v| wrap_degrees(v - best)).collect();
            (best, population_stdev(&deviations), deviations)
        } else {
            let best = match method {
                BestFitMethod::Map => rows[i_min].parameters[name],
                _ => median(&values),
            };
            let deviations: Vec<f64> = values.iter().map(|v| v - best).collect();
            let spread = match method {
                BestFitMethod::Map => population_stdev(&chain.column(name)),
                _ => population_stdev(&values),
            };
            (best, spread, deviations)
        };
        parameters[name] = best;
        stdev[name] = spread;
        if let (Some(p), Some(upper), Some(lower)) = (percentile, upper.as_mut(), lower.as_mut()) {
            upper[name] = best + quantile(&deviations, 50.0 + p / 2.0);
            lower[name] = best + quantile(&deviations, 50.0 - p / 2.0);
        }
    }

    Ok(BestFit {
        method,
        parameters,
        stdev,
        upper,
        lower,
        sub_chain_chi: selected.iter().map(|row| row.reduced_chi).collect(),
        best_chi: rows[i_min].reduced_chi,
    })
}

/// Wraps an angle difference into `[-180, 180)`.
pub fn wrap_degrees(angle: f64) -> f64 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Circular central value: `atan2(median sin, median cos)`, in `[0, 360)`.
pub fn circular_median(degrees: &[f64]) -> f64 {
    let sines: Vec<f64> = degrees.iter().map(|d| d.to_radians().sin()).collect();
    let cosines: Vec<f64> = degrees.iter().map(|d| d.to_radians().cos()).collect();
    median(&sines)
        .atan2(median(&cosines))
        .to_degrees()
        .rem_euclid(360.0)
}

/// Median with linear interpolation between the two middle values.
pub fn median(values: &[f64]) -> f64 {
    quantile(values, 50.0)
}

/// Percentile `q` (0..=100) with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let position = (q / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let low = position.floor() as usize;
    let high = position.ceil() as usize;
    let weight = position - low as f64;
    sorted[low] + (sorted[high] - sorted[low]) * weight
}

/// Population standard deviation.
pub fn population_stdev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}
