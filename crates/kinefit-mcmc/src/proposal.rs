use std::f64::consts::PI;

use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use kinefit_core::{GalaxyParameters, ParameterName, RngHandle, PARAMETER_COUNT};

use crate::chain::Chain;

/// Jump distribution of the random walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProposalKind {
    /// Lorentzian jumps `x + a · tan(U(-π/2, π/2))`.
    #[default]
    Cauchy,
    /// Gaussian jumps `N(x, a)`.
    Normal,
    /// Cauchy jumps whose amplitude follows the spread of recent rows.
    AdaptiveCauchy,
}

/// Windows used by the adaptive proposal: `(rows above, window, inflation)`.
const ADAPTIVE_WINDOWS: [(usize, usize, f64); 3] =
    [(1500, 750, 1.0), (500, 250, 1.25), (50, 50, 1.5)];

impl ProposalKind {
    /// Draws the next proposal around `current`.
    ///
    /// Parameters with a zero amplitude are never perturbed.
    pub fn propose(
        &self,
        current: &GalaxyParameters,
        amplitude: &GalaxyParameters,
        chain: &Chain,
        rng: &mut RngHandle,
    ) -> GalaxyParameters {
        let scale = match self {
            ProposalKind::AdaptiveCauchy => adaptive_amplitude(chain, amplitude),
            _ => *amplitude,
        };
        let mut next = *current;
        for name in ParameterName::ALL {
            let a = scale[name];
            if amplitude[name] == 0.0 {
                continue;
            }
            let jump = match self {
                ProposalKind::Normal => rng.sample(&StandardNormal),
                ProposalKind::Cauchy | ProposalKind::AdaptiveCauchy => {
                    (PI * (rng.uniform() - 0.5)).tan()
                }
            };
            next[name] = current[name] + a * jump;
        }
        next
    }
}

/// Amplitude re-estimated from the standard deviation of recent rows.
pub fn adaptive_amplitude(chain: &Chain, base: &GalaxyParameters) -> GalaxyParameters {
    let Some(&(_, window, inflation)) = ADAPTIVE_WINDOWS
        .iter()
        .find(|(threshold, _, _)| chain.len() > *threshold)
    else {
        return *base;
    };
    let rows = chain.tail(window);
    let n = rows.len() as f64;
    base.map(|name, fallback| {
        let mean = rows.iter().map(|row| row.parameters[name]).sum::<f64>() / n;
        let variance = rows
            .iter()
            .map(|row| (row.parameters[name] - mean).powi(2))
            .sum::<f64>()
            / n;
        // A window with no accepted jump would freeze the walk.
        if variance > 0.0 {
            variance.sqrt() * inflation / PARAMETER_COUNT as f64
        } else {
            fallback
        }
    })
}
