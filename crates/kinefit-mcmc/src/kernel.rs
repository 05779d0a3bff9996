use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use kinefit_core::errors::ErrorInfo;
use kinefit_core::{GalaxyParameters, KineError, ParameterBounds, ParameterMask, RngHandle};
use kinefit_model::KinematicModel;

use crate::chain::{Chain, ChainRow};
use crate::config::SamplerConfig;
use crate::determinism;
use crate::forward::ForwardModel;
use crate::statistics::ChiSquare;

/// Everything the random walk needs besides the model and the data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SamplerSetup {
    /// Starting point; must lie inside `bounds`.
    pub initial: GalaxyParameters,
    /// Inclusive boundaries; proposals outside are rejected unevaluated.
    pub bounds: ParameterBounds,
    /// Parameters held fixed.
    pub known: ParameterMask,
    /// Proposal amplitude per parameter; zero for known parameters.
    pub amplitude: GalaxyParameters,
}

/// Why the sampler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Termination {
    /// The iteration budget was used up.
    MaxIterations,
    /// The acceptance rate fell below the configured minimum.
    LowAcceptance,
}

/// Outcome of a sampler run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerRun {
    /// Raw chain, one row per iteration.
    pub chain: Chain,
    /// Iterations actually run.
    pub iterations: usize,
    /// Accepted proposals.
    pub accepted: usize,
    /// Accepted proposals per iteration, in percent.
    pub acceptance_rate: f64,
    /// Reason for stopping.
    pub termination: Termination,
    /// Degrees of freedom used to reduce the chi-square.
    pub degrees_of_freedom: f64,
}

/// Runs the Metropolis random walk.
///
/// Each iteration proposes a jump, rejects it without evaluating the model
/// when it leaves the boundaries, and otherwise accepts it with probability
/// `min(1, exp(-(χ²_new - χ²_old) / 2))`. The current state is appended to
/// the chain after every decision. A proposal whose model fails or whose
/// chi-square is not finite counts as a rejection.
pub fn run<M: KinematicModel + ?Sized>(
    forward: &mut ForwardModel<'_, M>,
    chi: &ChiSquare<'_>,
    setup: &SamplerSetup,
    config: &SamplerConfig,
    master_seed: u64,
) -> Result<SamplerRun, KineError> {
    validate(setup, config)?;
    let degrees_of_freedom = chi.degrees_of_freedom(&setup.known);
    if !(degrees_of_freedom > 0.0) {
        return Err(KineError::Config(
            ErrorInfo::new("too-few-voxels", "not enough finite voxels for the free parameters")
                .with_context("finite_voxels", chi.finite_voxels().to_string())
                .with_context("free_parameters", setup.known.free_count().to_string()),
        ));
    }

    let mut rng = RngHandle::from_seed(determinism::sampler_seed(master_seed));
    let mut current = setup.initial;
    let mut chi_current = chi.evaluate(&forward.convolved(&current)?);
    if !chi_current.is_finite() {
        return Err(KineError::Sampler(
            ErrorInfo::new("initial-chi", "chi-square of the initial parameters is not finite")
                .with_context("chi", chi_current.to_string()),
        ));
    }

    info!(
        model = forward.model().name(),
        proposal = ?config.proposal,
        statistic = ?chi.statistic(),
        max_iterations = config.max_iterations,
        reduced_chi = chi_current / degrees_of_freedom,
        "starting Metropolis sampler"
    );

    let mut chain = Chain::with_capacity(current, config.max_iterations);
    let mut accepted = 0usize;
    let mut chi_min = chi_current;
    let mut termination = Termination::MaxIterations;

    for iteration in 1..=config.max_iterations {
        let proposal = config
            .proposal
            .propose(&current, &setup.amplitude, &chain, &mut rng);

        let mut took = false;
        if proposal.bitwise_eq(&current) {
            trace!(iteration, "proposal does not move the chain");
        } else if let Some(name) = setup.bounds.first_violation(&proposal) {
            trace!(iteration, parameter = name.as_str(), "proposal outside boundaries");
        } else {
            match forward.convolved(&proposal) {
                Ok(model) => {
                    let chi_new = chi.evaluate(&model);
                    if chi_new.is_finite() {
                        let likelihood = (-0.5 * (chi_new - chi_current)).exp();
                        if rng.uniform() < likelihood {
                            current = proposal;
                            chi_current = chi_new;
                            took = true;
                        }
                    } else {
                        report_rejection(config.verbose, iteration, "chi-square is not finite");
                    }
                }
                Err(err) => {
                    report_rejection(config.verbose, iteration, &err.to_string());
                }
            }
        }

        if took {
            accepted += 1;
            if chi_current < chi_min {
                chi_min = chi_current;
            }
            if config.verbose {
                debug!(
                    iteration,
                    accepted,
                    rate = accepted as f64 * 100.0 / iteration as f64,
                    reduced_chi = chi_current / degrees_of_freedom,
                    reduced_chi_min = chi_min / degrees_of_freedom,
                    parameters = ?current.as_array(),
                    "proposal accepted"
                );
            }
        }
        chain.push(ChainRow {
            parameters: current,
            reduced_chi: chi_current / degrees_of_freedom,
            accepted: took,
        });

        if iteration % config.acceptance_check_interval == 0 {
            let rate = accepted as f64 * 100.0 / iteration as f64;
            if rate < config.min_acceptance_rate {
                warn!(
                    iteration,
                    rate,
                    minimum = config.min_acceptance_rate,
                    "acceptance rate too low; the proposal amplitude is likely mis-tuned"
                );
                termination = Termination::LowAcceptance;
                break;
            }
        }
    }

    let iterations = chain.len();
    if accepted == 0 {
        return Err(KineError::Sampler(
            ErrorInfo::new("no-useful-iteration", "no proposal was accepted")
                .with_context("iterations", iterations.to_string())
                .with_hint("increase max_iterations or lower the random scale"),
        ));
    }
    let acceptance_rate = accepted as f64 * 100.0 / iterations as f64;
    info!(
        iterations,
        accepted,
        rate = acceptance_rate,
        termination = ?termination,
        "sampler finished"
    );

    Ok(SamplerRun {
        chain,
        iterations,
        accepted,
        acceptance_rate,
        termination,
        degrees_of_freedom,
    })
}

fn validate(setup: &SamplerSetup, config: &SamplerConfig) -> Result<(), KineError> {
    setup.bounds.validate()?;
    if let Some(name) = setup.bounds.first_violation(&setup.initial) {
        return Err(KineError::Config(
            ErrorInfo::new("initial-out-of-bounds", "initial parameters leave the boundaries")
                .with_context("parameter", name.as_str())
                .with_context("value", setup.initial[name].to_string())
                .with_context("min", setup.bounds.min[name].to_string())
                .with_context("max", setup.bounds.max[name].to_string()),
        ));
    }
    if config.max_iterations == 0 || config.acceptance_check_interval == 0 {
        return Err(KineError::Config(
            ErrorInfo::new("sampler-budget", "iteration budget and check interval must be positive")
                .with_context("max_iterations", config.max_iterations.to_string())
                .with_context(
                    "acceptance_check_interval",
                    config.acceptance_check_interval.to_string(),
                ),
        ));
    }
    Ok(())
}

fn report_rejection(verbose: bool, iteration: usize, reason: &str) {
    if verbose {
        warn!(iteration, reason, "proposal rejected");
    } else {
        trace!(iteration, reason, "proposal rejected");
    }
}
