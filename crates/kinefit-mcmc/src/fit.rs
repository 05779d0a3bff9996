//! End-to-end fit of an observed cube: run setup, sampling, best-fit
//! extraction and the derived cubes, maps and statistics.

use ndarray::{Array2, Axis, Zip};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use kinefit_core::errors::ErrorInfo;
use kinefit_core::{
    Cube, CubeShape, KineError, ParameterMask, ParameterName, PARAMETER_COUNT,
};
use kinefit_model::{KinematicModel, ModelContext, ModelCube};

use crate::analysis::{best_fit, median, population_stdev, BestFit};
use crate::chain::Chain;
use crate::config::{FitConfig, PriorConfig};
use crate::forward::ForwardModel;
use crate::kernel::{self, SamplerSetup, Termination};
use crate::statistics::ChiSquare;
use crate::stats::{FitStatistics, StatisticsInput};

/// Relative half-width of the boundaries pinning a known parameter.
pub const KNOWN_EPSILON: f64 = 0.003;

/// Variance substituted for zero or unusable variance voxels.
pub const DEGENERATE_VARIANCE: f64 = 1e12;

const CLIP_SIGMA: f64 = 2.5;
const CLIP_ITERATIONS: usize = 5;

/// Observed cube and its optional variance, both with axes `(spectral, y, x)`.
#[derive(Debug, Clone)]
pub struct Observation {
    /// Observed flux.
    pub cube: Cube,
    /// Per-voxel variance; estimated from the cube edges when absent.
    pub variance: Option<Cube>,
}

impl Observation {
    /// Observation without a variance cube.
    pub fn new(cube: Cube) -> Self {
        Self {
            cube,
            variance: None,
        }
    }

    /// Attaches a variance cube.
    pub fn with_variance(mut self, variance: Cube) -> Self {
        self.variance = Some(variance);
        self
    }
}

/// Everything produced by a fit.
#[derive(Debug, Clone)]
pub struct FitResult {
    /// Name of the fitted model.
    pub model: String,
    /// Best-fit parameters, dispersions and percentile bounds.
    pub best: BestFit,
    /// Starting point, boundaries, known parameters and amplitudes used.
    pub setup: SamplerSetup,
    /// Sanitised chain.
    pub chain: Chain,
    /// Iterations run.
    pub iterations: usize,
    /// Accepted proposals.
    pub accepted: usize,
    /// Acceptance rate, in percent.
    pub acceptance_rate: f64,
    /// Reason the sampler stopped.
    pub termination: Termination,
    /// Variance cube used by the chi-square.
    pub variance: Cube,
    /// Best-fit model convolved with the instrument.
    pub convolved_cube: Cube,
    /// Best-fit clean model and its true flux, velocity and dispersion maps.
    pub clean: ModelCube,
    /// `(data - model) / σ`.
    pub residual_cube: Cube,
    /// Residuals summed along the spectral axis, normalised to σ of the mean.
    pub residual_map: Array2<f64>,
    /// Information criteria.
    pub statistics: FitStatistics,
}

/// Serialisable digest of a [`FitResult`], without cubes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSummary {
    /// Name of the fitted model.
    pub model: String,
    /// Best-fit parameters, dispersions and percentile bounds.
    pub best: BestFit,
    /// Sampler setup.
    pub setup: SamplerSetup,
    /// Iterations run.
    pub iterations: usize,
    /// Accepted proposals.
    pub accepted: usize,
    /// Acceptance rate, in percent.
    pub acceptance_rate: f64,
    /// Reason the sampler stopped.
    pub termination: Termination,
    /// Information criteria.
    pub statistics: FitStatistics,
}

impl FitResult {
    /// Digest written next to the run manifest.
    pub fn summary(&self) -> FitSummary {
        FitSummary {
            model: self.model.clone(),
            best: self.best.clone(),
            setup: self.setup,
            iterations: self.iterations,
            accepted: self.accepted,
            acceptance_rate: self.acceptance_rate,
            termination: self.termination,
            statistics: self.statistics,
        }
    }
}

/// Fits the disk model described by `config` to an observation.
pub fn fit(observation: &Observation, config: &FitConfig) -> Result<FitResult, KineError> {
    fit_with_model(observation, &config.model, config)
}

/// Fits any kinematic model; the `model` section of `config` is ignored.
pub fn fit_with_model<M: KinematicModel + ?Sized>(
    observation: &Observation,
    model: &M,
    config: &FitConfig,
) -> Result<FitResult, KineError> {
    let cube = &observation.cube;
    let shape = CubeShape::of(cube);
    shape.ensure_non_empty()?;
    model.validate()?;

    let instrument = config.instrument.build()?;
    let variance = prepare_variance(cube, observation.variance.as_ref())?;
    let ctx = ModelContext::observe(cube);
    let setup = prepare_setup(model, &ctx, &config.priors)?;
    info!(
        model = model.name(),
        instrument = %instrument.name,
        nz = shape.nz,
        ny = shape.ny,
        nx = shape.nx,
        known = ?setup.known.names(),
        "fit setup ready"
    );

    let convolver = instrument.convolver(shape)?;
    let mut forward = ForwardModel::new(model, convolver, instrument.z_step_kms());
    let chi = ChiSquare::new(cube, &variance, config.sampler.chi_stat)?;
    let run = kernel::run(
        &mut forward,
        &chi,
        &setup,
        &config.sampler,
        config.seed_policy.master_seed,
    )?;

    let chain = run
        .chain
        .sanitized(|params| model.sanitize_chain_row(params));
    let selection = &config.selection;
    let best = best_fit(
        &chain,
        selection.method,
        selection.last_fraction,
        selection.percentile,
    )?;

    let (clean, convolved_cube) = forward.evaluate(&best.parameters)?;
    let chi2_at_p = chi.evaluate(&convolved_cube) / run.degrees_of_freedom;
    let residual_cube = residuals(cube, &convolved_cube, &variance);
    let residual_map = residual_map(&residual_cube);
    let statistics = FitStatistics::compute(StatisticsInput {
        chi2_at_p,
        best_chi2: best.best_chi,
        degrees_of_freedom: run.degrees_of_freedom,
        k_free: setup.known.free_count(),
        sub_chain_chi: &best.sub_chain_chi,
        method: best.method,
        convolved: &convolved_cube,
        variance: &variance,
    });
    info!(
        parameters = %best.parameters,
        chi2_at_p,
        bic = statistics.bic,
        "best fit extracted"
    );

    Ok(FitResult {
        model: model.name().to_string(),
        best,
        setup,
        chain,
        iterations: run.iterations,
        accepted: run.accepted,
        acceptance_rate: run.acceptance_rate,
        termination: run.termination,
        variance,
        convolved_cube,
        clean,
        residual_cube,
        residual_map,
        statistics,
    })
}

/// Variance cube used by the chi-square.
///
/// A supplied cube has its zero and non-finite voxels replaced by
/// [`DEGENERATE_VARIANCE`]. Without one, a uniform variance is estimated
/// from sigma-clipped statistics of a strip near the cube edge, falling back
/// to the whole cube.
pub fn prepare_variance(cube: &Cube, variance: Option<&Cube>) -> Result<Cube, KineError> {
    if let Some(variance) = variance {
        if variance.dim() != cube.dim() {
            return Err(KineError::Config(
                ErrorInfo::new("variance-shape", "variance cube does not match the data cube")
                    .with_context("data", format!("{:?}", cube.dim()))
                    .with_context("variance", format!("{:?}", variance.dim())),
            ));
        }
        let degenerate = variance
            .iter()
            .filter(|v| !(v.is_finite() && **v != 0.0))
            .count();
        if degenerate > 0 {
            info!(degenerate, "replacing degenerate variance voxels");
        }
        return Ok(variance.mapv(|v| {
            if v.is_finite() && v != 0.0 {
                v
            } else {
                DEGENERATE_VARIANCE
            }
        }));
    }

    warn!("no variance provided; estimating it from edge statistics");
    let (_, ny, nx) = cube.dim();
    let edge: Vec<f64> = if ny > 6 && nx > 4 {
        cube.indexed_iter()
            .filter(|((_, y, x), _)| (2..ny - 4).contains(y) && (2..4).contains(x))
            .map(|(_, value)| *value)
            .collect()
    } else {
        Vec::new()
    };
    let (_, mut sigma) = median_clip(&edge, CLIP_SIGMA);
    if !sigma.is_finite() {
        let all: Vec<f64> = cube.iter().copied().collect();
        sigma = median_clip(&all, CLIP_SIGMA).1;
        info!(sigma, "estimated the noise from the whole cube");
    }
    if sigma == 0.0 {
        sigma = 1e-20;
    }
    info!(variance = sigma * sigma, "estimated uniform variance");
    Ok(Cube::from_elem(cube.dim(), sigma * sigma))
}

/// Iterative median clipping; returns the median and standard deviation of
/// the finite values kept within `clip` standard deviations of the median.
pub fn median_clip(values: &[f64], clip: f64) -> (f64, f64) {
    let mut kept: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if kept.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let mut center = median(&kept);
    let mut sigma = population_stdev(&kept);
    for _ in 0..CLIP_ITERATIONS {
        let before = kept.len();
        kept.retain(|v| (v - center).abs() <= clip * sigma);
        if kept.is_empty() {
            break;
        }
        center = median(&kept);
        sigma = population_stdev(&kept);
        if kept.len() == before {
            break;
        }
    }
    (center, sigma)
}

/// Boundaries, starting point, known parameters and proposal amplitude.
pub fn prepare_setup<M: KinematicModel + ?Sized>(
    model: &M,
    ctx: &ModelContext,
    priors: &PriorConfig,
) -> Result<SamplerSetup, KineError> {
    let mut bounds = model
        .default_bounds(ctx)
        .with_overrides(&priors.min, &priors.max);
    bounds.validate()?;

    let mut initial = priors
        .initial
        .merge_where_nan(&model.initial_parameters(ctx))
        .merge_where_nan(&bounds.mean());

    let mut known = ParameterMask::none();
    for (name, value) in priors.known.iter() {
        if value.is_nan() {
            continue;
        }
        bounds.pin(name, value, KNOWN_EPSILON);
        initial[name] = value;
        known.insert(name);
    }

    let voxels = ctx.shape.voxels() as f64;
    let mut amplitude = bounds
        .widths()
        .map(|_, width| (width * width / 12.0).sqrt() * PARAMETER_COUNT as f64 / voxels);
    model.adjust_random_amplitude(ctx, &mut amplitude);
    let factors = priors.random_scale.factors();
    let amplitude = amplitude.map(|name, a| {
        if known.contains(name) {
            0.0
        } else {
            a * factors[name]
        }
    });
    if let Some(name) = ParameterName::ALL
        .into_iter()
        .find(|name| !amplitude[*name].is_finite())
    {
        return Err(KineError::Config(
            ErrorInfo::new("random-amplitude", "proposal amplitude is not finite")
                .with_context("parameter", name.as_str())
                .with_context("value", amplitude[name].to_string()),
        ));
    }

    Ok(SamplerSetup {
        initial,
        bounds,
        known,
        amplitude,
    })
}

/// `(data - model) / σ`, voxel by voxel.
pub fn residuals(data: &Cube, model: &Cube, variance: &Cube) -> Cube {
    let mut out = Cube::zeros(data.dim());
    Zip::from(&mut out)
        .and(data)
        .and(model)
        .and(variance)
        .for_each(|r, &d, &m, &v| *r = (d - m) / v.sqrt());
    out
}

/// Spectral sum of the residuals, `Σ_z R / n_z · sqrt(n_z)`.
pub fn residual_map(residuals: &Cube) -> Array2<f64> {
    let nz = residuals.len_of(Axis(0)) as f64;
    residuals.sum_axis(Axis(0)) / nz * nz.sqrt()
}
