use kinefit_core::{Cube, CubeShape, GalaxyParameters, ParameterName};
use kinefit_mcmc::fit::{prepare_setup, prepare_variance, DEGENERATE_VARIANCE, KNOWN_EPSILON};
use kinefit_mcmc::{
    fit, BestFitMethod, FitConfig, Observation, PriorConfig, ProposalKind, RandomScale,
};
use kinefit_model::{DiskModel, KinematicModel, ModelContext};

const SHAPE: CubeShape = CubeShape::new(20, 14, 14);

fn truth() -> GalaxyParameters {
    GalaxyParameters {
        x: 7.0,
        y: 6.5,
        z: 10.0,
        flux: 100.0,
        radius: 2.5,
        inclination: 50.0,
        pa: 40.0,
        turnover_radius: 1.0,
        maximum_velocity: 120.0,
        velocity_dispersion: 40.0,
    }
}

fn config() -> FitConfig {
    let mut config = FitConfig::default();
    config.instrument.without_psf = true;
    config.instrument.without_lsf = true;
    config.sampler.max_iterations = 3000;
    config.sampler.min_acceptance_rate = 0.0;
    config.selection.method = BestFitMethod::Map;
    config.seed_policy.master_seed = 2024;

    let t = truth();
    config.priors.min = GalaxyParameters {
        x: 6.0,
        y: 5.5,
        z: 9.0,
        flux: 70.0,
        pa: 25.0,
        maximum_velocity: 80.0,
        ..GalaxyParameters::nan()
    };
    config.priors.max = GalaxyParameters {
        x: 8.0,
        y: 7.5,
        z: 11.0,
        flux: 140.0,
        pa: 60.0,
        maximum_velocity: 180.0,
        ..GalaxyParameters::nan()
    };
    config.priors.initial = GalaxyParameters {
        x: 7.6,
        y: 6.0,
        z: 10.6,
        flux: 125.0,
        pa: 52.0,
        maximum_velocity: 160.0,
        ..GalaxyParameters::nan()
    };
    config.priors.known = GalaxyParameters {
        radius: t.radius,
        inclination: t.inclination,
        turnover_radius: t.turnover_radius,
        velocity_dispersion: t.velocity_dispersion,
        ..GalaxyParameters::nan()
    };
    config
}

fn synthetic(config: &FitConfig) -> Cube {
    let z_step_kms = config.instrument.build().unwrap().z_step_kms();
    DiskModel::default()
        .clean_cube(&truth(), SHAPE, z_step_kms)
        .unwrap()
        .cube
}

#[test]
fn zero_noise_cube_is_recovered() {
    let config = config();
    let cube = synthetic(&config);
    let observation =
        Observation::new(cube.clone()).with_variance(Cube::from_elem(SHAPE.dim(), 0.05));
    let result = fit(&observation, &config).unwrap();

    let best = result.best.parameters;
    let t = truth();
    assert!((best.x - t.x).abs() < 0.2, "x = {}", best.x);
    assert!((best.y - t.y).abs() < 0.2, "y = {}", best.y);
    assert!((best.z - t.z).abs() < 0.3, "z = {}", best.z);
    assert!((best.flux - t.flux).abs() < 8.0, "flux = {}", best.flux);
    assert!((best.pa - t.pa).abs() < 5.0, "pa = {}", best.pa);
    assert!(
        (best.maximum_velocity - t.maximum_velocity).abs() < 20.0,
        "vmax = {}",
        best.maximum_velocity
    );
    assert!((best.radius - t.radius).abs() < 0.02);

    assert_eq!(result.chain.len(), result.iterations);
    assert!(result.accepted > 0);
    assert_eq!(result.statistics.k_free, 6);
    assert_eq!(result.statistics.n_data, SHAPE.voxels());
    assert!(result.statistics.chi2_at_p.is_finite());
    assert!(result.statistics.chi2_at_p <= result.best.best_chi + 1e-9);
    assert_eq!(result.convolved_cube, result.clean.cube);
    assert_eq!(result.residual_cube.dim(), SHAPE.dim());
    assert_eq!(result.residual_map.dim(), (SHAPE.ny, SHAPE.nx));
    assert!((result.clean.flux_map.sum() - best.flux).abs() < 1e-6);
}

#[test]
fn fits_are_reproducible_for_a_seed() {
    let mut config = config();
    config.sampler.max_iterations = 300;
    config.sampler.proposal = ProposalKind::AdaptiveCauchy;
    let observation = Observation::new(synthetic(&config))
        .with_variance(Cube::from_elem(SHAPE.dim(), 0.05));
    let first = fit(&observation, &config).unwrap();
    let second = fit(&observation, &config).unwrap();
    assert_eq!(first.chain, second.chain);
    assert_eq!(first.best.parameters, second.best.parameters);
}

#[test]
fn supplied_variance_replaces_degenerate_voxels() {
    let cube = Cube::from_elem((2, 3, 3), 1.0);
    let mut variance = Cube::from_elem((2, 3, 3), 0.5);
    variance[[0, 0, 0]] = 0.0;
    variance[[1, 2, 2]] = f64::NAN;
    let prepared = prepare_variance(&cube, Some(&variance)).unwrap();
    assert_eq!(prepared[[0, 0, 0]], DEGENERATE_VARIANCE);
    assert_eq!(prepared[[1, 2, 2]], DEGENERATE_VARIANCE);
    assert_eq!(prepared[[0, 1, 1]], 0.5);

    let wrong = Cube::from_elem((2, 3, 4), 1.0);
    let err = prepare_variance(&cube, Some(&wrong)).unwrap_err();
    assert_eq!(err.info().code, "variance-shape");
}

#[test]
fn missing_variance_is_estimated_from_the_edges() {
    let mut cube = Cube::zeros((4, 12, 12));
    for ((k, j, i), value) in cube.indexed_iter_mut() {
        *value = if (k + j + i) % 2 == 0 { 0.3 } else { -0.3 };
    }
    // A bright source far from the edge strip does not leak into the estimate.
    cube[[2, 6, 8]] = 500.0;
    let variance = prepare_variance(&cube, None).unwrap();
    assert!(variance.iter().all(|v| (v - 0.09).abs() < 1e-9));

    let flat = Cube::from_elem((3, 4, 4), 2.0);
    let variance = prepare_variance(&flat, None).unwrap();
    assert!(variance.iter().all(|v| (v - 1e-40).abs() < 1e-52));
}

#[test]
fn known_parameters_are_pinned_and_frozen() {
    let model = DiskModel::default();
    let ctx = ModelContext {
        shape: SHAPE,
        flux_estimate: 100.0,
    };
    let priors = PriorConfig {
        known: GalaxyParameters {
            maximum_velocity: -150.0,
            ..GalaxyParameters::nan()
        },
        random_scale: RandomScale::PerParameter(GalaxyParameters {
            flux: 2.0,
            ..GalaxyParameters::nan()
        }),
        ..PriorConfig::default()
    };
    let setup = prepare_setup(&model, &ctx, &priors).unwrap();
    assert!(setup.known.contains(ParameterName::MaximumVelocity));
    assert_eq!(setup.known.count(), 1);
    assert_eq!(setup.initial.maximum_velocity, -150.0);
    assert_eq!(setup.amplitude.maximum_velocity, 0.0);
    let expected_min = -150.0 * (1.0 + KNOWN_EPSILON) - KNOWN_EPSILON;
    assert!((setup.bounds.min.maximum_velocity - expected_min).abs() < 1e-9);
    assert!(setup.bounds.contains(&setup.initial));

    let defaults = model.default_bounds(&ctx);
    let width = defaults.max.flux - defaults.min.flux;
    let expected = width / 12f64.sqrt() / 10.0 * 2.0;
    assert!((setup.amplitude.flux - expected).abs() < 1e-9);
    let width = defaults.max.pa - defaults.min.pa;
    assert!((setup.amplitude.pa - width / 12f64.sqrt() / 10.0).abs() < 1e-9);
}

#[test]
fn initial_values_fall_back_to_model_then_bounds() {
    let model = DiskModel::default();
    let ctx = ModelContext {
        shape: SHAPE,
        flux_estimate: 100.0,
    };
    let priors = PriorConfig {
        initial: GalaxyParameters {
            pa: 10.0,
            ..GalaxyParameters::nan()
        },
        ..PriorConfig::default()
    };
    let setup = prepare_setup(&model, &ctx, &priors).unwrap();
    assert_eq!(setup.initial.pa, 10.0);
    assert_eq!(setup.initial.x, 6.5);
    assert_eq!(setup.initial.flux, 100.0);
    assert_eq!(setup.initial.inclination, 45.0);
    assert!(!setup.initial.has_nan());
}

#[test]
fn inverted_overrides_are_fatal() {
    let mut config = config();
    config.priors.min.flux = 200.0;
    let observation = Observation::new(synthetic(&config));
    let err = fit(&observation, &config).unwrap_err();
    assert_eq!(err.family(), "config");
    assert_eq!(err.info().code, "invalid-boundaries");
}
