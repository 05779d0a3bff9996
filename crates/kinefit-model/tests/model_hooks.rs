use kinefit_core::{Cube, CubeShape, GalaxyParameters};
use kinefit_model::{estimate_flux, DiskModel, KinematicModel, ModelContext};

fn context() -> ModelContext {
    ModelContext {
        shape: CubeShape::new(30, 20, 24),
        flux_estimate: 90.0,
    }
}

#[test]
fn default_bounds_follow_the_observation() {
    let bounds = DiskModel::default().default_bounds(&context());
    bounds.validate().unwrap();
    assert!((bounds.min.x - 24.0 * 0.33).abs() < 1e-12);
    assert!((bounds.max.y - 20.0 * 0.66).abs() < 1e-12);
    assert!((bounds.max.z - 30.0 * 0.66).abs() < 1e-12);
    assert_eq!(bounds.min.flux, 30.0);
    assert_eq!(bounds.max.flux, 270.0);
    assert_eq!(bounds.max.radius, 10.0);
    assert_eq!(bounds.max.turnover_radius, 5.0);
    assert_eq!((bounds.min.pa, bounds.max.pa), (-180.0, 180.0));
    assert_eq!(bounds.min.maximum_velocity, -350.0);
    assert_eq!(bounds.max.velocity_dispersion, 180.0);
}

#[test]
fn initial_parameters_start_at_the_cube_centre() {
    let initial = DiskModel::default().initial_parameters(&context());
    assert_eq!(initial.x, 11.5);
    assert_eq!(initial.y, 9.5);
    assert_eq!(initial.flux, 90.0);
    assert!(initial.inclination.is_nan());
}

#[test]
fn sanitize_parameters_wraps_the_position_angle() {
    let model = DiskModel::default();
    let mut params = GalaxyParameters {
        pa: -90.0,
        inclination: 40.0,
        ..GalaxyParameters::splat(1.0)
    };
    model.sanitize_parameters(&mut params);
    assert_eq!(params.pa, 270.0);

    params.inclination = -10.0;
    params.pa = 10.0;
    model.sanitize_parameters(&mut params);
    assert_eq!(params.pa, 190.0);
}

#[test]
fn sanitize_chain_row_flips_negative_rotation() {
    let model = DiskModel::default();
    let mut params = GalaxyParameters {
        pa: 300.0,
        maximum_velocity: -120.0,
        ..GalaxyParameters::splat(1.0)
    };
    model.sanitize_chain_row(&mut params);
    assert_eq!(params.maximum_velocity, 120.0);
    assert_eq!(params.pa, 120.0);
}

#[test]
fn flux_estimate_skips_nan_and_falls_back_on_positive_voxels() {
    let mut cube = Cube::from_elem((2, 2, 2), 1.5);
    cube[[0, 0, 0]] = f64::NAN;
    assert_eq!(estimate_flux(&cube), 1.5 * 7.0);

    let mut noisy = Cube::from_elem((2, 2, 2), -2.0);
    noisy[[1, 1, 1]] = 3.0;
    assert_eq!(estimate_flux(&noisy), 3.0);

    let ctx = ModelContext::observe(&cube);
    assert_eq!(ctx.shape, CubeShape::new(2, 2, 2));
}

#[test]
fn random_amplitude_becomes_independent_of_the_cube_size() {
    let model = DiskModel::default();
    let ctx = context();
    let voxels = ctx.shape.voxels() as f64;
    let width = 360.0_f64;
    let incoming = (width * width / 12.0).sqrt() * 10.0 / voxels;
    let mut amplitude = GalaxyParameters::splat(incoming);
    model.adjust_random_amplitude(&ctx, &mut amplitude);
    let expected = width / 12f64.sqrt() / 10.0;
    for (name, value) in amplitude.iter() {
        assert!((value - expected).abs() < 1e-9, "{name}: {value}");
    }
}
