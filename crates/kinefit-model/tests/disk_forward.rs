use kinefit_core::{CubeShape, GalaxyParameters, KineError};
use kinefit_model::{
    DiskModel, DispersionProfile, FluxProfile, KinematicModel, LineDoublet, RotationCurve,
    ThicknessProfile,
};
use proptest::prelude::*;

fn galaxy() -> GalaxyParameters {
    GalaxyParameters {
        x: 7.0,
        y: 7.0,
        z: 15.0,
        flux: 250.0,
        radius: 3.0,
        inclination: 55.0,
        pa: 30.0,
        turnover_radius: 1.5,
        maximum_velocity: 180.0,
        velocity_dispersion: 40.0,
    }
}

const SHAPE: CubeShape = CubeShape::new(30, 15, 15);
const Z_STEP_KMS: f64 = 40.0;

#[test]
fn cube_carries_the_model_flux() {
    let model = DiskModel::default();
    let out = model.clean_cube(&galaxy(), SHAPE, Z_STEP_KMS).unwrap();
    assert_eq!(out.cube.dim(), SHAPE.dim());
    assert!((out.flux_map.sum() - 250.0).abs() < 1e-9);
    assert!((out.cube.sum() - 250.0).abs() < 1e-6);
    assert!(out.cube.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn velocity_field_is_point_antisymmetric_about_the_centre() {
    let model = DiskModel::default();
    let out = model.clean_cube(&galaxy(), SHAPE, Z_STEP_KMS).unwrap();
    for j in 0..15 {
        for i in 0..15 {
            let (mj, mi) = (14 - j, 14 - i);
            let v = out.velocity_map[[j, i]];
            let mirrored = out.velocity_map[[mj, mi]];
            assert!((v + mirrored).abs() < 1e-6, "{v} vs {mirrored} at ({j}, {i})");
            let f = out.flux_map[[j, i]];
            assert!((f - out.flux_map[[mj, mi]]).abs() < 1e-9);
        }
    }
    assert!(out.velocity_map[[7, 7]].abs() < 1e-9);
}

#[test]
fn face_on_disk_shows_no_rotation() {
    let model = DiskModel::default();
    let params = GalaxyParameters {
        inclination: 0.0,
        ..galaxy()
    };
    let out = model.clean_cube(&params, SHAPE, Z_STEP_KMS).unwrap();
    assert!(out.velocity_map.iter().all(|v| v.abs() < 1e-9));
    assert!(out.dispersion_map.iter().all(|s| *s >= 40.0 - 1e-9));
}

#[test]
fn negative_vmax_is_the_same_field_as_a_flipped_position_angle() {
    let model = DiskModel::default();
    let flipped = GalaxyParameters {
        maximum_velocity: -180.0,
        pa: 210.0,
        ..galaxy()
    };
    let a = model.clean_cube(&galaxy(), SHAPE, Z_STEP_KMS).unwrap();
    let b = model.clean_cube(&flipped, SHAPE, Z_STEP_KMS).unwrap();
    for (x, y) in a.cube.iter().zip(b.cube.iter()) {
        assert!((x - y).abs() < 1e-6);
    }
}

#[test]
fn line_is_centred_on_the_spectral_centroid() {
    let model = DiskModel::default();
    let out = model.clean_cube(&galaxy(), SHAPE, Z_STEP_KMS).unwrap();
    let spectrum: Vec<f64> = (0..30).map(|k| out.cube[[k, 7, 7]]).collect();
    let peak = spectrum
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(k, _)| k);
    assert_eq!(peak, Some(15));
}

#[test]
fn doublet_adds_a_blue_component() {
    let model = DiskModel {
        line: Some(LineDoublet {
            waves: [3726.2, 3728.9],
            ratios: [0.8, 1.0],
        }),
        ..DiskModel::default()
    };
    let single = DiskModel::default()
        .clean_cube(&galaxy(), SHAPE, Z_STEP_KMS)
        .unwrap();
    let double = model.clean_cube(&galaxy(), SHAPE, Z_STEP_KMS).unwrap();
    assert!((double.cube.sum() - single.cube.sum()).abs() < 1e-6);
    // The blue line sits ~217 km/s (about five planes) below the red one.
    let blue = double.cube[[10, 7, 7]] / double.cube[[15, 7, 7]];
    let reference = single.cube[[10, 7, 7]] / single.cube[[15, 7, 7]];
    assert!(blue > reference);
}

#[test]
fn empty_disk_is_a_model_error() {
    let model = DiskModel::default();
    let params = GalaxyParameters {
        radius: 0.0,
        x: 7.3,
        ..galaxy()
    };
    let err = model.clean_cube(&params, SHAPE, Z_STEP_KMS).unwrap_err();
    assert!(matches!(err, KineError::Model(_)));
    assert_eq!(err.info().code, "zero-total-flux");
}

#[test]
fn every_profile_combination_builds() {
    for flux in [
        FluxProfile::Exponential,
        FluxProfile::Gaussian,
        FluxProfile::DeVaucouleurs,
    ] {
        for thickness in [
            ThicknessProfile::Gaussian,
            ThicknessProfile::Exponential,
            ThicknessProfile::Sech2,
            ThicknessProfile::None,
        ] {
            for curve in [
                RotationCurve::Arctan,
                RotationCurve::Exp,
                RotationCurve::Tanh,
                RotationCurve::Isothermal,
                RotationCurve::Mass,
            ] {
                for dispersion in [DispersionProfile::Thick, DispersionProfile::Thin] {
                    let model = DiskModel {
                        flux_profile: flux,
                        thickness_profile: thickness,
                        rotation_curve: curve,
                        dispersion_profile: dispersion,
                        ..DiskModel::default()
                    };
                    let out = model
                        .clean_cube(&galaxy(), CubeShape::new(12, 9, 9), Z_STEP_KMS)
                        .unwrap();
                    assert!(out.cube.iter().all(|v| v.is_finite()));
                }
            }
        }
    }
}

#[test]
fn yaml_model_configuration() {
    let yaml = r#"
flux_profile: de-vaucouleurs
thickness_profile: sech2
rotation_curve: isothermal
dispersion_profile: thin
line: { waves: [6548.05, 6583.45], ratios: [1.0, 3.0] }
"#;
    let model: DiskModel = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(model.flux_profile, FluxProfile::DeVaucouleurs);
    assert_eq!(model.q, 0.15);
    assert!(model.validate().is_ok());

    let bad = DiskModel {
        q: 0.0,
        ..DiskModel::default()
    };
    assert_eq!(bad.validate().unwrap_err().info().code, "disk-aspect-ratio");
}

proptest! {
    #[test]
    fn flux_map_always_sums_to_flux(
        inclination in 0.0f64..90.0,
        pa in -180.0f64..180.0,
        radius in 1.0f64..4.0,
        flux in 1.0f64..1000.0,
    ) {
        let params = GalaxyParameters { inclination, pa, radius, flux, ..galaxy() };
        let out = DiskModel::default().clean_cube(&params, CubeShape::new(16, 11, 11), Z_STEP_KMS).unwrap();
        prop_assert!((out.flux_map.sum() - flux).abs() < 1e-9 * flux);
    }
}

fn cold_static_galaxy() -> GalaxyParameters {
    GalaxyParameters {
        z: 15.2,
        maximum_velocity: 0.0,
        velocity_dispersion: 0.0,
        ..galaxy()
    }
}

#[test]
fn zero_width_line_lands_on_the_nearest_plane() {
    let model = DiskModel::default();
    let out = model
        .clean_cube(&cold_static_galaxy(), SHAPE, Z_STEP_KMS)
        .unwrap();
    assert!(out.dispersion_map.iter().all(|s| s.is_nan() || *s == 0.0));
    assert!((out.cube.sum() - 250.0).abs() < 1e-6);
    let plane: f64 = out.cube.index_axis(ndarray::Axis(0), 15).sum();
    assert!((plane - 250.0).abs() < 1e-6);
    assert!(out.cube.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn zero_width_doublet_splits_by_the_amplitude_ratio() {
    let model = DiskModel {
        line: Some(LineDoublet {
            waves: [3726.2, 3728.9],
            ratios: [0.8, 1.0],
        }),
        ..DiskModel::default()
    };
    let out = model
        .clean_cube(&cold_static_galaxy(), SHAPE, Z_STEP_KMS)
        .unwrap();
    // The blue component sits about 217 km/s, i.e. 5.4 planes, below.
    let red: f64 = out.cube.index_axis(ndarray::Axis(0), 15).sum();
    let blue: f64 = out.cube.index_axis(ndarray::Axis(0), 10).sum();
    assert!((red - 250.0 / 1.8).abs() < 1e-6);
    assert!((blue - 250.0 * 0.8 / 1.8).abs() < 1e-6);
    assert!((out.cube.sum() - 250.0).abs() < 1e-6);
}
