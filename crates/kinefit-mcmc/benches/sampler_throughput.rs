use criterion::{criterion_group, criterion_main, Criterion};
use kinefit_core::{CubeShape, GalaxyParameters};
use kinefit_mcmc::{fit, FitConfig, Observation};
use kinefit_model::{DiskModel, KinematicModel};

fn galaxy() -> GalaxyParameters {
    GalaxyParameters {
        x: 9.5,
        y: 9.5,
        z: 11.5,
        flux: 200.0,
        radius: 3.0,
        inclination: 60.0,
        pa: 45.0,
        turnover_radius: 1.2,
        maximum_velocity: 150.0,
        velocity_dispersion: 35.0,
    }
}

fn bench_fit(c: &mut Criterion) {
    let shape = CubeShape::new(24, 20, 20);
    let mut config = FitConfig::default();
    config.sampler.max_iterations = 100;
    config.sampler.min_acceptance_rate = 0.0;
    let z_step_kms = config.instrument.build().unwrap().z_step_kms();
    let cube = DiskModel::default()
        .clean_cube(&galaxy(), shape, z_step_kms)
        .unwrap()
        .cube;
    let observation = Observation::new(cube);

    c.bench_function("fit_100_iterations_convolved", |b| {
        b.iter(|| {
            let _ = fit(&observation, &config).unwrap();
        })
    });

    config.instrument.without_psf = true;
    c.bench_function("fit_100_iterations_clean", |b| {
        b.iter(|| {
            let _ = fit(&observation, &config).unwrap();
        })
    });
}

criterion_group!(benches, bench_fit);
criterion_main!(benches);
